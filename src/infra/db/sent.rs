use async_trait::async_trait;

use crate::application::repos::{OutcomeCounts, RepoError, SentNotificationsRepo};

use super::{PostgresRepositories, map_sqlx_error};

/// Serializes concurrent first-time creation of the recipient outcome table.
const RECIPIENT_STORAGE_LOCK_KEY: i64 = 0x6275_6c6c_6574_696e;

#[derive(sqlx::FromRow)]
struct OutcomeRow {
    delivery_status: String,
    count: i64,
}

#[async_trait]
impl SentNotificationsRepo for PostgresRepositories {
    async fn ensure_storage(&self) -> Result<(), RepoError> {
        let mut tx = self.pool().begin().await.map_err(map_sqlx_error)?;

        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(RECIPIENT_STORAGE_LOCK_KEY)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sent_notification_recipients (
                notification_id TEXT NOT NULL,
                recipient_id TEXT NOT NULL,
                delivery_status TEXT NOT NULL DEFAULT 'queued',
                status_code INTEGER,
                error_message TEXT,
                sent_at TIMESTAMPTZ,
                PRIMARY KEY (notification_id, recipient_id),
                CONSTRAINT sent_notification_recipients_status_check CHECK (
                    delivery_status IN ('queued', 'succeeded', 'failed', 'throttled', 'unknown')
                )
            )
            "#,
        )
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)
    }

    async fn outcome_counts(&self, notification_id: &str) -> Result<OutcomeCounts, RepoError> {
        let rows = sqlx::query_as::<_, OutcomeRow>(
            r#"
            SELECT delivery_status, COUNT(*) AS count
            FROM sent_notification_recipients
            WHERE notification_id = $1
            GROUP BY delivery_status
            "#,
        )
        .bind(notification_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        let mut counts = OutcomeCounts::default();
        for row in rows {
            match row.delivery_status.as_str() {
                "queued" => counts.queued = row.count,
                "succeeded" => counts.succeeded = row.count,
                "failed" => counts.failed = row.count,
                "throttled" => counts.throttled = row.count,
                "unknown" => counts.unknown = row.count,
                other => {
                    return Err(RepoError::from_persistence(format!(
                        "unknown delivery status `{other}`"
                    )));
                }
            }
        }
        Ok(counts)
    }
}
