use async_trait::async_trait;
use time::OffsetDateTime;

use crate::{
    application::repos::{DeliveryUpdate, NotificationsRepo, RepoError},
    domain::{
        audience::Audience,
        entities::{DeliveryCounters, NotificationContent, NotificationRecord, new_notification_id},
        types::{NotificationPartition, NotificationStatus},
    },
};

use super::{PostgresRepositories, map_sqlx_error, util::partition_conflict};

const NOTIFICATION_COLUMNS: &str = "id, partition, title, image_link, summary, author, \
    button_title, button_link, audience_teams, audience_rosters, audience_groups, all_users, \
    status, created_by, created_at, sent_at, sending_started_at, succeeded_count, failed_count, \
    throttled_count, unknown_count, total_message_count, error_message, warning_message, \
    source_draft_id";

#[derive(sqlx::FromRow)]
struct NotificationRow {
    id: String,
    partition: NotificationPartition,
    title: String,
    image_link: Option<String>,
    summary: Option<String>,
    author: Option<String>,
    button_title: Option<String>,
    button_link: Option<String>,
    audience_teams: Vec<String>,
    audience_rosters: Vec<String>,
    audience_groups: Vec<String>,
    all_users: bool,
    status: NotificationStatus,
    created_by: Option<String>,
    created_at: OffsetDateTime,
    sent_at: Option<OffsetDateTime>,
    sending_started_at: Option<OffsetDateTime>,
    succeeded_count: i64,
    failed_count: i64,
    throttled_count: i64,
    unknown_count: i64,
    total_message_count: i64,
    error_message: Option<String>,
    warning_message: Option<String>,
    source_draft_id: Option<String>,
}

impl From<NotificationRow> for NotificationRecord {
    fn from(row: NotificationRow) -> Self {
        Self {
            id: row.id,
            partition: row.partition,
            content: NotificationContent {
                title: row.title,
                image_link: row.image_link,
                summary: row.summary,
                author: row.author,
                button_title: row.button_title,
                button_link: row.button_link,
            },
            audience: Audience {
                teams: row.audience_teams,
                rosters: row.audience_rosters,
                groups: row.audience_groups,
                all_users: row.all_users,
            },
            status: row.status,
            created_by: row.created_by,
            created_at: row.created_at,
            sent_at: row.sent_at,
            sending_started_at: row.sending_started_at,
            counters: DeliveryCounters {
                succeeded: row.succeeded_count,
                failed: row.failed_count,
                throttled: row.throttled_count,
                unknown: row.unknown_count,
                total_message_count: row.total_message_count,
            },
            error_message: row.error_message,
            warning_message: row.warning_message,
            source_draft_id: row.source_draft_id,
        }
    }
}

#[async_trait]
impl NotificationsRepo for PostgresRepositories {
    async fn find(
        &self,
        partition: NotificationPartition,
        id: &str,
    ) -> Result<Option<NotificationRecord>, RepoError> {
        let sql = format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE partition = $1 AND id = $2"
        );
        let row = sqlx::query_as::<_, NotificationRow>(&sql)
            .bind(partition)
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(NotificationRecord::from))
    }

    async fn create_or_update(&self, record: &NotificationRecord) -> Result<(), RepoError> {
        let result = sqlx::query(
            r#"
            INSERT INTO notifications (
                id, partition, title, image_link, summary, author, button_title, button_link,
                audience_teams, audience_rosters, audience_groups, all_users, status,
                created_by, created_at, sent_at, sending_started_at, succeeded_count,
                failed_count, throttled_count, unknown_count, total_message_count,
                error_message, warning_message, source_draft_id
            )
            VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17,
                $18, $19, $20, $21, $22, $23, $24, $25
            )
            ON CONFLICT (id) DO UPDATE SET
                title = EXCLUDED.title,
                image_link = EXCLUDED.image_link,
                summary = EXCLUDED.summary,
                author = EXCLUDED.author,
                button_title = EXCLUDED.button_title,
                button_link = EXCLUDED.button_link,
                audience_teams = EXCLUDED.audience_teams,
                audience_rosters = EXCLUDED.audience_rosters,
                audience_groups = EXCLUDED.audience_groups,
                all_users = EXCLUDED.all_users,
                status = EXCLUDED.status,
                sent_at = EXCLUDED.sent_at,
                sending_started_at = EXCLUDED.sending_started_at,
                succeeded_count = EXCLUDED.succeeded_count,
                failed_count = EXCLUDED.failed_count,
                throttled_count = EXCLUDED.throttled_count,
                unknown_count = EXCLUDED.unknown_count,
                total_message_count = EXCLUDED.total_message_count,
                error_message = EXCLUDED.error_message,
                warning_message = EXCLUDED.warning_message
            WHERE notifications.partition = EXCLUDED.partition
            "#,
        )
        .bind(&record.id)
        .bind(record.partition)
        .bind(&record.content.title)
        .bind(&record.content.image_link)
        .bind(&record.content.summary)
        .bind(&record.content.author)
        .bind(&record.content.button_title)
        .bind(&record.content.button_link)
        .bind(&record.audience.teams)
        .bind(&record.audience.rosters)
        .bind(&record.audience.groups)
        .bind(record.audience.all_users)
        .bind(record.status)
        .bind(&record.created_by)
        .bind(record.created_at)
        .bind(record.sent_at)
        .bind(record.sending_started_at)
        .bind(record.counters.succeeded)
        .bind(record.counters.failed)
        .bind(record.counters.throttled)
        .bind(record.counters.unknown)
        .bind(record.counters.total_message_count)
        .bind(&record.error_message)
        .bind(&record.warning_message)
        .bind(&record.source_draft_id)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(partition_conflict(&record.id));
        }
        Ok(())
    }

    async fn move_draft_to_sent(&self, draft: &NotificationRecord) -> Result<String, RepoError> {
        let sent_id = new_notification_id();

        // Single statement: a concurrent or repeated send finds no draft row.
        let moved = sqlx::query_scalar::<_, String>(
            r#"
            UPDATE notifications
            SET id = $1,
                partition = 'sent',
                status = 'preparing',
                sending_started_at = now(),
                source_draft_id = $2
            WHERE id = $2 AND partition = 'draft'
            RETURNING id
            "#,
        )
        .bind(&sent_id)
        .bind(&draft.id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        moved.ok_or(RepoError::NotFound)
    }

    async fn delete(&self, record: &NotificationRecord) -> Result<(), RepoError> {
        let result = sqlx::query("DELETE FROM notifications WHERE partition = $1 AND id = $2")
            .bind(record.partition)
            .bind(&record.id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn most_recent_sent(&self, limit: u32) -> Result<Vec<NotificationRecord>, RepoError> {
        let sql = format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications \
             WHERE partition = 'sent' ORDER BY id DESC LIMIT $1"
        );
        let rows = sqlx::query_as::<_, NotificationRow>(&sql)
            .bind(i64::from(limit))
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(NotificationRecord::from).collect())
    }

    async fn all_drafts(&self) -> Result<Vec<NotificationRecord>, RepoError> {
        let sql = format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications \
             WHERE partition = 'draft' ORDER BY created_at ASC, id ASC"
        );
        let rows = sqlx::query_as::<_, NotificationRow>(&sql)
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(NotificationRecord::from).collect())
    }

    async fn update_delivery(&self, update: &DeliveryUpdate) -> Result<bool, RepoError> {
        // Terminal rows are frozen; concurrent passes can only raise counters.
        let result = sqlx::query(
            r#"
            UPDATE notifications
            SET succeeded_count = GREATEST(succeeded_count, $2),
                failed_count = GREATEST(failed_count, $3),
                throttled_count = GREATEST(throttled_count, $4),
                unknown_count = GREATEST(unknown_count, $5),
                total_message_count = GREATEST(total_message_count, $6),
                status = CASE WHEN $7 = 'preparing'::notification_status THEN status ELSE $7 END,
                sent_at = COALESCE($8, sent_at),
                warning_message = COALESCE($9, warning_message)
            WHERE id = $1
              AND partition = 'sent'
              AND status NOT IN ('sent', 'failed')
            "#,
        )
        .bind(&update.notification_id)
        .bind(update.counters.succeeded)
        .bind(update.counters.failed)
        .bind(update.counters.throttled)
        .bind(update.counters.unknown)
        .bind(update.counters.total_message_count)
        .bind(update.status)
        .bind(update.sent_at)
        .bind(&update.warning_message)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() > 0)
    }
}
