use async_trait::async_trait;
use time::OffsetDateTime;

use crate::{
    application::repos::{ExportsRepo, RepoError},
    domain::entities::ExportRecord,
};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct ExportRow {
    user_id: String,
    notification_id: String,
    status: String,
    file_name: Option<String>,
    sent_at: Option<OffsetDateTime>,
}

impl From<ExportRow> for ExportRecord {
    fn from(row: ExportRow) -> Self {
        Self {
            user_id: row.user_id,
            notification_id: row.notification_id,
            status: row.status,
            file_name: row.file_name,
            sent_at: row.sent_at,
        }
    }
}

#[async_trait]
impl ExportsRepo for PostgresRepositories {
    async fn find_export(
        &self,
        user_id: &str,
        notification_id: &str,
    ) -> Result<Option<ExportRecord>, RepoError> {
        let row = sqlx::query_as::<_, ExportRow>(
            r#"
            SELECT user_id, notification_id, status, file_name, sent_at
            FROM exports
            WHERE user_id = $1 AND notification_id = $2
            "#,
        )
        .bind(user_id)
        .bind(notification_id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(ExportRecord::from))
    }
}
