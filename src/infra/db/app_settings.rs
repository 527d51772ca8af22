use async_trait::async_trait;

use crate::application::repos::{AppSettingsRepo, RepoError};

use super::{PostgresRepositories, map_sqlx_error};

const USER_APP_ID_KEY: &str = "user_app_id";

#[async_trait]
impl AppSettingsRepo for PostgresRepositories {
    async fn user_app_id(&self) -> Result<Option<String>, RepoError> {
        sqlx::query_scalar::<_, String>("SELECT value FROM app_settings WHERE key = $1")
            .bind(USER_APP_ID_KEY)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)
    }

    async fn set_user_app_id(&self, app_id: &str) -> Result<(), RepoError> {
        sqlx::query(
            r#"
            INSERT INTO app_settings (key, value, updated_at)
            VALUES ($1, $2, now())
            ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = now()
            "#,
        )
        .bind(USER_APP_ID_KEY)
        .bind(app_id)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }
}
