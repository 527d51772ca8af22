use std::collections::HashMap;

use async_trait::async_trait;

use crate::application::repos::{RepoError, TeamsRepo};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct TeamRow {
    team_id: String,
    name: String,
}

#[async_trait]
impl TeamsRepo for PostgresRepositories {
    async fn team_names_by_ids(&self, ids: &[String]) -> Result<Vec<String>, RepoError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query_as::<_, TeamRow>(
            "SELECT team_id, name FROM teams WHERE team_id = ANY($1)",
        )
        .bind(ids)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        let mut names: HashMap<String, String> = rows
            .into_iter()
            .map(|row| (row.team_id, row.name))
            .collect();

        // Keep the order the audience was declared in.
        Ok(ids.iter().filter_map(|id| names.remove(id)).collect())
    }
}
