use crate::application::repos::RepoError;

// Postgres SQLSTATE codes raised by the notification schema.
const UNIQUE_VIOLATION: &str = "23505";
const CHECK_VIOLATION: &str = "23514";
const NOT_NULL_VIOLATION: &str = "23502";
const INVALID_TEXT_REPRESENTATION: &str = "22P02";
const QUERY_CANCELED: &str = "57014";
const LOCK_NOT_AVAILABLE: &str = "55P03";

pub fn map_sqlx_error(err: sqlx::Error) -> RepoError {
    match err {
        sqlx::Error::RowNotFound => RepoError::NotFound,
        sqlx::Error::PoolTimedOut => RepoError::Timeout,
        sqlx::Error::Database(db) => {
            let message = db.message().to_string();
            match db.code().as_deref() {
                Some(UNIQUE_VIOLATION) => RepoError::Duplicate {
                    constraint: db.constraint().unwrap_or("unknown").to_string(),
                },
                // Negative counters and unknown status or partition labels.
                Some(CHECK_VIOLATION | NOT_NULL_VIOLATION | INVALID_TEXT_REPRESENTATION) => {
                    RepoError::InvalidInput { message }
                }
                Some(QUERY_CANCELED | LOCK_NOT_AVAILABLE) => RepoError::Timeout,
                Some(code) if code.starts_with("23") => RepoError::Integrity { message },
                _ => RepoError::Persistence(message),
            }
        }
        other => RepoError::from_persistence(other),
    }
}

/// An upsert matched a row with the same id in the other partition.
pub fn partition_conflict(id: &str) -> RepoError {
    RepoError::Integrity {
        message: format!("notification `{id}` exists in another partition"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_and_row_errors_map_to_repo_errors() {
        assert!(matches!(
            map_sqlx_error(sqlx::Error::RowNotFound),
            RepoError::NotFound
        ));
        assert!(matches!(
            map_sqlx_error(sqlx::Error::PoolTimedOut),
            RepoError::Timeout
        ));
        assert!(matches!(
            map_sqlx_error(sqlx::Error::PoolClosed),
            RepoError::Persistence(_)
        ));
    }

    #[test]
    fn partition_conflict_names_the_notification() {
        match partition_conflict("n-1") {
            RepoError::Integrity { message } => {
                assert_eq!(message, "notification `n-1` exists in another partition")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
