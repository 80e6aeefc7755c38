use crate::application::repos::RepoError;

/// `query_canceled` covers `statement_timeout`; `lock_not_available` covers `lock_timeout`.
const CANCELLATION_CODES: [&str; 2] = ["57014", "55P03"];

fn is_cancellation(code: &str) -> bool {
    CANCELLATION_CODES.contains(&code)
}

pub fn map_sqlx_error(err: sqlx::Error) -> RepoError {
    match err {
        sqlx::Error::RowNotFound => RepoError::NotFound,
        sqlx::Error::Database(db) if db.code().is_some_and(|code| is_cancellation(&code)) => {
            RepoError::Timeout
        }
        sqlx::Error::Database(db) if db.message().contains("duplicate key") => {
            RepoError::Duplicate {
                constraint: db.constraint().unwrap_or("unknown").to_string(),
            }
        }
        sqlx::Error::Database(db)
            if db.message().contains("invalid input syntax")
                || db.message().contains("value too long") =>
        {
            RepoError::InvalidInput {
                message: db.message().to_string(),
            }
        }
        sqlx::Error::Database(db) if db.message().contains("violates") => RepoError::Integrity {
            message: db.message().to_string(),
        },
        sqlx::Error::PoolTimedOut => RepoError::Timeout,
        other => RepoError::from_persistence(other),
    }
}
