//! Postgres-backed repository implementations.

mod accounts;
mod comments;
mod likes;
mod posts;
mod reconcile;
mod types;
mod util;

pub use util::map_sqlx_error;

use std::sync::Arc;
use std::time::Duration;

use sqlx::{
    Postgres, QueryBuilder, Transaction,
    postgres::{PgConnectOptions, PgPool, PgPoolOptions},
    query,
};

use crate::application::pagination::PaginationError;
use crate::application::repos::RepoError;
use crate::domain::types::SortMode;

const POST_COLUMNS: &str = "p.id, p.owner_id, p.username, p.avatar, p.status, p.content, \
    p.image_url, p.like_count, p.comment_count, p.profile_version, p.created_at, p.updated_at";

const COMMENT_COLUMNS: &str = "c.id, c.post_id, c.owner_id, c.username, c.avatar, c.content, \
    c.reply_to, c.like_count, c.profile_version, c.created_at, c.updated_at";

#[derive(Clone)]
pub struct PostgresRepositories {
    pool: Arc<PgPool>,
}

impl PostgresRepositories {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn begin(&self) -> Result<Transaction<'_, Postgres>, sqlx::Error> {
        self.pool.begin().await
    }

    pub async fn connect(
        url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
        statement_timeout: Duration,
    ) -> Result<PgPool, sqlx::Error> {
        let options = url.parse::<PgConnectOptions>()?;
        Self::connect_with(options, max_connections, acquire_timeout, statement_timeout).await
    }

    pub async fn connect_with(
        options: PgConnectOptions,
        max_connections: u32,
        acquire_timeout: Duration,
        statement_timeout: Duration,
    ) -> Result<PgPool, sqlx::Error> {
        PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect_with(with_statement_deadline(options, statement_timeout))
            .await
    }

    pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations")
            .run(pool)
            .await
            .map_err(Into::into)
    }

    pub async fn health_check(&self) -> Result<(), sqlx::Error> {
        query("SELECT 1").execute(self.pool()).await.map(|_| ())
    }

    fn push_sort_column<'q>(qb: &mut QueryBuilder<'q, Postgres>, alias: &str, sort: SortMode) {
        qb.push(alias);
        qb.push(match sort {
            SortMode::Time => ".created_at",
            SortMode::Like => ".like_count",
            SortMode::Comment => ".comment_count",
        });
    }
}

/// Make the server cancel any statement, or any wait for a row lock, that runs
/// past `timeout`. Both surface as `RepoError::Timeout`.
pub fn with_statement_deadline(options: PgConnectOptions, timeout: Duration) -> PgConnectOptions {
    let millis = timeout.as_millis().to_string();
    options.options([
        ("statement_timeout", millis.as_str()),
        ("lock_timeout", millis.as_str()),
    ])
}

/// Cursor pages are read with `<=`, so the cursor row itself leads the result.
/// Anything else means the cursor is gone or belongs to another listing.
fn strip_cursor<T>(
    mut rows: Vec<T>,
    cursor: i64,
    id: impl Fn(&T) -> i64,
) -> Result<Vec<T>, RepoError> {
    match rows.first() {
        Some(first) if id(first) == cursor => {
            rows.remove(0);
            Ok(rows)
        }
        _ => Err(PaginationError::InvalidCursor(cursor).into()),
    }
}
