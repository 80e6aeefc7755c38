use async_trait::async_trait;
use time::OffsetDateTime;

use crate::application::repos::{AccountsRepo, RepoError};
use crate::domain::entities::AccountProfile;

use super::types::AccountRow;
use super::{PostgresRepositories, map_sqlx_error};

#[async_trait]
impl AccountsRepo for PostgresRepositories {
    async fn find_account(&self, id: i64) -> Result<Option<AccountProfile>, RepoError> {
        let row = sqlx::query_as::<_, AccountRow>(
            "SELECT id, username, avatar, status, profile_version, updated_at \
             FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(AccountProfile::from))
    }

    async fn list_changed_since(
        &self,
        since: OffsetDateTime,
    ) -> Result<Vec<AccountProfile>, RepoError> {
        let rows = sqlx::query_as::<_, AccountRow>(
            "SELECT id, username, avatar, status, profile_version, updated_at \
             FROM users WHERE updated_at > $1 ORDER BY id",
        )
        .bind(since)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(AccountProfile::from).collect())
    }
}
