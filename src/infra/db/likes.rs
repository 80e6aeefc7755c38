use async_trait::async_trait;

use crate::application::repos::{LikesRepo, RepoError};

use super::{PostgresRepositories, map_sqlx_error};

/// Join table and counter owner of one likeable entity.
#[derive(Debug, Clone, Copy)]
enum LikeTarget {
    Post,
    Comment,
}

impl LikeTarget {
    fn join_table(self) -> &'static str {
        match self {
            LikeTarget::Post => "post_likes",
            LikeTarget::Comment => "comment_likes",
        }
    }

    fn join_column(self) -> &'static str {
        match self {
            LikeTarget::Post => "post_id",
            LikeTarget::Comment => "comment_id",
        }
    }

    fn unique_constraint(self) -> &'static str {
        match self {
            LikeTarget::Post => "post_likes_post_owner_key",
            LikeTarget::Comment => "comment_likes_comment_owner_key",
        }
    }

    fn parent_table(self) -> &'static str {
        match self {
            LikeTarget::Post => "feed_posts",
            LikeTarget::Comment => "feed_comments",
        }
    }
}

impl PostgresRepositories {
    async fn liked(&self, target: LikeTarget, id: i64, owner_id: i64) -> Result<bool, RepoError> {
        let sql = format!(
            "SELECT EXISTS (SELECT 1 FROM {table} WHERE {column} = $1 AND owner_id = $2)",
            table = target.join_table(),
            column = target.join_column(),
        );
        sqlx::query_scalar::<_, bool>(&sql)
            .bind(id)
            .bind(owner_id)
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)
    }

    /// Write the join row transition and move the parent counter by one in a
    /// single transaction. Returns `false` without writing anything when the
    /// join row was already in the requested state.
    async fn apply_like(
        &self,
        target: LikeTarget,
        id: i64,
        owner_id: i64,
        liked: bool,
    ) -> Result<bool, RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        let transition = if liked {
            format!(
                "INSERT INTO {table} ({column}, owner_id) VALUES ($1, $2) \
                 ON CONFLICT ON CONSTRAINT {constraint} DO NOTHING",
                table = target.join_table(),
                column = target.join_column(),
                constraint = target.unique_constraint(),
            )
        } else {
            format!(
                "DELETE FROM {table} WHERE {column} = $1 AND owner_id = $2",
                table = target.join_table(),
                column = target.join_column(),
            )
        };
        let moved = sqlx::query(&transition)
            .bind(id)
            .bind(owner_id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        if moved.rows_affected() == 0 {
            return Ok(false);
        }

        let delta: i64 = if liked { 1 } else { -1 };
        let counter = format!(
            "UPDATE {table} SET like_count = like_count + $2 WHERE id = $1",
            table = target.parent_table(),
        );
        let updated = sqlx::query(&counter)
            .bind(id)
            .bind(delta)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        if updated.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(true)
    }
}

#[async_trait]
impl LikesRepo for PostgresRepositories {
    async fn post_liked(&self, post_id: i64, owner_id: i64) -> Result<bool, RepoError> {
        self.liked(LikeTarget::Post, post_id, owner_id).await
    }

    async fn comment_liked(&self, comment_id: i64, owner_id: i64) -> Result<bool, RepoError> {
        self.liked(LikeTarget::Comment, comment_id, owner_id).await
    }

    async fn apply_post_like(
        &self,
        post_id: i64,
        owner_id: i64,
        liked: bool,
    ) -> Result<bool, RepoError> {
        self.apply_like(LikeTarget::Post, post_id, owner_id, liked)
            .await
    }

    async fn apply_comment_like(
        &self,
        comment_id: i64,
        owner_id: i64,
        liked: bool,
    ) -> Result<bool, RepoError> {
        self.apply_like(LikeTarget::Comment, comment_id, owner_id, liked)
            .await
    }
}
