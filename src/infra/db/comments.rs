use async_trait::async_trait;
use sqlx::QueryBuilder;

use crate::application::pagination::{CursorPage, PageRequest};
use crate::application::repos::{
    CommentsRepo, CommentsWriteRepo, CreateCommentParams, RepoError,
};
use crate::domain::entities::CommentRecord;

use super::types::CommentRow;
use super::{COMMENT_COLUMNS, PostgresRepositories, map_sqlx_error, strip_cursor};

#[async_trait]
impl CommentsRepo for PostgresRepositories {
    async fn find_comment(&self, id: i64) -> Result<Option<CommentRecord>, RepoError> {
        let sql = format!("SELECT {COMMENT_COLUMNS} FROM feed_comments c WHERE c.id = $1");
        let row = sqlx::query_as::<_, CommentRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(CommentRecord::from))
    }

    async fn list_comments(
        &self,
        post_id: i64,
        page: PageRequest,
    ) -> Result<CursorPage<CommentRecord>, RepoError> {
        let mut qb = QueryBuilder::new("SELECT ");
        qb.push(COMMENT_COLUMNS);
        qb.push(" FROM feed_comments c WHERE c.post_id = ");
        qb.push_bind(post_id);

        // `<=` makes the cursor row lead the page. A cursor from another post
        // is filtered out by `post_id` and rejected below.
        if let Some(cursor) = page.after_id {
            qb.push(
                " AND (c.created_at, c.id) <= (SELECT k.created_at, k.id FROM feed_comments k WHERE k.id = ",
            );
            qb.push_bind(cursor);
            qb.push(")");
        }

        qb.push(" ORDER BY c.created_at DESC, c.id DESC LIMIT ");
        qb.push_bind(page.fetch_limit() + i64::from(page.after_id.is_some()));

        let rows = qb
            .build_query_as::<CommentRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        let mut records: Vec<CommentRecord> =
            rows.into_iter().map(CommentRecord::from).collect();
        if let Some(cursor) = page.after_id {
            records = strip_cursor(records, cursor, |comment| comment.id)?;
        }
        Ok(CursorPage::from_overfetch(records, page.limit, |comment| {
            comment.id
        }))
    }

    async fn count_comments(&self, post_id: i64) -> Result<i64, RepoError> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM feed_comments WHERE post_id = $1")
            .bind(post_id)
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)
    }

    async fn latest_comments(
        &self,
        post_id: i64,
        limit: u32,
    ) -> Result<Vec<CommentRecord>, RepoError> {
        let sql = format!(
            "SELECT {COMMENT_COLUMNS} FROM feed_comments c WHERE c.post_id = $1 \
             ORDER BY c.created_at DESC, c.id DESC LIMIT $2"
        );
        let rows = sqlx::query_as::<_, CommentRow>(&sql)
            .bind(post_id)
            .bind(i64::from(limit))
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(CommentRecord::from).collect())
    }
}

#[async_trait]
impl CommentsWriteRepo for PostgresRepositories {
    async fn create_comment(
        &self,
        params: CreateCommentParams,
    ) -> Result<CommentRecord, RepoError> {
        let CreateCommentParams {
            post_id,
            owner_id,
            username,
            avatar,
            profile_version,
            content,
            reply_to,
        } = params;

        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        // Bumping the counter first locks the post row for the rest of the
        // transaction, so cleanup cannot remove it underneath the insert.
        let bumped =
            sqlx::query("UPDATE feed_posts SET comment_count = comment_count + 1 WHERE id = $1")
                .bind(post_id)
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;
        if bumped.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }

        let sql = format!(
            "INSERT INTO feed_comments AS c \
                (post_id, owner_id, username, avatar, content, reply_to, profile_version) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {COMMENT_COLUMNS}"
        );
        let row = sqlx::query_as::<_, CommentRow>(&sql)
            .bind(post_id)
            .bind(owner_id)
            .bind(username)
            .bind(avatar)
            .bind(content)
            .bind(reply_to)
            .bind(profile_version)
            .fetch_one(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(CommentRecord::from(row))
    }
}
