use async_trait::async_trait;
use sqlx::QueryBuilder;

use crate::application::pagination::{CursorPage, PageRequest};
use crate::application::repos::{CreatePostParams, PostsRepo, PostsWriteRepo, RepoError};
use crate::domain::entities::PostRecord;
use crate::domain::types::SortMode;

use super::types::PostRow;
use super::{POST_COLUMNS, PostgresRepositories, map_sqlx_error, strip_cursor};

#[async_trait]
impl PostsRepo for PostgresRepositories {
    async fn find_post(&self, id: i64) -> Result<Option<PostRecord>, RepoError> {
        let sql = format!("SELECT {POST_COLUMNS} FROM feed_posts p WHERE p.id = $1");
        let row = sqlx::query_as::<_, PostRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(PostRecord::from))
    }

    async fn list_posts(
        &self,
        sort: SortMode,
        page: PageRequest,
    ) -> Result<CursorPage<PostRecord>, RepoError> {
        let mut qb = QueryBuilder::new("SELECT ");
        qb.push(POST_COLUMNS);
        qb.push(" FROM feed_posts p");

        // The cursor row's key is re-read so the page continues strictly
        // after it even when its counters moved since the last page. `<=`
        // brings the cursor row back first, which proves it still exists in
        // the snapshot the page was read from.
        if let Some(cursor) = page.after_id {
            qb.push(" WHERE (");
            Self::push_sort_column(&mut qb, "p", sort);
            qb.push(", p.id) <= (SELECT ");
            Self::push_sort_column(&mut qb, "k", sort);
            qb.push(", k.id FROM feed_posts k WHERE k.id = ");
            qb.push_bind(cursor);
            qb.push(")");
        }

        qb.push(" ORDER BY ");
        Self::push_sort_column(&mut qb, "p", sort);
        qb.push(" DESC, p.id DESC LIMIT ");
        qb.push_bind(page.fetch_limit() + i64::from(page.after_id.is_some()));

        let rows = qb
            .build_query_as::<PostRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        let mut records: Vec<PostRecord> = rows.into_iter().map(PostRecord::from).collect();
        if let Some(cursor) = page.after_id {
            records = strip_cursor(records, cursor, |post| post.id)?;
        }
        Ok(CursorPage::from_overfetch(records, page.limit, |post| {
            post.id
        }))
    }
}

#[async_trait]
impl PostsWriteRepo for PostgresRepositories {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError> {
        let CreatePostParams {
            owner_id,
            username,
            avatar,
            status,
            profile_version,
            content,
            image_url,
        } = params;

        let sql = format!(
            "INSERT INTO feed_posts AS p \
                (owner_id, username, avatar, status, content, image_url, profile_version) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {POST_COLUMNS}"
        );
        let row = sqlx::query_as::<_, PostRow>(&sql)
            .bind(owner_id)
            .bind(username)
            .bind(avatar)
            .bind(status)
            .bind(content)
            .bind(image_url)
            .bind(profile_version)
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(PostRecord::from(row))
    }
}
