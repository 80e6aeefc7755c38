use std::collections::BTreeSet;

use async_trait::async_trait;
use sqlx::PgConnection;

use crate::application::repos::{
    OrphanCleanupReport, ProfileSyncCounts, ReconcileRepo, RepoError,
};
use crate::domain::entities::AccountProfile;

use super::{PostgresRepositories, map_sqlx_error};

/// Run in this order inside one transaction: comments, posts, likes, then
/// drift repair on whatever survived. Deletions move the surviving parent
/// counters by the number of rows removed instead of recounting, so a like or
/// comment committed while cleanup runs is never overwritten.
const DELETE_ORPHAN_COMMENTS: &str = "WITH gone AS ( \
        DELETE FROM feed_comments c \
        WHERE NOT EXISTS (SELECT 1 FROM users u WHERE u.id = c.owner_id) \
           OR NOT EXISTS ( \
                SELECT 1 FROM feed_posts p \
                JOIN users pu ON pu.id = p.owner_id \
                WHERE p.id = c.post_id) \
        RETURNING c.post_id), \
    per_post AS (SELECT post_id, COUNT(*) AS n FROM gone GROUP BY post_id), \
    adjusted AS ( \
        UPDATE feed_posts p \
        SET comment_count = GREATEST(p.comment_count - per_post.n, 0) \
        FROM per_post WHERE p.id = per_post.post_id \
        RETURNING p.id) \
    SELECT (SELECT COUNT(*) FROM gone) AS removed, ARRAY(SELECT id FROM adjusted) AS adjusted";

const DELETE_ORPHAN_POSTS: &str = "DELETE FROM feed_posts p \
    WHERE NOT EXISTS (SELECT 1 FROM users u WHERE u.id = p.owner_id) \
    RETURNING p.id";

const DELETE_ORPHAN_POST_LIKES: &str = "WITH gone AS ( \
        DELETE FROM post_likes l \
        WHERE NOT EXISTS (SELECT 1 FROM feed_posts p WHERE p.id = l.post_id) \
           OR NOT EXISTS (SELECT 1 FROM users u WHERE u.id = l.owner_id) \
        RETURNING l.post_id), \
    per_post AS (SELECT post_id, COUNT(*) AS n FROM gone GROUP BY post_id), \
    adjusted AS ( \
        UPDATE feed_posts p \
        SET like_count = GREATEST(p.like_count - per_post.n, 0) \
        FROM per_post WHERE p.id = per_post.post_id \
        RETURNING p.id) \
    SELECT (SELECT COUNT(*) FROM gone) AS removed, ARRAY(SELECT id FROM adjusted) AS adjusted";

const DELETE_ORPHAN_COMMENT_LIKES: &str = "WITH gone AS ( \
        DELETE FROM comment_likes l \
        WHERE NOT EXISTS (SELECT 1 FROM feed_comments c WHERE c.id = l.comment_id) \
           OR NOT EXISTS (SELECT 1 FROM users u WHERE u.id = l.owner_id) \
        RETURNING l.comment_id), \
    per_comment AS (SELECT comment_id, COUNT(*) AS n FROM gone GROUP BY comment_id), \
    adjusted AS ( \
        UPDATE feed_comments c \
        SET like_count = GREATEST(c.like_count - per_comment.n, 0) \
        FROM per_comment WHERE c.id = per_comment.comment_id \
        RETURNING c.id) \
    SELECT (SELECT COUNT(*) FROM gone) AS removed, ARRAY(SELECT id FROM adjusted) AS adjusted";

/// Drift repair locks its candidates first. The recount that follows is a new
/// statement, so under read committed it sees every write committed before the
/// locks were granted, and writers that touch these rows later wait for us.
const LOCK_DRIFTED_POSTS: &str = "SELECT p.id FROM feed_posts p \
    WHERE p.like_count <> (SELECT COUNT(*) FROM post_likes l WHERE l.post_id = p.id) \
       OR p.comment_count <> (SELECT COUNT(*) FROM feed_comments c WHERE c.post_id = p.id) \
    ORDER BY p.id \
    FOR UPDATE";

const REPAIR_POST_COUNTERS: &str = "WITH actual AS ( \
        SELECT p.id, \
               (SELECT COUNT(*) FROM post_likes l WHERE l.post_id = p.id) AS likes, \
               (SELECT COUNT(*) FROM feed_comments c WHERE c.post_id = p.id) AS comments \
        FROM feed_posts p \
        WHERE p.id = ANY($1)) \
    UPDATE feed_posts p \
    SET like_count = a.likes, comment_count = a.comments \
    FROM actual a \
    WHERE a.id = p.id AND (p.like_count <> a.likes OR p.comment_count <> a.comments) \
    RETURNING p.id";

const LOCK_DRIFTED_COMMENTS: &str = "SELECT c.id FROM feed_comments c \
    WHERE c.like_count <> (SELECT COUNT(*) FROM comment_likes l WHERE l.comment_id = c.id) \
    ORDER BY c.id \
    FOR UPDATE";

const REPAIR_COMMENT_COUNTERS: &str = "WITH actual AS ( \
        SELECT c.id, \
               (SELECT COUNT(*) FROM comment_likes l WHERE l.comment_id = c.id) AS likes \
        FROM feed_comments c \
        WHERE c.id = ANY($1)) \
    UPDATE feed_comments c \
    SET like_count = a.likes \
    FROM actual a \
    WHERE a.id = c.id AND c.like_count <> a.likes \
    RETURNING c.id";

/// Returns the number of rows deleted and the ids of the parents whose
/// counters were moved.
async fn delete_and_adjust(
    conn: &mut PgConnection,
    statement: &'static str,
) -> Result<(u64, Vec<i64>), RepoError> {
    let (removed, adjusted): (i64, Vec<i64>) = sqlx::query_as(statement)
        .fetch_one(conn)
        .await
        .map_err(map_sqlx_error)?;
    Ok((u64::try_from(removed).unwrap_or_default(), adjusted))
}

async fn repair_drift(
    conn: &mut PgConnection,
    lock: &'static str,
    repair: &'static str,
) -> Result<Vec<i64>, RepoError> {
    let candidates: Vec<i64> = sqlx::query_scalar(lock)
        .fetch_all(&mut *conn)
        .await
        .map_err(map_sqlx_error)?;
    if candidates.is_empty() {
        return Ok(Vec::new());
    }
    sqlx::query_scalar(repair)
        .bind(candidates.as_slice())
        .fetch_all(&mut *conn)
        .await
        .map_err(map_sqlx_error)
}

#[async_trait]
impl ReconcileRepo for PostgresRepositories {
    async fn sync_profile(&self, profile: &AccountProfile) -> Result<ProfileSyncCounts, RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        let posts = sqlx::query(
            "UPDATE feed_posts \
             SET username = $2, avatar = $3, status = $4, profile_version = $5, updated_at = now() \
             WHERE owner_id = $1 AND profile_version < $5",
        )
        .bind(profile.id)
        .bind(&profile.username)
        .bind(&profile.avatar)
        .bind(&profile.status)
        .bind(profile.profile_version)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        let comments = sqlx::query(
            "UPDATE feed_comments \
             SET username = $2, avatar = $3, profile_version = $4, updated_at = now() \
             WHERE owner_id = $1 AND profile_version < $4",
        )
        .bind(profile.id)
        .bind(&profile.username)
        .bind(&profile.avatar)
        .bind(profile.profile_version)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;

        Ok(ProfileSyncCounts {
            posts: posts.rows_affected(),
            comments: comments.rows_affected(),
        })
    }

    async fn cleanup_orphans(&self) -> Result<OrphanCleanupReport, RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;
        let mut report = OrphanCleanupReport::default();
        let mut touched_posts = BTreeSet::new();
        let mut touched_comments = BTreeSet::new();

        let (removed, adjusted) = delete_and_adjust(&mut *tx, DELETE_ORPHAN_COMMENTS).await?;
        report.comments = removed;
        touched_posts.extend(adjusted);

        let deleted_posts: Vec<i64> = sqlx::query_scalar(DELETE_ORPHAN_POSTS)
            .fetch_all(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        report.posts = deleted_posts.len() as u64;

        let (removed, adjusted) = delete_and_adjust(&mut *tx, DELETE_ORPHAN_POST_LIKES).await?;
        report.post_likes = removed;
        touched_posts.extend(adjusted);

        let (removed, adjusted) =
            delete_and_adjust(&mut *tx, DELETE_ORPHAN_COMMENT_LIKES).await?;
        report.comment_likes = removed;
        touched_comments.extend(adjusted);

        let repaired = repair_drift(&mut *tx, LOCK_DRIFTED_POSTS, REPAIR_POST_COUNTERS).await?;
        touched_posts.extend(repaired);
        let repaired =
            repair_drift(&mut *tx, LOCK_DRIFTED_COMMENTS, REPAIR_COMMENT_COUNTERS).await?;
        touched_comments.extend(repaired);

        for id in &deleted_posts {
            touched_posts.remove(id);
        }
        report.repaired_posts = touched_posts.len() as u64;
        report.repaired_comments = touched_comments.len() as u64;

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(report)
    }
}
