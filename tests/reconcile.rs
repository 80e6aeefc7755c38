use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;
use time::OffsetDateTime;

use plaza::application::feed::FeedService;
use plaza::application::likes::LikeService;
use plaza::application::pagination::PageRequest;
use plaza::application::reconcile::ReconcileService;
use plaza::cache::{CacheConfig, CommentCache, KvStore, MemoryKvStore, comments_key};
use plaza::domain::types::SortMode;
use plaza::infra::db::PostgresRepositories;

struct Fixture {
    feed: FeedService,
    likes: LikeService,
    reconcile: ReconcileService,
    kv: Arc<MemoryKvStore>,
}

fn fixture(pool: PgPool) -> Fixture {
    let repositories = Arc::new(PostgresRepositories::new(pool));
    let config = CacheConfig::default();
    let kv = Arc::new(MemoryKvStore::new(&config));
    let cache = CommentCache::new(kv.clone(), repositories.clone(), config);
    let feed = FeedService::new(
        repositories.clone(),
        repositories.clone(),
        repositories.clone(),
        repositories.clone(),
        repositories.clone(),
        cache.clone(),
    );
    let likes = LikeService::new(
        repositories.clone(),
        repositories.clone(),
        repositories.clone(),
    );
    let reconcile = ReconcileService::new(repositories.clone(), repositories, cache)
        .with_lookback(Duration::from_secs(90));
    Fixture {
        feed,
        likes,
        reconcile,
        kv,
    }
}

async fn seed_account(pool: &PgPool, username: &str) -> i64 {
    sqlx::query_scalar("INSERT INTO users (username) VALUES ($1) RETURNING id")
        .bind(username)
        .fetch_one(pool)
        .await
        .expect("insert account")
}

async fn post_like_state(pool: &PgPool, post_id: i64) -> (i64, i64) {
    let like_count: i64 = sqlx::query_scalar("SELECT like_count FROM feed_posts WHERE id = $1")
        .bind(post_id)
        .fetch_one(pool)
        .await
        .unwrap();
    let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM post_likes WHERE post_id = $1")
        .bind(post_id)
        .fetch_one(pool)
        .await
        .unwrap();
    (like_count, rows)
}

async fn rename(pool: &PgPool, id: i64, username: &str) {
    sqlx::query(
        "UPDATE users SET username = $2, avatar = 'new.png', \
            profile_version = profile_version + 1, updated_at = now() \
         WHERE id = $1",
    )
    .bind(id)
    .bind(username)
    .execute(pool)
    .await
    .expect("rename account");
}

#[sqlx::test(migrations = "./migrations")]
async fn profile_sync_rewrites_stale_display_fields(pool: PgPool) {
    let fx = fixture(pool.clone());
    let ada = seed_account(&pool, "ada").await;
    let post = fx.feed.create_post(ada, Some("hi".into()), None).await.unwrap();
    let comment = fx
        .feed
        .create_comment(post.id, ada, "me again".into(), None)
        .await
        .unwrap();

    rename(&pool, ada, "countess").await;

    let summary = fx
        .reconcile
        .sync_profiles(OffsetDateTime::now_utc())
        .await
        .unwrap();
    assert_eq!(summary.accounts, 1);
    assert_eq!((summary.posts, summary.comments), (1, 1));

    let post = fx.feed.get_post(post.id).await.unwrap();
    assert_eq!(post.username, "countess");
    assert_eq!(post.avatar, "new.png");
    assert_eq!(post.profile_version, 2);

    let thread = fx
        .feed
        .list_comments(post.id, PageRequest::first(5).unwrap())
        .await
        .unwrap();
    assert_eq!(thread.page.items[0].id, comment.id);
    assert_eq!(thread.page.items[0].username, "countess");

    let again = fx
        .reconcile
        .sync_profiles(OffsetDateTime::now_utc())
        .await
        .unwrap();
    assert_eq!(again.posts + again.comments, 0);
}

#[sqlx::test(migrations = "./migrations")]
async fn profile_sync_ignores_old_changes(pool: PgPool) {
    let fx = fixture(pool.clone());
    let ada = seed_account(&pool, "ada").await;
    fx.feed.create_post(ada, Some("hi".into()), None).await.unwrap();
    rename(&pool, ada, "countess").await;

    let later = OffsetDateTime::now_utc() + time::Duration::hours(1);
    let summary = fx.reconcile.sync_profiles(later).await.unwrap();
    assert_eq!(summary.accounts, 0);
}

#[sqlx::test(migrations = "./migrations")]
async fn orphan_cleanup_removes_dangling_rows_and_repairs_counters(pool: PgPool) {
    let fx = fixture(pool.clone());
    let gone = seed_account(&pool, "gone").await;
    let kept = seed_account(&pool, "kept").await;

    let doomed = fx.feed.create_post(gone, Some("bye".into()), None).await.unwrap();
    let survivor = fx.feed.create_post(kept, Some("stay".into()), None).await.unwrap();
    fx.feed
        .create_comment(doomed.id, kept, "on doomed".into(), None)
        .await
        .unwrap();
    let gone_comment = fx
        .feed
        .create_comment(survivor.id, gone, "by gone".into(), None)
        .await
        .unwrap();
    fx.feed
        .create_comment(survivor.id, kept, "by kept".into(), None)
        .await
        .unwrap();
    fx.likes.set_post_like(survivor.id, gone, true).await.unwrap();
    fx.likes.set_post_like(survivor.id, kept, true).await.unwrap();
    fx.likes.set_comment_like(gone_comment.id, kept, true).await.unwrap();

    sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(gone)
        .execute(&pool)
        .await
        .unwrap();

    let report = fx.reconcile.cleanup_orphans().await.unwrap();
    assert_eq!(report.posts, 1);
    assert_eq!(report.comments, 2);
    assert_eq!(report.post_likes, 1);
    assert_eq!(report.comment_likes, 1);
    assert_eq!(report.repaired_posts, 1);

    let survivor = fx.feed.get_post(survivor.id).await.unwrap();
    assert_eq!(survivor.like_count, 1);
    assert_eq!(survivor.comment_count, 1);

    let again = fx.reconcile.cleanup_orphans().await.unwrap();
    assert!(again.is_empty());
}

#[sqlx::test(migrations = "./migrations")]
async fn orphan_cleanup_keeps_likes_committed_while_it_runs(pool: PgPool) {
    let fx = fixture(pool.clone());
    let gone = seed_account(&pool, "gone").await;
    let kept = seed_account(&pool, "kept").await;
    let viewer = seed_account(&pool, "viewer").await;

    let post = fx.feed.create_post(kept, Some("stay".into()), None).await.unwrap();
    fx.likes.set_post_like(post.id, gone, true).await.unwrap();
    sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(gone)
        .execute(&pool)
        .await
        .unwrap();

    // A like transaction that is still open when cleanup reaches the post.
    let mut like_tx = pool.begin().await.unwrap();
    sqlx::query("INSERT INTO post_likes (post_id, owner_id) VALUES ($1, $2)")
        .bind(post.id)
        .bind(viewer)
        .execute(&mut *like_tx)
        .await
        .unwrap();
    sqlx::query("UPDATE feed_posts SET like_count = like_count + 1 WHERE id = $1")
        .bind(post.id)
        .execute(&mut *like_tx)
        .await
        .unwrap();

    let reconcile = fx.reconcile.clone();
    let cleanup = tokio::spawn(async move { reconcile.cleanup_orphans().await });
    tokio::time::sleep(Duration::from_millis(200)).await;
    like_tx.commit().await.unwrap();

    let report = cleanup.await.expect("cleanup task").unwrap();
    assert_eq!(report.post_likes, 1);
    assert_eq!(post_like_state(&pool, post.id).await, (1, 1));

    let again = fx.reconcile.cleanup_orphans().await.unwrap();
    assert!(again.is_empty());
}

#[sqlx::test(migrations = "./migrations")]
async fn orphan_cleanup_repairs_drifted_counters(pool: PgPool) {
    let fx = fixture(pool.clone());
    let ada = seed_account(&pool, "ada").await;
    let bob = seed_account(&pool, "bob").await;
    let post = fx.feed.create_post(ada, Some("hi".into()), None).await.unwrap();
    let comment = fx
        .feed
        .create_comment(post.id, bob, "yo".into(), None)
        .await
        .unwrap();
    fx.likes.set_post_like(post.id, bob, true).await.unwrap();
    fx.likes.set_comment_like(comment.id, ada, true).await.unwrap();

    sqlx::query("UPDATE feed_posts SET like_count = 9, comment_count = 0 WHERE id = $1")
        .bind(post.id)
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query("UPDATE feed_comments SET like_count = 0 WHERE id = $1")
        .bind(comment.id)
        .execute(&pool)
        .await
        .unwrap();

    let report = fx.reconcile.cleanup_orphans().await.unwrap();
    assert_eq!(report.removed_total(), 0);
    assert_eq!((report.repaired_posts, report.repaired_comments), (1, 1));

    let repaired = fx.feed.get_post(post.id).await.unwrap();
    assert_eq!((repaired.like_count, repaired.comment_count), (1, 1));
    let comment_likes: i64 = sqlx::query_scalar("SELECT like_count FROM feed_comments WHERE id = $1")
        .bind(comment.id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(comment_likes, 1);
}

#[sqlx::test(migrations = "./migrations")]
async fn full_cleanup_drops_every_cached_preview(pool: PgPool) {
    let fx = fixture(pool.clone());
    let ada = seed_account(&pool, "ada").await;
    for n in 0..3 {
        let post = fx
            .feed
            .create_post(ada, Some(format!("post {n}")), None)
            .await
            .unwrap();
        fx.feed
            .create_comment(post.id, ada, "first".into(), None)
            .await
            .unwrap();
    }
    fx.feed.cache().wait_idle().await;

    let page = fx
        .feed
        .list_posts(SortMode::Time, PageRequest::first(10).unwrap(), 2)
        .await
        .unwrap();
    assert!(page.items.iter().all(|item| item.preview.len() == 1));
    let first_id = page.items[0].post.id;
    assert!(fx.kv.get(&comments_key(first_id)).await.unwrap().is_some());

    let summary = fx.reconcile.full_cleanup().await.unwrap();
    assert_eq!(summary.purged_keys, 3);
    assert!(summary.orphans.is_empty());
    assert!(fx.kv.is_empty());
}
