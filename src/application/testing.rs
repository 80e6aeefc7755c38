//! In-memory repositories for service-level unit tests.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use time::{Duration, OffsetDateTime};
use tokio::sync::Mutex;

use crate::application::feed::FeedService;
use crate::application::likes::LikeService;
use crate::application::pagination::{CursorPage, PageRequest, PaginationError};
use crate::application::reconcile::ReconcileService;
use crate::application::repos::{
    AccountsRepo, CommentsRepo, CommentsWriteRepo, CreateCommentParams, CreatePostParams,
    LikesRepo, OrphanCleanupReport, PostsRepo, PostsWriteRepo, ProfileSyncCounts, ReconcileRepo,
    RepoError,
};
use crate::cache::{CacheConfig, CommentCache, KvStore, MemoryKvStore};
use crate::domain::entities::{AccountProfile, CommentRecord, PostRecord};
use crate::domain::types::SortMode;

#[derive(Default)]
struct State {
    clock: i64,
    next_id: i64,
    accounts: BTreeMap<i64, AccountProfile>,
    posts: BTreeMap<i64, PostRecord>,
    comments: BTreeMap<i64, CommentRecord>,
    post_likes: BTreeSet<(i64, i64)>,
    comment_likes: BTreeSet<(i64, i64)>,
    hide_post_like_probe: bool,
}

impl State {
    fn tick(&mut self) -> OffsetDateTime {
        self.clock += 1;
        self.now()
    }

    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::UNIX_EPOCH + Duration::days(20_000) + Duration::seconds(self.clock)
    }

    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Clone)]
pub(crate) struct InMemoryFeed {
    state: Arc<Mutex<State>>,
    kv: Arc<MemoryKvStore>,
}

impl InMemoryFeed {
    pub(crate) fn new() -> Self {
        Self {
            state: Arc::default(),
            kv: Arc::new(MemoryKvStore::new(&CacheConfig::default())),
        }
    }

    pub(crate) fn kv(&self) -> Arc<MemoryKvStore> {
        self.kv.clone()
    }

    pub(crate) fn comment_cache(&self) -> CommentCache {
        let store: Arc<dyn KvStore> = self.kv();
        CommentCache::new(store, Arc::new(self.clone()), CacheConfig::default())
    }

    pub(crate) fn feed_service(&self) -> FeedService {
        let repo = Arc::new(self.clone());
        FeedService::new(
            repo.clone(),
            repo.clone(),
            repo.clone(),
            repo.clone(),
            repo,
            self.comment_cache(),
        )
    }

    pub(crate) fn like_service(&self) -> LikeService {
        let repo = Arc::new(self.clone());
        LikeService::new(repo.clone(), repo.clone(), repo)
    }

    pub(crate) fn reconcile_service(&self) -> ReconcileService {
        let repo = Arc::new(self.clone());
        ReconcileService::new(repo.clone(), repo, self.comment_cache())
    }

    /// The fake clock's current reading; every write advances it by a second.
    pub(crate) async fn now(&self) -> OffsetDateTime {
        self.state.lock().await.now()
    }

    pub(crate) async fn add_account(&self, username: &str) -> i64 {
        let mut state = self.state.lock().await;
        let id = state.next_id();
        let updated_at = state.tick();
        state.accounts.insert(
            id,
            AccountProfile {
                id,
                username: username.to_string(),
                avatar: String::new(),
                status: String::new(),
                profile_version: 1,
                updated_at,
            },
        );
        id
    }

    /// Simulate the account service renaming a user.
    pub(crate) async fn rename_account(&self, id: i64, username: &str) {
        let mut state = self.state.lock().await;
        let updated_at = state.tick();
        if let Some(account) = state.accounts.get_mut(&id) {
            account.username = username.to_string();
            account.profile_version += 1;
            account.updated_at = updated_at;
        }
    }

    pub(crate) async fn remove_account(&self, id: i64) {
        self.state.lock().await.accounts.remove(&id);
    }

    pub(crate) async fn add_post(&self, owner_id: i64) -> i64 {
        self.create_post(CreatePostParams {
            owner_id,
            username: "seed".into(),
            avatar: String::new(),
            status: String::new(),
            profile_version: 1,
            content: Some("seed".into()),
            image_url: None,
        })
        .await
        .map(|post| post.id)
        .unwrap_or_default()
    }

    pub(crate) async fn add_comment(&self, post_id: i64, owner_id: i64) -> i64 {
        self.create_comment(CreateCommentParams {
            post_id,
            owner_id,
            username: "seed".into(),
            avatar: String::new(),
            profile_version: 1,
            content: "seed".into(),
            reply_to: None,
        })
        .await
        .map(|comment| comment.id)
        .unwrap_or_default()
    }

    pub(crate) async fn post(&self, id: i64) -> PostRecord {
        self.state.lock().await.posts[&id].clone()
    }

    pub(crate) async fn comment(&self, id: i64) -> CommentRecord {
        self.state.lock().await.comments[&id].clone()
    }

    pub(crate) async fn has_post(&self, id: i64) -> bool {
        self.state.lock().await.posts.contains_key(&id)
    }

    pub(crate) async fn post_like_rows(&self, post_id: i64) -> usize {
        let state = self.state.lock().await;
        state.post_likes.iter().filter(|(p, _)| *p == post_id).count()
    }

    pub(crate) async fn insert_post_like_row(&self, post_id: i64, owner_id: i64) {
        self.state.lock().await.post_likes.insert((post_id, owner_id));
    }

    /// Make the next probe report "not liked" regardless of the stored row.
    pub(crate) async fn hide_next_post_like_probe(&self) {
        self.state.lock().await.hide_post_like_probe = true;
    }

    /// Overwrite a stored counter to simulate drift.
    pub(crate) async fn set_post_like_count(&self, post_id: i64, value: i64) {
        if let Some(post) = self.state.lock().await.posts.get_mut(&post_id) {
            post.like_count = value;
        }
    }
}

fn post_sort_key(post: &PostRecord, sort: SortMode) -> i128 {
    match sort {
        SortMode::Time => post.created_at.unix_timestamp_nanos(),
        SortMode::Like => i128::from(post.like_count),
        SortMode::Comment => i128::from(post.comment_count),
    }
}

fn newest_first(comments: &mut [CommentRecord]) {
    comments.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
}

#[async_trait]
impl PostsRepo for InMemoryFeed {
    async fn find_post(&self, id: i64) -> Result<Option<PostRecord>, RepoError> {
        Ok(self.state.lock().await.posts.get(&id).cloned())
    }

    async fn list_posts(
        &self,
        sort: SortMode,
        page: PageRequest,
    ) -> Result<CursorPage<PostRecord>, RepoError> {
        let state = self.state.lock().await;
        let bound = match page.after_id {
            Some(id) => {
                let cursor = state
                    .posts
                    .get(&id)
                    .ok_or(PaginationError::InvalidCursor(id))?;
                Some((post_sort_key(cursor, sort), id))
            }
            None => None,
        };

        let mut rows: Vec<PostRecord> = state
            .posts
            .values()
            .filter(|post| bound.is_none_or(|b| (post_sort_key(post, sort), post.id) < b))
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            (post_sort_key(b, sort), b.id).cmp(&(post_sort_key(a, sort), a.id))
        });
        rows.truncate(page.fetch_limit() as usize);
        Ok(CursorPage::from_overfetch(rows, page.limit, |p| p.id))
    }
}

#[async_trait]
impl PostsWriteRepo for InMemoryFeed {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError> {
        let mut state = self.state.lock().await;
        let id = state.next_id();
        let now = state.tick();
        let post = PostRecord {
            id,
            owner_id: params.owner_id,
            username: params.username,
            avatar: params.avatar,
            status: params.status,
            content: params.content,
            image_url: params.image_url,
            like_count: 0,
            comment_count: 0,
            profile_version: params.profile_version,
            created_at: now,
            updated_at: now,
        };
        state.posts.insert(id, post.clone());
        Ok(post)
    }
}

#[async_trait]
impl CommentsRepo for InMemoryFeed {
    async fn find_comment(&self, id: i64) -> Result<Option<CommentRecord>, RepoError> {
        Ok(self.state.lock().await.comments.get(&id).cloned())
    }

    async fn list_comments(
        &self,
        post_id: i64,
        page: PageRequest,
    ) -> Result<CursorPage<CommentRecord>, RepoError> {
        let state = self.state.lock().await;
        let bound = match page.after_id {
            Some(id) => {
                let cursor = state
                    .comments
                    .get(&id)
                    .filter(|c| c.post_id == post_id)
                    .ok_or(PaginationError::InvalidCursor(id))?;
                Some((cursor.created_at, id))
            }
            None => None,
        };

        let mut rows: Vec<CommentRecord> = state
            .comments
            .values()
            .filter(|c| c.post_id == post_id)
            .filter(|c| bound.is_none_or(|b| (c.created_at, c.id) < b))
            .cloned()
            .collect();
        newest_first(&mut rows);
        rows.truncate(page.fetch_limit() as usize);
        Ok(CursorPage::from_overfetch(rows, page.limit, |c| c.id))
    }

    async fn count_comments(&self, post_id: i64) -> Result<i64, RepoError> {
        let state = self.state.lock().await;
        Ok(state.comments.values().filter(|c| c.post_id == post_id).count() as i64)
    }

    async fn latest_comments(
        &self,
        post_id: i64,
        limit: u32,
    ) -> Result<Vec<CommentRecord>, RepoError> {
        let state = self.state.lock().await;
        let mut rows: Vec<CommentRecord> = state
            .comments
            .values()
            .filter(|c| c.post_id == post_id)
            .cloned()
            .collect();
        newest_first(&mut rows);
        rows.truncate(limit as usize);
        Ok(rows)
    }
}

#[async_trait]
impl CommentsWriteRepo for InMemoryFeed {
    async fn create_comment(
        &self,
        params: CreateCommentParams,
    ) -> Result<CommentRecord, RepoError> {
        let mut state = self.state.lock().await;
        if !state.posts.contains_key(&params.post_id) {
            return Err(RepoError::NotFound);
        }
        let id = state.next_id();
        let now = state.tick();
        let comment = CommentRecord {
            id,
            post_id: params.post_id,
            owner_id: params.owner_id,
            username: params.username,
            avatar: params.avatar,
            content: params.content,
            reply_to: params.reply_to,
            like_count: 0,
            profile_version: params.profile_version,
            created_at: now,
            updated_at: now,
        };
        state.comments.insert(id, comment.clone());
        if let Some(post) = state.posts.get_mut(&params.post_id) {
            post.comment_count += 1;
        }
        Ok(comment)
    }
}

#[async_trait]
impl LikesRepo for InMemoryFeed {
    async fn post_liked(&self, post_id: i64, owner_id: i64) -> Result<bool, RepoError> {
        let mut state = self.state.lock().await;
        if std::mem::take(&mut state.hide_post_like_probe) {
            return Ok(false);
        }
        Ok(state.post_likes.contains(&(post_id, owner_id)))
    }

    async fn comment_liked(&self, comment_id: i64, owner_id: i64) -> Result<bool, RepoError> {
        let state = self.state.lock().await;
        Ok(state.comment_likes.contains(&(comment_id, owner_id)))
    }

    async fn apply_post_like(
        &self,
        post_id: i64,
        owner_id: i64,
        liked: bool,
    ) -> Result<bool, RepoError> {
        let mut state = self.state.lock().await;
        if !state.posts.contains_key(&post_id) {
            return Err(RepoError::NotFound);
        }
        let changed = if liked {
            state.post_likes.insert((post_id, owner_id))
        } else {
            state.post_likes.remove(&(post_id, owner_id))
        };
        if changed {
            if let Some(post) = state.posts.get_mut(&post_id) {
                post.like_count += if liked { 1 } else { -1 };
            }
        }
        Ok(changed)
    }

    async fn apply_comment_like(
        &self,
        comment_id: i64,
        owner_id: i64,
        liked: bool,
    ) -> Result<bool, RepoError> {
        let mut state = self.state.lock().await;
        if !state.comments.contains_key(&comment_id) {
            return Err(RepoError::NotFound);
        }
        let changed = if liked {
            state.comment_likes.insert((comment_id, owner_id))
        } else {
            state.comment_likes.remove(&(comment_id, owner_id))
        };
        if changed {
            if let Some(comment) = state.comments.get_mut(&comment_id) {
                comment.like_count += if liked { 1 } else { -1 };
            }
        }
        Ok(changed)
    }
}

#[async_trait]
impl AccountsRepo for InMemoryFeed {
    async fn find_account(&self, id: i64) -> Result<Option<AccountProfile>, RepoError> {
        Ok(self.state.lock().await.accounts.get(&id).cloned())
    }

    async fn list_changed_since(
        &self,
        since: OffsetDateTime,
    ) -> Result<Vec<AccountProfile>, RepoError> {
        let state = self.state.lock().await;
        Ok(state
            .accounts
            .values()
            .filter(|a| a.updated_at > since)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ReconcileRepo for InMemoryFeed {
    async fn sync_profile(&self, profile: &AccountProfile) -> Result<ProfileSyncCounts, RepoError> {
        let mut state = self.state.lock().await;
        let mut counts = ProfileSyncCounts::default();
        for post in state.posts.values_mut() {
            if post.owner_id == profile.id && post.profile_version < profile.profile_version {
                post.username = profile.username.clone();
                post.avatar = profile.avatar.clone();
                post.status = profile.status.clone();
                post.profile_version = profile.profile_version;
                counts.posts += 1;
            }
        }
        for comment in state.comments.values_mut() {
            if comment.owner_id == profile.id && comment.profile_version < profile.profile_version
            {
                comment.username = profile.username.clone();
                comment.avatar = profile.avatar.clone();
                comment.profile_version = profile.profile_version;
                counts.comments += 1;
            }
        }
        Ok(counts)
    }

    async fn cleanup_orphans(&self) -> Result<OrphanCleanupReport, RepoError> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        let mut report = OrphanCleanupReport::default();

        let doomed_comments: Vec<i64> = state
            .comments
            .values()
            .filter(|c| {
                !state.accounts.contains_key(&c.owner_id)
                    || state
                        .posts
                        .get(&c.post_id)
                        .is_none_or(|p| !state.accounts.contains_key(&p.owner_id))
            })
            .map(|c| c.id)
            .collect();
        for id in doomed_comments {
            state.comments.remove(&id);
            report.comments += 1;
        }

        let doomed_posts: Vec<i64> = state
            .posts
            .values()
            .filter(|p| !state.accounts.contains_key(&p.owner_id))
            .map(|p| p.id)
            .collect();
        for id in doomed_posts {
            state.posts.remove(&id);
            report.posts += 1;
        }

        let before = state.post_likes.len();
        state.post_likes.retain(|(post, owner)| {
            state.posts.contains_key(post) && state.accounts.contains_key(owner)
        });
        report.post_likes = (before - state.post_likes.len()) as u64;

        let before = state.comment_likes.len();
        state.comment_likes.retain(|(comment, owner)| {
            state.comments.contains_key(comment) && state.accounts.contains_key(owner)
        });
        report.comment_likes = (before - state.comment_likes.len()) as u64;

        for post in state.posts.values_mut() {
            let likes = state.post_likes.iter().filter(|(p, _)| *p == post.id).count() as i64;
            let comments = state
                .comments
                .values()
                .filter(|c| c.post_id == post.id)
                .count() as i64;
            if post.like_count != likes || post.comment_count != comments {
                post.like_count = likes;
                post.comment_count = comments;
                report.repaired_posts += 1;
            }
        }
        for comment in state.comments.values_mut() {
            let likes = state
                .comment_likes
                .iter()
                .filter(|(c, _)| *c == comment.id)
                .count() as i64;
            if comment.like_count != likes {
                comment.like_count = likes;
                report.repaired_comments += 1;
            }
        }

        Ok(report)
    }
}
