use std::sync::Arc;

use crate::application::feed::FeedService;
use crate::application::likes::LikeService;

#[derive(Clone)]
pub struct ApiState {
    pub feed: Arc<FeedService>,
    pub likes: Arc<LikeService>,
}
