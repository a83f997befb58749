//! Storage seams consumed by the timeline engine.
//!
//! The relational post store is the source of truth. The feed cache is a
//! per-user list of post ids, newest first, that may lag behind the store or be
//! missing entirely.

use crate::model::{
    Id,
    post::{Post, PostMarker},
    user::{FollowEdge, UserMarker},
};
use std::{error::Error, future::Future, num::NonZeroUsize};

pub trait PostStore: Send + Sync {
    type Error: Error + Send + Sync + 'static;

    /// Inserts `post`. Resolves to `None` when a post with the same id already
    /// exists, in which case nothing was written.
    fn create_post(
        &self,
        post: &Post,
    ) -> impl Future<Output = Result<Option<Post>, Self::Error>> + Send;

    fn find_post_by_id(
        &self,
        id: &Id<PostMarker>,
    ) -> impl Future<Output = Result<Option<Post>, Self::Error>> + Send;

    /// Users following `user_id`.
    fn list_follower_ids(
        &self,
        user_id: &Id<UserMarker>,
    ) -> impl Future<Output = Result<Vec<Id<UserMarker>>, Self::Error>> + Send;

    /// Users that `user_id` follows.
    fn list_followed_ids(
        &self,
        user_id: &Id<UserMarker>,
    ) -> impl Future<Output = Result<Vec<Id<UserMarker>>, Self::Error>> + Send;

    /// The most recent post of each of `user_ids`. Accounts without posts are
    /// absent from the result; order is unspecified.
    fn list_latest_post_per_account(
        &self,
        user_ids: &[Id<UserMarker>],
    ) -> impl Future<Output = Result<Vec<Post>, Self::Error>> + Send;

    /// Posts with the given ids, in unspecified order. Unknown ids are skipped.
    fn list_posts_by_ids(
        &self,
        ids: &[Id<PostMarker>],
    ) -> impl Future<Output = Result<Vec<Post>, Self::Error>> + Send;

    fn create_follow_edge(
        &self,
        edge: &FollowEdge,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

pub trait FeedCache: Send + Sync {
    type Error: Error + Send + Sync + 'static;

    /// Atomically makes `value` the new head of the list at `key`, creating the
    /// list if needed.
    fn push_front(
        &self,
        key: &str,
        value: &str,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Up to `count` values from the head of the list at `key`. A missing key
    /// reads as an empty list.
    fn range_from_head(
        &self,
        key: &str,
        count: NonZeroUsize,
    ) -> impl Future<Output = Result<Vec<String>, Self::Error>> + Send;
}
