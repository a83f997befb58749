use crate::{Timeline, TimelineEvents, feed_key};
use birdfeed_common::{
    model::{
        Id,
        post::{Post, PostMarker},
        user::UserMarker,
    },
    store::{FeedCache, PostStore},
};
use std::{collections::HashMap, num::NonZeroUsize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TimelineError<SE, CE> {
    #[error("Reading the cached feed of {user_id} failed: {source}")]
    Cache {
        user_id: Id<UserMarker>,
        #[source]
        source: CE,
    },
    #[error("Hydrating {count} cached post ids failed: {source}")]
    Hydrate {
        count: usize,
        #[source]
        source: SE,
    },
    #[error("Looking up the accounts {user_id} follows failed: {source}")]
    Followed {
        user_id: Id<UserMarker>,
        #[source]
        source: SE,
    },
    #[error("Rebuilding the feed of {user_id} from the post store failed: {source}")]
    Rebuild {
        user_id: Id<UserMarker>,
        #[source]
        source: SE,
    },
}

impl<S, C, E> Timeline<S, C, E>
where
    S: PostStore + 'static,
    C: FeedCache + 'static,
    E: TimelineEvents,
{
    /// Up to `limit` posts for the home timeline of `user_id`, newest first.
    ///
    /// The cached feed is served when it has any entries, in cache order. An
    /// empty or missing feed is rebuilt from the post store as the latest post
    /// of every followed account; that result is not written back to the cache.
    /// A failing cache is an error, not a reason to fall back.
    pub async fn get_timeline(
        &self,
        user_id: &Id<UserMarker>,
        limit: NonZeroUsize,
    ) -> Result<Vec<Post>, TimelineError<S::Error, C::Error>> {
        let cached = self
            .cache
            .range_from_head(&feed_key(user_id), limit)
            .await
            .map_err(|source| TimelineError::Cache {
                user_id: user_id.clone(),
                source,
            })?;

        if cached.is_empty() {
            return self.rebuild_timeline(user_id, limit).await;
        }

        // Values the cache holds that cannot be post ids can never hydrate.
        let ids: Vec<Id<PostMarker>> = cached
            .into_iter()
            .filter_map(|id| Id::new(id).ok())
            .collect();

        let posts = self
            .store
            .list_posts_by_ids(&ids)
            .await
            .map_err(|source| TimelineError::Hydrate {
                count: ids.len(),
                source,
            })?;
        let posts = in_feed_order(&ids, posts);

        self.events.cache_hit(user_id, ids.len(), posts.len());
        Ok(posts)
    }

    async fn rebuild_timeline(
        &self,
        user_id: &Id<UserMarker>,
        limit: NonZeroUsize,
    ) -> Result<Vec<Post>, TimelineError<S::Error, C::Error>> {
        let followed = self
            .store
            .list_followed_ids(user_id)
            .await
            .map_err(|source| TimelineError::Followed {
                user_id: user_id.clone(),
                source,
            })?;

        let mut posts = self
            .store
            .list_latest_post_per_account(&followed)
            .await
            .map_err(|source| TimelineError::Rebuild {
                user_id: user_id.clone(),
                source,
            })?;

        posts.sort_unstable_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        posts.truncate(limit.get());

        self.events.cache_fallback(user_id, followed.len(), posts.len());
        Ok(posts)
    }
}

/// Arranges `posts` in the order of `ids`. Ids without a post are skipped and a
/// repeated id only keeps its first position.
fn in_feed_order(ids: &[Id<PostMarker>], posts: Vec<Post>) -> Vec<Post> {
    let mut by_id: HashMap<Id<PostMarker>, Post> =
        posts.into_iter().map(|post| (post.id.clone(), post)).collect();

    ids.iter().filter_map(|id| by_id.remove(id)).collect()
}
