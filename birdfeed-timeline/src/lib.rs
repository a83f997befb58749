//! Home timeline construction.
//!
//! Publishing stores a post and pushes its id onto the cached feed of every
//! follower in a detached task. Reading serves the cached feed, hydrated from
//! the post store, and rebuilds the feed from the store when the cache has
//! nothing for the user. The store is authoritative and the cache is allowed to
//! lag behind it.

mod events;
mod fan_out;
mod publish;
mod read;
#[cfg(test)]
mod testing;

pub use events::{TimelineEvents, TracingEvents};
pub use fan_out::FanOutReport;
pub use publish::PublishError;
pub use read::TimelineError;

use birdfeed_common::{
    model::{
        Id,
        user::{FollowEdge, UserMarker},
    },
    store::{FeedCache, PostStore},
};
use std::sync::Arc;
use tokio_util::task::TaskTracker;

/// Feed cache key holding the home timeline of `user_id`.
#[must_use]
pub fn feed_key(user_id: &Id<UserMarker>) -> String {
    format!("timeline:{user_id}")
}

pub struct Timeline<S, C, E = TracingEvents> {
    store: Arc<S>,
    cache: Arc<C>,
    events: Arc<E>,
    fan_out_tasks: TaskTracker,
}

impl<S, C, E> Clone for Timeline<S, C, E> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            cache: Arc::clone(&self.cache),
            events: Arc::clone(&self.events),
            fan_out_tasks: self.fan_out_tasks.clone(),
        }
    }
}

impl<S, C, E> Timeline<S, C, E>
where
    S: PostStore + 'static,
    C: FeedCache + 'static,
    E: TimelineEvents,
{
    /// Fan-out tasks are spawned on `fan_out_tasks`, so the owner can wait for
    /// them to drain on shutdown.
    #[must_use]
    pub fn new(store: S, cache: C, events: E, fan_out_tasks: TaskTracker) -> Self {
        Self {
            store: Arc::new(store),
            cache: Arc::new(cache),
            events: Arc::new(events),
            fan_out_tasks,
        }
    }

    #[must_use]
    pub fn fan_out_tasks(&self) -> &TaskTracker {
        &self.fan_out_tasks
    }

    pub async fn follow_user(&self, edge: &FollowEdge) -> Result<(), S::Error> {
        self.store.create_follow_edge(edge).await
    }
}

impl<S, C, E> std::fmt::Debug for Timeline<S, C, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Timeline")
            .field("fan_out_tasks", &self.fan_out_tasks)
            .finish_non_exhaustive()
    }
}
