use crate::fan_out::FanOutReport;
use birdfeed_common::model::{
    Id,
    post::{Post, PostMarker},
    user::UserMarker,
};
use std::error::Error;
use tracing::{debug, error, info, warn};

/// Observability sink for the timeline engine.
///
/// The engine reports everything worth counting or alerting on through this
/// trait instead of logging directly, so tests can assert on what happened.
pub trait TimelineEvents: Send + Sync + 'static {
    /// A publish hit an already stored post and returned it unchanged.
    fn publish_deduplicated(&self, stored: &Post);

    fn cache_hit(&self, user_id: &Id<UserMarker>, cached_ids: usize, hydrated: usize);

    fn cache_fallback(&self, user_id: &Id<UserMarker>, followed: usize, posts: usize);

    fn fan_out_lookup_failed(
        &self,
        author_id: &Id<UserMarker>,
        post_id: &Id<PostMarker>,
        error: &dyn Error,
    );

    fn fan_out_push_failed(
        &self,
        post_id: &Id<PostMarker>,
        follower_id: &Id<UserMarker>,
        error: &dyn Error,
    );

    fn fan_out_finished(&self, report: &FanOutReport);

    /// The fan-out task panicked; some followers may not have been pushed to.
    fn fan_out_panicked(
        &self,
        author_id: &Id<UserMarker>,
        post_id: &Id<PostMarker>,
        error: &dyn Error,
    );
}

/// Emits every event through `tracing`.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct TracingEvents;

impl TimelineEvents for TracingEvents {
    fn publish_deduplicated(&self, stored: &Post) {
        info!(post_id = %stored.id, author_id = %stored.author_id, "Publish replayed an existing post");
    }

    fn cache_hit(&self, user_id: &Id<UserMarker>, cached_ids: usize, hydrated: usize) {
        debug!(%user_id, cached_ids, hydrated, "Served timeline from feed cache");
        if hydrated < cached_ids {
            warn!(
                %user_id,
                missing = cached_ids - hydrated,
                "Feed cache referenced posts missing from the post store"
            );
        }
    }

    fn cache_fallback(&self, user_id: &Id<UserMarker>, followed: usize, posts: usize) {
        warn!(%user_id, followed, posts, "Feed cache empty, rebuilt timeline from post store");
    }

    fn fan_out_lookup_failed(
        &self,
        author_id: &Id<UserMarker>,
        post_id: &Id<PostMarker>,
        error: &dyn Error,
    ) {
        error!(%author_id, %post_id, %error, "Fan-out could not load followers");
    }

    fn fan_out_push_failed(
        &self,
        post_id: &Id<PostMarker>,
        follower_id: &Id<UserMarker>,
        error: &dyn Error,
    ) {
        error!(%post_id, %follower_id, %error, "Fan-out push to follower feed failed");
    }

    fn fan_out_finished(&self, report: &FanOutReport) {
        if report.followers == 0 {
            debug!(author_id = %report.author_id, post_id = %report.post_id, "Author has no followers");
            return;
        }

        info!(
            author_id = %report.author_id,
            post_id = %report.post_id,
            updated = report.updated,
            followers = report.followers,
            "Finished timeline fan-out"
        );
    }

    fn fan_out_panicked(
        &self,
        author_id: &Id<UserMarker>,
        post_id: &Id<PostMarker>,
        error: &dyn Error,
    ) {
        error!(%author_id, %post_id, %error, "Fan-out task panicked");
    }
}
