use crate::{Timeline, TimelineEvents, feed_key};
use birdfeed_common::{
    model::{Id, post::PostMarker, user::UserMarker},
    store::{FeedCache, PostStore},
};
use std::sync::Arc;

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct FanOutReport {
    pub author_id: Id<UserMarker>,
    pub post_id: Id<PostMarker>,
    pub followers: usize,
    pub updated: usize,
}

impl FanOutReport {
    #[must_use]
    pub fn failed(&self) -> usize {
        self.followers - self.updated
    }
}

impl<S, C, E> Timeline<S, C, E>
where
    S: PostStore + 'static,
    C: FeedCache + 'static,
    E: TimelineEvents,
{
    /// Pushes `post_id` onto the cached feed of every follower of `author_id`.
    ///
    /// Followers are handled one at a time. A failed push is reported to the
    /// event sink and the remaining followers are still processed; nothing is
    /// retried. Authors with very large follower counts make this loop
    /// proportionally long, there is no batching.
    pub async fn fan_out(
        &self,
        author_id: &Id<UserMarker>,
        post_id: &Id<PostMarker>,
    ) -> Result<FanOutReport, S::Error> {
        let followers = match self.store.list_follower_ids(author_id).await {
            Ok(followers) => followers,
            Err(err) => {
                self.events.fan_out_lookup_failed(author_id, post_id, &err);
                return Err(err);
            }
        };

        let mut updated = 0;
        for follower_id in &followers {
            match self
                .cache
                .push_front(&feed_key(follower_id), post_id.get())
                .await
            {
                Ok(()) => updated += 1,
                Err(err) => self.events.fan_out_push_failed(post_id, follower_id, &err),
            }
        }

        let report = FanOutReport {
            author_id: author_id.clone(),
            post_id: post_id.clone(),
            followers: followers.len(),
            updated,
        };
        self.events.fan_out_finished(&report);

        Ok(report)
    }

    /// Runs [`Timeline::fan_out`] on a tracked task that is not tied to the
    /// caller. Its outcome, a panic included, only reaches the event sink.
    pub(crate) fn spawn_fan_out(&self, author_id: Id<UserMarker>, post_id: Id<PostMarker>) {
        let timeline = self.clone();
        let events = Arc::clone(&self.events);

        self.fan_out_tasks.spawn(async move {
            let fan_out = {
                let (author_id, post_id) = (author_id.clone(), post_id.clone());
                tokio::spawn(async move {
                    // Failures were already reported to the event sink.
                    let _ = timeline.fan_out(&author_id, &post_id).await;
                })
            };

            if let Err(err) = fan_out.await
                && err.is_panic()
            {
                events.fan_out_panicked(&author_id, &post_id, &err);
            }
        });
    }
}
