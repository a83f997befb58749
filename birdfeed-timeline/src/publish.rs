use crate::{Timeline, TimelineEvents};
use birdfeed_common::{
    model::{
        Id,
        post::{Post, PostMarker},
    },
    store::{FeedCache, PostStore},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PublishError<E> {
    #[error("Looking up post {id} failed: {source}")]
    Lookup {
        id: Id<PostMarker>,
        #[source]
        source: E,
    },
    #[error("Storing post {id} failed: {source}")]
    Create {
        id: Id<PostMarker>,
        #[source]
        source: E,
    },
    #[error("Post {0} was taken by a concurrent publish but could not be read back")]
    ConflictNotFound(Id<PostMarker>),
}

impl<S, C, E> Timeline<S, C, E>
where
    S: PostStore + 'static,
    C: FeedCache + 'static,
    E: TimelineEvents,
{
    /// Stores `post` unless a post with the same id exists already, in which
    /// case the stored post is returned unchanged and nothing else happens.
    ///
    /// A newly stored post is fanned out to the author's followers on a
    /// detached task. The call returns as soon as the post is stored; fan-out
    /// failures are never reported here and do not undo the publish.
    pub async fn publish(&self, post: Post) -> Result<Post, PublishError<S::Error>> {
        if let Some(stored) = self.find_post(&post.id).await? {
            self.events.publish_deduplicated(&stored);
            return Ok(stored);
        }

        let created = self
            .store
            .create_post(&post)
            .await
            .map_err(|source| PublishError::Create {
                id: post.id.clone(),
                source,
            })?;

        match created {
            Some(created) => {
                self.spawn_fan_out(created.author_id.clone(), created.id.clone());
                Ok(created)
            }
            // Lost an insert race against a retry of the same request.
            None => {
                let stored = self
                    .find_post(&post.id)
                    .await?
                    .ok_or(PublishError::ConflictNotFound(post.id))?;
                self.events.publish_deduplicated(&stored);
                Ok(stored)
            }
        }
    }

    async fn find_post(
        &self,
        id: &Id<PostMarker>,
    ) -> Result<Option<Post>, PublishError<S::Error>> {
        self.store
            .find_post_by_id(id)
            .await
            .map_err(|source| PublishError::Lookup {
                id: id.clone(),
                source,
            })
    }
}
