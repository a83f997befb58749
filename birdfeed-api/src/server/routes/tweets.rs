use crate::server::{AppTimeline, Result, ServerError, ServerRouter, json::Json, user::RequestingUser};
use axum::{Router, extract::State};
use axum_extra::routing::{RouterExt, TypedPath};
use birdfeed_common::model::{
    Id,
    post::{Post, PostMarker, PostText},
};
use serde::Deserialize;
use time::OffsetDateTime;

pub fn routes() -> ServerRouter {
    Router::new().typed_post(create_tweet)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/api/v1/tweet", rejection(ServerError))]
struct CreateTweetPath();

/// The idempotency key becomes the post id, so retries collapse onto the
/// first stored post.
#[derive(Clone, Eq, PartialEq, Debug, Deserialize)]
struct CreateTweetRequest {
    text: PostText,
    idempotency_key: Id<PostMarker>,
}

async fn create_tweet(
    CreateTweetPath(): CreateTweetPath,
    State(timeline): State<AppTimeline>,
    user: RequestingUser,
    Json(request): Json<CreateTweetRequest>,
) -> Result<Json<Post>> {
    let post = Post {
        id: request.idempotency_key,
        author_id: user.user_id(),
        text: request.text,
        created_at: OffsetDateTime::now_utc(),
    };

    let post = timeline.publish(post).await?;

    Ok(Json(post))
}
