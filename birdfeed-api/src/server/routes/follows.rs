use crate::server::{AppTimeline, Result, ServerError, ServerRouter, json::Json, user::RequestingUser};
use axum::{Router, extract::State};
use axum_extra::routing::{RouterExt, TypedPath};
use birdfeed_common::model::{
    Id,
    user::{FollowEdge, UserMarker},
};
use serde::Deserialize;

pub fn routes() -> ServerRouter {
    Router::new().typed_post(follow_user)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/api/v1/follow", rejection(ServerError))]
struct FollowPath();

#[derive(Clone, Eq, PartialEq, Debug, Deserialize)]
struct FollowRequest {
    follow_user_id: Id<UserMarker>,
}

async fn follow_user(
    FollowPath(): FollowPath,
    State(timeline): State<AppTimeline>,
    user: RequestingUser,
    Json(request): Json<FollowRequest>,
) -> Result<()> {
    let edge = follow_edge(user.user_id(), request.follow_user_id)?;

    timeline.follow_user(&edge).await?;

    Ok(())
}

fn follow_edge(follower_id: Id<UserMarker>, followed_id: Id<UserMarker>) -> Result<FollowEdge> {
    if follower_id == followed_id {
        return Err(ServerError::SelfFollow(follower_id));
    }

    Ok(FollowEdge {
        follower_id,
        followed_id,
    })
}
