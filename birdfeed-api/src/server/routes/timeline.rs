use crate::server::{AppTimeline, Result, ServerError, ServerRouter, json::Json, user::RequestingUser};
use axum::{
    Router,
    extract::{FromRequestParts, Query, State},
};
use axum_extra::routing::{RouterExt, TypedPath};
use birdfeed_common::model::post::Post;
use serde::Deserialize;
use std::num::NonZeroUsize;
use thiserror::Error;

pub const DEFAULT_TIMELINE_LIMIT: NonZeroUsize = NonZeroUsize::new(10).unwrap();

pub fn routes() -> ServerRouter {
    Router::new().typed_get(get_timeline)
}

#[derive(Clone, Eq, PartialEq, Debug, Error)]
pub enum InvalidLimitError {
    #[error("limit must be an integer: {0:?}")]
    NotAnInteger(String),
    #[error("limit must be a positive number: {0}")]
    NotPositive(i64),
}

/// An absent or empty `limit` means the default.
fn parse_limit(limit: Option<&str>) -> Result<NonZeroUsize, InvalidLimitError> {
    let Some(limit) = limit.filter(|limit| !limit.is_empty()) else {
        return Ok(DEFAULT_TIMELINE_LIMIT);
    };

    let limit: i64 = limit
        .parse()
        .map_err(|_| InvalidLimitError::NotAnInteger(limit.to_owned()))?;

    usize::try_from(limit)
        .ok()
        .and_then(NonZeroUsize::new)
        .ok_or(InvalidLimitError::NotPositive(limit))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/api/v1/timeline", rejection(ServerError))]
struct TimelinePath();

#[derive(Clone, Eq, PartialEq, Debug, Default, Deserialize, FromRequestParts)]
#[from_request(via(Query), rejection(ServerError))]
struct TimelineQuery {
    limit: Option<String>,
}

async fn get_timeline(
    TimelinePath(): TimelinePath,
    State(timeline): State<AppTimeline>,
    user: RequestingUser,
    query: TimelineQuery,
) -> Result<Json<Vec<Post>>> {
    let limit = parse_limit(query.limit.as_deref())?;

    let posts = timeline.get_timeline(&user.user_id(), limit).await?;

    Ok(Json(posts))
}
