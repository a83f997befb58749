use axum::{
    Router,
    extract::{
        FromRef, Request,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
};
use axum_extra::typed_header::TypedHeaderRejection;
use birdfeed_cache::client::{CacheClient, CacheError};
use birdfeed_common::model::{Id, user::UserMarker};
use birdfeed_db::client::{DbClient, DbError};
use birdfeed_timeline::{PublishError, Timeline, TimelineError};
use json::Json;
use routes::timeline::InvalidLimitError;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

mod json;
mod routes;
mod user;

pub type ServerRouter = Router<ServerState>;

pub type AppTimeline = Timeline<DbClient, CacheClient>;

#[derive(Clone, Debug, FromRef)]
pub struct ServerState {
    pub timeline: AppTimeline,
}

pub fn routes() -> ServerRouter {
    routes::routes().fallback(fallback)
}

pub async fn fallback(request: Request) -> ServerError {
    ServerError::UnknownRoute(request.into_parts().0.uri)
}

pub type Result<T, E = ServerError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Unknown route requested: {0}")]
    UnknownRoute(Uri),
    #[error("Path rejected: {0}")]
    PathRejection(#[from] PathRejection),
    #[error("Incoming JSON rejected: {0}")]
    JsonRejection(#[from] JsonRejection),
    #[error("Query string rejected: {0}")]
    QueryRejection(#[from] QueryRejection),
    #[error("JSON response could not be serialized: {0}")]
    JsonResponse(#[from] serde_json::Error),
    #[error("X-User-ID header was missing or invalid: {0}")]
    InvalidUserHeader(TypedHeaderRejection),
    #[error("Invalid limit: {0}")]
    InvalidLimit(#[from] InvalidLimitError),
    #[error("User {0} cannot follow themselves")]
    SelfFollow(Id<UserMarker>),
    #[error(transparent)]
    Publish(#[from] PublishError<DbError>),
    #[error(transparent)]
    Timeline(#[from] TimelineError<DbError, CacheError>),
    #[error(transparent)]
    Database(#[from] DbError),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::UnknownRoute(_) | ServerError::PathRejection(_) => StatusCode::NOT_FOUND,
            ServerError::JsonRejection(_)
            | ServerError::QueryRejection(_)
            | ServerError::InvalidUserHeader(_)
            | ServerError::InvalidLimit(_)
            | ServerError::SelfFollow(_) => StatusCode::BAD_REQUEST,
            ServerError::JsonResponse(_)
            | ServerError::Publish(_)
            | ServerError::Timeline(_)
            | ServerError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Serialize, Deserialize)]
struct ErrorResponse {
    status: u16,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();

        error!(error = %self, %status, "Replying with error");

        let error_response = ErrorResponse {
            status: status.as_u16(),
        };
        (status, Json(error_response)).into_response()
    }
}
