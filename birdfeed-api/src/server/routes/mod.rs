use crate::server::{ServerError, ServerRouter};
use axum::Router;
use axum_extra::routing::{RouterExt, TypedPath};
use serde::Deserialize;

mod follows;
pub mod timeline;
mod tweets;

pub fn routes() -> ServerRouter {
    Router::new()
        .typed_get(ping)
        .merge(tweets::routes())
        .merge(follows::routes())
        .merge(timeline::routes())
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/ping", rejection(ServerError))]
struct PingPath();

async fn ping(PingPath(): PingPath) -> &'static str {
    "pong"
}
