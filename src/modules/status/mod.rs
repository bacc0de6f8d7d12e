use axum::Router;
use axum::routing::post;

use crate::state::AppState;

pub mod dto;
pub mod handler;
pub mod server;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(handler::rpc))
        .route("/rpc", post(handler::rpc))
}
