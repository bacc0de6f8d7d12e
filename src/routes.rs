use axum::{Json, Router};
use utoipa::OpenApi;
use crate::docs::ApiDoc;
use crate::state::AppState;

use tower_http::cors::{Any, CorsLayer};

pub fn configure_routes() -> Router<AppState> {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(api_routes())
        .merge(crate::modules::status::router())
        .layer(cors)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", axum::routing::get(|| async { "ok" }))
        .route(
            "/api-docs/openapi.json",
            axum::routing::get(|| async { Json(ApiDoc::openapi()) }),
        )
}
