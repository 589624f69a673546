use axum::Router;
use axum::routing::post;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use super::handlers::{health_router, init, order};
use super::openapi::ApiDoc;
use super::state::AppState;

/// Assembles the ingestion router: `/init`, `/order`, `/health`, no
/// authentication middleware (spec's Non-goals exclude authentication).
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/init", post(init))
        .route("/order", post(order))
        .merge(health_router())
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
