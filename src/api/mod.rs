//! HTTP API layer: health and status endpoints, WebSocket route, OpenAPI.

pub mod handlers;

use axum::Router;
use axum::routing::get;
use utoipa::OpenApi;

use crate::app_state::AppState;
use crate::ws::handler::ws_handler;

/// OpenAPI document for the HTTP endpoints.
#[derive(Debug, OpenApi)]
#[openapi(
    info(title = "arena-relay", description = "Tournament relay status API"),
    paths(handlers::system::health_handler, handlers::system::status_handler),
    tags((name = "System", description = "Health and relay state"))
)]
pub struct ApiDoc;

/// Builds the complete router: HTTP endpoints, `/ws`, and Swagger UI when
/// the `swagger-ui` feature is enabled.
pub fn build_router() -> Router<AppState> {
    let router = Router::new()
        .merge(handlers::system::routes())
        .route("/ws", get(ws_handler));

    #[cfg(feature = "swagger-ui")]
    let router = router.merge(
        utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
            .url("/api-docs/openapi.json", ApiDoc::openapi()),
    );

    router
}
