use axum::Router;
use axum::routing::{get, post};
use hookscope_core::AppError;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;

use crate::error::panic_response;
use crate::handlers;
use crate::state::AppState;

mod cors;

use cors::build_cors_layer;

pub fn build_router(app_state: AppState, frontend_url: &str) -> Result<Router, AppError> {
    Ok(Router::new()
        .route("/health", get(handlers::health::health_handler))
        .route("/api/webhook", post(handlers::webhooks::ingest_webhook_handler))
        .route(
            "/api/webhooks",
            get(handlers::webhooks::list_webhooks_handler),
        )
        .route(
            "/api/webhooks/filter-values",
            get(handlers::webhooks::filter_values_handler),
        )
        .route(
            "/api/webhooks/{webhook_id}",
            get(handlers::webhooks::get_webhook_handler)
                .patch(handlers::webhooks::update_webhook_handler)
                .delete(handlers::webhooks::delete_webhook_handler),
        )
        .layer(build_cors_layer(frontend_url)?)
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state))
}
