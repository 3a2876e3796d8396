use super::handlers;
use super::state::AppState;
use axum::{
    routing::{get, post, put},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Catalog
        .route("/prompts/:kind", get(handlers::list_prompts))
        // Session control
        .route(
            "/sessions/:prompt_id",
            get(handlers::get_session).delete(handlers::delete_session),
        )
        .route("/sessions/:prompt_id/begin", post(handlers::begin_session))
        .route("/sessions/:prompt_id/text", put(handlers::update_text))
        .route("/sessions/:prompt_id/stop", post(handlers::stop_session))
        .route("/sessions/:prompt_id/retake", post(handlers::retake_session))
        .route("/sessions/:prompt_id/submit", post(handlers::submit_session))
        .route("/sessions/:prompt_id/artifact", get(handlers::get_artifact))
        // Scoring results
        .route("/results/:prompt_id", get(handlers::get_result))
        .route("/history/:kind", get(handlers::list_history))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
