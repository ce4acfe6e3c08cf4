use super::handlers;
use super::state::AppState;
use axum::{
    routing::{get, post, put},
    Router,
};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Session lifecycle
        .route("/sessions", post(handlers::create_session))
        .route(
            "/sessions/:session_id",
            get(handlers::get_session).delete(handlers::close_session),
        )
        .route(
            "/sessions/:session_id/finalize",
            post(handlers::finalize_session),
        )
        .route(
            "/sessions/:session_id/permissions",
            put(handlers::update_permissions),
        )
        // Answers
        .route("/sessions/:session_id/answers", post(handlers::submit_answer))
        .route("/sessions/:session_id/skip", post(handlers::skip_question))
        .route("/sessions/:session_id/run", post(handlers::run_code))
        // Voice capture
        .route(
            "/sessions/:session_id/recording/start",
            post(handlers::start_recording),
        )
        .route(
            "/sessions/:session_id/recording/frames",
            post(handlers::push_audio_frames),
        )
        .route(
            "/sessions/:session_id/recording/stop",
            post(handlers::stop_recording),
        )
        // Proctoring
        .route(
            "/sessions/:session_id/visibility",
            post(handlers::report_visibility),
        )
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
