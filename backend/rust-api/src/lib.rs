use axum::{
    http::{header, Method},
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

pub mod cache;
pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod llm;
pub mod metrics;
pub mod middlewares;
pub mod models;
pub mod services;
pub mod session;
pub mod storage;

pub use config::Config;
pub use services::AppState;

pub fn create_router(app_state: std::sync::Arc<services::AppState>) -> Router {
    // Browser clients call the API cross-origin during development.
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_origin(tower_http::cors::Any);

    Router::new()
        .route("/health", get(handlers::health_check))
        // Metrics endpoint with Basic Auth protection
        .route(
            "/metrics",
            get(handlers::metrics_handler)
                .layer(middleware::from_fn(handlers::metrics_auth_middleware)),
        )
        .nest("/api", api_routes().layer(cors))
        .with_state(app_state)
        .layer(middleware::from_fn(
            middlewares::metrics::metrics_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
}

fn api_routes() -> Router<std::sync::Arc<services::AppState>> {
    Router::new()
        .route("/questions", get(handlers::questions::list_questions))
        .route(
            "/hints",
            get(handlers::hints::get_hints).post(handlers::hints::generate_hints),
        )
        .route(
            "/evaluate-answer",
            post(handlers::evaluation::evaluate_answer),
        )
        .route("/follow-up", post(handlers::follow_up::question_follow_up))
        .route(
            "/topic-follow-up",
            post(handlers::follow_up::topic_follow_up),
        )
        .route(
            "/test",
            get(handlers::connectivity_check)
                .post(handlers::connectivity_echo)
                .options(handlers::connectivity_preflight),
        )
        .merge(session_routes())
}

fn session_routes() -> Router<std::sync::Arc<services::AppState>> {
    Router::new()
        .route("/sessions/", post(handlers::sessions::start_session))
        .route("/sessions/{id}", get(handlers::sessions::get_session))
        .route("/sessions/{id}/answers", post(handlers::sessions::submit_answer))
        .route("/sessions/{id}/complete", post(handlers::sessions::complete_session))
        .route("/sessions/{id}/results", get(handlers::sessions::session_results))
}
