// src/routes.rs

use axum::{
    Router,
    http::{HeaderName, HeaderValue, Method},
    middleware,
    routing::{get, post, put},
};
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer, services::ServeDir, set_header::SetResponseHeaderLayer, trace::TraceLayer,
};

use crate::{
    handlers::{admin, exam},
    state::AppState,
    utils::{guard::browser_only, jwt::admin_middleware},
};

/// Assembles the main application router.
///
/// * Student API (`/api/questions`, `/api/submit`).
/// * Admin API, cookie-gated except login/logout.
/// * Static presentation files as the fallback.
/// * Global middleware (Trace, CORS, browser guard, noindex header).
pub fn create_router(state: AppState) -> Router {
    let origins: Vec<HeaderValue> = state
        .config
        .allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([axum::http::header::CONTENT_TYPE])
        .allow_credentials(true);

    let student_routes = Router::new()
        .route("/questions", get(exam::list_questions))
        .route("/submit", post(exam::submit_exam));

    let admin_routes = Router::new()
        .route(
            "/questions",
            get(admin::list_questions).post(admin::create_question),
        )
        .route(
            "/questions/{id}",
            put(admin::update_question).delete(admin::delete_question),
        )
        .route("/results", get(admin::list_results))
        .layer(middleware::from_fn_with_state(state.clone(), admin_middleware))
        .route("/login", post(admin::login))
        .route("/logout", post(admin::logout));

    Router::new()
        .nest("/api", student_routes)
        .nest("/api/admin", admin_routes)
        .fallback_service(ServeDir::new(&state.config.public_dir))
        // Global Middleware (applied from outside in)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(SetResponseHeaderLayer::overriding(
                    HeaderName::from_static("x-robots-tag"),
                    HeaderValue::from_static("noindex,nofollow"),
                ))
                .layer(middleware::from_fn(browser_only)),
        )
        .with_state(state)
}
