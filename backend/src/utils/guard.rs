// src/utils/guard.rs

use axum::{
    body::Body,
    http::{Request, header},
    middleware::Next,
    response::Response,
};

use crate::error::AppError;

/// API paths reachable without a browser user agent.
const OPEN_PATHS: [&str; 1] = ["/api/admin/login"];

/// Axum Middleware: Browser-only API access.
///
/// Static pages always pass. Rejects API calls whose `User-Agent` does not look like a browser.
/// Trivially spoofable; it only keeps casual scripted clients out.
pub async fn browser_only(req: Request<Body>, next: Next) -> Result<Response, AppError> {
    let path = req.uri().path();
    if !path.starts_with("/api/") || OPEN_PATHS.contains(&path) {
        return Ok(next.run(req).await);
    }

    let is_browser = req
        .headers()
        .get(header::USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|ua| ua.contains("Mozilla"));

    if !is_browser {
        tracing::warn!("Rejected non-browser request to {}", path);
        return Err(AppError::Forbidden(
            "API access denied. Use browser interface only.".to_string(),
        ));
    }

    Ok(next.run(req).await)
}
