// src/utils/jwt.rs

use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    body::Body,
    extract::State,
    http::{Request, header},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::{config::Config, error::AppError};

/// Name of the cookie carrying the admin session token.
pub const ADMIN_COOKIE: &str = "admin_session";

const ADMIN_ROLE: &str = "admin";

/// JWT Claims structure.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Claims {
    /// Subject - always "admin"; there is a single shared admin account.
    pub sub: String,
    pub role: String,
    /// Expiration time as Unix timestamp.
    pub exp: usize,
}

/// Signs a new admin session token.
pub fn sign_admin_token(secret: &str, expiration_seconds: u64) -> Result<String, AppError> {
    // Calculate expiration: current time + expiration_seconds
    let expiration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| AppError::InternalServerError(e.to_string()))?
        .as_secs() as usize
        + expiration_seconds as usize;

    let claims = Claims {
        sub: ADMIN_ROLE.to_owned(),
        role: ADMIN_ROLE.to_owned(),
        exp: expiration,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::InternalServerError(e.to_string()))
}

/// Verifies and decodes a JWT string.
///
/// Returns the `Claims` if valid, otherwise returns an `AppError`.
pub fn verify_jwt(token: &str, secret: &str) -> Result<Claims, AppError> {
    let token_data = decode(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| AppError::AuthError("Unauthorized".to_string()))?;

    Ok(token_data.claims)
}

/// `Set-Cookie` value establishing the admin session.
pub fn session_cookie(token: &str, max_age_seconds: u64) -> String {
    format!(
        "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}",
        ADMIN_COOKIE, token, max_age_seconds
    )
}

/// `Set-Cookie` value expiring the admin session.
pub fn cleared_cookie() -> String {
    format!("{}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0", ADMIN_COOKIE)
}

/// Extracts a named cookie from a raw `Cookie` header value.
fn find_cookie<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    header.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key == name).then_some(value)
    })
}

/// Axum Middleware: Admin Authorization.
///
/// Reads the `admin_session` cookie, verifies it and checks the 'admin' role.
/// Injects the `Claims` into the request extensions on success, 401 otherwise.
pub async fn admin_middleware(
    State(config): State<Config>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let token = req
        .headers()
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(|value| find_cookie(value, ADMIN_COOKIE))
        .ok_or_else(|| AppError::AuthError("Unauthorized".to_string()))?
        .to_owned();

    let claims = verify_jwt(&token, &config.jwt_secret)?;
    if claims.role != ADMIN_ROLE {
        return Err(AppError::AuthError("Unauthorized".to_string()));
    }

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_round_trip() {
        let token = sign_admin_token("secret", 60).unwrap();
        let claims = verify_jwt(&token, "secret").unwrap();
        assert_eq!(claims.role, "admin");
        assert!(verify_jwt(&token, "other").is_err());
    }

    #[test]
    fn test_find_cookie() {
        let header = "theme=dark; admin_session=abc.def; other=1";
        assert_eq!(find_cookie(header, ADMIN_COOKIE), Some("abc.def"));
        assert_eq!(find_cookie("theme=dark", ADMIN_COOKIE), None);
    }
}
