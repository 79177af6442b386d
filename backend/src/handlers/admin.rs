// src/handlers/admin.rs

use axum::{
    Json,
    extract::{Path, State},
    http::{StatusCode, header},
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::{Value, json};
use validator::Validate;

use crate::{
    error::AppError,
    models::question::QuestionPayload,
    state::AppState,
    store::JsonStore,
    utils::{
        hash::verify_password,
        jwt::{cleared_cookie, session_cookie, sign_admin_token},
    },
};

#[derive(Debug, Deserialize)]
pub struct AdminLoginRequest {
    #[serde(default)]
    pub password: String,
}

/// Checks the shared admin password and opens a cookie session.
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<AdminLoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    if !verify_password(&payload.password, &state.admin_password_hash)? {
        tracing::warn!("Rejected admin login attempt");
        return Err(AppError::AuthError("Invalid password".to_string()));
    }

    let token = sign_admin_token(&state.config.jwt_secret, state.config.jwt_expiration)?;

    Ok((
        [(header::SET_COOKIE, session_cookie(&token, state.config.jwt_expiration))],
        Json(json!({ "success": true })),
    ))
}

/// Drops the admin session cookie.
pub async fn logout() -> impl IntoResponse {
    (
        [(header::SET_COOKIE, cleared_cookie())],
        Json(json!({ "success": true })),
    )
}

/// Lists the full question bank, answer keys included.
/// Admin only.
pub async fn list_questions(State(store): State<JsonStore>) -> Result<impl IntoResponse, AppError> {
    let questions = store.questions().await?;
    Ok(Json(json!({ "questions": questions })))
}

/// Reads and validates a question body. Wrong types and rule violations
/// both answer 400.
fn parse_payload(body: Value) -> Result<QuestionPayload, AppError> {
    let invalid = || AppError::BadRequest("Invalid question payload".to_string());

    let payload: QuestionPayload = serde_json::from_value(body).map_err(|_| invalid())?;
    payload.validate().map_err(|_| invalid())?;
    Ok(payload)
}

/// Creates a new question.
/// Admin only.
pub async fn create_question(
    State(store): State<JsonStore>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    let payload = parse_payload(body)?;

    let question = store.insert_question(|id| payload.into_question(id)).await?;
    tracing::info!("Question {} created", question.id);

    Ok((StatusCode::CREATED, Json(json!({ "question": question }))))
}

/// Replaces a question by ID.
/// Admin only.
pub async fn update_question(
    State(store): State<JsonStore>,
    Path(id): Path<i64>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    let exists = store.questions().await?.iter().any(|q| q.id == id);
    if !exists {
        return Err(AppError::NotFound("Not found".to_string()));
    }

    let payload = parse_payload(body)?;

    let question = store
        .replace_question(payload.into_question(id))
        .await?
        .ok_or_else(|| AppError::NotFound("Not found".to_string()))?;

    Ok(Json(json!({ "question": question })))
}

/// Deletes a question by ID.
/// Admin only.
pub async fn delete_question(
    State(store): State<JsonStore>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let deleted = store
        .delete_question(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Not found".to_string()))?;

    tracing::info!("Question {} deleted", id);
    Ok(Json(json!({ "deleted": deleted })))
}

/// Lists every stored result, warnings and annotated answers included.
/// Admin only.
pub async fn list_results(State(store): State<JsonStore>) -> Result<impl IntoResponse, AppError> {
    let results = store.results().await?;
    Ok(Json(json!({ "results": results })))
}
