// src/handlers/exam.rs

use axum::{Json, extract::State, response::IntoResponse};
use rand::seq::SliceRandom;
use serde_json::{Value, json};

use crate::{
    config::QUESTION_LIMIT,
    error::AppError,
    models::{
        exam_record::{SubmitExamRequest, SubmitExamResponse},
        question::PublicQuestion,
    },
    scoring::score_submission,
    store::JsonStore,
};

/// Hands out the exam paper.
///
/// Shuffles the whole bank, caps it at `QUESTION_LIMIT` entries and strips
/// the correct option before anything leaves the server.
pub async fn list_questions(State(store): State<JsonStore>) -> Result<impl IntoResponse, AppError> {
    let mut questions = store.questions().await?;
    questions.shuffle(&mut rand::thread_rng());

    let paper: Vec<PublicQuestion> = questions
        .into_iter()
        .take(QUESTION_LIMIT)
        .map(PublicQuestion::from)
        .collect();

    Ok(Json(json!({ "questions": paper })))
}

/// Scores a finished exam and stores the result.
///
/// * Rejects payloads without `userName`, `email` or an `answers` array.
/// * Scores against the full bank (see `scoring::score_submission`).
/// * Appends an immutable record, warnings included.
///
/// Submissions are not deduplicated per email here; the client-side
/// completion marker is the only guard.
pub async fn submit_exam(
    State(store): State<JsonStore>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    let req: SubmitExamRequest = serde_json::from_value(body)?;

    let Some(answers) = req.answers.as_deref() else {
        return Err(AppError::BadRequest("Invalid payload".to_string()));
    };
    if req.user_name.trim().is_empty() || req.email.trim().is_empty() {
        return Err(AppError::BadRequest("Invalid payload".to_string()));
    }

    let bank = store.questions().await?;
    let card = score_submission(&bank, answers);

    let record = store.append_result(&req, &card).await?;
    tracing::info!(
        "Result #{} stored for {}: {}/{} ({}%), {} warnings",
        record.id,
        record.email,
        record.correct,
        record.total,
        record.percentage,
        record.warnings.len()
    );

    Ok(Json(SubmitExamResponse {
        message: "Exam submitted successfully".to_string(),
        correct: card.correct,
        total: card.total,
        percentage: card.percentage,
        answers: card.answers,
    }))
}
