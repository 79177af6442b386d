// src/models/exam_record.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// A finalized, scored submission as persisted in `results.json`.
/// Created once per submission and never rewritten.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamRecord {
    pub id: i64,
    pub user_name: String,
    pub email: String,
    pub correct: usize,
    pub total: usize,
    pub percentage: f64,
    pub submitted_at: DateTime<Utc>,
    pub warnings: Vec<WarningEntry>,
    pub answers: Vec<AnnotatedAnswer>,
}

/// One entry of the client's append-only warning log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WarningRecord {
    /// 1-based sequence number.
    pub count: u32,
    pub msg: String,
    pub code: Option<String>,
    pub at: DateTime<Utc>,
}

/// A warning as received with a submission.
///
/// Well-formed entries are typed; anything else is kept verbatim so the
/// audit trail survives a client that logged something odd.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum WarningEntry {
    Logged(WarningRecord),
    Raw(Value),
}

impl From<WarningRecord> for WarningEntry {
    fn from(record: WarningRecord) -> Self {
        WarningEntry::Logged(record)
    }
}

/// `null` reads as no warnings, a non-array value is stored as one raw entry.
fn lenient_warnings<'de, D>(deserializer: D) -> Result<Vec<WarningEntry>, D::Error>
where
    D: Deserializer<'de>,
{
    let entries = match Value::deserialize(deserializer)? {
        Value::Null => Vec::new(),
        Value::Array(items) => items
            .into_iter()
            .map(|item| {
                serde_json::from_value::<WarningRecord>(item.clone())
                    .map(WarningEntry::Logged)
                    .unwrap_or(WarningEntry::Raw(item))
            })
            .collect(),
        other => vec![WarningEntry::Raw(other)],
    };
    Ok(entries)
}

/// A single submitted (questionId, selectedOption) pair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedAnswer {
    pub question_id: i64,
    #[serde(default)]
    pub selected_option: Option<String>,
}

/// A submitted answer augmented with the key, for review display.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnnotatedAnswer {
    pub question_id: i64,
    pub question: String,
    pub options: Vec<String>,
    pub selected_option: Option<String>,
    pub correct_option: String,
    pub is_correct: bool,
}

/// DTO for `POST /api/submit`.
///
/// Missing identity fields deserialize as empty strings so the handler can
/// answer with a 400 of its own rather than an extractor rejection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SubmitExamRequest {
    #[serde(default)]
    pub user_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub answers: Option<Vec<SubmittedAnswer>>,
    #[serde(default, deserialize_with = "lenient_warnings")]
    pub warnings: Vec<WarningEntry>,
}

/// Response body of `POST /api/submit`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitExamResponse {
    pub message: String,
    pub correct: usize,
    pub total: usize,
    pub percentage: f64,
    pub answers: Vec<AnnotatedAnswer>,
}
