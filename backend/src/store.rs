// src/store.rs

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use chrono::Utc;
use serde::{Serialize, de::DeserializeOwned};
use tokio::sync::Mutex;

use crate::{
    error::AppError,
    models::{
        exam_record::{ExamRecord, SubmitExamRequest},
        question::Question,
    },
    scoring::Scorecard,
};

const QUESTIONS_FILE: &str = "questions.json";
const RESULTS_FILE: &str = "results.json";

/// Flat-file persistence for the question bank and the results log.
///
/// Every read-modify-write goes through `write_lock`, so concurrent
/// submissions never lose a record or reuse an id.
#[derive(Clone)]
pub struct JsonStore {
    questions_path: PathBuf,
    results_path: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl JsonStore {
    /// Opens (and creates if needed) the data directory, seeding the
    /// question bank with a few defaults when it does not exist yet.
    pub async fn open(data_dir: impl AsRef<Path>) -> Result<Self, AppError> {
        let data_dir = data_dir.as_ref();
        tokio::fs::create_dir_all(data_dir).await?;

        let store = Self {
            questions_path: data_dir.join(QUESTIONS_FILE),
            results_path: data_dir.join(RESULTS_FILE),
            write_lock: Arc::new(Mutex::new(())),
        };

        ensure_file(&store.questions_path, &default_questions()).await?;
        ensure_file(&store.results_path, &Vec::<ExamRecord>::new()).await?;

        Ok(store)
    }

    pub async fn questions(&self) -> Result<Vec<Question>, AppError> {
        Ok(read_list(&self.questions_path).await)
    }

    pub async fn results(&self) -> Result<Vec<ExamRecord>, AppError> {
        Ok(read_list(&self.results_path).await)
    }

    /// Appends a new result with the next sequence id and returns it.
    pub async fn append_result(
        &self,
        request: &SubmitExamRequest,
        card: &Scorecard,
    ) -> Result<ExamRecord, AppError> {
        let _guard = self.write_lock.lock().await;

        let mut results: Vec<ExamRecord> = read_list(&self.results_path).await;
        let record = ExamRecord {
            id: results.len() as i64 + 1,
            user_name: request.user_name.clone(),
            email: request.email.clone(),
            correct: card.correct,
            total: card.total,
            percentage: card.percentage,
            submitted_at: Utc::now(),
            warnings: request.warnings.clone(),
            answers: card.answers.clone(),
        };
        results.push(record.clone());
        write_list(&self.results_path, &results).await?;

        Ok(record)
    }

    /// Inserts a question built by `build` from the next free id.
    pub async fn insert_question<F>(&self, build: F) -> Result<Question, AppError>
    where
        F: FnOnce(i64) -> Question,
    {
        let _guard = self.write_lock.lock().await;

        let mut questions: Vec<Question> = read_list(&self.questions_path).await;
        let next_id = questions.last().map(|q| q.id + 1).unwrap_or(1);
        let question = build(next_id);
        questions.push(question.clone());
        write_list(&self.questions_path, &questions).await?;

        Ok(question)
    }

    /// Replaces the question with `id`. Returns `None` when it does not exist.
    pub async fn replace_question(&self, question: Question) -> Result<Option<Question>, AppError> {
        let _guard = self.write_lock.lock().await;

        let mut questions: Vec<Question> = read_list(&self.questions_path).await;
        let Some(slot) = questions.iter_mut().find(|q| q.id == question.id) else {
            return Ok(None);
        };
        *slot = question.clone();
        write_list(&self.questions_path, &questions).await?;

        Ok(Some(question))
    }

    /// Removes the question with `id`, returning the removed entry.
    pub async fn delete_question(&self, id: i64) -> Result<Option<Question>, AppError> {
        let _guard = self.write_lock.lock().await;

        let mut questions: Vec<Question> = read_list(&self.questions_path).await;
        let Some(index) = questions.iter().position(|q| q.id == id) else {
            return Ok(None);
        };
        let removed = questions.remove(index);
        write_list(&self.questions_path, &questions).await?;

        Ok(Some(removed))
    }
}

async fn ensure_file<T: Serialize>(path: &Path, initial: &T) -> Result<(), AppError> {
    if tokio::fs::try_exists(path).await? {
        return Ok(());
    }
    tracing::info!("Creating data file {}", path.display());
    let body = serde_json::to_string_pretty(initial)
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;
    tokio::fs::write(path, body).await?;
    Ok(())
}

/// Reads a JSON list. Missing, blank or corrupt files yield an empty list.
async fn read_list<T: DeserializeOwned>(path: &Path) -> Vec<T> {
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) => {
            tracing::warn!("Failed to read {}: {:?}", path.display(), e);
            return Vec::new();
        }
    };

    if raw.trim().is_empty() {
        return Vec::new();
    }

    serde_json::from_str(&raw).unwrap_or_else(|e| {
        tracing::warn!("Ignoring malformed {}: {:?}", path.display(), e);
        Vec::new()
    })
}

async fn write_list<T: Serialize>(path: &Path, items: &[T]) -> Result<(), AppError> {
    let body = serde_json::to_string_pretty(items)
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;
    tokio::fs::write(path, body).await?;
    Ok(())
}

fn default_questions() -> Vec<Question> {
    let seed = [
        (
            "Which HTML tag is used to include JavaScript code?",
            ["<script>", "<js>", "<javascript>", "<code>"],
            "A",
        ),
        (
            "Which HTTP method is generally used to create a new resource?",
            ["GET", "POST", "PUT", "DELETE"],
            "B",
        ),
        (
            "Which of the following is NOT a JavaScript data type?",
            ["Number", "String", "Float", "Boolean"],
            "C",
        ),
    ];

    seed.iter()
        .enumerate()
        .map(|(i, (question, options, correct))| Question {
            id: i as i64 + 1,
            question: question.to_string(),
            options: options.iter().map(|o| o.to_string()).collect(),
            correct: correct.to_string(),
        })
        .collect()
}
