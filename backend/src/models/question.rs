// src/models/question.rs

use std::fmt;

use serde::{Deserialize, Serialize};
use validator::Validate;

/// A question bank entry as persisted in `questions.json`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Question {
    pub id: i64,

    /// The prompt text.
    pub question: String,

    /// Exactly four option strings, in A..D order.
    pub options: Vec<String>,

    /// Correct option letter. Stored upper-case by the admin path, but hand
    /// edited files may contain anything, so scoring normalizes it again.
    pub correct: String,
}

/// DTO for sending a question to the student (excludes `correct`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PublicQuestion {
    pub id: i64,
    pub question: String,
    pub options: Vec<String>,
}

impl From<Question> for PublicQuestion {
    fn from(q: Question) -> Self {
        PublicQuestion {
            id: q.id,
            question: q.question,
            options: q.options,
        }
    }
}

/// One of the four answer slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OptionLetter {
    A,
    B,
    C,
    D,
}

impl OptionLetter {
    pub const ALL: [OptionLetter; 4] = [OptionLetter::A, OptionLetter::B, OptionLetter::C, OptionLetter::D];

    /// Maps an option position (0..4) to its letter.
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Case and whitespace insensitive parse.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "A" => Some(OptionLetter::A),
            "B" => Some(OptionLetter::B),
            "C" => Some(OptionLetter::C),
            "D" => Some(OptionLetter::D),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OptionLetter::A => "A",
            OptionLetter::B => "B",
            OptionLetter::C => "C",
            OptionLetter::D => "D",
        }
    }
}

impl fmt::Display for OptionLetter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// DTO for creating or replacing a question (admin).
/// Absent fields default to empty so validation reports them as a 400.
#[derive(Debug, Deserialize, Validate)]
pub struct QuestionPayload {
    #[serde(default)]
    #[validate(custom(function = validate_prompt))]
    pub question: String,
    #[serde(default)]
    #[validate(custom(function = validate_options))]
    pub options: Vec<String>,
    #[serde(default)]
    #[validate(custom(function = validate_correct))]
    pub correct: String,
}

impl QuestionPayload {
    /// Builds the stored form, normalizing the correct letter.
    pub fn into_question(self, id: i64) -> Question {
        Question {
            id,
            question: self.question.trim().to_string(),
            options: self.options,
            correct: self.correct.trim().to_ascii_uppercase(),
        }
    }
}

/// The prompt is stored trimmed, so it must survive trimming.
fn validate_prompt(question: &str) -> Result<(), validator::ValidationError> {
    if question.trim().is_empty() {
        return Err(validator::ValidationError::new("question_required"));
    }
    Ok(())
}

fn validate_options(options: &[String]) -> Result<(), validator::ValidationError> {
    if options.len() != 4 {
        return Err(validator::ValidationError::new("options_must_have_four_entries"));
    }
    Ok(())
}

fn validate_correct(correct: &str) -> Result<(), validator::ValidationError> {
    match OptionLetter::parse(correct) {
        Some(_) => Ok(()),
        None => Err(validator::ValidationError::new("correct_must_be_a_to_d")),
    }
}
