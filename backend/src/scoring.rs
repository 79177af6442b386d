// src/scoring.rs

use std::collections::HashMap;

use crate::models::{
    exam_record::{AnnotatedAnswer, SubmittedAnswer},
    question::Question,
};

/// Outcome of scoring one submission against the full bank.
#[derive(Debug, Clone, PartialEq)]
pub struct Scorecard {
    pub correct: usize,
    pub total: usize,
    pub percentage: f64,
    pub answers: Vec<AnnotatedAnswer>,
}

/// Upper-cases and trims an option letter for comparison.
fn normalize_option(raw: &str) -> String {
    raw.trim().to_uppercase()
}

/// `correct / total * 100` rounded to two decimals, `0.0` for an empty bank.
pub fn round_percentage(correct: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let raw = (correct as f64 / total as f64) * 100.0;
    (raw * 100.0).round() / 100.0
}

/// Scores submitted answers against the question bank.
///
/// * Answers whose question id is not in the bank are skipped entirely.
/// * Letters are compared case and whitespace insensitively.
/// * `total` is the size of the whole bank, so unanswered questions count
///   against the student.
pub fn score_submission(bank: &[Question], submitted: &[SubmittedAnswer]) -> Scorecard {
    let by_id: HashMap<i64, &Question> = bank.iter().map(|q| (q.id, q)).collect();

    let mut correct = 0;
    let mut answers = Vec::with_capacity(submitted.len());

    for answer in submitted {
        let Some(question) = by_id.get(&answer.question_id) else {
            continue;
        };

        let selected = normalize_option(answer.selected_option.as_deref().unwrap_or(""));
        let expected = normalize_option(&question.correct);
        let is_correct = selected == expected;
        if is_correct {
            correct += 1;
        }

        answers.push(AnnotatedAnswer {
            question_id: question.id,
            question: question.question.clone(),
            options: question.options.clone(),
            selected_option: if selected.is_empty() { None } else { Some(selected) },
            correct_option: expected,
            is_correct,
        });
    }

    let total = bank.len();

    Scorecard {
        correct,
        total,
        percentage: round_percentage(correct, total),
        answers,
    }
}
