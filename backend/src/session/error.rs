// src/session/error.rs

use std::fmt;

/// Failures of the student-side session.
///
/// The first four are preconditions: the caller should leave the exam page
/// rather than try to recover inside the session.
#[derive(Debug)]
pub enum SessionError {
    MissingIdentity,
    InvalidName,
    InvalidEmail,
    AlreadySubmitted(String),

    /// The fetched paper was empty; the session stays non-interactive.
    NoQuestions,

    /// The completion marker store could not be read or written.
    Storage(String),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::MissingIdentity => write!(f, "No exam identity, please log in first"),
            SessionError::InvalidName => write!(f, "Name required"),
            SessionError::InvalidEmail => write!(f, "Invalid Email"),
            SessionError::AlreadySubmitted(email) => write!(
                f,
                "You already submitted the exam ({}). Reattempt not allowed.",
                email
            ),
            SessionError::NoQuestions => write!(f, "No questions configured."),
            SessionError::Storage(msg) => write!(f, "Marker storage error: {}", msg),
        }
    }
}

impl std::error::Error for SessionError {}

impl From<std::io::Error> for SessionError {
    fn from(err: std::io::Error) -> Self {
        SessionError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for SessionError {
    fn from(err: serde_json::Error) -> Self {
        SessionError::Storage(err.to_string())
    }
}
