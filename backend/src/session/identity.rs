// src/session/identity.rs

use std::{
    collections::BTreeSet,
    path::{Path, PathBuf},
    sync::LazyLock,
};

use regex::Regex;

use crate::session::error::SessionError;

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid"));

/// Who is taking the exam. Lives for one browser session only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionIdentity {
    pub name: String,
    pub email: String,
}

impl SessionIdentity {
    /// Text repeated across the watermark overlay.
    pub fn watermark(&self) -> String {
        format!("{} • {}", self.name, self.email)
    }
}

/// Durable per-email "already submitted" flags.
pub trait CompletionMarkers: Send {
    fn is_submitted(&self, email: &str) -> bool;
    fn mark_submitted(&mut self, email: &str) -> Result<(), SessionError>;
}

/// Validates the login form and refuses emails that already submitted.
pub fn login(
    name: &str,
    email: &str,
    markers: &dyn CompletionMarkers,
) -> Result<SessionIdentity, SessionError> {
    let name = name.trim();
    let email = email.trim();

    if name.is_empty() {
        return Err(SessionError::InvalidName);
    }
    if !EMAIL_RE.is_match(email) {
        return Err(SessionError::InvalidEmail);
    }
    if markers.is_submitted(email) {
        return Err(SessionError::AlreadySubmitted(email.to_string()));
    }

    Ok(SessionIdentity {
        name: name.to_string(),
        email: email.to_string(),
    })
}

#[derive(Debug, Default)]
pub struct MemoryMarkers {
    emails: BTreeSet<String>,
}

impl MemoryMarkers {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CompletionMarkers for MemoryMarkers {
    fn is_submitted(&self, email: &str) -> bool {
        self.emails.contains(email)
    }

    fn mark_submitted(&mut self, email: &str) -> Result<(), SessionError> {
        self.emails.insert(email.to_string());
        Ok(())
    }
}

/// Markers persisted as a JSON array of emails.
#[derive(Debug)]
pub struct FileMarkers {
    path: PathBuf,
    emails: BTreeSet<String>,
}

impl FileMarkers {
    /// Loads existing markers. A missing or unreadable file starts empty.
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let emails = std::fs::read_to_string(&path)
            .ok()
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default();

        Self { path, emails }
    }
}

impl CompletionMarkers for FileMarkers {
    fn is_submitted(&self, email: &str) -> bool {
        self.emails.contains(email)
    }

    fn mark_submitted(&mut self, email: &str) -> Result<(), SessionError> {
        if !self.emails.insert(email.to_string()) {
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(&self.emails)?)?;
        Ok(())
    }
}
