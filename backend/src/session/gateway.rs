// src/session/gateway.rs

use std::fmt;

use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

use crate::models::{
    exam_record::{SubmitExamRequest, SubmitExamResponse},
    question::PublicQuestion,
};

/// The API refuses clients that do not look like a browser.
const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (compatible; exam-guard-session)";

#[derive(Debug)]
pub enum GatewayError {
    /// Bad base URL or the request never completed.
    Transport(String),
    /// Non-success HTTP status, with the response body.
    Status(u16, String),
    Decode(String),
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GatewayError::Transport(msg) => write!(f, "transport error: {}", msg),
            GatewayError::Status(code, body) => write!(f, "server answered {}: {}", code, body),
            GatewayError::Decode(msg) => write!(f, "unreadable response: {}", msg),
        }
    }
}

impl std::error::Error for GatewayError {}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            GatewayError::Decode(err.to_string())
        } else {
            GatewayError::Transport(err.to_string())
        }
    }
}

impl From<url::ParseError> for GatewayError {
    fn from(err: url::ParseError) -> Self {
        GatewayError::Transport(err.to_string())
    }
}

/// The session's view of the exam server.
#[async_trait]
pub trait ExamGateway: Send + Sync {
    async fn fetch_questions(&self) -> Result<Vec<PublicQuestion>, GatewayError>;

    async fn submit(&self, request: &SubmitExamRequest) -> Result<SubmitExamResponse, GatewayError>;
}

#[derive(Debug, Deserialize)]
struct PaperEnvelope {
    #[serde(default)]
    questions: Vec<PublicQuestion>,
}

/// `ExamGateway` over HTTP against `/api/questions` and `/api/submit`.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: reqwest::Client,
    base: Url,
}

impl HttpGateway {
    pub fn new(base_url: &str) -> Result<Self, GatewayError> {
        let base = Url::parse(base_url)?;
        let client = reqwest::Client::builder()
            .user_agent(BROWSER_USER_AGENT)
            .build()?;

        Ok(Self { client, base })
    }

    fn endpoint(&self, path: &str) -> Result<Url, GatewayError> {
        Ok(self.base.join(path)?)
    }
}

async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, GatewayError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(GatewayError::Status(status.as_u16(), body))
}

#[async_trait]
impl ExamGateway for HttpGateway {
    async fn fetch_questions(&self) -> Result<Vec<PublicQuestion>, GatewayError> {
        let response = self.client.get(self.endpoint("/api/questions")?).send().await?;
        let envelope: PaperEnvelope = ensure_success(response).await?.json().await?;
        Ok(envelope.questions)
    }

    async fn submit(&self, request: &SubmitExamRequest) -> Result<SubmitExamResponse, GatewayError> {
        let response = self
            .client
            .post(self.endpoint("/api/submit")?)
            .json(request)
            .send()
            .await?;
        Ok(ensure_success(response).await?.json().await?)
    }
}
