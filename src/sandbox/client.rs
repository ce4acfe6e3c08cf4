use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use super::languages::language_id;
use crate::error::InterviewError;

/// Result of one sandbox run. All three are successful calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunOutcome {
    Success { stdout: String },
    CompileError { compile_output: String },
    RuntimeError { stderr: String },
}

/// Remote code execution
#[async_trait::async_trait]
pub trait CodeSandbox: Send + Sync {
    async fn run(&self, source_code: &str, language: &str) -> Result<RunOutcome, InterviewError>;
}

#[derive(Debug, Serialize)]
struct SubmissionRequest<'a> {
    source_code: &'a str,
    language_id: u32,
}

/// HTTP client for a Judge0-style sandbox (`POST {source_code, language_id}`)
pub struct SandboxClient {
    http: reqwest::Client,
    submissions_url: String,
}

impl SandboxClient {
    pub fn new(http: reqwest::Client, submissions_url: impl Into<String>) -> Self {
        Self {
            http,
            submissions_url: submissions_url.into(),
        }
    }

    /// Turn a sandbox response body into an outcome.
    ///
    /// Compile output wins over stderr, which wins over stdout. A body with
    /// none of the three fields is malformed.
    pub fn parse_outcome(endpoint: &str, body: &Value) -> Result<RunOutcome, InterviewError> {
        let malformed = |reason: &str| InterviewError::MalformedResponse {
            endpoint: endpoint.to_string(),
            reason: reason.to_string(),
        };

        let fields = body.as_object().ok_or_else(|| malformed("expected a JSON object"))?;
        if !["stdout", "stderr", "compile_output"]
            .iter()
            .any(|key| fields.contains_key(*key))
        {
            return Err(malformed("missing stdout, stderr and compile_output"));
        }

        let text = |key: &str| {
            fields
                .get(key)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        if let Some(compile_output) = text("compile_output") {
            return Ok(RunOutcome::CompileError { compile_output });
        }
        if let Some(stderr) = text("stderr") {
            return Ok(RunOutcome::RuntimeError { stderr });
        }
        Ok(RunOutcome::Success {
            stdout: text("stdout").unwrap_or_default(),
        })
    }
}

#[async_trait::async_trait]
impl CodeSandbox for SandboxClient {
    async fn run(&self, source_code: &str, language: &str) -> Result<RunOutcome, InterviewError> {
        let language_id = language_id(language);
        info!("Submitting code to sandbox (language={}, id={})", language, language_id);

        let response = self
            .http
            .post(&self.submissions_url)
            .json(&SubmissionRequest {
                source_code,
                language_id,
            })
            .send()
            .await
            .map_err(|source| InterviewError::Transport {
                endpoint: self.submissions_url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(InterviewError::HttpStatus {
                endpoint: self.submissions_url.clone(),
                status,
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| InterviewError::MalformedResponse {
                endpoint: self.submissions_url.clone(),
                reason: e.to_string(),
            })?;

        let outcome = Self::parse_outcome(&self.submissions_url, &body)?;
        debug!("Sandbox outcome: {:?}", outcome);
        Ok(outcome)
    }
}
