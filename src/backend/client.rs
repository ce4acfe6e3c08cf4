use reqwest::multipart::{Form, Part};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::gateway::{EvaluationGateway, MonitoringService, ReportService};
use super::messages::{
    EvaluationPayload, GenerateReportRequest, GenerateReportResponse, StartMonitoringRequest,
    SubmitAnswerRequest, SubmitAnswerResponse, SKIPPED_ANSWER,
};
use crate::error::InterviewError;
use crate::session::{AnswerContent, Evaluation, ReportReference};

/// Client for the scoring backend's `/api` surface
pub struct BackendClient {
    http: reqwest::Client,
    base_url: String,
}

impl BackendClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { http, base_url }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post_json<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<Value, InterviewError> {
        let endpoint = self.endpoint(path);
        let request = self.http.post(&endpoint).json(body);
        Self::send(endpoint, request).await
    }

    async fn send(endpoint: String, request: reqwest::RequestBuilder) -> Result<Value, InterviewError> {
        let response = request.send().await.map_err(|source| InterviewError::Transport {
            endpoint: endpoint.clone(),
            source,
        })?;

        let status = response.status();
        if !status.is_success() {
            warn!("{} returned {}", endpoint, status);
            return Err(InterviewError::HttpStatus { endpoint, status });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| InterviewError::MalformedResponse {
                endpoint,
                reason: e.to_string(),
            })
    }

    /// Extract an evaluation from a submit-answer body, or fail as malformed
    pub fn parse_evaluation(endpoint: &str, body: Value) -> Result<Evaluation, InterviewError> {
        let malformed = |reason: String| InterviewError::MalformedResponse {
            endpoint: endpoint.to_string(),
            reason,
        };

        let response: SubmitAnswerResponse =
            serde_json::from_value(body).map_err(|e| malformed(e.to_string()))?;

        let payload = match response.evaluation {
            Some(value @ Value::Object(_)) => value,
            Some(_) => return Err(malformed("evaluation is not an object".to_string())),
            None => return Err(malformed("missing evaluation".to_string())),
        };

        let payload: EvaluationPayload =
            serde_json::from_value(payload).map_err(|e| malformed(e.to_string()))?;

        payload.into_evaluation(response.transcript).map_err(malformed)
    }

    fn json_answer(session_id: &str, question_index: usize, answer: &AnswerContent) -> Option<SubmitAnswerRequest> {
        let (text, answer_type, language) = match answer {
            AnswerContent::Code { source, language } => (source.clone(), "code", Some(language.clone())),
            AnswerContent::Text { text } => (text.clone(), "text", None),
            AnswerContent::Skipped => (SKIPPED_ANSWER.to_string(), "text", None),
            AnswerContent::Voice { .. } => return None,
        };

        Some(SubmitAnswerRequest {
            session_id: session_id.to_string(),
            question_index,
            answer: text,
            answer_type: answer_type.to_string(),
            language,
        })
    }
}

#[async_trait::async_trait]
impl EvaluationGateway for BackendClient {
    async fn evaluate(
        &self,
        session_id: &str,
        question_index: usize,
        answer: &AnswerContent,
    ) -> Result<Evaluation, InterviewError> {
        let path = "/api/submit-answer";
        let endpoint = self.endpoint(path);
        info!(
            "Submitting {:?} answer for question {} of session {}",
            answer.modality(),
            question_index + 1,
            session_id
        );

        let body = match answer {
            AnswerContent::Voice { artifact } => {
                let bytes = artifact
                    .read_bytes()
                    .await
                    .map_err(InterviewError::Artifact)?;
                let audio = Part::bytes(bytes)
                    .file_name(artifact.file_name())
                    .mime_str("audio/wav")
                    .map_err(|source| InterviewError::Transport {
                        endpoint: endpoint.clone(),
                        source,
                    })?;
                let form = Form::new()
                    .text("session_id", session_id.to_string())
                    .text("question_index", question_index.to_string())
                    .part("audio", audio);

                Self::send(endpoint.clone(), self.http.post(&endpoint).multipart(form)).await?
            }
            other => {
                let request = Self::json_answer(session_id, question_index, other)
                    .ok_or_else(|| InterviewError::MalformedResponse {
                        endpoint: endpoint.clone(),
                        reason: "unsupported answer type".to_string(),
                    })?;
                self.post_json(path, &request).await?
            }
        };

        let evaluation = Self::parse_evaluation(&endpoint, body)?;
        debug!(
            "Question {} scored {:.0}",
            question_index + 1,
            evaluation.overall_score
        );
        Ok(evaluation)
    }
}

#[async_trait::async_trait]
impl MonitoringService for BackendClient {
    async fn start_monitoring(&self, session_id: &str, duration: Duration) -> Result<(), InterviewError> {
        let request = StartMonitoringRequest {
            session_id: session_id.to_string(),
            duration: duration.as_secs(),
        };
        self.post_json("/api/start-monitoring", &request).await?;
        info!("Remote monitoring started for {} ({}s)", session_id, request.duration);
        Ok(())
    }
}

#[async_trait::async_trait]
impl ReportService for BackendClient {
    async fn generate_report(&self, session_id: &str) -> Result<ReportReference, InterviewError> {
        let path = "/api/generate-report";
        let body = self
            .post_json(
                path,
                &GenerateReportRequest {
                    session_id: session_id.to_string(),
                },
            )
            .await?;

        let response: GenerateReportResponse =
            serde_json::from_value(body).map_err(|e| InterviewError::MalformedResponse {
                endpoint: self.endpoint(path),
                reason: e.to_string(),
            })?;

        info!(
            "Report generated for {}: {}",
            session_id,
            response
                .report_url
                .as_deref()
                .or(response.report_path.as_deref())
                .unwrap_or("<no location>")
        );

        Ok(response.into())
    }
}
