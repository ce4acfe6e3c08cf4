use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::session::{Evaluation, ReportReference};

/// Answer text sent to the scoring backend for a skipped question
pub const SKIPPED_ANSWER: &str = "[skipped]";

/// JSON body of `POST /api/submit-answer` (code, text and skipped answers)
#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitAnswerRequest {
    pub session_id: String,
    pub question_index: usize,
    pub answer: String,
    #[serde(rename = "type")]
    pub answer_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

/// Evaluation object as the backend returns it
#[derive(Debug, Deserialize)]
pub struct EvaluationPayload {
    pub overall_score: f64,
    #[serde(default)]
    pub category_scores: Option<BTreeMap<String, f64>>,
    #[serde(default)]
    pub strengths: Option<Vec<String>>,
    #[serde(default)]
    pub weaknesses: Option<Vec<String>>,
    #[serde(default)]
    pub detailed_feedback: Option<String>,
}

impl EvaluationPayload {
    /// Validate the payload and build an [`Evaluation`]. Nothing partial is
    /// ever produced: any out-of-range score rejects the whole payload.
    pub fn into_evaluation(self, transcript: Option<String>) -> Result<Evaluation, String> {
        if !(0.0..=100.0).contains(&self.overall_score) {
            return Err(format!("overall_score {} outside 0-100", self.overall_score));
        }

        let category_scores = self.category_scores.unwrap_or_default();
        if let Some((name, score)) = category_scores
            .iter()
            .find(|(_, score)| !(0.0..=100.0).contains(*score))
        {
            return Err(format!("category score {}={} outside 0-100", name, score));
        }

        Ok(Evaluation {
            overall_score: self.overall_score,
            category_scores,
            strengths: self.strengths.unwrap_or_default(),
            weaknesses: self.weaknesses.unwrap_or_default(),
            feedback: self.detailed_feedback.unwrap_or_default(),
            transcript,
        })
    }
}

/// Response of `POST /api/submit-answer`
#[derive(Debug, Deserialize)]
pub struct SubmitAnswerResponse {
    pub evaluation: Option<Value>,
    #[serde(default)]
    pub transcript: Option<String>,
}

/// Body of `POST /api/start-monitoring`
#[derive(Debug, Serialize, Deserialize)]
pub struct StartMonitoringRequest {
    pub session_id: String,
    /// Monitoring window in seconds
    pub duration: u64,
}

/// Body of `POST /api/generate-report`
#[derive(Debug, Serialize, Deserialize)]
pub struct GenerateReportRequest {
    pub session_id: String,
}

/// Response of `POST /api/generate-report`
#[derive(Debug, Default, Deserialize)]
pub struct GenerateReportResponse {
    #[serde(default)]
    pub report_path: Option<String>,
    #[serde(default)]
    pub report_url: Option<String>,
    #[serde(default)]
    pub final_assessment: Option<Value>,
    #[serde(default)]
    pub monitor_report: Option<String>,
    #[serde(default)]
    pub evaluations: Option<Value>,
}

impl From<GenerateReportResponse> for ReportReference {
    fn from(response: GenerateReportResponse) -> Self {
        Self {
            report_path: response.report_path,
            report_url: response.report_url,
            final_assessment: response.final_assessment,
            monitor_report: response.monitor_report,
        }
    }
}
