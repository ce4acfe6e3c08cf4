use std::time::Duration;

use crate::error::InterviewError;
use crate::session::{AnswerContent, Evaluation, ReportReference};

/// Scores finished answers of any modality
#[async_trait::async_trait]
pub trait EvaluationGateway: Send + Sync {
    async fn evaluate(
        &self,
        session_id: &str,
        question_index: usize,
        answer: &AnswerContent,
    ) -> Result<Evaluation, InterviewError>;
}

/// Produces the end-of-session report
#[async_trait::async_trait]
pub trait ReportService: Send + Sync {
    async fn generate_report(&self, session_id: &str) -> Result<ReportReference, InterviewError>;
}

/// Remote camera/attention monitoring. Best effort only.
#[async_trait::async_trait]
pub trait MonitoringService: Send + Sync {
    async fn start_monitoring(&self, session_id: &str, duration: Duration) -> Result<(), InterviewError>;
}
