use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use crate::backend::ReportService;
use crate::error::InterviewError;
use crate::session::{Answer, Evaluation, Session, SessionPhase, SessionRepository, SessionResult};

/// Requests the report and persists the final bundle.
///
/// Issues at most one report request per call.
pub struct SessionFinalizer {
    reports: Arc<dyn ReportService>,
    repository: Arc<dyn SessionRepository>,
    report_timeout: Duration,
}

impl SessionFinalizer {
    pub fn new(
        reports: Arc<dyn ReportService>,
        repository: Arc<dyn SessionRepository>,
        report_timeout: Duration,
    ) -> Self {
        Self {
            reports,
            repository,
            report_timeout,
        }
    }

    /// Generate the report and save everything collected so far.
    ///
    /// A failed report is logged and recorded in the bundle; only a failure to
    /// persist the bundle is returned as an error.
    pub async fn finalize(
        &self,
        session: &Session,
        answers: Vec<Answer>,
        evaluations: Vec<Evaluation>,
        outcome: SessionPhase,
        strikes: u32,
    ) -> Result<SessionResult, InterviewError> {
        info!(
            "Finalizing session {} ({} answers, outcome={})",
            session.id,
            answers.len(),
            outcome
        );

        let report = match tokio::time::timeout(
            self.report_timeout,
            self.reports.generate_report(&session.id),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(InterviewError::Timeout {
                operation: "generate report",
                after: self.report_timeout,
            }),
        };

        let (report, report_error) = match report {
            Ok(reference) => (Some(reference), None),
            Err(e) => {
                error!("Report generation failed for {}: {}", session.id, e);
                (None, Some(e.to_string()))
            }
        };

        let result = SessionResult {
            session_id: session.id.clone(),
            questions: session.questions.clone(),
            answers,
            evaluations,
            report,
            report_error,
            outcome,
            strikes,
            finalized_at: Utc::now(),
        };

        self.repository
            .save_result(&result)
            .await
            .map_err(InterviewError::Storage)?;

        info!("Session {} results saved", session.id);
        Ok(result)
    }
}
