//! Scoring backend client
//!
//! - `POST /api/submit-answer` - score an answer (JSON or multipart audio)
//! - `POST /api/start-monitoring` - best-effort remote proctoring
//! - `POST /api/generate-report` - end-of-session report

mod client;
mod gateway;
pub mod messages;

pub use client::BackendClient;
pub use gateway::{EvaluationGateway, MonitoringService, ReportService};
