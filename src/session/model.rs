use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::phase::SessionPhase;
use crate::audio::AudioArtifact;
use crate::error::InterviewError;

const MAX_SESSION_ID_LEN: usize = 128;

/// Session ids name files and recordings, so only `[A-Za-z0-9_-]{1,128}` is accepted
pub fn check_session_id(id: &str) -> Result<(), InterviewError> {
    let valid = !id.is_empty()
        && id.len() <= MAX_SESSION_ID_LEN
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(InterviewError::InvalidSessionId(id.to_string()))
    }
}

/// A single interview prompt. Immutable once the session is loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Question {
    pub text: String,
}

impl Question {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// Browser permission flags captured when the session starts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permissions {
    pub mic: bool,
    pub camera: bool,
}

impl Permissions {
    pub fn all_granted(&self) -> bool {
        self.mic && self.camera
    }
}

/// The interview being driven by the controller
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub questions: Vec<Question>,
    pub permissions: Permissions,
    pub resume_path: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn new(id: impl Into<String>, questions: Vec<Question>) -> Self {
        Self {
            id: id.into(),
            questions,
            permissions: Permissions::default(),
            resume_path: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_permissions(mut self, permissions: Permissions) -> Self {
        self.permissions = permissions;
        self
    }

    pub fn to_record(&self) -> SessionRecord {
        SessionRecord {
            session_id: self.id.clone(),
            questions: self.questions.clone(),
            question_count: self.questions.len(),
            resume_path: self.resume_path.clone(),
            created_at: self.created_at,
            permissions: self.permissions,
            permissions_granted: self.permissions.all_granted(),
        }
    }
}

impl From<SessionRecord> for Session {
    fn from(record: SessionRecord) -> Self {
        Self {
            id: record.session_id,
            questions: record.questions,
            permissions: record.permissions,
            resume_path: record.resume_path,
            created_at: record.created_at,
        }
    }
}

/// On-disk shape of a session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_id: String,
    pub questions: Vec<Question>,
    pub question_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resume_path: Option<String>,
    pub created_at: DateTime<Utc>,
    pub permissions: Permissions,
    pub permissions_granted: bool,
}

/// Answer capture mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Voice,
    Code,
    Text,
    Skipped,
}

/// Raw content of an answer, tagged by modality
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AnswerContent {
    Voice { artifact: AudioArtifact },
    Code { source: String, language: String },
    Text { text: String },
    Skipped,
}

impl AnswerContent {
    pub fn modality(&self) -> Modality {
        match self {
            AnswerContent::Voice { .. } => Modality::Voice,
            AnswerContent::Code { .. } => Modality::Code,
            AnswerContent::Text { .. } => Modality::Text,
            AnswerContent::Skipped => Modality::Skipped,
        }
    }
}

/// A submitted answer. Never mutated after it is recorded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub question_index: usize,
    pub content: AnswerContent,
    pub submitted_at: DateTime<Utc>,
}

impl Answer {
    pub fn modality(&self) -> Modality {
        self.content.modality()
    }
}

/// Score and feedback for one answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    /// Overall score, 0-100
    pub overall_score: f64,
    #[serde(default)]
    pub category_scores: BTreeMap<String, f64>,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub weaknesses: Vec<String>,
    #[serde(default)]
    pub feedback: String,
    /// Transcript echoed by the scoring backend, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript: Option<String>,
}

impl Evaluation {
    /// Local stand-in used when a skipped question cannot be scored remotely
    pub fn skipped_fallback() -> Self {
        Self {
            overall_score: 0.0,
            category_scores: BTreeMap::new(),
            strengths: Vec::new(),
            weaknesses: vec!["Question skipped".to_string()],
            feedback: "The question was skipped and could not be scored.".to_string(),
            transcript: None,
        }
    }
}

/// Reference to the report produced by the backend
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportReference {
    pub report_path: Option<String>,
    pub report_url: Option<String>,
    pub final_assessment: Option<serde_json::Value>,
    /// Proctoring report generated alongside the interview report
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monitor_report: Option<String>,
}

/// Everything persisted once the session ends
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResult {
    pub session_id: String,
    pub questions: Vec<Question>,
    pub answers: Vec<Answer>,
    pub evaluations: Vec<Evaluation>,
    pub report: Option<ReportReference>,
    /// Why the report is missing, when generation failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_error: Option<String>,
    pub outcome: SessionPhase,
    pub strikes: u32,
    pub finalized_at: DateTime<Utc>,
}
