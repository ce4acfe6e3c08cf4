//! Interview session data
//!
//! - `Session` / `SessionRecord`: questions, permissions and persisted shape
//! - `Answer` / `Evaluation`: one of each per question, index aligned
//! - `SessionPhase` / `PhaseCell`: forward-only lifecycle with atomic transitions
//! - `QuestionClassifier`: coding vs free-response, from text only
//! - `SessionRepository`: persistence boundary

mod classifier;
mod model;
mod phase;
mod repository;

pub use classifier::{QuestionClassifier, QuestionKind};
pub use model::{
    check_session_id, Answer, AnswerContent, Evaluation, Modality, Permissions, Question, ReportReference, Session,
    SessionRecord, SessionResult,
};
pub use phase::{PhaseCell, SessionPhase};
pub use repository::{JsonFileRepository, SessionRepository};
