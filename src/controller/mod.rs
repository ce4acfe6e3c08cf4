//! Interview session orchestration
//!
//! `InterviewSessionController` walks the candidate through the question list:
//! announce → capture (voice / code / text) → score → advance, and ends the
//! session exactly once through `SessionFinalizer`, whether the last answer
//! or the proctoring strike limit gets there first.

mod controller;
mod finalizer;

pub use controller::{ControllerConfig, ControllerDeps, InterviewSessionController, SessionStatus, Submission};
pub use finalizer::SessionFinalizer;
