//! Error taxonomy shared by every collaborator of the session controller.

use std::time::Duration;

use thiserror::Error;

use crate::audio::RecorderState;
use crate::session::SessionPhase;

/// Capture device guarded by a browser/OS permission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Device {
    Microphone,
}

impl std::fmt::Display for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Device::Microphone => f.write_str("microphone"),
        }
    }
}

/// Errors surfaced by the interview session and its collaborators.
///
/// Everything except an exhausted strike budget leaves the session
/// `InProgress`, so callers may retry or skip.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum InterviewError {
    #[error("{0} permission denied")]
    PermissionDenied(Device),
    #[error("no supported audio capture format")]
    UnsupportedFormat,
    #[error("invalid audio frame: {0}")]
    InvalidFrame(String),
    #[error("request to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{endpoint} returned status {status}")]
    HttpStatus {
        endpoint: String,
        status: reqwest::StatusCode,
    },
    #[error("malformed response from {endpoint}: {reason}")]
    MalformedResponse { endpoint: String, reason: String },
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },
    #[error("{0} was cancelled")]
    Cancelled(&'static str),
    #[error("session is not accepting input (phase: {0})")]
    NotAcceptingInput(SessionPhase),
    #[error("an answer for question {0} is already being submitted")]
    SubmissionInFlight(usize),
    #[error("recorder is busy ({0})")]
    RecorderBusy(RecorderState),
    #[error("unknown session {0}")]
    UnknownSession(String),
    #[error("invalid session id {0:?}: use 1-128 ASCII letters, digits, '-' or '_'")]
    InvalidSessionId(String),
    #[error("session {0} already exists")]
    SessionExists(String),
    #[error("no recording in progress")]
    NotRecording,
    #[error("no audio was captured")]
    NoAudioCaptured,
    #[error("failed to write audio artifact: {0:#}")]
    Artifact(#[source] anyhow::Error),
    #[error("storage error: {0:#}")]
    Storage(#[source] anyhow::Error),
}

impl InterviewError {
    /// Transport, status and malformed-body failures are all treated the same
    /// way by the controller: the answer stays unsubmitted.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            InterviewError::Transport { .. }
                | InterviewError::HttpStatus { .. }
                | InterviewError::MalformedResponse { .. }
                | InterviewError::Timeout { .. }
        )
    }
}
