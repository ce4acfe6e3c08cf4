use super::state::AppState;
use crate::controller::{SessionStatus, Submission};
use crate::error::InterviewError;
use crate::proctoring::{ProctoringAlert, ProctoringState};
use crate::sandbox::RunOutcome;
use crate::services::SessionHandle;
use crate::session::{
    check_session_id, AnswerContent, Permissions, Question, Session, SessionPhase, SessionResult,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    /// Existing session to open, or id for a new one (generated if absent)
    pub session_id: Option<String>,

    /// Questions for a new session. When absent, `session_id` must name a stored session.
    pub questions: Option<Vec<String>>,

    pub resume_path: Option<String>,

    pub permissions: Option<Permissions>,
}

#[derive(Debug, Serialize)]
pub struct CreateSessionResponse {
    pub session_id: String,
    pub status: SessionStatus,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WrittenAnswerType {
    Text,
    Code,
}

#[derive(Debug, Deserialize)]
pub struct AnswerRequest {
    #[serde(rename = "type")]
    pub answer_type: WrittenAnswerType,
    pub answer: String,
    /// Editor language for code answers
    pub language: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RunCodeRequest {
    pub source_code: String,
    pub language: String,
}

#[derive(Debug, Deserialize)]
pub struct AudioFramesRequest {
    /// Base64-encoded PCM bytes (i16, little endian, interleaved)
    pub pcm: String,
    pub sample_rate: u32,
    pub channels: u16,
}

#[derive(Debug, Deserialize)]
pub struct VisibilityRequest {
    pub hidden: bool,
}

#[derive(Debug, Serialize)]
pub struct VisibilityResponse {
    pub alert: Option<ProctoringAlert>,
    pub proctoring: ProctoringState,
    pub phase: SessionPhase,
}

#[derive(Debug, Serialize)]
pub struct FinalizeResponse {
    pub phase: SessionPhase,
    pub result: Option<SessionResult>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

// ============================================================================
// Helpers
// ============================================================================

fn status_for(e: &InterviewError) -> StatusCode {
    match e {
        InterviewError::PermissionDenied(_) => StatusCode::FORBIDDEN,
        InterviewError::UnknownSession(_) => StatusCode::NOT_FOUND,
        InterviewError::InvalidSessionId(_) | InterviewError::InvalidFrame(_) => StatusCode::BAD_REQUEST,
        InterviewError::UnsupportedFormat | InterviewError::NoAudioCaptured => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        InterviewError::NotAcceptingInput(_)
        | InterviewError::SessionExists(_)
        | InterviewError::SubmissionInFlight(_)
        | InterviewError::RecorderBusy(_)
        | InterviewError::NotRecording => StatusCode::CONFLICT,
        InterviewError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        InterviewError::Cancelled(_) => StatusCode::SERVICE_UNAVAILABLE,
        e if e.is_transport() => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

fn interview_error(e: InterviewError) -> Response {
    let status = status_for(&e);
    if status.is_server_error() {
        error!("Request failed: {}", e);
    } else {
        warn!("Request rejected: {}", e);
    }
    error_response(status, e.to_string())
}

async fn lookup(state: &AppState, session_id: &str) -> Result<Arc<SessionHandle>, Response> {
    state.get(session_id).await.ok_or_else(|| {
        error_response(
            StatusCode::NOT_FOUND,
            format!("Session {} not found", session_id),
        )
    })
}

fn submission_response(result: Result<Submission, InterviewError>) -> Response {
    match result {
        Ok(submission) => (StatusCode::OK, Json(submission)).into_response(),
        Err(e) => interview_error(e),
    }
}

fn decode_pcm(encoded: &str) -> Result<Vec<i16>, String> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .map_err(|e| format!("Invalid base64 PCM: {}", e))?;
    if bytes.len() % 2 != 0 {
        return Err("PCM byte length must be even".to_string());
    }
    Ok(bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect())
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /health
pub async fn health_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "healthy",
            "service": "interview-proctor",
            "version": env!("CARGO_PKG_VERSION"),
        })),
    )
}

/// POST /sessions
/// Create a new session, or open a stored one
pub async fn create_session(
    State(state): State<AppState>,
    Json(req): Json<CreateSessionRequest>,
) -> Response {
    let session_id = match req.session_id {
        Some(id) => id,
        None if req.questions.is_some() => uuid::Uuid::new_v4().to_string(),
        None => {
            return error_response(
                StatusCode::BAD_REQUEST,
                "Either questions or session_id is required",
            )
        }
    };
    if let Err(e) = check_session_id(&session_id) {
        return interview_error(e);
    }

    // Held until the handle is live so concurrent requests for one id cannot both start it.
    let Some(reservation) = state.reserve(&session_id).await else {
        return error_response(
            StatusCode::CONFLICT,
            format!("Session {} is already running", session_id),
        );
    };

    let handle = match req.questions {
        Some(questions) => {
            if questions.is_empty() {
                return error_response(StatusCode::BAD_REQUEST, "At least one question is required");
            }
            let mut session = Session::new(
                session_id.clone(),
                questions.into_iter().map(Question::new).collect(),
            )
            .with_permissions(req.permissions.unwrap_or_default());
            session.resume_path = req.resume_path;

            state.services.create_session(session).await
        }
        None => state.services.open_session(&session_id).await,
    };

    let handle = match handle {
        Ok(handle) => Arc::new(handle),
        Err(e) => return interview_error(e),
    };

    let status = handle.controller.status();
    state.publish(reservation, handle).await;

    info!("Session {} is live ({})", session_id, status.phase);

    (
        StatusCode::CREATED,
        Json(CreateSessionResponse { session_id, status }),
    )
        .into_response()
}

/// GET /sessions/:id
pub async fn get_session(State(state): State<AppState>, Path(session_id): Path<String>) -> Response {
    match lookup(&state, &session_id).await {
        Ok(handle) => (StatusCode::OK, Json(handle.controller.status())).into_response(),
        Err(response) => response,
    }
}

/// DELETE /sessions/:id
/// Candidate navigated away: cancel outbound calls, release devices, forget the session
pub async fn close_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Response {
    let handle = {
        let mut sessions = state.sessions.write().await;
        sessions.remove(&session_id)
    };

    match handle {
        Some(handle) => {
            handle.controller.shutdown();
            info!("Session {} closed", session_id);
            (StatusCode::OK, Json(handle.controller.status())).into_response()
        }
        None => error_response(
            StatusCode::NOT_FOUND,
            format!("Session {} not found", session_id),
        ),
    }
}

/// POST /sessions/:id/answers
pub async fn submit_answer(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(req): Json<AnswerRequest>,
) -> Response {
    let handle = match lookup(&state, &session_id).await {
        Ok(handle) => handle,
        Err(response) => return response,
    };

    let content = match req.answer_type {
        WrittenAnswerType::Text => AnswerContent::Text { text: req.answer },
        WrittenAnswerType::Code => AnswerContent::Code {
            source: req.answer,
            language: req.language.unwrap_or_else(|| "python".to_string()),
        },
    };

    submission_response(handle.controller.submit_answer(content).await)
}

/// POST /sessions/:id/skip
pub async fn skip_question(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Response {
    match lookup(&state, &session_id).await {
        Ok(handle) => submission_response(handle.controller.skip().await),
        Err(response) => response,
    }
}

/// POST /sessions/:id/run
pub async fn run_code(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(req): Json<RunCodeRequest>,
) -> Response {
    let handle = match lookup(&state, &session_id).await {
        Ok(handle) => handle,
        Err(response) => return response,
    };

    match handle.controller.run_code(&req.source_code, &req.language).await {
        Ok(outcome) => (StatusCode::OK, Json::<RunOutcome>(outcome)).into_response(),
        Err(e) => interview_error(e),
    }
}

/// POST /sessions/:id/recording/start
pub async fn start_recording(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Response {
    let handle = match lookup(&state, &session_id).await {
        Ok(handle) => handle,
        Err(response) => return response,
    };

    match handle.controller.start_voice_answer().await {
        Ok(()) => (StatusCode::OK, Json(handle.controller.status())).into_response(),
        Err(e) => interview_error(e),
    }
}

/// POST /sessions/:id/recording/frames
pub async fn push_audio_frames(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(req): Json<AudioFramesRequest>,
) -> Response {
    let handle = match lookup(&state, &session_id).await {
        Ok(handle) => handle,
        Err(response) => return response,
    };

    let samples = match decode_pcm(&req.pcm) {
        Ok(samples) => samples,
        Err(message) => return error_response(StatusCode::BAD_REQUEST, message),
    };

    match handle
        .microphone
        .push(samples, req.sample_rate, req.channels)
        .await
    {
        Ok(()) => StatusCode::ACCEPTED.into_response(),
        Err(e) => interview_error(e),
    }
}

/// POST /sessions/:id/recording/stop
/// Stop recording and submit the captured audio
pub async fn stop_recording(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Response {
    match lookup(&state, &session_id).await {
        Ok(handle) => submission_response(handle.controller.finish_voice_answer().await),
        Err(response) => response,
    }
}

/// PUT /sessions/:id/permissions
pub async fn update_permissions(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(permissions): Json<Permissions>,
) -> Response {
    let handle = match lookup(&state, &session_id).await {
        Ok(handle) => handle,
        Err(response) => return response,
    };

    handle.microphone.set_granted(permissions.mic);
    match handle.controller.update_permissions(permissions).await {
        Ok(()) => (StatusCode::OK, Json(handle.controller.status())).into_response(),
        Err(e) => interview_error(e),
    }
}

/// POST /sessions/:id/visibility
pub async fn report_visibility(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(req): Json<VisibilityRequest>,
) -> Response {
    let handle = match lookup(&state, &session_id).await {
        Ok(handle) => handle,
        Err(response) => return response,
    };

    let alert = handle.controller.report_visibility(req.hidden).await;

    (
        StatusCode::OK,
        Json(VisibilityResponse {
            alert,
            proctoring: handle.controller.proctoring_state(),
            phase: handle.controller.phase(),
        }),
    )
        .into_response()
}

/// POST /sessions/:id/finalize
pub async fn finalize_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Response {
    let handle = match lookup(&state, &session_id).await {
        Ok(handle) => handle,
        Err(response) => return response,
    };

    match handle.controller.finalize().await {
        Ok(result) => (
            StatusCode::OK,
            Json(FinalizeResponse {
                phase: handle.controller.phase(),
                result: result.or_else(|| handle.controller.result()),
            }),
        )
            .into_response(),
        Err(e) => interview_error(e),
    }
}
