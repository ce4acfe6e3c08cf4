//! HTTP control API for the candidate's browser
//!
//! - POST /sessions - Create (or reopen) an interview session
//! - GET /sessions/:id - Session status
//! - DELETE /sessions/:id - Abandon a session (cancels pending work)
//! - POST /sessions/:id/answers - Submit a text or code answer
//! - POST /sessions/:id/skip - Skip the current question
//! - POST /sessions/:id/run - Run code in the sandbox
//! - POST /sessions/:id/recording/{start,frames,stop} - Voice answers
//! - PUT /sessions/:id/permissions - Microphone/camera flags
//! - POST /sessions/:id/visibility - Page visibility changes (proctoring)
//! - POST /sessions/:id/finalize - End the session and generate the report
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
