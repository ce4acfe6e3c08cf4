pub mod audio;
pub mod backend;
pub mod config;
pub mod controller;
pub mod error;
pub mod http;
mod net;
pub mod proctoring;
pub mod sandbox;
pub mod services;
pub mod session;
pub mod speech;

pub use audio::{
    AudioArtifact, AudioFrame, AudioRecordingManager, CaptureFormat, MicrophoneBackend, RecorderConfig,
    RecorderState, RemoteMicrophone,
};
pub use backend::{BackendClient, EvaluationGateway, MonitoringService, ReportService};
pub use config::Config;
pub use controller::{ControllerConfig, ControllerDeps, InterviewSessionController, SessionFinalizer};
pub use error::InterviewError;
pub use http::{create_router, AppState};
pub use proctoring::{ProctoringAlert, ProctoringMonitor, ProctoringPolicy, SessionTerminator};
pub use sandbox::{CodeSandbox, RunOutcome, SandboxClient};
pub use services::InterviewServices;
pub use session::{
    Answer, AnswerContent, Evaluation, Modality, QuestionClassifier, QuestionKind, Session,
    SessionPhase, SessionRepository,
};
pub use speech::{QuestionCueAnnouncer, SpeechSynthesizer};
