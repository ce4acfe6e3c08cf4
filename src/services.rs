//! Wiring: builds a controller (and its per-session devices) from shared clients.

use anyhow::{Context, Result};
use std::sync::Arc;

use crate::audio::{AudioRecordingManager, RemoteMicrophone};
use crate::backend::{BackendClient, EvaluationGateway, MonitoringService, ReportService};
use crate::config::Config;
use crate::controller::{ControllerDeps, InterviewSessionController, SessionFinalizer};
use crate::error::InterviewError;
use crate::proctoring::ProctoringMonitor;
use crate::sandbox::{CodeSandbox, SandboxClient};
use crate::session::{check_session_id, JsonFileRepository, Session, SessionPhase, SessionRepository};
use crate::speech::{LoggingSynthesizer, QuestionCueAnnouncer, SpeechSynthesizer};

/// A live session: its controller plus the microphone the client streams into
pub struct SessionHandle {
    pub controller: InterviewSessionController,
    pub microphone: Arc<RemoteMicrophone>,
}

/// Clients shared by every session
#[derive(Clone)]
pub struct InterviewServices {
    pub config: Config,
    pub gateway: Arc<dyn EvaluationGateway>,
    pub reports: Arc<dyn ReportService>,
    pub monitoring: Arc<dyn MonitoringService>,
    pub sandbox: Arc<dyn CodeSandbox>,
    pub repository: Arc<dyn SessionRepository>,
    pub synthesizer: Arc<dyn SpeechSynthesizer>,
}

impl InterviewServices {
    pub fn from_config(config: Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("interview-proctor/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;

        let backend = Arc::new(BackendClient::new(http.clone(), &config.backend.base_url));
        let sandbox = Arc::new(SandboxClient::new(http, &config.sandbox.submissions_url));
        let repository = Arc::new(JsonFileRepository::new(&config.storage.sessions_path)?);

        Ok(Self {
            gateway: backend.clone(),
            reports: backend.clone(),
            monitoring: backend,
            sandbox,
            repository,
            synthesizer: Arc::new(LoggingSynthesizer),
            config,
        })
    }

    fn deps(&self, microphone: Arc<RemoteMicrophone>) -> Result<ControllerDeps, InterviewError> {
        let recorder = AudioRecordingManager::new(microphone, self.config.recorder())
            .map_err(InterviewError::Artifact)?;

        Ok(ControllerDeps {
            gateway: Arc::clone(&self.gateway),
            sandbox: Arc::clone(&self.sandbox),
            monitoring: Arc::clone(&self.monitoring),
            repository: Arc::clone(&self.repository),
            finalizer: SessionFinalizer::new(
                Arc::clone(&self.reports),
                Arc::clone(&self.repository),
                self.config.report_timeout(),
            ),
            recorder,
            announcer: QuestionCueAnnouncer::new(Arc::clone(&self.synthesizer)),
            monitor: ProctoringMonitor::new(self.config.proctoring_policy()),
        })
    }

    fn microphone(&self, granted: bool) -> Arc<RemoteMicrophone> {
        let microphone = Arc::new(RemoteMicrophone::new(self.config.audio.client_formats.clone()));
        microphone.set_granted(granted);
        microphone
    }

    /// Persist and start a brand-new session
    pub async fn create_session(&self, session: Session) -> Result<SessionHandle, InterviewError> {
        let microphone = self.microphone(session.permissions.mic);
        let deps = self.deps(Arc::clone(&microphone))?;
        let controller =
            InterviewSessionController::create(session, deps, self.config.controller()).await?;
        controller.start().await?;

        Ok(SessionHandle {
            controller,
            microphone,
        })
    }

    /// Start a session whose record is already in the repository.
    /// Finished sessions are opened read-only and not restarted.
    pub async fn open_session(&self, session_id: &str) -> Result<SessionHandle, InterviewError> {
        check_session_id(session_id)?;
        let record = self
            .repository
            .load(session_id)
            .await
            .map_err(InterviewError::Storage)?
            .ok_or_else(|| InterviewError::UnknownSession(session_id.to_string()))?;

        let microphone = self.microphone(record.permissions.mic);
        let deps = self.deps(Arc::clone(&microphone))?;
        let controller =
            InterviewSessionController::open(session_id, deps, self.config.controller()).await?;
        if controller.phase() == SessionPhase::InProgress {
            controller.start().await?;
        }

        Ok(SessionHandle {
            controller,
            microphone,
        })
    }
}
