use chrono::Utc;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::finalizer::SessionFinalizer;
use crate::audio::{AudioRecordingManager, RecorderState};
use crate::backend::{EvaluationGateway, MonitoringService};
use crate::error::InterviewError;
use crate::net::bounded;
use crate::proctoring::{ProctoringAlert, ProctoringMonitor, ProctoringState, SessionTerminator};
use crate::sandbox::{CodeSandbox, RunOutcome};
use crate::session::{
    check_session_id, Answer, AnswerContent, Evaluation, Modality, PhaseCell, Permissions, Question, QuestionClassifier,
    QuestionKind, Session, SessionPhase, SessionRepository, SessionResult,
};
use crate::speech::QuestionCueAnnouncer;

/// Timeouts and monitoring window for one session
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Upper bound on every answer/sandbox/monitoring call
    pub call_timeout: Duration,
    /// Window requested from the remote monitoring service
    pub monitoring_duration: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(60),
            monitoring_duration: Duration::from_secs(180),
        }
    }
}

/// Collaborators wired into a controller
pub struct ControllerDeps {
    pub gateway: Arc<dyn EvaluationGateway>,
    pub sandbox: Arc<dyn CodeSandbox>,
    pub monitoring: Arc<dyn MonitoringService>,
    pub repository: Arc<dyn SessionRepository>,
    pub finalizer: SessionFinalizer,
    pub recorder: AudioRecordingManager,
    pub announcer: QuestionCueAnnouncer,
    pub monitor: ProctoringMonitor,
}

/// Result of a successful submit or skip
#[derive(Debug, Clone, Serialize)]
pub struct Submission {
    pub question_index: usize,
    pub evaluation: Evaluation,
    /// Index of the question now being asked, `None` once the last one is answered
    pub next_question: Option<usize>,
    pub phase: SessionPhase,
}

/// Point-in-time view of a session
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub session_id: String,
    pub phase: SessionPhase,
    pub current_index: usize,
    pub question_count: usize,
    pub current_question: Option<String>,
    pub question_kind: Option<QuestionKind>,
    pub answered: usize,
    pub permissions: Permissions,
    pub recorder: RecorderState,
    pub proctoring: ProctoringState,
    pub result: Option<SessionResult>,
}

#[derive(Default)]
struct Progress {
    index: usize,
    answers: Vec<Answer>,
    evaluations: Vec<Evaluation>,
    result: Option<SessionResult>,
}

/// Releases the single submission slot when a submit returns
struct SubmissionSlot<'a>(&'a AtomicBool);

impl Drop for SubmissionSlot<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Drives one candidate through the question list.
///
/// Only `phase` is contended by concurrent triggers (last answer vs. strike
/// limit); it moves through compare-and-set so the session is finalized once.
pub struct InterviewSessionController {
    session: RwLock<Session>,
    progress: Mutex<Progress>,
    phase: PhaseCell,
    submitting: AtomicBool,

    gateway: Arc<dyn EvaluationGateway>,
    sandbox: Arc<dyn CodeSandbox>,
    monitoring: Arc<dyn MonitoringService>,
    repository: Arc<dyn SessionRepository>,
    finalizer: SessionFinalizer,
    recorder: AudioRecordingManager,
    announcer: QuestionCueAnnouncer,
    monitor: ProctoringMonitor,

    config: ControllerConfig,
    cancel_tx: watch::Sender<bool>,
    cancel_rx: watch::Receiver<bool>,
}

impl InterviewSessionController {
    /// Persist a new session and build its controller.
    ///
    /// Fails with [`InterviewError::SessionExists`] if the id is already stored.
    pub async fn create(
        session: Session,
        deps: ControllerDeps,
        config: ControllerConfig,
    ) -> Result<Self, InterviewError> {
        check_session_id(&session.id)?;

        let created = deps
            .repository
            .create(&session.to_record())
            .await
            .map_err(InterviewError::Storage)?;
        if !created {
            return Err(InterviewError::SessionExists(session.id));
        }

        info!(
            "Created interview session {} ({} questions)",
            session.id,
            session.questions.len()
        );

        Ok(Self::assemble(session, Progress::default(), PhaseCell::new(), deps, config))
    }

    /// Build a controller for a session already in the repository.
    ///
    /// A session with a stored result comes back in its final phase with its
    /// answers and evaluations; it accepts no further input.
    pub async fn open(
        session_id: &str,
        deps: ControllerDeps,
        config: ControllerConfig,
    ) -> Result<Self, InterviewError> {
        check_session_id(session_id)?;

        let record = deps
            .repository
            .load(session_id)
            .await
            .map_err(InterviewError::Storage)?
            .ok_or_else(|| InterviewError::UnknownSession(session_id.to_string()))?;
        let stored = deps
            .repository
            .load_result(session_id)
            .await
            .map_err(InterviewError::Storage)?;

        let session: Session = record.into();
        let Some(result) = stored else {
            info!("Opened interview session {}", session_id);
            return Ok(Self::assemble(session, Progress::default(), PhaseCell::new(), deps, config));
        };

        let phase = PhaseCell::settled(result.outcome).ok_or_else(|| {
            InterviewError::Storage(anyhow::anyhow!(
                "stored result for {} has non-final outcome {}",
                session_id,
                result.outcome
            ))
        })?;
        deps.monitor.restore(ProctoringState {
            strikes: result.strikes,
            terminated: result.outcome == SessionPhase::Terminated,
        });
        let progress = Progress {
            index: result
                .answers
                .len()
                .min(session.questions.len().saturating_sub(1)),
            answers: result.answers.clone(),
            evaluations: result.evaluations.clone(),
            result: Some(result),
        };

        info!("Reopened finished session {} ({})", session_id, phase.get());
        Ok(Self::assemble(session, progress, phase, deps, config))
    }

    fn assemble(
        session: Session,
        progress: Progress,
        phase: PhaseCell,
        deps: ControllerDeps,
        config: ControllerConfig,
    ) -> Self {
        let (cancel_tx, cancel_rx) = watch::channel(false);

        Self {
            session: RwLock::new(session),
            progress: Mutex::new(progress),
            phase,
            submitting: AtomicBool::new(false),
            gateway: deps.gateway,
            sandbox: deps.sandbox,
            monitoring: deps.monitoring,
            repository: deps.repository,
            finalizer: deps.finalizer,
            recorder: deps.recorder,
            announcer: deps.announcer,
            monitor: deps.monitor,
            config,
            cancel_tx,
            cancel_rx,
        }
    }

    /// Announce the first question and ask the backend to start monitoring.
    ///
    /// Monitoring failures are logged and otherwise ignored.
    pub async fn start(&self) -> Result<(), InterviewError> {
        self.ensure_accepting()?;
        self.announce_current();

        let session_id = self.session_id();
        let started = bounded(
            "start monitoring",
            self.config.call_timeout,
            &self.cancel_rx,
            self.monitoring
                .start_monitoring(&session_id, self.config.monitoring_duration),
        )
        .await;

        if let Err(e) = started {
            warn!("Remote monitoring unavailable for {}: {}", session_id, e);
        }
        Ok(())
    }

    pub fn session_id(&self) -> String {
        self.read_session(|s| s.id.clone())
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase.get()
    }

    pub fn current_index(&self) -> usize {
        self.with_progress(|p| p.index)
    }

    pub fn question_count(&self) -> usize {
        self.read_session(|s| s.questions.len())
    }

    pub fn current_question(&self) -> Option<Question> {
        let index = self.current_index();
        self.read_session(|s| s.questions.get(index).cloned())
    }

    /// Capture mode offered for the current question
    pub fn current_modality(&self) -> Option<Modality> {
        self.current_question()
            .map(|q| QuestionClassifier::classify(&q).default_modality())
    }

    pub fn answers(&self) -> Vec<Answer> {
        self.with_progress(|p| p.answers.clone())
    }

    pub fn evaluations(&self) -> Vec<Evaluation> {
        self.with_progress(|p| p.evaluations.clone())
    }

    pub fn result(&self) -> Option<SessionResult> {
        self.with_progress(|p| p.result.clone())
    }

    pub fn permissions(&self) -> Permissions {
        self.read_session(|s| s.permissions)
    }

    pub fn proctoring_state(&self) -> ProctoringState {
        self.monitor.state()
    }

    pub fn recorder_state(&self) -> RecorderState {
        self.recorder.state()
    }

    pub fn status(&self) -> SessionStatus {
        let question = self.current_question();
        let (current_index, answered, result) =
            self.with_progress(|p| (p.index, p.answers.len(), p.result.clone()));

        SessionStatus {
            session_id: self.session_id(),
            phase: self.phase(),
            current_index,
            question_count: self.question_count(),
            question_kind: question.as_ref().map(QuestionClassifier::classify),
            current_question: question.map(|q| q.text),
            answered,
            permissions: self.permissions(),
            recorder: self.recorder_state(),
            proctoring: self.proctoring_state(),
            result,
        }
    }

    /// Score an answer for the current question and move on
    pub async fn submit_answer(&self, content: AnswerContent) -> Result<Submission, InterviewError> {
        self.submit(content, false).await
    }

    /// Skip the current question. Progression never depends on the backend:
    /// if scoring fails a local zero-score evaluation is recorded.
    pub async fn skip(&self) -> Result<Submission, InterviewError> {
        self.submit(AnswerContent::Skipped, true).await
    }

    /// Acquire the microphone for the current question
    pub async fn start_voice_answer(&self) -> Result<(), InterviewError> {
        self.ensure_accepting()?;
        let label = format!("{}-q{}", self.session_id(), self.current_index() + 1);
        self.recorder.start(&label).await?;

        // The session may have ended while the device was being opened.
        if let Err(e) = self.ensure_accepting() {
            self.recorder.abandon();
            return Err(e);
        }
        Ok(())
    }

    /// Stop recording and submit the captured audio.
    ///
    /// An empty recording yields [`InterviewError::NoAudioCaptured`]; the
    /// candidate may record again or skip.
    pub async fn finish_voice_answer(&self) -> Result<Submission, InterviewError> {
        match self.recorder.stop().await? {
            Some(artifact) => self.submit_answer(AnswerContent::Voice { artifact }).await,
            None => Err(InterviewError::NoAudioCaptured),
        }
    }

    /// Discard the current recording and release the microphone
    pub fn cancel_voice_answer(&self) {
        self.recorder.abandon();
    }

    /// Run code in the sandbox without submitting it
    pub async fn run_code(&self, source_code: &str, language: &str) -> Result<RunOutcome, InterviewError> {
        self.ensure_accepting()?;
        bounded(
            "run code",
            self.config.call_timeout,
            &self.cancel_rx,
            self.sandbox.run(source_code, language),
        )
        .await
    }

    /// Record new permission flags and persist them
    pub async fn update_permissions(&self, permissions: Permissions) -> Result<(), InterviewError> {
        let record = {
            let mut session = self
                .session
                .write()
                .map_err(|_| InterviewError::Storage(anyhow::anyhow!("session lock poisoned")))?;
            session.permissions = permissions;
            session.to_record()
        };

        info!(
            "Permissions for {}: mic={}, camera={}",
            record.session_id, permissions.mic, permissions.camera
        );

        self.repository
            .save(&record)
            .await
            .map_err(InterviewError::Storage)
    }

    /// Feed a page-visibility change to the proctoring monitor.
    ///
    /// Ignored once the session has left `InProgress`.
    pub async fn report_visibility(&self, hidden: bool) -> Option<ProctoringAlert> {
        if self.phase() != SessionPhase::InProgress {
            return None;
        }
        self.monitor.report_visibility(hidden, self).await
    }

    /// End the session normally. Only the first caller does any work.
    pub async fn finalize(&self) -> Result<Option<SessionResult>, InterviewError> {
        self.conclude(SessionPhase::Completed).await
    }

    /// End the session early (strike limit). Only the first caller does any work.
    pub async fn terminate_session(&self) -> Result<Option<SessionResult>, InterviewError> {
        self.conclude(SessionPhase::Terminated).await
    }

    /// Abort in-flight outbound calls and release every device.
    /// The session phase is left untouched.
    pub fn shutdown(&self) {
        let _ = self.cancel_tx.send(true);
        self.announcer.cancel();
        self.recorder.abandon();
        debug!("Session {} shut down", self.session_id());
    }

    async fn submit(&self, content: AnswerContent, fallback: bool) -> Result<Submission, InterviewError> {
        self.ensure_accepting()?;
        let index = self.current_index();
        let _slot = self.claim_submission(index)?;

        // Re-read under the slot: a previous submission may have just advanced.
        self.ensure_accepting()?;
        let index = self.current_index();
        if index >= self.question_count() {
            return Err(InterviewError::NotAcceptingInput(self.phase()));
        }

        let session_id = self.session_id();
        let scored = bounded(
            "submit answer",
            self.config.call_timeout,
            &self.cancel_rx,
            self.gateway.evaluate(&session_id, index, &content),
        )
        .await;

        let evaluation = match scored {
            Ok(evaluation) => evaluation,
            Err(e) if fallback && !matches!(e, InterviewError::Cancelled(_)) => {
                warn!(
                    "Scoring unavailable for skipped question {}: {}; using local fallback",
                    index + 1,
                    e
                );
                Evaluation::skipped_fallback()
            }
            Err(e) => {
                warn!("Answer for question {} not accepted: {}", index + 1, e);
                return Err(e);
            }
        };

        let next_question = self.record(index, content, evaluation.clone())?;

        match next_question {
            Some(next) => {
                info!("Advancing {} to question {}", session_id, next + 1);
                self.announce_current();
            }
            None => {
                info!("Last question answered for {}", session_id);
                if let Err(e) = self.finalize().await {
                    error!("Finalization of {} failed: {}", session_id, e);
                }
            }
        }

        Ok(Submission {
            question_index: index,
            evaluation,
            next_question,
            phase: self.phase(),
        })
    }

    fn record(
        &self,
        index: usize,
        content: AnswerContent,
        evaluation: Evaluation,
    ) -> Result<Option<usize>, InterviewError> {
        let question_count = self.question_count();
        let mut progress = self
            .progress
            .lock()
            .map_err(|_| InterviewError::NotAcceptingInput(self.phase()))?;

        // The session can end while the answer is being scored; the finalizer
        // has already taken its snapshot, so the late answer is dropped.
        let phase = self.phase();
        if phase != SessionPhase::InProgress {
            warn!("Dropping answer for question {}: session is {}", index + 1, phase);
            return Err(InterviewError::NotAcceptingInput(phase));
        }
        if progress.index != index || progress.answers.len() != index {
            return Err(InterviewError::SubmissionInFlight(index));
        }

        progress.answers.push(Answer {
            question_index: index,
            content,
            submitted_at: Utc::now(),
        });
        progress.evaluations.push(evaluation);

        if index + 1 < question_count {
            progress.index = index + 1;
            Ok(Some(progress.index))
        } else {
            Ok(None)
        }
    }

    async fn conclude(&self, outcome: SessionPhase) -> Result<Option<SessionResult>, InterviewError> {
        if !self.phase.begin_finalizing() {
            debug!("Finalize requested for {} but already {}", self.session_id(), self.phase());
            return Ok(None);
        }

        info!("Session {} finalizing ({})", self.session_id(), outcome);

        self.announcer.cancel();
        self.recorder.abandon();

        let session = self.read_session(|s| s.clone());
        let (answers, evaluations) =
            self.with_progress(|p| (p.answers.clone(), p.evaluations.clone()));
        let strikes = self.monitor.state().strikes;

        let finalized = self
            .finalizer
            .finalize(&session, answers, evaluations, outcome, strikes)
            .await;

        // Finalizing is never rolled back, even if persisting failed.
        self.phase.settle(outcome);
        info!("Session {} is {}", session.id, outcome);

        match finalized {
            Ok(result) => {
                if let Ok(mut progress) = self.progress.lock() {
                    progress.result = Some(result.clone());
                }
                Ok(Some(result))
            }
            Err(e) => {
                error!("Failed to save results for {}: {}", session.id, e);
                Err(e)
            }
        }
    }

    fn claim_submission(&self, index: usize) -> Result<SubmissionSlot<'_>, InterviewError> {
        self.submitting
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| InterviewError::SubmissionInFlight(index))?;
        Ok(SubmissionSlot(&self.submitting))
    }

    fn ensure_accepting(&self) -> Result<(), InterviewError> {
        match self.phase() {
            SessionPhase::InProgress => Ok(()),
            phase => Err(InterviewError::NotAcceptingInput(phase)),
        }
    }

    fn announce_current(&self) {
        let index = self.current_index();
        if let Some(question) = self.current_question() {
            self.announcer.announce(index, &question.text);
        }
    }

    fn read_session<T>(&self, f: impl FnOnce(&Session) -> T) -> T {
        match self.session.read() {
            Ok(session) => f(&session),
            Err(poisoned) => f(&poisoned.into_inner()),
        }
    }

    fn with_progress<T>(&self, f: impl FnOnce(&Progress) -> T) -> T {
        match self.progress.lock() {
            Ok(progress) => f(&progress),
            Err(poisoned) => f(&poisoned.into_inner()),
        }
    }
}

#[async_trait::async_trait]
impl SessionTerminator for InterviewSessionController {
    async fn terminate(&self) -> Result<(), InterviewError> {
        self.terminate_session().await.map(|_| ())
    }
}

impl Drop for InterviewSessionController {
    fn drop(&mut self) {
        self.shutdown();
    }
}
