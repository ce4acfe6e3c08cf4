// Test doubles for the controller's collaborators
#![allow(dead_code)]

use anyhow::Result;
use interview_proctor::audio::{CaptureFormat, RecorderConfig};
use interview_proctor::backend::{EvaluationGateway, MonitoringService, ReportService};
use interview_proctor::controller::{ControllerConfig, ControllerDeps, InterviewSessionController, SessionFinalizer};
use interview_proctor::proctoring::{ProctoringMonitor, ProctoringPolicy};
use interview_proctor::sandbox::{CodeSandbox, RunOutcome};
use interview_proctor::session::{
    AnswerContent, Evaluation, JsonFileRepository, Modality, Permissions, Question, ReportReference,
    Session,
};
use interview_proctor::speech::{QuestionCueAnnouncer, SpeechSynthesizer};
use interview_proctor::{AudioRecordingManager, InterviewError, RemoteMicrophone};
use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

pub fn evaluation(score: f64) -> Evaluation {
    Evaluation {
        overall_score: score,
        category_scores: Default::default(),
        strengths: vec!["Clear structure".to_string()],
        weaknesses: Vec::new(),
        feedback: "Solid answer".to_string(),
        transcript: None,
    }
}

pub fn backend_down() -> InterviewError {
    InterviewError::MalformedResponse {
        endpoint: "http://backend/api/submit-answer".to_string(),
        reason: "missing evaluation".to_string(),
    }
}

/// Scripted scoring backend. Unscripted calls score 80.
#[derive(Default)]
pub struct FakeGateway {
    script: Mutex<VecDeque<Result<Evaluation, InterviewError>>>,
    pub calls: Mutex<Vec<(usize, Modality)>>,
    pub delay: Mutex<Option<Duration>>,
}

impl FakeGateway {
    pub fn push(&self, response: Result<Evaluation, InterviewError>) {
        self.script.lock().unwrap().push_back(response);
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl EvaluationGateway for FakeGateway {
    async fn evaluate(
        &self,
        _session_id: &str,
        question_index: usize,
        answer: &AnswerContent,
    ) -> Result<Evaluation, InterviewError> {
        self.calls
            .lock()
            .unwrap()
            .push((question_index, answer.modality()));

        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let scripted = self.script.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| Ok(evaluation(80.0)))
    }
}

#[derive(Default)]
pub struct FakeReports {
    pub calls: AtomicUsize,
    pub fail: bool,
}

impl FakeReports {
    pub fn failing() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail: true,
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ReportService for FakeReports {
    async fn generate_report(&self, session_id: &str) -> Result<ReportReference, InterviewError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        // Give concurrent finalizers a chance to interleave.
        tokio::time::sleep(Duration::from_millis(5)).await;

        if self.fail {
            return Err(InterviewError::MalformedResponse {
                endpoint: "http://backend/api/generate-report".to_string(),
                reason: "boom".to_string(),
            });
        }

        Ok(ReportReference {
            report_path: Some(format!("reports/{}.pdf", session_id)),
            report_url: None,
            final_assessment: None,
            monitor_report: Some(format!("reports/{}-monitor.pdf", session_id)),
        })
    }
}

#[derive(Default)]
pub struct FakeMonitoring {
    pub calls: AtomicUsize,
    pub fail: bool,
}

#[async_trait::async_trait]
impl MonitoringService for FakeMonitoring {
    async fn start_monitoring(&self, _session_id: &str, _duration: Duration) -> Result<(), InterviewError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            Err(backend_down())
        } else {
            Ok(())
        }
    }
}

/// Sandbox that prints whatever it was told to
pub struct FakeSandbox {
    pub outcome: RunOutcome,
}

#[async_trait::async_trait]
impl CodeSandbox for FakeSandbox {
    async fn run(&self, _source_code: &str, _language: &str) -> Result<RunOutcome, InterviewError> {
        Ok(self.outcome.clone())
    }
}

/// Records every cue instead of speaking it
#[derive(Default)]
pub struct RecordingSynthesizer {
    pub spoken: Mutex<Vec<String>>,
}

#[async_trait::async_trait]
impl SpeechSynthesizer for RecordingSynthesizer {
    async fn speak(&self, text: &str) -> Result<(), InterviewError> {
        self.spoken.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

pub struct RigOptions {
    pub reports: FakeReports,
    pub monitoring: FakeMonitoring,
    pub sandbox_outcome: RunOutcome,
    pub config: ControllerConfig,
    pub mic_granted: bool,
    pub mic_formats: Vec<CaptureFormat>,
}

impl Default for RigOptions {
    fn default() -> Self {
        Self {
            reports: FakeReports::default(),
            monitoring: FakeMonitoring::default(),
            sandbox_outcome: RunOutcome::Success {
                stdout: "4".to_string(),
            },
            config: ControllerConfig::default(),
            mic_granted: true,
            mic_formats: vec![CaptureFormat::new(16000, 1)],
        }
    }
}

pub struct Rig {
    pub controller: Arc<InterviewSessionController>,
    pub microphone: Arc<RemoteMicrophone>,
    pub gateway: Arc<FakeGateway>,
    pub reports: Arc<FakeReports>,
    pub monitoring: Arc<FakeMonitoring>,
    pub synthesizer: Arc<RecordingSynthesizer>,
    pub repository: Arc<JsonFileRepository>,
    pub dir: TempDir,
    pub config: ControllerConfig,
}

impl Rig {
    pub async fn new(questions: &[&str]) -> Result<Self> {
        Self::with_options(questions, RigOptions::default()).await
    }

    pub async fn with_options(questions: &[&str], options: RigOptions) -> Result<Self> {
        let dir = TempDir::new()?;

        let gateway = Arc::new(FakeGateway::default());
        let reports = Arc::new(options.reports);
        let monitoring = Arc::new(options.monitoring);
        let synthesizer = Arc::new(RecordingSynthesizer::default());
        let repository = Arc::new(JsonFileRepository::new(dir.path().join("sessions"))?);

        let microphone = Arc::new(RemoteMicrophone::new(options.mic_formats));
        microphone.set_granted(options.mic_granted);

        let deps = build_deps(
            dir.path(),
            microphone.clone(),
            gateway.clone(),
            reports.clone(),
            monitoring.clone(),
            synthesizer.clone(),
            repository.clone(),
            options.sandbox_outcome,
        )?;

        let session = Session::new(
            "session-under-test",
            questions.iter().map(|q| Question::new(*q)).collect(),
        )
        .with_permissions(Permissions {
            mic: options.mic_granted,
            camera: true,
        });

        let controller = Arc::new(
            InterviewSessionController::create(session, deps, options.config.clone()).await?,
        );

        Ok(Self {
            controller,
            microphone,
            gateway,
            reports,
            monitoring,
            synthesizer,
            repository,
            dir,
            config: options.config,
        })
    }

    /// Open the stored session again with fresh devices, as after a reconnect
    pub async fn reopen(&self) -> Result<InterviewSessionController, InterviewError> {
        let microphone = Arc::new(RemoteMicrophone::new(vec![CaptureFormat::new(16000, 1)]));
        microphone.set_granted(true);
        let deps = build_deps(
            self.dir.path(),
            microphone,
            self.gateway.clone(),
            self.reports.clone(),
            self.monitoring.clone(),
            self.synthesizer.clone(),
            self.repository.clone(),
            RunOutcome::Success {
                stdout: String::new(),
            },
        )
        .map_err(InterviewError::Storage)?;
        InterviewSessionController::open(&self.controller.session_id(), deps, self.config.clone()).await
    }
}

#[allow(clippy::too_many_arguments)]
fn build_deps(
    dir: &Path,
    microphone: Arc<RemoteMicrophone>,
    gateway: Arc<FakeGateway>,
    reports: Arc<FakeReports>,
    monitoring: Arc<FakeMonitoring>,
    synthesizer: Arc<RecordingSynthesizer>,
    repository: Arc<JsonFileRepository>,
    sandbox_outcome: RunOutcome,
) -> Result<ControllerDeps> {
    let recorder = AudioRecordingManager::new(
        microphone,
        RecorderConfig {
            output_dir: dir.join("recordings"),
            ..RecorderConfig::default()
        },
    )?;

    Ok(ControllerDeps {
        gateway,
        sandbox: Arc::new(FakeSandbox {
            outcome: sandbox_outcome,
        }),
        monitoring,
        repository: repository.clone(),
        finalizer: SessionFinalizer::new(reports, repository, Duration::from_secs(5)),
        recorder,
        announcer: QuestionCueAnnouncer::new(synthesizer),
        monitor: ProctoringMonitor::new(ProctoringPolicy::default()),
    })
}

/// 100ms of a 440Hz-ish square wave at 16kHz mono
pub fn tone_frame() -> Vec<i16> {
    (0..1600)
        .map(|i| if (i / 18) % 2 == 0 { 8000 } else { -8000 })
        .collect()
}

/// Serve `router` on an ephemeral local port and return its base URL
pub async fn serve(router: axum::Router) -> Result<String> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    Ok(format!("http://{}", addr))
}
