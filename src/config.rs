use anyhow::Result;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::audio::{CaptureFormat, RecorderConfig};
use crate::controller::ControllerConfig;
use crate::proctoring::ProctoringPolicy;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub service: ServiceConfig,
    pub backend: BackendConfig,
    pub sandbox: SandboxConfig,
    pub audio: AudioConfig,
    pub proctoring: ProctoringConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
    /// How long a finished session stays readable before it is evicted
    pub finished_session_grace_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "interview-proctor".to_string(),
            http: HttpConfig::default(),
            finished_session_grace_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Scoring backend root, e.g. `http://localhost:8000`
    pub base_url: String,
    /// Timeout for submit-answer and start-monitoring
    pub timeout_secs: u64,
    /// Timeout for report generation (PDF rendering is slow)
    pub report_timeout_secs: u64,
    /// Window requested from the remote monitoring service
    pub monitoring_duration_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            timeout_secs: 60,
            report_timeout_secs: 120,
            monitoring_duration_secs: 180,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    /// Full submissions URL (synchronous mode)
    pub submissions_url: String,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            submissions_url: "http://localhost:2358/submissions?base64_encoded=false&wait=true"
                .to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub recordings_path: String,
    pub sample_rate: u32,
    pub channels: u16,
    /// Capture formats to negotiate, most preferred first
    pub preferred_formats: Vec<CaptureFormat>,
    /// Formats the browser client can deliver
    pub client_formats: Vec<CaptureFormat>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        let recorder = RecorderConfig::default();
        Self {
            recordings_path: "recordings".to_string(),
            sample_rate: recorder.target_sample_rate,
            channels: recorder.target_channels,
            client_formats: recorder.preferred_formats.clone(),
            preferred_formats: recorder.preferred_formats,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProctoringConfig {
    pub max_strikes: u32,
}

impl Default for ProctoringConfig {
    fn default() -> Self {
        Self {
            max_strikes: ProctoringPolicy::default().max_strikes,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub sessions_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            sessions_path: "sessions".to_string(),
        }
    }
}

impl Config {
    /// Load `path` (any format the `config` crate understands) with
    /// `PROCTOR__SECTION__KEY` environment overrides.
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("PROCTOR").separator("__"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    pub fn recorder(&self) -> RecorderConfig {
        RecorderConfig {
            output_dir: PathBuf::from(&self.audio.recordings_path),
            preferred_formats: self.audio.preferred_formats.clone(),
            target_sample_rate: self.audio.sample_rate,
            target_channels: self.audio.channels,
        }
    }

    pub fn controller(&self) -> ControllerConfig {
        ControllerConfig {
            call_timeout: Duration::from_secs(self.backend.timeout_secs),
            monitoring_duration: Duration::from_secs(self.backend.monitoring_duration_secs),
        }
    }

    pub fn proctoring_policy(&self) -> ProctoringPolicy {
        ProctoringPolicy {
            max_strikes: self.proctoring.max_strikes,
        }
    }

    pub fn report_timeout(&self) -> Duration {
        Duration::from_secs(self.backend.report_timeout_secs)
    }

    pub fn finished_session_grace(&self) -> Duration {
        Duration::from_secs(self.service.finished_session_grace_secs)
    }
}
