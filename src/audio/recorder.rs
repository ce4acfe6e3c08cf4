use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::artifact::AudioArtifact;
use super::backend::{validate_layout, AudioFrame, CaptureFormat, DeviceLease, MicrophoneBackend};
use super::convert::normalize_frame;
use crate::error::InterviewError;

/// Recorder lifecycle: `Idle -> Recording -> Stopping -> Idle`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecorderState {
    Idle,
    Recording,
    Stopping,
}

impl std::fmt::Display for RecorderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecorderState::Idle => f.write_str("idle"),
            RecorderState::Recording => f.write_str("recording"),
            RecorderState::Stopping => f.write_str("stopping"),
        }
    }
}

/// Recorder configuration
#[derive(Debug, Clone)]
pub struct RecorderConfig {
    /// Directory for answer WAV files
    pub output_dir: PathBuf,
    /// Formats to try, in order, against what the device supports
    pub preferred_formats: Vec<CaptureFormat>,
    /// Sample rate of the written artifact (the scoring backend transcribes 16kHz best)
    pub target_sample_rate: u32,
    /// Channel count of the written artifact
    pub target_channels: u16,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("recordings"),
            preferred_formats: vec![
                CaptureFormat::new(16000, 1),
                CaptureFormat::new(48000, 1),
                CaptureFormat::new(48000, 2),
                CaptureFormat::new(44100, 1),
            ],
            target_sample_rate: 16000,
            target_channels: 1,
        }
    }
}

struct ActiveRecording {
    label: String,
    lease: Option<DeviceLease>,
    stop_tx: Option<oneshot::Sender<()>>,
    collector: Option<JoinHandle<Vec<AudioFrame>>>,
}

impl Drop for ActiveRecording {
    fn drop(&mut self) {
        if let Some(collector) = self.collector.take() {
            collector.abort();
        }
        // `lease` drops after this and releases the device.
    }
}

enum Slot {
    Idle,
    Recording(ActiveRecording),
    Stopping,
}

impl Slot {
    fn state(&self) -> RecorderState {
        match self {
            Slot::Idle => RecorderState::Idle,
            Slot::Recording(_) => RecorderState::Recording,
            Slot::Stopping => RecorderState::Stopping,
        }
    }
}

/// Puts the recorder back to `Idle` however `stop` exits
struct IdleOnExit<'a>(&'a Mutex<Slot>);

impl Drop for IdleOnExit<'_> {
    fn drop(&mut self) {
        if let Ok(mut slot) = self.0.lock() {
            *slot = Slot::Idle;
        }
    }
}

/// Owns the microphone for one recording cycle and turns the captured frames
/// into exactly one [`AudioArtifact`].
pub struct AudioRecordingManager {
    backend: Arc<dyn MicrophoneBackend>,
    config: RecorderConfig,
    slot: Mutex<Slot>,
    /// Serializes start/stop so a cycle is never interleaved with another
    op: tokio::sync::Mutex<()>,
}

impl AudioRecordingManager {
    pub fn new(backend: Arc<dyn MicrophoneBackend>, config: RecorderConfig) -> anyhow::Result<Self> {
        std::fs::create_dir_all(&config.output_dir)
            .context("Failed to create recordings directory")?;

        info!(
            "Recorder initialized: backend={}, output={}",
            backend.name(),
            config.output_dir.display()
        );

        Ok(Self {
            backend,
            config,
            slot: Mutex::new(Slot::Idle),
            op: tokio::sync::Mutex::new(()),
        })
    }

    pub fn state(&self) -> RecorderState {
        self.slot
            .lock()
            .map(|slot| slot.state())
            .unwrap_or(RecorderState::Idle)
    }

    /// Pick the first preferred format the device supports
    pub fn negotiate_format(&self) -> Result<CaptureFormat, InterviewError> {
        let supported = self.backend.supported_formats();
        self.config
            .preferred_formats
            .iter()
            .copied()
            .find(|format| supported.contains(format))
            .ok_or(InterviewError::UnsupportedFormat)
    }

    /// Acquire the microphone and start buffering frames.
    ///
    /// On any error (including a denied permission) the recorder stays `Idle`.
    pub async fn start(&self, label: &str) -> Result<(), InterviewError> {
        let _op = self.op.lock().await;

        let current = self.state();
        if current != RecorderState::Idle {
            return Err(InterviewError::RecorderBusy(current));
        }

        let format = self.negotiate_format()?;
        let stream = match self.backend.open(format).await {
            Ok(stream) => stream,
            Err(e) => {
                warn!("Failed to open microphone for {}: {}", label, e);
                return Err(e);
            }
        };

        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let mut frames_rx = stream.frames;

        let collector = tokio::spawn(async move {
            let mut frames = Vec::new();
            loop {
                tokio::select! {
                    biased;
                    _ = &mut stop_rx => break,
                    frame = frames_rx.recv() => match frame {
                        Some(frame) => frames.push(frame),
                        None => break,
                    },
                }
            }
            // Flush what was already queued before the stop request.
            while let Ok(frame) = frames_rx.try_recv() {
                frames.push(frame);
            }
            frames
        });

        let active = ActiveRecording {
            label: label.to_string(),
            lease: Some(stream.lease),
            stop_tx: Some(stop_tx),
            collector: Some(collector),
        };

        if let Ok(mut slot) = self.slot.lock() {
            *slot = Slot::Recording(active);
        }

        info!("Recording started: {} ({})", label, stream.format);
        Ok(())
    }

    /// Stop the current cycle and flush it into one artifact.
    ///
    /// Returns `Ok(None)` when no audio was captured.
    pub async fn stop(&self) -> Result<Option<AudioArtifact>, InterviewError> {
        let _op = self.op.lock().await;

        let mut active = {
            let mut slot = self.slot.lock().map_err(|_| InterviewError::NotRecording)?;
            match std::mem::replace(&mut *slot, Slot::Stopping) {
                Slot::Recording(active) => active,
                other => {
                    *slot = other;
                    return Err(InterviewError::NotRecording);
                }
            }
        };
        let _idle = IdleOnExit(&self.slot);

        if let Some(stop_tx) = active.stop_tx.take() {
            let _ = stop_tx.send(());
        }

        let frames = match active.collector.take() {
            Some(collector) => collector.await.unwrap_or_else(|e| {
                error!("Audio collector task failed: {}", e);
                Vec::new()
            }),
            None => Vec::new(),
        };

        if let Some(lease) = active.lease.take() {
            lease.release();
        }
        let label = std::mem::take(&mut active.label);
        drop(active);

        let frames = self.normalize(frames);
        let Some(first) = frames.first() else {
            warn!("Recording {} captured no audio", label);
            return Ok(None);
        };
        let format = CaptureFormat::new(first.sample_rate, first.channels);

        let path = self.config.output_dir.join(format!(
            "{}-{}.wav",
            file_label(&label),
            &uuid::Uuid::new_v4().simple().to_string()[..8]
        ));

        let artifact = tokio::task::spawn_blocking(move || AudioArtifact::write(&path, format, &frames))
            .await
            .map_err(|e| InterviewError::Artifact(anyhow::anyhow!("WAV writer task failed: {}", e)))?
            .map_err(InterviewError::Artifact)?;

        info!("Recording stopped: {} ({:.1}s)", label, artifact.duration_secs);
        Ok(Some(artifact))
    }

    /// Drop the current cycle without producing an artifact. Releases the device.
    pub fn abandon(&self) {
        let active = match self.slot.lock() {
            Ok(mut slot) => match std::mem::replace(&mut *slot, Slot::Idle) {
                Slot::Recording(active) => Some(active),
                other => {
                    *slot = other;
                    None
                }
            },
            Err(_) => None,
        };

        if let Some(active) = active {
            info!("Recording abandoned: {}", active.label);
        }
    }

    fn normalize(&self, frames: Vec<AudioFrame>) -> Vec<AudioFrame> {
        let normalized: Vec<AudioFrame> = frames
            .into_iter()
            .filter(|frame| !frame.samples.is_empty())
            .filter(|frame| match validate_layout(&frame.samples, frame.sample_rate, frame.channels) {
                Ok(()) => true,
                Err(e) => {
                    warn!("Dropping frame: {}", e);
                    false
                }
            })
            .map(|frame| {
                normalize_frame(frame, self.config.target_sample_rate, self.config.target_channels)
            })
            .collect();

        let Some(first) = normalized.first() else {
            return normalized;
        };
        let (rate, channels) = (first.sample_rate, first.channels);

        let before = normalized.len();
        let kept: Vec<AudioFrame> = normalized
            .into_iter()
            .filter(|frame| frame.sample_rate == rate && frame.channels == channels)
            .collect();
        if kept.len() != before {
            warn!(
                "Dropped {} frames with a layout other than {}Hz/{}ch",
                before - kept.len(),
                rate,
                channels
            );
        }
        kept
    }
}

/// Labels become file names; keep them to one safe path component
fn file_label(label: &str) -> String {
    let cleaned: String = label
        .chars()
        .take(64)
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if cleaned.is_empty() {
        "recording".to_string()
    } else {
        cleaned
    }
}

impl Drop for AudioRecordingManager {
    fn drop(&mut self) {
        self.abandon();
    }
}
