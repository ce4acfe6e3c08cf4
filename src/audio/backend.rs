use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::recorder::RecorderState;
use crate::error::{Device, InterviewError};

/// Audio sample data (16-bit PCM, interleaved)
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Raw audio samples (i16 PCM, interleaved)
    pub samples: Vec<i16>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
    /// Timestamp in milliseconds since capture started
    pub timestamp_ms: u64,
}

/// PCM layout a microphone can deliver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CaptureFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

impl CaptureFormat {
    pub const fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
        }
    }
}

impl std::fmt::Display for CaptureFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}Hz/{}ch", self.sample_rate, self.channels)
    }
}

/// Exclusive hold on a capture device.
///
/// The device is released exactly once: either through [`DeviceLease::release`]
/// or when the lease is dropped.
pub struct DeviceLease {
    device: String,
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl DeviceLease {
    pub fn new(device: impl Into<String>, release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            device: device.into(),
            release: Some(Box::new(release)),
        }
    }

    pub fn release(mut self) {
        self.run_release();
    }

    fn run_release(&mut self) {
        if let Some(release) = self.release.take() {
            release();
            debug!("Released {}", self.device);
        }
    }
}

impl Drop for DeviceLease {
    fn drop(&mut self) {
        if self.release.is_some() {
            warn!("{} released on drop", self.device);
            self.run_release();
        }
    }
}

/// An open capture: frames plus the lease that keeps the device busy
pub struct MicrophoneStream {
    pub format: CaptureFormat,
    pub frames: mpsc::Receiver<AudioFrame>,
    pub lease: DeviceLease,
}

/// Microphone capture backend
///
/// The recorder negotiates a format from `supported_formats` and then opens the
/// device. Implementations must report a denied permission as
/// [`InterviewError::PermissionDenied`].
#[async_trait::async_trait]
pub trait MicrophoneBackend: Send + Sync {
    /// Formats this device can deliver, most preferred first
    fn supported_formats(&self) -> Vec<CaptureFormat>;

    /// Acquire the device and start delivering frames
    async fn open(&self, format: CaptureFormat) -> Result<MicrophoneStream, InterviewError>;

    /// Check if the device is currently held
    fn is_capturing(&self) -> bool;

    /// Get backend name for logging
    fn name(&self) -> &str;
}

const MAX_CHANNELS: u16 = 8;
const MAX_SAMPLE_RATE: u32 = 384_000;

/// Reject PCM layouts the recorder cannot encode
pub fn validate_layout(samples: &[i16], sample_rate: u32, channels: u16) -> Result<(), InterviewError> {
    if channels == 0 || channels > MAX_CHANNELS {
        return Err(InterviewError::InvalidFrame(format!(
            "channels must be 1-{}, got {}",
            MAX_CHANNELS, channels
        )));
    }
    if sample_rate == 0 || sample_rate > MAX_SAMPLE_RATE {
        return Err(InterviewError::InvalidFrame(format!(
            "sample rate must be 1-{}Hz, got {}",
            MAX_SAMPLE_RATE, sample_rate
        )));
    }
    if samples.len() % channels as usize != 0 {
        return Err(InterviewError::InvalidFrame(format!(
            "{} samples do not divide into {} channels",
            samples.len(),
            channels
        )));
    }
    Ok(())
}

struct ActiveFeed {
    tx: mpsc::Sender<AudioFrame>,
    started: Instant,
}

/// Microphone whose audio is captured elsewhere (the candidate's browser) and
/// forwarded frame by frame with [`RemoteMicrophone::push`].
pub struct RemoteMicrophone {
    granted: AtomicBool,
    formats: Vec<CaptureFormat>,
    channel_capacity: usize,
    active: Arc<Mutex<Option<ActiveFeed>>>,
}

impl RemoteMicrophone {
    pub fn new(formats: Vec<CaptureFormat>) -> Self {
        Self {
            granted: AtomicBool::new(false),
            formats,
            channel_capacity: 256,
            active: Arc::new(Mutex::new(None)),
        }
    }

    pub fn set_granted(&self, granted: bool) {
        self.granted.store(granted, Ordering::SeqCst);
    }

    pub fn is_granted(&self) -> bool {
        self.granted.load(Ordering::SeqCst)
    }

    /// Forward one chunk of PCM from the client
    pub async fn push(
        &self,
        samples: Vec<i16>,
        sample_rate: u32,
        channels: u16,
    ) -> Result<(), InterviewError> {
        validate_layout(&samples, sample_rate, channels)?;

        let (tx, started) = {
            let active = self.active.lock().map_err(|_| InterviewError::NotRecording)?;
            match active.as_ref() {
                Some(feed) => (feed.tx.clone(), feed.started),
                None => return Err(InterviewError::NotRecording),
            }
        };

        let frame = AudioFrame {
            samples,
            sample_rate,
            channels,
            timestamp_ms: started.elapsed().as_millis() as u64,
        };

        tx.send(frame).await.map_err(|_| InterviewError::NotRecording)
    }
}

#[async_trait::async_trait]
impl MicrophoneBackend for RemoteMicrophone {
    fn supported_formats(&self) -> Vec<CaptureFormat> {
        self.formats.clone()
    }

    async fn open(&self, format: CaptureFormat) -> Result<MicrophoneStream, InterviewError> {
        if !self.is_granted() {
            return Err(InterviewError::PermissionDenied(Device::Microphone));
        }

        let (tx, rx) = mpsc::channel(self.channel_capacity);
        {
            let mut active = self
                .active
                .lock()
                .map_err(|_| InterviewError::RecorderBusy(RecorderState::Recording))?;
            if active.is_some() {
                return Err(InterviewError::RecorderBusy(RecorderState::Recording));
            }
            *active = Some(ActiveFeed {
                tx,
                started: Instant::now(),
            });
        }

        info!("Remote microphone opened ({})", format);

        let active = Arc::clone(&self.active);
        let lease = DeviceLease::new("remote microphone", move || {
            if let Ok(mut active) = active.lock() {
                // Dropping the sender closes the frame channel.
                active.take();
            }
        });

        Ok(MicrophoneStream {
            format,
            frames: rx,
            lease,
        })
    }

    fn is_capturing(&self) -> bool {
        self.active
            .lock()
            .map(|active| active.is_some())
            .unwrap_or(false)
    }

    fn name(&self) -> &str {
        "remote"
    }
}
