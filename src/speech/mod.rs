//! Spoken question cues
//!
//! Only one cue plays at a time: announcing a new question aborts whatever is
//! still being spoken.

use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::InterviewError;

/// Speech output device
#[async_trait::async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Speak `text`, returning once playback has finished
    async fn speak(&self, text: &str) -> Result<(), InterviewError>;
}

/// Emits cues to the log. Playback itself happens in the candidate's browser.
pub struct LoggingSynthesizer;

#[async_trait::async_trait]
impl SpeechSynthesizer for LoggingSynthesizer {
    async fn speak(&self, text: &str) -> Result<(), InterviewError> {
        info!("Cue: {}", text);
        Ok(())
    }
}

pub struct QuestionCueAnnouncer {
    synthesizer: Arc<dyn SpeechSynthesizer>,
    current: Mutex<Option<JoinHandle<()>>>,
}

impl QuestionCueAnnouncer {
    pub fn new(synthesizer: Arc<dyn SpeechSynthesizer>) -> Self {
        Self {
            synthesizer,
            current: Mutex::new(None),
        }
    }

    /// Start speaking `text`, cancelling any cue still in flight
    pub fn announce(&self, question_index: usize, text: &str) {
        let synthesizer = Arc::clone(&self.synthesizer);
        let text = text.to_string();

        let handle = tokio::spawn(async move {
            if let Err(e) = synthesizer.speak(&text).await {
                warn!("Failed to speak question {}: {}", question_index + 1, e);
            }
        });

        if let Ok(mut current) = self.current.lock() {
            if let Some(previous) = current.replace(handle) {
                if !previous.is_finished() {
                    debug!("Cancelling previous cue");
                }
                previous.abort();
            }
        }
    }

    /// Stop the in-flight cue, if any
    pub fn cancel(&self) {
        if let Ok(mut current) = self.current.lock() {
            if let Some(handle) = current.take() {
                handle.abort();
            }
        }
    }
}

impl Drop for QuestionCueAnnouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}
