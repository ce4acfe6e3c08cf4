use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::info;

use super::backend::{AudioFrame, CaptureFormat};

/// One recorded answer, flushed to disk as a 16-bit PCM WAV file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioArtifact {
    /// File path to the WAV file
    pub path: PathBuf,
    /// Sample rate
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
    /// Number of samples written (all channels)
    pub sample_count: usize,
    pub duration_secs: f64,
}

impl AudioArtifact {
    /// Write buffered frames into a single WAV file
    pub fn write(path: &Path, format: CaptureFormat, frames: &[AudioFrame]) -> Result<Self> {
        anyhow::ensure!(
            format.channels > 0 && format.sample_rate > 0,
            "Cannot write WAV with layout {}",
            format
        );

        let spec = hound::WavSpec {
            channels: format.channels,
            sample_rate: format.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut writer: hound::WavWriter<BufWriter<File>> = hound::WavWriter::create(path, spec)
            .with_context(|| format!("Failed to create WAV file: {:?}", path))?;

        let mut sample_count = 0;
        for frame in frames {
            for &sample in &frame.samples {
                writer
                    .write_sample(sample)
                    .context("Failed to write sample to WAV")?;
            }
            sample_count += frame.samples.len();
        }

        writer.finalize().context("Failed to finalize WAV file")?;

        let duration_secs =
            sample_count as f64 / (format.sample_rate as f64 * format.channels as f64);

        info!(
            "Audio artifact written: {} ({:.1}s, {} samples)",
            path.display(),
            duration_secs,
            sample_count
        );

        Ok(Self {
            path: path.to_path_buf(),
            sample_rate: format.sample_rate,
            channels: format.channels,
            sample_count,
            duration_secs,
        })
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "answer.wav".to_string())
    }

    pub async fn read_bytes(&self) -> Result<Vec<u8>> {
        tokio::fs::read(&self.path)
            .await
            .with_context(|| format!("Failed to read audio artifact {:?}", self.path))
    }
}
