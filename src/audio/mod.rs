pub mod artifact;
pub mod backend;
pub mod convert;
pub mod recorder;

pub use artifact::AudioArtifact;
pub use backend::{AudioFrame, CaptureFormat, DeviceLease, MicrophoneBackend, MicrophoneStream, RemoteMicrophone};
pub use recorder::{AudioRecordingManager, RecorderConfig, RecorderState};
