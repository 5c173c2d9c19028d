/// Microphone ownership and recorded audio.
pub mod recorder;
/// RMS silence detection driving auto-stop.
pub mod silence;

pub use recorder::{AudioDevice, CaptureGuard, CaptureStream, VoiceError, VoiceRecorder, VoiceResult};
pub use silence::{SilenceDecision, SilenceDetector, byte_frame_rms, rms};
