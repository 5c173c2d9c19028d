use std::time::Instant;

use plantae_transport::AudioClip;
use snafu::{Snafu, ensure};

use crate::voice::silence::{SilenceDecision, SilenceDetector};

pub type VoiceResult<T> = Result<T, VoiceError>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum VoiceError {
    #[snafu(display("[{stage}] microphone permission denied: {details}"))]
    PermissionDenied {
        stage: &'static str,
        details: String,
    },

    #[snafu(display("[{stage}] no audio input device available"))]
    NoDevice { stage: &'static str },

    #[snafu(display("[{stage}] audio capture failed: {details}"))]
    Capture {
        stage: &'static str,
        details: String,
    },

    #[snafu(display("[{stage}] a recording is already in progress"))]
    AlreadyRecording { stage: &'static str },
}

/// A live microphone stream plus its analysis context.
pub trait CaptureStream: Send {
    /// Stops every track and closes the analysis context. Must be idempotent.
    fn release(&mut self);
}

/// Host access to the microphone.
pub trait AudioDevice {
    fn acquire(&mut self) -> VoiceResult<Box<dyn CaptureStream>>;
}

/// Releases the capture stream exactly once, on finish or on drop.
pub struct CaptureGuard {
    stream: Option<Box<dyn CaptureStream>>,
}

impl CaptureGuard {
    pub fn new(stream: Box<dyn CaptureStream>) -> Self {
        Self {
            stream: Some(stream),
        }
    }

    pub fn release(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.release();
            tracing::debug!("released capture stream");
        }
    }

    pub fn is_released(&self) -> bool {
        self.stream.is_none()
    }
}

impl Drop for CaptureGuard {
    fn drop(&mut self) {
        self.release();
    }
}

/// One in-progress recording.
pub struct Recording {
    guard: CaptureGuard,
    chunks: Vec<u8>,
    detector: SilenceDetector,
    started_at: Instant,
}

impl Recording {
    fn new(stream: Box<dyn CaptureStream>, started_at: Instant) -> Self {
        Self {
            guard: CaptureGuard::new(stream),
            chunks: Vec::new(),
            detector: SilenceDetector::default(),
            started_at,
        }
    }

    fn finish(mut self) -> AudioClip {
        self.guard.release();
        tracing::debug!(
            bytes = self.chunks.len(),
            elapsed_ms = self.started_at.elapsed().as_millis() as u64,
            "recording finished"
        );
        AudioClip::webm(std::mem::take(&mut self.chunks))
    }
}

/// Owns at most one recording at a time.
#[derive(Default)]
pub struct VoiceRecorder {
    active: Option<Recording>,
}

impl VoiceRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_recording(&self) -> bool {
        self.active.is_some()
    }

    pub fn start(&mut self, device: &mut dyn AudioDevice, now: Instant) -> VoiceResult<()> {
        ensure!(
            self.active.is_none(),
            AlreadyRecordingSnafu {
                stage: "start-recording",
            }
        );

        let stream = device.acquire()?;
        self.active = Some(Recording::new(stream, now));
        tracing::info!("recording started");
        Ok(())
    }

    /// Appends encoded audio delivered by the host's recorder.
    pub fn push_chunk(&mut self, chunk: &[u8]) {
        if let Some(recording) = self.active.as_mut() {
            recording.chunks.extend_from_slice(chunk);
        }
    }

    /// Feeds one analysis frame's RMS level.
    pub fn observe_level(&mut self, level: f32, at: Instant) -> SilenceDecision {
        match self.active.as_mut() {
            Some(recording) => recording.detector.observe(level, at),
            None => SilenceDecision::Sound,
        }
    }

    pub fn poll(&self, now: Instant) -> SilenceDecision {
        match self.active.as_ref() {
            Some(recording) => recording.detector.poll(now),
            None => SilenceDecision::Sound,
        }
    }

    /// Stops the active recording, releasing the microphone.
    pub fn stop(&mut self) -> Option<AudioClip> {
        self.active.take().map(Recording::finish)
    }
}
