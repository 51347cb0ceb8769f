// Kokoro synthesis library
// Backend selection, PCM normalization, WAV framing and output routing

pub mod backend;
pub mod config;
pub mod output;
pub mod wav;

pub use backend::{select_backend, SynthesisBackend};
pub use config::SynthConfig;
pub use output::{route, AudioFormat, FileReport, InfoReport, OutputMode, Report};

// Error types
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TtsError {
    #[error("no synthesis backend available: {0}")]
    BackendUnavailable(String),

    #[error("no text provided")]
    EmptyInput,

    #[error("no audio generated")]
    NoAudioGenerated,

    #[error("{0}")]
    Synthesis(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WAV framing error: {0}")]
    Wav(#[from] hound::Error),

    #[error("ONNX runtime error: {0}")]
    Ort(#[from] ort::Error),
}

pub type Result<T> = std::result::Result<T, TtsError>;

/// A single synthesis request. Built once from CLI/stdin input and never
/// mutated afterwards; `speed` is clamped to the supported range at
/// construction.
#[derive(Clone, Debug)]
pub struct SynthesisRequest {
    text: String,
    voice: String,
    lang: String,
    speed: f32,
}

impl SynthesisRequest {
    /// Rejects empty (or whitespace-only) text with `TtsError::EmptyInput`
    /// so the check happens before any backend work.
    pub fn new(text: String, voice: String, lang: String, speed: f32) -> Result<Self> {
        if text.trim().is_empty() {
            return Err(TtsError::EmptyInput);
        }
        Ok(Self {
            text,
            voice,
            lang,
            speed: speed.clamp(0.5, 2.0),
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn voice(&self) -> &str {
        &self.voice
    }

    pub fn lang(&self) -> &str {
        &self.lang
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }
}

/// Floating-point samples as produced by a backend, in [-1.0, 1.0].
#[derive(Debug)]
pub struct RawAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

/// Quantized mono signed 16-bit little-endian PCM plus its sample rate.
/// Fully materialized in memory before any output write begins.
#[derive(Debug)]
pub struct SynthesisResult {
    pub pcm: Vec<u8>,
    pub sample_rate: u32,
}

impl SynthesisResult {
    /// Quantize backend output to s16le PCM (clamp to [-1, 1], scale by
    /// 32767, truncating cast).
    pub fn from_raw(raw: RawAudio) -> Self {
        let mut pcm = Vec::with_capacity(raw.samples.len() * 2);
        for sample in &raw.samples {
            let quantized = (sample.clamp(-1.0, 1.0) * 32767.0) as i16;
            pcm.extend_from_slice(&quantized.to_le_bytes());
        }
        Self {
            pcm,
            sample_rate: raw.sample_rate,
        }
    }

    /// Duration in seconds: byte length over (rate * 2 bytes per sample).
    /// Odd-length buffers are not special-cased.
    pub fn duration_secs(&self) -> f64 {
        self.pcm.len() as f64 / (self.sample_rate as f64 * 2.0)
    }
}
