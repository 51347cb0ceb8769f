//! Synthesis backends.
//!
//! Two mutually-exclusive implementations behind one trait:
//! - `OnnxBackend`: the Kokoro ONNX export run in-process through ONNX
//!   Runtime (lighter weight, preferred).
//! - `PipelineBackend`: an external full-pipeline binary driven over
//!   stdin/stdout.
//!
//! `select_backend` probes them in that order before any input is read and
//! fails with `BackendUnavailable` when neither capability is present.
//! Exactly one backend is invoked per process.

mod onnx;
mod pipeline;
pub(crate) mod voices;

pub use onnx::OnnxBackend;
pub use pipeline::PipelineBackend;

use crate::config::SynthConfig;
use crate::{RawAudio, Result, SynthesisRequest, TtsError};
use tracing::info;

pub trait SynthesisBackend {
    fn name(&self) -> &'static str;

    /// Synthesize the request into floating-point samples. Blocking; called
    /// at most once per process.
    fn synthesize(&mut self, req: &SynthesisRequest) -> Result<RawAudio>;
}

/// Probe available backends: lightweight ONNX first, full pipeline second.
pub fn select_backend(cfg: &SynthConfig) -> Result<Box<dyn SynthesisBackend>> {
    if let Some(backend) = OnnxBackend::probe(cfg) {
        info!(target = "tts", "Selected lightweight ONNX backend");
        return Ok(Box::new(backend));
    }
    if let Some(backend) = PipelineBackend::probe(cfg) {
        info!(target = "tts", "Selected full pipeline backend");
        return Ok(Box::new(backend));
    }
    Err(TtsError::BackendUnavailable(
        "model assets not found in cache or current directory, and no pipeline binary on PATH"
            .into(),
    ))
}
