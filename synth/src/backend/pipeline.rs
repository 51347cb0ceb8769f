//! Full pipeline backend.
//!
//! Drives an external Kokoro pipeline binary: the request text goes to its
//! stdin, raw f32le samples come back on stdout as a sequence of chunks
//! which are concatenated in order. The pipeline runs at a fixed 24 kHz.

use super::SynthesisBackend;
use crate::config::SynthConfig;
use crate::{RawAudio, Result, SynthesisRequest, TtsError};
use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use tracing::debug;

pub const PIPELINE_SAMPLE_RATE: u32 = 24_000;

const READ_CHUNK_BYTES: usize = 16 * 1024;

pub struct PipelineBackend {
    bin: PathBuf,
}

impl PipelineBackend {
    /// Available when the pipeline binary resolves (env override or PATH).
    pub fn probe(cfg: &SynthConfig) -> Option<Self> {
        cfg.pipeline_bin.clone().map(|bin| Self { bin })
    }
}

impl SynthesisBackend for PipelineBackend {
    fn name(&self) -> &'static str {
        "pipeline"
    }

    fn synthesize(&mut self, req: &SynthesisRequest) -> Result<RawAudio> {
        let mut cmd = Command::new(&self.bin);
        cmd.arg("--lang")
            .arg(req.lang())
            .arg("--voice")
            .arg(req.voice())
            .arg("--speed")
            .arg(format!("{:.2}", req.speed()))
            .arg("--output-format")
            .arg("f32le");
        cmd.stdin(Stdio::piped());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        debug!(target = "tts", command = ?cmd, "Running pipeline");
        let mut child = cmd.spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(req.text().as_bytes())?;
        }

        // Drain stderr on its own thread so a chatty pipeline cannot fill
        // the pipe and stall while we block on stdout.
        let stderr_reader = child.stderr.take().map(|mut stderr| {
            std::thread::spawn(move || {
                let mut captured = Vec::new();
                let _ = stderr.read_to_end(&mut captured);
                captured
            })
        });

        // Consume stdout as a chunk sequence; samples may straddle reads.
        let mut chunks: Vec<Vec<f32>> = Vec::new();
        let mut pending: Vec<u8> = Vec::new();
        if let Some(mut stdout) = child.stdout.take() {
            let mut buf = [0u8; READ_CHUNK_BYTES];
            loop {
                let n = stdout.read(&mut buf)?;
                if n == 0 {
                    break;
                }
                pending.extend_from_slice(&buf[..n]);
                let chunk = drain_samples(&mut pending);
                if !chunk.is_empty() {
                    chunks.push(chunk);
                }
            }
        }

        let status = child.wait()?;
        let stderr_bytes = stderr_reader
            .and_then(|reader| reader.join().ok())
            .unwrap_or_default();
        if !status.success() {
            return Err(TtsError::Synthesis(format!(
                "pipeline exited with {status}: {}",
                String::from_utf8_lossy(&stderr_bytes).trim()
            )));
        }
        if !pending.is_empty() {
            return Err(TtsError::Synthesis(format!(
                "pipeline output ended mid-sample ({} trailing bytes)",
                pending.len()
            )));
        }
        if chunks.is_empty() {
            return Err(TtsError::NoAudioGenerated);
        }

        let total: usize = chunks.iter().map(Vec::len).sum();
        let mut samples = Vec::with_capacity(total);
        for chunk in chunks {
            samples.extend_from_slice(&chunk);
        }
        debug!(target = "tts", samples = samples.len(), "Pipeline synthesis complete");

        Ok(RawAudio {
            samples,
            sample_rate: PIPELINE_SAMPLE_RATE,
        })
    }
}

/// Drain all complete f32le samples from `pending`, leaving any partial
/// trailing sample in place.
fn drain_samples(pending: &mut Vec<u8>) -> Vec<f32> {
    let complete = pending.len() / 4 * 4;
    let mut samples = Vec::with_capacity(complete / 4);
    for chunk in pending[..complete].chunks_exact(4) {
        samples.push(f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
    }
    pending.drain(..complete);
    samples
}
