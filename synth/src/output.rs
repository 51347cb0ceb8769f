//! Output routing for a materialized synthesis result.
//!
//! Three mutually-exclusive modes: info-only JSON, file (with optional Opus
//! transcoding through an external encoder), and a single binary WAV write
//! to stdout. The result buffer is consumed exactly once.

use crate::config::SynthConfig;
use crate::{wav, Result, SynthesisResult, TtsError};
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, info};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AudioFormat {
    Wav,
    Opus,
}

impl AudioFormat {
    /// `"opus"` selects Opus; any other value falls back to WAV.
    pub fn from_flag(flag: &str) -> Self {
        if flag == "opus" {
            AudioFormat::Opus
        } else {
            AudioFormat::Wav
        }
    }
}

#[derive(Clone, Debug)]
pub enum OutputMode {
    InfoOnly,
    ToFile { path: PathBuf, format: AudioFormat },
    ToStdout,
}

/// Info-mode payload, printed to stdout.
#[derive(Serialize, Debug, PartialEq)]
pub struct InfoReport {
    pub success: bool,
    pub sample_rate: u32,
    pub duration: f64,
    pub format: &'static str,
    pub size: usize,
}

/// File-mode payload, printed to stderr.
#[derive(Serialize, Debug, PartialEq)]
pub struct FileReport {
    pub success: bool,
    pub file: String,
    pub duration: f64,
}

#[derive(Debug)]
pub enum Report {
    Info(InfoReport),
    File(FileReport),
    /// WAV bytes were already streamed to stdout; nothing left to report.
    Audio,
}

/// Route the result to its destination. The WAV container is always
/// finalized before its bytes are read back or transcoded.
pub fn route(result: SynthesisResult, mode: &OutputMode, cfg: &SynthConfig) -> Result<Report> {
    match mode {
        OutputMode::InfoOnly => Ok(Report::Info(InfoReport {
            success: true,
            sample_rate: result.sample_rate,
            duration: result.duration_secs(),
            format: "pcm_s16le",
            size: result.pcm.len(),
        })),

        OutputMode::ToFile { path, format } => {
            let duration = result.duration_secs();
            wav::write_wav_file(&result, path)?;
            debug!(target = "tts", path = %path.display(), "Wrote WAV file");

            let final_path = match format {
                AudioFormat::Wav => path.clone(),
                AudioFormat::Opus => transcode_to_opus(cfg, path)?,
            };
            info!(target = "tts", file = %final_path.display(), duration, "Synthesis written");
            Ok(Report::File(FileReport {
                success: true,
                file: final_path.display().to_string(),
                duration,
            }))
        }

        OutputMode::ToStdout => {
            let bytes = wav::wav_bytes(&result)?;
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&bytes)?;
            stdout.flush()?;
            Ok(Report::Audio)
        }
    }
}

/// Destination path for an Opus transcode of `wav_path`.
pub fn opus_path_for(wav_path: &Path) -> PathBuf {
    wav_path.with_extension("opus")
}

fn transcode_to_opus(cfg: &SynthConfig, wav_path: &Path) -> Result<PathBuf> {
    let ffmpeg = cfg
        .ffmpeg_bin
        .as_ref()
        .ok_or_else(|| TtsError::Synthesis("opus encoder (ffmpeg) not found on PATH".into()))?;

    let opus_path = opus_path_for(wav_path);
    if opus_path == wav_path {
        return Err(TtsError::Synthesis(
            "output path already ends in .opus; the intermediate WAV would be overwritten".into(),
        ));
    }

    let status = Command::new(ffmpeg)
        .arg("-y")
        .arg("-i")
        .arg(wav_path)
        .args(["-c:a", "libopus", "-b:a", "32k"])
        .arg(&opus_path)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()?;
    if !status.success() {
        // Keep the WAV in place; the failure is terminal.
        return Err(TtsError::Synthesis(format!(
            "opus encoder exited with {status}"
        )));
    }

    std::fs::remove_file(wav_path)?;
    debug!(target = "tts", path = %opus_path.display(), "Transcoded to Opus");
    Ok(opus_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MODEL_FILE, VOICES_FILE};
    use crate::{RawAudio, SynthesisResult};

    fn result_from(samples: Vec<f32>, sample_rate: u32) -> SynthesisResult {
        SynthesisResult::from_raw(RawAudio {
            samples,
            sample_rate,
        })
    }

    fn offline_config() -> SynthConfig {
        SynthConfig {
            cache_dir: PathBuf::from("/nonexistent"),
            model_file: MODEL_FILE.to_string(),
            voices_file: VOICES_FILE.to_string(),
            pipeline_bin: None,
            espeak_bin: None,
            ffmpeg_bin: None,
            ort_dylib: None,
        }
    }

    #[test]
    fn format_flag_parsing_is_permissive() {
        assert_eq!(AudioFormat::from_flag("opus"), AudioFormat::Opus);
        assert_eq!(AudioFormat::from_flag("wav"), AudioFormat::Wav);
        assert_eq!(AudioFormat::from_flag("mp3"), AudioFormat::Wav);
    }

    #[test]
    fn opus_path_replaces_wav_extension() {
        assert_eq!(
            opus_path_for(Path::new("set.wav")),
            PathBuf::from("set.opus")
        );
        assert_eq!(
            opus_path_for(Path::new("/tmp/a/voice.wav")),
            PathBuf::from("/tmp/a/voice.opus")
        );
    }

    #[test]
    fn info_mode_reports_without_writing_audio() {
        let result = result_from(vec![0.0; 24_000], 24_000);
        let report = route(result, &OutputMode::InfoOnly, &offline_config()).unwrap();
        match report {
            Report::Info(info) => {
                assert!(info.success);
                assert_eq!(info.sample_rate, 24_000);
                assert_eq!(info.size, 48_000);
                assert_eq!(info.duration, 1.0);
                assert_eq!(info.format, "pcm_s16le");
            }
            other => panic!("expected info report, got {other:?}"),
        }
    }

    #[test]
    fn info_report_serializes_expected_keys() {
        let info = InfoReport {
            success: true,
            sample_rate: 24_000,
            duration: 0.5,
            format: "pcm_s16le",
            size: 24_000,
        };
        let value: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&info).unwrap()).unwrap();
        assert_eq!(value["success"], true);
        assert_eq!(value["sample_rate"], 24_000);
        assert_eq!(value["duration"], 0.5);
        assert_eq!(value["format"], "pcm_s16le");
        assert_eq!(value["size"], 24_000);
    }

    #[test]
    fn file_mode_writes_wav_and_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("speech.wav");
        let result = result_from(vec![0.1; 2_400], 24_000);

        let report = route(
            result,
            &OutputMode::ToFile {
                path: path.clone(),
                format: AudioFormat::Wav,
            },
            &offline_config(),
        )
        .unwrap();

        match report {
            Report::File(file) => {
                assert!(file.success);
                assert_eq!(file.file, path.display().to_string());
                assert_eq!(file.duration, 0.1);
            }
            other => panic!("expected file report, got {other:?}"),
        }

        let reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().sample_rate, 24_000);
        assert_eq!(reader.len(), 2_400);
    }

    #[test]
    fn opus_without_encoder_keeps_wav_and_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("speech.wav");
        let result = result_from(vec![0.1; 100], 24_000);

        let err = route(
            result,
            &OutputMode::ToFile {
                path: path.clone(),
                format: AudioFormat::Opus,
            },
            &offline_config(),
        )
        .unwrap_err();

        assert!(matches!(err, TtsError::Synthesis(_)));
        assert!(path.exists());
        assert!(!opus_path_for(&path).exists());
    }
}
