//! Environment-driven configuration for the synthesis dispatcher.
//!
//! Env overrides:
//! - KOKORO_CACHE_DIR (default ~/.cache/kokoro)
//! - KOKORO_PIPELINE_BIN (default `kokoro` on PATH)
//! - ESPEAK_BIN (default `espeak-ng`, then `espeak`, on PATH)
//! - FFMPEG_BIN (default `ffmpeg` on PATH)
//! - ORT_DYLIB_PATH (forwarded to the ONNX Runtime loader)

use std::path::{Path, PathBuf};

pub const MODEL_FILE: &str = "kokoro-v1.0.onnx";
pub const VOICES_FILE: &str = "voices-v1.0.bin";

#[derive(Clone, Debug)]
pub struct SynthConfig {
    pub cache_dir: PathBuf,
    pub model_file: String,
    pub voices_file: String,
    pub pipeline_bin: Option<PathBuf>,
    pub espeak_bin: Option<PathBuf>,
    pub ffmpeg_bin: Option<PathBuf>,
    pub ort_dylib: Option<PathBuf>,
}

impl Default for SynthConfig {
    fn default() -> Self {
        let cache_dir = std::env::var("KOKORO_CACHE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                dirs::home_dir()
                    .map(|home| home.join(".cache").join("kokoro"))
                    .unwrap_or_else(|| PathBuf::from(".cache/kokoro"))
            });

        let pipeline_bin = bin_from_env_or_path("KOKORO_PIPELINE_BIN", "kokoro");
        let espeak_bin =
            bin_from_env_or_path("ESPEAK_BIN", "espeak-ng").or_else(|| find_in_path("espeak"));
        let ffmpeg_bin = bin_from_env_or_path("FFMPEG_BIN", "ffmpeg");
        let ort_dylib = std::env::var("ORT_DYLIB_PATH").ok().map(PathBuf::from);

        Self {
            cache_dir,
            model_file: MODEL_FILE.to_string(),
            voices_file: VOICES_FILE.to_string(),
            pipeline_bin,
            espeak_bin,
            ffmpeg_bin,
            ort_dylib,
        }
    }
}

impl SynthConfig {
    /// Resolve a model asset: user cache directory first, current working
    /// directory as fallback.
    pub fn resolve_asset(&self, name: &str) -> Option<PathBuf> {
        let cached = self.cache_dir.join(name);
        if cached.exists() {
            return Some(cached);
        }
        let local = PathBuf::from(name);
        if local.exists() {
            return Some(local);
        }
        None
    }
}

pub(crate) fn bin_from_env_or_path(env_key: &str, default_bin: &str) -> Option<PathBuf> {
    if let Ok(raw) = std::env::var(env_key) {
        let candidate = PathBuf::from(raw);
        if candidate.exists() {
            return Some(candidate);
        }
    }
    find_in_path(default_bin)
}

pub(crate) fn find_in_path(bin: &str) -> Option<PathBuf> {
    if bin.contains(std::path::MAIN_SEPARATOR) {
        let p = PathBuf::from(bin);
        return if p.exists() { Some(p) } else { None };
    }
    if let Some(path_var) = std::env::var_os("PATH") {
        for dir in std::env::split_paths(&path_var) {
            let candidate = dir.join(bin);
            if candidate.is_file() {
                return Some(candidate);
            }
        }
    }
    None
}
