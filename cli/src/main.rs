//! Kokoro TTS command-line wrapper.
//!
//! Reads text from `--text` or stdin, synthesizes it through whichever
//! backend is available, and emits WAV audio (stdout or file), Opus (file,
//! via external encoder), or an info-only JSON line.
//!
//! Channel contract: stdout carries either raw WAV bytes or, in info-only
//! mode, a single JSON line (success and error alike). Everything else —
//! file-mode status and non-info errors — goes to stderr as JSON. Exit code
//! is 0 on success, 1 on any error.

use clap::Parser;
use kokoro_synth::{
    route, select_backend, AudioFormat, OutputMode, Report, SynthConfig, SynthesisRequest,
    SynthesisResult, TtsError,
};
use serde_json::json;
use std::io::Read;
use std::path::PathBuf;
use tracing::debug;

#[derive(Parser, Debug)]
#[command(name = "kokoro-tts", about = "Synthesize speech using Kokoro TTS")]
struct Cli {
    /// Voice name (e.g., af_heart, af_bella, am_adam)
    #[arg(long, default_value = "af_heart")]
    voice: String,

    /// Language code: a (American), b (British)
    #[arg(long, default_value = "a")]
    lang: String,

    /// Speech speed (0.5-2.0)
    #[arg(long, default_value_t = 1.0)]
    speed: f32,

    /// Output file path (if not using stdout)
    #[arg(long)]
    output: Option<PathBuf>,

    /// Text to synthesize (if not using stdin)
    #[arg(long)]
    text: Option<String>,

    /// Output format: wav, opus
    #[arg(long, default_value = "wav")]
    format: String,

    /// Only output info JSON, not audio
    #[arg(long)]
    info_only: bool,
}

impl Cli {
    fn output_mode(&self) -> OutputMode {
        if self.info_only {
            OutputMode::InfoOnly
        } else if let Some(path) = &self.output {
            OutputMode::ToFile {
                path: path.clone(),
                format: AudioFormat::from_flag(&self.format),
            }
        } else {
            OutputMode::ToStdout
        }
    }
}

fn main() {
    // Logs go to stderr: stdout belongs to the audio/JSON protocol.
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();

    let cli = Cli::parse();
    let mode = cli.output_mode();

    match run(&cli, &mode) {
        Ok(report) => emit_success(report),
        Err(err) => {
            emit_error(cli.info_only, &error_message(&err));
            std::process::exit(1);
        }
    }
}

fn run(cli: &Cli, mode: &OutputMode) -> Result<Report, TtsError> {
    let cfg = SynthConfig::default();

    // Backend availability is settled before any input is read.
    let mut backend = select_backend(&cfg)?;

    let text = acquire_text(cli.text.as_deref())?;
    let req = SynthesisRequest::new(text, cli.voice.clone(), cli.lang.clone(), cli.speed)?;
    debug!(
        target = "tts",
        backend = backend.name(),
        voice = req.voice(),
        lang = req.lang(),
        speed = req.speed(),
        "Dispatching synthesis"
    );

    let raw = backend.synthesize(&req)?;
    let result = SynthesisResult::from_raw(raw);
    route(result, mode, &cfg)
}

/// Explicit text wins when non-empty; otherwise stdin, stripped.
fn acquire_text(flag: Option<&str>) -> Result<String, TtsError> {
    if let Some(text) = flag {
        if !text.is_empty() {
            return Ok(text.to_string());
        }
    }
    let mut buf = String::new();
    std::io::stdin().read_to_string(&mut buf)?;
    Ok(buf.trim().to_string())
}

/// Errors raised once synthesis is underway are wrapped; pre-flight errors
/// (no backend, no input) surface their own message.
fn error_message(err: &TtsError) -> String {
    match err {
        TtsError::BackendUnavailable(_) | TtsError::EmptyInput => err.to_string(),
        other => format!("Synthesis failed: {other}"),
    }
}

fn emit_success(report: Report) {
    match report {
        Report::Info(info) => {
            println!("{}", serde_json::to_string(&info).unwrap_or_default());
        }
        Report::File(file) => {
            eprintln!("{}", serde_json::to_string(&file).unwrap_or_default());
        }
        // Audio bytes were already streamed to stdout by the router.
        Report::Audio => {}
    }
}

fn emit_error(info_only: bool, message: &str) {
    let payload = json!({ "error": message, "success": false });
    if info_only {
        println!("{payload}");
    } else {
        eprintln!("{payload}");
    }
}
