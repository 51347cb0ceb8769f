//! Channel contract checks against the built binary: which stream carries
//! the JSON line, and the exit code, in an environment with no backend.

use std::process::{Command, Output, Stdio};

/// Run the binary with an empty cache directory and a bare environment so
/// neither backend can be probed.
fn run_without_backends(args: &[&str]) -> Output {
    let cache = tempfile::tempdir().unwrap();
    Command::new(env!("CARGO_BIN_EXE_kokoro-tts"))
        .args(args)
        .current_dir(cache.path())
        .env_clear()
        .env("KOKORO_CACHE_DIR", cache.path())
        .stdin(Stdio::null())
        .output()
        .unwrap()
}

fn parse_json_line(bytes: &[u8]) -> serde_json::Value {
    let line = String::from_utf8(bytes.to_vec()).unwrap();
    serde_json::from_str(line.trim()).unwrap()
}

#[test]
fn default_mode_errors_on_stderr_and_exits_nonzero() {
    let output = run_without_backends(&["--text", "hello"]);

    assert_eq!(output.status.code(), Some(1));
    // stdout is reserved for audio bytes; nothing may land there on failure.
    assert!(output.stdout.is_empty());

    let payload = parse_json_line(&output.stderr);
    assert_eq!(payload["success"], false);
    assert!(payload["error"]
        .as_str()
        .unwrap()
        .contains("no synthesis backend available"));
}

#[test]
fn file_mode_errors_on_stderr_and_exits_nonzero() {
    let output = run_without_backends(&["--text", "hello", "--output", "speech.wav"]);

    assert_eq!(output.status.code(), Some(1));
    assert!(output.stdout.is_empty());

    let payload = parse_json_line(&output.stderr);
    assert_eq!(payload["success"], false);
}

#[test]
fn info_only_errors_on_stdout_and_exits_nonzero() {
    let output = run_without_backends(&["--text", "hello", "--info-only"]);

    assert_eq!(output.status.code(), Some(1));
    assert!(output.stderr.is_empty());

    let payload = parse_json_line(&output.stdout);
    assert_eq!(payload["success"], false);
    assert!(payload["error"]
        .as_str()
        .unwrap()
        .contains("no synthesis backend available"));
}
