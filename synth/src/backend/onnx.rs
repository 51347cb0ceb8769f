//! Lightweight ONNX backend.
//!
//! Runs the Kokoro ONNX export in-process through ONNX Runtime. Text is
//! phonemized with an espeak subprocess, encoded against the static Kokoro
//! symbol table, paired with a per-voice style vector from the voices
//! archive, and fed to the model as `tokens`/`style`/`speed`.

use super::voices::VoiceTable;
use super::SynthesisBackend;
use crate::config::SynthConfig;
use crate::{RawAudio, Result, SynthesisRequest, TtsError};
use ort::inputs;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use tracing::{debug, warn};

pub const ONNX_SAMPLE_RATE: u32 = 24_000;

const MAX_TOKENS: usize = 510;
const PAD_ID: i64 = 0;

pub struct OnnxBackend {
    model_path: PathBuf,
    voices_path: PathBuf,
    espeak_bin: PathBuf,
    ort_dylib: Option<PathBuf>,
    vocab: Vocab,
}

impl OnnxBackend {
    /// Available when both model assets resolve (cache dir, then cwd) and a
    /// phonemizer binary is present.
    pub fn probe(cfg: &SynthConfig) -> Option<Self> {
        let model_path = cfg.resolve_asset(&cfg.model_file)?;
        let voices_path = cfg.resolve_asset(&cfg.voices_file)?;
        let espeak_bin = cfg.espeak_bin.clone()?;
        Some(Self {
            model_path,
            voices_path,
            espeak_bin,
            ort_dylib: cfg.ort_dylib.clone(),
            vocab: Vocab::new(),
        })
    }

    fn phonemize(&self, text: &str, lang: &str) -> Result<String> {
        let output = Command::new(&self.espeak_bin)
            .args(["-q", "--ipa=3", "-v", espeak_voice(lang), text])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()?;

        if !output.status.success() {
            return Err(TtsError::Synthesis(format!(
                "phonemizer failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let phonemes = String::from_utf8_lossy(&output.stdout)
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");
        if phonemes.is_empty() {
            return Err(TtsError::Synthesis("phonemizer produced no output".into()));
        }
        Ok(phonemes)
    }

    fn build_session(&self) -> Result<Session> {
        init_runtime(self.ort_dylib.as_ref())?;
        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level1)
            .map_err(|e| TtsError::Synthesis(format!("session builder: {e}")))?
            .with_intra_threads(1)
            .map_err(|e| TtsError::Synthesis(format!("session builder: {e}")))?
            .commit_from_file(&self.model_path)
            .map_err(|e| {
                TtsError::Synthesis(format!(
                    "failed loading model {}: {e}",
                    self.model_path.display()
                ))
            })?;
        Ok(session)
    }
}

impl SynthesisBackend for OnnxBackend {
    fn name(&self) -> &'static str {
        "onnx"
    }

    fn synthesize(&mut self, req: &SynthesisRequest) -> Result<RawAudio> {
        let phonemes = self.phonemize(req.text(), req.lang())?;
        debug!(target = "tts", phonemes = %phonemes, "Phonemized input");

        let mut tokens = self.vocab.encode(&phonemes);
        if tokens.is_empty() {
            return Err(TtsError::Synthesis(
                "no encodable symbols in phonemized input".into(),
            ));
        }
        if tokens.len() > MAX_TOKENS {
            warn!(
                target = "tts",
                tokens = tokens.len(),
                "Input exceeds model context; truncating"
            );
            tokens.truncate(MAX_TOKENS);
        }
        let token_count = tokens.len();

        let voice_table = VoiceTable::load(&self.voices_path)?;
        let style = voice_table.style_for(req.voice(), token_count)?.to_vec();

        tokens.insert(0, PAD_ID);
        tokens.push(PAD_ID);

        let mut session = self.build_session()?;
        let token_len = tokens.len();
        let style_len = style.len();

        debug!(target = "tts", tokens = token_count, "Running ONNX inference");
        let outputs = session.run(inputs![
            "tokens" => Tensor::from_array(([1usize, token_len], tokens))?,
            "style" => Tensor::from_array(([1usize, style_len], style))?,
            "speed" => Tensor::from_array(([1usize], vec![req.speed()]))?
        ])?;

        if outputs.len() == 0 {
            return Err(TtsError::Synthesis("model returned no output tensors".into()));
        }
        let (_, samples) = outputs[0].try_extract_tensor::<f32>()?;

        Ok(RawAudio {
            samples: samples.to_vec(),
            sample_rate: ONNX_SAMPLE_RATE,
        })
    }
}

fn init_runtime(dylib: Option<&PathBuf>) -> Result<()> {
    let lib = dylib.cloned().unwrap_or_else(|| {
        #[cfg(target_os = "windows")]
        let name = "onnxruntime.dll";
        #[cfg(target_os = "macos")]
        let name = "libonnxruntime.dylib";
        #[cfg(not(any(target_os = "windows", target_os = "macos")))]
        let name = "libonnxruntime.so";
        PathBuf::from(name)
    });

    let _ = ort::init_from(&lib)
        .map_err(|e| {
            TtsError::Synthesis(format!(
                "failed loading ONNX Runtime from {}: {e}",
                lib.display()
            ))
        })?
        .with_name("kokoro-tts")
        .commit();
    Ok(())
}

fn espeak_voice(lang: &str) -> &'static str {
    match lang {
        "b" => "en-gb",
        _ => "en-us",
    }
}

/// The static Kokoro symbol table: `$` pad at index 0, then punctuation,
/// Latin letters and IPA symbols, each mapped to its position.
struct Vocab {
    index: HashMap<char, i64>,
}

impl Vocab {
    fn new() -> Self {
        let pad = "$";
        let punctuation = ";:,.!?¡¿—…\"«»\u{201c}\u{201d} ";
        let letters = "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";
        let letters_ipa = "ɑɐɒæɓʙβɔɕçɗɖðʤəɘɚɛɜɝɞɟʄɡɠɢʛɦɧħɥʜɨɪʝɭɬɫɮʟɱɯɰŋɳɲɴøɵɸθœɶʘɹɺɾɻʀʁɽʂʃʈʧʉʊʋⱱʌɣɤʍχʎʏʑʐʒʔʡʕʢǀǁǂǃˈˌːˑʼʴʰʱʲʷˠˤ˞↓↑→↗↘'̩'ᵻ";

        let mut index = HashMap::new();
        for (idx, ch) in pad
            .chars()
            .chain(punctuation.chars())
            .chain(letters.chars())
            .chain(letters_ipa.chars())
            .enumerate()
        {
            index.insert(ch, idx as i64);
        }
        Self { index }
    }

    /// Map known symbols to token ids; unknown characters are dropped.
    fn encode(&self, phonemes: &str) -> Vec<i64> {
        phonemes
            .chars()
            .filter_map(|ch| self.index.get(&ch).copied())
            .collect()
    }
}
