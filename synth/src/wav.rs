//! Canonical mono 16-bit WAV framing.
//!
//! Both entry points finalize the container (header and length fields
//! flushed) before its bytes can be observed, so a follow-up transcode or
//! stream write always sees a complete file.

use crate::{Result, SynthesisResult};
use std::io::Cursor;
use std::path::Path;

fn container_spec(sample_rate: u32) -> hound::WavSpec {
    hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    }
}

/// Frame the PCM buffer as a complete in-memory WAV container.
pub fn wav_bytes(result: &SynthesisResult) -> Result<Vec<u8>> {
    let mut cursor = Cursor::new(Vec::new());
    let mut writer = hound::WavWriter::new(&mut cursor, container_spec(result.sample_rate))?;
    write_frames(&mut writer, &result.pcm)?;
    writer.finalize()?;
    Ok(cursor.into_inner())
}

/// Write the PCM buffer as a WAV file at `path`.
pub fn write_wav_file(result: &SynthesisResult, path: &Path) -> Result<()> {
    let mut writer = hound::WavWriter::create(path, container_spec(result.sample_rate))?;
    write_frames(&mut writer, &result.pcm)?;
    writer.finalize()?;
    Ok(())
}

fn write_frames<W>(writer: &mut hound::WavWriter<W>, pcm: &[u8]) -> Result<()>
where
    W: std::io::Write + std::io::Seek,
{
    for frame in pcm.chunks_exact(2) {
        writer.write_sample(i16::from_le_bytes([frame[0], frame[1]]))?;
    }
    Ok(())
}
