//! Voice style table loaded from the Kokoro voices archive.
//!
//! `voices-v1.0.bin` is an npz archive (a zip of `.npy` entries), one f32
//! array per voice. Arrays are either 2-D `(rows, cols)` or 3-D
//! `(rows, 1, cols)`; the middle unit axis is collapsed. Row `n` holds the
//! style vector for an input of `n` tokens.

use crate::{Result, TtsError};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use zip::ZipArchive;

const MAX_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

#[derive(Debug)]
pub(crate) struct VoiceStyle {
    rows: usize,
    cols: usize,
    data: Vec<f32>,
}

impl VoiceStyle {
    fn row(&self, index: usize) -> Result<&[f32]> {
        if self.cols == 0 || index >= self.rows {
            return Err(TtsError::Synthesis(format!(
                "style row {index} out of bounds ({} rows)",
                self.rows
            )));
        }
        let start = index * self.cols;
        Ok(&self.data[start..start + self.cols])
    }
}

#[derive(Debug)]
pub(crate) struct VoiceTable {
    voices: BTreeMap<String, VoiceStyle>,
}

impl VoiceTable {
    pub(crate) fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let mut archive = ZipArchive::new(file).map_err(|e| {
            TtsError::Synthesis(format!("invalid voices archive {}: {e}", path.display()))
        })?;

        let mut voices = BTreeMap::new();
        for i in 0..archive.len() {
            let mut entry = archive
                .by_index(i)
                .map_err(|e| TtsError::Synthesis(format!("corrupt voices archive: {e}")))?;
            let name = entry.name().to_string();
            if !name.ends_with(".npy") {
                continue;
            }

            let mut raw = Vec::new();
            (&mut entry).take(MAX_ENTRY_BYTES + 1).read_to_end(&mut raw)?;
            if raw.len() as u64 > MAX_ENTRY_BYTES {
                return Err(TtsError::Synthesis(format!(
                    "voice entry '{name}' exceeds {MAX_ENTRY_BYTES} bytes"
                )));
            }

            let style = parse_npy_f32(&raw)
                .map_err(|e| TtsError::Synthesis(format!("voice entry '{name}': {e}")))?;
            voices.insert(name.trim_end_matches(".npy").to_string(), style);
        }

        if voices.is_empty() {
            return Err(TtsError::Synthesis(format!(
                "voices archive {} contains no .npy entries",
                path.display()
            )));
        }
        Ok(Self { voices })
    }

    /// Style vector for `voice`, clamped to the last available row.
    pub(crate) fn style_for(&self, voice: &str, token_count: usize) -> Result<&[f32]> {
        let style = self.voices.get(voice).ok_or_else(|| {
            TtsError::Synthesis(format!("voice '{voice}' not found in voices archive"))
        })?;
        style.row(token_count.min(style.rows.saturating_sub(1)))
    }

    #[cfg(test)]
    pub(crate) fn voice_names(&self) -> Vec<String> {
        self.voices.keys().cloned().collect()
    }
}

fn parse_npy_f32(bytes: &[u8]) -> std::result::Result<VoiceStyle, String> {
    if bytes.len() < 12 {
        return Err("npy payload too small".into());
    }
    if &bytes[0..6] != b"\x93NUMPY" {
        return Err("invalid npy magic header".into());
    }

    let (header_len, header_offset) = match bytes[6] {
        1 => (u16::from_le_bytes([bytes[8], bytes[9]]) as usize, 10),
        2 | 3 => (
            u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize,
            12,
        ),
        other => return Err(format!("unsupported npy version {other}")),
    };

    let header_end = header_offset + header_len;
    if bytes.len() < header_end {
        return Err("npy header length exceeds payload size".into());
    }
    let header = std::str::from_utf8(&bytes[header_offset..header_end])
        .map_err(|_| "npy header is not valid utf-8".to_string())?;

    let descr = header_field(header, "descr").ok_or("npy header missing 'descr'")?;
    let fortran = header_field(header, "fortran_order").ok_or("npy header missing 'fortran_order'")?;
    let shape = header_shape(header).ok_or("npy header missing 'shape'")?;

    if descr != "<f4" {
        return Err(format!("unsupported npy dtype '{descr}', expected '<f4'"));
    }
    if fortran != "False" {
        return Err(format!("unsupported npy order '{fortran}', expected 'False'"));
    }

    let (rows, cols) = match shape.as_slice() {
        [rows, cols] => (*rows, *cols),
        [rows, 1, cols] => (*rows, *cols),
        other => return Err(format!("unsupported style tensor shape {other:?}")),
    };

    let item_count = rows
        .checked_mul(cols)
        .ok_or_else(|| format!("npy shape overflow for {rows}x{cols}"))?;
    let byte_count = item_count
        .checked_mul(4)
        .ok_or_else(|| format!("npy byte size overflow for {rows}x{cols}"))?;
    let data_bytes = &bytes[header_end..];
    if data_bytes.len() != byte_count {
        return Err(format!(
            "npy data size mismatch: expected {byte_count} bytes, got {}",
            data_bytes.len()
        ));
    }

    let mut data = Vec::with_capacity(item_count);
    for chunk in data_bytes.chunks_exact(4) {
        data.push(f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
    }
    Ok(VoiceStyle { rows, cols, data })
}

fn header_field<'a>(header: &'a str, key: &str) -> Option<&'a str> {
    let pattern = format!("'{key}':");
    let start = header.find(&pattern)? + pattern.len();
    let rest = header[start..].trim_start();

    if let Some(stripped) = rest.strip_prefix('\'') {
        let end = stripped.find('\'')?;
        return Some(&stripped[..end]);
    }
    let end = rest.find([',', '}']).unwrap_or(rest.len());
    Some(rest[..end].trim())
}

fn header_shape(header: &str) -> Option<Vec<usize>> {
    let start = header.find("'shape':")? + "'shape':".len();
    let rest = header[start..].trim_start();
    let open = rest.find('(')?;
    let inner = &rest[open + 1..];
    let close = inner.find(')')?;

    let mut shape = Vec::new();
    for part in inner[..close].split(',') {
        let trimmed = part.trim();
        if trimmed.is_empty() {
            continue;
        }
        shape.push(trimmed.parse::<usize>().ok()?);
    }
    Some(shape)
}

#[cfg(test)]
pub(crate) fn npy_f32_bytes(shape: &[usize], data: &[f32]) -> Vec<u8> {
    let shape_text = match shape {
        [a] => format!("({a},)"),
        other => {
            let dims: Vec<String> = other.iter().map(|d| d.to_string()).collect();
            format!("({})", dims.join(", "))
        }
    };
    let mut header = format!(
        "{{'descr': '<f4', 'fortran_order': False, 'shape': {shape_text}, }}"
    );
    // Pad so the total header (magic + len + text) is 64-byte aligned.
    while (10 + header.len() + 1) % 64 != 0 {
        header.push(' ');
    }
    header.push('\n');

    let mut bytes = Vec::new();
    bytes.extend_from_slice(b"\x93NUMPY\x01\x00");
    bytes.extend_from_slice(&(header.len() as u16).to_le_bytes());
    bytes.extend_from_slice(header.as_bytes());
    for value in data {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn write_archive(entries: &[(&str, Vec<u8>)]) -> tempfile::NamedTempFile {
        let file = tempfile::NamedTempFile::new().unwrap();
        let mut zip = zip::ZipWriter::new(file.reopen().unwrap());
        for (name, bytes) in entries {
            zip.start_file(*name, SimpleFileOptions::default()).unwrap();
            zip.write_all(bytes).unwrap();
        }
        zip.finish().unwrap();
        file
    }

    #[test]
    fn parses_2d_npy_entry() {
        let style = parse_npy_f32(&npy_f32_bytes(&[2, 3], &[0.0, 1.0, 2.0, 3.0, 4.0, 5.0]))
            .unwrap();
        assert_eq!(style.rows, 2);
        assert_eq!(style.cols, 3);
        assert_eq!(style.row(1).unwrap(), &[3.0, 4.0, 5.0]);
    }

    #[test]
    fn collapses_3d_unit_axis() {
        let style = parse_npy_f32(&npy_f32_bytes(&[2, 1, 2], &[0.5, 0.6, 0.7, 0.8])).unwrap();
        assert_eq!(style.rows, 2);
        assert_eq!(style.cols, 2);
        assert_eq!(style.row(0).unwrap(), &[0.5, 0.6]);
    }

    #[test]
    fn rejects_wrong_dtype() {
        let mut bytes = npy_f32_bytes(&[1, 1], &[1.0]);
        // Corrupt the descr field inside the header.
        let pos = bytes.windows(3).position(|w| w == b"<f4").unwrap();
        bytes[pos..pos + 3].copy_from_slice(b"<f8");
        assert!(parse_npy_f32(&bytes).is_err());
    }

    #[test]
    fn rejects_shape_whose_byte_size_overflows() {
        // rows * cols fits in usize but the byte count does not.
        let bytes = npy_f32_bytes(&[usize::MAX / 4 + 1, 1], &[]);
        let err = parse_npy_f32(&bytes).err().unwrap();
        assert!(err.contains("overflow"), "{err}");
    }

    #[test]
    fn table_loads_and_clamps_style_row() {
        let entry = npy_f32_bytes(&[2, 1, 2], &[0.1, 0.2, 0.3, 0.4]);
        let archive = write_archive(&[("af_heart.npy", entry)]);

        let table = VoiceTable::load(archive.path()).unwrap();
        assert_eq!(table.voice_names(), vec!["af_heart".to_string()]);
        assert_eq!(table.style_for("af_heart", 1).unwrap(), &[0.3, 0.4]);
        // Token counts past the last row clamp instead of failing.
        assert_eq!(table.style_for("af_heart", 500).unwrap(), &[0.3, 0.4]);
        assert!(table.style_for("am_adam", 1).is_err());
    }

    #[test]
    fn empty_archive_is_an_error() {
        let archive = write_archive(&[("readme.txt", b"not a voice".to_vec())]);
        assert!(VoiceTable::load(archive.path()).is_err());
    }
}
