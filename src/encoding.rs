//! Source file encoding detection.
//!
//! Registry extracts are usually windows-1252 but re-exported copies are often UTF-8.
//! Detection works on a byte sample and is confirmed by decoding the first records
//! before the full file is processed. A UTF-8 verdict from a partial sample is also
//! checked against the whole file, since legacy bytes can first appear deep inside it.

use anyhow::{Context, Result};
use chardetng::EncodingDetector;
use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};
use std::fs::File;
use std::io::Read;
use std::path::Path;

pub const SAMPLE_BYTES: usize = 10_000;
pub const VALIDATION_ROWS: usize = 5;
const SCAN_CHUNK: usize = 64 * 1024;

/// Pick an encoding for a byte sample taken from the start of a file.
///
/// Pure ASCII and clean UTF-8 are UTF-8; anything else goes to statistical detection.
/// `complete` says the sample is the whole file, so a truncated multi-byte sequence at
/// the end is a real error rather than a cut.
pub fn sniff(sample: &[u8], complete: bool) -> &'static Encoding {
    if sample.is_ascii() {
        return UTF_8;
    }

    match std::str::from_utf8(sample) {
        Ok(_) => return UTF_8,
        Err(e) if !complete && e.error_len().is_none() => return UTF_8,
        Err(_) => {}
    }

    let mut detector = EncodingDetector::new();
    detector.feed(sample, complete);
    let guess = detector.guess(None, true);
    tracing::debug!("Statistical encoding guess: {}", guess.name());
    guess
}

/// Decode a record's fields strictly; `false` if any field is malformed.
pub fn decodes_cleanly(encoding: &'static Encoding, record: &csv::ByteRecord) -> bool {
    record.iter().all(|field| {
        encoding
            .decode_without_bom_handling_and_without_replacement(field)
            .is_some()
    })
}

/// Decode the first `rows` records with `encoding`; `Ok(false)` on the first failure.
pub fn validate_encoding(
    path: &Path,
    encoding: &'static Encoding,
    rows: usize,
    delimiter: u8,
    quote: u8,
) -> Result<bool> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .quote(quote)
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Decode: Failed to open {:?}", path))?;

    let mut record = csv::ByteRecord::new();
    for _ in 0..rows {
        match reader.read_byte_record(&mut record) {
            Ok(true) => {
                if !decodes_cleanly(encoding, &record) {
                    return Ok(false);
                }
            }
            Ok(false) => break,
            Err(e) => {
                tracing::warn!("Encoding validation could not read a record: {}", e);
                return Ok(false);
            }
        }
    }
    Ok(true)
}

/// Stream the whole file through a strict UTF-8 check.
pub fn is_utf8_file(path: &Path) -> Result<bool> {
    let mut file =
        File::open(path).with_context(|| format!("Decode: Failed to open {:?}", path))?;
    let mut buf = vec![0u8; SCAN_CHUNK];
    // Bytes of a multi-byte sequence cut by the previous read
    let mut carry = 0;
    loop {
        let read = file
            .read(&mut buf[carry..])
            .with_context(|| format!("Decode: Failed to scan {:?}", path))?;
        if read == 0 {
            return Ok(carry == 0);
        }
        let filled = carry + read;
        match std::str::from_utf8(&buf[..filled]) {
            Ok(_) => carry = 0,
            Err(e) if e.error_len().is_none() => {
                let valid = e.valid_up_to();
                buf.copy_within(valid..filled, 0);
                carry = filled - valid;
            }
            Err(_) => return Ok(false),
        }
    }
}

/// Resolve the encoding for `path`: a forced label, or detection plus validation with a
/// windows-1252 (`latin-1`) fallback.
pub fn resolve_encoding(
    path: &Path,
    forced: Option<&str>,
    delimiter: u8,
    quote: u8,
) -> Result<&'static Encoding> {
    if let Some(label) = forced {
        let encoding = Encoding::for_label(label.trim().as_bytes())
            .with_context(|| format!("CLI: Unknown encoding label '{}'", label))?;
        tracing::info!("Encoding: {} (forced)", encoding.name());
        return Ok(encoding);
    }

    let mut sample = Vec::with_capacity(SAMPLE_BYTES);
    File::open(path)
        .with_context(|| format!("Decode: Failed to open {:?}", path))?
        .take(SAMPLE_BYTES as u64)
        .read_to_end(&mut sample)
        .with_context(|| format!("Decode: Failed to sample {:?}", path))?;
    let complete = sample.len() < SAMPLE_BYTES;

    let detected = sniff(&sample, complete);
    tracing::info!(
        "Encoding: detected {} (non-ASCII bytes: {})",
        detected.name(),
        !sample.is_ascii()
    );

    if !validate_encoding(path, detected, VALIDATION_ROWS, delimiter, quote)? {
        tracing::warn!(
            "Encoding validation failed for {}, falling back to {}",
            detected.name(),
            WINDOWS_1252.name()
        );
        return Ok(WINDOWS_1252);
    }

    if detected == UTF_8 && !complete && !is_utf8_file(path)? {
        tracing::warn!(
            "{:?} has invalid UTF-8 past the first {} bytes, falling back to {}",
            path,
            SAMPLE_BYTES,
            WINDOWS_1252.name()
        );
        return Ok(WINDOWS_1252);
    }

    Ok(detected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn ascii_is_utf8() {
        assert_eq!(sniff(b"12345678;0001;UF", true), UTF_8);
    }

    #[test]
    fn clean_utf8_is_utf8() {
        assert_eq!(sniff("SÃO PAULO;AÇÚCAR".as_bytes(), true), UTF_8);
    }

    #[test]
    fn cut_utf8_sequence_is_tolerated_unless_complete() {
        let bytes = "AÇ".as_bytes();
        let cut = &bytes[..bytes.len() - 1];
        assert_eq!(sniff(cut, false), UTF_8);
        assert_ne!(sniff(cut, true), UTF_8);
    }

    #[test]
    fn latin1_bytes_are_detected() {
        let (bytes, _, _) = WINDOWS_1252.encode("AÇÚCAR E CAFÉ LTDA;SÃO PAULO;PRAÇA DA SÉ");
        let detected = sniff(&bytes, true);
        assert_ne!(detected, UTF_8);
    }

    #[test]
    fn forced_label_wins() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let encoding = resolve_encoding(file.path(), Some("latin1"), b';', b'"').unwrap();
        assert_eq!(encoding, WINDOWS_1252);
        assert!(resolve_encoding(file.path(), Some("klingon"), b';', b'"').is_err());
    }

    #[test]
    fn invalid_utf8_falls_back() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let (bytes, _, _) = WINDOWS_1252.encode("NOME;CIDADE\nCAFÉ;SÃO PAULO\n");
        file.write_all(&bytes).unwrap();
        file.flush().unwrap();

        let encoding = resolve_encoding(file.path(), None, b';', b'"').unwrap();
        assert_ne!(encoding, UTF_8);
        assert!(validate_encoding(file.path(), encoding, 5, b';', b'"').unwrap());
        assert!(!validate_encoding(file.path(), UTF_8, 5, b';', b'"').unwrap());
    }

    #[test]
    fn late_legacy_bytes_fall_back() {
        let mut text = String::from("CNPJ;NOME;UF\n");
        while text.len() <= SAMPLE_BYTES * 2 {
            text.push_str("12345678;EMPRESA LTDA;SP\n");
        }
        text.push_str("99999999;CAFÉ SÃO JOSÉ;MG\n");
        let (bytes, _, _) = WINDOWS_1252.encode(&text);
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&bytes).unwrap();
        file.flush().unwrap();

        assert_eq!(sniff(&bytes[..SAMPLE_BYTES], false), UTF_8);
        assert!(!is_utf8_file(file.path()).unwrap());
        assert_eq!(resolve_encoding(file.path(), None, b';', b'"').unwrap(), WINDOWS_1252);
    }

    #[test]
    fn utf8_across_chunk_boundaries_is_kept() {
        let mut text = String::new();
        while text.len() <= SCAN_CHUNK * 3 {
            text.push_str("12345678;AÇÚCAR SÃO JOSÉ;SP\n");
        }
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(text.as_bytes()).unwrap();
        file.flush().unwrap();

        assert!(is_utf8_file(file.path()).unwrap());
        assert_eq!(resolve_encoding(file.path(), None, b';', b'"').unwrap(), UTF_8);

        // A truncated final sequence is malformed
        file.write_all(&"Ç".as_bytes()[..1]).unwrap();
        file.flush().unwrap();
        assert!(!is_utf8_file(file.path()).unwrap());
    }
}
