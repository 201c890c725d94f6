//! Reading delimited rows and decoding them to text.

use anyhow::{Context, Result};
use encoding_rs::Encoding;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::config::RuntimeConfig;
use crate::dsl::ColumnMapping;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// A decoded row: one string per field, in file order.
pub type Row = Vec<String>;

/// Reads byte records and decodes each field with a fixed encoding.
///
/// Malformed sequences are replaced rather than rejected; the number of fields that
/// needed replacement is kept in [`RowReader::replaced_fields`].
pub struct RowReader<R: Read> {
    reader: csv::Reader<R>,
    encoding: &'static Encoding,
    record: csv::ByteRecord,
    records_read: u64,
    replaced_fields: u64,
}

impl RowReader<File> {
    pub fn open(path: &Path, encoding: &'static Encoding, runtime: &RuntimeConfig) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Decode: Failed to open {:?}", path))?;
        Ok(Self::new(file, encoding, runtime))
    }
}

impl<R: Read> RowReader<R> {
    pub fn new(inner: R, encoding: &'static Encoding, runtime: &RuntimeConfig) -> Self {
        let reader = csv::ReaderBuilder::new()
            .delimiter(runtime.delimiter)
            .quote(runtime.quote)
            .has_headers(false)
            .flexible(true)
            .from_reader(inner);
        Self {
            reader,
            encoding,
            record: csv::ByteRecord::new(),
            records_read: 0,
            replaced_fields: 0,
        }
    }

    pub fn encoding(&self) -> &'static Encoding {
        self.encoding
    }

    pub fn replaced_fields(&self) -> u64 {
        self.replaced_fields
    }

    /// Consume the file's header row and compare it with the configured columns.
    ///
    /// A mismatch is only a warning: rows are always read by position.
    pub fn skip_header(&mut self, columns: &ColumnMapping) -> Result<Option<Row>> {
        let Some(header) = self.next_row()? else {
            return Ok(None);
        };

        let expected = columns.names();
        let matches = header.len() == expected.len()
            && header
                .iter()
                .zip(&expected)
                .all(|(found, want)| found.trim().eq_ignore_ascii_case(want));
        if !matches {
            tracing::warn!(
                "Header does not match the configured columns ({} found, {} configured); rows are read by position",
                header.len(),
                expected.len()
            );
            tracing::debug!("File header: {:?}", header);
        }

        Ok(Some(header))
    }

    pub fn next_row(&mut self) -> Result<Option<Row>> {
        let more = self
            .reader
            .read_byte_record(&mut self.record)
            .with_context(|| format!("Decode: Failed to read record {}", self.records_read + 1))?;
        if !more {
            return Ok(None);
        }

        let first = self.records_read == 0;
        self.records_read += 1;

        let mut row = Vec::with_capacity(self.record.len());
        for (i, field) in self.record.iter().enumerate() {
            let field = match field.strip_prefix(UTF8_BOM) {
                Some(rest) if first && i == 0 => rest,
                _ => field,
            };
            let (text, had_errors) = self.encoding.decode_without_bom_handling(field);
            if had_errors {
                self.replaced_fields += 1;
            }
            row.push(text.into_owned());
        }
        Ok(Some(row))
    }

    /// Read up to `size` rows; an empty batch means the input is exhausted.
    pub fn next_batch(&mut self, size: usize) -> Result<Vec<Row>> {
        let mut batch = Vec::with_capacity(size);
        while batch.len() < size {
            match self.next_row()? {
                Some(row) => batch.push(row),
                None => break,
            }
        }
        Ok(batch)
    }
}
