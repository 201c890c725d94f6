use super::RowSink;
use anyhow::{Context, Result};
use csv::{QuoteStyle, WriterBuilder};
use std::fs::File;
use std::io::Write;
use std::path::Path;

#[derive(Debug, Clone, Copy)]
pub struct CsvOptions {
    pub delimiter: u8,
    pub quote_all: bool,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            delimiter: b';',
            quote_all: false,
        }
    }
}

/// Delimited UTF-8 output with a header row.
pub struct CsvSink {
    writer: csv::Writer<Box<dyn Write + Send>>,
}

impl CsvSink {
    pub fn new<P: AsRef<Path>>(path: P, header: &[String], options: CsvOptions) -> Result<Self> {
        let path = path.as_ref();
        let file =
            File::create(path).with_context(|| format!("Sink: Failed to create {:?}", path))?;
        Self::from_writer(Box::new(file), header, options)
    }

    pub fn stdout(header: &[String], options: CsvOptions) -> Result<Self> {
        Self::from_writer(Box::new(std::io::stdout()), header, options)
    }

    pub fn from_writer(
        inner: Box<dyn Write + Send>,
        header: &[String],
        options: CsvOptions,
    ) -> Result<Self> {
        let quote_style = if options.quote_all {
            QuoteStyle::Always
        } else {
            QuoteStyle::Necessary
        };
        let mut writer = WriterBuilder::new()
            .delimiter(options.delimiter)
            .quote_style(quote_style)
            .from_writer(inner);
        writer
            .write_record(header)
            .context("Sink: Failed to write header")?;
        Ok(Self { writer })
    }
}

impl RowSink for CsvSink {
    fn write_record(&mut self, record: &[String]) -> Result<()> {
        self.writer.write_record(record)?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}
