use anyhow::Result;

pub mod delimited;
pub mod jsonl;

pub use self::delimited::{CsvOptions, CsvSink};
pub use self::jsonl::JsonlSink;

/// Destination for output records, written in order by a single thread.
pub trait RowSink: Send {
    fn write_record(&mut self, record: &[String]) -> Result<()>;
    fn finish(&mut self) -> Result<()>;
}
