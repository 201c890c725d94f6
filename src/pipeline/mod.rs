use anyhow::{Context, Result, anyhow};
use crossbeam_channel::{Sender, bounded};
use rayon::prelude::*;
use std::io::Read;
use std::ops::AddAssign;
use std::sync::Arc;

use crate::config::CompiledConfig;
use crate::contacts::ContactTransformer;
use crate::decode::{Row, RowReader};
use crate::dsl::{SoftFailures, evaluate_traced};
use crate::sinks::RowSink;
use crate::utils::ProgressCounter;

pub const PROGRESS_INTERVAL: u64 = 100_000;

/// Per-run counters; batches are summed in file order.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RowStats {
    pub rows: u64,
    pub matched: u64,
    /// Rows shorter than the column mapping, padded with empty cells.
    pub padded: u64,
    /// Rows longer than the column mapping; extra cells are ignored.
    pub overlong: u64,
    /// Fields that did not decode cleanly and were read with replacement characters.
    pub replaced_fields: u64,
    pub soft: SoftFailures,
}

impl AddAssign for RowStats {
    fn add_assign(&mut self, other: Self) {
        self.rows += other.rows;
        self.matched += other.matched;
        self.padded += other.padded;
        self.overlong += other.overlong;
        self.replaced_fields += other.replaced_fields;
        self.soft += other.soft;
    }
}

pub struct BatchOutput {
    pub records: Vec<Row>,
    pub stats: RowStats,
}

pub trait BatchProcessor: Send + Sync {
    fn process_batch(&self, rows: Vec<Row>) -> Result<BatchOutput>;
}

/// Writes matching rows unchanged.
pub struct FilterProcessor {
    pub config: Arc<CompiledConfig>,
}

impl BatchProcessor for FilterProcessor {
    fn process_batch(&self, rows: Vec<Row>) -> Result<BatchOutput> {
        process_batch_with(rows, &self.config, |row| row)
    }
}

/// Writes matching rows as contact records.
pub struct ContactProcessor {
    pub config: Arc<CompiledConfig>,
    pub transformer: Arc<ContactTransformer>,
}

impl BatchProcessor for ContactProcessor {
    fn process_batch(&self, rows: Vec<Row>) -> Result<BatchOutput> {
        process_batch_with(rows, &self.config, |row| {
            self.transformer.transform(&row).into_fields()
        })
    }
}

/// Bring a row to the mapping's width, counting the adjustment.
pub fn conform_row(row: &mut Row, width: usize, stats: &mut RowStats) {
    if row.len() < width {
        stats.padded += 1;
        row.resize(width, String::new());
    } else if row.len() > width {
        stats.overlong += 1;
        row.truncate(width);
    }
}

fn process_batch_with<F>(rows: Vec<Row>, config: &CompiledConfig, output: F) -> Result<BatchOutput>
where
    F: Fn(Row) -> Row + Send + Sync,
{
    let width = config.columns.len();
    let results: Vec<(Option<Row>, RowStats)> = rows
        .into_par_iter()
        .map(|mut row| -> Result<(Option<Row>, RowStats)> {
            let mut stats = RowStats {
                rows: 1,
                ..RowStats::default()
            };
            conform_row(&mut row, width, &mut stats);

            let matched = evaluate_traced(&config.filter, &row, &config.columns, &mut stats.soft)
                .context("Pipeline: Filter evaluation failed")?;
            if !matched {
                return Ok((None, stats));
            }
            stats.matched = 1;
            Ok((Some(output(row)), stats))
        })
        .collect::<Result<_>>()?;

    let mut batch = BatchOutput {
        records: Vec::new(),
        stats: RowStats::default(),
    };
    for (record, stats) in results {
        batch.stats += stats;
        if let Some(record) = record {
            batch.records.push(record);
        }
    }
    Ok(batch)
}

/// Stream every row through `processor` and write the output with a dedicated writer thread.
///
/// The sink is finished by the writer thread once all batches are written.
pub fn run<R, P>(
    reader: &mut RowReader<R>,
    processor: Arc<P>,
    sink: Box<dyn RowSink + Send>,
    batch_size: usize,
    label: &'static str,
) -> Result<RowStats>
where
    R: Read,
    P: BatchProcessor + 'static,
{
    let (tx, rx) = bounded::<Vec<Row>>(64);
    let progress = ProgressCounter::new(label, PROGRESS_INTERVAL);

    let writer = std::thread::spawn(move || -> Result<u64> {
        let mut sink = sink;
        let mut written = 0u64;
        for batch in rx {
            for record in batch {
                sink.write_record(&record)?;
                written += 1;
            }
        }
        sink.finish().context("Pipeline: Failed to finalize sink")?;
        Ok(written)
    });

    let read_result = feed_batches(reader, processor.as_ref(), &tx, batch_size.max(1), &progress);

    drop(tx);

    // Get writer thread result - it contains the root cause if there was an error
    let writer_join = writer.join();

    // Check writer thread first - it has the real error if the channel disconnected
    let written = match writer_join {
        Ok(Ok(result)) => result,
        Ok(Err(writer_err)) => {
            return if read_result.is_err() {
                Err(writer_err
                    .context("Pipeline: Sink writer thread failed (caused channel disconnect)"))
            } else {
                Err(writer_err)
            };
        }
        Err(panic_payload) => {
            let panic_msg = panic_payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic_payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            return Err(anyhow!(
                "Pipeline: Sink writer thread panicked: {}",
                panic_msg
            ));
        }
    };

    // Only check read_result if writer succeeded
    let mut stats = read_result?;
    progress.finish();

    stats.replaced_fields = reader.replaced_fields();
    if written != stats.matched {
        return Err(anyhow!(
            "Pipeline: Wrote {} records but {} rows matched",
            written,
            stats.matched
        ));
    }
    Ok(stats)
}

fn feed_batches<R, P>(
    reader: &mut RowReader<R>,
    processor: &P,
    tx: &Sender<Vec<Row>>,
    batch_size: usize,
    progress: &ProgressCounter,
) -> Result<RowStats>
where
    R: Read,
    P: BatchProcessor + ?Sized,
{
    let mut stats = RowStats::default();
    loop {
        let rows = reader.next_batch(batch_size)?;
        if rows.is_empty() {
            break;
        }
        let row_count = rows.len() as u64;

        let output = processor.process_batch(rows)?;
        stats += output.stats;
        if !output.records.is_empty() {
            tx.send(output.records)
                .map_err(|err| anyhow!("Pipeline: Failed to send record batch: {}", err))?;
        }

        progress.inc(row_count);
    }
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ContactsConfig, RuntimeConfig};
    use crate::dsl::{ColumnMapping, and, contains, eq, gt, not};
    use encoding_rs::UTF_8;
    use std::sync::Mutex;

    struct MemorySink {
        records: Arc<Mutex<Vec<Row>>>,
    }

    impl RowSink for MemorySink {
        fn write_record(&mut self, record: &[String]) -> Result<()> {
            self.records.lock().unwrap().push(record.to_vec());
            Ok(())
        }

        fn finish(&mut self) -> Result<()> {
            Ok(())
        }
    }

    struct FailingSink;

    impl RowSink for FailingSink {
        fn write_record(&mut self, _record: &[String]) -> Result<()> {
            Err(anyhow!("Sink: disk full"))
        }

        fn finish(&mut self) -> Result<()> {
            Ok(())
        }
    }

    fn config(filter: crate::dsl::Predicate) -> Arc<CompiledConfig> {
        Arc::new(CompiledConfig {
            columns: ColumnMapping::from_names(["UF", "EMAIL", "CAPITAL"]).unwrap(),
            filter,
            contacts: ContactsConfig::default(),
        })
    }

    fn run_on(input: &str, config: Arc<CompiledConfig>, batch_size: usize) -> (RowStats, Vec<Row>) {
        let records = Arc::new(Mutex::new(Vec::new()));
        let sink = Box::new(MemorySink {
            records: Arc::clone(&records),
        });
        let mut reader = RowReader::new(input.as_bytes(), UTF_8, &RuntimeConfig::default());
        let processor = Arc::new(FilterProcessor { config });
        let stats = run(&mut reader, processor, sink, batch_size, "Rows").unwrap();
        let records = records.lock().unwrap().clone();
        (stats, records)
    }

    #[test]
    fn filters_rows_in_order() {
        let filter = and([eq("UF", "MG"), not(contains("EMAIL", "@gmail"))]);
        let input = "MG;a@empresa.com;1\nSP;b@empresa.com;2\nMG;c@gmail.com;3\nmg;d@empresa.com;4\n";
        let (stats, records) = run_on(input, config(filter), 1);

        assert_eq!(stats.rows, 4);
        assert_eq!(stats.matched, 2);
        let capitals: Vec<&str> = records.iter().map(|r| r[2].as_str()).collect();
        assert_eq!(capitals, vec!["1", "4"]);
    }

    #[test]
    fn short_and_long_rows_are_counted() {
        let input = "MG\nMG;x;1;extra\nMG;y;2\n";
        let (stats, records) = run_on(input, config(eq("UF", "MG")), 10);

        assert_eq!(stats.padded, 1);
        assert_eq!(stats.overlong, 1);
        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| r.len() == 3));
        assert_eq!(records[0], vec!["MG".to_string(), String::new(), String::new()]);
    }

    #[test]
    fn soft_failures_are_summed() {
        let input = "MG;a;abc\nMG;b;5000\nMG;c;\n";
        let (stats, records) = run_on(input, config(gt("CAPITAL", 1000.0)), 2);
        assert_eq!(records.len(), 1);
        assert_eq!(stats.soft.number, 2);
    }

    #[test]
    fn writer_error_is_reported() {
        let mut reader = RowReader::new("MG;a;1\n".as_bytes(), UTF_8, &RuntimeConfig::default());
        let processor = Arc::new(FilterProcessor {
            config: config(eq("UF", "MG")),
        });
        let err = run(&mut reader, processor, Box::new(FailingSink), 10, "Rows").unwrap_err();
        assert!(format!("{err:#}").contains("disk full"));
    }
}
