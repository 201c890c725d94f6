use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::{CompiledConfig, DEFAULT_BATCH_SIZE, RuntimeConfig};
use crate::contacts::{CONTACT_HEADER, ContactTransformer, DEFAULT_MUNICIPALITIES, Municipalities};
use crate::decode::RowReader;
use crate::encoding::resolve_encoding;
use crate::pipeline::{ContactProcessor, FilterProcessor, RowStats, run};
use crate::sinks::{CsvOptions, CsvSink, JsonlSink, RowSink};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Input CSV file (registry extract, `;`-separated)
    #[arg(short, long)]
    pub input: PathBuf,

    /// Output file (.csv, .jsonl), or `-` for stdout
    #[arg(short, long)]
    pub output: PathBuf,

    /// Filter configuration file (YAML)
    #[arg(short, long)]
    pub filters: Option<PathBuf>,

    /// Filter expression, replacing the configured filter
    #[arg(long)]
    pub filter: Option<String>,

    /// Output format (auto-detected if omitted)
    #[arg(long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Write matching rows as-is or as CRM contacts
    #[arg(long, value_enum, default_value_t = OutputShape::Rows)]
    pub shape: OutputShape,

    /// Input encoding label (e.g. utf-8, latin1); skips detection
    #[arg(long, env = "CNPJ_FILTER_ENCODING")]
    pub encoding: Option<String>,

    /// The input has no header row
    #[arg(long)]
    pub no_header: bool,

    /// Rows per parallel batch
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,

    /// Number of threads (default: all cores)
    #[arg(short, long)]
    pub threads: Option<usize>,

    /// Municipality `code;name` table for the contacts shape
    #[arg(long)]
    pub municipalities: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum OutputFormat {
    #[value(name = "csv")]
    Csv,
    #[value(name = "jsonl", alias = "ndjson")]
    Jsonl,
}

impl OutputFormat {
    pub fn from_extension(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        match ext.to_lowercase().as_str() {
            "csv" | "txt" => Some(OutputFormat::Csv),
            "jsonl" | "ndjson" | "json" => Some(OutputFormat::Jsonl),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Jsonl => "jsonl",
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum OutputShape {
    Rows,
    Contacts,
}

pub fn runtime_config(cli: &Cli) -> RuntimeConfig {
    RuntimeConfig {
        has_header: !cli.no_header,
        batch_size: cli.batch_size.max(1),
        encoding: cli.encoding.clone(),
        ..RuntimeConfig::default()
    }
}

/// The `--format` flag, else the output extension, else CSV.
pub fn resolve_format(cli: &Cli) -> OutputFormat {
    if let Some(format) = cli.format {
        return format;
    }
    match OutputFormat::from_extension(&cli.output) {
        Some(format) => format,
        None => {
            tracing::info!("Could not detect output format from {:?}; using csv", cli.output);
            OutputFormat::Csv
        }
    }
}

pub fn init_sink(
    format: OutputFormat,
    output: &Path,
    header: Vec<String>,
    options: CsvOptions,
) -> Result<Box<dyn RowSink + Send>> {
    let stdout = output == Path::new("-");
    if stdout {
        tracing::info!("Sink: {} -> stdout", format.label());
    } else {
        tracing::info!("Sink: {} -> {:?}", format.label(), output);
    }

    match (format, stdout) {
        (OutputFormat::Csv, true) => Ok(Box::new(CsvSink::stdout(&header, options)?)),
        (OutputFormat::Csv, false) => Ok(Box::new(CsvSink::new(output, &header, options)?)),
        (OutputFormat::Jsonl, true) => Ok(Box::new(JsonlSink::stdout(header)?)),
        (OutputFormat::Jsonl, false) => Ok(Box::new(JsonlSink::new(output, header)?)),
    }
}

/// Decode, filter and write the whole input.
pub fn process_csv(
    cli: &Cli,
    config: Arc<CompiledConfig>,
    runtime: &RuntimeConfig,
    format: OutputFormat,
) -> Result<RowStats> {
    // Contact columns are checked before the output file is created
    let transformer = match cli.shape {
        OutputShape::Rows => None,
        OutputShape::Contacts => {
            let path = cli
                .municipalities
                .clone()
                .or_else(|| config.contacts.municipalities.clone())
                .unwrap_or_else(|| PathBuf::from(DEFAULT_MUNICIPALITIES));
            let municipalities = Municipalities::load_or_empty(&path);
            Some(Arc::new(ContactTransformer::new(&config.columns, municipalities)?))
        }
    };

    let encoding = resolve_encoding(
        &cli.input,
        runtime.encoding.as_deref(),
        runtime.delimiter,
        runtime.quote,
    )?;
    let mut reader = RowReader::open(&cli.input, encoding, runtime)?;
    tracing::info!("Reading {:?} as {}", cli.input, reader.encoding().name());

    if runtime.has_header {
        reader
            .skip_header(&config.columns)
            .context("Decode: Failed to read header row")?;
    }

    match transformer {
        None => {
            let sink = init_sink(format, &cli.output, config.columns.names(), CsvOptions::default())?;
            let processor = Arc::new(FilterProcessor { config });
            run(&mut reader, processor, sink, runtime.batch_size, "Rows")
        }
        Some(transformer) => {
            let header = CONTACT_HEADER.iter().map(|h| h.to_string()).collect();
            let options = CsvOptions {
                delimiter: b',',
                quote_all: true,
            };
            let sink = init_sink(format, &cli.output, header, options)?;
            let processor = Arc::new(ContactProcessor {
                config,
                transformer,
            });
            run(&mut reader, processor, sink, runtime.batch_size, "Rows")
        }
    }
}
