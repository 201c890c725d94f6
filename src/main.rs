use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;

use cnpj_filter::app::{Cli, process_csv, resolve_format, runtime_config};
use cnpj_filter::config::FiltersConfig;
use cnpj_filter::utils::group_digits;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::INFO
    } else {
        tracing::Level::WARN
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(level.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Some(threads) = cli.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("CLI: Failed to initialize thread pool")?;
    }

    let filters = match &cli.filters {
        Some(path) => FiltersConfig::load(path)?,
        None => FiltersConfig::default(),
    };
    let config = Arc::new(filters.compile(cli.filter.as_deref())?);

    let multi_value = config
        .columns
        .columns()
        .iter()
        .filter(|c| c.multi_value)
        .count();
    tracing::info!(
        "Columns: {} ({} multi-value), {} conditions",
        config.columns.len(),
        multi_value,
        config.filter.conditions().len()
    );
    tracing::info!("Filter: {}", config.filter);

    let runtime = runtime_config(&cli);
    let format = resolve_format(&cli);

    let start = std::time::Instant::now();
    let stats = process_csv(&cli, config, &runtime, format)?;
    let elapsed = start.elapsed();

    eprintln!(
        "Matched {} of {} rows",
        group_digits(stats.matched),
        group_digits(stats.rows)
    );
    if stats.padded > 0 || stats.overlong > 0 {
        tracing::warn!(
            "Rows with unexpected length: {} short (padded), {} long (extra fields ignored)",
            stats.padded,
            stats.overlong
        );
    }
    if stats.soft.total() > 0 {
        tracing::warn!(
            "Unparseable cells in typed comparisons: {} number, {} date, {} boolean",
            stats.soft.number,
            stats.soft.date,
            stats.soft.boolean
        );
    }
    if stats.replaced_fields > 0 {
        tracing::warn!(
            "{} fields contained bytes invalid in the input encoding",
            stats.replaced_fields
        );
    }

    tracing::info!(
        "Done! Written {} rows in {:.2}s ({} rows/s)",
        stats.matched,
        elapsed.as_secs_f64(),
        (stats.rows as f64 / elapsed.as_secs_f64()) as u64
    );

    Ok(())
}
