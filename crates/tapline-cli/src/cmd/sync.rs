//! Sync subcommand - drain one stream into JSONL or Parquet

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Args, ValueEnum};
use serde::Serialize;

use tapline_admanager::{ListStream, ReportResultAccumulator, ReportResults};
use tapline_core::{
    HttpGateway, JsonlSink, ParquetSink, ProgressContext, RetryPolicy, StreamProgress, TapError,
    WalkSummary, fmt_num, is_valid_parquet, write_batched,
};
use tapline_on24::{ChildResource, EventsStream};

use crate::config::Config;
use crate::shutdown::is_shutdown_requested;

#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Stream to extract
    #[arg(value_enum)]
    pub stream: StreamName,

    /// Output file (default: stdout for jsonl, <default_dir>/<stream>.parquet for parquet)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "jsonl")]
    pub format: OutputFormat,

    /// Zstd compression level (1-22)
    #[arg(short, long)]
    pub zstd_level: Option<i32>,
}

#[derive(Clone, Copy, ValueEnum, Debug, PartialEq, Eq)]
pub enum StreamName {
    Orders,
    Placements,
    Reports,
    ReportResults,
    Events,
    Attendees,
    Registrants,
}

impl StreamName {
    fn label(self) -> &'static str {
        match self {
            Self::Orders => "orders",
            Self::Placements => "placements",
            Self::Reports => "reports",
            Self::ReportResults => "report_results",
            Self::Events => "events",
            Self::Attendees => "attendees",
            Self::Registrants => "registrants",
        }
    }
}

#[derive(Clone, Copy, ValueEnum, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Jsonl,
    Parquet,
}

pub fn run(
    args: SyncArgs,
    config: &Config,
    policy: RetryPolicy,
    progress: &ProgressContext,
) -> Result<()> {
    let name = args.stream.label();
    if args.format == OutputFormat::Parquet && args.stream != StreamName::ReportResults {
        bail!("Parquet output is only available for report-results, not {name}");
    }

    let stream = progress.stream(name);
    let rows = match args.stream {
        StreamName::Orders | StreamName::Placements | StreamName::Reports => {
            let list = ListStream::from_name(name).context("unknown list stream")?;
            let source = config.admanager.to_source();
            let gw = admanager_gateway(&source, policy)?;
            let pager = list.pager(&gw, &source);
            drain(pager.records(), jsonl_sink(args.output.as_deref())?, stream)?
        }
        StreamName::ReportResults => {
            let source = config.admanager.to_source();
            let gw = admanager_gateway(&source, policy)?;
            let records = ReportResults::new(&gw, &source);
            match args.format {
                OutputFormat::Jsonl => {
                    drain(records, jsonl_sink(args.output.as_deref())?, stream)?
                }
                OutputFormat::Parquet => {
                    let path = args.output.clone().unwrap_or_else(|| {
                        config.output.default_dir.join(format!("{name}.parquet"))
                    });
                    let level = args.zstd_level.unwrap_or(config.output.compression_level);
                    let rows = drain_parquet(records, &path, level, stream)?;
                    log::info!("{name}: wrote {} rows to {}", fmt_num(rows), path.display());
                    return Ok(());
                }
            }
        }
        StreamName::Events => {
            let source = config.on24.to_source()?;
            let gw = on24_gateway(&source, policy)?;
            let events = EventsStream::new(&gw, &source);
            drain(events.iter(), jsonl_sink(args.output.as_deref())?, stream)?
        }
        StreamName::Attendees | StreamName::Registrants => {
            let child = ChildResource::from_name(name).context("unknown child stream")?;
            let source = config.on24.to_source()?;
            let gw = on24_gateway(&source, policy)?;
            let events = EventsStream::new(&gw, &source);
            let mut walk = child.walk(&gw, &source, &events);
            let rows = drain(walk.by_ref(), jsonl_sink(args.output.as_deref())?, stream)?;
            log_summary(name, walk.summary());
            rows
        }
    };

    if let Some(path) = &args.output {
        log::info!("{name}: wrote {} rows to {}", fmt_num(rows), path.display());
    }
    Ok(())
}

fn admanager_gateway(
    config: &tapline_admanager::Config,
    policy: RetryPolicy,
) -> Result<HttpGateway> {
    let gw = tapline_admanager::connect(config).context("Ad Manager configuration")?;
    Ok(gw.with_policy(policy))
}

fn on24_gateway(config: &tapline_on24::Config, policy: RetryPolicy) -> Result<HttpGateway> {
    let gw = tapline_on24::connect(config).context("ON24 configuration")?;
    Ok(gw.with_policy(policy))
}

fn jsonl_sink(output: Option<&Path>) -> Result<JsonlSink> {
    match output {
        Some(path) => JsonlSink::create(path)
            .with_context(|| format!("Failed to create {}", path.display())),
        None => Ok(JsonlSink::stdout()),
    }
}

/// Write records until the stream ends or shutdown is requested.
///
/// The flag is checked before pulling each record, so an interrupted run
/// still finalizes everything written so far.
fn drain<T: Serialize>(
    mut records: impl Iterator<Item = Result<T, TapError>>,
    mut sink: JsonlSink,
    mut progress: StreamProgress,
) -> Result<usize> {
    let mut interrupted = false;
    loop {
        if is_shutdown_requested() {
            interrupted = true;
            break;
        }
        let Some(record) = records.next() else {
            break;
        };
        match record {
            Ok(record) => {
                sink.write(&record).context("Failed to write record")?;
                progress.record();
            }
            Err(e) => {
                progress.finish(true);
                return Err(e).context("Stream failed");
            }
        }
    }
    let rows = sink.finalize().context("Failed to finalize output")?;
    progress.finish(interrupted);
    Ok(rows)
}

fn drain_parquet(
    mut records: ReportResults<'_>,
    path: &Path,
    zstd_level: i32,
    mut progress: StreamProgress,
) -> Result<usize> {
    let mut sink = ParquetSink::create(path, tapline_admanager::schema::report_results(), zstd_level)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    let mut acc = ReportResultAccumulator::new();

    let mut interrupted = false;
    let mut failure = None;
    let rows = std::iter::from_fn(|| {
        if is_shutdown_requested() {
            interrupted = true;
            return None;
        }
        match records.next()? {
            Ok(record) => {
                progress.record();
                Some(record)
            }
            Err(e) => {
                failure = Some(e);
                None
            }
        }
    });
    write_batched(rows, &mut acc, |batch| sink.write_batch(batch))
        .with_context(|| format!("Failed to write {}", path.display()))?;

    if let Some(e) = failure {
        progress.finish(true);
        return Err(e).context("Stream failed");
    }
    let rows = finalize_parquet(sink, path)?;
    progress.finish(interrupted);
    Ok(rows)
}

/// Close the writer and confirm the renamed file has a readable footer.
fn finalize_parquet(sink: ParquetSink, path: &Path) -> Result<usize> {
    let rows = sink.finalize().context("Failed to finalize parquet")?;
    if !is_valid_parquet(path) {
        bail!("{} is not a readable parquet file", path.display());
    }
    Ok(rows)
}

fn log_summary(name: &str, summary: &WalkSummary) {
    log::info!(
        "{name}: {} events visited, {} skipped, {} abandoned, {} pages, {} records",
        summary.parents_visited,
        summary.parents_skipped,
        summary.parents_abandoned,
        summary.pages_fetched,
        fmt_num(summary.records_emitted)
    );
}
