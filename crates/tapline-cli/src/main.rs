//! tapline - extract Ad Manager reports and ON24 webinar data
//!
//! Runs one stream at a time and writes its records as JSONL (stdout or
//! file) or, for report results, as Parquet.

use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

mod cmd;
mod config;
mod shutdown;

use config::{Config, mask};

#[derive(Parser)]
#[command(name = "tapline")]
#[command(about = "Extract Ad Manager reports and ON24 webinar data")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Config file path (default: ./tapline.toml or ~/.config/tapline/config.toml)
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,

    /// Maximum attempts for throttled requests
    #[arg(long, global = true)]
    max_retries: Option<u32>,
}

#[derive(Subcommand)]
enum Command {
    /// Extract one stream
    Sync(cmd::sync::SyncArgs),
    /// Show current configuration
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Progress context (TTY auto-detect)
    let progress = tapline_core::ProgressContext::new();

    // Logging:
    //   TTY:     quiet (warn) unless --debug: spinners show activity
    //   non-TTY: info unless --debug: logs are the only progress indicator
    let is_tty = progress.is_tty();
    let multi = if is_tty { Some(progress.multi()) } else { None };
    let quiet = if is_tty { !cli.debug } else { false };
    tapline_core::init_logging(quiet, cli.debug, multi);

    let config = if let Some(path) = cli.config {
        Config::from_file(&path)?
    } else {
        Config::load()?
    };

    // Config file defaults, CLI overrides
    let policy = tapline_core::RetryPolicy {
        max_attempts: cli.max_retries.unwrap_or(config.http.max_retries).max(1),
        base_delay: Duration::from_secs(config.http.base_delay_secs),
    };

    match cli.command {
        Command::Sync(args) => {
            shutdown::install_handlers().context("Failed to install signal handlers")?;
            cmd::sync::run(args, &config, policy, &progress)
        }
        Command::Config => {
            print_config(&config, &policy);
            Ok(())
        }
    }
}

fn print_config(config: &Config, policy: &tapline_core::RetryPolicy) {
    use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new("Setting").fg(Color::Cyan),
            Cell::new("Value").fg(Color::Cyan),
        ]);

    table.add_row(vec![
        "Output directory",
        &config.output.default_dir.display().to_string(),
    ]);
    table.add_row(vec![
        "Compression level",
        &config.output.compression_level.to_string(),
    ]);
    table.add_row(vec!["Max retries", &policy.max_attempts.to_string()]);
    table.add_row(vec![
        "Backoff base",
        &format!("{}s", policy.base_delay.as_secs()),
    ]);

    let gam = &config.admanager;
    table.add_row(vec!["GAM base URL", &gam.base_url]);
    table.add_row(vec![
        "GAM network",
        gam.network_id.as_deref().unwrap_or("not set"),
    ]);
    table.add_row(vec!["GAM access token", &mask(gam.access_token.as_deref())]);
    table.add_row(vec![
        "GAM polling",
        &format!("every {}s, timeout {}s", gam.poll_interval_secs, gam.timeout_secs),
    ]);
    table.add_row(vec!["GAM page size", &gam.page_size.to_string()]);
    let reports: Vec<&str> = gam.reports.keys().map(String::as_str).collect();
    table.add_row(vec!["GAM reports", &reports.join(", ")]);

    let on24 = &config.on24;
    table.add_row(vec!["ON24 base URL", &on24.base_url]);
    table.add_row(vec![
        "ON24 client",
        on24.client_id.as_deref().unwrap_or("not set"),
    ]);
    table.add_row(vec!["ON24 token key", &mask(on24.access_token_key.as_deref())]);
    table.add_row(vec![
        "ON24 token secret",
        &mask(on24.access_token_secret.as_deref()),
    ]);
    table.add_row(vec![
        "ON24 start date",
        on24.start_date.as_deref().unwrap_or("all"),
    ]);
    table.add_row(vec!["ON24 items per page", &on24.items_per_page.to_string()]);
    table.add_row(vec![
        "ON24 max pages per event",
        &on24
            .max_pages_per_event
            .map_or("unbounded".to_string(), |n| n.to_string()),
    ]);

    eprintln!("\n{table}");
}
