//! DriveTidy: snapshot, cache and analyse a remote drive tree.
//!
//! Thin binary entry point. All logic lives in the `drivetidy-core` crate;
//! this file wires up logging, configuration and the offline listing, then
//! prints the report.

mod export_listing;

use anyhow::Context;
use clap::{Parser, Subcommand};
use drivetidy_core::analysis::analyse;
use drivetidy_core::cache::{CacheState, SnapshotCache};
use drivetidy_core::config::EngineConfig;
use drivetidy_core::model::size::{format_hours, format_size};
use drivetidy_core::report::{export_csv, ScanSummary};
use drivetidy_core::scanner::{start_scan, ScanCoordinator, ScanOptions, ScanProgress};
use drivetidy_core::ScopeId;
use export_listing::JsonExportListing;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Parser, Debug)]
#[command(name = "drivetidy")]
#[command(about = "Snapshot a drive tree, find duplicates and suggest a cleaner structure")]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to the platform config dir)
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Snapshot cache directory override
    #[arg(long, value_name = "DIR", global = true)]
    cache_dir: Option<PathBuf>,

    /// Debug-level logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scan a scope (from cache when fresh) and print the analysis
    Analyse {
        /// JSON array of items exported from the drive
        #[arg(long, value_name = "FILE")]
        source: PathBuf,

        /// Folder id to restrict the scan to
        #[arg(long, default_value = ScopeId::ENTIRE_DRIVE)]
        scope: String,

        /// Ignore the cached snapshot but save the new one
        #[arg(long)]
        force_refresh: bool,

        /// Neither read nor write the cache
        #[arg(long, conflicts_with = "force_refresh")]
        no_cache: bool,

        /// Accept a cached snapshot past its TTL
        #[arg(long)]
        allow_stale: bool,

        /// TTL for the new snapshot (defaults to the configured TTL)
        #[arg(long, value_name = "HOURS")]
        ttl_hours: Option<f64>,

        /// Write the JSON summary to this file
        #[arg(long, value_name = "FILE")]
        json: Option<PathBuf>,

        /// Write duplicates.csv and issues.csv into this directory
        #[arg(long, value_name = "DIR")]
        csv_dir: Option<PathBuf>,
    },

    /// Show the cached snapshot state for a scope
    CacheStatus {
        #[arg(long, default_value = ScopeId::ENTIRE_DRIVE)]
        scope: String,
    },

    /// Remove cached snapshots
    CacheClear {
        #[arg(long, default_value = ScopeId::ENTIRE_DRIVE, conflicts_with = "all")]
        scope: String,

        /// Remove every scope's snapshot
        #[arg(long)]
        all: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let mut config = EngineConfig::load_or_default(cli.config.as_deref())
        .context("failed to load configuration")?;
    if let Some(dir) = cli.cache_dir {
        config.cache.dir = Some(dir);
    }

    let cache_dir = config.cache.resolved_dir()?;
    let cache = SnapshotCache::in_dir(&cache_dir)
        .with_context(|| format!("failed to open cache at {}", cache_dir.display()))?;
    debug!("Using snapshot cache at {}", cache.location());

    match cli.command {
        Command::Analyse {
            source,
            scope,
            force_refresh,
            no_cache,
            allow_stale,
            ttl_hours,
            json,
            csv_dir,
        } => {
            let options = ScanOptions {
                no_cache,
                force_refresh,
                allow_stale,
                ttl_hours: ttl_hours.unwrap_or(config.cache.ttl_hours),
            };
            run_analyse(
                &config,
                cache,
                source,
                ScopeId::new(scope),
                options,
                json,
                csv_dir,
            )
        }
        Command::CacheStatus { scope } => {
            print_cache_status(&cache, &ScopeId::new(scope));
            Ok(())
        }
        Command::CacheClear { scope, all } => {
            if all {
                cache.clear_all().context("failed to clear cache")?;
            } else {
                cache
                    .clear(&ScopeId::new(&scope))
                    .with_context(|| format!("failed to clear cache for scope {scope}"))?;
            }
            Ok(())
        }
    }
}

fn run_analyse(
    config: &EngineConfig,
    cache: SnapshotCache,
    source: PathBuf,
    scope: ScopeId,
    options: ScanOptions,
    json: Option<PathBuf>,
    csv_dir: Option<PathBuf>,
) -> anyhow::Result<()> {
    let listing = Arc::new(JsonExportListing::new(source));
    let coordinator = Arc::new(ScanCoordinator::new(listing, cache));
    let handle = start_scan(coordinator, scope.clone(), options)?;
    install_interrupt_handler(handle.cancel_flag());

    // The sender is dropped when the scan thread exits, ending this loop.
    for message in handle.progress_rx.iter() {
        match message {
            ScanProgress::CacheHit { stale: true, .. } => {
                warn!("Using a stale snapshot; pass --force-refresh for current data")
            }
            ScanProgress::Page { pages, items_found } => {
                debug!("Page {pages}: {items_found} items so far")
            }
            ScanProgress::Cancelled { pages } => warn!("Scan cancelled after {pages} page(s)"),
            _ => {}
        }
    }
    let outcome = handle.wait()?;
    let store = outcome.store;

    let report = analyse(&store, config, chrono::Utc::now());
    let summary = ScanSummary::build(&store, &outcome.origin, &report, config.report.outline_limit);
    print_summary(&summary, report.stale_file_count);

    if let Some(path) = json {
        let text = summary.to_json_pretty()?;
        std::fs::write(&path, text)
            .with_context(|| format!("failed to write {}", path.display()))?;
        info!("Wrote summary to {}", path.display());
    }
    if let Some(dir) = csv_dir {
        export_csv(&dir, &store, &report)
            .with_context(|| format!("failed to export CSV to {}", dir.display()))?;
    }
    Ok(())
}

/// First Ctrl-C cancels the fetch before its next page; a second one exits.
fn install_interrupt_handler(cancel: Arc<AtomicBool>) {
    let installed = ctrlc::set_handler(move || {
        if cancel.swap(true, Ordering::Relaxed) {
            std::process::exit(130);
        }
        eprintln!("Cancelling scan; press Ctrl-C again to exit immediately");
    });
    if let Err(e) = installed {
        warn!("Failed to install the Ctrl-C handler: {e}");
    }
}

fn print_summary(summary: &ScanSummary, stale_files: usize) {
    println!(
        "Scope {} ({} snapshot from {})",
        summary.scope,
        summary.origin.source,
        summary.origin.captured_at.format("%Y-%m-%d %H:%M UTC")
    );
    println!(
        "  {} files in {} folders, {}",
        summary.total_files,
        summary.total_folders,
        format_size(summary.total_bytes)
    );
    println!("  {stale_files} stale files");

    if !summary.file_types.is_empty() {
        println!("\nFile types:");
        for stats in &summary.file_types {
            println!(
                "  {:<14} {:>8} files  {:>10}",
                stats.category.label(),
                stats.file_count,
                format_size(stats.total_size)
            );
        }
    }

    if !summary.duplicates.is_empty() {
        println!(
            "\nDuplicates ({} groups, {} recoverable):",
            summary.duplicates.len(),
            format_size(summary.wasted_bytes)
        );
        for group in &summary.duplicates {
            println!(
                "  [{}% {}] keep {} ({} wasted)",
                group.confidence,
                group.method,
                group.retained_path,
                format_size(group.wasted_bytes)
            );
            for path in group.member_paths.iter().filter(|p| **p != group.retained_path) {
                println!("      {path}");
            }
        }
    }

    if !summary.issues.is_empty() {
        println!("\nStructure issues:");
        for issue in &summary.issues {
            println!("  [{}] {}: {}", issue.severity, issue.kind, issue.detail);
        }
    }

    if !summary.suggestions.is_empty() {
        println!("\nSuggestions:");
        for suggestion in &summary.suggestions {
            println!("  {}: {}", suggestion.title, suggestion.description);
            for action in &suggestion.actions {
                println!("    - {action}");
            }
        }
    }
}

fn print_cache_status(cache: &SnapshotCache, scope: &ScopeId) {
    let status = cache.status(scope);
    match status.state {
        CacheState::Absent => println!("Scope {scope}: no cached snapshot"),
        state => {
            let freshness = if state == CacheState::Valid {
                format!("expires in {}", format_hours(status.expires_in_hours))
            } else {
                format!("expired {} ago", format_hours(-status.expires_in_hours))
            };
            println!(
                "Scope {scope}: {} items, captured {} ago, {freshness}",
                status.item_count,
                format_hours(status.age_hours)
            );
        }
    }
}
