// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod fetch;
pub mod handle;
pub mod logging;
pub mod materialize;
pub mod queue;
pub mod settings;
pub mod types;

use std::fs;
use std::sync::{Arc, Mutex};

use anyhow::{bail, Context, Result};
use tracing::{debug, info, warn};

pub use crate::engine::{ItemHandle, LoadFailure, LoadReport, RuntimeOptions};
pub use crate::handle::Loader;
pub use crate::settings::LoadOptions;
pub use crate::types::{FetchMode, ResourceKind};

use crate::cli::CliArgs;
use crate::config::model::Manifest;
use crate::config::validate::validate_origin;
use crate::config::load_and_validate;
use crate::fetch::HttpFetcher;
use crate::materialize::{Document, DocumentMaterializer};
use crate::queue::{is_same_origin, Origin};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - manifest loading
/// - loader runtime with the HTTP fetcher and document materializer
/// - Ctrl-C handling
/// - rendering the document and the per-resource summary
pub async fn run(args: CliArgs) -> Result<()> {
    let manifest = load_and_validate(&args.manifest)
        .with_context(|| format!("loading manifest '{}'", args.manifest.display()))?;
    if let Some(origin) = args.origin.as_deref() {
        validate_origin(origin)?;
    }

    let options = manifest.runtime_options(args.origin.as_deref());

    if args.dry_run {
        print_dry_run(&manifest, &options);
        return Ok(());
    }

    let page_origin = options.page_origin.as_deref().and_then(Origin::parse);
    let fetcher = HttpFetcher::new(page_origin)?;
    let document = Arc::new(Mutex::new(Document::new()));

    let (loader, runtime_task) = {
        let document = Arc::clone(&document);
        Loader::spawn(
            fetcher,
            move |tx| DocumentMaterializer::with_document(tx, document),
            options,
        )
    };

    // Ctrl-C → stop without waiting for outstanding resources.
    {
        let loader = loader.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            let _ = loader.shutdown().await;
        });
    }

    let reports: Arc<Mutex<Vec<LoadReport>>> = Arc::new(Mutex::new(Vec::new()));
    for entry in &manifest.resource {
        let on_success = Arc::clone(&reports);
        let on_failure = Arc::clone(&reports);
        let options = entry
            .to_options()
            .on_success(move |report| record(&on_success, report))
            .on_failure(move |report| record(&on_failure, report));

        let handle = loader.submit(options).await?;
        debug!(index = handle.index(), resource = %entry.label(), "submitted");
    }
    loader.finish().await?;

    runtime_task
        .await
        .context("loader runtime task panicked")??;

    let mut reports = take_reports(&reports);
    reports.sort_by_key(|r| r.handle);

    let rendered = document
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .render();
    match args.output.as_deref() {
        Some(path) => {
            fs::write(path, &rendered).with_context(|| format!("writing document to '{path}'"))?;
            info!(path, "document written");
        }
        None => print!("{rendered}"),
    }

    print_summary(&reports, manifest.resource.len());

    let failed = reports.iter().filter(|r| !r.is_success()).count();
    if failed > 0 {
        bail!("{failed} of {} resources failed to load", manifest.resource.len());
    }
    if reports.len() < manifest.resource.len() {
        bail!(
            "loader stopped with {} of {} resources unresolved",
            manifest.resource.len() - reports.len(),
            manifest.resource.len()
        );
    }
    Ok(())
}

fn record(reports: &Mutex<Vec<LoadReport>>, report: &LoadReport) {
    reports
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .push(report.clone());
}

fn take_reports(reports: &Mutex<Vec<LoadReport>>) -> Vec<LoadReport> {
    std::mem::take(&mut *reports.lock().unwrap_or_else(|poisoned| poisoned.into_inner()))
}

/// One line per resource on stderr, in submission order.
fn print_summary(reports: &[LoadReport], total: usize) {
    for report in reports {
        let name = if report.locator.is_empty() {
            format!("<{}>", report.kind)
        } else {
            report.locator.clone()
        };
        let mode = match report.mode {
            FetchMode::Fetch => "inline",
            FetchMode::Direct => "direct",
        };
        match &report.failure {
            None => eprintln!("  ok    #{:<3} {mode:<6} {name}", report.handle.index()),
            Some(failure) => eprintln!(
                "  FAIL  #{:<3} {mode:<6} {name}: {} ({failure})",
                report.handle.index(),
                failure.tag()
            ),
        }
    }
    if reports.len() < total {
        warn!(
            unresolved = total - reports.len(),
            "some resources never resolved"
        );
    }
}

/// Print the load plan without fetching anything.
fn print_dry_run(manifest: &Manifest, options: &RuntimeOptions) {
    let page_origin = options.page_origin.as_deref().and_then(Origin::parse);

    println!("lazyload dry-run");
    match &page_origin {
        Some(origin) => println!("  page.origin = {origin}"),
        None => println!("  page.origin = (none)"),
    }
    if let Some(ms) = manifest.defaults.timeout_ms {
        println!("  defaults.timeout_ms = {ms}");
    }
    if let Some(limit) = manifest.defaults.fetch_concurrency {
        println!("  defaults.fetch_concurrency = {limit}");
    }
    if let Some(use_fetch) = manifest.defaults.use_fetch {
        println!("  defaults.use_fetch = {use_fetch}");
    }
    println!();

    println!("resources ({}):", manifest.resource.len());
    for (position, entry) in manifest.resource.iter().enumerate() {
        println!("  {position}. {} [{}]", entry.label(), entry.kind);
        if entry.blocking {
            println!("      blocking: true");
        }
        if let Some(use_fetch) = entry.use_fetch {
            println!("      use_fetch: {use_fetch} (pinned)");
        } else if let Some(locator) = entry.locator.as_deref() {
            if !is_same_origin(page_origin.as_ref(), locator) {
                println!("      cross-origin: loaded by direct reference");
            }
        }
        if let Some(ms) = entry.timeout_ms {
            println!("      timeout_ms: {ms}");
        }
        if !entry.attributes.is_empty() {
            println!("      attributes: {:?}", entry.attributes);
        }
    }

    debug!("dry-run complete (nothing fetched)");
}
