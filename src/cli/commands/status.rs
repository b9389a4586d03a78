//! Status command - show installed versions and caches on disk

use super::{short_hash, LocalWorker};
use crate::cli::args::{OutputFormat, StatusArgs};
use crate::config::Config;
use crate::error::WorkerResult;
use crate::ui::{self, UiContext};
use serde::Serialize;

#[derive(Debug, Serialize)]
struct StatusReport {
    cache_dir: String,
    active: Option<String>,
    installing: Option<String>,
    caches: Vec<CacheReport>,
}

#[derive(Debug, Serialize)]
struct CacheReport {
    name: String,
    entries: usize,
}

/// Execute the status command
pub async fn execute(args: StatusArgs, config: &Config) -> WorkerResult<()> {
    let local = LocalWorker::open(config, &args.target);
    let report = collect(&local).await;
    local.close().await;
    let report = report?;

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => print_text(&UiContext::detect(), &report),
    }
    Ok(())
}

async fn collect(local: &LocalWorker) -> WorkerResult<StatusReport> {
    let status = local.driver().restore().await?;
    let cache = local.driver().cache();

    let mut caches = Vec::new();
    for name in cache.names().await? {
        let entries = cache.list(name.as_str()).await?.len();
        caches.push(CacheReport { name, entries });
    }

    Ok(StatusReport {
        cache_dir: local.cache_dir().display().to_string(),
        active: status.active,
        installing: status.installing,
        caches,
    })
}

fn print_text(ctx: &UiContext, report: &StatusReport) {
    ui::section(ctx, "Versions");
    ui::key_value_status(
        ctx,
        "active",
        report.active.as_deref().map(short_hash).unwrap_or("none"),
        report.active.is_some(),
    );
    match report.installing.as_deref() {
        Some(hash) => ui::key_value_status(ctx, "installing", short_hash(hash), false),
        None => ui::key_value(ctx, "installing", "none"),
    }

    ui::section(ctx, "Caches");
    ui::key_value(ctx, "directory", &report.cache_dir);
    if report.caches.is_empty() {
        ui::remark(ctx, "No caches yet. Run: offline-worker install");
    }
    for cache in &report.caches {
        ui::key_value(ctx, &cache.name, &format!("{} entries", cache.entries));
    }
}
