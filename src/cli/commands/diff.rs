//! Diff command - show what installing a manifest over another would do

use super::{read_manifest, short_hash};
use crate::cli::args::{DiffArgs, OutputFormat};
use crate::error::WorkerResult;
use crate::manifest::{diff, ManifestDelta};
use crate::ui::{self, UiContext};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Serialize)]
struct DiffReport {
    current: String,
    previous: Option<String>,
    changed: bool,
    groups: Vec<GroupReport>,
}

/// One group of the incoming manifest, plus groups only the previous had
#[derive(Debug, Default, Serialize)]
struct GroupReport {
    name: String,
    cache: Option<String>,
    added: Vec<String>,
    removed: Vec<String>,
    /// Entries copied from the previous version
    reused: Vec<String>,
    /// Entries fetched from the origin
    fetched: Vec<String>,
}

/// Execute the diff command
pub async fn execute(args: DiffArgs) -> WorkerResult<()> {
    let current = Arc::new(read_manifest(&args.current).await?);
    let previous = match &args.previous {
        Some(path) => Some(Arc::new(read_manifest(path).await?)),
        None => None,
    };

    let report = build_report(&diff(&current, previous.as_ref()));
    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => print_text(&UiContext::detect(), &report),
    }
    Ok(())
}

fn build_report(delta: &ManifestDelta) -> DiffReport {
    let mut groups: Vec<GroupReport> = delta
        .current
        .groups()
        .values()
        .map(|group| {
            let (reused, fetched): (Vec<String>, Vec<String>) = group
                .entries
                .keys()
                .cloned()
                .partition(|url| delta.can_reuse(&group.name, url));
            let change = delta.groups.get(&group.name).cloned().unwrap_or_default();
            GroupReport {
                name: group.name.clone(),
                cache: Some(group.cache_name()),
                added: change.added,
                removed: change.removed,
                reused,
                fetched,
            }
        })
        .collect();

    for (name, change) in &delta.groups {
        if delta.current.group(name).is_none() {
            groups.push(GroupReport {
                name: name.clone(),
                removed: change.removed.clone(),
                ..GroupReport::default()
            });
        }
    }

    DiffReport {
        current: delta.current.hash().to_string(),
        previous: delta.previous.as_ref().map(|p| p.hash().to_string()),
        changed: delta.changed,
        groups,
    }
}

fn print_text(ctx: &UiContext, report: &DiffReport) {
    match &report.previous {
        None => ui::step_info(ctx, "Fresh install, every entry is fetched"),
        Some(_) if !report.changed => {
            ui::step_ok(ctx, "Manifests are identical, nothing to install")
        }
        Some(previous) => ui::step_info(
            ctx,
            &format!("{} -> {}", short_hash(previous), short_hash(&report.current)),
        ),
    }

    for group in &report.groups {
        let title = match &group.cache {
            Some(cache) => format!("{} ({})", group.name, cache),
            None => format!("{} (dropped)", group.name),
        };
        ui::section(ctx, &title);
        for url in &group.added {
            ui::key_value(ctx, "+", url);
        }
        for url in &group.removed {
            ui::key_value(ctx, "-", url);
        }
        if group.cache.is_some() {
            ui::remark(
                ctx,
                &format!("{} reused, {} fetched", group.reused.len(), group.fetched.len()),
            );
        }
    }
}
