//! Inspect command - summarize what a manifest declares

use super::{read_manifest, short_hash};
use crate::cli::args::{InspectArgs, OutputFormat};
use crate::error::WorkerResult;
use crate::manifest::Manifest;
use crate::plugins::dynamic::{DynamicSection, SECTION as DYNAMIC_SECTION};
use crate::plugins::push::{PushSection, SECTION as PUSH_SECTION};
use crate::ui::{self, UiContext};
use serde::Serialize;

#[derive(Debug, Serialize)]
struct ManifestSummary {
    hash: String,
    dev: bool,
    groups: Vec<GroupSummary>,
    index: Option<String>,
    routes: Vec<String>,
    dynamic: Vec<RuleSummary>,
    notifications: bool,
}

#[derive(Debug, Serialize)]
struct GroupSummary {
    name: String,
    version: String,
    cache: String,
    entries: usize,
}

#[derive(Debug, Serialize)]
struct RuleSummary {
    name: String,
    pattern: String,
    strategy: String,
    cache: String,
}

/// Execute the inspect command
pub async fn execute(args: InspectArgs) -> WorkerResult<()> {
    let manifest = read_manifest(&args.manifest).await?;
    let summary = summarize(&manifest)?;

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
        OutputFormat::Text => print_text(&UiContext::detect(), &summary),
    }
    Ok(())
}

fn summarize(manifest: &Manifest) -> WorkerResult<ManifestSummary> {
    let groups = manifest
        .groups()
        .values()
        .map(|group| GroupSummary {
            name: group.name.clone(),
            version: group.version.clone(),
            cache: group.cache_name(),
            entries: group.entries.len(),
        })
        .collect();

    let dynamic: DynamicSection = manifest
        .extension_as(DYNAMIC_SECTION)?
        .unwrap_or_default();
    let push: PushSection = manifest.extension_as(PUSH_SECTION)?.unwrap_or_default();

    Ok(ManifestSummary {
        hash: manifest.hash().to_string(),
        dev: manifest.is_dev(),
        groups,
        index: manifest.routing().map(|r| r.index.clone()),
        routes: manifest
            .routing()
            .map(|r| {
                r.routes
                    .iter()
                    .map(|(url, rule)| if rule.prefix { format!("{}*", url) } else { url.clone() })
                    .collect()
            })
            .unwrap_or_default(),
        dynamic: dynamic
            .rules
            .into_iter()
            .map(|rule| RuleSummary {
                cache: format!("dynamic:{}", rule.name),
                name: rule.name,
                pattern: rule.pattern,
                strategy: rule.strategy.to_string(),
            })
            .collect(),
        notifications: push.show_notifications,
    })
}

fn print_text(ctx: &UiContext, summary: &ManifestSummary) {
    ui::key_value(ctx, "Manifest", short_hash(&summary.hash));
    if summary.dev {
        ui::step_warn_hint(ctx, "Dev mode", "every request goes to the network");
    }

    ui::section(ctx, "Groups");
    if summary.groups.is_empty() {
        ui::remark(ctx, "none");
    }
    for group in &summary.groups {
        ui::key_value(
            ctx,
            &group.name,
            &format!("{} ({} entries)", group.cache, group.entries),
        );
    }

    if let Some(index) = &summary.index {
        ui::section(ctx, "Routing");
        ui::key_value(ctx, "index", index);
        for route in &summary.routes {
            ui::key_value(ctx, "route", route);
        }
    }

    if !summary.dynamic.is_empty() {
        ui::section(ctx, "Dynamic rules");
        for rule in &summary.dynamic {
            ui::key_value(
                ctx,
                &rule.name,
                &format!("{} via {} -> {}", rule.pattern, rule.strategy, rule.cache),
            );
        }
    }

    if summary.notifications {
        ui::section(ctx, "Push");
        ui::key_value(ctx, "notifications", "shown");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_lists_groups_routes_and_rules() {
        let manifest = Manifest::parse(
            r#"{
                "groups": {"app": {"version": "v1", "urls": {"/index.html": {}, "/a.js": {}}}},
                "routing": {"index": "/index.html", "routes": {"/app/": {"prefix": true}}},
                "dynamic": {"rules": [{"name": "api", "pattern": "/api/*", "strategy": "networkFirst"}]},
                "push": {"showNotifications": true}
            }"#,
        )
        .unwrap();

        let summary = summarize(&manifest).unwrap();
        assert_eq!(summary.groups.len(), 1);
        assert_eq!(summary.groups[0].cache, "app:v1");
        assert_eq!(summary.groups[0].entries, 2);
        assert_eq!(summary.index.as_deref(), Some("/index.html"));
        assert_eq!(summary.routes, vec!["/app/*"]);
        assert_eq!(summary.dynamic[0].cache, "dynamic:api");
        assert_eq!(summary.dynamic[0].strategy, "networkFirst");
        assert!(summary.notifications);
    }

    #[test]
    fn summary_of_bare_manifest() {
        let summary = summarize(&Manifest::parse(r#"{"dev": true}"#).unwrap()).unwrap();
        assert!(summary.dev);
        assert!(summary.groups.is_empty());
        assert!(summary.index.is_none());
        assert!(summary.dynamic.is_empty());
    }
}
