//! Dynamic content plugin
//!
//! Reads the manifest's `dynamic` section: an ordered list of rules, each
//! matching request paths with a URL glob and resolving them with one
//! [`Strategy`]. The first matching rule wins. Every rule owns the cache
//! `dynamic:<name>`, which is not tied to a manifest version and so survives
//! updates as long as the rule keeps its name.

pub mod pattern;
pub mod strategy;

pub use pattern::UrlPattern;
pub use strategy::{cached_at, RuleCache, Strategy, CACHED_AT_HEADER};

use crate::adapter::Request;
use crate::error::WorkerResult;
use crate::manifest::Manifest;
use crate::task::task;
use crate::worker::{Instructions, Operation, Plugin, VersionWorker};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

/// Manifest key read by this plugin
pub const SECTION: &str = "dynamic";

const DEFAULT_WAIT_MS: u64 = 10_000;

/// The `dynamic` manifest section
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DynamicSection {
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
}

/// One dynamic rule as written in the manifest
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleConfig {
    pub name: String,
    pub pattern: String,
    pub strategy: Strategy,

    #[serde(default = "default_wait_ms")]
    pub wait_for_network_ms: u64,

    #[serde(default)]
    pub max_entries: Option<usize>,

    #[serde(default)]
    pub max_age_ms: Option<u64>,

    /// Patterns whose cached entries a non-GET request to this rule deletes
    #[serde(default)]
    pub invalidates: Vec<String>,
}

fn default_wait_ms() -> u64 {
    DEFAULT_WAIT_MS
}

struct Rule {
    config: RuleConfig,
    pattern: UrlPattern,
    invalidates: Vec<UrlPattern>,
}

impl Rule {
    fn cache_name(&self) -> String {
        format!("dynamic:{}", self.config.name)
    }

    fn bind(&self, worker: &VersionWorker) -> RuleCache {
        RuleCache {
            cache: worker.cache().clone(),
            network: worker.network().clone(),
            logger: worker.logger().clone(),
            name: self.cache_name(),
            wait: Duration::from_millis(self.config.wait_for_network_ms),
            max_age: self.config.max_age_ms.map(Duration::from_millis),
            max_entries: self.config.max_entries,
        }
    }
}

/// Serves requests matching dynamic rules
pub struct DynamicContentPlugin {
    rules: Vec<Rule>,
}

impl DynamicContentPlugin {
    /// Build from the manifest's `dynamic` section (absent means no rules)
    pub fn new(manifest: &Manifest) -> WorkerResult<Self> {
        let section: DynamicSection = manifest.extension_as(SECTION)?.unwrap_or_default();
        let rules = section
            .rules
            .into_iter()
            .map(|config| {
                let pattern = UrlPattern::new(&config.pattern)?;
                let invalidates = config
                    .invalidates
                    .iter()
                    .map(|p| UrlPattern::new(p))
                    .collect::<WorkerResult<Vec<_>>>()?;
                Ok(Rule {
                    config,
                    pattern,
                    invalidates,
                })
            })
            .collect::<WorkerResult<Vec<_>>>()?;

        Ok(Self { rules })
    }

    /// Rule names in declaration order
    pub fn rule_names(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.config.name.as_str()).collect()
    }

    fn matching(&self, path: &str) -> Option<&Rule> {
        self.rules.iter().find(|rule| rule.pattern.matches(path))
    }

    /// Delete every cached entry matching the rule's `invalidates` patterns,
    /// across all dynamic caches
    fn invalidation(&self, worker: &VersionWorker, rule: &Rule) -> Operation {
        let cache = worker.cache().clone();
        let logger = worker.logger().clone();
        let caches: Vec<String> = self.rules.iter().map(Rule::cache_name).collect();
        let patterns = rule.invalidates.clone();

        task(async move {
            for name in caches {
                for key in cache.list(name.as_str()).await? {
                    if patterns.iter().any(|p| p.matches(key.path())) {
                        logger.debug(format!("invalidating {} in {}", key.url, name));
                        cache.invalidate(name.as_str(), &key).await?;
                    }
                }
            }
            Ok(())
        })
    }
}

impl Plugin for DynamicContentPlugin {
    fn name(&self) -> &'static str {
        "dynamic"
    }

    fn cache_names(&self) -> Vec<String> {
        self.rules.iter().map(Rule::cache_name).collect()
    }

    fn fetch(
        &self,
        worker: &Arc<VersionWorker>,
        request: &Request,
        instructions: &mut Instructions,
        carry_on: &mut Vec<Operation>,
    ) {
        let Some(rule) = self.matching(request.path()) else {
            return;
        };

        if !request.is_get() {
            if !rule.invalidates.is_empty() {
                carry_on.push(self.invalidation(worker, rule));
            }
            return;
        }

        let (response, persist) = rule.config.strategy.respond(&rule.bind(worker), request);
        carry_on.extend(persist);
        instructions.push(
            format!("dynamic:{}", rule.config.name),
            Box::new(move || task(async move { response.await.map(Some) })),
        );
    }
}
