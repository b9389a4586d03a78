//! URL glob patterns
//!
//! `*` matches any run of characters (including `/`), everything else is
//! literal. Patterns are anchored at both ends and match the request path
//! without its query string.

use crate::error::{WorkerError, WorkerResult};
use regex::Regex;

/// Compiled URL glob
#[derive(Debug, Clone)]
pub struct UrlPattern {
    source: String,
    regex: Regex,
}

impl UrlPattern {
    pub fn new(pattern: &str) -> WorkerResult<Self> {
        let body = pattern
            .split('*')
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join(".*");
        let regex = Regex::new(&format!("^{}$", body))
            .map_err(|e| WorkerError::ManifestInvalid(format!("pattern '{}': {}", pattern, e)))?;

        Ok(Self {
            source: pattern.to_string(),
            regex,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Whether a path (query already stripped) matches
    pub fn matches(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }
}
