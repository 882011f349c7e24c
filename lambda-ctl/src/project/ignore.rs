//! Ignore list: path patterns excluded from packaging.

use crate::utils::errors::{CtlError, Result};
use glob::{MatchOptions, Pattern};
use std::path::{Component, Path};
use tracing::warn;

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

#[derive(Debug, Clone)]
enum Rule {
    /// Pattern without `/`: matches any single path component.
    Component(Pattern),
    /// Pattern with `/`: matches the relative path or one of its ancestors.
    Path(Pattern),
}

/// Parsed ignore file. The empty list excludes nothing.
#[derive(Debug, Clone, Default)]
pub struct IgnoreList {
    rules: Vec<Rule>,
}

impl IgnoreList {
    /// Parse newline-delimited patterns. Blank lines and `#` comments are skipped;
    /// invalid globs are logged and skipped.
    pub fn parse(content: &str) -> Self {
        let mut rules = Vec::new();

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let raw = line.trim_end_matches('/').trim_start_matches("./");
            if raw.is_empty() {
                continue;
            }

            match Pattern::new(raw) {
                Ok(pattern) if raw.contains('/') => rules.push(Rule::Path(pattern)),
                Ok(pattern) => rules.push(Rule::Component(pattern)),
                Err(e) => warn!("Skipping invalid ignore pattern '{}': {}", line, e),
            }
        }

        Self { rules }
    }

    /// Load the ignore file; a missing file yields the empty list.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => Ok(Self::parse(&content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(CtlError::io("reading", path)(e)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Whether `relative` (relative to the project root) is excluded.
    pub fn is_ignored(&self, relative: &Path) -> bool {
        if self.rules.is_empty() {
            return false;
        }

        let components: Vec<String> = relative
            .components()
            .filter_map(|c| match c {
                Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect();

        self.rules.iter().any(|rule| match rule {
            Rule::Component(pattern) => components
                .iter()
                .any(|part| pattern.matches_with(part, MATCH_OPTIONS)),
            Rule::Path(pattern) => (1..=components.len())
                .any(|n| pattern.matches_with(&components[..n].join("/"), MATCH_OPTIONS)),
        })
    }
}
