//! Path Filter Module
//!
//! Ignore/include glob filtering for watched paths, so editor swap files,
//! bytecode caches and VCS metadata never trigger a backend reload.

use glob::Pattern;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::core::config::default_ignore_patterns;
use crate::core::error::WatchSetupError;

/// Configuration for path filtering
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathFilterConfig {
    /// Ignore patterns (glob format)
    pub ignore_patterns: Vec<String>,
    /// Include patterns (higher priority than ignore)
    pub include_patterns: Vec<String>,
}

impl Default for PathFilterConfig {
    fn default() -> Self {
        Self {
            ignore_patterns: default_ignore_patterns(),
            include_patterns: vec![],
        }
    }
}

/// Result of filtering a path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterResult {
    /// Changes to the path are reported
    Include,
    /// Changes to the path are dropped
    Exclude,
}

/// Path filter with ignore/include support
#[derive(Debug)]
pub struct PathFilter {
    ignore_matchers: Vec<Pattern>,
    include_matchers: Vec<Pattern>,
}

impl PathFilter {
    /// Create a new PathFilter with the given configuration
    pub fn new(config: PathFilterConfig) -> Result<Self, WatchSetupError> {
        let ignore_matchers = compile(&config.ignore_patterns)?;
        let include_matchers = compile(&config.include_patterns)?;

        Ok(Self {
            ignore_matchers,
            include_matchers,
        })
    }

    /// Create a PathFilter with the default ignore list
    pub fn with_defaults() -> Result<Self, WatchSetupError> {
        Self::new(PathFilterConfig::default())
    }

    /// Filter that reports every path
    pub fn allow_all() -> Self {
        Self {
            ignore_matchers: vec![],
            include_matchers: vec![],
        }
    }

    /// Check if a path should be filtered
    pub fn should_filter(&self, path: &Path) -> FilterResult {
        let normalized = normalize(path);

        if self.include_matchers.iter().any(|m| m.matches(&normalized)) {
            return FilterResult::Include;
        }
        if self.ignore_matchers.iter().any(|m| m.matches(&normalized)) {
            return FilterResult::Exclude;
        }
        FilterResult::Include
    }
}

/// Normalize path separators for cross-platform matching
fn normalize(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

fn compile(patterns: &[String]) -> Result<Vec<Pattern>, WatchSetupError> {
    patterns
        .iter()
        .map(|pattern| {
            Pattern::new(pattern).map_err(|e| WatchSetupError::InvalidPattern {
                pattern: pattern.clone(),
                reason: e.to_string(),
            })
        })
        .collect()
}
