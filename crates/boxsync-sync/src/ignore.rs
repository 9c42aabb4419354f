//! Glob-based ignore rules
//!
//! A pattern matches an entry if it matches the entry's `/`-separated path
//! relative to the sync root, or the entry's file name alone. So `*.tmp`
//! ignores temporary files at any depth while `build/cache` only ignores
//! that one folder.

use std::path::Path;
use std::sync::Arc;

use glob::{MatchOptions, Pattern, PatternError};

use crate::diff::slash_path;
use crate::orchestrator::IgnoreFn;

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// A compiled set of ignore patterns
#[derive(Debug, Clone, Default)]
pub struct IgnoreRules {
    patterns: Vec<Pattern>,
}

impl IgnoreRules {
    /// Compiles the given glob patterns
    ///
    /// # Errors
    /// Returns the first pattern that fails to parse
    pub fn new<I, S>(patterns: I) -> Result<Self, PatternError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|p| Pattern::new(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Whether `relative` (a path below the sync root) is ignored
    pub fn is_ignored(&self, relative: &Path) -> bool {
        let full = slash_path(relative);
        let name = relative
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        self.patterns
            .iter()
            .any(|p| p.matches_with(&full, MATCH_OPTIONS) || p.matches_with(&name, MATCH_OPTIONS))
    }

    /// Converts the rules into a predicate for [`SyncOptions`]
    ///
    /// [`SyncOptions`]: crate::orchestrator::SyncOptions
    pub fn into_predicate(self) -> IgnoreFn {
        Arc::new(move |path: &Path| self.is_ignored(path))
    }
}
