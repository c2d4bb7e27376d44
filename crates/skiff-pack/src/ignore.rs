//! Basename ignore patterns applied during copies and scans.
//!
//! Each entry keeps the compiled regex together with its original source
//! string; the sources are serialised verbatim into `dependencies.json` so
//! a watcher can recompile the same list.

use regex::Regex;

use crate::error::{Error, Result};

/// One compiled pattern plus the source string it was compiled from.
#[derive(Debug, Clone)]
pub struct IgnorePattern {
    regex: Regex,
    source: String,
}

impl IgnorePattern {
    pub fn new(source: &str) -> Result<Self> {
        let regex = Regex::new(source).map_err(|e| Error::Pattern {
            source_text: source.to_string(),
            message: e.to_string(),
        })?;
        Ok(Self {
            regex,
            source: source.to_string(),
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

/// The ignore list consulted for every basename touched by a copy or scan.
#[derive(Debug, Clone)]
pub struct IgnorePatterns {
    patterns: Vec<IgnorePattern>,
}

/// Editor droppings, OS cruft, and skiff's own metadata directories.
const DEFAULT_SOURCES: &[&str] = &[
    "~$",
    r"^\.#",
    "^#.*#$",
    r"^\.DS_Store$",
    r"^ehthumbs\.db$",
    "^Icon\r$",
    r"^Thumbs\.db$",
    r"^\.skiff$",
    r"^\.git$",
];

impl IgnorePatterns {
    /// The standard list applied to every application and package tree.
    pub fn standard() -> Self {
        Self::from_sources(DEFAULT_SOURCES.iter().copied())
            .expect("default ignore patterns compile")
    }

    pub fn from_sources<'a>(sources: impl IntoIterator<Item = &'a str>) -> Result<Self> {
        let patterns = sources
            .into_iter()
            .map(IgnorePattern::new)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    /// Whether a file or directory basename should be skipped.
    pub fn matches(&self, basename: &str) -> bool {
        self.patterns.iter().any(|p| p.regex.is_match(basename))
    }

    /// The original pattern sources, in order.
    pub fn sources(&self) -> Vec<String> {
        self.patterns.iter().map(|p| p.source.clone()).collect()
    }
}

impl Default for IgnorePatterns {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_patterns_match_expected_basenames() {
        let ignores = IgnorePatterns::standard();
        for name in [
            "notes.txt~",
            ".#lockfile",
            "#autosave#",
            ".DS_Store",
            "ehthumbs.db",
            "Icon\r",
            "Thumbs.db",
            ".skiff",
            ".git",
        ] {
            assert!(ignores.matches(name), "expected '{name:?}' to be ignored");
        }
    }

    #[test]
    fn standard_patterns_pass_ordinary_files() {
        let ignores = IgnorePatterns::standard();
        for name in ["main.js", "style.css", "Icon", "gitignore", "data.db"] {
            assert!(!ignores.matches(name), "expected '{name}' to pass");
        }
    }

    #[test]
    fn sources_round_trip() {
        let ignores = IgnorePatterns::standard();
        let recompiled = IgnorePatterns::from_sources(
            ignores.sources().iter().map(String::as_str),
        )
        .unwrap();
        assert!(recompiled.matches("x~"));
    }

    #[test]
    fn invalid_pattern_is_rejected() {
        assert!(IgnorePatterns::from_sources(["("]).is_err());
    }
}
