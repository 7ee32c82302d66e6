//! Include/exclude path filtering.
//!
//! Rules, in order:
//!
//! 1. paths under the reserved metadata directory never match
//! 2. if include patterns are configured they win over excludes, and a path
//!    matches iff at least one include pattern matches
//! 3. otherwise, if exclude patterns are configured, a path matches iff no
//!    exclude pattern matches
//! 4. with neither configured, every path matches
//!
//! Patterns are regular expressions searched anywhere in the
//! snapshot-relative path. A pattern that fails to compile is logged and
//! dropped; the rest of the set still applies.

use regex::Regex;

use crate::error::ArchetypeError;
use crate::metadata::METADATA_DIR;

/// Why a path was kept or dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterDecision {
    Included,
    /// Under the reserved metadata directory.
    Reserved,
    /// Include patterns are configured and none matched.
    NotIncluded,
    /// The exclude pattern at the given source text matched.
    Excluded(String),
}

impl FilterDecision {
    pub fn is_included(&self) -> bool {
        matches!(self, Self::Included)
    }

    /// Human-readable reason for a skipped file.
    pub fn reason(&self) -> String {
        match self {
            Self::Included => "included".into(),
            Self::Reserved => "archetype metadata".into(),
            Self::NotIncluded => "no include pattern matches".into(),
            Self::Excluded(pattern) => format!("exclude pattern '{pattern}' matches"),
        }
    }
}

/// Compiled include/exclude pattern sets.
#[derive(Debug, Clone, Default)]
pub struct FileFilter {
    includes: Vec<Regex>,
    excludes: Vec<Regex>,
}

impl FileFilter {
    /// Compile both pattern sets, dropping (and logging) invalid patterns.
    pub fn new<S: AsRef<str>>(includes: &[S], excludes: &[S]) -> Self {
        if !includes.is_empty() && !excludes.is_empty() {
            tracing::warn!("both include and exclude patterns given; include patterns take precedence");
        }
        Self {
            includes: compile_all(includes, "include"),
            excludes: compile_all(excludes, "exclude"),
        }
    }

    /// A filter that accepts everything but the metadata directory.
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// Decide whether `path` participates, and why.
    pub fn decide(&self, path: &str) -> FilterDecision {
        if is_reserved(path) {
            return FilterDecision::Reserved;
        }

        if !self.includes.is_empty() {
            return if self.includes.iter().any(|re| re.is_match(path)) {
                FilterDecision::Included
            } else {
                FilterDecision::NotIncluded
            };
        }

        match self.excludes.iter().find(|re| re.is_match(path)) {
            Some(re) => FilterDecision::Excluded(re.as_str().to_string()),
            None => FilterDecision::Included,
        }
    }

    /// Whether `path` participates.
    pub fn matches(&self, path: &str) -> bool {
        self.decide(path).is_included()
    }
}

fn compile_all<S: AsRef<str>>(patterns: &[S], kind: &str) -> Vec<Regex> {
    patterns
        .iter()
        .filter_map(|pattern| {
            let pattern = pattern.as_ref();
            match Regex::new(pattern) {
                Ok(re) => {
                    tracing::info!(pattern, kind, "compiled file pattern");
                    Some(re)
                }
                Err(source) => {
                    let err = ArchetypeError::PatternCompile {
                        pattern: pattern.to_string(),
                        source,
                    };
                    tracing::error!(kind, error = %err, "dropping file pattern");
                    None
                }
            }
        })
        .collect()
}

/// Whether `path` lies in the reserved metadata directory.
pub fn is_reserved(path: &str) -> bool {
    let path = path.trim_start_matches("./");
    path == METADATA_DIR
        || path
            .strip_prefix(METADATA_DIR)
            .is_some_and(|rest| rest.starts_with('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    const NONE: &[&str] = &[];

    #[test]
    fn test_reserved_always_excluded() {
        let filter = FileFilter::new(&[".*"], NONE);
        assert_eq!(filter.decide(".archetype/metadata.yml"), FilterDecision::Reserved);
        assert!(!FileFilter::allow_all().matches(".archetype/metadata.yml"));
        assert!(FileFilter::allow_all().matches(".archetypes/readme.md"));
    }

    #[test]
    fn test_no_patterns_matches_everything() {
        let filter = FileFilter::allow_all();
        assert!(filter.matches("a.txt"));
        assert!(filter.matches("dir/b.yml"));
    }

    #[test]
    fn test_include_only_matching() {
        let filter = FileFilter::new(&[r"\.yml$"], NONE);
        assert!(filter.matches("a.yml"));
        assert_eq!(filter.decide("a.txt"), FilterDecision::NotIncluded);
    }

    #[test]
    fn test_include_takes_precedence_over_exclude() {
        let with_excludes = FileFilter::new(&[r"\.yml$"], &[r"^a"]);
        let without = FileFilter::new(&[r"\.yml$"], NONE);
        for path in ["a.yml", "b.yml", "a.txt", "c/d.yml"] {
            assert_eq!(with_excludes.matches(path), without.matches(path), "{path}");
        }
    }

    #[test]
    fn test_exclude_only() {
        let filter = FileFilter::new(NONE, &[r"^target/", r"\.lock$"]);
        assert!(filter.matches("src/main.rs"));
        assert_eq!(
            filter.decide("Cargo.lock"),
            FilterDecision::Excluded(r"\.lock$".into())
        );
        assert!(!filter.matches("target/debug/app"));
    }

    #[test]
    fn test_invalid_pattern_is_dropped() {
        let filter = FileFilter::new(&["(unclosed", r"\.rs$"], NONE);
        assert!(filter.matches("main.rs"));
        assert!(!filter.matches("main.go"));

        // With its only include dropped the filter falls back to matching all.
        let filter = FileFilter::new(&["(unclosed"], NONE);
        assert!(filter.matches("main.go"));
    }

    #[test]
    fn test_reason_text() {
        assert_eq!(FilterDecision::NotIncluded.reason(), "no include pattern matches");
        assert!(FilterDecision::Excluded("x".into()).reason().contains("'x'"));
    }
}
