//! Tag extraction from source code.
//!
//! This module handles:
//! - Loading tree-sitter grammars and tag queries
//! - Running .scm queries to extract definition/reference tags
//! - Falling back to a regex name-occurrence heuristic when no grammar
//!   is available
//!
//! # Extractor Selection
//!
//! Extraction is modeled as a capability interface: each extractor
//! declares what it can handle, and a registry tries them in priority
//! order. The tree-sitter extractor comes first (full AST accuracy);
//! the heuristic extractor is the catch-all last entry, so unsupported
//! files still yield name-occurrence tags instead of failing the run.

mod heuristic;
mod treesitter;

use std::path::Path;

use crate::types::Tag;

pub use heuristic::HeuristicExtractor;
pub use treesitter::{extension_to_language, TreeSitterExtractor};

/// A tag extraction capability.
///
/// Implementations must be pure functions of the input text: re-extracting
/// identical text yields identical tags (the cache depends on this).
pub trait Extractor: Send + Sync {
    /// Short name for logs and diagnostics
    fn name(&self) -> &'static str;

    /// Whether this extractor recognizes the file's language
    fn can_handle(&self, path: &Path) -> bool;

    /// Extract tags from source text. Unparsable input yields an empty
    /// vector, never an error - one bad file must not abort the run.
    fn extract(&self, text: &str, fname: &str, rel_fname: &str) -> Vec<Tag>;
}

/// Build the default extractor registry: tree-sitter first, heuristic
/// fallback last.
pub fn default_registry() -> Vec<Box<dyn Extractor>> {
    vec![
        Box::new(TreeSitterExtractor::new()),
        Box::new(HeuristicExtractor::new()),
    ]
}

/// Extract tags for one file by trying registered extractors in priority
/// order.
///
/// The first extractor that handles the path and produces tags wins. An
/// extractor that handles the path but finds nothing falls through to the
/// next, so a grammar that chokes on unusual syntax still gets the
/// heuristic's best effort.
pub fn extract_tags(
    registry: &[Box<dyn Extractor>],
    path: &Path,
    text: &str,
    fname: &str,
    rel_fname: &str,
) -> Vec<Tag> {
    for extractor in registry {
        if !extractor.can_handle(path) {
            continue;
        }
        let tags = extractor.extract(text, fname, rel_fname);
        if !tags.is_empty() {
            return tags;
        }
    }
    Vec::new()
}
