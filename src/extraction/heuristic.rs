//! Regex-based fallback extraction for languages without a grammar.
//!
//! Two passes over the text:
//! - Definition patterns catch the common `def`/`fn`/`class`-style
//!   declarations shared across mainstream languages, plus UPPERCASE
//!   constant assignments.
//! - A name-occurrence pass emits a reference tag for every remaining
//!   identifier, so files in unsupported languages still participate in
//!   the relevance graph through name co-occurrence.
//!
//! Accuracy is deliberately approximate. The patterns only need to be
//! good enough for ranking signal; the grammar-based extractor owns the
//! languages where precision matters.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::extraction::Extractor;
use crate::types::{Tag, TagKind};

/// Shared definition patterns, keyword-driven so they apply across
/// Python/Ruby/Rust/Go/JS-family syntax.
mod patterns {
    use super::*;

    /// Keyword-introduced declarations: `def foo`, `fn foo`, `func foo`,
    /// `function foo`, `class Foo`, `struct Foo`, `trait Foo`, ...
    pub static KEYWORD_DEF: Lazy<Regex> = Lazy::new(|| {
        Regex::new(
            r"(?m)^\s*(?:export\s+)?(?:pub(?:\([^)]*\))?\s+)?(?:async\s+)?(def|fn|func|function|class|struct|enum|trait|interface|impl|module|type)\s+([A-Za-z_][A-Za-z0-9_]*)",
        )
        .expect("invalid keyword-def regex")
    });

    /// Top-level constant assignments: `FOO = ...` / `const FOO = ...`
    pub static CONST_DEF: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"(?m)^\s*(?:export\s+)?(?:const\s+)?([A-Z_][A-Z0-9_]{2,})\s*[:=]")
            .expect("invalid const-def regex")
    });

    /// Bare identifier occurrences for the name-occurrence pass
    pub static IDENT: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"[A-Za-z_][A-Za-z0-9_]{2,}").expect("invalid identifier regex")
    });
}

/// Keywords and common noise words excluded from the reference pass.
const STOPWORDS: &[&str] = &[
    "abstract", "and", "assert", "async", "await", "boolean", "break", "case", "catch", "class",
    "const", "continue", "def", "default", "defer", "del", "elif", "else", "end", "enum", "except",
    "export", "extends", "false", "final", "finally", "float", "for", "from", "func", "function",
    "global", "goto", "impl", "import", "int", "interface", "lambda", "let", "match", "module",
    "mut", "new", "nil", "none", "not", "null", "number", "package", "pass", "print", "priv",
    "private", "protected", "pub", "public", "raise", "return", "self", "static", "str", "string",
    "struct", "super", "switch", "then", "this", "throw", "trait", "true", "try", "type", "use",
    "var", "void", "when", "while", "with", "yield",
];

/// Catch-all extractor: keyword definitions + identifier occurrences.
pub struct HeuristicExtractor {
    stopwords: HashSet<&'static str>,
}

impl HeuristicExtractor {
    pub fn new() -> Self {
        Self {
            stopwords: STOPWORDS.iter().copied().collect(),
        }
    }
}

impl Default for HeuristicExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl Extractor for HeuristicExtractor {
    fn name(&self) -> &'static str {
        "heuristic"
    }

    /// The heuristic handles anything - it is the registry's last resort.
    fn can_handle(&self, _path: &Path) -> bool {
        true
    }

    fn extract(&self, text: &str, fname: &str, rel_fname: &str) -> Vec<Tag> {
        let rel: Arc<str> = Arc::from(rel_fname);
        let abs: Arc<str> = Arc::from(fname);
        let mut tags = Vec::new();

        // Names already claimed as definitions on a given line; identifier
        // occurrences matching (line, name) are skipped in the ref pass so
        // a definition is not double-counted as a self-reference.
        let mut defined_at: HashSet<(u32, &str)> = HashSet::new();

        for cap in patterns::KEYWORD_DEF.captures_iter(text) {
            let keyword = cap.get(1).map(|m| m.as_str()).unwrap_or("");
            let m = match cap.get(2) {
                Some(m) => m,
                None => continue,
            };
            let line = line_number(text, m.start());
            defined_at.insert((line, m.as_str()));
            tags.push(Tag {
                rel_fname: Arc::clone(&rel),
                fname: Arc::clone(&abs),
                name: Arc::from(m.as_str()),
                kind: TagKind::Def,
                line_start: line,
                line_end: line,
                node_type: Arc::from(node_type_for_keyword(keyword)),
            });
        }

        for cap in patterns::CONST_DEF.captures_iter(text) {
            let m = match cap.get(1) {
                Some(m) => m,
                None => continue,
            };
            let line = line_number(text, m.start());
            if defined_at.contains(&(line, m.as_str())) {
                continue;
            }
            defined_at.insert((line, m.as_str()));
            tags.push(Tag {
                rel_fname: Arc::clone(&rel),
                fname: Arc::clone(&abs),
                name: Arc::from(m.as_str()),
                kind: TagKind::Def,
                line_start: line,
                line_end: line,
                node_type: Arc::from("constant"),
            });
        }

        // Name-occurrence pass: every identifier not in a definition
        // position becomes a reference
        for m in patterns::IDENT.find_iter(text) {
            let name = m.as_str();
            if self.stopwords.contains(name) {
                continue;
            }
            let line = line_number(text, m.start());
            if defined_at.contains(&(line, name)) {
                continue;
            }
            tags.push(Tag {
                rel_fname: Arc::clone(&rel),
                fname: Arc::clone(&abs),
                name: Arc::from(name),
                kind: TagKind::Ref,
                line_start: line,
                line_end: line,
                node_type: Arc::from("name"),
            });
        }

        tags
    }
}

/// Calculate 1-indexed line number from byte offset.
fn line_number(content: &str, byte_offset: usize) -> u32 {
    content[..byte_offset].matches('\n').count() as u32 + 1
}

fn node_type_for_keyword(keyword: &str) -> &'static str {
    match keyword {
        "class" | "struct" | "enum" => "class",
        "trait" | "interface" => "interface",
        "module" | "impl" | "type" => "module",
        _ => "function",
    }
}
