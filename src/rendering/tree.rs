//! Tree-style map rendering.
//!
//! Output format, per file:
//!
//! ```text
//! src/parser.rs:
//! ⋮
//! │pub fn parse(input: &str) -> Ast {
//! │    let tokens = lex(input);
//! ⋮
//! │pub struct Ast {
//! ⋮
//! ```
//!
//! Key design decisions:
//! - File order = descending max-tag-score, path ascending on ties; this
//!   falls straight out of the ranked input's sort order, so rendering
//!   adds no ordering logic of its own
//! - Line spans that touch or sit within `collapse_gap` lines of each
//!   other merge into one block; skipped regions collapse to a `⋮` line
//! - Chat files always appear, header-form only when none of their tags
//!   were selected - their presence as edited files is part of the signal
//! - Source text comes through a caller-suppliable reader capability; a
//!   file that cannot be read renders its header only

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use crate::types::RankedTag;

/// Text-reading capability. The engine owns filesystem policy, not the
/// renderer, so tests and embedders can substitute in-memory sources.
pub type TextReader = Box<dyn Fn(&Path) -> std::io::Result<String> + Send + Sync>;

/// Default reader: straight `fs::read_to_string`.
pub fn default_text_reader() -> TextReader {
    Box::new(|path| fs::read_to_string(path))
}

/// Renders selected tags into the final map text.
pub struct TreeRenderer {
    read_text: TextReader,
    collapse_gap: u32,
}

impl TreeRenderer {
    pub fn new(collapse_gap: u32) -> Self {
        Self {
            read_text: default_text_reader(),
            collapse_gap,
        }
    }

    /// Substitute the text-reading capability.
    pub fn with_reader(read_text: TextReader, collapse_gap: u32) -> Self {
        Self {
            read_text,
            collapse_gap,
        }
    }

    /// Render the given tags (already sorted by rank) plus headers for
    /// chat files whose tags were not selected.
    ///
    /// `chat_rel_fnames` must be a sorted set so the trailing header list
    /// is deterministic.
    pub fn render(&self, tags: &[RankedTag], chat_rel_fnames: &BTreeSet<Arc<str>>) -> String {
        // Group by file in first-appearance order. The input is sorted by
        // (score desc, path, line), so a file first appears at its
        // max-scored tag - exactly the required file order.
        let mut file_order: Vec<Arc<str>> = Vec::new();
        let mut grouped: Vec<(Arc<str>, Vec<&RankedTag>)> = Vec::new();

        for ranked in tags {
            let rel = &ranked.tag.rel_fname;
            match file_order.iter().position(|f| f == rel) {
                Some(pos) => grouped[pos].1.push(ranked),
                None => {
                    file_order.push(Arc::clone(rel));
                    grouped.push((Arc::clone(rel), vec![ranked]));
                }
            }
        }

        let mut output = String::new();

        for (rel, file_tags) in &grouped {
            output.push_str(rel);
            output.push_str(":\n");
            output.push_str(&self.render_file_body(file_tags));
            output.push('\n');
        }

        // Chat files with no selected tags still get a header
        for rel in chat_rel_fnames {
            if !file_order.iter().any(|f| f == rel) {
                output.push('\n');
                output.push_str(rel);
                output.push('\n');
            }
        }

        output
    }

    /// Render one file's collapsed line blocks.
    fn render_file_body(&self, file_tags: &[&RankedTag]) -> String {
        let path = Path::new(file_tags[0].tag.fname.as_ref());
        let text = match (self.read_text)(path) {
            Ok(t) => t,
            Err(_) => return String::new(), // header-only on read failure
        };
        let lines: Vec<&str> = text.lines().collect();
        if lines.is_empty() {
            return String::new();
        }

        // Collect spans clamped to the file, sorted, then merged
        let mut spans: Vec<(u32, u32)> = file_tags
            .iter()
            .map(|rt| {
                let start = rt.tag.line_start.max(1).min(lines.len() as u32);
                let end = rt.tag.line_end.max(start).min(lines.len() as u32);
                (start, end)
            })
            .collect();
        spans.sort_unstable();

        let merged = merge_spans(&spans, self.collapse_gap);

        let mut body = String::new();
        let mut cursor: u32 = 1;

        for (start, end) in merged {
            if start > cursor {
                body.push_str("⋮\n");
            }
            for line_no in start..=end {
                body.push('│');
                body.push_str(lines[(line_no - 1) as usize]);
                body.push('\n');
            }
            cursor = end + 1;
        }

        if (cursor as usize) <= lines.len() {
            body.push_str("⋮\n");
        }

        body
    }
}

/// Merge sorted spans that overlap or sit within `gap` lines of each
/// other.
fn merge_spans(spans: &[(u32, u32)], gap: u32) -> Vec<(u32, u32)> {
    let mut merged: Vec<(u32, u32)> = Vec::new();

    for &(start, end) in spans {
        match merged.last_mut() {
            Some((_, last_end)) if start <= last_end.saturating_add(gap).saturating_add(1) => {
                *last_end = (*last_end).max(end);
            }
            _ => merged.push((start, end)),
        }
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Tag, TagKind};
    use std::collections::HashMap;

    fn make_ranked(rel: &str, name: &str, score: f64, start: u32, end: u32) -> RankedTag {
        RankedTag::new(
            score,
            Tag {
                rel_fname: Arc::from(rel),
                fname: Arc::from(rel),
                name: Arc::from(name),
                kind: TagKind::Def,
                line_start: start,
                line_end: end,
                node_type: Arc::from("function"),
            },
        )
    }

    fn memory_renderer(files: Vec<(&str, &str)>, gap: u32) -> TreeRenderer {
        let map: HashMap<String, String> = files
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        TreeRenderer::with_reader(
            Box::new(move |path: &Path| {
                map.get(path.to_string_lossy().as_ref()).cloned().ok_or_else(|| {
                    std::io::Error::new(std::io::ErrorKind::NotFound, "not in memory")
                })
            }),
            gap,
        )
    }

    #[test]
    fn test_merge_spans() {
        // Adjacent and near spans merge; distant spans stay apart
        assert_eq!(merge_spans(&[(1, 2), (3, 4)], 0), vec![(1, 4)]);
        assert_eq!(merge_spans(&[(1, 2), (5, 6)], 3), vec![(1, 6)]);
        assert_eq!(merge_spans(&[(1, 2), (10, 12)], 3), vec![(1, 2), (10, 12)]);
        assert_eq!(merge_spans(&[(1, 10), (3, 5)], 0), vec![(1, 10)]);
    }

    #[test]
    fn test_render_single_file() {
        let source = "fn one() {}\nfn two() {}\nfn three() {}\nfn four() {}\nfn five() {}\n";
        let renderer = memory_renderer(vec![("a.rs", source)], 0);

        let tags = vec![make_ranked("a.rs", "one", 1.0, 1, 1)];
        let out = renderer.render(&tags, &BTreeSet::new());

        assert!(out.starts_with("a.rs:\n"));
        assert!(out.contains("│fn one() {}\n"));
        // Rest of the file collapses
        assert!(out.contains("⋮\n"));
        assert!(!out.contains("fn three"));
    }

    #[test]
    fn test_render_merges_nearby_spans() {
        let source = "a\nb\nc\nd\ne\nf\ng\n";
        let renderer = memory_renderer(vec![("x.py", source)], 1);

        // Lines 1 and 3 with gap 1 merge into one block covering line 2
        let tags = vec![
            make_ranked("x.py", "a", 1.0, 1, 1),
            make_ranked("x.py", "c", 0.5, 3, 3),
        ];
        let out = renderer.render(&tags, &BTreeSet::new());

        assert!(out.contains("│a\n│b\n│c\n"));
    }

    #[test]
    fn test_file_order_follows_score() {
        let renderer = memory_renderer(vec![("low.rs", "x\n"), ("high.rs", "y\n")], 0);

        let tags = vec![
            make_ranked("high.rs", "y", 0.9, 1, 1),
            make_ranked("low.rs", "x", 0.1, 1, 1),
        ];
        let out = renderer.render(&tags, &BTreeSet::new());

        let high_pos = out.find("high.rs:").unwrap();
        let low_pos = out.find("low.rs:").unwrap();
        assert!(high_pos < low_pos);
    }

    #[test]
    fn test_chat_file_header_without_tags() {
        let renderer = memory_renderer(vec![("a.rs", "x\n")], 0);

        let chat: BTreeSet<Arc<str>> = [Arc::from("edited.rs")].into_iter().collect();
        let out = renderer.render(&[make_ranked("a.rs", "x", 1.0, 1, 1)], &chat);

        assert!(out.contains("\nedited.rs\n"));
    }

    #[test]
    fn test_unreadable_file_renders_header_only() {
        let renderer = memory_renderer(vec![], 0);

        let out = renderer.render(&[make_ranked("gone.rs", "x", 1.0, 1, 1)], &BTreeSet::new());
        assert!(out.contains("gone.rs:"));
        assert!(!out.contains('│'));
    }

    #[test]
    fn test_span_clamped_to_file_length() {
        let renderer = memory_renderer(vec![("s.rs", "only\n")], 0);

        // Tag claims lines 1..=50 of a one-line file
        let out = renderer.render(&[make_ranked("s.rs", "only", 1.0, 1, 50)], &BTreeSet::new());
        assert!(out.contains("│only\n"));
        assert_eq!(out.matches('│').count(), 1);
    }

    #[test]
    fn test_empty_input_renders_empty() {
        let renderer = memory_renderer(vec![], 0);
        assert_eq!(renderer.render(&[], &BTreeSet::new()), "");
    }

    #[test]
    fn test_rendered_length_monotone_in_prefix() {
        let source = "l1\nl2\nl3\nl4\nl5\nl6\nl7\nl8\n";
        let renderer = memory_renderer(vec![("m.rs", source)], 0);

        let tags = vec![
            make_ranked("m.rs", "a", 0.9, 1, 1),
            make_ranked("m.rs", "b", 0.5, 4, 5),
            make_ranked("m.rs", "c", 0.1, 8, 8),
        ];

        let mut prev_len = 0;
        for k in 0..=tags.len() {
            let out = renderer.render(&tags[..k], &BTreeSet::new());
            assert!(out.len() >= prev_len, "render length must not shrink as k grows");
            prev_len = out.len();
        }
    }
}
