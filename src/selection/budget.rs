//! Budget selector - bisection over the ranked-tag prefix.
//!
//! Rendering is not additive per tag (file grouping, span merging, header
//! overhead), so the selector treats the renderer as a black box and
//! searches over k = number of top-ranked tags included. Rendered length
//! is monotonically non-decreasing in k, which makes plain bisection
//! correct: find the largest k whose rendered text fits the budget.
//!
//! Cost: O(log n) renders instead of n, which matters because each probe
//! re-renders and re-counts the candidate text.
//!
//! Token counting goes through `count_tokens_safe`: a counter that panics
//! degrades to the chars/4 approximation for that measurement instead of
//! taking down the run.

use std::collections::BTreeSet;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use tracing::warn;

use crate::rendering::TreeRenderer;
use crate::types::RankedTag;

/// Token-counting capability, supplied by the caller at invocation time.
/// The engine stays ignorant of any specific tokenizer's internals.
pub type TokenCounter = dyn Fn(&str) -> usize + Send + Sync;

/// Count tokens, degrading to a character-length approximation if the
/// counter panics.
pub fn count_tokens_safe(counter: &TokenCounter, text: &str) -> usize {
    match catch_unwind(AssertUnwindSafe(|| counter(text))) {
        Ok(n) => n,
        Err(_) => {
            warn!("token counter failed; falling back to chars/4 estimate");
            (text.len() + 3) / 4
        }
    }
}

/// Selects the largest renderable prefix of the ranked tag list that fits
/// a token budget.
pub struct BudgetSelector<'a> {
    renderer: &'a TreeRenderer,
}

impl<'a> BudgetSelector<'a> {
    pub fn new(renderer: &'a TreeRenderer) -> Self {
        Self { renderer }
    }

    /// Run the bisection. Returns the rendered map text.
    ///
    /// - `budget == 0` returns the empty string.
    /// - If even k = 0 (chat-file headers only) exceeds the budget, the
    ///   result is the empty string.
    pub fn select(
        &self,
        ranked: &[RankedTag],
        chat_rel_fnames: &BTreeSet<Arc<str>>,
        budget: usize,
        counter: &TokenCounter,
    ) -> String {
        if budget == 0 {
            return String::new();
        }

        // Floor probe: headers only. If that already blows the budget,
        // nothing fits.
        let floor = self.renderer.render(&[], chat_rel_fnames);
        if count_tokens_safe(counter, &floor) > budget {
            return String::new();
        }

        let mut best = floor;
        let mut lo = 0usize;
        let mut hi = ranked.len();

        while lo < hi {
            let mid = lo + (hi - lo + 1) / 2;
            let candidate = self.renderer.render(&ranked[..mid], chat_rel_fnames);

            if count_tokens_safe(counter, &candidate) <= budget {
                best = candidate;
                lo = mid;
            } else {
                hi = mid - 1;
            }
        }

        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rendering::TextReader;
    use crate::types::{Tag, TagKind};
    use std::collections::HashMap;
    use std::path::Path;

    fn make_ranked(rel: &str, name: &str, score: f64, line: u32) -> RankedTag {
        RankedTag::new(
            score,
            Tag {
                rel_fname: Arc::from(rel),
                fname: Arc::from(rel),
                name: Arc::from(name),
                kind: TagKind::Def,
                line_start: line,
                line_end: line,
                node_type: Arc::from("function"),
            },
        )
    }

    fn memory_reader(files: Vec<(&str, &str)>) -> TextReader {
        let map: HashMap<String, String> = files
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Box::new(move |path: &Path| {
            map.get(path.to_string_lossy().as_ref())
                .cloned()
                .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, "missing"))
        })
    }

    fn char_counter(s: &str) -> usize {
        s.len()
    }

    fn fixture() -> (TreeRenderer, Vec<RankedTag>) {
        let source = "fn alpha() {}\nfn beta() {}\nfn gamma() {}\nfn delta() {}\n";
        let renderer = TreeRenderer::with_reader(memory_reader(vec![("f.rs", source)]), 0);
        let ranked = vec![
            make_ranked("f.rs", "alpha", 0.9, 1),
            make_ranked("f.rs", "beta", 0.5, 2),
            make_ranked("f.rs", "gamma", 0.3, 3),
            make_ranked("f.rs", "delta", 0.1, 4),
        ];
        (renderer, ranked)
    }

    #[test]
    fn test_zero_budget_yields_empty() {
        let (renderer, ranked) = fixture();
        let selector = BudgetSelector::new(&renderer);
        let out = selector.select(&ranked, &BTreeSet::new(), 0, &char_counter);
        assert_eq!(out, "");
    }

    #[test]
    fn test_large_budget_includes_everything() {
        let (renderer, ranked) = fixture();
        let selector = BudgetSelector::new(&renderer);
        let out = selector.select(&ranked, &BTreeSet::new(), 100_000, &char_counter);

        for name in ["alpha", "beta", "gamma", "delta"] {
            assert!(out.contains(name), "missing {name} in {out}");
        }
    }

    #[test]
    fn test_tight_budget_keeps_top_ranked() {
        let (renderer, ranked) = fixture();
        let selector = BudgetSelector::new(&renderer);

        // Room for the header and roughly two lines
        let full = selector.select(&ranked, &BTreeSet::new(), 100_000, &char_counter);
        let budget = full.len() / 2;
        let out = selector.select(&ranked, &BTreeSet::new(), budget, &char_counter);

        assert!(out.len() <= budget);
        assert!(out.contains("alpha"), "highest-ranked tag survives trimming");
        assert!(!out.contains("delta"), "lowest-ranked tag is dropped first");
    }

    #[test]
    fn test_budget_monotonicity() {
        let (renderer, ranked) = fixture();
        let selector = BudgetSelector::new(&renderer);

        let mut prev_len = 0usize;
        for budget in [10, 30, 60, 120, 500] {
            let out = selector.select(&ranked, &BTreeSet::new(), budget, &char_counter);
            assert!(out.len() <= budget || out.is_empty());
            assert!(
                out.len() >= prev_len,
                "larger budget must never shrink the selection"
            );
            prev_len = out.len();
        }
    }

    #[test]
    fn test_headers_over_budget_yield_empty() {
        let renderer = TreeRenderer::with_reader(memory_reader(vec![]), 0);
        let selector = BudgetSelector::new(&renderer);

        let chat: BTreeSet<Arc<str>> =
            [Arc::from("some/deeply/nested/chat_file.rs")].into_iter().collect();
        let out = selector.select(&[], &chat, 3, &char_counter);
        assert_eq!(out, "");
    }

    #[test]
    fn test_panicking_counter_degrades_to_estimate() {
        let (renderer, ranked) = fixture();
        let selector = BudgetSelector::new(&renderer);

        let panicky = |_: &str| -> usize { panic!("tokenizer exploded") };
        let out = selector.select(&ranked, &BTreeSet::new(), 100_000, &panicky);

        // chars/4 fallback admits everything under a huge budget
        assert!(out.contains("alpha"));
        assert!(out.contains("delta"));
    }

    #[test]
    fn test_deterministic_selection() {
        let (renderer, ranked) = fixture();
        let selector = BudgetSelector::new(&renderer);

        let a = selector.select(&ranked, &BTreeSet::new(), 40, &char_counter);
        let b = selector.select(&ranked, &BTreeSet::new(), 40, &char_counter);
        assert_eq!(a, b);
    }
}
