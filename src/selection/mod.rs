//! Budget-constrained selection of ranked tags.
//!
//! Finds the largest rank-ordered prefix of tags whose rendered form fits
//! a token budget, via bisection over the prefix length.

mod budget;

pub use budget::{count_tokens_safe, BudgetSelector, TokenCounter};
