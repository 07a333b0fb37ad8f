//! Importance ranking over the relevance graph.
//!
//! Two stages:
//! - `pagerank`: personalized PageRank power iteration over files
//! - `spread`: distribution of each file's score down to its definition
//!   tags by incoming reference weight

mod pagerank;
mod spread;

pub use pagerank::PersonalizedRanker;
pub use spread::distribute_ranks;
