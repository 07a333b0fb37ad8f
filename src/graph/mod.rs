//! Relevance graph construction.
//!
//! Builds the weighted directed multigraph over files where an edge means
//! "file A references a symbol defined in file B".

mod builder;

pub use builder::{build_graph, specialness, EdgeData, RelevanceGraph};
