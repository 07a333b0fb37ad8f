//! repoatlas - token-budgeted repository maps for LLM context.
//!
//! Produces a relevance-ranked textual summary of a code repository,
//! surfacing the definitions most likely useful as context for a set of
//! files currently being edited, within a fixed token budget.
//!
//! # Architecture
//!
//! ```text
//! File Set → Tag Extraction → Graph Building → PageRank → Selection → Rendering
//!     ↓           ↓                ↓              ↓           ↓           ↓
//!  caller     tree-sitter      petgraph       iterative   bisection   collapsed
//!  + ignore    + regex          DiGraph         power       over k     tree view
//!              (cached)                       iteration
//! ```
//!
//! # Design invariants
//!
//! - Deterministic output: identical inputs render byte-identical maps
//! - Per-file failures degrade to a less complete map, never an error
//! - The tag cache is the only persisted state; every entry replacement
//!   is atomic
//! - Token counting and text reading are caller-supplied capabilities

pub mod cache;
pub mod config;
pub mod discovery;
pub mod engine;
pub mod extraction;
pub mod graph;
pub mod ranking;
pub mod rendering;
pub mod selection;
pub mod types;

// Re-export the primary surface
pub use engine::{MapEngine, MapRequest};
pub use types::{FileRecord, FileRole, RankedTag, RankingConfig, Tag, TagKind};
