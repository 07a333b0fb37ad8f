//! Core types for repoatlas - the repository map engine.
//!
//! Key design decisions:
//! - `Arc<str>` for shared ownership of interned path/name strings
//! - Frozen/immutable tags so extraction results can be shared across
//!   threads and cached without copies
//! - Explicit deterministic ordering on ranked tags (no hash-order anywhere
//!   on the ranking path)

use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;

use anyhow::{bail, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Serde serialization helpers for Arc<str> fields
mod arc_str_serde {
    use super::*;

    pub fn serialize<S>(arc: &Arc<str>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(arc.as_ref())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Arc<str>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(s.into())
    }
}

/// The fundamental unit of code structure - a symbol tag.
/// Represents either a definition ("def") or reference ("ref").
///
/// This is the atom from which all ranking and rendering is built.
/// Frozen/immutable to enable safe sharing across threads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    /// Relative path for display (e.g., "src/lib.rs")
    #[serde(with = "arc_str_serde")]
    pub rel_fname: Arc<str>,
    /// Absolute path for I/O operations
    #[serde(with = "arc_str_serde")]
    pub fname: Arc<str>,
    /// Symbol name (function, class, variable name)
    #[serde(with = "arc_str_serde")]
    pub name: Arc<str>,
    /// "def" for definition, "ref" for reference
    pub kind: TagKind,
    /// First line of the occurrence (1-indexed)
    pub line_start: u32,
    /// Last line of the enclosing construct for definitions;
    /// equals `line_start` for references and single-line definitions
    pub line_end: u32,
    /// AST node type: "function", "class", "method", "call", etc.
    #[serde(with = "arc_str_serde")]
    pub node_type: Arc<str>,
}

impl Tag {
    /// Check if this is a definition tag
    pub fn is_def(&self) -> bool {
        matches!(self.kind, TagKind::Def)
    }

    /// Check if this is a reference tag
    pub fn is_ref(&self) -> bool {
        matches!(self.kind, TagKind::Ref)
    }
}

/// Tag kind - definition or reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TagKind {
    /// Symbol definition (function def, class def, const assignment)
    Def,
    /// Symbol reference (function call, identifier use)
    Ref,
}

/// Caller-assigned role of a file for one map invocation.
///
/// The role determines the personalization (teleportation) weight the file
/// receives during ranking. It is supplied per invocation and never
/// persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FileRole {
    /// Baseline weight - part of the repository background
    Other,
    /// Elevated weight - explicitly mentioned by the caller
    Mentioned,
    /// Highest weight - currently being edited
    Chat,
}

/// One file's view for a single invocation: identity, freshness metadata,
/// extracted tags, and the caller-assigned role.
///
/// Rebuilt from the cache plus the caller's file sets on every call and
/// discarded after the map is produced.
#[derive(Debug, Clone)]
pub struct FileRecord {
    /// Absolute path
    pub path: PathBuf,
    /// Path relative to the repository root, used for display and as the
    /// stable node identity in the relevance graph
    pub rel_path: Arc<str>,
    /// Language name from the extension, if recognized
    pub language_hint: Option<&'static str>,
    /// Modification time at snapshot
    pub mtime: SystemTime,
    /// File size in bytes at snapshot
    pub size: u64,
    /// Extracted tags, in source order
    pub tags: Vec<Tag>,
    /// Role for this invocation
    pub role: FileRole,
}

/// A definition tag with its computed importance score.
///
/// The score is the owning file's PageRank multiplied by the definition's
/// share of within-file incoming reference weight.
#[derive(Debug, Clone)]
pub struct RankedTag {
    /// Importance score (non-negative)
    pub score: f64,
    /// The underlying definition tag
    pub tag: Tag,
}

impl RankedTag {
    pub fn new(score: f64, tag: Tag) -> Self {
        Self { score, tag }
    }
}

impl PartialEq for RankedTag {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == std::cmp::Ordering::Equal
    }
}

impl Eq for RankedTag {}

impl PartialOrd for RankedTag {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Total order: score descending, then rel path ascending, then line
/// ascending. Ties must break identically across runs for byte-identical
/// output.
impl Ord for RankedTag {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        other
            .score
            .partial_cmp(&self.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| self.tag.rel_fname.cmp(&other.tag.rel_fname))
            .then_with(|| self.tag.line_start.cmp(&other.tag.line_start))
    }
}

/// Configuration for the ranking and selection pipeline.
/// All values are tunable at runtime for experimentation.
#[derive(Debug, Clone)]
pub struct RankingConfig {
    /// PageRank damping factor (probability of following an edge)
    pub damping: f64,
    /// Convergence threshold for power iteration
    pub epsilon: f64,
    /// Iteration cap - bounds runtime on near-cyclic graphs
    pub max_iterations: usize,

    /// Personalization weight for chat-role files
    pub weight_chat: f64,
    /// Personalization weight for mentioned-role files
    pub weight_mentioned: f64,
    /// Personalization weight for other-role files
    pub weight_other: f64,

    /// Fixed multiplicative boost for mentioned identifiers
    pub mentioned_ident_boost: f64,
    /// Length threshold above which a uniquely-defined identifier
    /// qualifies for the distinctiveness bonus
    pub special_len_threshold: usize,
    /// Multiplier for long identifiers defined in exactly one file
    pub special_len_bonus: f64,

    /// Token budget used when the caller leaves the budget unset
    pub default_budget: usize,
    /// Maximum gap (in lines) between tag spans merged into one rendered
    /// block
    pub collapse_gap: u32,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            damping: 0.85,
            epsilon: 1e-8,
            max_iterations: 100,

            weight_chat: 100.0,
            weight_mentioned: 20.0,
            weight_other: 1.0,

            mentioned_ident_boost: 10.0,
            special_len_threshold: 8,
            special_len_bonus: 8.0,

            default_budget: 1024,
            collapse_gap: 3,
        }
    }
}

impl RankingConfig {
    /// Validate the configuration. Invalid configuration is one of the few
    /// fatal conditions surfaced to the caller.
    pub fn validate(&self) -> Result<()> {
        if !(self.damping > 0.0 && self.damping < 1.0) {
            bail!("damping must be in (0, 1), got {}", self.damping);
        }
        if self.max_iterations == 0 {
            bail!("max_iterations must be at least 1");
        }
        if self.epsilon <= 0.0 {
            bail!("epsilon must be positive, got {}", self.epsilon);
        }
        if self.weight_chat < self.weight_mentioned || self.weight_mentioned < self.weight_other {
            bail!(
                "role weights must satisfy chat >= mentioned >= other, got {} / {} / {}",
                self.weight_chat,
                self.weight_mentioned,
                self.weight_other
            );
        }
        if self.weight_other <= 0.0 {
            bail!("weight_other must be positive, got {}", self.weight_other);
        }
        Ok(())
    }
}
