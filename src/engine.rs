//! The map engine - primary call contract of the crate.
//!
//! Orchestrates the full pipeline over one invocation:
//!
//! ```text
//! file set → tags (cached) → graph → ranked tags → budget selection → text
//! ```
//!
//! The stages are exposed individually (`collect_records`, `ranked_tags`,
//! `render_map`) so a caller can abandon the computation at any checkpoint;
//! every cache write is independently atomic, so abandonment never leaves
//! torn state behind.
//!
//! Failure policy: per-file problems (unparsable text, unreadable bytes,
//! cache hiccups) degrade to "less complete map" and are logged. The only
//! errors surfaced to the caller are an unresolvable repository root and
//! invalid configuration.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use dashmap::DashMap;
use rayon::prelude::*;
use tracing::{debug, warn};

use crate::cache::TagCache;
use crate::extraction::{self, extension_to_language, Extractor};
use crate::graph::{build_graph, RelevanceGraph};
use crate::ranking::{distribute_ranks, PersonalizedRanker};
use crate::rendering::TreeRenderer;
use crate::selection::{BudgetSelector, TokenCounter};
use crate::types::{FileRecord, FileRole, RankedTag, RankingConfig, Tag};

/// Shared text-reading capability (the renderer's boxed reader is built
/// from this per invocation).
pub type SharedTextReader = Arc<dyn Fn(&Path) -> io::Result<String> + Send + Sync>;

/// One invocation's inputs.
#[derive(Default)]
pub struct MapRequest {
    /// Files currently being edited - highest personalization weight
    pub chat_files: Vec<PathBuf>,
    /// The rest of the repository's files under consideration
    pub other_files: Vec<PathBuf>,
    /// Files explicitly mentioned by the caller - elevated weight
    pub mentioned_files: Vec<PathBuf>,
    /// Identifier names explicitly mentioned - boosts matching edges
    pub mentioned_idents: HashSet<String>,
    /// Token budget; `None` falls back to the configured default
    pub budget: Option<usize>,
    /// Bypass cache lookup, always re-extract and overwrite
    pub force_refresh: bool,
}

/// The repository map engine.
pub struct MapEngine {
    root: PathBuf,
    config: RankingConfig,
    /// `None` when the cache failed to open - the engine then runs cold
    cache: Option<TagCache>,
    extractors: Vec<Box<dyn Extractor>>,
    read_text: SharedTextReader,
}

impl MapEngine {
    /// Create an engine rooted at `root`.
    ///
    /// Fatal conditions (the only errors this subsystem ever surfaces):
    /// an unresolvable root path or invalid configuration. A cache that
    /// fails to open merely degrades to cache-less operation.
    pub fn new(root: impl AsRef<Path>, config: RankingConfig) -> Result<Self> {
        config.validate().context("invalid ranking configuration")?;

        let root = root
            .as_ref()
            .canonicalize()
            .with_context(|| format!("failed to resolve repository root: {}", root.as_ref().display()))?;

        let cache = match TagCache::open(&root) {
            Ok(cache) => Some(cache),
            Err(e) => {
                warn!("tag cache unavailable, running cold: {e:#}");
                None
            }
        };

        Ok(Self {
            root,
            config,
            cache,
            extractors: extraction::default_registry(),
            read_text: Arc::new(|path| std::fs::read_to_string(path)),
        })
    }

    /// Substitute the text-reading capability (used by rendering).
    pub fn with_text_reader(mut self, read_text: SharedTextReader) -> Self {
        self.read_text = read_text;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Generate the repository map for one request.
    ///
    /// Returns the rendered text, or an empty string when no files
    /// qualify or the budget admits nothing.
    pub fn generate(&self, request: &MapRequest, counter: &TokenCounter) -> Result<String> {
        let records = self.collect_records(request);
        if records.is_empty() {
            return Ok(String::new());
        }

        let (graph, ranked) = self.ranked_tags(&records, &request.mentioned_idents);
        debug!(
            files = records.len(),
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            ranked = ranked.len(),
            "relevance graph ranked"
        );

        let budget = request.budget.unwrap_or(self.config.default_budget);
        Ok(self.render_map(&records, &ranked, budget, counter))
    }

    /// Stage 1: resolve roles, snapshot file metadata, and extract tags
    /// (through the cache where possible). Output is sorted by rel path
    /// so every downstream stage sees a deterministic snapshot.
    pub fn collect_records(&self, request: &MapRequest) -> Vec<FileRecord> {
        // Strongest role wins when a path appears in several sets
        let mut roles: HashMap<PathBuf, FileRole> = HashMap::new();
        for (paths, role) in [
            (&request.other_files, FileRole::Other),
            (&request.mentioned_files, FileRole::Mentioned),
            (&request.chat_files, FileRole::Chat),
        ] {
            for path in paths {
                let abs = self.absolutize(path);
                let entry = roles.entry(abs).or_insert(role);
                if role > *entry {
                    *entry = role;
                }
            }
        }

        // Snapshot metadata up front; unreadable files drop out here
        let mut work: Vec<(PathBuf, Arc<str>, FileRole, std::time::SystemTime, u64)> = Vec::new();
        for (path, role) in roles {
            let meta = match std::fs::metadata(&path) {
                Ok(m) if m.is_file() => m,
                _ => {
                    debug!("skipping inaccessible file: {}", path.display());
                    continue;
                }
            };
            let mtime = meta.modified().unwrap_or(std::time::SystemTime::UNIX_EPOCH);
            let rel = self.rel_path(&path);
            work.push((path, rel, role, mtime, meta.len()));
        }
        work.sort_by(|a, b| a.1.cmp(&b.1));

        // Extraction is embarrassingly parallel; results land in a
        // concurrent map and are drained in the sorted work order
        let extracted: DashMap<Arc<str>, (Vec<Tag>, bool)> = DashMap::new();

        work.par_iter().for_each(|(path, rel, _role, mtime, size)| {
            if !request.force_refresh {
                if let Some(cache) = &self.cache {
                    if let Some(tags) = cache.get(rel, *mtime, *size) {
                        extracted.insert(Arc::clone(rel), (tags, false));
                        return;
                    }
                }
            }

            let tags = match std::fs::read_to_string(path) {
                Ok(text) => extraction::extract_tags(
                    &self.extractors,
                    path,
                    &text,
                    &path.to_string_lossy(),
                    rel,
                ),
                Err(e) => {
                    // Binary or unreadable content: participate with no
                    // tags rather than failing the run
                    debug!("could not read {}: {e}", path.display());
                    Vec::new()
                }
            };
            extracted.insert(Arc::clone(rel), (tags, true));
        });

        // Commit fresh extractions to the cache (one atomic write each)
        // and assemble the records
        let mut records = Vec::with_capacity(work.len());
        for (path, rel, role, mtime, size) in work {
            let Some((_, (tags, fresh))) = extracted.remove(&rel) else {
                continue;
            };

            if fresh {
                if let Some(cache) = &self.cache {
                    if let Err(e) = cache.set(&rel, mtime, size, &tags) {
                        warn!("cache write failed for {rel}: {e:#}");
                    }
                }
            }

            let language_hint = path
                .extension()
                .and_then(|e| e.to_str())
                .and_then(extension_to_language);

            records.push(FileRecord {
                path,
                rel_path: rel,
                language_hint,
                mtime,
                size,
                tags,
                role,
            });
        }

        records
    }

    /// Stage 2: graph construction, personalized PageRank, and rank
    /// distribution down to definition tags.
    pub fn ranked_tags(
        &self,
        records: &[FileRecord],
        mentioned_idents: &HashSet<String>,
    ) -> (RelevanceGraph, Vec<RankedTag>) {
        let graph = build_graph(records, mentioned_idents, &self.config);

        let roles: HashMap<Arc<str>, FileRole> = records
            .iter()
            .map(|r| (Arc::clone(&r.rel_path), r.role))
            .collect();

        let ranker = PersonalizedRanker::new(self.config.clone());
        let ranks = ranker.compute_ranks(&graph, &roles);
        let ranked = distribute_ranks(&graph, records, &ranks);

        (graph, ranked)
    }

    /// Stage 3: budget-constrained selection and rendering.
    pub fn render_map(
        &self,
        records: &[FileRecord],
        ranked: &[RankedTag],
        budget: usize,
        counter: &TokenCounter,
    ) -> String {
        let chat_rel_fnames: BTreeSet<Arc<str>> = records
            .iter()
            .filter(|r| r.role == FileRole::Chat)
            .map(|r| Arc::clone(&r.rel_path))
            .collect();

        let read_text = Arc::clone(&self.read_text);
        let renderer = TreeRenderer::with_reader(
            Box::new(move |path: &Path| read_text(path)),
            self.config.collapse_gap,
        );

        BudgetSelector::new(&renderer).select(ranked, &chat_rel_fnames, budget, counter)
    }

    fn absolutize(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    fn rel_path(&self, path: &Path) -> Arc<str> {
        let rel = path.strip_prefix(&self.root).unwrap_or(path);
        Arc::from(rel.to_string_lossy().as_ref())
    }
}
