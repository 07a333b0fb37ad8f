//! Relevance graph builder.
//!
//! For every (file, reference) pair whose name matches a definition in
//! another file, accumulate a directed edge (referencing file → defining
//! file) weighted by `specialness(name) × reference_count`. The graph is
//! the input to personalized PageRank.
//!
//! Determinism: nodes are added in sorted rel-path order and edges in
//! file-then-first-occurrence order, so the edge list (and therefore every
//! downstream traversal) has a stable construction order. No hash-order
//! iteration leaks into the graph shape.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use petgraph::graph::{DiGraph, NodeIndex};

use crate::types::{FileRecord, RankingConfig};

/// Edge payload: the symbol that produced the edge and its accumulated
/// weight. Keeping the symbol on the edge lets the rank-distribution step
/// attribute incoming weight per definition name.
#[derive(Debug, Clone)]
pub struct EdgeData {
    pub symbol: Arc<str>,
    pub weight: f64,
}

/// The relevance graph over files.
///
/// Node payload is the file's rel path; node indices follow sorted
/// rel-path order. Every file passed for the invocation appears exactly
/// once, including files with no tags at all (they become isolated,
/// low-rank nodes).
pub struct RelevanceGraph {
    pub graph: DiGraph<Arc<str>, EdgeData>,
    node_of: HashMap<Arc<str>, NodeIndex>,
}

impl RelevanceGraph {
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Node index for a rel path, if the file is part of this invocation.
    pub fn node(&self, rel_path: &str) -> Option<NodeIndex> {
        self.node_of.get(rel_path).copied()
    }

    /// Rel path for a node index.
    pub fn rel_path(&self, idx: NodeIndex) -> &Arc<str> {
        &self.graph[idx]
    }
}

/// Specialness weighting for an identifier.
///
/// Monotone in rarity: names defined in fewer files weigh at least as
/// much as names defined in many. Long distinctive identifiers
/// (snake_case / camelCase) defined in exactly one file earn an extra
/// bonus. Mentioned identifiers get a fixed large multiplier on top,
/// regardless of natural specialness.
pub fn specialness(
    name: &str,
    defining_files: usize,
    mentioned: bool,
    config: &RankingConfig,
) -> f64 {
    let mut weight = 1.0 / (defining_files.max(1) as f64).sqrt();

    if defining_files == 1 && name.len() >= config.special_len_threshold && is_distinctive(name) {
        weight *= config.special_len_bonus;
    }

    if mentioned {
        weight *= config.mentioned_ident_boost;
    }

    weight
}

/// Distinctive identifiers carry word structure: snake_case, kebab-ish,
/// or camelCase. A long run of lowercase is likely a dictionary word and
/// earns no bonus.
fn is_distinctive(name: &str) -> bool {
    if name.contains('_') {
        return true;
    }
    let has_lower = name.chars().any(|c| c.is_lowercase());
    let has_upper = name.chars().any(|c| c.is_uppercase());
    has_lower && has_upper
}

/// Build the relevance graph from one invocation's file records.
///
/// `mentioned_idents` is the caller's set of explicitly mentioned symbol
/// names; references to them receive the configured boost.
///
/// Self-references (a file referencing a symbol it defines itself) are
/// excluded - they would only inflate a file's own rank.
pub fn build_graph(
    records: &[FileRecord],
    mentioned_idents: &HashSet<String>,
    config: &RankingConfig,
) -> RelevanceGraph {
    let mut graph = DiGraph::new();
    let mut node_of: HashMap<Arc<str>, NodeIndex> = HashMap::new();

    // Sorted index over records so node order is independent of caller
    // ordering
    let mut order: Vec<usize> = (0..records.len()).collect();
    order.sort_by(|&a, &b| records[a].rel_path.cmp(&records[b].rel_path));

    for &i in &order {
        let rel = Arc::clone(&records[i].rel_path);
        if !node_of.contains_key(&rel) {
            let idx = graph.add_node(Arc::clone(&rel));
            node_of.insert(rel, idx);
        }
    }

    // Defines index: symbol name -> defining nodes, in sorted-file order.
    // The per-name Vec preserves insertion order for deterministic edge
    // emission; the set guards against duplicate (name, file) pairs.
    let mut defines: HashMap<Arc<str>, Vec<NodeIndex>> = HashMap::new();
    let mut seen_defs: HashSet<(Arc<str>, NodeIndex)> = HashSet::new();

    for &i in &order {
        let record = &records[i];
        let node = node_of[&record.rel_path];
        for tag in record.tags.iter().filter(|t| t.is_def()) {
            if seen_defs.insert((Arc::clone(&tag.name), node)) {
                defines.entry(Arc::clone(&tag.name)).or_default().push(node);
            }
        }
    }

    // Emit edges: per file, count references per name in first-occurrence
    // order, then link to every defining file except the referencing file
    // itself
    for &i in &order {
        let record = &records[i];
        let from = node_of[&record.rel_path];

        let mut ref_order: Vec<Arc<str>> = Vec::new();
        let mut ref_counts: HashMap<Arc<str>, u32> = HashMap::new();
        for tag in record.tags.iter().filter(|t| t.is_ref()) {
            let count = ref_counts.entry(Arc::clone(&tag.name)).or_insert(0);
            if *count == 0 {
                ref_order.push(Arc::clone(&tag.name));
            }
            *count += 1;
        }

        for name in ref_order {
            let Some(defining) = defines.get(&name) else {
                continue;
            };
            let count = ref_counts[&name];
            let mentioned = mentioned_idents.contains(name.as_ref());
            let weight = specialness(&name, defining.len(), mentioned, config) * count as f64;

            for &to in defining {
                if to == from {
                    continue;
                }
                graph.add_edge(
                    from,
                    to,
                    EdgeData {
                        symbol: Arc::clone(&name),
                        weight,
                    },
                );
            }
        }
    }

    RelevanceGraph { graph, node_of }
}
