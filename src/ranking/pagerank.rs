//! Personalized PageRank over the relevance graph.
//!
//! Explicit sparse power iteration - no linear-algebra library, just the
//! documented algorithmic contract:
//!
//! ```text
//! PR(v) = (1-d) * p[v] + d * Σ PR(u) * w(u→v) / out_weight(u)
//!                            over edges u→v
//! ```
//!
//! - d = damping factor
//! - p = role-based personalization (teleportation) distribution:
//!   chat files highest, mentioned files elevated, everything else
//!   baseline; every node receives its mass even with zero edges
//! - dangling mass (nodes with no outgoing edges) is redistributed along
//!   the personalization distribution
//!
//! Iteration stops when the largest per-node change drops below the
//! configured epsilon, or at the iteration cap - the cap bounds runtime
//! on near-cyclic graphs.
//!
//! Determinism: rank state lives in dense vectors indexed by node, and
//! incoming contributions accumulate in edge-insertion order, so two runs
//! over the same graph produce bit-identical scores.

use std::collections::HashMap;
use std::sync::Arc;

use petgraph::visit::EdgeRef;

use crate::graph::RelevanceGraph;
use crate::types::{FileRole, RankingConfig};

/// PageRank calculator with role-based personalization.
pub struct PersonalizedRanker {
    config: RankingConfig,
}

impl PersonalizedRanker {
    pub fn new(config: RankingConfig) -> Self {
        Self { config }
    }

    /// Compute PageRank scores for every file in the graph.
    ///
    /// `roles` maps rel paths to their caller-assigned role; files absent
    /// from the map get the baseline weight.
    ///
    /// Returns a map from rel path to score. A zero-node graph
    /// short-circuits to an empty map.
    pub fn compute_ranks(
        &self,
        rg: &RelevanceGraph,
        roles: &HashMap<Arc<str>, FileRole>,
    ) -> HashMap<Arc<str>, f64> {
        let n = rg.node_count();
        if n == 0 {
            return HashMap::new();
        }

        let d = self.config.damping;

        // Personalization vector, normalized to a probability distribution
        let mut personalization: Vec<f64> = rg
            .graph
            .node_indices()
            .map(|idx| {
                let role = roles
                    .get(rg.rel_path(idx))
                    .copied()
                    .unwrap_or(FileRole::Other);
                self.role_weight(role)
            })
            .collect();
        let total: f64 = personalization.iter().sum();
        for p in personalization.iter_mut() {
            *p /= total;
        }

        // Total outgoing edge weight per node (for weighted contribution
        // splitting)
        let mut out_weight = vec![0.0_f64; n];
        for edge in rg.graph.edge_references() {
            out_weight[edge.source().index()] += edge.weight().weight;
        }

        let mut ranks = vec![1.0 / n as f64; n];
        let mut new_ranks = vec![0.0_f64; n];

        for _iteration in 0..self.config.max_iterations {
            // Dangling nodes teleport their whole mass
            let mut dangling_sum = 0.0;
            for (i, &ow) in out_weight.iter().enumerate() {
                if ow == 0.0 {
                    dangling_sum += ranks[i];
                }
            }

            // Base: teleportation + redistributed dangling mass
            for (i, nr) in new_ranks.iter_mut().enumerate() {
                *nr = (1.0 - d) * personalization[i] + d * dangling_sum * personalization[i];
            }

            // Edge contributions, accumulated in edge-insertion order
            for edge in rg.graph.edge_references() {
                let u = edge.source().index();
                let v = edge.target().index();
                if out_weight[u] > 0.0 {
                    new_ranks[v] += d * ranks[u] * edge.weight().weight / out_weight[u];
                }
            }

            let max_change = ranks
                .iter()
                .zip(new_ranks.iter())
                .map(|(old, new)| (new - old).abs())
                .fold(0.0_f64, f64::max);

            std::mem::swap(&mut ranks, &mut new_ranks);

            if max_change < self.config.epsilon {
                break;
            }
        }

        rg.graph
            .node_indices()
            .map(|idx| (Arc::clone(rg.rel_path(idx)), ranks[idx.index()]))
            .collect()
    }

    fn role_weight(&self, role: FileRole) -> f64 {
        match role {
            FileRole::Chat => self.config.weight_chat,
            FileRole::Mentioned => self.config.weight_mentioned,
            FileRole::Other => self.config.weight_other,
        }
    }
}
