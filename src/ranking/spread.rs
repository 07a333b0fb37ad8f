//! Distribution of file scores down to definition tags.
//!
//! After PageRank converges, each file's score is split among its
//! definition tags proportional to each definition name's share of the
//! file's total incoming reference weight. A file with one dominant
//! heavily-referenced symbol gives that symbol most of the score.
//!
//! Edge cases:
//! - A file whose definitions attracted no cross-file references splits
//!   its score equally across its definitions, so they still render under
//!   a generous budget.
//! - Several same-name definitions in one file share that name's mass
//!   equally.
//!
//! Output is fully sorted by the RankedTag total order, which makes the
//! downstream selection and rendering deterministic.

use std::collections::HashMap;
use std::sync::Arc;

use petgraph::visit::EdgeRef;

use crate::graph::RelevanceGraph;
use crate::types::{FileRecord, RankedTag};

/// Distribute file ranks to definition tags, returning the ranked list
/// sorted by score descending (ties: path, then line).
pub fn distribute_ranks(
    rg: &RelevanceGraph,
    records: &[FileRecord],
    ranks: &HashMap<Arc<str>, f64>,
) -> Vec<RankedTag> {
    // Incoming reference weight per (file, symbol name), cross-file only -
    // the graph builder already excluded self-references
    let mut incoming: HashMap<(Arc<str>, Arc<str>), f64> = HashMap::new();
    let mut incoming_total: HashMap<Arc<str>, f64> = HashMap::new();

    for edge in rg.graph.edge_references() {
        let target = Arc::clone(rg.rel_path(edge.target()));
        let symbol = Arc::clone(&edge.weight().symbol);
        let w = edge.weight().weight;
        *incoming.entry((Arc::clone(&target), symbol)).or_insert(0.0) += w;
        *incoming_total.entry(target).or_insert(0.0) += w;
    }

    let mut ranked = Vec::new();

    for record in records {
        let Some(&file_rank) = ranks.get(&record.rel_path) else {
            continue;
        };

        let defs: Vec<_> = record.tags.iter().filter(|t| t.is_def()).collect();
        if defs.is_empty() {
            continue;
        }

        // How many def tags carry each name (same-name defs split evenly)
        let mut name_counts: HashMap<&str, f64> = HashMap::new();
        for tag in &defs {
            *name_counts.entry(tag.name.as_ref()).or_insert(0.0) += 1.0;
        }

        let total_in = incoming_total
            .get(&record.rel_path)
            .copied()
            .unwrap_or(0.0);

        for tag in defs {
            let dup = name_counts[tag.name.as_ref()];
            let score = if total_in > 0.0 {
                let name_in = incoming
                    .get(&(Arc::clone(&record.rel_path), Arc::clone(&tag.name)))
                    .copied()
                    .unwrap_or(0.0);
                file_rank * (name_in / total_in) / dup
            } else {
                // Nothing references this file: equal split keeps its
                // definitions visible instead of silently dropping them
                file_rank / name_counts.values().sum::<f64>()
            };

            ranked.push(RankedTag::new(score, tag.clone()));
        }
    }

    ranked.sort();
    ranked
}
