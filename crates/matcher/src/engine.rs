use std::collections::{HashMap, HashSet};
use std::time::Instant;

use tracing::debug;

use crate::types::{
    HierarchyPathItem, MatchCandidate, MatchConfig, MatchError, MatchOutcome, NodeVector,
    PieceVector,
};


/// Cosine similarity between two feature vectors.
///
/// Defined as `0.0` whenever either vector's norm is zero or the lengths
/// differ, so it never divides by zero and never returns NaN. Result is
/// always within `[-1.0, 1.0]`.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (&av, &bv) in a.iter().zip(b.iter()) {
        dot += av * bv;
        norm_a += av * av;
        norm_b += bv * bv;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(-1.0, 1.0)
}

struct Evaluation {
    ranked: Vec<MatchCandidate>,
    best_score: Option<f32>,
}

/// Score `pieces` against the query and keep the top `top_k`, rank 1-based.
///
/// `progress` fires once per piece scored with `(processed, total)`; the
/// total is the size of the evaluated subset, not the full piece set. The
/// sort is stable, so equal scores rank in first-encountered order.
fn evaluate_pieces(
    query: &[f32],
    pieces: &[&PieceVector],
    top_k: usize,
    progress: &dyn Fn(usize, usize),
) -> Evaluation {
    let total = pieces.len();
    let mut scored = Vec::with_capacity(total);
    for (index, piece) in pieces.iter().enumerate() {
        scored.push(MatchCandidate {
            piece_id: piece.piece_id.clone(),
            row: piece.row,
            col: piece.col,
            score: cosine_similarity(query, &piece.vector),
            rank: 0,
        });
        progress(index + 1, total);
    }

    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    scored.truncate(top_k);
    for (index, candidate) in scored.iter_mut().enumerate() {
        candidate.rank = index + 1;
    }

    Evaluation {
        best_score: scored.first().map(|c| c.score),
        ranked: scored,
    }
}

/// Descend the hierarchy toward the leaf most similar to the query.
///
/// Starts from `root_ids` when given (unknown ids are skipped), otherwise
/// from every level-0 node. At each step the highest-scoring candidate wins
/// (ties go to the first encountered, so the result is deterministic for a
/// fixed input order); its children become the next candidate set, until a
/// childless node is reached. Returns the leaf and the recorded path; an
/// empty candidate set stops the walk with whatever path has accumulated.
fn traverse_hierarchy<'a>(
    nodes: &'a [NodeVector],
    root_ids: Option<&[String]>,
    query: &[f32],
) -> (Option<&'a NodeVector>, Vec<HierarchyPathItem>) {
    let by_id: HashMap<&str, &NodeVector> = nodes
        .iter()
        .map(|entry| (entry.node.id.as_str(), entry))
        .collect();

    let mut candidates: Vec<&NodeVector> = match root_ids {
        Some(ids) => ids
            .iter()
            .filter_map(|id| by_id.get(id.as_str()).copied())
            .collect(),
        None => nodes.iter().filter(|entry| entry.node.level == 0).collect(),
    };

    let mut path = Vec::new();
    let mut leaf: Option<&NodeVector> = None;

    while !candidates.is_empty() {
        let mut best: Option<(&NodeVector, f32)> = None;
        for candidate in &candidates {
            let score = cosine_similarity(query, &candidate.vector);
            if best.map_or(true, |(_, best_score)| score > best_score) {
                best = Some((candidate, score));
            }
        }
        let Some((node, score)) = best else {
            break;
        };

        path.push(HierarchyPathItem {
            node_id: node.node.id.clone(),
            level: node.node.level,
            score,
            bounds: node.node.bounds,
        });

        let children: Vec<&NodeVector> = node
            .node
            .child_ids
            .iter()
            .filter_map(|id| by_id.get(id.as_str()).copied())
            .collect();
        if children.is_empty() {
            leaf = Some(node);
            break;
        }
        candidates = children;
    }

    if leaf.is_none() {
        if let Some(last) = path.last() {
            leaf = by_id.get(last.node_id.as_str()).copied();
        }
    }

    (leaf, path)
}

/// Rank candidate tile positions for `query` and decide the match.
///
/// With a hierarchy, the search descends to the most similar leaf and
/// scores only that leaf's tiles, emitting one progress callback per tile
/// scored. When the leaf's best score falls below the confidence threshold,
/// the entire piece list is re-checked silently, and that ranking wins only
/// if its best score strictly exceeds the leaf-restricted best. Without a
/// hierarchy, every tile is scored directly.
///
/// The top-ranked candidate becomes `best_match` only at or above the
/// accept threshold; the ranked list is returned either way.
pub fn run_match(
    query: &[f32],
    pieces: &[PieceVector],
    nodes: &[NodeVector],
    root_ids: Option<&[String]>,
    cfg: &MatchConfig,
    progress: &dyn Fn(usize, usize),
) -> Result<MatchOutcome, MatchError> {
    cfg.validate()?;
    let start = Instant::now();

    let (leaf, path) = if nodes.is_empty() {
        (None, Vec::new())
    } else {
        traverse_hierarchy(nodes, root_ids, query)
    };

    let all: Vec<&PieceVector> = pieces.iter().collect();
    let candidates: Vec<&PieceVector> = match leaf {
        Some(leaf) if !leaf.node.piece_ids.is_empty() => {
            let members: HashSet<&str> =
                leaf.node.piece_ids.iter().map(String::as_str).collect();
            let subset: Vec<&PieceVector> = pieces
                .iter()
                .filter(|piece| members.contains(piece.piece_id.as_str()))
                .collect();
            if subset.is_empty() {
                all.clone()
            } else {
                subset
            }
        }
        _ => all.clone(),
    };

    let mut evaluation = evaluate_pieces(query, &candidates, cfg.top_k, progress);

    if !nodes.is_empty() && !path.is_empty() {
        let leaf_best = evaluation.best_score.unwrap_or(f32::NEG_INFINITY);
        if leaf_best < cfg.hierarchy_confidence_threshold {
            debug!(leaf_best, "low_confidence_fallback_scan");
            let fallback = evaluate_pieces(query, &all, cfg.top_k, &|_, _| {});
            if fallback.best_score.unwrap_or(f32::NEG_INFINITY) > leaf_best {
                evaluation = fallback;
            }
        }
    }

    let best_match = evaluation
        .ranked
        .first()
        .filter(|candidate| cfg.accepts(candidate.score))
        .cloned();

    debug!(
        scored = candidates.len(),
        ranked = evaluation.ranked.len(),
        accepted = best_match.is_some(),
        elapsed_micros = start.elapsed().as_micros() as u64,
        "match_complete"
    );

    Ok(MatchOutcome {
        best_match,
        candidates: evaluation.ranked,
        path,
    })
}
