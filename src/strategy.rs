// Foodweb Robustness Engine - Attack Strategies
//
// A strategy labels every node with a bucket before a trajectory starts and
// hands back the selection contract the trajectory will follow: either
// weighted bucket sampling delegated to the graph, or a precomputed
// deterministic queue.

use std::collections::VecDeque;

use crate::graph::{BucketPartition, DependencyGraph, SelectionError};
use crate::types::NodeId;

/// Sentinel bucket for basal "food group" resources. Its probability is
/// forced to 0 so producers are never directly targeted.
pub const BASAL_BUCKET: &str = "basal";

// ─── Errors ──────────────────────────────────────────────────────────────────

/// Errors raised during strategy setup.
#[derive(Debug, thiserror::Error)]
pub enum StrategyError {
    #[error("strategy `{0}` has no bucket logic implemented")]
    Unimplemented(&'static str),

    #[error("probability floor {floor} cannot be satisfied over {buckets} buckets")]
    UnsatisfiableFloor { floor: f64, buckets: usize },

    #[error(transparent)]
    Selection(#[from] SelectionError),
}

// ─── Selection contract ──────────────────────────────────────────────────────

/// The two behavioural shapes a strategy can produce. Probabilistic
/// strategies install a partition on the graph and let it sample; ranked
/// strategies expose a strict pop-front ordering computed exactly once.
#[derive(Debug, Clone)]
pub enum SelectionPlan {
    /// Bucket weights installed on the graph; choose via
    /// `DependencyGraph::choose_node`.
    WeightedBuckets,
    /// Deterministic precomputed victim ordering, consumed front to back.
    Queue(VecDeque<NodeId>),
}

/// Node-selection policy. `setup` writes per-node bucket labels (and, for
/// probabilistic variants, installs bucket weights on the graph) before a
/// trajectory begins.
pub trait AttackStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn setup(&self, graph: &mut DependencyGraph) -> Result<SelectionPlan, StrategyError>;
}

// ─── Random ──────────────────────────────────────────────────────────────────

/// Uniform random loss: one bucket holding every node, weight 1.
#[derive(Debug, Clone, Copy, Default)]
pub struct Random;

impl AttackStrategy for Random {
    fn name(&self) -> &'static str {
        "random"
    }

    fn setup(&self, graph: &mut DependencyGraph) -> Result<SelectionPlan, StrategyError> {
        let ids: Vec<NodeId> = graph.node_ids().collect();
        for id in ids {
            graph.set_bucket_label(id, "b1");
        }
        let mut partition = BucketPartition::new();
        partition.insert("b1", 1.0);
        graph.set_buckets(partition)?;
        Ok(SelectionPlan::WeightedBuckets)
    }
}

// ─── Sequential ──────────────────────────────────────────────────────────────

/// Ranking metric for the sequential (targeted) strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortBy {
    #[default]
    OutDegree,
    InDegree,
    TotalDegree,
}

impl SortBy {
    fn score(&self, graph: &DependencyGraph, id: NodeId) -> usize {
        match self {
            Self::OutDegree => graph.out_degree(id),
            Self::InDegree => graph.in_degree(id),
            Self::TotalDegree => graph.degree(id),
        }
    }
}

/// Ranked/targeted loss: score every node once on the intact graph, sort
/// descending, and remove in that fixed order. The metric is never
/// re-evaluated after removals; ties keep ascending id order (stable sort).
#[derive(Debug, Clone, Copy, Default)]
pub struct Sequential {
    pub sort_by: SortBy,
}

impl Sequential {
    pub fn new(sort_by: SortBy) -> Self {
        Self { sort_by }
    }
}

impl AttackStrategy for Sequential {
    fn name(&self) -> &'static str {
        "sequential"
    }

    fn setup(&self, graph: &mut DependencyGraph) -> Result<SelectionPlan, StrategyError> {
        let mut ranked: Vec<NodeId> = graph.node_ids().collect();
        ranked.sort_by_key(|&id| std::cmp::Reverse(self.sort_by.score(graph, id)));
        for (rank, &id) in ranked.iter().enumerate() {
            graph.set_bucket_label(id, format!("b{}", rank + 1));
        }
        Ok(SelectionPlan::Queue(ranked.into()))
    }
}

// ─── ThreatenedHabitats ──────────────────────────────────────────────────────

/// Habitat-driven loss: nodes are bucketed by the proportion of their
/// habitat tags that appear in the threatened list, and buckets are weighted
/// by a floored normalization of those proportions. Basal food-group nodes
/// go to the zero-probability sentinel bucket.
#[derive(Debug, Clone)]
pub struct ThreatenedHabitats {
    pub threatened: Vec<String>,
    pub min_probability: f64,
}

impl ThreatenedHabitats {
    pub const DEFAULT_MIN_PROBABILITY: f64 = 0.05;

    pub fn new(threatened: Vec<String>) -> Self {
        Self {
            threatened,
            min_probability: Self::DEFAULT_MIN_PROBABILITY,
        }
    }

    pub fn with_min_probability(threatened: Vec<String>, min_probability: f64) -> Self {
        Self {
            threatened,
            min_probability,
        }
    }

    fn proportion(&self, habitats: &[String]) -> f64 {
        if habitats.is_empty() {
            return 0.0;
        }
        let threatened = habitats
            .iter()
            .filter(|h| {
                let h = h.trim();
                self.threatened.iter().any(|t| t == h)
            })
            .count();
        threatened as f64 / habitats.len() as f64
    }
}

/// Offset the proportions so the smallest bucket's normalized weight lands
/// on the floor `m`, keeping relative order. Solving
/// `(p_min + x) / (s + n*x) = m` gives `x = (m*s - p_min) / (1 - m*n)`;
/// clamped at 0 when the natural minimum already clears the floor.
fn floor_offset(min_probability: f64, proportions: &[f64]) -> Result<f64, StrategyError> {
    let n = proportions.len() as f64;
    let m = min_probability;
    if m * n >= 1.0 {
        return Err(StrategyError::UnsatisfiableFloor {
            floor: m,
            buckets: proportions.len(),
        });
    }
    let s: f64 = proportions.iter().sum();
    if s <= 0.0 {
        // Every proportion is zero (no threatened habitat present in the
        // web); any positive offset yields the uniform distribution, which
        // clears the floor since m*n < 1.
        return Ok(1.0);
    }
    if m <= 0.0 {
        return Ok(0.0);
    }
    let p_min = proportions.iter().copied().fold(f64::INFINITY, f64::min);
    let x = (m * s - p_min) / (1.0 - m * n);
    Ok(x.max(0.0))
}

impl AttackStrategy for ThreatenedHabitats {
    fn name(&self) -> &'static str {
        "threatened_habitats"
    }

    fn setup(&self, graph: &mut DependencyGraph) -> Result<SelectionPlan, StrategyError> {
        let ids: Vec<NodeId> = graph.node_ids().collect();
        let mut proportions: Vec<f64> = Vec::new();

        for &id in &ids {
            if graph.attrs(id).food_group {
                graph.set_bucket_label(id, BASAL_BUCKET);
                continue;
            }
            let proportion = self.proportion(&graph.attrs(id).habitats);
            graph.set_bucket_label(id, proportion.to_string());
            if !proportions.iter().any(|&p| p == proportion) {
                proportions.push(proportion);
            }
        }

        let mut partition = BucketPartition::new();
        if !proportions.is_empty() {
            let x = floor_offset(self.min_probability, &proportions)?;
            let denominator: f64 = proportions.iter().map(|p| p + x).sum();
            for &p in &proportions {
                partition.insert(p.to_string(), (p + x) / denominator);
            }
        }
        if ids.iter().any(|&id| graph.attrs(id).food_group) {
            partition.insert(BASAL_BUCKET, 0.0);
        }

        graph.set_buckets(partition)?;
        Ok(SelectionPlan::WeightedBuckets)
    }
}

// ─── ThreatenedSpecies ───────────────────────────────────────────────────────

/// Species-level threat scenario. The bucket rules for this variant are an
/// open design slot; invoking it fails loudly instead of silently producing
/// an empty partition.
#[derive(Debug, Clone, Default)]
pub struct ThreatenedSpecies {
    pub threatened: Vec<String>,
}

impl ThreatenedSpecies {
    pub fn new(threatened: Vec<String>) -> Self {
        Self { threatened }
    }
}

impl AttackStrategy for ThreatenedSpecies {
    fn name(&self) -> &'static str {
        "threatened_species"
    }

    fn setup(&self, _graph: &mut DependencyGraph) -> Result<SelectionPlan, StrategyError> {
        Err(StrategyError::Unimplemented("threatened_species"))
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
