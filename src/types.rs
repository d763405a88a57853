// Foodweb Robustness Engine - Type Definitions

use serde::{Deserialize, Serialize};

/// Stable arena index of a node. Ids are assigned at insertion and never
/// reused within one graph; a removed node keeps its slot but goes dead.
pub type NodeId = u32;

// ─── Node attributes ─────────────────────────────────────────────────────────

/// Domain attributes attached to a node by the loader, plus the bucket label
/// written by the active attack strategy during setup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeAttrs {
    /// Habitat tags, already trimmed by the loader.
    pub habitats: Vec<String>,
    /// Basal resource ("feeding group") marker. These nodes are never
    /// directly targeted by habitat-driven scenarios.
    pub food_group: bool,
    /// Bucket label assigned by the active strategy, `None` before setup.
    pub bucket: Option<String>,
}

// ─── Removal records ─────────────────────────────────────────────────────────

/// Whether a node was the chosen victim or a cascade casualty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemovalKind {
    Primary,
    Secondary,
}

impl RemovalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Secondary => "secondary",
        }
    }
}

/// One node's removal within a trajectory, tagged with the removal step
/// (0-based) it happened on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemovalRecord {
    pub step: usize,
    pub name: String,
    pub kind: RemovalKind,
}

// ─── Metric evolution series ─────────────────────────────────────────────────

/// Per-metric value sequences, keyed consistently: `series[i]` belongs to
/// `names[i]` for the lifetime of the struct. After expansion every row has
/// one entry per removed node, so rows are comparable index-for-index across
/// trajectories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricEvolution {
    pub names: Vec<String>,
    pub series: Vec<Vec<f64>>,
}

impl MetricEvolution {
    pub fn new(names: Vec<String>) -> Self {
        let series = vec![Vec::new(); names.len()];
        Self { names, series }
    }

    /// Append one snapshot; `values` must be aligned with `names`.
    pub fn push_snapshot(&mut self, values: &[f64]) {
        debug_assert_eq!(values.len(), self.names.len());
        for (row, &v) in self.series.iter_mut().zip(values.iter()) {
            row.push(v);
        }
    }

    /// Length of the series (all rows are kept equal-length).
    pub fn len(&self) -> usize {
        self.series.first().map_or(0, |row| row.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Row for a metric name, if recorded.
    pub fn get(&self, name: &str) -> Option<&[f64]> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| self.series[i].as_slice())
    }
}

// ─── Trajectory result ───────────────────────────────────────────────────────

/// Output of one finished perturbation trajectory. `evolution` is already
/// expanded onto the removed-count axis: every row has `initial_size`
/// entries.
#[derive(Debug, Clone, Serialize)]
pub struct TrajectoryResult {
    pub evolution: MetricEvolution,
    /// Empty unless removal tracking was enabled.
    pub removals: Vec<RemovalRecord>,
    pub initial_size: usize,
    /// Number of choose/remove cycles it took to empty the graph.
    pub steps: usize,
}
