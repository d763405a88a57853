// Foodweb Robustness Engine - Single-Trajectory Perturbation
//
// Drives one graph copy from fully populated down to empty: snapshot the
// metrics, pick a victim, remove it with its cascade, repeat. Finishes by
// expanding the recorded series onto the removed-count axis so trajectories
// with different cascade sizes line up index-for-index.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::graph::{DependencyGraph, SelectionError};
use crate::metrics::MetricProvider;
use crate::strategy::{AttackStrategy, SelectionPlan, StrategyError};
use crate::types::{MetricEvolution, NodeId, RemovalKind, RemovalRecord, TrajectoryResult};

// ─── Errors ──────────────────────────────────────────────────────────────────

/// Errors fatal to a single trajectory.
#[derive(Debug, thiserror::Error)]
pub enum PerturbationError {
    #[error(transparent)]
    Selection(#[from] SelectionError),

    #[error(transparent)]
    Strategy(#[from] StrategyError),

    #[error("trajectory already executed")]
    AlreadyRun,
}

// ─── Perturbation ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Ready,
    Running,
    Done,
}

/// One trajectory over one exclusively-owned graph copy.
pub struct Perturbation {
    graph: DependencyGraph,
    plan: SelectionPlan,
    rng: ChaCha8Rng,
    track_removals: bool,
    phase: Phase,
}

impl Perturbation {
    /// Run the strategy's setup against the supplied copy and wrap it. Use
    /// this for standalone trajectories; `Simulation` performs setup once on
    /// a template instead.
    pub fn new(
        mut graph: DependencyGraph,
        strategy: &dyn AttackStrategy,
        seed: u64,
        track_removals: bool,
    ) -> Result<Self, StrategyError> {
        let plan = strategy.setup(&mut graph)?;
        Ok(Self::from_parts(graph, plan, seed, track_removals))
    }

    /// Wrap an already-prepared copy (labels and partition installed, plan
    /// computed).
    pub fn from_parts(
        graph: DependencyGraph,
        plan: SelectionPlan,
        seed: u64,
        track_removals: bool,
    ) -> Self {
        Self {
            graph,
            plan,
            rng: ChaCha8Rng::seed_from_u64(seed),
            track_removals,
            phase: Phase::Ready,
        }
    }

    /// Execute the trajectory to completion. The metric snapshot is taken
    /// before each removal, so the first recorded point reflects the
    /// untouched graph.
    pub fn run(
        &mut self,
        provider: &dyn MetricProvider,
    ) -> Result<TrajectoryResult, PerturbationError> {
        if self.phase != Phase::Ready {
            return Err(PerturbationError::AlreadyRun);
        }
        self.phase = Phase::Running;

        let initial_size = self.graph.size();
        let names = provider.metric_names();
        let mut sizes: Vec<usize> = Vec::new();
        let mut recorded = MetricEvolution::new(names);
        let mut removals: Vec<RemovalRecord> = Vec::new();
        let mut steps = 0usize;

        while self.graph.size() > 0 {
            sizes.push(self.graph.size());
            let snapshot = provider.compute_all(&self.graph);
            recorded.push_snapshot(&snapshot);

            let victim = self.next_victim()?;
            let casualties = self.graph.remove_node_and_dependents(victim);

            if self.track_removals {
                removals.push(RemovalRecord {
                    step: steps,
                    name: self.graph.name(victim).to_string(),
                    kind: RemovalKind::Primary,
                });
                for c in &casualties {
                    removals.push(RemovalRecord {
                        step: steps,
                        name: self.graph.name(*c).to_string(),
                        kind: RemovalKind::Secondary,
                    });
                }
            }
            steps += 1;
        }

        let series = recorded
            .series
            .iter()
            .map(|values| {
                let mut expanded = expand_series(&sizes, values);
                pad_to(&mut expanded, initial_size);
                expanded
            })
            .collect();

        self.phase = Phase::Done;
        Ok(TrajectoryResult {
            evolution: MetricEvolution {
                names: recorded.names,
                series,
            },
            removals,
            initial_size,
            steps,
        })
    }

    fn next_victim(&mut self) -> Result<NodeId, PerturbationError> {
        match &mut self.plan {
            SelectionPlan::WeightedBuckets => Ok(self.graph.choose_node(&mut self.rng)?),
            SelectionPlan::Queue(queue) => {
                // Entries destroyed by earlier cascades are skipped; the
                // ordering itself is never recomputed.
                while let Some(id) = queue.pop_front() {
                    if self.graph.is_alive(id) {
                        return Ok(id);
                    }
                }
                Err(SelectionError::BucketExhaustion {
                    remaining: self.graph.size(),
                }
                .into())
            }
        }
    }
}

// ─── Series expansion ────────────────────────────────────────────────────────

/// Expand a recorded series onto the removed-count axis: for consecutive
/// snapshots at graph sizes `g[i] > g[i+1]`, the value at `i` repeats once
/// per node that disappeared between them, and the final value is appended
/// once. `[(100, 7), (97, 3), (96, 5)]` becomes `[7, 7, 7, 3, 5]`.
pub fn expand_series(sizes: &[usize], values: &[f64]) -> Vec<f64> {
    debug_assert_eq!(sizes.len(), values.len());
    let mut out = Vec::new();
    for i in 0..values.len().saturating_sub(1) {
        let repeats = sizes[i] - sizes[i + 1];
        for _ in 0..repeats {
            out.push(values[i]);
        }
    }
    if let Some(&last) = values.last() {
        out.push(last);
    }
    out
}

/// Right-pad with the final value so every trajectory reports exactly
/// `target_len` entries even when its last cascade removed several nodes.
fn pad_to(series: &mut Vec<f64>, target_len: usize) {
    if let Some(&last) = series.last() {
        while series.len() < target_len {
            series.push(last);
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
