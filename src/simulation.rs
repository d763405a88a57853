// Foodweb Robustness Engine - Monte Carlo Simulation
//
// Runs k independent trajectories over deep copies of one starting graph and
// averages their metric-evolution series into a single robustness curve.
// Strategy setup happens exactly once on a template copy; every trajectory
// clones the template and owns a ChaCha8 stream seeded from its index, so
// concurrent runs never share mutable state or correlate their draws.

use rayon::prelude::*;

use crate::graph::DependencyGraph;
use crate::metrics::MetricProvider;
use crate::perturbation::{Perturbation, PerturbationError};
use crate::strategy::{AttackStrategy, StrategyError};
use crate::types::{MetricEvolution, TrajectoryResult};

// ─── Errors ──────────────────────────────────────────────────────────────────

/// Errors from batch orchestration. One failed trajectory fails the whole
/// batch: silently averaging over fewer runs would bias the curve.
#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    #[error("strategy setup failed: {0}")]
    Setup(#[from] StrategyError),

    #[error("trajectory {index} failed: {source}")]
    TrajectoryFailed {
        index: usize,
        source: PerturbationError,
    },

    #[error("no trajectories have been run")]
    NoResults,

    #[error("metric `{name}` series length diverges across trajectories ({expected} vs {found})")]
    RaggedSeries {
        name: String,
        expected: usize,
        found: usize,
    },
}

// ─── Configuration ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub struct SimulationConfig {
    /// Number of independent trajectories (k).
    pub trajectories: usize,
    /// Trajectory i draws from a ChaCha8 stream seeded `base_seed + i`.
    pub base_seed: u64,
    /// Record which node fell at each step, tagged primary/secondary.
    pub track_removals: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            trajectories: 100,
            base_seed: 0,
            track_removals: false,
        }
    }
}

// ─── Simulation ──────────────────────────────────────────────────────────────

pub struct Simulation {
    config: SimulationConfig,
    results: Vec<TrajectoryResult>,
}

impl Simulation {
    pub fn new(config: SimulationConfig) -> Self {
        Self {
            config,
            results: Vec::new(),
        }
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Execute all trajectories. The input graph is never mutated; setup runs
    /// once against a private template whose labels and partition every copy
    /// inherits.
    pub fn run(
        &mut self,
        graph: &DependencyGraph,
        strategy: &dyn AttackStrategy,
        provider: &dyn MetricProvider,
    ) -> Result<(), SimulationError> {
        let mut template = graph.clone();
        let plan = strategy.setup(&mut template)?;

        let outcomes: Vec<Result<TrajectoryResult, PerturbationError>> = (0..self
            .config
            .trajectories)
            .into_par_iter()
            .map(|i| {
                let seed = self.config.base_seed.wrapping_add(i as u64);
                let mut perturbation = Perturbation::from_parts(
                    template.clone(),
                    plan.clone(),
                    seed,
                    self.config.track_removals,
                );
                perturbation.run(provider)
            })
            .collect();

        let mut results = Vec::with_capacity(outcomes.len());
        for (index, outcome) in outcomes.into_iter().enumerate() {
            match outcome {
                Ok(result) => results.push(result),
                Err(source) => return Err(SimulationError::TrajectoryFailed { index, source }),
            }
        }
        self.results = results;
        Ok(())
    }

    /// Finished per-trajectory results, in trajectory order.
    pub fn results(&self) -> &[TrajectoryResult] {
        &self.results
    }

    /// Elementwise average of every metric's series across all trajectories.
    /// All series are verified to have equal length before any averaging; a
    /// ragged batch is reported loudly rather than partially averaged.
    pub fn averaged(&self) -> Result<MetricEvolution, SimulationError> {
        let first = self.results.first().ok_or(SimulationError::NoResults)?;
        let names = first.evolution.names.clone();
        let len = first.evolution.len();

        for result in &self.results {
            for (name, row) in result
                .evolution
                .names
                .iter()
                .zip(result.evolution.series.iter())
            {
                if row.len() != len {
                    return Err(SimulationError::RaggedSeries {
                        name: name.clone(),
                        expected: len,
                        found: row.len(),
                    });
                }
            }
        }

        let k = self.results.len() as f64;
        let series: Vec<Vec<f64>> = (0..names.len())
            .map(|metric_idx| {
                (0..len)
                    .map(|i| {
                        self.results
                            .iter()
                            .map(|r| r.evolution.series[metric_idx][i])
                            .sum::<f64>()
                            / k
                    })
                    .collect()
            })
            .collect();

        Ok(MetricEvolution { names, series })
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::StructuralMetrics;
    use crate::strategy::{Random, Sequential, SortBy, ThreatenedSpecies};

    fn web() -> DependencyGraph {
        DependencyGraph::from_edges([
            ("Algae", "Daphnia"),
            ("Algae", "Snail"),
            ("Daphnia", "Perch"),
            ("Snail", "Perch"),
            ("Perch", "Heron"),
            ("Detritus", "Snail"),
        ])
    }

    #[test]
    fn every_trajectory_reports_initial_size_entries() {
        let graph = web();
        let initial = graph.size();
        let mut sim = Simulation::new(SimulationConfig {
            trajectories: 8,
            base_seed: 5,
            track_removals: false,
        });
        sim.run(&graph, &Random, &StructuralMetrics).unwrap();

        assert_eq!(sim.results().len(), 8);
        for result in sim.results() {
            assert_eq!(result.initial_size, initial);
            for row in &result.evolution.series {
                assert_eq!(row.len(), initial);
            }
        }
        let averaged = sim.averaged().unwrap();
        assert_eq!(averaged.len(), initial);
    }

    #[test]
    fn averaging_identical_trajectories_reproduces_them() {
        // Sequential is deterministic, so all k trajectories are identical
        // and the average must equal any single one exactly.
        let graph = web();
        let mut sim = Simulation::new(SimulationConfig {
            trajectories: 5,
            base_seed: 0,
            track_removals: false,
        });
        sim.run(&graph, &Sequential::new(SortBy::OutDegree), &StructuralMetrics)
            .unwrap();

        let averaged = sim.averaged().unwrap();
        let single = &sim.results()[0].evolution;
        for (avg_row, single_row) in averaged.series.iter().zip(single.series.iter()) {
            for (a, s) in avg_row.iter().zip(single_row.iter()) {
                assert!((a - s).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn same_base_seed_reproduces_the_batch() {
        let graph = web();
        let run = || {
            let mut sim = Simulation::new(SimulationConfig {
                trajectories: 6,
                base_seed: 1234,
                track_removals: false,
            });
            sim.run(&graph, &Random, &StructuralMetrics).unwrap();
            sim.averaged().unwrap()
        };
        assert_eq!(run().series, run().series);
    }

    #[test]
    fn distinct_seeds_decorrelate_trajectories() {
        let graph = web();
        let mut sim = Simulation::new(SimulationConfig {
            trajectories: 16,
            base_seed: 0,
            track_removals: true,
        });
        sim.run(&graph, &Random, &StructuralMetrics).unwrap();

        // With uniform random selection over 6 nodes, 16 trajectories all
        // opening with the same victim would mean correlated streams.
        let first_victims: Vec<&str> = sim
            .results()
            .iter()
            .map(|r| r.removals[0].name.as_str())
            .collect();
        assert!(first_victims.iter().any(|v| *v != first_victims[0]));
    }

    #[test]
    fn unimplemented_strategy_fails_the_batch() {
        let graph = web();
        let mut sim = Simulation::new(SimulationConfig {
            trajectories: 3,
            base_seed: 0,
            track_removals: false,
        });
        let err = sim
            .run(&graph, &ThreatenedSpecies::default(), &StructuralMetrics)
            .unwrap_err();
        assert!(matches!(err, SimulationError::Setup(_)));
        assert!(matches!(sim.averaged(), Err(SimulationError::NoResults)));
    }

    #[test]
    fn failing_trajectory_fails_the_batch_with_its_index() {
        // A queue covering only one node strands the rest of the graph, so
        // every trajectory hits bucket exhaustion; the batch must surface
        // the first failing index instead of averaging survivors.
        struct TruncatedQueue;
        impl crate::strategy::AttackStrategy for TruncatedQueue {
            fn name(&self) -> &'static str {
                "truncated_queue"
            }
            fn setup(
                &self,
                graph: &mut DependencyGraph,
            ) -> Result<crate::strategy::SelectionPlan, StrategyError> {
                let first = graph.node_ids().next().into_iter().collect();
                Ok(crate::strategy::SelectionPlan::Queue(first))
            }
        }

        // Two disjoint self-sustaining pairs: removing one pair's member
        // leaves the other pair alive with the queue already drained.
        let graph = DependencyGraph::from_edges([
            ("A", "B"),
            ("B", "A"),
            ("C", "D"),
            ("D", "C"),
        ]);
        let mut sim = Simulation::new(SimulationConfig {
            trajectories: 2,
            base_seed: 0,
            track_removals: false,
        });
        let err = sim
            .run(&graph, &TruncatedQueue, &StructuralMetrics)
            .unwrap_err();
        assert!(matches!(
            err,
            SimulationError::TrajectoryFailed { index: 0, .. }
        ));
        assert!(sim.results().is_empty());
    }

    #[test]
    fn single_node_random_batch() {
        let mut graph = DependencyGraph::new();
        graph.intern("Loner");
        let mut sim = Simulation::new(SimulationConfig {
            trajectories: 4,
            base_seed: 9,
            track_removals: true,
        });
        sim.run(&graph, &Random, &StructuralMetrics).unwrap();

        for result in sim.results() {
            assert_eq!(result.steps, 1);
            assert_eq!(result.removals.len(), 1);
            assert_eq!(result.removals[0].kind, crate::types::RemovalKind::Primary);
        }
        assert_eq!(sim.averaged().unwrap().len(), 1);
    }
}
