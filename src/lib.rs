// Foodweb Robustness Engine
//
// Monte Carlo perturbation engine for directed trophic dependency networks:
// remove nodes according to an attack strategy, cascade the extinctions, and
// record how structural metrics decay as the web collapses.

pub mod export;
pub mod graph;
pub mod metrics;
pub mod perturbation;
pub mod simulation;
pub mod strategy;
pub mod types;

pub use graph::{BucketPartition, DependencyGraph, SelectionError};
pub use metrics::{MetricProvider, StructuralMetrics};
pub use perturbation::{Perturbation, PerturbationError};
pub use simulation::{Simulation, SimulationConfig, SimulationError};
pub use strategy::{
    AttackStrategy, Random, SelectionPlan, Sequential, SortBy, StrategyError,
    ThreatenedHabitats, ThreatenedSpecies, BASAL_BUCKET,
};
pub use types::{
    MetricEvolution, NodeAttrs, NodeId, RemovalKind, RemovalRecord, TrajectoryResult,
};
