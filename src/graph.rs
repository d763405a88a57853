// Foodweb Robustness Engine - Dependency Graph
//
// Directed graph where an edge u -> v encodes "v depends on u" (the consumer
// v relies on the resource u). Owns the bucket partition used for weighted
// victim selection and implements the cascading secondary-extinction removal.

use std::collections::{BTreeSet, HashMap};

use rand::Rng;
use rand_chacha::ChaCha8Rng;

use crate::types::{NodeAttrs, NodeId};

// ─── Errors ──────────────────────────────────────────────────────────────────

/// Errors from bucket installation and weighted node selection.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SelectionError {
    #[error("invalid bucket partition: {0}")]
    InvalidPartition(String),

    #[error("bucket partition exhausted with {remaining} nodes still present")]
    BucketExhaustion { remaining: usize },
}

// ─── Bucket partition ────────────────────────────────────────────────────────

/// Weights below this are treated as zero mass when renormalizing.
const WEIGHT_EPSILON: f64 = 1e-12;

/// Ordered mapping bucket-label -> probability weight. Order is the
/// installation order, which keeps sampling deterministic for a given RNG
/// stream.
#[derive(Debug, Clone, Default)]
pub struct BucketPartition {
    entries: Vec<(String, f64)>,
}

impl BucketPartition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, label: impl Into<String>, weight: f64) {
        self.entries.push((label.into(), weight));
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn weight(&self, label: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, w)| *w)
    }

    pub fn contains(&self, label: &str) -> bool {
        self.entries.iter().any(|(l, _)| l == label)
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(l, _)| l.as_str())
    }

    pub fn total_weight(&self) -> f64 {
        self.entries.iter().map(|(_, w)| w).sum()
    }

    fn remove(&mut self, label: &str) {
        self.entries.retain(|(l, _)| l != label);
    }

    /// Rescale the remaining weights to sum to 1. When the surviving mass is
    /// effectively zero (only sentinel zero-weight buckets left, e.g. the
    /// basal bucket at the tail of a habitat scenario) the partition falls
    /// back to a uniform distribution so the trajectory can still drain the
    /// remaining nodes.
    fn renormalize(&mut self) {
        if self.entries.is_empty() {
            return;
        }
        let total = self.total_weight();
        if total <= WEIGHT_EPSILON {
            let uniform = 1.0 / self.entries.len() as f64;
            for (_, w) in self.entries.iter_mut() {
                *w = uniform;
            }
        } else {
            for (_, w) in self.entries.iter_mut() {
                *w /= total;
            }
        }
    }

    /// Sample a label with probability proportional to its weight via a
    /// cumulative scan. Zero-weight buckets occupy no measure and are never
    /// drawn while any positive-weight bucket survives.
    fn sample(&self, rng: &mut ChaCha8Rng) -> Option<&str> {
        if self.entries.is_empty() {
            return None;
        }
        let total = self.total_weight();
        if total <= WEIGHT_EPSILON {
            let idx = rng.gen_range(0..self.entries.len());
            return Some(self.entries[idx].0.as_str());
        }
        let r: f64 = rng.gen::<f64>() * total;
        let mut acc = 0.0;
        for (label, w) in &self.entries {
            acc += w;
            if r < acc {
                return Some(label.as_str());
            }
        }
        // Rounding can push the scan past the last bucket.
        self.entries.last().map(|(l, _)| l.as_str())
    }
}

// ─── DependencyGraph ─────────────────────────────────────────────────────────

/// Mutable directed dependency graph over an index arena. Cloning produces a
/// fully independent deep copy suitable for an isolated trajectory.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    names: Vec<String>,
    index: HashMap<String, NodeId>,
    attrs: Vec<NodeAttrs>,
    succ: Vec<BTreeSet<NodeId>>,
    pred: Vec<BTreeSet<NodeId>>,
    alive: Vec<bool>,
    alive_count: usize,
    buckets: BucketPartition,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from `(resource, consumer)` pairs, creating nodes on
    /// first mention. Duplicate edges collapse; duplicate names reuse the
    /// existing node.
    pub fn from_edges<I, S>(edges: I) -> Self
    where
        I: IntoIterator<Item = (S, S)>,
        S: AsRef<str>,
    {
        let mut g = Self::new();
        for (resource, consumer) in edges {
            let u = g.intern(resource.as_ref());
            let v = g.intern(consumer.as_ref());
            g.add_edge(u, v);
        }
        g
    }

    /// Insert a node by name, or return the existing id.
    pub fn intern(&mut self, name: &str) -> NodeId {
        if let Some(&id) = self.index.get(name) {
            return id;
        }
        let id = self.names.len() as NodeId;
        self.names.push(name.to_string());
        self.index.insert(name.to_string(), id);
        self.attrs.push(NodeAttrs::default());
        self.succ.push(BTreeSet::new());
        self.pred.push(BTreeSet::new());
        self.alive.push(true);
        self.alive_count += 1;
        id
    }

    /// Add the dependency edge `resource -> consumer`.
    pub fn add_edge(&mut self, resource: NodeId, consumer: NodeId) {
        self.succ[resource as usize].insert(consumer);
        self.pred[consumer as usize].insert(resource);
    }

    pub fn id_of(&self, name: &str) -> Option<NodeId> {
        self.index.get(name).copied().filter(|&id| self.is_alive(id))
    }

    pub fn name(&self, id: NodeId) -> &str {
        &self.names[id as usize]
    }

    pub fn is_alive(&self, id: NodeId) -> bool {
        self.alive
            .get(id as usize)
            .copied()
            .unwrap_or(false)
    }

    /// Current node count.
    pub fn size(&self) -> usize {
        self.alive_count
    }

    pub fn is_empty(&self) -> bool {
        self.alive_count == 0
    }

    /// Ids of all surviving nodes in ascending order.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.alive
            .iter()
            .enumerate()
            .filter(|(_, &a)| a)
            .map(|(i, _)| i as NodeId)
    }

    pub fn successors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.succ[id as usize].iter().copied()
    }

    pub fn predecessors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.pred[id as usize].iter().copied()
    }

    pub fn in_degree(&self, id: NodeId) -> usize {
        self.pred[id as usize].len()
    }

    pub fn out_degree(&self, id: NodeId) -> usize {
        self.succ[id as usize].len()
    }

    /// Total incident edge endpoints; a self-loop contributes to both sides.
    pub fn degree(&self, id: NodeId) -> usize {
        self.in_degree(id) + self.out_degree(id)
    }

    pub fn has_edge(&self, u: NodeId, v: NodeId) -> bool {
        self.succ[u as usize].contains(&v)
    }

    /// Surviving edge count, self-loops included.
    pub fn edge_count(&self) -> usize {
        self.node_ids().map(|id| self.out_degree(id)).sum()
    }

    pub fn attrs(&self, id: NodeId) -> &NodeAttrs {
        &self.attrs[id as usize]
    }

    pub fn attrs_mut(&mut self, id: NodeId) -> &mut NodeAttrs {
        &mut self.attrs[id as usize]
    }

    pub fn set_bucket_label(&mut self, id: NodeId, label: impl Into<String>) {
        self.attrs[id as usize].bucket = Some(label.into());
    }

    // ─── Bucket installation and selection ───────────────────────────────────

    /// Install the bucket partition computed by the active strategy. The
    /// strategy must already have written a bucket label onto every node.
    pub fn set_buckets(&mut self, partition: BucketPartition) -> Result<(), SelectionError> {
        if partition.is_empty() && !self.is_empty() {
            return Err(SelectionError::InvalidPartition(
                "empty partition over a non-empty graph".into(),
            ));
        }
        for (label, weight) in &partition.entries {
            if !weight.is_finite() || *weight < 0.0 {
                return Err(SelectionError::InvalidPartition(format!(
                    "bucket `{label}` has weight {weight}"
                )));
            }
        }
        for id in self.node_ids() {
            match &self.attrs[id as usize].bucket {
                Some(label) if partition.contains(label) => {}
                Some(label) => {
                    return Err(SelectionError::InvalidPartition(format!(
                        "node `{}` carries label `{label}` absent from the partition",
                        self.names[id as usize]
                    )));
                }
                None => {
                    return Err(SelectionError::InvalidPartition(format!(
                        "node `{}` has no bucket label",
                        self.names[id as usize]
                    )));
                }
            }
        }
        self.buckets = partition;
        Ok(())
    }

    pub fn buckets(&self) -> &BucketPartition {
        &self.buckets
    }

    /// Sample a bucket by weight, then a node uniformly within it. Buckets
    /// emptied by earlier removals are deleted and the remaining weights
    /// renormalized before retrying; the loop is bounded because every retry
    /// removes one bucket. An exhausted partition over a non-empty graph is
    /// fatal to the trajectory.
    pub fn choose_node(&mut self, rng: &mut ChaCha8Rng) -> Result<NodeId, SelectionError> {
        loop {
            let label = match self.buckets.sample(rng) {
                Some(l) => l.to_string(),
                None => {
                    return Err(SelectionError::BucketExhaustion {
                        remaining: self.alive_count,
                    })
                }
            };
            let eligible: Vec<NodeId> = self
                .node_ids()
                .filter(|&id| self.attrs[id as usize].bucket.as_deref() == Some(label.as_str()))
                .collect();
            if eligible.is_empty() {
                self.buckets.remove(&label);
                self.buckets.renormalize();
                continue;
            }
            let idx = rng.gen_range(0..eligible.len());
            return Ok(eligible[idx]);
        }
    }

    // ─── Cascading removal ───────────────────────────────────────────────────

    /// Remove `node` and every dependent stranded by its loss, wave by wave.
    ///
    /// A frontier node goes down when it has no inbound edge left, when it is
    /// fully isolated, or when its only inbound edge is a self-loop (a node
    /// whose sole remaining resource is itself has none). Each wave is
    /// rescanned until a pass removes nothing, since one removal can qualify
    /// a sibling in the same wave. Returns the secondary casualties in
    /// removal order, excluding `node` itself. Removing a node that is
    /// already gone (e.g. taken by an earlier cascade) is a no-op.
    pub fn remove_node_and_dependents(&mut self, node: NodeId) -> Vec<NodeId> {
        if !self.is_alive(node) {
            return Vec::new();
        }
        let mut frontier: BTreeSet<NodeId> = self.succ[node as usize].clone();
        frontier.remove(&node); // self-loop on the victim is not a dependent
        self.remove_node(node);

        let mut casualties = Vec::new();

        while !frontier.is_empty() {
            let mut next_wave: BTreeSet<NodeId> = BTreeSet::new();
            let mut removed: BTreeSet<NodeId> = BTreeSet::new();

            // Worst case the frontier needs |frontier| passes to settle.
            for _ in 0..frontier.len() {
                let mut changed = false;

                for n in frontier.clone() {
                    let in_deg = self.in_degree(n);
                    let lone_self_loop = in_deg == 1 && self.has_edge(n, n);
                    if in_deg == 0 || self.degree(n) == 0 || lone_self_loop {
                        next_wave.extend(self.successors(n));
                        frontier.remove(&n);
                        removed.insert(n);
                        self.remove_node(n);
                        casualties.push(n);
                        changed = true;
                    }
                }

                if !changed {
                    break;
                }
            }

            for r in &removed {
                next_wave.remove(r);
            }
            frontier = next_wave;
        }

        casualties
    }

    fn remove_node(&mut self, id: NodeId) {
        debug_assert!(self.alive[id as usize], "double removal of node {id}");
        let successors: Vec<NodeId> = self.succ[id as usize].iter().copied().collect();
        for s in successors {
            self.pred[s as usize].remove(&id);
        }
        let predecessors: Vec<NodeId> = self.pred[id as usize].iter().copied().collect();
        for p in predecessors {
            self.succ[p as usize].remove(&id);
        }
        self.succ[id as usize].clear();
        self.pred[id as usize].clear();
        self.alive[id as usize] = false;
        self.alive_count -= 1;
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
