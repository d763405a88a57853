// Foodweb Robustness Engine - Structural Metric Provider
//
// The engine only needs "compute a snapshot of named metrics for the current
// graph"; this module supplies both the capability trait and the default
// structural provider (degrees, density, component counts, pagerank).

use std::collections::HashMap;

use crate::graph::DependencyGraph;
use crate::types::NodeId;

/// Capability the perturbation engine consumes. `compute_all` must return
/// values aligned with `metric_names`, with a stable keying across calls so
/// series can be accumulated per name.
pub trait MetricProvider: Send + Sync {
    fn metric_names(&self) -> Vec<String>;

    fn compute_all(&self, graph: &DependencyGraph) -> Vec<f64>;
}

// ─── StructuralMetrics ───────────────────────────────────────────────────────

const METRICS: &[&str] = &[
    "graph_size",
    "avg_in_degree",
    "avg_out_degree",
    "avg_total_degree",
    "density",
    "largest_wcc_size",
    "number_of_wccs",
    "largest_scc_size",
    "number_of_sccs",
    "avg_pagerank",
];

const PAGERANK_DAMPING: f64 = 0.85;
const PAGERANK_MAX_ITERATIONS: usize = 50;
const PAGERANK_TOLERANCE: f64 = 1e-8;

/// Default provider covering the registered structural metrics. Stateless;
/// safe to share read-only across trajectory workers.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuralMetrics;

impl MetricProvider for StructuralMetrics {
    fn metric_names(&self) -> Vec<String> {
        METRICS.iter().map(|m| m.to_string()).collect()
    }

    fn compute_all(&self, graph: &DependencyGraph) -> Vec<f64> {
        let view = CompactView::new(graph);
        let (wcc_count, largest_wcc) = view.weakly_connected_components();
        let (scc_count, largest_scc) = view.strongly_connected_components();
        vec![
            view.n as f64,
            view.avg_in_degree(),
            view.avg_out_degree(),
            view.avg_total_degree(),
            view.density(),
            largest_wcc as f64,
            wcc_count as f64,
            largest_scc as f64,
            scc_count as f64,
            view.avg_pagerank(),
        ]
    }
}

// ─── Compact alive-subgraph view ─────────────────────────────────────────────

/// Index-compacted adjacency over the surviving nodes, built once per
/// snapshot so the metric passes run over dense `0..n` indices.
struct CompactView {
    n: usize,
    adj: Vec<Vec<usize>>,
    in_deg: Vec<usize>,
}

impl CompactView {
    fn new(graph: &DependencyGraph) -> Self {
        let ids: Vec<NodeId> = graph.node_ids().collect();
        let n = ids.len();
        let id_to_idx: HashMap<NodeId, usize> =
            ids.iter().enumerate().map(|(i, &id)| (id, i)).collect();

        let mut adj = vec![Vec::new(); n];
        let mut in_deg = vec![0usize; n];
        for (i, &id) in ids.iter().enumerate() {
            for s in graph.successors(id) {
                let j = id_to_idx[&s];
                adj[i].push(j);
                in_deg[j] += 1;
            }
        }
        Self { n, adj, in_deg }
    }

    fn edge_count(&self) -> usize {
        self.adj.iter().map(|a| a.len()).sum()
    }

    fn avg_in_degree(&self) -> f64 {
        if self.n == 0 {
            return 0.0;
        }
        self.in_deg.iter().sum::<usize>() as f64 / self.n as f64
    }

    fn avg_out_degree(&self) -> f64 {
        if self.n == 0 {
            return 0.0;
        }
        self.edge_count() as f64 / self.n as f64
    }

    fn avg_total_degree(&self) -> f64 {
        self.avg_in_degree() + self.avg_out_degree()
    }

    /// Directed density m / (n * (n - 1)); 0 for graphs too small to have
    /// a meaningful value.
    fn density(&self) -> f64 {
        if self.n < 2 {
            return 0.0;
        }
        self.edge_count() as f64 / (self.n as f64 * (self.n as f64 - 1.0))
    }

    /// (component count, largest component size) treating edges as
    /// undirected, via union-find with path compression.
    fn weakly_connected_components(&self) -> (usize, usize) {
        if self.n == 0 {
            return (0, 0);
        }
        let mut parent: Vec<usize> = (0..self.n).collect();

        fn find(parent: &mut [usize], mut x: usize) -> usize {
            while parent[x] != x {
                parent[x] = parent[parent[x]];
                x = parent[x];
            }
            x
        }

        for u in 0..self.n {
            for &v in &self.adj[u] {
                let ru = find(&mut parent, u);
                let rv = find(&mut parent, v);
                if ru != rv {
                    parent[ru] = rv;
                }
            }
        }

        let mut sizes: HashMap<usize, usize> = HashMap::new();
        for x in 0..self.n {
            let root = find(&mut parent, x);
            *sizes.entry(root).or_default() += 1;
        }
        let largest = sizes.values().copied().max().unwrap_or(0);
        (sizes.len(), largest)
    }

    /// (component count, largest component size) via iterative Tarjan.
    fn strongly_connected_components(&self) -> (usize, usize) {
        let n = self.n;
        if n == 0 {
            return (0, 0);
        }

        let mut index_counter = 0usize;
        let mut indices = vec![usize::MAX; n];
        let mut lowlinks = vec![usize::MAX; n];
        let mut on_stack = vec![false; n];
        let mut stack: Vec<usize> = Vec::new();
        let mut comp_count = 0usize;
        let mut largest = 0usize;

        for start in 0..n {
            if indices[start] != usize::MAX {
                continue;
            }
            let mut dfs: Vec<(usize, usize)> = vec![(start, 0)];
            indices[start] = index_counter;
            lowlinks[start] = index_counter;
            index_counter += 1;
            stack.push(start);
            on_stack[start] = true;

            while let Some(&mut (v, ref mut ni)) = dfs.last_mut() {
                if *ni < self.adj[v].len() {
                    let w = self.adj[v][*ni];
                    *ni += 1;
                    if indices[w] == usize::MAX {
                        indices[w] = index_counter;
                        lowlinks[w] = index_counter;
                        index_counter += 1;
                        stack.push(w);
                        on_stack[w] = true;
                        dfs.push((w, 0));
                    } else if on_stack[w] {
                        lowlinks[v] = lowlinks[v].min(indices[w]);
                    }
                } else {
                    if lowlinks[v] == indices[v] {
                        let mut size = 0usize;
                        loop {
                            let w = stack.pop().expect("tarjan stack underflow");
                            on_stack[w] = false;
                            size += 1;
                            if w == v {
                                break;
                            }
                        }
                        comp_count += 1;
                        largest = largest.max(size);
                    }
                    let lv = lowlinks[v];
                    dfs.pop();
                    if let Some(&(parent, _)) = dfs.last() {
                        lowlinks[parent] = lowlinks[parent].min(lv);
                    }
                }
            }
        }

        (comp_count, largest)
    }

    /// Mean pagerank score (power iteration, dangling mass spread evenly).
    fn avg_pagerank(&self) -> f64 {
        let n = self.n;
        if n == 0 {
            return 0.0;
        }
        let d = PAGERANK_DAMPING;
        let base = (1.0 - d) / n as f64;
        let mut scores = vec![1.0 / n as f64; n];
        let mut next = vec![0.0f64; n];

        for _ in 0..PAGERANK_MAX_ITERATIONS {
            for s in next.iter_mut() {
                *s = base;
            }
            for u in 0..n {
                if self.adj[u].is_empty() {
                    let share = d * scores[u] / n as f64;
                    for s in next.iter_mut() {
                        *s += share;
                    }
                } else {
                    let share = d * scores[u] / self.adj[u].len() as f64;
                    for &v in &self.adj[u] {
                        next[v] += share;
                    }
                }
            }
            let diff: f64 = scores
                .iter()
                .zip(next.iter())
                .map(|(a, b)| (a - b).abs())
                .sum();
            std::mem::swap(&mut scores, &mut next);
            if diff < PAGERANK_TOLERANCE {
                break;
            }
        }

        scores.iter().sum::<f64>() / n as f64
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(graph: &DependencyGraph) -> HashMap<String, f64> {
        let provider = StructuralMetrics;
        provider
            .metric_names()
            .into_iter()
            .zip(provider.compute_all(graph))
            .collect()
    }

    #[test]
    fn names_and_values_stay_aligned() {
        let g = DependencyGraph::from_edges([("A", "B")]);
        let provider = StructuralMetrics;
        assert_eq!(provider.metric_names().len(), provider.compute_all(&g).len());
    }

    #[test]
    fn chain_metrics() {
        let g = DependencyGraph::from_edges([("A", "B"), ("B", "C"), ("C", "D")]);
        let m = snapshot(&g);

        assert_eq!(m["graph_size"], 4.0);
        assert_eq!(m["avg_in_degree"], 3.0 / 4.0);
        assert_eq!(m["avg_out_degree"], 3.0 / 4.0);
        assert_eq!(m["avg_total_degree"], 6.0 / 4.0);
        assert!((m["density"] - 3.0 / 12.0).abs() < 1e-12);
        assert_eq!(m["largest_wcc_size"], 4.0);
        assert_eq!(m["number_of_wccs"], 1.0);
        // A chain has only trivial strongly connected components.
        assert_eq!(m["largest_scc_size"], 1.0);
        assert_eq!(m["number_of_sccs"], 4.0);
    }

    #[test]
    fn two_islands_and_a_cycle() {
        let g = DependencyGraph::from_edges([
            ("A", "B"),
            ("B", "A"),
            ("C", "D"),
        ]);
        let m = snapshot(&g);

        assert_eq!(m["number_of_wccs"], 2.0);
        assert_eq!(m["largest_wcc_size"], 2.0);
        assert_eq!(m["largest_scc_size"], 2.0);
        assert_eq!(m["number_of_sccs"], 3.0);
    }

    #[test]
    fn pagerank_mass_is_conserved() {
        let g = DependencyGraph::from_edges([
            ("A", "B"),
            ("B", "C"),
            ("C", "A"),
            ("C", "D"),
        ]);
        let m = snapshot(&g);
        // Scores sum to 1, so the average is 1/n.
        assert!((m["avg_pagerank"] - 0.25).abs() < 1e-6);
    }

    #[test]
    fn single_node_graph_is_degenerate_but_defined() {
        let mut g = DependencyGraph::new();
        g.intern("Loner");
        let m = snapshot(&g);
        assert_eq!(m["graph_size"], 1.0);
        assert_eq!(m["density"], 0.0);
        assert_eq!(m["number_of_wccs"], 1.0);
        assert_eq!(m["avg_pagerank"], 1.0);
    }
}
