//! Max-flow / min-cut on a pixel graph (Dinic, iterative)

use std::collections::VecDeque;

const FLOW_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy)]
struct Edge {
    to: usize,
    cap: f64,
}

/// Flow network with a dedicated source and sink
///
/// Edges are stored in pairs so `e ^ 1` is always the residual partner of `e`.
#[derive(Debug)]
pub struct FlowGraph {
    edges: Vec<Edge>,
    adjacency: Vec<Vec<usize>>,
    source: usize,
    sink: usize,
}

impl FlowGraph {
    /// Graph with `nodes` inner nodes plus source and sink
    #[must_use]
    pub fn new(nodes: usize) -> Self {
        Self {
            edges: Vec::with_capacity(nodes * 12),
            adjacency: vec![Vec::new(); nodes + 2],
            source: nodes,
            sink: nodes + 1,
        }
    }

    fn add_pair(&mut self, from: usize, to: usize, cap: f64, reverse_cap: f64) {
        let id = self.edges.len();
        self.edges.push(Edge { to, cap });
        self.edges.push(Edge { to: from, cap: reverse_cap });
        self.adjacency[from].push(id);
        self.adjacency[to].push(id + 1);
    }

    /// Terminal capacities of a node
    ///
    /// Only the difference between the two matters for the cut, so the
    /// smaller one is subtracted from both and negative inputs are fine.
    pub fn add_terminal_weights(&mut self, node: usize, source_cap: f64, sink_cap: f64) {
        let shift = source_cap.min(sink_cap);
        let (s, t) = (source_cap - shift, sink_cap - shift);
        if s > 0.0 {
            self.add_pair(self.source, node, s, 0.0);
        }
        if t > 0.0 {
            self.add_pair(node, self.sink, t, 0.0);
        }
    }

    /// Undirected neighbour link
    pub fn add_edge(&mut self, a: usize, b: usize, weight: f64) {
        if weight > 0.0 {
            self.add_pair(a, b, weight, weight);
        }
    }

    fn build_levels(&self, level: &mut [usize]) -> bool {
        level.fill(usize::MAX);
        level[self.source] = 0;
        let mut queue = VecDeque::from([self.source]);
        while let Some(v) = queue.pop_front() {
            for &e in &self.adjacency[v] {
                let edge = self.edges[e];
                if edge.cap > FLOW_EPSILON && level[edge.to] == usize::MAX {
                    level[edge.to] = level[v] + 1;
                    queue.push_back(edge.to);
                }
            }
        }
        level[self.sink] != usize::MAX
    }

    fn blocking_flow(&mut self, level: &mut [usize], next: &mut [usize]) -> f64 {
        let mut total = 0.0;
        let mut path: Vec<usize> = Vec::new();
        let mut v = self.source;

        loop {
            if v == self.sink {
                let pushed = path.iter().map(|&e| self.edges[e].cap).fold(f64::INFINITY, f64::min);
                for &e in &path {
                    self.edges[e].cap -= pushed;
                    self.edges[e ^ 1].cap += pushed;
                }
                total += pushed;
                path.clear();
                v = self.source;
                continue;
            }

            let mut advanced = false;
            while next[v] < self.adjacency[v].len() {
                let e = self.adjacency[v][next[v]];
                let edge = self.edges[e];
                if edge.cap > FLOW_EPSILON && level[edge.to] == level[v] + 1 {
                    path.push(e);
                    v = edge.to;
                    advanced = true;
                    break;
                }
                next[v] += 1;
            }
            if advanced {
                continue;
            }

            if v == self.source {
                return total;
            }
            level[v] = usize::MAX;
            if let Some(e) = path.pop() {
                v = self.edges[e ^ 1].to;
                next[v] += 1;
            }
        }
    }

    /// Run max-flow; returns the flow value
    pub fn max_flow(&mut self) -> f64 {
        let nodes = self.adjacency.len();
        let mut level = vec![usize::MAX; nodes];
        let mut next = vec![0usize; nodes];
        let mut flow = 0.0;
        while self.build_levels(&mut level) {
            next.fill(0);
            flow += self.blocking_flow(&mut level, &mut next);
        }
        flow
    }

    /// Inner nodes still reachable from the source after [`FlowGraph::max_flow`]
    #[must_use]
    pub fn source_side(&self) -> Vec<bool> {
        let mut seen = vec![false; self.adjacency.len()];
        seen[self.source] = true;
        let mut queue = VecDeque::from([self.source]);
        while let Some(v) = queue.pop_front() {
            for &e in &self.adjacency[v] {
                let edge = self.edges[e];
                if edge.cap > FLOW_EPSILON && !seen[edge.to] {
                    seen[edge.to] = true;
                    queue.push_back(edge.to);
                }
            }
        }
        seen.truncate(self.source);
        seen
    }
}
