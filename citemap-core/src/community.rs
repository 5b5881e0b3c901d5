//! Greedy modularity communities (Clauset-Newman-Moore).
//!
//! Works on the undirected projection of the citation graph: direction is
//! ignored and mutual citations count as one edge. Every node starts in
//! its own community and the pair of adjacent communities with the largest
//! modularity gain is merged until no merge gains anything.
//!
//! Gains are kept per community in neighbour maps and updated
//! incrementally after each merge. Candidates live in a max-heap and are
//! checked against the maps when popped, so stale entries are skipped
//! rather than removed. Gains are integers, so equal gains compare equal
//! and the lower pair of node positions wins the tie.

use crate::graph::CitationGraph;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap};
use tracing::{debug, info};

/// Community index per node position, with communities numbered from the
/// largest down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    assignment: Vec<usize>,
    communities: Vec<Vec<usize>>,
}

impl Partition {
    /// Builds a partition from member lists. Communities are renumbered by
    /// size (largest first), ties going to the community holding the
    /// earliest inserted node.
    pub fn from_groups(node_count: usize, mut groups: Vec<Vec<usize>>) -> Self {
        groups.retain(|group| !group.is_empty());
        for group in &mut groups {
            group.sort_unstable();
        }
        groups.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a[0].cmp(&b[0])));

        let mut assignment = vec![0; node_count];
        for (community, group) in groups.iter().enumerate() {
            for &node in group {
                assignment[node] = community;
            }
        }

        Self {
            assignment,
            communities: groups,
        }
    }

    pub fn community_of(&self, node: usize) -> Option<usize> {
        self.assignment.get(node).copied()
    }

    /// Member positions of each community, in community order.
    pub fn communities(&self) -> &[Vec<usize>] {
        &self.communities
    }

    pub fn len(&self) -> usize {
        self.communities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.communities.is_empty()
    }
}

/// A possible merge of communities `pair.0 < pair.1` with gain `dq`.
///
/// Gains are modularity changes scaled by `(2m)^2`, which makes them exact
/// integers: `4m - 2 k_i k_j` for a single edge between singletons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Candidate {
    dq: i64,
    pair: (usize, usize),
}

impl Candidate {
    fn new(dq: i64, a: usize, b: usize) -> Self {
        Self {
            dq,
            pair: (a.min(b), a.max(b)),
        }
    }
}

impl Ord for Candidate {
    // Highest gain first; equal gains prefer the lower pair.
    fn cmp(&self, other: &Self) -> Ordering {
        self.dq
            .cmp(&other.dq)
            .then_with(|| other.pair.cmp(&self.pair))
    }
}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Node degrees in the undirected projection. A self-loop adds two.
fn degrees(node_count: usize, edges: &[(usize, usize)]) -> Vec<i64> {
    let mut degree = vec![0; node_count];
    for &(u, v) in edges {
        degree[u] += 1;
        degree[v] += 1;
    }
    degree
}

pub fn detect_communities(graph: &CitationGraph) -> Partition {
    let n = graph.node_count();
    let edges = graph.undirected_edges();

    if edges.is_empty() {
        debug!("No edges, every publication is its own community");
        return Partition::from_groups(n, (0..n).map(|node| vec![node]).collect());
    }

    let m = edges.len() as i64;
    // total[i]: summed degree of community i.
    let mut total = degrees(n, &edges);
    // dq[i][j]: scaled gain of merging communities i and j.
    let mut dq: Vec<BTreeMap<usize, i64>> = vec![BTreeMap::new(); n];
    let mut heap = BinaryHeap::new();

    for &(u, v) in &edges {
        if u == v {
            continue;
        }
        let gain = 4 * m - 2 * total[u] * total[v];
        dq[u].insert(v, gain);
        dq[v].insert(u, gain);
        heap.push(Candidate::new(gain, u, v));
    }

    let mut members: Vec<Vec<usize>> = (0..n).map(|node| vec![node]).collect();
    let mut alive = vec![true; n];
    let mut merges = 0usize;

    while let Some(candidate) = heap.pop() {
        let (keep, gone) = candidate.pair;
        if !alive[keep] || !alive[gone] || dq[keep].get(&gone) != Some(&candidate.dq) {
            continue;
        }
        if candidate.dq <= 0 {
            break;
        }

        // The lower id survives, so a community is always named after its
        // earliest member.
        let gone_row = std::mem::take(&mut dq[gone]);
        let keep_row = std::mem::take(&mut dq[keep]);
        let mut merged = BTreeMap::new();

        for (&k, &gain_gone) in &gone_row {
            if k == keep {
                continue;
            }
            let gain = match keep_row.get(&k) {
                Some(&gain_keep) => gain_gone + gain_keep,
                None => gain_gone - 2 * total[keep] * total[k],
            };
            merged.insert(k, gain);
        }
        for (&k, &gain_keep) in &keep_row {
            if k == gone || merged.contains_key(&k) {
                continue;
            }
            merged.insert(k, gain_keep - 2 * total[gone] * total[k]);
        }

        for (&k, &gain) in &merged {
            dq[k].remove(&gone);
            dq[k].insert(keep, gain);
            heap.push(Candidate::new(gain, keep, k));
        }
        dq[keep] = merged;

        total[keep] += total[gone];
        total[gone] = 0;
        alive[gone] = false;
        let moved = std::mem::take(&mut members[gone]);
        members[keep].extend(moved);
        merges += 1;
    }

    let partition = Partition::from_groups(n, members);
    info!(
        "Detected {} communities across {} publications ({} merges, modularity {:.4})",
        partition.len(),
        n,
        merges,
        modularity(graph, &partition)
    );
    partition
}

/// Newman modularity of `partition` over the undirected projection:
/// the sum over communities of internal edge fraction minus the squared
/// fraction of edge ends the community holds.
pub fn modularity(graph: &CitationGraph, partition: &Partition) -> f64 {
    let edges = graph.undirected_edges();
    if edges.is_empty() {
        return 0.0;
    }

    let m = edges.len() as f64;
    let degree = degrees(graph.node_count(), &edges);
    let mut internal = vec![0.0; partition.len()];
    let mut ends = vec![0.0; partition.len()];

    for &(u, v) in &edges {
        if let (Some(cu), Some(cv)) = (partition.community_of(u), partition.community_of(v))
            && cu == cv
        {
            internal[cu] += 1.0;
        }
    }
    for (node, &k) in degree.iter().enumerate() {
        if let Some(c) = partition.community_of(node) {
            ends[c] += k as f64;
        }
    }

    internal
        .iter()
        .zip(&ends)
        .map(|(l, d)| l / m - (d / (2.0 * m)).powi(2))
        .sum()
}
