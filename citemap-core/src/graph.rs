//! Citation graph accumulated while walking result pages.

use crate::community::Partition;
use citemap_scanner::{CitationPair, Publication};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

/// Known attributes of a publication. Every field is optional; merging
/// never lets an absent value replace a known one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublicationAttrs {
    pub title: Option<String>,
    pub url: Option<String>,
    pub authors: Option<String>,
    pub year: Option<String>,
    pub cited_by: Option<u64>,
    pub cited_by_url: Option<String>,
    pub community: Option<usize>,
}

impl PublicationAttrs {
    /// Copies every present field of `other` over `self`. Later values win.
    pub fn merge(&mut self, other: PublicationAttrs) {
        fn keep_known<T>(slot: &mut Option<T>, value: Option<T>) {
            if value.is_some() {
                *slot = value;
            }
        }

        keep_known(&mut self.title, other.title);
        keep_known(&mut self.url, other.url);
        keep_known(&mut self.authors, other.authors);
        keep_known(&mut self.year, other.year);
        keep_known(&mut self.cited_by, other.cited_by);
        keep_known(&mut self.cited_by_url, other.cited_by_url);
        keep_known(&mut self.community, other.community);
    }
}

impl From<Publication> for PublicationAttrs {
    fn from(publication: Publication) -> Self {
        Self {
            title: Some(publication.title),
            url: publication.url,
            authors: publication.authors,
            year: publication.year,
            cited_by: publication.cited_by,
            cited_by_url: publication.cited_by_url,
            community: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicationNode {
    pub id: String,
    pub attrs: PublicationAttrs,
}

impl PublicationNode {
    /// Display label: the title, or the id when no title is known yet.
    pub fn label(&self) -> &str {
        self.attrs.title.as_deref().unwrap_or(&self.id)
    }
}

/// Directed "cites" graph keyed by cluster id.
///
/// Nodes and edges keep insertion order, which is also the order used by
/// every exporter. There are no removals.
#[derive(Debug, Default, Clone)]
pub struct CitationGraph {
    graph: DiGraph<PublicationNode, ()>,
    index: HashMap<String, NodeIndex>,
}

impl CitationGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a node or merges `attrs` into the existing one.
    pub fn add_node(&mut self, id: &str, attrs: PublicationAttrs) -> NodeIndex {
        if let Some(&idx) = self.index.get(id) {
            self.graph[idx].attrs.merge(attrs);
            return idx;
        }

        let idx = self.graph.add_node(PublicationNode {
            id: id.to_string(),
            attrs,
        });
        self.index.insert(id.to_string(), idx);
        idx
    }

    /// Adds the edge `from -> to` unless it already exists. Unknown
    /// endpoints are created bare and filled in by later visits.
    /// Returns whether the edge was new.
    pub fn add_edge(&mut self, from: &str, to: &str) -> bool {
        let source = self.add_node(from, PublicationAttrs::default());
        let target = self.add_node(to, PublicationAttrs::default());

        if self.graph.contains_edge(source, target) {
            return false;
        }
        if source == target {
            debug!("Recording self-citation on {}", from);
        }
        self.graph.add_edge(source, target, ());
        true
    }

    /// Folds one walk step into the graph: the citing publication, the
    /// cited parent when there is one, and the edge between them.
    pub fn add_pair(&mut self, pair: CitationPair) {
        let from_id = pair.from.id.clone();
        self.add_node(&from_id, pair.from.into());

        if let Some(to) = pair.to {
            let to_id = to.id.clone();
            self.add_node(&to_id, to.into());
            self.add_edge(&from_id, &to_id);
        }
    }

    pub fn node(&self, id: &str) -> Option<&PublicationNode> {
        self.index.get(id).map(|&idx| &self.graph[idx])
    }

    /// Insertion position of a node.
    pub fn position(&self, id: &str) -> Option<usize> {
        self.index.get(id).map(|idx| idx.index())
    }

    pub fn contains_edge(&self, from: &str, to: &str) -> bool {
        match (self.index.get(from), self.index.get(to)) {
            (Some(&a), Some(&b)) => self.graph.contains_edge(a, b),
            _ => false,
        }
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn nodes(&self) -> impl Iterator<Item = &PublicationNode> {
        self.graph.node_weights()
    }

    /// `(citing, cited)` id pairs in insertion order.
    pub fn edges(&self) -> impl Iterator<Item = (&str, &str)> {
        self.graph.edge_references().map(|edge| {
            (
                self.graph[edge.source()].id.as_str(),
                self.graph[edge.target()].id.as_str(),
            )
        })
    }

    /// Direction-free edge list over node positions, with both directions
    /// of a mutual citation collapsed into one edge. Each pair is ordered
    /// `(low, high)`; self-loops appear as `(n, n)`.
    pub fn undirected_edges(&self) -> Vec<(usize, usize)> {
        let collapsed: BTreeSet<(usize, usize)> = self
            .graph
            .edge_references()
            .map(|edge| {
                let (a, b) = (edge.source().index(), edge.target().index());
                (a.min(b), a.max(b))
            })
            .collect();
        collapsed.into_iter().collect()
    }

    /// Stores each node's community index.
    pub fn assign_communities(&mut self, partition: &Partition) {
        for idx in self.graph.node_indices() {
            self.graph[idx].attrs.community = partition.community_of(idx.index());
        }
    }

    /// Number of distinct communities assigned so far.
    pub fn community_count(&self) -> usize {
        self.nodes()
            .filter_map(|node| node.attrs.community)
            .collect::<BTreeSet<_>>()
            .len()
    }
}
