// src/chain/graph.rs

use petgraph::Direction;
use petgraph::graphmap::DiGraphMap;
use petgraph::visit::Dfs;

use crate::chain::ChainSpec;
use crate::work::ItemId;

/// Dependency edges between every item the scheduler knows about.
///
/// Edge direction is predecessor -> successor. Chains are acyclic by
/// construction (stages only point forward), so no cycle check is needed.
#[derive(Debug, Clone, Default)]
pub struct ChainGraph {
    graph: DiGraphMap<ItemId, ()>,
}

impl ChainGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add all items and edges of a finalized chain.
    pub fn add_chain(&mut self, spec: &ChainSpec) {
        for item in spec.items.iter() {
            self.graph.add_node(item.id);
        }
        for item in spec.items.iter() {
            for pred in item.depends_on.iter() {
                self.graph.add_edge(*pred, item.id, ());
            }
        }
    }

    /// Drop items (and their edges) from the graph.
    pub fn remove_items(&mut self, ids: &[ItemId]) {
        for id in ids {
            self.graph.remove_node(*id);
        }
    }

    /// Direct successors of `id`.
    pub fn dependents_of(&self, id: ItemId) -> Vec<ItemId> {
        self.graph
            .neighbors_directed(id, Direction::Outgoing)
            .collect()
    }

    /// Every item reachable from `id`, excluding `id` itself.
    pub fn downstream_of(&self, id: ItemId) -> Vec<ItemId> {
        if !self.graph.contains_node(id) {
            return Vec::new();
        }

        let mut out = Vec::new();
        let mut dfs = Dfs::new(&self.graph, id);
        while let Some(node) = dfs.next(&self.graph) {
            if node != id {
                out.push(node);
            }
        }
        out.sort();
        out
    }
}
