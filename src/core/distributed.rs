/*!
# Distributed Graph Representation

A `DistributedGraph<T>` is the mesh-wide view of the k-NN graph: every node,
its assigned partition, and its `NeighborList`, spread across `P` shards. It
has two equivalent representations:

- the **edge-table view**: a flat `Partitioned<(Node<T>, NeighborList)>`,
  useful for bulk transforms (serialization, re-partitioning, merging search
  results);
- the **subgraph view**: one `core::graph::Graph<T>` per partition, useful
  for anything that walks local edges (greedy search, medoid recomputation).

The two are mutual conversions, not separate sources of truth.
*/

use crate::core::graph::Graph;
use crate::core::partitioned::Partitioned;
use crate::core::similarity::Similarity;
use crate::core::types::{Node, NeighborList, NodeId};
use std::sync::Arc;

/// One row of the edge-table view.
pub type EdgeTableEntry<T> = (Node<T>, NeighborList);

/// The mesh-wide k-NN graph, spread across `P` partitions.
pub struct DistributedGraph<T> {
    similarity: Arc<dyn Similarity<T>>,
    entries: Partitioned<EdgeTableEntry<T>>,
}

impl<T> Clone for DistributedGraph<T>
where
    T: Clone,
{
    fn clone(&self) -> Self {
        DistributedGraph {
            similarity: Arc::clone(&self.similarity),
            entries: self.entries.clone(),
        }
    }
}

impl<T> DistributedGraph<T>
where
    T: Clone + Send,
{
    pub fn new(similarity: Arc<dyn Similarity<T>>, entries: Partitioned<EdgeTableEntry<T>>) -> Self {
        DistributedGraph { similarity, entries }
    }

    pub fn similarity(&self) -> Arc<dyn Similarity<T>> {
        Arc::clone(&self.similarity)
    }

    pub fn num_partitions(&self) -> usize {
        self.entries.num_partitions()
    }

    pub fn node_count(&self) -> usize {
        self.entries.shards().iter().map(|s| s.len()).sum()
    }

    /// The edge-table view: a flat collection of `(node, neighbor list)`
    /// pairs, one per node in the mesh.
    pub fn to_edge_table(&self) -> Partitioned<EdgeTableEntry<T>> {
        self.entries.clone()
    }

    /// Rebuilds a `DistributedGraph` from an edge-table view, assuming each
    /// entry's `Node::partition` has already been assigned (e.g. by the
    /// partitioner). Entries are re-bucketed by that partition id.
    pub fn from_edge_table(
        similarity: Arc<dyn Similarity<T>>,
        table: Partitioned<EdgeTableEntry<T>>,
        num_partitions: usize,
    ) -> Self {
        let bucketed = table.partition_by(num_partitions, |(node, _)| {
            node.partition.unwrap_or(0) as usize
        });
        DistributedGraph {
            similarity,
            entries: bucketed,
        }
    }

    /// The subgraph view: one local `Graph<T>` per partition, each
    /// containing exactly the nodes assigned to that partition and their
    /// neighbor lists (which may still reference foreign `NodeId`s living in
    /// other partitions — those are not resolvable locally, by design).
    pub fn to_subgraphs(&self) -> Vec<Graph<T>> {
        self.entries
            .shards()
            .iter()
            .map(|shard| {
                let mut g = Graph::new(Arc::clone(&self.similarity));
                for (node, neighbors) in shard {
                    g.upsert(node.id, node.value.clone(), neighbors.clone());
                }
                g
            })
            .collect()
    }

    /// Rebuilds a `DistributedGraph` from per-partition subgraphs, tagging
    /// each node with its source partition index.
    pub fn from_subgraphs(similarity: Arc<dyn Similarity<T>>, subgraphs: Vec<Graph<T>>) -> Self {
        let shards: Vec<Vec<EdgeTableEntry<T>>> = subgraphs
            .into_iter()
            .enumerate()
            .map(|(partition, g)| {
                g.node_ids()
                    .map(|id| {
                        let value = g.value(id).expect("node_ids only yields resolvable ids").clone();
                        let neighbors = g.neighbors(id).cloned().unwrap_or_default();
                        (Node::with_partition(id, partition as u32, value), neighbors)
                    })
                    .collect()
            })
            .collect();
        DistributedGraph {
            similarity,
            entries: Partitioned::new(shards),
        }
    }

    /// Looks up a node's current partition assignment, if any, by scanning
    /// the edge table. Intended for tests and small meshes; production
    /// lookups should go through an `OnlineGraph`'s own index.
    pub fn partition_of(&self, id: NodeId) -> Option<u32> {
        self.entries
            .shards()
            .iter()
            .flatten()
            .find(|(node, _)| node.id == id)
            .and_then(|(node, _)| node.partition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NegativeL2;
    impl Similarity<f64> for NegativeL2 {
        fn score(&self, a: &f64, b: &f64) -> f64 {
            -(a - b).abs()
        }
    }

    fn sample() -> DistributedGraph<f64> {
        let sim: Arc<dyn Similarity<f64>> = Arc::new(NegativeL2);
        let entries = vec![
            (Node::with_partition(NodeId::new(0), 0, 1.0), NeighborList::new(2)),
            (Node::with_partition(NodeId::new(1), 0, 2.0), NeighborList::new(2)),
            (Node::with_partition(NodeId::new(2), 1, 3.0), NeighborList::new(2)),
        ];
        DistributedGraph::new(sim, Partitioned::single(entries).partition_by(2, |(n, _)| n.partition.unwrap() as usize))
    }

    #[test]
    fn edge_table_and_subgraph_views_round_trip() {
        let dg = sample();
        let table = dg.to_edge_table();
        assert_eq!(table.collect().len(), 3);

        let subgraphs = dg.to_subgraphs();
        assert_eq!(subgraphs.len(), 2);
        let total: usize = subgraphs.iter().map(|g| g.node_count()).sum();
        assert_eq!(total, 3);

        let rebuilt = DistributedGraph::from_subgraphs(dg.similarity(), subgraphs);
        assert_eq!(rebuilt.node_count(), 3);
        assert_eq!(rebuilt.partition_of(NodeId::new(2)), Some(1));
    }
}
