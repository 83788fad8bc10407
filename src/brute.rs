/*!
# Brute-Force Baseline

Computes the exact k-NN graph in O(N^2) by comparing every node to every
other. This is a baseline only — not the approximation core, and
intentionally the simplest file in the crate. Callers who want a partitioned
mesh run `partition::BalancedKMedoidsPartitioner` on the resulting
single-partition `DistributedGraph` afterwards.
*/

use crate::core::distributed::DistributedGraph;
use crate::core::partitioned::Partitioned;
use crate::core::similarity::Similarity;
use crate::core::types::{Neighbor, NeighborList, Node, NodeId};
use rayon::prelude::*;
use std::sync::Arc;

/// Computes the exact top-`k` neighbor list for every node in `values`
/// against every other node, returning the result as a single-partition
/// `DistributedGraph`.
pub fn compute_graph<T>(values: Vec<T>, k: usize, similarity: Arc<dyn Similarity<T>>) -> DistributedGraph<T>
where
    T: Clone + Send + Sync,
{
    let nodes: Vec<(NodeId, T)> = values
        .into_iter()
        .enumerate()
        .map(|(i, v)| (NodeId::new(i as u64), v))
        .collect();

    let entries: Vec<(Node<T>, NeighborList)> = nodes
        .par_iter()
        .map(|(id, value)| {
            let mut list = NeighborList::new(k);
            for (other_id, other_value) in &nodes {
                if other_id == id {
                    continue;
                }
                let score = similarity.score(value, other_value);
                list.offer(Neighbor::new(*other_id, score));
            }
            (Node::with_partition(*id, 0, value.clone()), list)
        })
        .collect();

    DistributedGraph::new(similarity, Partitioned::single(entries))
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

    #[test]
    fn brute_force_finds_exact_nearest_neighbors() {
        let values: Vec<f64> = (0..20).map(|i| i as f64).collect();
        let sim: Arc<dyn Similarity<f64>> = Arc::new(NegativeL2);
        let dg = compute_graph(values, 3, sim);

        let table = dg.to_edge_table().collect();
        assert_eq!(table.len(), 20);

        let (_, list) = table.iter().find(|(n, _)| n.id == NodeId::new(10)).unwrap();
        let ids: Vec<u64> = list.iter().map(|n| n.node.get()).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        // distances to 10: 9->1, 11->1, 8->2, 12->2; ties break toward the lower node id, so 8 beats 12.
        assert_eq!(sorted, vec![8, 9, 11]);
    }
}
