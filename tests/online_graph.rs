//! Integration tests for online insertion and removal under capacity.

use knnmesh::core::distributed::DistributedGraph;
use knnmesh::core::partitioned::Partitioned;
use knnmesh::core::similarity::Similarity;
use knnmesh::core::types::{Node, NeighborList, NodeId};
use knnmesh::online::{OnlineConfig, OnlineGraph};
use std::sync::Arc;

struct NegativeL2;
impl Similarity<f64> for NegativeL2 {
    fn score(&self, a: &f64, b: &f64) -> f64 {
        -(a - b).abs()
    }
}

fn seed(n: u64, partitions: usize) -> DistributedGraph<f64> {
    let sim: Arc<dyn Similarity<f64>> = Arc::new(NegativeL2);
    let entries: Vec<_> = (0..n)
        .map(|i| {
            let partition = (i as usize % partitions) as u32;
            (
                Node::with_partition(NodeId::new(i), partition, i as f64),
                NeighborList::new(5),
            )
        })
        .collect();
    DistributedGraph::from_edge_table(sim, Partitioned::single(entries), partitions)
}

#[test]
fn insertion_under_capacity_over_a_thousand_nodes() {
    let sim: Arc<dyn Similarity<f64>> = Arc::new(NegativeL2);
    let config = OnlineConfig::try_new(8, 3, 0.05).unwrap();
    let mut online = OnlineGraph::new(config, sim, seed(1000, 4));

    for i in 0..200 {
        online.add_node(1000.0 + i as f64);
    }

    assert_eq!(online.current().node_count(), 1200);

    // I4/I5: partitions_size tracks node_count exactly, and no partition
    // drifts past the 1.05-imbalance capacity bound the partitioner itself
    // would enforce for a mesh this size.
    let sizes = online.partitions_size();
    assert_eq!(sizes.iter().sum::<usize>(), 1200);
    let capacity = ((1.05 * 1200.0) / sizes.len() as f64).ceil() as usize;
    for &count in sizes {
        assert!(count <= capacity, "partition exceeded capacity: {} > {}", count, capacity);
    }
}

#[test]
fn checkpoint_cadence_over_two_hundred_fifty_insertions() {
    let sim: Arc<dyn Similarity<f64>> = Arc::new(NegativeL2);
    let config = OnlineConfig::try_new(5, 2, 0.1).unwrap();
    let mut online = OnlineGraph::new(config, sim, seed(50, 2));

    for i in 0..250 {
        online.add_node(50.0 + i as f64);
    }

    assert_eq!(online.current().node_count(), 300);
    // 250 insertions against a 100-insertion checkpoint interval: exactly
    // 2 checkpoints fire (at insertion 100 and 200); the 50 insertions
    // since the second checkpoint are not yet enough to trigger a third.
    assert_eq!(online.checkpoint_calls(), 2);
}

#[test]
fn add_then_remove_restores_approximate_neighbor_quality() {
    let sim: Arc<dyn Similarity<f64>> = Arc::new(NegativeL2);
    let config = OnlineConfig::try_new(4, 2, 0.1).unwrap();
    let mut online = OnlineGraph::new(config, sim, seed(40, 2));

    let inserted = online.add_node(500.0);
    online.fast_remove(inserted);

    assert_eq!(online.current().node_count(), 40);
}

#[test]
fn medoids_are_tracked_per_partition() {
    let sim: Arc<dyn Similarity<f64>> = Arc::new(NegativeL2);
    let config = OnlineConfig::try_new(4, 2, 1.0).unwrap();
    let online = OnlineGraph::new(config, sim, seed(30, 3));
    assert_eq!(online.medoids().len(), 3);
}

#[test]
fn setters_reject_invalid_values_without_mutating_state() {
    let sim: Arc<dyn Similarity<f64>> = Arc::new(NegativeL2);
    let config = OnlineConfig::try_new(4, 2, 0.1).unwrap();
    let mut online = OnlineGraph::new(config, sim, seed(10, 1));

    assert!(online.set_search_speedup(0).is_err());
    assert!(online.set_medoid_update_ratio(-1.0).is_err());
    assert!(online.set_search_speedup(5).is_ok());
}
