/*!
# Balanced K-Medoids Graph Partitioner

Splits a `DistributedGraph<T>` into `P` roughly-equal-capacity partitions
while keeping intra-partition similarity high. Each refinement iteration is
three steps: (1) score every node against every current medoid and assign it
to the partition with the best capacity-weighted score, (2) shuffle nodes
into their assigned partitions, (3) recompute each partition's medoid as the
graph-theoretic center (minimum-eccentricity node of the largest strongly
connected component) of that partition's local subgraph.
*/

use crate::core::distributed::DistributedGraph;
use crate::core::error::{KnnMeshError, Result};
use crate::core::partitioned::Partitioned;
use crate::core::similarity::Similarity;
use crate::core::types::{NeighborList, Node, NodeId};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::sync::Arc;
use tracing::{debug, warn};

/// Validated configuration for the balanced k-medoids partitioner.
#[derive(Debug, Clone)]
pub struct PartitionerConfig {
    partitions: u32,
    iterations: u32,
    imbalance: f64,
    seed: Option<u64>,
}

impl PartitionerConfig {
    /// Rejects `partitions == 0` and `imbalance < 1.0` at construction time,
    /// per the capacity-constraint invariant: a partition cannot be asked to
    /// hold fewer nodes than an even split, only more.
    pub fn try_new(partitions: u32, iterations: u32, imbalance: f64, seed: Option<u64>) -> Result<Self> {
        if partitions == 0 {
            return Err(KnnMeshError::configuration(
                "partitions",
                "must be greater than zero",
            ));
        }
        if imbalance < 1.0 {
            return Err(KnnMeshError::configuration(
                "imbalance",
                "must be at least 1.0",
            ));
        }
        Ok(PartitionerConfig {
            partitions,
            iterations,
            imbalance,
            seed,
        })
    }

    pub fn partitions(&self) -> u32 {
        self.partitions
    }
}

impl Default for PartitionerConfig {
    fn default() -> Self {
        PartitionerConfig::try_new(8, 5, 1.05, None).expect("defaults are always valid")
    }
}

pub struct BalancedKMedoidsPartitioner<T> {
    config: PartitionerConfig,
    similarity: Arc<dyn Similarity<T>>,
}

impl<T> BalancedKMedoidsPartitioner<T>
where
    T: Clone + Send + Sync,
{
    pub fn new(config: PartitionerConfig, similarity: Arc<dyn Similarity<T>>) -> Self {
        BalancedKMedoidsPartitioner { config, similarity }
    }

    /// Runs the configured number of refinement iterations over `graph`,
    /// returning a repartitioned `DistributedGraph` with updated
    /// `Node::partition` tags.
    pub fn partition(&self, graph: DistributedGraph<T>) -> DistributedGraph<T> {
        let p = self.config.partitions as usize;
        let table = graph.to_edge_table();
        if table.shards().iter().all(|shard| shard.is_empty()) {
            return DistributedGraph::from_edge_table(graph.similarity(), table, p);
        }

        let mut rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        let mut ids: Vec<NodeId> = table.shards().iter().flatten().map(|(n, _)| n.id).collect();
        ids.shuffle(&mut rng);
        let mut medoids: Vec<NodeId> = ids.into_iter().take(p).collect();
        while medoids.len() < p {
            medoids.push(medoids[0]);
        }

        let mut current = table;
        for iteration in 0..self.config.iterations.max(1) {
            let assigned = self.assign_map_per_shard(&current, &medoids);

            let dg = DistributedGraph::from_edge_table(
                Arc::clone(&self.similarity) as Arc<dyn Similarity<T>>,
                assigned,
                p,
            );
            let subgraphs = dg.to_subgraphs();
            medoids = subgraphs
                .iter()
                .enumerate()
                .map(|(idx, g)| {
                    let components = g.strongly_connected_components();
                    components
                        .first()
                        .and_then(|largest| g.medoid(largest))
                        .unwrap_or_else(|| {
                            warn!(partition = idx, "no medoid found; keeping previous medoid");
                            medoids[idx]
                        })
                })
                .collect();
            debug!(iteration, ?medoids, "k-medoids refinement iteration complete");
            current = dg.to_edge_table();
        }

        DistributedGraph::from_edge_table(graph.similarity(), current, p)
    }

    /// The assignment map-per-shard step (spec §4.D step 1): each input
    /// shard is scored and tagged independently via `Partitioned::map_partitions`
    /// — its own capacity `C = ceil(alpha * n_shard / P)` and its own `used[]`
    /// counters, with no coordination across shards. `value[p] = similarity[p]
    /// * (1 - used[p]/C)`; each tuple is assigned to `argmax(value)` among
    /// partitions still under `C`, breaking ties toward the first-scored
    /// partition (lowest index) in arrival order.
    fn assign_map_per_shard(
        &self,
        table: &Partitioned<(Node<T>, NeighborList)>,
        medoids: &[NodeId],
    ) -> Partitioned<(Node<T>, NeighborList)> {
        let p = medoids.len();
        let imbalance = self.config.imbalance;
        let similarity = &self.similarity;
        let medoid_values: Vec<(NodeId, T)> = table
            .shards()
            .iter()
            .flatten()
            .filter(|(n, _)| medoids.contains(&n.id))
            .map(|(n, _)| (n.id, n.value.clone()))
            .collect();

        table.map_partitions(|shard| {
            let n_shard = shard.len();
            let capacity = ((imbalance * n_shard as f64) / p as f64).ceil().max(1.0) as usize;
            let mut used = vec![0usize; p];

            shard
                .iter()
                .cloned()
                .map(|(mut node, list)| {
                    let mut best: Option<(f64, usize)> = None;
                    for (p_idx, medoid_id) in medoids.iter().enumerate() {
                        if used[p_idx] >= capacity {
                            continue;
                        }
                        let medoid_value = medoid_values
                            .iter()
                            .find(|(id, _)| id == medoid_id)
                            .map(|(_, v)| v)
                            .unwrap_or(&node.value);
                        let sim = similarity.score(&node.value, medoid_value);
                        let fill_ratio = used[p_idx] as f64 / capacity as f64;
                        let value = sim * (1.0 - fill_ratio);
                        match best {
                            Some((best_value, _)) if value <= best_value => {}
                            _ => best = Some((value, p_idx)),
                        }
                    }
                    let chosen = best.map(|(_, idx)| idx).unwrap_or(0);
                    used[chosen] += 1;
                    node.partition = Some(chosen as u32);
                    (node, list)
                })
                .collect()
        })
    }
}
