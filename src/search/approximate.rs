/*!
# Partitioned Greedy Graph Search

`ApproximateSearch` runs a bounded greedy walk independently on every
partition's local subgraph, then merges the per-partition candidate lists
into a single top-k result. Partitions are searched in parallel (a
`map_partitions` over the subgraph view); merging happens once all shards
have returned, since the final top-k genuinely needs every shard's
candidates together.
*/

use crate::core::distributed::DistributedGraph;
use crate::core::graph::Graph;
use crate::core::types::{Neighbor, NeighborList};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rayon::prelude::*;

/// Searches every partition of a `DistributedGraph<T>` for the nodes most
/// similar to a query value, merging per-partition results into one ranked
/// list of size `k`.
pub struct ApproximateSearch<T> {
    subgraphs: Vec<Graph<T>>,
    k: usize,
    expansion: usize,
    depth: usize,
    similarity_budget: usize,
}

impl<T> ApproximateSearch<T>
where
    T: Clone + Send + Sync,
{
    /// `depth` bounds each per-start greedy walk (default 100 per the
    /// search contract); `similarity_budget` is the *aggregate*
    /// `max_similarities` budget across every partition, not a per-shard one
    /// — `search` divides it by the partition count before dispatching.
    pub fn new(
        graph: &DistributedGraph<T>,
        k: usize,
        expansion: usize,
        depth: usize,
        similarity_budget: usize,
    ) -> Self {
        ApproximateSearch {
            subgraphs: graph.to_subgraphs(),
            k,
            expansion,
            depth,
            similarity_budget,
        }
    }

    /// Runs the greedy search against every partition in parallel (seeding
    /// each partition's RNG deterministically from `seed` plus its index so
    /// the whole search is reproducible), then merges the results. Each
    /// partition's share of the similarity budget is `mps = similarity_budget
    /// / P`, so the total cost across all shards stays bounded by
    /// `similarity_budget` in aggregate rather than scaling with `P`.
    pub fn search(&self, query: &T, seed: Option<u64>) -> NeighborList {
        let mps = self.similarity_budget / self.subgraphs.len().max(1);
        let per_partition: Vec<NeighborList> = self
            .subgraphs
            .par_iter()
            .enumerate()
            .map(|(idx, shard)| {
                let mut rng = match seed {
                    Some(s) => StdRng::seed_from_u64(s.wrapping_add(idx as u64)),
                    None => StdRng::from_os_rng(),
                };
                shard.greedy_search(query, self.k, self.expansion, self.depth, mps, &mut rng)
            })
            .collect();

        let mut merged = NeighborList::new(self.k);
        for list in per_partition {
            for neighbor in list.iter() {
                merged.offer(Neighbor::new(neighbor.node, neighbor.similarity));
            }
        }
        merged
    }

    /// Assigns `query` to a partition, the way the k-medoids partitioner's
    /// own assignment step would: each partition's affinity is the highest
    /// similarity its local greedy search surfaces (standing in for
    /// similarity-to-medoid when no cached medoid value is at hand), then
    /// that affinity is weighted by `1 - used/capacity` so a partition
    /// already near its soft capacity bound is penalized. `capacity` is
    /// `ceil(imbalance * total / P)`, mirroring §4.D's per-shard formula;
    /// `partition_sizes` holds the caller's current per-partition counts.
    ///
    /// Falls back to the least-populated partition (ties toward the lowest
    /// index) when every partition is empty, so a brand-new mesh still
    /// distributes insertions round-robin rather than always choosing
    /// partition 0.
    pub fn assign(
        &self,
        query: &T,
        partition_sizes: &[usize],
        imbalance: f64,
        seed: Option<u64>,
    ) -> Option<u32> {
        if self.subgraphs.is_empty() {
            return None;
        }
        let total: usize = partition_sizes.iter().sum();
        let p = self.subgraphs.len();
        let capacity = ((imbalance * total.max(1) as f64) / p as f64).ceil().max(1.0);

        let mut best: Option<(f64, u32)> = None;
        for (idx, shard) in self.subgraphs.iter().enumerate() {
            let mut rng = match seed {
                Some(s) => StdRng::seed_from_u64(s.wrapping_add(idx as u64)),
                None => StdRng::from_os_rng(),
            };
            let result = shard.greedy_search(query, 1, self.expansion, self.depth, self.similarity_budget, &mut rng);
            let Some(top) = result.iter().next() else {
                continue;
            };
            let used = partition_sizes.get(idx).copied().unwrap_or(0) as f64;
            let value = top.similarity * (1.0 - used / capacity);
            match best {
                Some((best_value, _)) if value <= best_value => {}
                _ => best = Some((value, idx as u32)),
            }
        }
        best.map(|(_, idx)| idx).or_else(|| {
            (0..p as u32).min_by_key(|&idx| partition_sizes.get(idx as usize).copied().unwrap_or(0))
        })
    }
}
