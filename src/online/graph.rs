/*!
# Online Graph Maintenance

`OnlineGraph<T>` wraps a `DistributedGraph<T>` in a functional-update
pattern: every `add_node`/`fast_remove` call produces a brand-new
`DistributedGraph` and swaps it in behind an `Arc`, retaining the previous
two versions (a FIFO of depth 2) so an in-flight reader never observes a
torn graph. Insertion performs a bounded-depth (2-hop) back-edge update;
removal performs a fast approximate neighbor-expansion-and-replacement
rather than a full re-partition.
*/

use crate::core::distributed::DistributedGraph;
use crate::core::error::{KnnMeshError, Result};
use crate::core::similarity::Similarity;
use crate::core::types::{Neighbor, NeighborList, NodeId};
use crate::search::approximate::ApproximateSearch;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Validated configuration for an `OnlineGraph`.
#[derive(Debug, Clone)]
pub struct OnlineConfig {
    k: usize,
    search_speedup: u32,
    medoid_update_ratio: f64,
    checkpoint_interval: u32,
    update_depth: u32,
    imbalance: f64,
}

impl OnlineConfig {
    /// `checkpoint_interval` is fixed at 100 insertions, `update_depth` at 2
    /// hops, and `imbalance` at the partitioner's own default of 1.05 (the
    /// programmatic API never exposes it on `Online`'s constructor — only
    /// `k`, `search_speedup`, and `medoid_update_ratio` are caller-tunable);
    /// `assign` uses it to weigh partition capacity the same way the
    /// partitioner's own assignment pass does.
    pub fn try_new(k: usize, search_speedup: u32, medoid_update_ratio: f64) -> Result<Self> {
        if k == 0 {
            return Err(KnnMeshError::configuration("k", "must be greater than zero"));
        }
        if search_speedup == 0 {
            return Err(KnnMeshError::configuration(
                "search_speedup",
                "must be greater than zero",
            ));
        }
        if medoid_update_ratio < 0.0 {
            return Err(KnnMeshError::configuration(
                "medoid_update_ratio",
                "must be non-negative",
            ));
        }
        Ok(OnlineConfig {
            k,
            search_speedup,
            medoid_update_ratio,
            checkpoint_interval: 100,
            update_depth: 2,
            imbalance: 1.05,
        })
    }

    pub fn set_search_speedup(&mut self, value: u32) -> Result<()> {
        if value == 0 {
            return Err(KnnMeshError::configuration(
                "search_speedup",
                "must be greater than zero",
            ));
        }
        self.search_speedup = value;
        Ok(())
    }

    pub fn set_medoid_update_ratio(&mut self, value: f64) -> Result<()> {
        if value < 0.0 {
            return Err(KnnMeshError::configuration(
                "medoid_update_ratio",
                "must be non-negative",
            ));
        }
        self.medoid_update_ratio = value;
        Ok(())
    }
}

impl Default for OnlineConfig {
    fn default() -> Self {
        OnlineConfig::try_new(10, 4, 0.1).expect("defaults are always valid")
    }
}

/// A mesh under online insertion and removal.
pub struct OnlineGraph<T> {
    config: OnlineConfig,
    similarity: Arc<dyn Similarity<T>>,
    current: Arc<DistributedGraph<T>>,
    history: VecDeque<Arc<DistributedGraph<T>>>,
    medoids: Vec<Option<NodeId>>,
    partitions_size: Vec<usize>,
    insertions_since_checkpoint: u32,
    medoid_update_countdown: f64,
    next_node_id: u64,
    checkpoints_taken: AtomicUsize,
}

impl<T> OnlineGraph<T>
where
    T: Clone + Send + Sync,
{
    pub fn new(config: OnlineConfig, similarity: Arc<dyn Similarity<T>>, initial: DistributedGraph<T>) -> Self {
        let table = initial.to_edge_table().collect();
        let next_node_id = table.iter().map(|(node, _)| node.id.get() + 1).max().unwrap_or(0);

        let mut partitions_size = vec![0usize; initial.num_partitions().max(1)];
        for (node, _) in &table {
            let p = node.partition.unwrap_or(0) as usize;
            if p >= partitions_size.len() {
                partitions_size.resize(p + 1, 0);
            }
            partitions_size[p] += 1;
        }

        let mut online = OnlineGraph {
            config,
            similarity,
            current: Arc::new(initial),
            history: VecDeque::with_capacity(2),
            medoids: Vec::new(),
            partitions_size,
            insertions_since_checkpoint: 0,
            medoid_update_countdown: 1.0,
            next_node_id,
            checkpoints_taken: AtomicUsize::new(0),
        };
        online.refresh_medoids();
        online
    }

    pub fn current(&self) -> &DistributedGraph<T> {
        &self.current
    }

    pub fn current_handle(&self) -> Arc<DistributedGraph<T>> {
        Arc::clone(&self.current)
    }

    pub fn medoids(&self) -> &[Option<NodeId>] {
        &self.medoids
    }

    /// Current per-partition node counts, maintained incrementally across
    /// insertions and removals so `assign` can weigh capacity without
    /// rescanning the whole mesh.
    pub fn partitions_size(&self) -> &[usize] {
        &self.partitions_size
    }

    /// Number of checkpoints taken so far (every `checkpoint_interval`
    /// insertions). Exposed so callers and tests can verify checkpoint
    /// cadence without reaching into private state.
    pub fn checkpoint_calls(&self) -> usize {
        self.checkpoints_taken.load(Ordering::Relaxed)
    }

    pub fn set_search_speedup(&mut self, value: u32) -> Result<()> {
        self.config.set_search_speedup(value)
    }

    pub fn set_medoid_update_ratio(&mut self, value: f64) -> Result<()> {
        self.config.set_medoid_update_ratio(value)
    }

    /// Inserts `value` as a new node: finds its approximate k nearest
    /// neighbors, gives it its own neighbor list, and walks up to
    /// `update_depth` hops outward from those neighbors offering the new
    /// node as a candidate to every node it visits (the bounded-depth
    /// back-edge update).
    pub fn add_node(&mut self, value: T) -> NodeId {
        let id = NodeId::new(self.next_node_id);
        self.next_node_id += 1;

        let (updated, partition) = self.update_function(id, value);
        self.push_version(updated);

        if partition as usize >= self.partitions_size.len() {
            self.partitions_size.resize(partition as usize + 1, 0);
        }
        self.partitions_size[partition as usize] += 1;

        self.insertions_since_checkpoint += 1;
        self.medoid_update_countdown -= self.config.medoid_update_ratio;

        if self.insertions_since_checkpoint >= self.config.checkpoint_interval {
            self.checkpoint();
        }
        if self.medoid_update_countdown <= 0.0 {
            self.refresh_medoids();
            self.medoid_update_countdown = 1.0;
        }
        id
    }

    /// Runs the bounded back-edge `UpdateFunction` over every subgraph
    /// independently (the new node's candidates, found by a mesh-wide
    /// search, may live in any partition), then appends `(id, value)` with
    /// its freshly-found neighbor list to the subgraph it was assigned to.
    fn update_function(&self, id: NodeId, value: T) -> (DistributedGraph<T>, u32) {
        let search = ApproximateSearch::new(
            &self.current,
            self.config.k * self.config.search_speedup as usize,
            self.config.search_speedup as usize,
            100,
            self.config.k * self.config.search_speedup as usize * 8,
        );
        let candidates = search.search(&value, None);
        let chosen = search
            .assign(&value, &self.partitions_size, self.config.imbalance, None)
            .unwrap_or(0);
        let partition = chosen as usize;

        let mut new_list = NeighborList::new(self.config.k);
        for neighbor in candidates.iter().take(self.config.k) {
            new_list.offer(*neighbor);
        }

        let mut subgraphs = self.current.to_subgraphs();
        if partition >= subgraphs.len() {
            subgraphs.push(crate::core::graph::Graph::new(Arc::clone(&self.similarity)));
        }

        let mut analyze: HashSet<NodeId> = candidates.iter().map(|n| n.node).collect();
        let mut visited: HashSet<NodeId> = HashSet::new();
        for _ in 0..self.config.update_depth {
            let mut next: HashSet<NodeId> = HashSet::new();
            for subgraph in subgraphs.iter_mut() {
                for &other in &analyze {
                    if visited.contains(&other) {
                        continue;
                    }
                    let Some(other_neighbors) = subgraph.neighbors(other).cloned() else {
                        // `other` is not resolvable in this subgraph; it lives
                        // in a different partition.
                        continue;
                    };
                    for m in other_neighbors.iter() {
                        if !visited.contains(&m.node) {
                            next.insert(m.node);
                        }
                    }
                    if let Some(other_value) = subgraph.value(other).cloned() {
                        let score = self.similarity.score(&value, &other_value);
                        if let Some(list) = subgraph.neighbors_mut(other) {
                            list.offer(Neighbor::new(id, score));
                        }
                    }
                }
            }
            for &other in &analyze {
                visited.insert(other);
            }
            analyze = next;
        }

        subgraphs[partition].upsert(id, value, new_list);

        debug!(node = ?id, partition, "inserted node via bounded back-edge update");
        (
            DistributedGraph::from_subgraphs(Arc::clone(&self.similarity), subgraphs),
            chosen,
        )
    }

    /// Removes `id` approximately, per `fastRemove`: (1) find every node in
    /// *any* subgraph whose `NeighborList` references `id` (`to_update`) —
    /// cross-partition references are legal, so this scans the whole mesh,
    /// not just the partition `id` lived in; (2) expand outward from
    /// `{id} ∪ to_update` three hops across all subgraphs (union) to build a
    /// `candidates` pool; (3) drop `id`'s own entry, then in every subgraph
    /// strip `id` from each `to_update` node's list and offer it every
    /// candidate, letting the list's own add-with-eviction rule keep the
    /// best `k`.
    pub fn fast_remove(&mut self, id: NodeId) {
        let mut subgraphs = self.current.to_subgraphs();

        let to_update: Vec<NodeId> = subgraphs
            .iter()
            .flat_map(|g| g.node_ids().filter(|&n| g.neighbors(n).map(|l| l.contains(id)).unwrap_or(false)))
            .collect();

        const FAST_REMOVE_EXPANSION_DEPTH: usize = 3;
        let mut initial: Vec<NodeId> = vec![id];
        initial.extend(to_update.iter().copied());

        let mut candidates: HashSet<NodeId> = HashSet::new();
        for subgraph in &subgraphs {
            candidates.extend(subgraph.find_neighbors(&initial, FAST_REMOVE_EXPANSION_DEPTH));
        }
        candidates.remove(&id);

        let mut removed_partition = None;
        for (p_idx, subgraph) in subgraphs.iter_mut().enumerate() {
            if subgraph.remove(id).is_some() {
                removed_partition = Some(p_idx);
            }
        }
        let Some(removed_partition) = removed_partition else {
            return;
        };
        if let Some(count) = self.partitions_size.get_mut(removed_partition) {
            *count = count.saturating_sub(1);
        }

        for subgraph in subgraphs.iter_mut() {
            for &node_id in &to_update {
                if subgraph.neighbors(node_id).is_none() {
                    continue;
                }
                if let Some(list) = subgraph.neighbors_mut(node_id) {
                    list.remove(id);
                }
                let Some(node_value) = subgraph.value(node_id).cloned() else {
                    continue;
                };
                for &candidate in &candidates {
                    if candidate == node_id {
                        continue;
                    }
                    let Some(candidate_value) = subgraph.value(candidate).cloned() else {
                        continue;
                    };
                    let score = self.similarity.score(&node_value, &candidate_value);
                    if let Some(list) = subgraph.neighbors_mut(node_id) {
                        list.offer(Neighbor::new(candidate, score));
                    }
                }
            }
        }

        let updated = DistributedGraph::from_subgraphs(Arc::clone(&self.similarity), subgraphs);
        self.push_version(updated);
        debug!(node = ?id, "removed node via fast approximate removal");
    }

    fn push_version(&mut self, updated: DistributedGraph<T>) {
        self.history.push_back(Arc::clone(&self.current));
        if self.history.len() > 2 {
            self.history.pop_front();
        }
        self.current = Arc::new(updated);
    }

    /// Materializes a fresh copy of the current edge table, truncating
    /// whatever transformation lineage has accumulated since the last
    /// checkpoint.
    fn checkpoint(&mut self) {
        let table = self.current.to_edge_table().checkpoint();
        let p = self.current.num_partitions();
        self.current = Arc::new(DistributedGraph::from_edge_table(
            Arc::clone(&self.similarity),
            table,
            p,
        ));
        self.insertions_since_checkpoint = 0;
        let count = self.checkpoints_taken.fetch_add(1, Ordering::Relaxed) + 1;
        info!(checkpoint_count = count, "checkpoint taken");
    }

    fn refresh_medoids(&mut self) {
        let subgraphs = self.current.to_subgraphs();
        self.medoids = subgraphs
            .iter()
            .map(|g| {
                let components = g.strongly_connected_components();
                components.first().and_then(|largest| g.medoid(largest))
            })
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::partitioned::Partitioned;
    use crate::core::types::Node;

    struct NegativeL2;
    impl Similarity<f64> for NegativeL2 {
        fn score(&self, a: &f64, b: &f64) -> f64 {
            -(a - b).abs()
        }
    }

    fn seed_graph() -> DistributedGraph<f64> {
        let sim: Arc<dyn Similarity<f64>> = Arc::new(NegativeL2);
        let entries: Vec<_> = (0..20)
            .map(|i| (Node::with_partition(NodeId::new(i), 0, i as f64), NeighborList::new(5)))
            .collect();
        DistributedGraph::from_edge_table(sim, Partitioned::single(entries), 1)
    }

    #[test]
    fn rejects_zero_k() {
        assert!(OnlineConfig::try_new(0, 4, 0.1).is_err());
    }

    #[test]
    fn rejects_negative_medoid_ratio() {
        assert!(OnlineConfig::try_new(10, 4, -0.1).is_err());
    }

    #[test]
    fn add_node_increases_node_count() {
        let sim: Arc<dyn Similarity<f64>> = Arc::new(NegativeL2);
        let config = OnlineConfig::try_new(3, 2, 0.1).unwrap();
        let mut online = OnlineGraph::new(config, sim, seed_graph());
        let before = online.current().node_count();
        online.add_node(10.5);
        assert_eq!(online.current().node_count(), before + 1);
    }

    #[test]
    fn fast_remove_decreases_node_count() {
        let sim: Arc<dyn Similarity<f64>> = Arc::new(NegativeL2);
        let config = OnlineConfig::try_new(3, 2, 0.1).unwrap();
        let mut online = OnlineGraph::new(config, sim, seed_graph());
        let before = online.current().node_count();
        online.fast_remove(NodeId::new(5));
        assert_eq!(online.current().node_count(), before - 1);
    }

    #[test]
    fn checkpoint_fires_after_configured_interval() {
        let sim: Arc<dyn Similarity<f64>> = Arc::new(NegativeL2);
        let config = OnlineConfig::try_new(3, 2, 0.0).unwrap();
        let mut online = OnlineGraph::new(config, sim, seed_graph());
        for i in 0..150 {
            online.add_node(100.0 + i as f64);
        }
        assert!(online.insertions_since_checkpoint < 100);
    }
}
