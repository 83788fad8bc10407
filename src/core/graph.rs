/*!
# Local Graph Primitives

`Graph<T>` is the per-shard view of the mesh: a node's `NeighborList` may
reference `NodeId`s this graph has never seen a payload for (they live in a
different partition). This is deliberately not built atop a petgraph owning
graph, whose edge endpoints must all belong to the same graph instance.
Strongly-connected-components decomposition still reuses
`petgraph::algo::tarjan_scc`, restricted to the subgraph of locally-resolvable
edges, via a throwaway `petgraph::Graph` built for that one call.
*/

use crate::core::similarity::Similarity;
use crate::core::types::{Neighbor, NeighborList, NodeId};
use petgraph::algo::tarjan_scc;
use petgraph::graph::{Graph as PetGraph, NodeIndex};
use rand::Rng;
use rand::seq::SliceRandom;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tracing::debug;

/// A local, single-shard k-NN graph: every known node's `NeighborList` plus
/// the payloads this shard holds and the similarity measure shared across
/// the mesh.
pub struct Graph<T> {
    similarity: Arc<dyn Similarity<T>>,
    neighbor_lists: HashMap<NodeId, NeighborList>,
    payloads: HashMap<NodeId, T>,
}

impl<T> Graph<T> {
    pub fn new(similarity: Arc<dyn Similarity<T>>) -> Self {
        Graph {
            similarity,
            neighbor_lists: HashMap::new(),
            payloads: HashMap::new(),
        }
    }

    pub fn node_count(&self) -> usize {
        self.payloads.len()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.payloads.contains_key(&id)
    }

    pub fn value(&self, id: NodeId) -> Option<&T> {
        self.payloads.get(&id)
    }

    pub fn neighbors(&self, id: NodeId) -> Option<&NeighborList> {
        self.neighbor_lists.get(&id)
    }

    pub fn neighbors_mut(&mut self, id: NodeId) -> Option<&mut NeighborList> {
        self.neighbor_lists.get_mut(&id)
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.payloads.keys().copied()
    }

    /// Registers a node's payload and its (possibly empty) neighbor list.
    /// Replaces any prior entry for the same id.
    pub fn upsert(&mut self, id: NodeId, value: T, neighbors: NeighborList) {
        self.payloads.insert(id, value);
        self.neighbor_lists.insert(id, neighbors);
    }

    pub fn remove(&mut self, id: NodeId) -> Option<(T, NeighborList)> {
        let value = self.payloads.remove(&id)?;
        let neighbors = self.neighbor_lists.remove(&id).unwrap_or_default();
        Some((value, neighbors))
    }

    pub fn similarity(&self, a: &T, b: &T) -> f64 {
        self.similarity.score(a, b)
    }

    /// Greedy best-first search (GNSS-style) for the `k` locally-known nodes
    /// most similar to `query`. Samples `expansion` distinct random starting
    /// nodes; from each, independently walks to the most-similar unvisited
    /// neighbor of the current best node, terminating that start's walk once
    /// no neighbor improves on the current node or `depth` hops have been
    /// taken. Every start's walk shares one running similarity-evaluation
    /// budget of `similarity_budget`, so the combined cost across all starts
    /// never exceeds it.
    pub fn greedy_search(
        &self,
        query: &T,
        k: usize,
        expansion: usize,
        depth: usize,
        similarity_budget: usize,
        rng: &mut impl Rng,
    ) -> NeighborList {
        let mut result = NeighborList::new(k);
        if self.payloads.is_empty() || k == 0 {
            return result;
        }

        let mut all_ids: Vec<NodeId> = self.payloads.keys().copied().collect();
        all_ids.shuffle(rng);
        let starts: Vec<NodeId> = all_ids.into_iter().take(expansion.max(1)).collect();

        let mut budget_spent = 0usize;

        for start in starts {
            if budget_spent >= similarity_budget {
                break;
            }
            let Some(start_value) = self.payloads.get(&start) else {
                continue;
            };

            let mut current = start;
            let mut current_score = self.similarity.score(query, start_value);
            budget_spent += 1;
            result.offer(Neighbor::new(current, current_score));

            let mut visited: HashSet<NodeId> = HashSet::new();
            visited.insert(current);

            for _ in 0..depth {
                if budget_spent >= similarity_budget {
                    break;
                }
                let Some(neighbor_list) = self.neighbor_lists.get(&current) else {
                    break;
                };

                let mut best: Option<(NodeId, f64)> = None;
                for neighbor in neighbor_list.iter() {
                    if visited.contains(&neighbor.node) {
                        continue;
                    }
                    let Some(value) = self.payloads.get(&neighbor.node) else {
                        continue;
                    };
                    if budget_spent >= similarity_budget {
                        break;
                    }
                    let score = self.similarity.score(query, value);
                    budget_spent += 1;
                    result.offer(Neighbor::new(neighbor.node, score));
                    if best.map(|(_, best_score)| score > best_score).unwrap_or(true) {
                        best = Some((neighbor.node, score));
                    }
                }

                let Some((best_node, best_score)) = best else {
                    break;
                };
                if best_score <= current_score {
                    break;
                }
                visited.insert(best_node);
                current = best_node;
                current_score = best_score;
            }
        }

        result
    }

    /// Breadth-first expansion from `starts`, bounded to `depth` hops along
    /// neighbor-list edges, returning every node reached (including `starts`
    /// themselves).
    pub fn find_neighbors(&self, starts: &[NodeId], depth: usize) -> HashSet<NodeId> {
        let mut seen: HashSet<NodeId> = starts.iter().copied().collect();
        let mut frontier: VecDeque<(NodeId, usize)> = starts.iter().map(|n| (*n, 0)).collect();

        while let Some((node, dist)) = frontier.pop_front() {
            if dist >= depth {
                continue;
            }
            if let Some(list) = self.neighbor_lists.get(&node) {
                for neighbor in list.iter() {
                    if seen.insert(neighbor.node) {
                        frontier.push_back((neighbor.node, dist + 1));
                    }
                }
            }
        }
        seen
    }

    /// Decomposes the locally-resolvable edge set into strongly connected
    /// components, returning them ordered largest-first.
    pub fn strongly_connected_components(&self) -> Vec<Vec<NodeId>> {
        let mut index_of: HashMap<NodeId, NodeIndex> = HashMap::new();
        let mut pet = PetGraph::<NodeId, ()>::new();
        for id in self.payloads.keys() {
            let idx = pet.add_node(*id);
            index_of.insert(*id, idx);
        }
        for (id, list) in &self.neighbor_lists {
            let Some(&src) = index_of.get(id) else {
                continue;
            };
            for neighbor in list.iter() {
                if let Some(&tgt) = index_of.get(&neighbor.node) {
                    pet.add_edge(src, tgt, ());
                }
            }
        }

        let mut components: Vec<Vec<NodeId>> = tarjan_scc(&pet)
            .into_iter()
            .map(|comp| comp.into_iter().map(|idx| pet[idx]).collect())
            .collect();
        components.sort_by(|a, b| b.len().cmp(&a.len()));
        components
    }

    /// The graph-theoretic center of `component`: the node with the smallest
    /// **positive** eccentricity (maximum hop-count to any other node in the
    /// component), ties broken by ascending `NodeId`. Nodes with eccentricity
    /// 0 (isolated — no locally-resolvable edge to another component member)
    /// are skipped entirely, so a single-node component or a component whose
    /// every member is isolated has no medoid. Eccentricity is computed by an
    /// unweighted Dijkstra (plain BFS) from every candidate node, restricted
    /// to edges whose endpoints both lie in `component`.
    pub fn medoid(&self, component: &[NodeId]) -> Option<NodeId> {
        if component.is_empty() {
            return None;
        }
        let member: HashSet<NodeId> = component.iter().copied().collect();

        let mut best: Option<(usize, NodeId)> = None;
        for &candidate in component {
            let ecc = self.eccentricity(candidate, &member);
            if ecc == 0 {
                continue;
            }
            match best {
                None => best = Some((ecc, candidate)),
                Some((best_ecc, best_node)) => {
                    if ecc < best_ecc || (ecc == best_ecc && candidate < best_node) {
                        best = Some((ecc, candidate));
                    }
                }
            }
        }
        debug!(?best, "computed medoid for component");
        best.map(|(_, node)| node)
    }

    fn eccentricity(&self, source: NodeId, member: &HashSet<NodeId>) -> usize {
        let mut dist: HashMap<NodeId, usize> = HashMap::new();
        dist.insert(source, 0);
        let mut frontier = VecDeque::new();
        frontier.push_back(source);

        while let Some(node) = frontier.pop_front() {
            let d = dist[&node];
            if let Some(list) = self.neighbor_lists.get(&node) {
                for neighbor in list.iter() {
                    if !member.contains(&neighbor.node) {
                        continue;
                    }
                    if !dist.contains_key(&neighbor.node) {
                        dist.insert(neighbor.node, d + 1);
                        frontier.push_back(neighbor.node);
                    }
                }
            }
        }
        dist.values().copied().max().unwrap_or(0)
    }
}
