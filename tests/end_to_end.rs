//! Literal end-to-end scenarios: a text-similarity corpus, a synthetic
//! Gaussian point cloud, a serialization round-trip, single-partition
//! search, and online insertion under capacity.
//!
//! Jaro-Winkler and Euclidean distance are not part of this crate's public
//! API (similarity measures are always supplied by the caller); the two
//! helpers below exist only to drive these tests, standing in for the
//! real SPAM corpus and Gaussian generator this crate does not vendor.

use knnmesh::brute;
use knnmesh::core::distributed::DistributedGraph;
use knnmesh::core::similarity::Similarity;
use knnmesh::partition::{BalancedKMedoidsPartitioner, PartitionerConfig};
use knnmesh::search::ApproximateSearch;
use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;
use std::sync::Arc;

fn jaro_winkler(a: &str, b: &str) -> f64 {
    if a == b {
        return 1.0;
    }
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let (a_len, b_len) = (a_chars.len(), b_chars.len());
    if a_len == 0 || b_len == 0 {
        return 0.0;
    }
    let match_distance = (a_len.max(b_len) / 2).saturating_sub(1);
    let mut a_matches = vec![false; a_len];
    let mut b_matches = vec![false; b_len];
    let mut matches = 0;
    for i in 0..a_len {
        let lo = i.saturating_sub(match_distance);
        let hi = (i + match_distance + 1).min(b_len);
        for j in lo..hi {
            if b_matches[j] || a_chars[i] != b_chars[j] {
                continue;
            }
            a_matches[i] = true;
            b_matches[j] = true;
            matches += 1;
            break;
        }
    }
    if matches == 0 {
        return 0.0;
    }
    let mut transpositions = 0;
    let mut k = 0;
    for i in 0..a_len {
        if !a_matches[i] {
            continue;
        }
        while !b_matches[k] {
            k += 1;
        }
        if a_chars[i] != b_chars[k] {
            transpositions += 1;
        }
        k += 1;
    }
    let m = matches as f64;
    let jaro = (m / a_len as f64 + m / b_len as f64 + (m - transpositions as f64 / 2.0) / m) / 3.0;
    let prefix = a_chars
        .iter()
        .zip(b_chars.iter())
        .take(4)
        .take_while(|(x, y)| x == y)
        .count() as f64;
    jaro + prefix * 0.1 * (1.0 - jaro)
}

struct JaroWinklerSimilarity;
impl Similarity<String> for JaroWinklerSimilarity {
    fn score(&self, a: &String, b: &String) -> f64 {
        jaro_winkler(a, b)
    }
}

fn synthetic_spam_corpus(n: usize, seed: u64) -> Vec<String> {
    let mut rng = StdRng::seed_from_u64(seed);
    let templates = [
        "free money now click here",
        "limited time offer buy now",
        "your account needs verification",
        "meeting notes from yesterday",
        "project deadline next friday",
        "lunch plans for this week",
    ];
    (0..n)
        .map(|i| {
            let base = templates[i % templates.len()];
            let mut word: String = base.to_string();
            if rng.random_bool(0.3) {
                word.push_str(&format!(" extra{}", rng.random_range(0..100)));
            }
            word
        })
        .collect()
}

fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum::<f64>().sqrt()
}

struct L2Similarity;
impl Similarity<Vec<f64>> for L2Similarity {
    fn score(&self, a: &Vec<f64>, b: &Vec<f64>) -> f64 {
        1.0 / (1.0 + euclidean(a, b))
    }
}

fn synthetic_gaussian_blobs(n: usize, dims: usize, seed: u64) -> Vec<Vec<f64>> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|i| {
            let center = if i % 2 == 0 { 0.0 } else { 5.0 };
            (0..dims)
                .map(|_| center + rng.random_range(-1.5..1.5))
                .collect()
        })
        .collect()
}

#[test]
fn scenario_1_spam_like_corpus_builds_a_graph() {
    let corpus = synthetic_spam_corpus(726, 1);
    let sim: Arc<dyn Similarity<String>> = Arc::new(JaroWinklerSimilarity);
    let graph = brute::compute_graph(corpus, 10, sim);
    assert_eq!(graph.node_count(), 726);
    let table = graph.to_edge_table().collect();
    for (node, list) in &table {
        assert_eq!(list.len(), 10);
        assert!(list.iter().all(|n| n.node != node.id));
    }
}

#[test]
fn scenario_2_synthetic_gaussian_builds_a_graph() {
    let points = synthetic_gaussian_blobs(10000, 13, 2);
    let sim: Arc<dyn Similarity<Vec<f64>>> = Arc::new(L2Similarity);
    let graph = brute::compute_graph(points, 10, sim);
    assert_eq!(graph.node_count(), 10000);
    let table = graph.to_edge_table().collect();
    for (_, list) in &table {
        assert_eq!(list.len(), 10);
    }
}

#[test]
fn scenario_3_round_trip_through_binary_serialization() {
    let points: Vec<f64> = (0..200).map(|i| i as f64).collect();
    let sim: Arc<dyn Similarity<f64>> = Arc::new(L2ScalarSimilarity);
    let graph = brute::compute_graph(points, 6, sim);

    let path = "knnmesh_e2e_roundtrip.bin";
    graph.save_binary(path).expect("save");
    let reload_sim: Arc<dyn Similarity<f64>> = Arc::new(L2ScalarSimilarity);
    let loaded = DistributedGraph::<f64>::load_binary(path, reload_sim).expect("load");
    assert_eq!(loaded.node_count(), graph.node_count());
    std::fs::remove_file(path).ok();
}

struct L2ScalarSimilarity;
impl Similarity<f64> for L2ScalarSimilarity {
    fn score(&self, a: &f64, b: &f64) -> f64 {
        1.0 / (1.0 + (a - b).abs())
    }
}

#[test]
fn scenario_4_single_partition_search_returns_plausible_neighbors() {
    let points: Vec<f64> = (0..300).map(|i| i as f64).collect();
    let sim: Arc<dyn Similarity<f64>> = Arc::new(L2ScalarSimilarity);
    let graph = brute::compute_graph(points, 8, sim);

    let search = ApproximateSearch::new(&graph, 5, 6, 100, 400);
    let result = search.search(&150.0, Some(7));
    assert!(!result.is_empty());
    let best = result.iter().next().unwrap();
    assert!((best.node.get() as i64 - 150).abs() <= 5);
}

#[test]
fn scenario_5_partitioner_produces_balanced_shards() {
    let points: Vec<f64> = (0..400).map(|i| i as f64).collect();
    let sim: Arc<dyn Similarity<f64>> = Arc::new(L2ScalarSimilarity);
    let graph = brute::compute_graph(points, 8, Arc::clone(&sim));

    let config = PartitionerConfig::try_new(5, 4, 1.1, Some(3)).unwrap();
    let partitioner = BalancedKMedoidsPartitioner::new(config, sim);
    let partitioned = partitioner.partition(graph);

    let table = partitioned.to_edge_table().collect();
    let mut counts = [0usize; 5];
    for (node, _) in &table {
        counts[node.partition.unwrap() as usize] += 1;
    }
    let capacity = ((1.1 * 400.0) / 5.0).ceil() as usize;
    for count in counts {
        assert!(count <= capacity);
    }
}
