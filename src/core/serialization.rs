/*!
# Persisted State

`DistributedGraph<T>` round-trips through JSON (human-readable, debugging)
and bincode (fast, compact) via an intermediate `SerializableDistributedGraph`
that flattens the edge-table view into a plain `Vec`. Reconstructing a graph
from persisted state requires the caller to supply the similarity measure
again — a similarity callback is never itself serialized.
*/

use crate::core::distributed::{DistributedGraph, EdgeTableEntry};
use crate::core::error::{KnnMeshError, Result};
use crate::core::partitioned::Partitioned;
use crate::core::similarity::Similarity;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read as _, Write as _};
use std::path::Path;
use std::sync::Arc;

/// Flat, serializable snapshot of a `DistributedGraph`'s edge-table view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerializableDistributedGraph<T> {
    pub num_partitions: usize,
    pub entries: Vec<EdgeTableEntry<T>>,
}

impl<T> DistributedGraph<T>
where
    T: Clone + Send + Serialize,
{
    pub fn to_serializable(&self) -> SerializableDistributedGraph<T> {
        SerializableDistributedGraph {
            num_partitions: self.num_partitions(),
            entries: self.to_edge_table().collect(),
        }
    }

    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let snapshot = self.to_serializable();
        let file = File::create(path)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, &snapshot)?;
        Ok(())
    }

    pub fn save_binary<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let snapshot = self.to_serializable();
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        let encoded = bincode::serde::encode_to_vec(&snapshot, bincode::config::standard())
            .map_err(KnnMeshError::from)?;
        writer.write_all(&encoded)?;
        Ok(())
    }
}

impl<T> DistributedGraph<T>
where
    T: Clone + Send + for<'de> Deserialize<'de>,
{
    /// Rebuilds a `DistributedGraph` from a JSON file, re-bucketing each
    /// entry by its persisted partition assignment.
    pub fn load_json<P: AsRef<Path>>(path: P, similarity: Arc<dyn Similarity<T>>) -> Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let snapshot: SerializableDistributedGraph<T> = serde_json::from_reader(reader)?;
        Ok(Self::from_edge_table(
            similarity,
            Partitioned::single(snapshot.entries),
            snapshot.num_partitions.max(1),
        ))
    }

    pub fn load_binary<P: AsRef<Path>>(
        path: P,
        similarity: Arc<dyn Similarity<T>>,
    ) -> Result<Self> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        let mut buffer = Vec::new();
        reader.read_to_end(&mut buffer)?;
        let (snapshot, _): (SerializableDistributedGraph<T>, usize) =
            bincode::serde::decode_from_slice(&buffer, bincode::config::standard())
                .map_err(KnnMeshError::from)?;
        Ok(Self::from_edge_table(
            similarity,
            Partitioned::single(snapshot.entries),
            snapshot.num_partitions.max(1),
        ))
    }
}
