// SPDX-License-Identifier: MPL-2.0

//! Enrolled identity index
//!
//! Holds one unit-norm embedding per employee id and answers nearest-
//! neighbor queries by cosine similarity. Many pipeline threads query
//! concurrently while enrollment/removal happens rarely, so the index is
//! guarded by an `RwLock` rather than the single-writer `Mutex` pattern
//! used for capture backends.

pub mod format;

use crate::constants::FLAT_SCAN_MAX_SIZE;
use crate::errors::IdentityError;
use crate::models::Embedding;
use format::IndexRecord;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::{info, warn};

/// Best match against the index for a query embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct IdentityMatch {
    pub employee_id: String,
    pub similarity: f32,
}

struct IndexState {
    dimension: usize,
    entries: HashMap<String, Vec<f32>>,
}

pub struct IdentityIndex {
    path: PathBuf,
    state: RwLock<IndexState>,
}

impl IdentityIndex {
    /// Load an existing index from `path`, or start empty if the file
    /// does not exist yet.
    pub fn load(path: &Path, dimension: usize) -> Result<Self, IdentityError> {
        if !path.exists() {
            return Ok(Self {
                path: path.to_path_buf(),
                state: RwLock::new(IndexState { dimension, entries: HashMap::new() }),
            });
        }

        let mut file = std::fs::File::open(path)?;
        let (stored_dimension, records) = format::read_index(&mut file)?;
        if stored_dimension != dimension {
            return Err(IdentityError::DimensionMismatch { expected: dimension, actual: stored_dimension });
        }

        let mut entries = HashMap::with_capacity(records.len());
        for record in records {
            entries.insert(record.id, record.vector);
        }

        info!(path = %path.display(), count = entries.len(), "identity index loaded");
        if entries.len() > FLAT_SCAN_MAX_SIZE {
            warn!(
                count = entries.len(),
                limit = FLAT_SCAN_MAX_SIZE,
                "identity index exceeds flat-scan size guidance; query latency will grow linearly"
            );
        }

        Ok(Self { path: path.to_path_buf(), state: RwLock::new(IndexState { dimension, entries }) })
    }

    /// Add a new enrolled identity. Fails if the id is already present or
    /// the vector's dimension does not match the index.
    pub fn add(&self, employee_id: &str, embedding: &Embedding) -> Result<(), IdentityError> {
        let mut state = self.state.write().unwrap();
        if embedding.dimension() != state.dimension {
            return Err(IdentityError::DimensionMismatch {
                expected: state.dimension,
                actual: embedding.dimension(),
            });
        }
        if state.entries.contains_key(employee_id) {
            return Err(IdentityError::Duplicate(employee_id.to_string()));
        }
        state.entries.insert(employee_id.to_string(), embedding.0.clone());
        Ok(())
    }

    pub fn remove(&self, employee_id: &str) -> bool {
        self.state.write().unwrap().entries.remove(employee_id).is_some()
    }

    /// The `k` nearest enrolled identities by cosine similarity, descending,
    /// ties broken lexicographically by employee id. Empty if the index is
    /// empty or `k` is zero. The caller compares `similarity` against its
    /// own identify/re-id thresholds.
    pub fn query(&self, embedding: &Embedding, k: usize) -> Vec<IdentityMatch> {
        let state = self.state.read().unwrap();
        let mut matches: Vec<IdentityMatch> = state
            .entries
            .iter()
            .map(|(id, vector)| {
                let similarity: f32 = vector.iter().zip(embedding.0.iter()).map(|(a, b)| a * b).sum();
                IdentityMatch { employee_id: id.clone(), similarity }
            })
            .collect();

        matches.sort_by(|a, b| b.similarity.total_cmp(&a.similarity).then_with(|| a.employee_id.cmp(&b.employee_id)));
        matches.truncate(k);
        matches
    }

    pub fn len(&self) -> usize {
        self.state.read().unwrap().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, employee_id: &str) -> bool {
        self.state.read().unwrap().entries.contains_key(employee_id)
    }

    /// Write the current index to disk.
    pub fn persist(&self) -> Result<(), IdentityError> {
        let state = self.state.read().unwrap();
        let records: Vec<IndexRecord> = state
            .entries
            .iter()
            .map(|(id, vector)| IndexRecord { id: id.clone(), vector: vector.clone() })
            .collect();

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let tmp_path = self.path.with_extension("tmp");
        let mut file = std::fs::File::create(&tmp_path)?;
        format::write_index(&mut file, state.dimension, &records)?;
        std::fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    fn scratch_path(name: &str) -> PathBuf {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        std::env::temp_dir().join(format!("fts-identity-test-{}-{}-{}", std::process::id(), n, name))
    }

    fn embedding(values: &[f32]) -> Embedding {
        let norm: f32 = values.iter().map(|v| v * v).sum::<f32>().sqrt();
        Embedding(values.iter().map(|v| v / norm).collect())
    }

    #[test]
    fn test_add_and_query_returns_closest() {
        let index = IdentityIndex::load(&scratch_path("query"), 2).unwrap();
        index.add("alice", &embedding(&[1.0, 0.0])).unwrap();
        index.add("bob", &embedding(&[0.0, 1.0])).unwrap();

        let results = index.query(&embedding(&[0.9, 0.1]), 1);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].employee_id, "alice");
    }

    #[test]
    fn test_query_returns_top_k_descending() {
        let index = IdentityIndex::load(&scratch_path("query-topk"), 2).unwrap();
        index.add("alice", &embedding(&[1.0, 0.0])).unwrap();
        index.add("bob", &embedding(&[0.9, 0.1])).unwrap();
        index.add("carol", &embedding(&[0.0, 1.0])).unwrap();

        let results = index.query(&embedding(&[1.0, 0.0]), 2);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].employee_id, "alice");
        assert_eq!(results[1].employee_id, "bob");
    }

    #[test]
    fn test_query_ties_break_lexicographically() {
        let index = IdentityIndex::load(&scratch_path("query-tie"), 2).unwrap();
        index.add("bob", &embedding(&[1.0, 0.0])).unwrap();
        index.add("alice", &embedding(&[1.0, 0.0])).unwrap();

        let results = index.query(&embedding(&[1.0, 0.0]), 2);
        assert_eq!(results[0].employee_id, "alice");
        assert_eq!(results[1].employee_id, "bob");
    }

    #[test]
    fn test_query_k_zero_returns_empty() {
        let index = IdentityIndex::load(&scratch_path("query-k0"), 2).unwrap();
        index.add("alice", &embedding(&[1.0, 0.0])).unwrap();
        assert!(index.query(&embedding(&[1.0, 0.0]), 0).is_empty());
    }

    #[test]
    fn test_add_rejects_duplicate() {
        let index = IdentityIndex::load(&scratch_path("dup"), 2).unwrap();
        index.add("alice", &embedding(&[1.0, 0.0])).unwrap();
        assert!(index.add("alice", &embedding(&[0.0, 1.0])).is_err());
    }

    #[test]
    fn test_add_rejects_dimension_mismatch() {
        let index = IdentityIndex::load(&scratch_path("dim"), 3).unwrap();
        assert!(index.add("alice", &embedding(&[1.0, 0.0])).is_err());
    }

    #[test]
    fn test_persist_and_reload_round_trip() {
        let path = scratch_path("persist");
        let index = IdentityIndex::load(&path, 2).unwrap();
        index.add("alice", &embedding(&[1.0, 0.0])).unwrap();
        index.persist().unwrap();

        let reloaded = IdentityIndex::load(&path, 2).unwrap();
        assert_eq!(reloaded.len(), 1);
        assert!(reloaded.contains("alice"));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_remove() {
        let index = IdentityIndex::load(&scratch_path("remove"), 2).unwrap();
        index.add("alice", &embedding(&[1.0, 0.0])).unwrap();
        assert!(index.remove("alice"));
        assert!(!index.remove("alice"));
        assert!(index.is_empty());
    }
}
