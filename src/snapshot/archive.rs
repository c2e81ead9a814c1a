//! Durable sled-backed snapshot archive.

use std::path::Path;

use sled::{Db, Tree};

use crate::error::StorageError;
use crate::snapshot::Snapshot;

const TREE_SNAPSHOTS: &str = "ctx_snapshots";
const KEY_PAD: usize = 20;

/// Append-only store of snapshots keyed by creation time then id.
#[derive(Clone)]
pub struct SnapshotArchive {
    db: Db,
    snapshots: Tree,
}

impl SnapshotArchive {
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        Self::new(sled::open(path)?)
    }

    pub fn new(db: Db) -> Result<Self, StorageError> {
        let snapshots = db.open_tree(TREE_SNAPSHOTS)?;
        Ok(Self { db, snapshots })
    }

    pub fn put(&self, snapshot: &Snapshot) -> Result<(), StorageError> {
        let key = encode_key(snapshot, self.db.generate_id()?);
        let value = serde_json::to_vec(snapshot)?;
        self.snapshots.insert(key.as_bytes(), value)?;
        Ok(())
    }

    /// All archived snapshots, oldest first.
    pub fn load_all(&self) -> Result<Vec<Snapshot>, StorageError> {
        let mut out = Vec::new();
        for entry in self.snapshots.iter() {
            let (_, value) = entry?;
            out.push(serde_json::from_slice(&value)?);
        }
        Ok(out)
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn flush(&self) -> Result<(), StorageError> {
        self.db.flush()?;
        Ok(())
    }
}

/// `{millis}:{sequence}:{id}`; the sequence orders snapshots taken in the same millisecond.
fn encode_key(snapshot: &Snapshot, sequence: u64) -> String {
    let millis = snapshot.timestamp.timestamp_millis().max(0);
    format!("{millis:0KEY_PAD$}:{sequence:0KEY_PAD$}:{}", snapshot.id)
}
