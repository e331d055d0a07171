//!
//! Optional on-disk snapshot of the store, so a restart doesn't refetch every profile.
//!
//! The file holds payloads and fetch times only. Whether a payload is trusted
//! is decided again on load.
//!

use std::{fs, io, path::Path};

use serde::{Deserialize, Serialize};

use crate::{error::SnapshotError, time::Timestamp, Identity, ProfileRecord, TexturePayload};

const SNAPSHOT_VERSION: u8 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    version: u8,
    records: Vec<PersistedRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct PersistedRecord {
    pub identity: Identity,
    pub payload: TexturePayload,
    pub fetched_at: Timestamp,
}

/// Writes `records` to `path` atomically by renaming a temporary sibling file.
pub(crate) fn write_snapshot(path: &Path, records: Vec<ProfileRecord>) -> Result<(), SnapshotError> {
    let snapshot = Snapshot {
        version: SNAPSHOT_VERSION,
        records: records
            .into_iter()
            .map(|record| PersistedRecord {
                identity: record.identity().clone(),
                fetched_at: record.fetched_at(),
                payload: record.into_payload(),
            })
            .collect(),
    };
    let bytes = serde_json::to_vec_pretty(&snapshot)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Reads a snapshot. A missing file is an empty snapshot.
pub(crate) fn read_snapshot(path: &Path) -> Result<Vec<PersistedRecord>, SnapshotError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    let snapshot: Snapshot = serde_json::from_slice(&bytes)?;
    if snapshot.version != SNAPSHOT_VERSION {
        return Err(SnapshotError::UnsupportedVersion(snapshot.version));
    }
    Ok(snapshot.records)
}
