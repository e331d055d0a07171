use serde::{Deserialize, Serialize};

use crate::{time::Timestamp, Identity, TexturePayload};

/// Where a [ProfileRecord] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordSource {
    /// Fetched from the upstream identity provider.
    Upstream,
    /// Restored from an on-disk snapshot and verified again on load.
    Snapshot,
}

/// A verified texture entry for one identity.
///
/// Records are only built by this crate after the payload passed signature
/// verification, so [ProfileRecord::verified] always returns `true`. A refresh
/// replaces the whole record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileRecord {
    identity: Identity,
    payload: TexturePayload,
    fetched_at: Timestamp,
    source: RecordSource,
}

impl ProfileRecord {
    pub(crate) fn new_verified(
        identity: Identity,
        payload: TexturePayload,
        fetched_at: Timestamp,
        source: RecordSource,
    ) -> Self {
        Self {
            identity,
            payload,
            fetched_at,
            source,
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn payload(&self) -> &TexturePayload {
        &self.payload
    }

    pub fn fetched_at(&self) -> Timestamp {
        self.fetched_at
    }

    pub fn source(&self) -> RecordSource {
        self.source
    }

    pub fn verified(&self) -> bool {
        true
    }

    pub fn into_payload(self) -> TexturePayload {
        self.payload
    }
}
