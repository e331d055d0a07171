//!
//! In-memory mapping from [Identity] to its current [ProfileRecord].
//!
//! Backed by a sharded concurrent map, so readers and writers of different
//! identities never contend on a single lock. The store never fails: absence
//! is a normal return value.
//!

use std::time::Duration;

use dashmap::{mapref::entry::Entry, DashMap};

use crate::{time::Timestamp, Identity, ProfileRecord};

#[derive(Debug, Default)]
pub struct ProfileStore {
    records: DashMap<Identity, ProfileRecord>,
}

impl ProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, identity: &Identity) -> Option<ProfileRecord> {
        self.records.get(identity).map(|entry| entry.value().clone())
    }

    /// Stores `record` under its own identity, replacing any previous record.
    pub fn put(&self, record: ProfileRecord) -> Option<ProfileRecord> {
        self.records.insert(record.identity().clone(), record)
    }

    /// Stores `record` unless the held record was fetched at the same time or later.
    ///
    /// The comparison and the write happen under the same shard lock.
    pub fn put_if_newer(&self, record: ProfileRecord) -> bool {
        match self.records.entry(record.identity().clone()) {
            Entry::Occupied(mut entry) => {
                if entry.get().fetched_at() >= record.fetched_at() {
                    return false;
                }
                entry.insert(record);
                true
            }
            Entry::Vacant(entry) => {
                entry.insert(record);
                true
            }
        }
    }

    pub fn invalidate(&self, identity: &Identity) -> Option<ProfileRecord> {
        self.records.remove(identity).map(|(_, record)| record)
    }

    /// Whether `record` is older than `ttl`. A record exactly `ttl` old is still fresh.
    pub fn is_stale(record: &ProfileRecord, ttl: Duration) -> bool {
        Self::is_stale_at(record, ttl, Timestamp::now())
    }

    pub fn is_stale_at(record: &ProfileRecord, ttl: Duration, now: Timestamp) -> bool {
        now.saturating_duration_since(record.fetched_at()) > ttl
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&self) {
        self.records.clear();
    }

    /// Copy of every record currently held, in no particular order.
    pub fn records(&self) -> Vec<ProfileRecord> {
        self.records
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }
}
