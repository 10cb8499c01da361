// Aggregate state: latest record per upstream, owned by the hub task

use std::collections::HashMap;

use crate::models::{ServerId, StatusRecord};
use crate::ordering;

/// Latest known status per server. The key set only grows; a failing server stays
/// present as offline.
#[derive(Debug, Default, Clone)]
pub struct AggregateState {
    records: HashMap<ServerId, StatusRecord>,
}

impl AggregateState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the entry for `record.server` wholesale (last write wins).
    pub fn merge(&mut self, record: StatusRecord) {
        self.records.insert(record.server.clone(), record);
    }

    /// All records in snapshot order. Pure: unchanged state yields identical output.
    pub fn snapshot(&self) -> Vec<StatusRecord> {
        let mut records: Vec<StatusRecord> = self.records.values().cloned().collect();
        ordering::sort_records(&mut records);
        records
    }

    pub fn get(&self, server: &ServerId) -> Option<&StatusRecord> {
        self.records.get(server)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
