// State module - Instance records and their persistent store

mod store;

pub use store::{InstanceStore, JsonFileStore, MemoryStore};

use crate::error::{Result, WatchdeckError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// All known instances keyed by instance id
pub type InstanceMap = BTreeMap<String, InstanceRecord>;

/// Persisted record for one supervised monitor process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceRecord {
    pub id: String,
    pub name: String,
    pub target: String,
    #[serde(default)]
    pub process_id: Option<u32>,
    /// Liveness seen by the last reconciliation. Advisory only.
    #[serde(default)]
    pub running_hint: bool,
    pub created_at: DateTime<Utc>,
}

impl InstanceRecord {
    pub fn new(id: String, name: String, target: String, process_id: u32) -> Self {
        Self {
            id,
            name,
            target,
            process_id: Some(process_id),
            running_hint: true,
            created_at: Utc::now(),
        }
    }
}

/// Check that an instance name can be used as a log file basename
pub fn validate_name(name: &str) -> Result<()> {
    let unsafe_name = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\', '\0']);

    if unsafe_name {
        return Err(WatchdeckError::InvalidName(name.to_string()));
    }

    Ok(())
}

/// Pick a time-based id that no record in `instances` already uses
///
/// Ids are unix seconds; a collision within the same second bumps the value
/// until it is free.
pub fn next_instance_id(instances: &InstanceMap, now: DateTime<Utc>) -> String {
    let mut candidate = now.timestamp();
    while instances.contains_key(&candidate.to_string()) {
        candidate += 1;
    }
    candidate.to_string()
}
