//! Durable per-agent records.
//!
//! Everything the engine knows about one agent is saved under a single
//! namespaced key in the host's agent data: every non-empty handle blob, the
//! simulated-time bookkeeping, and any species auxiliary blobs. A missing key
//! on load means "start from defaults".

use ecotope_core::component::{Blob, SimulatedTime};
use ecotope_core::error::{EcotopeError, PersistenceError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Key under which the engine's record lives in the host's agent data.
pub const RECORD_KEY: &str = "ecotope";

/// Current record layout.
pub const RECORD_VERSION: u32 = 1;

fn current_version() -> u32 {
    RECORD_VERSION
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AgentRecord {
    #[serde(default = "current_version")]
    pub version: u32,
    /// Handle id to blob, as produced by each handle's `save` hook.
    #[serde(default)]
    pub handles: BTreeMap<String, Blob>,
    #[serde(default)]
    pub time: SimulatedTime,
    /// Species-specific side records.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub aux: BTreeMap<String, Blob>,
}

impl AgentRecord {
    pub fn new(handles: BTreeMap<String, Blob>, time: SimulatedTime, aux: BTreeMap<String, Blob>) -> Self {
        Self {
            version: RECORD_VERSION,
            handles,
            time,
            aux,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty() && self.aux.is_empty() && self.time == SimulatedTime::default()
    }

    /// Wrap as `{ "ecotope": { .. } }` for the host's agent data.
    pub fn to_namespaced(&self) -> Result<Blob> {
        let mut outer = serde_json::Map::new();
        outer.insert(RECORD_KEY.to_string(), serde_json::to_value(self)?);
        Ok(Blob::Object(outer))
    }

    /// Read a record out of the host's agent data. `Ok(None)` when the key
    /// is absent.
    pub fn from_namespaced(data: &Blob) -> Result<Option<Self>> {
        let Some(inner) = data.get(RECORD_KEY) else {
            return Ok(None);
        };
        Self::decode(inner.clone()).map(Some)
    }

    /// Decode a bare record, rejecting layouts newer than this build knows.
    pub fn decode(value: Blob) -> Result<Self> {
        let record: AgentRecord =
            serde_json::from_value(value).map_err(|e| EcotopeError::corrupt(format!("agent record: {e}")))?;
        if record.version > RECORD_VERSION {
            return Err(PersistenceError::VersionMismatch {
                expected: RECORD_VERSION,
                found: record.version,
            }
            .into());
        }
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> AgentRecord {
        let mut handles = BTreeMap::new();
        handles.insert("hunger".to_string(), json!({ "hunger": 40.0, "last_damage": null }));
        handles.insert("age".to_string(), json!({ "age": 1200 }));
        let mut aux = BTreeMap::new();
        aux.insert("trades".to_string(), json!([1, 2, 3]));
        AgentRecord::new(
            handles,
            SimulatedTime {
                last_observed: Some(5_000),
                simulated_steps: 4_321,
            },
            aux,
        )
    }

    #[test]
    fn namespaced_round_trip() {
        let record = sample();
        let data = record.to_namespaced().unwrap();
        assert!(data.get(RECORD_KEY).is_some());
        assert_eq!(AgentRecord::from_namespaced(&data).unwrap(), Some(record));
    }

    #[test]
    fn absent_key_means_defaults() {
        assert_eq!(AgentRecord::from_namespaced(&json!({ "Health": 10 })).unwrap(), None);
        assert_eq!(AgentRecord::from_namespaced(&Blob::Null).unwrap(), None);
    }

    #[test]
    fn minimal_records_fill_in_defaults() {
        let record = AgentRecord::from_namespaced(&json!({ "ecotope": {} })).unwrap().unwrap();
        assert_eq!(record.version, RECORD_VERSION);
        assert!(record.is_empty());
    }

    #[test]
    fn newer_or_garbled_records_are_rejected() {
        let newer = json!({ "ecotope": { "version": RECORD_VERSION + 1 } });
        assert!(matches!(
            AgentRecord::from_namespaced(&newer),
            Err(EcotopeError::Persistence(PersistenceError::VersionMismatch { .. }))
        ));
        let garbled = json!({ "ecotope": { "handles": 7 } });
        assert!(matches!(
            AgentRecord::from_namespaced(&garbled),
            Err(EcotopeError::Persistence(PersistenceError::Corrupt(_)))
        ));
    }
}
