//! Session persistence — save/load agent records and spawn placements.
//!
//! Snapshots every tracked agent's durable record together with the spawn
//! placements of loaded cells into one JSON file. Hosts with their own save
//! format store [`AgentRecord`]s directly and never need this module; it
//! exists for standalone simulations and tests.

use crate::engine::Engine;
use crate::placements::CellPlacements;
use crate::record::{AgentRecord, RECORD_VERSION};
use ecotope_core::component::Blob;
use ecotope_core::error::{PersistenceError, Result};
use ecotope_core::types::{AgentId, CellKey, Tick};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Serializable snapshot of an engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionState {
    pub metadata: SessionMetadata,
    #[serde(default)]
    pub agents: Vec<SavedAgent>,
    #[serde(default)]
    pub cells: Vec<SavedCell>,
}

/// Session metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMetadata {
    pub session_id: String,
    pub version: u32,
    pub tick: Tick,
    pub agent_count: usize,
    #[serde(default)]
    pub cell_count: usize,
}

/// One agent's record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedAgent {
    pub id: AgentId,
    pub record: AgentRecord,
}

/// One cell's placement record, in the same shape the host would store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedCell {
    pub cell: CellKey,
    pub record: Blob,
}

impl SessionState {
    /// Record of one agent, if it was captured.
    pub fn record(&self, id: AgentId) -> Option<&AgentRecord> {
        self.agents.iter().find(|a| a.id == id).map(|a| &a.record)
    }
}

/// Snapshot the engine without touching it.
pub fn capture_session(engine: &Engine) -> Result<SessionState> {
    let mut agents: Vec<SavedAgent> = engine
        .agent_ids()
        .filter_map(|id| engine.save(id).map(|record| SavedAgent { id, record }))
        .collect();
    agents.sort_by_key(|a| a.id);

    let mut cells = Vec::new();
    for (cell, placements) in engine.placements().cells() {
        if !placements.is_empty() {
            cells.push(SavedCell {
                cell: cell.clone(),
                record: placements.to_blob()?,
            });
        }
    }
    cells.sort_by(|a, b| a.cell.cmp(&b.cell));

    Ok(SessionState {
        metadata: SessionMetadata {
            session_id: uuid::Uuid::new_v4().to_string(),
            version: RECORD_VERSION,
            tick: engine.stats().tick,
            agent_count: agents.len(),
            cell_count: cells.len(),
        },
        agents,
        cells,
    })
}

/// Save the engine's agents and placements to a JSON file.
pub fn save_session(engine: &Engine, path: &Path) -> Result<SessionState> {
    let state = capture_session(engine)?;
    let json = serde_json::to_string_pretty(&state)?;

    // Create parent directory if needed
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, json)?;

    info!(
        path = %path.display(),
        agents = state.metadata.agent_count,
        cells = state.metadata.cell_count,
        "session saved"
    );
    Ok(state)
}

/// Load a saved session from JSON.
pub fn load_session(path: &Path) -> Result<SessionState> {
    let json = std::fs::read_to_string(path)?;
    let state: SessionState = serde_json::from_str(&json)?;
    if state.metadata.version > RECORD_VERSION {
        return Err(PersistenceError::VersionMismatch {
            expected: RECORD_VERSION,
            found: state.metadata.version,
        }
        .into());
    }
    Ok(state)
}

/// Put the saved placements back into the engine. Agents are restored by
/// the host through [`Engine::load`] as it brings each one back, using
/// [`SessionState::record`].
pub fn restore_placements(engine: &mut Engine, state: &SessionState) -> Result<usize> {
    let mut restored = 0;
    for saved in &state.cells {
        let placements = CellPlacements::from_blob(&saved.record)?;
        if !placements.is_empty() {
            engine.placements_mut().insert(saved.cell.clone(), placements);
            restored += 1;
        }
    }
    Ok(restored)
}
