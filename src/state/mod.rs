//! Flat snapshots of the engine's restorable state.
//!
//! A snapshot is an order-independent list of entries: parameter base
//! values by stable string id, and each slot's source and target binding.
//! Back-reference sets are deliberately absent. Restoring re-runs the
//! router's reassignment algorithm per slot, so the bidirectional binding
//! is rebuilt from scratch and can never be restored inconsistently.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// One restorable fact about the engine.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub enum SnapshotEntry {
    /// A parameter's base value in plain units.
    ParamBase { id: String, plain: f32 },
    /// A slot's source id.
    SlotSource { slot: usize, source: usize },
    /// A slot's target parameter, by stable id. `None` is unbound.
    SlotTarget { slot: usize, target: Option<String> },
}

/// The full restorable state. The default snapshot restores an engine to
/// all slots unbound, which is also the fallback for a malformed blob.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub entries: Vec<SnapshotEntry>,
}

/// Failure to decode a serialized snapshot.
#[cfg(feature = "serde")]
#[derive(Debug, thiserror::Error)]
#[error("malformed state blob: {0}")]
pub struct StateError(#[from] serde_json::Error);

#[cfg(feature = "serde")]
impl Snapshot {
    pub fn from_json(bytes: &[u8]) -> Result<Self, StateError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn to_json(&self) -> Result<Vec<u8>, StateError> {
        Ok(serde_json::to_vec(self)?)
    }
}
