//! Key-based history tracking across versions.
//!
//! A `DiffInstruction` names the types to follow and how to extract a
//! natural key from each object. The `HistoryTracker` uses those keys, not
//! ordinals, to pair up objects between consecutive loaded versions.

mod history;
mod instruction;

pub use history::{HistoricalState, HistoryTracker, TransitionKind, TransitionRecord, TypeChangeSummary};
pub use instruction::{DiffInstruction, TypeDiffInstruction};
