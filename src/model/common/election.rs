use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// States in the election lifecycle.
///
/// This is a projection of the stored election document at a given instant,
/// never a stored field: `pending`/`active`/`ended` follow from the time
/// window, and `finalized` from the irreversible finalize action. An admin
/// "end now" truncates the window rather than writing a state.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElectionStatus {
    /// Not yet open; the roster may still be changed.
    Pending,
    /// Within the voting window; votes are accepted.
    Active,
    /// Past the voting window (or ended early); awaiting finalization.
    Ended,
    /// Results sealed; terminal.
    Finalized,
}

impl Display for ElectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Ended => "ended",
            Self::Finalized => "finalized",
        };
        write!(f, "{name}")
    }
}
