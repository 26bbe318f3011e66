use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::db::voter::Voter;

/// A request to add a single wallet to an election's roster.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddVoterRequest {
    pub voter_address: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// A request to add many wallets at once: addresses separated by commas or
/// whitespace, validated all-or-nothing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkAddRequest {
    pub addresses: String,
}

/// The public view of a roster entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoterDescription {
    pub id: String,
    pub address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub registered_at: DateTime<Utc>,
    pub has_voted: bool,
}

impl From<&Voter> for VoterDescription {
    fn from(voter: &Voter) -> Self {
        Self {
            id: voter.id.to_hex(),
            address: voter.address.as_str().to_string(),
            name: voter.name.clone(),
            registered_at: voter.registered_at,
            has_voted: voter.has_voted,
        }
    }
}

/// An election's full roster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RosterResponse {
    pub success: bool,
    pub voters: Vec<VoterDescription>,
}

impl RosterResponse {
    pub fn new(voters: Vec<VoterDescription>) -> Self {
        Self {
            success: true,
            voters,
        }
    }
}

/// Outcome of a bulk roster addition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkAddResponse {
    pub success: bool,
    /// Entries actually inserted.
    pub added: u64,
    /// Entries already on the roster, skipped.
    pub skipped: u64,
}
