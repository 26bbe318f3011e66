use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{db::vote::VoteCore, mongodb::Id};

/// A ballot submission from an authenticated voter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteSpec {
    /// Index into the election's candidate list.
    pub candidate_id: u32,
    /// The voter's signature over their ballot.
    pub signature: String,
}

/// The public view of a recorded ballot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteDescription {
    pub id: String,
    pub election_id: String,
    pub candidate: u32,
    pub transaction_hash: String,
    pub cast_at: DateTime<Utc>,
}

impl VoteDescription {
    pub fn new(id: Id, vote: &VoteCore) -> Self {
        Self {
            id: id.to_hex(),
            election_id: vote.election_id.to_hex(),
            candidate: vote.candidate,
            transaction_hash: vote.transaction_hash.clone(),
            cast_at: vote.cast_at,
        }
    }
}

/// Confirmation of an accepted ballot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteReceipt {
    pub message: String,
    pub vote: VoteDescription,
}

impl VoteReceipt {
    pub fn new(vote: VoteDescription) -> Self {
        Self {
            message: "Vote recorded".to_string(),
            vote,
        }
    }
}
