use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// Placeholder transaction hash recorded until the on-chain mirror confirms.
pub const PENDING_TX_HASH: &str = "pending";

/// Core ballot data.
///
/// Immutable once written. `(election_id, voter_id)` is unique, which is the
/// authoritative guard against duplicate ballots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteCore {
    pub election_id: Id,
    pub voter_id: Id,
    /// Index into the election's candidate list.
    pub candidate: u32,
    /// The voter's signature over their ballot, kept for audit.
    pub signature: String,
    pub transaction_hash: String,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub cast_at: DateTime<Utc>,
}

/// A ballot without an ID.
pub type NewVote = VoteCore;

/// A ballot from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub vote: VoteCore,
}

impl Deref for Vote {
    type Target = VoteCore;

    fn deref(&self) -> &Self::Target {
        &self.vote
    }
}

impl DerefMut for Vote {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.vote
    }
}

impl NewVote {
    pub fn new(election_id: Id, voter_id: Id, candidate: u32, signature: String) -> Self {
        Self {
            election_id,
            voter_id,
            candidate,
            signature,
            transaction_hash: PENDING_TX_HASH.to_string(),
            cast_at: Utc::now(),
        }
    }
}
