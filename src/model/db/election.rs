use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::{
    common::{address::WalletAddress, election::ElectionStatus},
    mongodb::Id,
};

/// A candidate embedded in an election document, with its running tally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Tally counter, incremented atomically with each accepted ballot.
    #[serde(default)]
    pub votes: u64,
}

/// Core election data.
///
/// Lifecycle state is never stored; see [`ElectionCore::status_at`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionCore {
    pub title: String,
    pub description: String,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub start_date: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub end_date: DateTime<Utc>,
    pub candidates: Vec<Candidate>,
    /// On-chain contract this election is mirrored to; unique per election.
    pub contract_address: WalletAddress,
    /// Set once by the finalize action, never cleared.
    #[serde(default)]
    pub finalized: bool,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl ElectionCore {
    /// The lifecycle state at the given instant, derived from the voting
    /// window and the finalized flag.
    pub fn status_at(&self, now: DateTime<Utc>) -> ElectionStatus {
        if self.finalized {
            ElectionStatus::Finalized
        } else if now < self.start_date {
            ElectionStatus::Pending
        } else if now < self.end_date {
            ElectionStatus::Active
        } else {
            ElectionStatus::Ended
        }
    }

    /// Sum of all candidate tallies.
    pub fn total_votes(&self) -> u64 {
        self.candidates.iter().map(|candidate| candidate.votes).sum()
    }
}

/// An election without an ID.
pub type NewElection = ElectionCore;

/// An election from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Election {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub election: ElectionCore,
}

impl Deref for Election {
    type Target = ElectionCore;

    fn deref(&self) -> &Self::Target {
        &self.election
    }
}

impl DerefMut for Election {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.election
    }
}
