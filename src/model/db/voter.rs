use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::{common::address::WalletAddress, mongodb::Id};

/// Core roster entry data.
///
/// `(election_id, address)` is unique; a wallet may appear on the rosters of
/// many elections but only once per election.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterCore {
    pub election_id: Id,
    pub address: WalletAddress,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub registered_at: DateTime<Utc>,
    /// Flipped exactly once, in the same transaction as the ballot insert.
    #[serde(default)]
    pub has_voted: bool,
}

/// A roster entry without an ID.
pub type NewVoter = VoterCore;

/// A roster entry from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voter {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub voter: VoterCore,
}

impl Deref for Voter {
    type Target = VoterCore;

    fn deref(&self) -> &Self::Target {
        &self.voter
    }
}

impl DerefMut for Voter {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.voter
    }
}

impl NewVoter {
    pub fn new(election_id: Id, address: WalletAddress, name: Option<String>) -> Self {
        Self {
            election_id,
            address,
            name,
            registered_at: Utc::now(),
            has_voted: false,
        }
    }
}
