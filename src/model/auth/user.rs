use std::fmt::Display;

use mongodb::bson::Bson;
use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};

use crate::model::{
    common::{address::WalletAddress, cedula::Cedula},
    db::admin::Admin,
};

/// A user type that can authenticate against the API.
pub trait User {
    const RIGHTS: Rights;

    /// The stable identifier written into the token subject.
    fn subject(&self) -> String;

    fn username(&self) -> Option<String> {
        None
    }

    fn cedula(&self) -> Option<Cedula> {
        None
    }
}

/// The rights levels a token can carry.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum Rights {
    Voter = 0,
    Admin = 1,
}

impl Display for Rights {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            formatter,
            "{}",
            match self {
                Self::Voter => "voter",
                Self::Admin => "admin",
            }
        )
    }
}

impl From<Rights> for Bson {
    fn from(rights: Rights) -> Self {
        Bson::Int32(rights as u8 as i32)
    }
}

impl User for Admin {
    const RIGHTS: Rights = Rights::Admin;

    fn subject(&self) -> String {
        self.id.to_hex()
    }

    fn username(&self) -> Option<String> {
        Some(self.username.clone())
    }
}

/// The identity of an authenticated voter.
///
/// Voters have no stored account; everything we know about them is their
/// wallet and the cédula that passed the ID gate, both carried in the token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterIdentity {
    pub address: WalletAddress,
    pub cedula: Cedula,
}

impl User for VoterIdentity {
    const RIGHTS: Rights = Rights::Voter;

    fn subject(&self) -> String {
        self.address.as_str().to_string()
    }

    fn cedula(&self) -> Option<Cedula> {
        Some(self.cedula.clone())
    }
}
