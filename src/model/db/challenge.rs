use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{auth::Rights, common::cedula::Cedula};
use crate::Config;

/// Bytes of entropy in a challenge nonce.
const NONCE_LENGTH: usize = 8;

/// A single-use login challenge.
///
/// Challenges are deleted when consumed; the TTL index on `expire_at` reaps
/// the ones that never come back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Challenge {
    /// Hex-encoded random nonce, unique.
    pub nonce: String,
    /// Which kind of login this challenge was issued for.
    pub audience: Rights,
    /// For voter challenges, the identity that passed the ID gate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cedula: Option<Cedula>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub expire_at: DateTime<Utc>,
}

impl Challenge {
    /// A challenge for an admin signature login.
    pub fn for_admin(config: &Config) -> Self {
        Self {
            nonce: random_nonce(),
            audience: Rights::Admin,
            cedula: None,
            expire_at: Utc::now() + chrono::Duration::seconds(config.nonce_ttl().into()),
        }
    }

    /// A challenge for a voter login, recording the verified cédula.
    pub fn for_voter(cedula: Cedula, config: &Config) -> Self {
        Self {
            nonce: random_nonce(),
            audience: Rights::Voter,
            cedula: Some(cedula),
            expire_at: Utc::now() + chrono::Duration::seconds(config.nonce_ttl().into()),
        }
    }

    /// The exact text the client must sign.
    pub fn message(&self) -> String {
        format!("{}{}", Self::message_prefix(self.audience), self.nonce)
    }

    /// Recover the nonce from a signed message, if it has the expected shape
    /// for the given audience.
    pub fn nonce_from_message(message: &str, audience: Rights) -> Option<&str> {
        message.strip_prefix(Self::message_prefix(audience))
    }

    fn message_prefix(audience: Rights) -> &'static str {
        match audience {
            Rights::Admin => "Iniciar sesión como administrador: ",
            Rights::Voter => "Iniciar sesión como votante: ",
        }
    }
}

fn random_nonce() -> String {
    use rand::Rng;

    let mut bytes = [0_u8; NONCE_LENGTH];
    rand::thread_rng().fill(&mut bytes);
    data_encoding::HEXLOWER.encode(&bytes)
}
