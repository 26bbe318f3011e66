use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use mongodb::{
    bson::serde_helpers::chrono_datetime_as_bson_datetime, error::Error as DbError,
};
use serde::{Deserialize, Serialize};

use crate::model::{
    common::{address::WalletAddress, permissions::Permissions},
    mongodb::{Coll, Id},
};
use crate::Config;

pub const DEFAULT_ADMIN_USERNAME: &str = "admin";

/// Core admin user data.
///
/// The password is only ever stored as an argon2 encoded hash; the hash is
/// computed exactly once, when the credentials are accepted.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminCore {
    pub name: String,
    /// Unique, always lowercase.
    pub username: String,
    pub password_hash: String,
    /// Optional wallet binding for signature login; unique where present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wallet_address: Option<WalletAddress>,
    pub permissions: Permissions,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl AdminCore {
    /// Check whether the given password is correct.
    pub fn verify_password<T: AsRef<[u8]>>(&self, password: T) -> bool {
        // Unwrap safe because the only way to create an AdminCore is via
        // TryFrom<NewAdminRequest>, so the hash is always well-formed.
        argon2::verify_encoded(&self.password_hash, password.as_ref()).unwrap()
    }
}

/// An admin without an ID.
pub type NewAdmin = AdminCore;

/// An admin user from the database, with its unique ID.
#[derive(Debug, Serialize, Deserialize)]
pub struct Admin {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub admin: AdminCore,
}

impl Deref for Admin {
    type Target = AdminCore;

    fn deref(&self) -> &Self::Target {
        &self.admin
    }
}

impl DerefMut for Admin {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.admin
    }
}

/// Ensure there is at least one admin able to log in, so a fresh deployment
/// is not locked out. The bootstrap admin gets every permission and is bound
/// to the configured platform wallet address.
pub async fn ensure_admin_exists(admins: &Coll<NewAdmin>, config: &Config) -> Result<(), DbError> {
    let count = admins.count_documents(None, None).await?;
    if count > 0 {
        return Ok(());
    }

    warn!("No admins exist; creating default admin '{DEFAULT_ADMIN_USERNAME}'");
    let admin = NewAdmin {
        name: "Default Administrator".to_string(),
        username: DEFAULT_ADMIN_USERNAME.to_string(),
        password_hash: hash_password(config.default_admin_password()),
        wallet_address: config.admin_address().parse().ok(),
        permissions: Permissions::all(),
        created_at: Utc::now(),
    };
    admins.insert_one(admin, None).await?;
    Ok(())
}

/// Hash a password with a fresh random salt.
pub fn hash_password(password: &str) -> String {
    use rand::Rng;

    // 16 bytes of salt is the recommended amount for argon2.
    let mut salt = [0_u8; 16];
    rand::thread_rng().fill(&mut salt);
    // Unwrap safe because the default `Config` is valid.
    argon2::hash_encoded(password.as_bytes(), &salt, &argon2::Config::default()).unwrap()
}
