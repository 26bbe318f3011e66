use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::model::{
    common::{address::WalletAddress, election::ElectionStatus, permissions::Permissions},
    db::admin::{hash_password, Admin, NewAdmin},
};

/// Minimum accepted password length for new admin accounts.
const MIN_PASSWORD_LENGTH: usize = 8;

/// A username/password login attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminCredentials {
    pub username: String,
    pub password: String,
}

/// A request to provision a new admin account.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAdminRequest {
    pub name: String,
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub wallet_address: Option<String>,
    #[serde(default)]
    pub permissions: Permissions,
}

impl TryFrom<NewAdminRequest> for NewAdmin {
    type Error = Error;

    /// Validate the request and hash the password.
    fn try_from(request: NewAdminRequest) -> Result<Self, Self::Error> {
        if request.username.trim().is_empty() {
            return Err(Error::BadRequest("Username is required".to_string()));
        }
        if request.password.len() < MIN_PASSWORD_LENGTH {
            return Err(Error::BadRequest(format!(
                "Password must be at least {MIN_PASSWORD_LENGTH} characters"
            )));
        }
        let wallet_address = request
            .wallet_address
            .as_deref()
            .map(str::parse::<WalletAddress>)
            .transpose()
            .map_err(|err| Error::BadRequest(err.to_string()))?;

        Ok(Self {
            name: request.name,
            username: request.username.trim().to_lowercase(),
            password_hash: hash_password(&request.password),
            wallet_address,
            permissions: request.permissions,
            created_at: Utc::now(),
        })
    }
}

/// The public view of an admin account: everything except the password hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminProfile {
    pub id: String,
    pub name: String,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wallet_address: Option<WalletAddress>,
    pub permissions: Permissions,
}

impl From<&Admin> for AdminProfile {
    fn from(admin: &Admin) -> Self {
        Self {
            id: admin.id.to_hex(),
            name: admin.name.clone(),
            username: admin.username.clone(),
            wallet_address: admin.wallet_address.clone(),
            permissions: admin.permissions,
        }
    }
}

/// An admin profile fetched on its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminProfileResponse {
    pub success: bool,
    pub admin: AdminProfile,
}

impl AdminProfileResponse {
    pub fn new(admin: AdminProfile) -> Self {
        Self {
            success: true,
            admin,
        }
    }
}

/// The full list of admin accounts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminListResponse {
    pub success: bool,
    pub admins: Vec<AdminProfile>,
}

impl AdminListResponse {
    pub fn new(admins: Vec<AdminProfile>) -> Self {
        Self {
            success: true,
            admins,
        }
    }
}

/// Platform-wide counts for the admin dashboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub success: bool,
    pub elections: u64,
    pub active_elections: u64,
    pub registered_voters: u64,
    pub votes_cast: u64,
}

/// Per-election turnout figures for the reports view.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElectionReport {
    pub id: String,
    pub title: String,
    pub status: ElectionStatus,
    pub roster_size: u64,
    pub votes_cast: u64,
    /// Votes cast as a share of the roster, rounded to two decimal places.
    pub turnout: f64,
}

/// The per-election reports, one entry per election.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportsResponse {
    pub success: bool,
    pub reports: Vec<ElectionReport>,
}

impl ReportsResponse {
    pub fn new(reports: Vec<ElectionReport>) -> Self {
        Self {
            success: true,
            reports,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashes_valid_credentials() {
        let request = NewAdminRequest {
            name: "Test Admin".to_string(),
            username: "Tester".to_string(),
            password: "correct horse battery staple".to_string(),
            wallet_address: None,
            permissions: Permissions::read_only(),
        };
        let admin = NewAdmin::try_from(request.clone()).unwrap();
        assert_eq!(admin.username, "tester");
        assert!(admin.verify_password(&request.password));
        assert!(!admin.verify_password("wrong password"));
    }

    #[test]
    fn rejects_short_passwords() {
        let request = NewAdminRequest {
            name: "Test Admin".to_string(),
            username: "tester".to_string(),
            password: "short".to_string(),
            wallet_address: None,
            permissions: Permissions::read_only(),
        };
        assert!(NewAdmin::try_from(request).is_err());
    }

    #[test]
    fn rejects_malformed_wallet_addresses() {
        let request = NewAdminRequest {
            name: "Test Admin".to_string(),
            username: "tester".to_string(),
            password: "a long enough password".to_string(),
            wallet_address: Some("not an address".to_string()),
            permissions: Permissions::read_only(),
        };
        assert!(NewAdmin::try_from(request).is_err());
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl AdminCredentials {
        /// Credentials matching `AdminCore::example`.
        pub fn example() -> Self {
            Self {
                username: "coordinator".to_string(),
                password: "coordinator-passw0rd".to_string(),
            }
        }

        /// Credentials matching `AdminCore::example2`.
        pub fn example2() -> Self {
            Self {
                username: "observer".to_string(),
                password: "observer-passw0rd".to_string(),
            }
        }

        pub fn example_wrong() -> Self {
            Self {
                username: "coordinator".to_string(),
                password: "definitely not the password".to_string(),
            }
        }
    }
}
