use serde::{Deserialize, Serialize};

use crate::model::api::admin::AdminProfile;

/// A request for a login challenge from a voter, gated on their cédula.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallengeRequest {
    /// Raw cédula as typed; separators are tolerated.
    pub cedula: String,
}

/// A signed challenge coming back for verification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignatureLoginRequest {
    /// The wallet the client claims to control.
    pub address: String,
    /// Personal-sign signature over `message`.
    pub signature: String,
    /// The full challenge message that was signed.
    pub message: String,
}

/// A freshly issued challenge message for the client to sign.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallengeResponse {
    pub success: bool,
    pub message: String,
}

impl ChallengeResponse {
    pub fn new(message: String) -> Self {
        Self {
            success: true,
            message,
        }
    }
}

/// A successful admin login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminLoginResponse {
    pub success: bool,
    pub token: String,
    pub admin: AdminProfile,
}

impl AdminLoginResponse {
    pub fn new(token: String, admin: AdminProfile) -> Self {
        Self {
            success: true,
            token,
            admin,
        }
    }
}

/// A successful voter login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoterLoginResponse {
    pub success: bool,
    pub token: String,
    /// The wallet address the token was issued to.
    pub address: String,
}

impl VoterLoginResponse {
    pub fn new(token: String, address: String) -> Self {
        Self {
            success: true,
            token,
            address,
        }
    }
}
