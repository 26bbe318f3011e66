use std::marker::PhantomData;

use chrono::{serde::ts_seconds, DateTime, Utc};
use jsonwebtoken::{
    errors::{Error as JwtError, ErrorKind as JwtErrorKind},
    DecodingKey, EncodingKey, Header, TokenData, Validation,
};
use rocket::{
    http::Status,
    request::{self, FromRequest},
    Request, State,
};
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::model::common::cedula::Cedula;
use crate::Config;

use super::user::{Rights, User};

/// The header clients present their token in.
pub const AUTH_TOKEN_HEADER: &str = "x-auth-token";

/// An authentication token representing a specific user with specific rights.
#[derive(Serialize, Deserialize)]
pub struct AuthToken<U> {
    /// Admin ID or voter wallet address, depending on the rights.
    sub: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cedula: Option<Cedula>,
    #[serde(rename = "rgt")]
    rights: Rights,
    #[serde(skip)]
    phantom: PhantomData<U>,
}

impl<U> AuthToken<U> {
    pub fn subject(&self) -> &str {
        &self.sub
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn cedula(&self) -> Option<&Cedula> {
        self.cedula.as_ref()
    }

    pub fn rights(&self) -> Rights {
        self.rights
    }

    /// Does this token permit the given rights?
    pub fn permits(&self, target: Rights) -> bool {
        self.rights == target
    }
}

impl<U> AuthToken<U>
where
    U: User,
{
    /// Create a new [`AuthToken`] for the given user, with the correct rights
    /// for that user type.
    pub fn new(user: &U) -> Self {
        Self {
            sub: user.subject(),
            username: user.username(),
            cedula: user.cedula(),
            rights: U::RIGHTS,
            phantom: PhantomData,
        }
    }

    /// Serialize this token into its signed wire form.
    pub fn encode(self, config: &Config) -> String {
        let claims = Claims {
            token: self,
            expire_at: Utc::now() + config.auth_ttl(),
        };

        jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.jwt_secret()),
        )
        .unwrap() // Infallible.
    }

    /// Deserialize and verify a token from its wire form.
    pub fn decode(token: &str, config: &Config) -> Result<Self, JwtError> {
        jsonwebtoken::decode(
            token,
            &DecodingKey::from_secret(config.jwt_secret()),
            &Validation::default(),
        )
        .map(|claims: TokenData<Claims<U>>| claims.claims.token)
    }
}

/// Token claims: the token itself plus an expiry datetime.
#[derive(Serialize, Deserialize)]
struct Claims<U> {
    #[serde(flatten, bound = "")]
    token: AuthToken<U>,
    #[serde(rename = "exp", with = "ts_seconds")]
    expire_at: DateTime<Utc>,
}

#[rocket::async_trait]
impl<'r, U> FromRequest<'r> for AuthToken<U>
where
    U: User,
{
    type Error = Error;

    /// Get an AuthToken from the `x-auth-token` header and verify that it has
    /// the correct rights for this user type.
    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let config = req.guard::<&State<Config>>().await.unwrap(); // Valid as `Config` is always managed

        let header = match req.headers().get_one(AUTH_TOKEN_HEADER) {
            Some(header) => header,
            None => {
                return request::Outcome::Failure((
                    Status::Unauthorized,
                    Error::Unauthorized("Authentication token required".to_string()),
                ));
            }
        };

        let token = match Self::decode(header, config) {
            Ok(token) => token,
            Err(err) => {
                let message = match err.kind() {
                    JwtErrorKind::ExpiredSignature => "Session expired",
                    _ => "Invalid authentication token",
                };
                return request::Outcome::Failure((
                    Status::Unauthorized,
                    Error::Unauthorized(message.to_string()),
                ));
            }
        };

        if token.permits(U::RIGHTS) {
            request::Outcome::Success(token)
        } else {
            request::Outcome::Failure((
                Status::Forbidden,
                Error::Forbidden(format!("This action requires {} rights", U::RIGHTS)),
            ))
        }
    }
}
