use std::ops::Deref;

use rocket::{
    http::Status,
    outcome::try_outcome,
    request::{self, FromRequest},
    Request,
};

use crate::error::Error;
use crate::model::{
    auth::{token::AuthToken, user::VoterIdentity},
    common::permissions::Permission,
    db::admin::Admin,
    mongodb::{Coll, Id},
};

/// An authenticated admin with a live database record.
///
/// The admin is re-fetched on every authenticated request, so permission
/// changes and account removal take effect immediately rather than when the
/// token expires.
pub struct AdminSession {
    pub admin: Admin,
}

impl AdminSession {
    /// Fail with 403 unless the session's admin holds the given capability.
    pub fn require(&self, permission: Permission) -> Result<(), Error> {
        if self.admin.permissions.permits(permission) {
            Ok(())
        } else {
            Err(Error::Forbidden(format!(
                "You do not have permission to {}",
                permission.name()
            )))
        }
    }
}

impl Deref for AdminSession {
    type Target = Admin;

    fn deref(&self) -> &Self::Target {
        &self.admin
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AdminSession {
    type Error = Error;

    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let token = try_outcome!(req.guard::<AuthToken<Admin>>().await);
        // Valid as the `Coll` guard is infallible.
        let admins = req.guard::<Coll<Admin>>().await.unwrap();

        let id: Id = match token.subject().parse() {
            Ok(id) => id,
            Err(_) => {
                return request::Outcome::Failure((
                    Status::Unauthorized,
                    Error::Unauthorized("Invalid authentication token".to_string()),
                ));
            }
        };

        let admin = match admins.find_one(id.as_doc(), None).await {
            Ok(Some(admin)) => admin,
            Ok(None) => {
                return request::Outcome::Failure((
                    Status::Unauthorized,
                    Error::Unauthorized("Admin account no longer exists".to_string()),
                ));
            }
            Err(err) => {
                return request::Outcome::Failure((Status::InternalServerError, err.into()));
            }
        };

        request::Outcome::Success(Self { admin })
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for VoterIdentity {
    type Error = Error;

    /// Reconstruct the voter's identity from their token claims.
    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let token = try_outcome!(req.guard::<AuthToken<VoterIdentity>>().await);

        let address = match token.subject().parse() {
            Ok(address) => address,
            Err(_) => {
                return request::Outcome::Failure((
                    Status::Unauthorized,
                    Error::Unauthorized("Invalid authentication token".to_string()),
                ));
            }
        };
        let cedula = match token.cedula() {
            Some(cedula) => cedula.clone(),
            None => {
                return request::Outcome::Failure((
                    Status::Unauthorized,
                    Error::Unauthorized("Invalid authentication token".to_string()),
                ));
            }
        };

        request::Outcome::Success(Self { address, cedula })
    }
}
