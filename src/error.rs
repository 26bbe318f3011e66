use jsonwebtoken::errors::Error as JwtError;
use mongodb::error::Error as DbError;
use rocket::{
    http::Status,
    response::{self, status::Custom, Responder},
    serde::json::{json, Json, Value},
    Request,
};
use thiserror::Error;

pub type Result<T = ()> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Database error: {0}")]
    Db(#[from] DbError),

    #[error("Serialization error: {0}")]
    Bson(#[from] mongodb::bson::ser::Error),

    #[error("JWT error: {0}")]
    Jwt(#[from] JwtError),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),
}

impl Error {
    /// A 404 for a missing resource of the given kind.
    pub fn not_found(what: impl std::fmt::Display) -> Self {
        Self::NotFound(format!("{what} not found"))
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    /// Convert the error into a JSON `{"success": false, "message": ...}`
    /// response with the right status. Internal errors are logged in full and
    /// reported to the client only generically.
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'o> {
        let (status, message) = match &self {
            Error::Db(_) | Error::Bson(_) | Error::Jwt(_) => {
                error!("{self}");
                (Status::InternalServerError, "Internal server error".to_string())
            }
            Error::BadRequest(message) => (Status::BadRequest, message.clone()),
            Error::Unauthorized(message) => (Status::Unauthorized, message.clone()),
            Error::Forbidden(message) => (Status::Forbidden, message.clone()),
            Error::NotFound(message) => (Status::NotFound, message.clone()),
        };

        let mut response = Json(json!({
            "success": false,
            "message": message,
        }))
        .respond_to(req)?;
        response.set_status(status);
        Ok(response)
    }
}

/// Catch-all for errors that never reach a handler, such as failed request
/// guards, so every error leaves the API in the same JSON shape.
#[catch(default)]
pub fn default_catcher(status: Status, _req: &Request) -> Custom<Json<Value>> {
    Custom(
        status,
        Json(json!({
            "success": false,
            "message": status.reason_lossy(),
        })),
    )
}
