mod session;
mod signature;
mod token;
mod user;

pub use session::AdminSession;
pub use signature::{recover_address, SignatureError};
pub use token::{AuthToken, AUTH_TOKEN_HEADER};
pub use user::{Rights, User, VoterIdentity};

#[cfg(test)]
pub use signature::testing;
