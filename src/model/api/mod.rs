pub mod admin;
pub mod auth;
pub mod election;
pub mod vote;
pub mod voter;
