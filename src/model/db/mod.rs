pub mod admin;
pub mod challenge;
pub mod election;
pub mod vote;
pub mod voter;
