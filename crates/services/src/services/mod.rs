//! Campaign workflows and outbound integrations.

pub mod config;
pub mod contact;
pub mod nomination;
pub mod sync;
pub mod validation;
pub mod voting;
