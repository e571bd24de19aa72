//! Row models and queries for the awards campaign.

pub mod category;
pub mod nomination;
pub mod nominator;
pub mod nominee;
pub mod outbox;
pub mod setting;
pub mod stats;
pub mod vote;
pub mod voter;
