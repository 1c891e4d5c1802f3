//! Agrimarket client services
//!
//! Async services a marketplace client runs on top of its remote collaborators:
//! listing synchronization with optimistic writes, sign-in and role resolution,
//! messaging, profiles and waste classification. The [`store`] module defines
//! those collaborators as traits and ships in-memory implementations of each.

pub mod analysis;
pub mod auth;
pub mod config;
pub mod context;
pub mod listings;
pub mod messaging;
pub mod observability;
pub mod profiles;
pub mod store;

#[cfg(test)]
mod test;
