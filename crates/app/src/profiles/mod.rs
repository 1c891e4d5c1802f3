//! User profiles

pub mod errors;
mod service;

pub use errors::ProfilesError;
pub use service::{MockProfilesService, ProfilesService, StoreProfilesService};
