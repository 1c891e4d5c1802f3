//! Listings synchronization container

pub mod errors;
mod service;
mod views;

pub use errors::ListingsError;
pub use service::{ListingsSync, PendingListing};
pub use views::{ListingViews, View};
