//! Buyer-farmer messaging

pub mod errors;
mod service;

pub use errors::MessagingError;
pub use service::{MessagingService, MockMessagingService, StoreMessagingService};
