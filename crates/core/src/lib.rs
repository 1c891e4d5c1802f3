//! Agrimarket
//!
//! Domain types and pure algorithms for a marketplace that connects farmers selling
//! agricultural waste with the industrial buyers that use it.

pub mod analysis;
pub mod compression;
pub mod conversations;
pub mod data_url;
pub mod identity;
pub mod listings;
pub mod prelude;
pub mod profiles;
pub mod roles;
pub mod uuids;
pub mod validation;
