//! Remote collaborators
//!
//! Everything the services talk to over the network is hidden behind a trait here:
//! the identity provider, the document collections and object storage. The
//! [`memory`] module holds in-process implementations of each.

pub mod conversations;
pub mod errors;
pub mod feed;
pub mod identity;
pub mod listings;
pub mod memory;
pub mod objects;
pub mod profiles;

pub use conversations::{ConversationsRepository, MockConversationsRepository};
pub use errors::StoreError;
pub use feed::{Feed, FeedSender};
pub use identity::{IdentityError, IdentityProvider, MockIdentityProvider};
pub use listings::{LISTING_QUERY_LIMIT, ListingQuery, ListingsRepository, MockListingsRepository};
pub use objects::{MockObjectStorage, ObjectStorage, upload_compressed};
pub use profiles::{MockProfilesRepository, ProfilesRepository};
