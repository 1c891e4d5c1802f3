//! Authentication and role resolution

pub mod errors;
mod role_cache;
mod session;

pub use errors::AuthError;
pub use role_cache::{FileRoleCache, MemoryRoleCache, MockRoleCache, RoleCache};
pub use session::{AuthService, AuthSession, MockAuthService, Session};
