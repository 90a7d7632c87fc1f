pub mod error;
pub mod local_cache;
pub mod permission;

pub use error::CacheError;
pub use local_cache::LocalCache;
pub use permission::{DefaultPermissions, PermissionController};
