pub mod api;
pub mod error;
pub mod events;
pub mod models;
pub mod page;

pub use error::ServiceError;

/// Row identifiers are SQLite rowids.
pub type MemberId = i64;
pub type SpaceId = i64;
pub type LinkId = i64;
