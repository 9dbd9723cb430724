/// Posts
///
/// Post records, their persistence, image reconciliation and the use cases
/// tying them together.

pub mod models;
pub mod reconcile;
pub mod repository;
pub mod service;

pub use models::*;
pub use repository::{PostRepository, SqlitePostRepository};
pub use service::PostService;
