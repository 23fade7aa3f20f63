//! Database module
//!
//! User records, the [`UserStore`] seam, and its Postgres and in-memory
//! implementations.

pub mod memory;
pub mod models;
pub mod operations;
pub mod store;

pub use memory::InMemoryUserStore;
pub use models::{User, UserPatch};
pub use operations::DbOperations;
pub use store::UserStore;
