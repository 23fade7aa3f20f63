//! User lookup module
//!
//! Cache-aside reads, find-or-create on sign-in, and cache-invalidating
//! partial updates.

mod directory;
pub mod handlers;

pub use directory::{SignInOutcome, UserDirectory};
