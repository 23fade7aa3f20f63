//! Authentication module
//!
//! The OTP verification flow, session token issuance and per-phone rate
//! limiting.

pub mod handlers;
mod rate_limit;
mod service;
mod token;

pub use rate_limit::{RateLimitConfig, RateLimiter};
pub use service::{AuthService, VerifyOutcome};
pub use token::{Claims, IssuedToken, JwtTokenIssuer, TokenIssuer};
