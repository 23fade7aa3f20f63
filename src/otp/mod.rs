//! OTP challenge module
//!
//! Input types for phone numbers and codes, the [`OtpProvider`] seam and the
//! Twilio Verify implementation.

mod provider;
mod twilio;
mod types;

pub use provider::OtpProvider;
#[cfg(test)]
pub use provider::MockOtpProvider;
pub use twilio::TwilioVerify;
pub use types::{ChallengeHandle, ChallengeStatus, OtpCode, PhoneNumber};
