use async_trait::async_trait;

use crate::error::ProviderError;
use crate::otp::types::{ChallengeHandle, ChallengeStatus, OtpCode, PhoneNumber};

/// External SMS verification service.
///
/// The provider owns the challenge: its code, expiry window and attempt
/// budget. Each `check_challenge` answer is authoritative for that call only.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OtpProvider: Send + Sync {
    async fn start_challenge(&self, phone: &PhoneNumber) -> Result<ChallengeHandle, ProviderError>;

    /// A wrong or expired code is `Ok(ChallengeStatus::NotApproved(_))`.
    async fn check_challenge(
        &self,
        phone: &PhoneNumber,
        code: &OtpCode,
    ) -> Result<ChallengeStatus, ProviderError>;
}
