use serde::ser::{Serialize, SerializeStruct, Serializer};
use std::sync::Arc;
use tracing::{field, info, instrument, warn, Span};

use crate::auth::rate_limit::RateLimiter;
use crate::auth::token::{IssuedToken, TokenIssuer};
use crate::db::models::User;
use crate::error::{AppError, AuthError};
use crate::otp::{ChallengeStatus, OtpCode, OtpProvider, PhoneNumber};
use crate::users::{SignInOutcome, UserDirectory};

/// Result of submitting a code.
#[derive(Debug, Clone, PartialEq)]
pub enum VerifyOutcome {
    /// Wrong, expired or exhausted code. Nothing was written.
    NotVerified,
    Verified {
        outcome: SignInOutcome,
        user: User,
        token: IssuedToken,
    },
}

impl VerifyOutcome {
    pub fn is_verified(&self) -> bool {
        matches!(self, VerifyOutcome::Verified { .. })
    }
}

// `{"verified": false}` or a flat `{"verified": true, "outcome", "user",
// "token", "expires_in"}` object.
impl Serialize for VerifyOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            VerifyOutcome::NotVerified => {
                let mut state = serializer.serialize_struct("VerifyOutcome", 1)?;
                state.serialize_field("verified", &false)?;
                state.end()
            }
            VerifyOutcome::Verified { outcome, user, token } => {
                let mut state = serializer.serialize_struct("VerifyOutcome", 5)?;
                state.serialize_field("verified", &true)?;
                state.serialize_field("outcome", outcome)?;
                state.serialize_field("user", user)?;
                state.serialize_field("token", &token.access_token)?;
                state.serialize_field("expires_in", &token.expires_in)?;
                state.end()
            }
        }
    }
}

/// Phone OTP sign-in: starts challenges and turns approved codes into
/// sessions.
pub struct AuthService {
    otp: Arc<dyn OtpProvider>,
    users: UserDirectory,
    tokens: Arc<dyn TokenIssuer>,
    rate_limiter: RateLimiter,
}

impl AuthService {
    pub fn new(
        otp: Arc<dyn OtpProvider>,
        users: UserDirectory,
        tokens: Arc<dyn TokenIssuer>,
        rate_limiter: RateLimiter,
    ) -> Self {
        Self {
            otp,
            users,
            tokens,
            rate_limiter,
        }
    }

    pub fn users(&self) -> &UserDirectory {
        &self.users
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }

    /// Sends a fresh code by SMS. Provider failures are returned to the
    /// caller as-is; retrying is up to the user.
    #[instrument(skip_all, fields(phone = field::Empty))]
    pub async fn request_otp(&self, raw_phone: &str) -> Result<(), AppError> {
        let phone = PhoneNumber::parse(raw_phone)?;
        Span::current().record("phone", phone.masked().as_str());

        if !self.rate_limiter.check_rate_limit(phone.as_str()).await {
            warn!("OTP request rate limited");
            return Err(AuthError::RateLimited.into());
        }

        let handle = self.otp.start_challenge(&phone).await?;
        info!(sid = %handle.sid, status = %handle.status, "OTP challenge started");
        Ok(())
    }

    /// Checks `raw_code` with the provider. On approval the phone number is
    /// resolved to a user (created on first sign-in) and a token is issued.
    /// A malformed phone number is a `ValidationError`; a malformed code is
    /// `NotVerified` without a provider call.
    #[instrument(skip_all, fields(phone = field::Empty))]
    pub async fn verify_otp(&self, raw_phone: &str, raw_code: &str) -> Result<VerifyOutcome, AppError> {
        let phone = PhoneNumber::parse(raw_phone)?;
        Span::current().record("phone", phone.masked().as_str());

        // A code that could never match is just a wrong code.
        let Ok(code) = OtpCode::parse(raw_code) else {
            info!("Malformed OTP code, not verified");
            return Ok(VerifyOutcome::NotVerified);
        };

        match self.otp.check_challenge(&phone, &code).await? {
            ChallengeStatus::NotApproved(status) => {
                info!(%status, "OTP not verified");
                Ok(VerifyOutcome::NotVerified)
            }
            ChallengeStatus::Approved => {
                let (user, outcome) = self.users.find_or_create(&phone).await?;
                let token = self.tokens.issue(&user)?;
                info!(user_id = %user.id, ?outcome, "OTP verified");

                Ok(VerifyOutcome::Verified { outcome, user, token })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::rate_limit::RateLimitConfig;
    use crate::auth::token::MockTokenIssuer;
    use crate::cache::{MemoryCache, MockCacheStore, UserCache};
    use crate::db::memory::InMemoryUserStore;
    use crate::db::store::MockUserStore;
    use crate::error::{CacheError, ProviderError};
    use crate::otp::{ChallengeHandle, MockOtpProvider};
    use serde_json::json;
    use std::time::Duration;

    const PHONE: &str = "+15551234567";

    fn handle() -> ChallengeHandle {
        ChallengeHandle {
            sid: "VE123".into(),
            status: "pending".into(),
            channel: "sms".into(),
        }
    }

    fn fixed_token() -> MockTokenIssuer {
        let mut tokens = MockTokenIssuer::new();
        tokens.expect_issue().returning(|_| {
            Ok(IssuedToken {
                access_token: "signed".into(),
                expires_in: 3600,
            })
        });
        tokens
    }

    fn service(
        otp: MockOtpProvider,
        store: Arc<dyn crate::db::UserStore>,
        tokens: MockTokenIssuer,
    ) -> AuthService {
        let cache = UserCache::new(Arc::new(MemoryCache::new()), Duration::from_secs(60));
        AuthService::new(
            Arc::new(otp),
            UserDirectory::new(store, cache),
            Arc::new(tokens),
            RateLimiter::new(RateLimitConfig::default()),
        )
    }

    #[tokio::test]
    async fn test_request_otp_validates_before_calling_provider() {
        let mut otp = MockOtpProvider::new();
        otp.expect_start_challenge().never();

        let svc = service(otp, Arc::new(InMemoryUserStore::new()), MockTokenIssuer::new());
        let err = svc.request_otp("555-1234").await.unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[tokio::test]
    async fn test_request_otp_propagates_provider_error() {
        let mut otp = MockOtpProvider::new();
        otp.expect_start_challenge()
            .times(1)
            .returning(|_| Err(ProviderError::Unreachable("connection reset".into())));

        let svc = service(otp, Arc::new(InMemoryUserStore::new()), MockTokenIssuer::new());
        let err = svc.request_otp(PHONE).await.unwrap_err();
        assert!(matches!(err, AppError::ProviderError(ProviderError::Unreachable(_))));
    }

    #[tokio::test]
    async fn test_request_otp_is_rate_limited_per_phone() {
        let mut otp = MockOtpProvider::new();
        otp.expect_start_challenge().times(5).returning(|_| Ok(handle()));

        let svc = service(otp, Arc::new(InMemoryUserStore::new()), MockTokenIssuer::new());
        for _ in 0..5 {
            svc.request_otp(PHONE).await.unwrap();
        }
        let err = svc.request_otp(PHONE).await.unwrap_err();
        assert!(matches!(err, AppError::AuthError(AuthError::RateLimited)));
    }

    #[tokio::test]
    async fn test_denied_code_has_no_side_effects() {
        let mut otp = MockOtpProvider::new();
        otp.expect_check_challenge()
            .returning(|_, _| Ok(ChallengeStatus::NotApproved("pending".into())));
        // No store calls and no token expected.
        let store = MockUserStore::new();
        let mut tokens = MockTokenIssuer::new();
        tokens.expect_issue().never();

        let svc = service(otp, Arc::new(store), tokens);
        let outcome = svc.verify_otp(PHONE, "000000").await.unwrap();
        assert_eq!(outcome, VerifyOutcome::NotVerified);
        assert_eq!(serde_json::to_value(&outcome).unwrap(), json!({"verified": false}));
    }

    #[tokio::test]
    async fn test_approved_code_creates_then_logs_in() {
        let mut otp = MockOtpProvider::new();
        otp.expect_check_challenge().returning(|_, _| Ok(ChallengeStatus::Approved));
        let store = InMemoryUserStore::new();

        let svc = service(otp, Arc::new(store.clone()), fixed_token());

        let first = svc.verify_otp(PHONE, "123456").await.unwrap();
        let VerifyOutcome::Verified { outcome, user, token } = first.clone() else {
            panic!("expected verified outcome");
        };
        assert_eq!(outcome, SignInOutcome::Created);
        assert_eq!(user.phone_number, PHONE);
        assert_eq!(token.expires_in, 3600);

        let body = serde_json::to_value(&first).unwrap();
        assert_eq!(body["verified"], json!(true));
        assert_eq!(body["outcome"], json!("created"));
        assert_eq!(body["token"], json!("signed"));
        assert_eq!(body["expires_in"], json!(3600));
        assert_eq!(body["user"]["phone_number"], json!(PHONE));

        let second = svc.verify_otp(PHONE, "654321").await.unwrap();
        let VerifyOutcome::Verified { outcome, user: again, .. } = second else {
            panic!("expected verified outcome");
        };
        assert_eq!(outcome, SignInOutcome::LoggedIn);
        assert_eq!(again.id, user.id);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_check_failure_surfaces_as_provider_error() {
        let mut otp = MockOtpProvider::new();
        otp.expect_check_challenge().returning(|_, _| Err(ProviderError::Timeout));

        let svc = service(otp, Arc::new(MockUserStore::new()), MockTokenIssuer::new());
        let err = svc.verify_otp(PHONE, "123456").await.unwrap_err();
        assert!(matches!(err, AppError::ProviderError(ProviderError::Timeout)));
    }

    #[tokio::test]
    async fn test_malformed_code_is_not_verified_without_provider_call() {
        let mut otp = MockOtpProvider::new();
        otp.expect_check_challenge().never();
        let mut tokens = MockTokenIssuer::new();
        tokens.expect_issue().never();

        let svc = service(otp, Arc::new(MockUserStore::new()), tokens);
        for code in ["12ab", "12", ""] {
            let outcome = svc.verify_otp(PHONE, code).await.unwrap();
            assert_eq!(outcome, VerifyOutcome::NotVerified);
        }

        // The phone number is still validated.
        let err = svc.verify_otp("12345", "123456").await.unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[tokio::test]
    async fn test_verification_survives_a_failing_cache() {
        let mut backend = MockCacheStore::new();
        backend
            .expect_get()
            .returning(|_| Err(CacheError::Unavailable("connection refused".into())));
        backend
            .expect_set()
            .returning(|_, _, _| Err(CacheError::Unavailable("connection refused".into())));
        backend
            .expect_set_if_absent()
            .returning(|_, _, _| Err(CacheError::Unavailable("connection refused".into())));
        backend
            .expect_delete()
            .returning(|_| Err(CacheError::Unavailable("connection refused".into())));

        let mut otp = MockOtpProvider::new();
        otp.expect_check_challenge().returning(|_, _| Ok(ChallengeStatus::Approved));
        let store = InMemoryUserStore::new();
        let cache = UserCache::new(Arc::new(backend), Duration::from_secs(60));
        let svc = AuthService::new(
            Arc::new(otp),
            UserDirectory::new(Arc::new(store.clone()), cache),
            Arc::new(fixed_token()),
            RateLimiter::new(RateLimitConfig::default()),
        );

        let VerifyOutcome::Verified { outcome, user, .. } = svc.verify_otp(PHONE, "123456").await.unwrap() else {
            panic!("expected verified outcome");
        };
        assert_eq!(outcome, SignInOutcome::Created);

        let VerifyOutcome::Verified { outcome, user: again, .. } = svc.verify_otp(PHONE, "123456").await.unwrap() else {
            panic!("expected verified outcome");
        };
        assert_eq!(outcome, SignInOutcome::LoggedIn);
        assert_eq!(again.id, user.id);

        let found = svc.users().find_by_id(user.id).await.unwrap();
        assert_eq!(found.map(|u| u.id), Some(user.id));
        assert_eq!(store.len().await, 1);
    }
}
