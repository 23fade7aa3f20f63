#![allow(dead_code)]

use async_trait::async_trait;
use otp_login_server::error::ProviderError;
use otp_login_server::otp::{ChallengeHandle, ChallengeStatus, OtpCode, OtpProvider, PhoneNumber};
use otp_login_server::{AppState, InMemoryUserStore, MemoryCache, Settings};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub const PHONE: &str = "+15551234567";
pub const VALID_CODE: &str = "123456";
pub const WRONG_CODE: &str = "000000";

/// Approves `VALID_CODE` for any number and reports everything else as
/// still pending, like Twilio does for a wrong guess.
#[derive(Default)]
pub struct ScriptedProvider {
    pub started: AtomicUsize,
    pub checked: AtomicUsize,
}

#[async_trait]
impl OtpProvider for ScriptedProvider {
    async fn start_challenge(&self, phone: &PhoneNumber) -> Result<ChallengeHandle, ProviderError> {
        self.started.fetch_add(1, Ordering::SeqCst);
        Ok(ChallengeHandle {
            sid: format!("VE{}", phone.as_str().trim_start_matches('+')),
            status: "pending".to_string(),
            channel: "sms".to_string(),
        })
    }

    async fn check_challenge(
        &self,
        _phone: &PhoneNumber,
        code: &OtpCode,
    ) -> Result<ChallengeStatus, ProviderError> {
        self.checked.fetch_add(1, Ordering::SeqCst);
        Ok(ChallengeStatus::from_provider_status(if code.as_str() == VALID_CODE {
            "approved"
        } else {
            "pending"
        }))
    }
}

pub struct TestApp {
    pub state: AppState,
    pub store: InMemoryUserStore,
    pub cache: MemoryCache,
    pub provider: Arc<ScriptedProvider>,
}

pub fn test_app() -> TestApp {
    let settings = Settings::new_for_test().expect("Failed to load test config");
    let store = InMemoryUserStore::new();
    let cache = MemoryCache::new();
    let provider = Arc::new(ScriptedProvider::default());

    let state = AppState::with_components(
        settings,
        Arc::new(store.clone()),
        provider.clone(),
        Arc::new(cache.clone()),
    );

    TestApp { state, store, cache, provider }
}
