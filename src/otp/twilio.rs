use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use tracing::{error, info, warn};
use url::Url;

use crate::config::OtpConfig;
use crate::error::{AppError, ProviderError};
use crate::otp::provider::OtpProvider;
use crate::otp::types::{ChallengeHandle, ChallengeStatus, OtpCode, PhoneNumber};

/// Twilio Verify v2 client.
pub struct TwilioVerify {
    client: Client,
    base_url: Url,
    account_sid: String,
    auth_token: String,
    service_sid: String,
}

#[derive(Debug, Deserialize)]
struct VerificationResponse {
    sid: String,
    status: String,
    #[serde(default)]
    channel: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VerificationCheckResponse {
    status: String,
}

#[derive(Debug, Deserialize)]
struct TwilioErrorBody {
    #[serde(default)]
    message: Option<String>,
}

impl TwilioVerify {
    pub fn new(config: &OtpConfig) -> Result<Self, AppError> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| AppError::ConfigError(format!("invalid otp.base_url: {}", e)))?;

        // Provider calls must never hang a request.
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| AppError::InternalError(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            account_sid: config.account_sid.clone(),
            auth_token: config.auth_token.clone(),
            service_sid: config.service_sid.clone(),
        })
    }

    fn endpoint(&self, resource: &str) -> Result<Url, ProviderError> {
        self.base_url
            .join(&format!("v2/Services/{}/{}", self.service_sid, resource))
            .map_err(|e| ProviderError::InvalidResponse(format!("bad endpoint: {}", e)))
    }

    async fn post_form(&self, resource: &str, form: &[(&str, &str)]) -> Result<Response, ProviderError> {
        let url = self.endpoint(resource)?;
        let response = self
            .client
            .post(url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(form)
            .send()
            .await
            .map_err(|e| {
                error!("Request to Twilio {} failed: {}", resource, e);
                ProviderError::from(e)
            })?;

        Ok(response)
    }

    async fn rejection(response: Response) -> ProviderError {
        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return ProviderError::RateLimited;
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<TwilioErrorBody>(&body)
            .ok()
            .and_then(|b| b.message)
            .unwrap_or(body);

        error!("Twilio error ({}): {}", status, message);
        ProviderError::Rejected {
            status: status.as_u16(),
            message,
        }
    }
}

#[async_trait]
impl OtpProvider for TwilioVerify {
    async fn start_challenge(&self, phone: &PhoneNumber) -> Result<ChallengeHandle, ProviderError> {
        let response = self
            .post_form("Verifications", &[("To", phone.as_str()), ("Channel", "sms")])
            .await?;

        if !response.status().is_success() {
            return Err(Self::rejection(response).await);
        }

        let body = response.json::<VerificationResponse>().await?;
        info!("OTP sent via SMS to {} (sid {})", phone.masked(), body.sid);

        Ok(ChallengeHandle {
            sid: body.sid,
            status: body.status,
            channel: body.channel.unwrap_or_else(|| "sms".to_string()),
        })
    }

    async fn check_challenge(
        &self,
        phone: &PhoneNumber,
        code: &OtpCode,
    ) -> Result<ChallengeStatus, ProviderError> {
        let response = self
            .post_form("VerificationCheck", &[("To", phone.as_str()), ("Code", code.as_str())])
            .await?;

        // Twilio drops a verification once it is approved, expired or out of
        // attempts; checking it again yields 404.
        if response.status() == StatusCode::NOT_FOUND {
            warn!("No pending verification for {}", phone.masked());
            return Ok(ChallengeStatus::NotApproved("expired".to_string()));
        }

        if !response.status().is_success() {
            return Err(Self::rejection(response).await);
        }

        let body = response.json::<VerificationCheckResponse>().await?;
        Ok(ChallengeStatus::from_provider_status(&body.status))
    }
}
