use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::AppError;

/// E.164 phone number, e.g. `+15551234567`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct PhoneNumber(String);

impl PhoneNumber {
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        let compact: String = raw
            .trim()
            .chars()
            .filter(|c| !matches!(c, ' ' | '-' | '.' | '(' | ')'))
            .collect();

        let digits = compact.strip_prefix('+').ok_or_else(|| {
            AppError::ValidationError("phone number must start with a country code (+)".into())
        })?;

        let valid = (8..=15).contains(&digits.len())
            && digits.chars().all(|c| c.is_ascii_digit())
            && !digits.starts_with('0');
        if !valid {
            return Err(AppError::ValidationError(
                "phone number must be + followed by 8 to 15 digits".into(),
            ));
        }

        Ok(Self(compact))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Last four digits only, for logs.
    pub fn masked(&self) -> String {
        let tail = &self.0[self.0.len() - 4..];
        format!("***{}", tail)
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The code a user typed back from the SMS.
#[derive(Clone, PartialEq, Eq)]
pub struct OtpCode(String);

impl OtpCode {
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        let code = raw.trim();
        if !(4..=10).contains(&code.len()) || !code.chars().all(|c| c.is_ascii_digit()) {
            return Err(AppError::ValidationError("code must be 4 to 10 digits".into()));
        }
        Ok(Self(code.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Never print the code itself.
impl fmt::Debug for OtpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("OtpCode(****)")
    }
}

/// What the provider reports back after starting a challenge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeHandle {
    pub sid: String,
    pub status: String,
    pub channel: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChallengeStatus {
    Approved,
    /// Wrong code, expired challenge or exhausted attempts; carries the raw
    /// provider status.
    NotApproved(String),
}

impl ChallengeStatus {
    pub fn from_provider_status(status: &str) -> Self {
        if status == "approved" {
            ChallengeStatus::Approved
        } else {
            ChallengeStatus::NotApproved(status.to_string())
        }
    }

    pub fn is_approved(&self) -> bool {
        matches!(self, ChallengeStatus::Approved)
    }
}
