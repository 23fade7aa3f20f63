use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::models::User;
use crate::error::{AppError, AuthError};

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,  // User ID
    pub phone_number: String,
    pub exp: i64,     // Expiration time
    pub iat: i64,     // Issued at
}

impl Claims {
    pub fn user_id(&self) -> Result<Uuid, AppError> {
        Uuid::parse_str(&self.sub).map_err(|_| AppError::AuthError(AuthError::InvalidToken))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssuedToken {
    pub access_token: String,
    /// Seconds until the token expires.
    pub expires_in: i64,
}

/// Turns a resolved user into a session credential.
#[cfg_attr(test, mockall::automock)]
pub trait TokenIssuer: Send + Sync {
    fn issue(&self, user: &User) -> Result<IssuedToken, AppError>;
}

/// HS256 JWT issuer.
pub struct JwtTokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

impl JwtTokenIssuer {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }

    pub fn decode_token(&self, token: &str) -> Result<Claims, AppError> {
        let claims = decode::<Claims>(
            token,
            &self.decoding_key,
            &Validation::new(Algorithm::HS256),
        )?;

        Ok(claims.claims)
    }
}

impl TokenIssuer for JwtTokenIssuer {
    fn issue(&self, user: &User) -> Result<IssuedToken, AppError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.id.to_string(),
            phone_number: user.phone_number.clone(),
            exp: (now + self.ttl).timestamp(),
            iat: now.timestamp(),
        };

        let access_token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)?;

        Ok(IssuedToken {
            access_token,
            expires_in: self.ttl.num_seconds(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_and_decode() {
        let issuer = JwtTokenIssuer::new("test_secret", Duration::hours(1));
        let user = User::new("+15551234567".to_string());

        let token = issuer.issue(&user).unwrap();
        assert_eq!(token.expires_in, 3600);

        let claims = issuer.decode_token(&token.access_token).unwrap();
        assert_eq!(claims.user_id().unwrap(), user.id);
        assert_eq!(claims.phone_number, "+15551234567");
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn test_token_from_other_secret_is_rejected() {
        let issuer = JwtTokenIssuer::new("test_secret", Duration::hours(1));
        let other = JwtTokenIssuer::new("other_secret", Duration::hours(1));
        let token = other.issue(&User::new("+15551234567".to_string())).unwrap();

        let err = issuer.decode_token(&token.access_token).unwrap_err();
        assert!(matches!(err, AppError::AuthError(AuthError::InvalidToken)));
    }

    #[test]
    fn test_expired_token_is_rejected() {
        // Past the default 60s leeway.
        let issuer = JwtTokenIssuer::new("test_secret", Duration::minutes(-5));
        let token = issuer.issue(&User::new("+15551234567".to_string())).unwrap();

        let err = issuer.decode_token(&token.access_token).unwrap_err();
        assert!(matches!(err, AppError::AuthError(AuthError::TokenExpired)));
    }

    #[test]
    fn test_garbage_token_is_rejected() {
        let issuer = JwtTokenIssuer::new("test_secret", Duration::hours(1));
        let err = issuer.decode_token("not-a-jwt").unwrap_err();
        assert!(matches!(err, AppError::AuthError(AuthError::InvalidToken)));
    }
}
