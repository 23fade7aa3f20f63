use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;
use tracing::error;

use crate::auth::Claims;
use crate::error::{AppError, AuthError};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct OtpRequest {
    pub phone_number: String,
}

#[derive(Debug, Deserialize)]
pub struct OtpVerifyRequest {
    pub phone_number: String,
    pub code: String,
}

pub async fn request_otp(
    req: web::Json<OtpRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    match state.auth_service.request_otp(&req.phone_number).await {
        Ok(()) => Ok(HttpResponse::Accepted().json(serde_json::json!({
            "status": "pending"
        }))),
        Err(e) => {
            error!("OTP request failed: {}", e);
            Err(e)
        }
    }
}

/// A wrong code is still a 200: the body says `"verified": false`.
pub async fn verify_otp(
    req: web::Json<OtpVerifyRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let outcome = state
        .auth_service
        .verify_otp(&req.phone_number, &req.code)
        .await
        .map_err(|e| {
            error!("OTP verification failed: {}", e);
            e
        })?;

    Ok(HttpResponse::Ok().json(outcome))
}

/// Decodes the `Authorization: Bearer` token of `req`.
pub fn authenticate(req: &HttpRequest, state: &AppState) -> Result<Claims, AppError> {
    let token = req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or(AppError::AuthError(AuthError::InvalidToken))?;

    state.tokens.decode_token(token)
}
