use actix_web::{web, HttpRequest, HttpResponse};
use serde_json::json;

use crate::auth::handlers::authenticate;
use crate::db::models::UserPatch;
use crate::error::AppError;
use crate::AppState;

fn not_found() -> HttpResponse {
    HttpResponse::NotFound().json(json!({
        "error": { "status": 404, "message": "User not found" }
    }))
}

pub async fn get_me(req: HttpRequest, state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let claims = authenticate(&req, &state)?;

    match state.auth_service.users().find_by_id(claims.user_id()?).await? {
        Some(user) => Ok(HttpResponse::Ok().json(user)),
        None => Ok(not_found()),
    }
}

pub async fn update_me(
    req: HttpRequest,
    patch: web::Json<UserPatch>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let claims = authenticate(&req, &state)?;

    match state
        .auth_service
        .users()
        .update_by_id(claims.user_id()?, &patch)
        .await?
    {
        Some(user) => Ok(HttpResponse::Ok().json(user)),
        None => Ok(not_found()),
    }
}
