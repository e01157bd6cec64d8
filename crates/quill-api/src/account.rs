use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use serde_json::json;

use quill_domain::mail::MailKind;
use quill_types::api::{
    ChangePasswordRequest, ConfirmRequest, EditProfileRequest, EmailChangeApplyRequest,
    EmailChangeRequest, PasswordResetApplyRequest, PasswordResetRequest, RegisterRequest,
    RegisterResponse, TokenResponse,
};

use crate::AppState;
use crate::dto::parse_uuid;
use crate::error::ApiError;
use crate::identity::{CurrentUser, blocking, require_user};

const AUTH_TOKEN_TTL_SECS: u64 = 3600;

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user =
        blocking(move || Ok(state.domain.register(&req.email, &req.username, &req.password)?))
            .await?;
    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user_id: parse_uuid(&user.id)?,
            username: user.username,
            confirmed: user.confirmed,
        }),
    ))
}

pub async fn confirm(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<ConfirmRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = require_user(&current)?;
    let ok = blocking(move || Ok(state.domain.confirm(&user, &req.token)?)).await?;
    if !ok {
        return Err(ApiError::bad_request("invalid or expired token"));
    }
    Ok(Json(json!({"status": "confirmed"})))
}

pub async fn resend_confirmation(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    let user = require_user(&current)?;
    blocking(move || {
        let token = state.domain.issue_confirmation_token(&user)?;
        state
            .domain
            .mailer
            .send(MailKind::ConfirmAccount, &user.email, &user.username, &token);
        Ok(())
    })
    .await?;
    Ok(Json(json!({"status": "sent"})))
}

/// Always answers "sent" — whether the address exists is not leaked.
pub async fn request_password_reset(
    State(state): State<AppState>,
    Json(req): Json<PasswordResetRequest>,
) -> Result<impl IntoResponse, ApiError> {
    blocking(move || {
        if let Some(user) = state.domain.db.get_user_by_email(&req.email)? {
            let token = state.domain.issue_reset_token(&user)?;
            state
                .domain
                .mailer
                .send(MailKind::ResetPassword, &user.email, &user.username, &token);
        }
        Ok(())
    })
    .await?;
    Ok(Json(json!({"status": "sent"})))
}

pub async fn apply_password_reset(
    State(state): State<AppState>,
    Json(req): Json<PasswordResetApplyRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let reset =
        blocking(move || Ok(state.domain.reset_password(&req.token, &req.new_password)?)).await?;
    if reset.is_none() {
        return Err(ApiError::bad_request("invalid or expired token"));
    }
    Ok(Json(json!({"status": "password reset"})))
}

pub async fn request_email_change(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<EmailChangeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = require_user(&current)?;
    blocking(move || {
        state
            .domain
            .request_email_change(&user, &req.new_email, &req.password)?;
        Ok(())
    })
    .await?;
    Ok(Json(json!({"status": "sent"})))
}

pub async fn apply_email_change(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<EmailChangeApplyRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = require_user(&current)?;
    let ok = blocking(move || Ok(state.domain.change_email(&user, &req.token)?)).await?;
    if !ok {
        return Err(ApiError::bad_request("invalid token or email already in use"));
    }
    Ok(Json(json!({"status": "email updated"})))
}

pub async fn change_password(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = require_user(&current)?;
    blocking(move || {
        state
            .domain
            .change_password(&user, &req.old_password, &req.new_password)?;
        Ok(())
    })
    .await?;
    Ok(Json(json!({"status": "password changed"})))
}

pub async fn edit_profile(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<EditProfileRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = require_user(&current)?;
    blocking(move || {
        state
            .domain
            .db
            .update_profile(
                &user.id,
                req.name.as_deref(),
                req.location.as_deref(),
                req.about_me.as_deref(),
            )
            .map_err(ApiError::Internal)
    })
    .await?;
    Ok(Json(json!({"status": "profile updated"})))
}

/// Issue a short-lived API token. Anonymous callers and callers that
/// already authenticated with a token get the same 401 — tokens are
/// never minted from tokens.
pub async fn get_token(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    let CurrentUser::Authenticated {
        user,
        via_token: false,
    } = current
    else {
        return Err(ApiError::Unauthorized);
    };
    let token =
        blocking(move || Ok(state.domain.generate_auth_token(&user, AUTH_TOKEN_TTL_SECS)?)).await?;
    Ok(Json(TokenResponse {
        token,
        expiration: AUTH_TOKEN_TTL_SECS,
    }))
}
