use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::TypedHeader;
use axum_extra::headers::Authorization;
use axum_extra::headers::authorization::Basic;

use quill_auth::Permission;
use quill_db::models::UserRow;
use quill_domain::Domain;

use crate::AppState;
use crate::error::ApiError;

/// The identity a request acts as. Anonymous satisfies no capability;
/// `via_token` marks token-based Basic auth so `/token` can refuse to
/// chain tokens.
#[derive(Clone)]
pub enum CurrentUser {
    Anonymous,
    Authenticated { user: Arc<UserRow>, via_token: bool },
}

impl CurrentUser {
    pub fn user(&self) -> Option<&Arc<UserRow>> {
        match self {
            CurrentUser::Anonymous => None,
            CurrentUser::Authenticated { user, .. } => Some(user),
        }
    }
}

/// Resolve HTTP Basic credentials to an identity and stash it as a
/// request extension. Accepted forms: no header or an empty username
/// (anonymous), `token:` with an empty password (token auth), or
/// `email:password`. Bad credentials of any kind are one 401.
pub async fn resolve_identity(
    State(state): State<AppState>,
    auth: Option<TypedHeader<Authorization<Basic>>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let current = match auth {
        None => CurrentUser::Anonymous,
        Some(TypedHeader(Authorization(basic))) if basic.username().is_empty() => {
            CurrentUser::Anonymous
        }
        Some(TypedHeader(Authorization(basic))) => {
            let st = state.clone();
            let principal = basic.username().to_string();
            let password = basic.password().to_string();
            let via_token = password.is_empty();
            let user = blocking(move || {
                if via_token {
                    Ok(st
                        .domain
                        .verify_auth_token(&principal)?
                        .ok_or(ApiError::Unauthorized)?)
                } else {
                    Ok(st.domain.authenticate(&principal, &password)?)
                }
            })
            .await?;
            CurrentUser::Authenticated {
                user: Arc::new(user),
                via_token,
            }
        }
    };

    if let Some(user) = current.user() {
        let st = state.clone();
        let u = user.clone();
        blocking(move || Ok(st.domain.ping(&u)?)).await?;
    }

    req.extensions_mut().insert(current);
    Ok(next.run(req).await)
}

/// Second gate for the content API: an authenticated but unconfirmed
/// identity is refused everywhere, with the one fixed message.
pub async fn require_confirmed(req: Request, next: Next) -> Result<Response, ApiError> {
    let current = req
        .extensions()
        .get::<CurrentUser>()
        .cloned()
        .unwrap_or(CurrentUser::Anonymous);
    if let Some(user) = current.user() {
        if !user.confirmed {
            return Err(ApiError::forbidden("Unconfirmed account"));
        }
    }
    Ok(next.run(req).await)
}

/// 401 unless the request carries an authenticated identity.
pub fn require_user(current: &CurrentUser) -> Result<Arc<UserRow>, ApiError> {
    current.user().cloned().ok_or(ApiError::Unauthorized)
}

/// Explicit capability check at the start of a protected operation.
/// Anonymous identities fail every check.
pub fn require_capability(
    domain: &Domain,
    current: &CurrentUser,
    needed: Permission,
) -> Result<Arc<UserRow>, ApiError> {
    let CurrentUser::Authenticated { user, .. } = current else {
        return Err(ApiError::forbidden("Insufficient permissions"));
    };
    if domain.user_can(user, needed)? {
        Ok(user.clone())
    } else {
        Err(ApiError::forbidden("Insufficient permissions"))
    }
}

/// Run a blocking domain operation off the async runtime.
pub async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("join error: {}", e)))?
}
