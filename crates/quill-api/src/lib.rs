pub mod account;
pub mod comments;
pub mod dto;
pub mod error;
pub mod identity;
pub mod posts;
pub mod users;

use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{get, patch, post},
};
use serde::Deserialize;

use quill_domain::Domain;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub domain: Domain,
    pub posts_per_page: u32,
    pub comments_per_page: u32,
    pub followers_per_page: u32,
}

impl AppStateInner {
    pub fn new(domain: Domain) -> Self {
        Self {
            domain,
            posts_per_page: 10,
            comments_per_page: 10,
            followers_per_page: 50,
        }
    }
}

/// `page`/`per_page` query parameters; `feed=followed` selects the
/// personalized feed on the posts listing.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub feed: Option<String>,
}

impl PageQuery {
    /// Returns (page, per_page, offset), clamped to sane bounds. The
    /// offset saturates: an absurd page number reads as an empty page,
    /// never a panic or a wrapped offset.
    pub fn resolve(&self, default_per_page: u32) -> (u32, u32, u32) {
        let page = self.page.unwrap_or(1).max(1);
        let per_page = self.per_page.unwrap_or(default_per_page).clamp(1, 100);
        let offset = page.saturating_sub(1).saturating_mul(per_page);
        (page, per_page, offset)
    }
}

/// The full `/api/v1` surface. Identity resolution wraps everything;
/// the content routes additionally refuse unconfirmed accounts.
pub fn router(state: AppState) -> Router {
    let account = Router::new()
        .route("/account/register", post(account::register))
        .route("/account/confirm", post(account::confirm))
        .route("/account/confirm/resend", post(account::resend_confirmation))
        .route("/account/reset", post(account::request_password_reset))
        .route("/account/reset/apply", post(account::apply_password_reset))
        .route("/account/change_email", post(account::request_email_change))
        .route("/account/change_email/apply", post(account::apply_email_change))
        .route("/account/change_password", post(account::change_password))
        .route("/account/profile", patch(account::edit_profile));

    let content = Router::new()
        .route("/token", get(account::get_token))
        .route("/users/{id}", get(users::get_user))
        .route("/users/{id}/posts", get(users::get_user_posts))
        .route("/users/{id}/timeline", get(users::get_user_timeline))
        .route("/users/{id}/followers", get(users::get_followers))
        .route("/users/{id}/following", get(users::get_following))
        .route(
            "/users/{id}/follow",
            post(users::follow).delete(users::unfollow),
        )
        .route("/posts", get(posts::list_posts).post(posts::create_post))
        .route("/posts/{id}", get(posts::get_post).put(posts::edit_post))
        .route(
            "/posts/{id}/comments",
            get(comments::list_for_post).post(comments::create),
        )
        .route("/comments", get(comments::list_all))
        .route("/comments/{id}", get(comments::get_comment))
        .route("/comments/{id}/moderate", patch(comments::moderate))
        .layer(middleware::from_fn(identity::require_confirmed));

    Router::new()
        .nest("/api/v1", account.merge(content))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            identity::resolve_identity,
        ))
        .with_state(state)
}
