use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use quill_auth::Permission;
use quill_types::api::{NewPostRequest, Page};

use crate::error::ApiError;
use crate::identity::{CurrentUser, blocking, require_capability, require_user};
use crate::{AppState, PageQuery, dto};

/// `GET /posts` — all posts newest-first, or the caller's personalized
/// feed with `?feed=followed`.
pub async fn list_posts(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
    Extension(current): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    let (page, per_page, offset) = query.resolve(state.posts_per_page);
    let followed_only = query.feed.as_deref() == Some("followed");
    let response = blocking(move || {
        let (posts, total) = if followed_only {
            let user = require_user(&current)?;
            state.domain.followed_posts(&user, per_page, offset)?
        } else {
            (
                state.domain.db.list_posts(per_page, offset)?,
                state.domain.db.count_posts()?,
            )
        };
        Ok(Page {
            items: posts
                .iter()
                .map(dto::post_response)
                .collect::<Result<Vec<_>, _>>()?,
            page,
            per_page,
            total,
        })
    })
    .await?;
    Ok(Json(response))
}

pub async fn create_post(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<NewPostRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let response = blocking(move || {
        let author = require_capability(&state.domain, &current, Permission::WRITE_ARTICLES)?;
        let post = state.domain.create_post(&author.id, &req.body)?;
        dto::post_response(&post)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn get_post(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let response = blocking(move || {
        let post = state
            .domain
            .db
            .get_post(&id.to_string())?
            .ok_or(ApiError::NotFound)?;
        dto::post_response(&post)
    })
    .await?;
    Ok(Json(response))
}

/// Only the author may edit, unless the caller administers the site.
pub async fn edit_post(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<NewPostRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let response = blocking(move || {
        let actor = require_capability(&state.domain, &current, Permission::WRITE_ARTICLES)?;
        let post = state
            .domain
            .db
            .get_post(&id.to_string())?
            .ok_or(ApiError::NotFound)?;
        if post.author_id != actor.id
            && !state.domain.user_can(&actor, Permission::ADMINISTER)?
        {
            return Err(ApiError::forbidden("Insufficient permissions"));
        }
        let updated = state.domain.edit_post(&post.id, &req.body)?;
        dto::post_response(&updated)
    })
    .await?;
    Ok(Json(response))
}
