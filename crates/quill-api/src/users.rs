use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde_json::json;
use uuid::Uuid;

use quill_auth::Permission;
use quill_types::api::Page;

use crate::error::ApiError;
use crate::identity::{CurrentUser, blocking, require_capability};
use crate::{AppState, PageQuery, dto};

pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let response = blocking(move || {
        let user = state
            .domain
            .db
            .get_user_by_id(&id.to_string())?
            .ok_or(ApiError::NotFound)?;
        dto::user_response(&state.domain, &user)
    })
    .await?;
    Ok(Json(response))
}

pub async fn get_user_posts(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let (page, per_page, offset) = query.resolve(state.posts_per_page);
    let response = blocking(move || {
        let id = id.to_string();
        if state.domain.db.get_user_by_id(&id)?.is_none() {
            return Err(ApiError::NotFound);
        }
        let posts = state.domain.db.list_posts_by_author(&id, per_page, offset)?;
        let total = state.domain.db.count_posts_by_author(&id)?;
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

/// The user's personalized feed: posts by everyone they follow,
/// including themselves via the reflexive edge.
pub async fn get_user_timeline(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let (page, per_page, offset) = query.resolve(state.posts_per_page);
    let response = blocking(move || {
        let user = state
            .domain
            .db
            .get_user_by_id(&id.to_string())?
            .ok_or(ApiError::NotFound)?;
        let (posts, total) = state.domain.followed_posts(&user, per_page, offset)?;
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

pub async fn get_followers(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let (page, per_page, offset) = query.resolve(state.followers_per_page);
    let response = blocking(move || {
        let id = id.to_string();
        let user = state.domain.db.get_user_by_id(&id)?.ok_or(ApiError::NotFound)?;
        let (_, total, _) = state.domain.db.user_stats(&user.id)?;
        let edges = state.domain.db.followers_of(&id, per_page, offset)?;
        Ok(Page {
            items: edges
                .iter()
                .map(dto::follow_response)
                .collect::<Result<Vec<_>, _>>()?,
            page,
            per_page,
            total,
        })
    })
    .await?;
    Ok(Json(response))
}

pub async fn get_following(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let (page, per_page, offset) = query.resolve(state.followers_per_page);
    let response = blocking(move || {
        let id = id.to_string();
        let user = state.domain.db.get_user_by_id(&id)?.ok_or(ApiError::NotFound)?;
        let (_, _, total) = state.domain.db.user_stats(&user.id)?;
        let edges = state.domain.db.followed_by(&id, per_page, offset)?;
        Ok(Page {
            items: edges
                .iter()
                .map(dto::follow_response)
                .collect::<Result<Vec<_>, _>>()?,
            page,
            per_page,
            total,
        })
    })
    .await?;
    Ok(Json(response))
}

pub async fn follow(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(current): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    blocking(move || {
        let actor = require_capability(&state.domain, &current, Permission::FOLLOW)?;
        state.domain.follow(&actor, &id.to_string())?;
        Ok(())
    })
    .await?;
    Ok(Json(json!({"status": "following"})))
}

pub async fn unfollow(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(current): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    blocking(move || {
        let actor = require_capability(&state.domain, &current, Permission::FOLLOW)?;
        state.domain.unfollow(&actor, &id.to_string())?;
        Ok(())
    })
    .await?;
    Ok(Json(json!({"status": "unfollowed"})))
}
