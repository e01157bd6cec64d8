use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use uuid::Uuid;

use quill_auth::Permission;
use quill_types::api::{NewCommentRequest, Page};

use crate::error::ApiError;
use crate::identity::{CurrentUser, blocking, require_capability};
use crate::{AppState, PageQuery, dto};

/// Thread order: oldest first.
pub async fn list_for_post(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let (page, per_page, offset) = query.resolve(state.comments_per_page);
    let response = blocking(move || {
        let id = id.to_string();
        if state.domain.db.get_post(&id)?.is_none() {
            return Err(ApiError::NotFound);
        }
        let comments = state.domain.db.list_comments_for_post(&id, per_page, offset)?;
        let total = state.domain.db.count_comments_for_post(&id)?;
        Ok(Page {
            items: comments
                .iter()
                .map(dto::comment_response)
                .collect::<Result<Vec<_>, _>>()?,
            page,
            per_page,
            total,
        })
    })
    .await?;
    Ok(Json(response))
}

pub async fn create(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<NewCommentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let response = blocking(move || {
        let author = require_capability(&state.domain, &current, Permission::COMMENT)?;
        let comment = state
            .domain
            .create_comment(&author.id, &id.to_string(), &req.body)?;
        dto::comment_response(&comment)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// Site-wide comment stream, newest first. Used by moderators.
pub async fn list_all(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let (page, per_page, offset) = query.resolve(state.comments_per_page);
    let response = blocking(move || {
        let comments = state.domain.db.list_comments(per_page, offset)?;
        let total = state.domain.db.count_comments()?;
        Ok(Page {
            items: comments
                .iter()
                .map(dto::comment_response)
                .collect::<Result<Vec<_>, _>>()?,
            page,
            per_page,
            total,
        })
    })
    .await?;
    Ok(Json(response))
}

pub async fn get_comment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let response = blocking(move || {
        let comment = state
            .domain
            .db
            .get_comment(&id.to_string())?
            .ok_or(ApiError::NotFound)?;
        dto::comment_response(&comment)
    })
    .await?;
    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModerateRequest {
    pub disabled: bool,
}

/// Toggle a comment's visibility without deleting it.
pub async fn moderate(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<ModerateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let response = blocking(move || {
        require_capability(&state.domain, &current, Permission::MODERATE_COMMENTS)?;
        let id = id.to_string();
        state.domain.set_comment_disabled(&id, req.disabled)?;
        let comment = state
            .domain
            .db
            .get_comment(&id)?
            .ok_or(ApiError::NotFound)?;
        dto::comment_response(&comment)
    })
    .await?;
    Ok(Json(response))
}
