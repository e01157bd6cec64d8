use uuid::Uuid;

use quill_auth::avatar;
use quill_db::models::{CommentRow, FollowListRow, PostRow, UserRow};
use quill_domain::Domain;
use quill_types::api::{CommentResponse, FollowResponse, PostResponse, UserResponse};

use crate::error::ApiError;

pub fn parse_uuid(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|e| ApiError::Internal(anyhow::anyhow!("bad stored id: {}", e)))
}

pub fn user_response(domain: &Domain, user: &UserRow) -> Result<UserResponse, ApiError> {
    let (post_count, follower_count, followed_count) = domain
        .db
        .user_stats(&user.id)
        .map_err(ApiError::Internal)?;
    Ok(UserResponse {
        id: parse_uuid(&user.id)?,
        username: user.username.clone(),
        member_since: user.member_since,
        last_seen: user.last_seen,
        avatar: avatar::url(&user.avatar_hash, 100),
        name: user.name.clone(),
        location: user.location.clone(),
        about_me: user.about_me.clone(),
        post_count,
        follower_count,
        followed_count,
    })
}

pub fn post_response(post: &PostRow) -> Result<PostResponse, ApiError> {
    Ok(PostResponse {
        id: parse_uuid(&post.id)?,
        body: post.body.clone(),
        body_html: post.body_html.clone(),
        created_at: post.created_at,
        author_id: parse_uuid(&post.author_id)?,
        author_username: post.author_username.clone(),
        comment_count: post.comment_count,
    })
}

pub fn comment_response(comment: &CommentRow) -> Result<CommentResponse, ApiError> {
    Ok(CommentResponse {
        id: parse_uuid(&comment.id)?,
        body: comment.body.clone(),
        body_html: comment.body_html.clone(),
        created_at: comment.created_at,
        author_id: parse_uuid(&comment.author_id)?,
        author_username: comment.author_username.clone(),
        post_id: parse_uuid(&comment.post_id)?,
        disabled: comment.disabled,
    })
}

pub fn follow_response(edge: &FollowListRow) -> Result<FollowResponse, ApiError> {
    Ok(FollowResponse {
        user_id: parse_uuid(&edge.user_id)?,
        username: edge.username.clone(),
        since: edge.since,
    })
}
