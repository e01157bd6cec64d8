//! Database row types — these map directly to SQLite rows.
//! Distinct from the quill-types API models to keep the DB layer
//! independent. Ids are stored as UUID strings.

use chrono::{DateTime, Utc};

#[derive(Debug)]
pub struct RoleRow {
    pub id: i64,
    pub name: String,
    pub is_default: bool,
    pub permissions: u8,
}

#[derive(Debug)]
pub struct UserRow {
    pub id: String,
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub role_id: i64,
    pub confirmed: bool,
    pub name: Option<String>,
    pub location: Option<String>,
    pub about_me: Option<String>,
    pub member_since: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub avatar_hash: String,
}

#[derive(Debug)]
pub struct PostRow {
    pub id: String,
    pub body: String,
    pub body_html: String,
    pub created_at: DateTime<Utc>,
    pub author_id: String,
    pub author_username: String,
    pub comment_count: u64,
}

#[derive(Debug)]
pub struct FollowListRow {
    pub user_id: String,
    pub username: String,
    pub since: DateTime<Utc>,
}

#[derive(Debug)]
pub struct CommentRow {
    pub id: String,
    pub body: String,
    pub body_html: String,
    pub created_at: DateTime<Utc>,
    pub disabled: bool,
    pub author_id: String,
    pub author_username: String,
    pub post_id: String,
}
