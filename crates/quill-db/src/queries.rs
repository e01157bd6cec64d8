use crate::Database;
use crate::models::{CommentRow, FollowListRow, PostRow, RoleRow, UserRow};
use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Row, params};

fn role_from_row(row: &Row) -> rusqlite::Result<RoleRow> {
    Ok(RoleRow {
        id: row.get(0)?,
        name: row.get(1)?,
        is_default: row.get(2)?,
        permissions: row.get::<_, i64>(3)? as u8,
    })
}

fn user_from_row(row: &Row) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        email: row.get(1)?,
        username: row.get(2)?,
        password_hash: row.get(3)?,
        role_id: row.get(4)?,
        confirmed: row.get(5)?,
        name: row.get(6)?,
        location: row.get(7)?,
        about_me: row.get(8)?,
        member_since: row.get(9)?,
        last_seen: row.get(10)?,
        avatar_hash: row.get(11)?,
    })
}

const USER_COLS: &str = "id, email, username, password_hash, role_id, confirmed, \
                         name, location, about_me, member_since, last_seen, avatar_hash";

fn post_from_row(row: &Row) -> rusqlite::Result<PostRow> {
    Ok(PostRow {
        id: row.get(0)?,
        body: row.get(1)?,
        body_html: row.get(2)?,
        created_at: row.get(3)?,
        author_id: row.get(4)?,
        author_username: row.get(5)?,
        comment_count: row.get::<_, i64>(6)? as u64,
    })
}

const POST_SELECT: &str = "SELECT p.id, p.body, p.body_html, p.created_at, p.author_id, \
         u.username, \
         (SELECT COUNT(*) FROM comments c WHERE c.post_id = p.id) \
     FROM posts p JOIN users u ON u.id = p.author_id";

fn comment_from_row(row: &Row) -> rusqlite::Result<CommentRow> {
    Ok(CommentRow {
        id: row.get(0)?,
        body: row.get(1)?,
        body_html: row.get(2)?,
        created_at: row.get(3)?,
        disabled: row.get(4)?,
        author_id: row.get(5)?,
        author_username: row.get(6)?,
        post_id: row.get(7)?,
    })
}

const COMMENT_SELECT: &str =
    "SELECT c.id, c.body, c.body_html, c.created_at, c.disabled, c.author_id, \
         u.username, c.post_id \
     FROM comments c JOIN users u ON u.id = c.author_id";

impl Database {
    // -- Roles --

    pub fn get_role(&self, id: i64) -> Result<Option<RoleRow>> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT id, name, is_default, permissions FROM roles WHERE id = ?1",
                    [id],
                    role_from_row,
                )
                .optional()?)
        })
    }

    /// The single role with `is_default = 1`, assigned at registration.
    pub fn default_role(&self) -> Result<RoleRow> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, name, is_default, permissions FROM roles WHERE is_default = 1",
                [],
                role_from_row,
            )
            .map_err(|_| anyhow!("no default role seeded"))
        })
    }

    /// The all-capabilities role, assigned to the configured admin email.
    pub fn admin_role(&self) -> Result<RoleRow> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, name, is_default, permissions FROM roles WHERE permissions = 255",
                [],
                role_from_row,
            )
            .map_err(|_| anyhow!("no administrator role seeded"))
        })
    }

    // -- Users --

    /// Insert a user and the reflexive follow edge in one transaction,
    /// so personalized feeds include the author's own posts from the
    /// first moment the account exists.
    pub fn create_user(&self, user: &UserRow) -> Result<()> {
        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;
            tx.execute(
                "INSERT INTO users (id, email, username, password_hash, role_id, confirmed, \
                     name, location, about_me, member_since, last_seen, avatar_hash) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    user.id,
                    user.email,
                    user.username,
                    user.password_hash,
                    user.role_id,
                    user.confirmed,
                    user.name,
                    user.location,
                    user.about_me,
                    user.member_since,
                    user.last_seen,
                    user.avatar_hash,
                ],
            )?;
            tx.execute(
                "INSERT INTO follows (follower_id, followed_id, created_at) VALUES (?1, ?1, ?2)",
                params![user.id, user.member_since],
            )?;
            tx.commit()?;
            Ok(())
        })
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    &format!("SELECT {USER_COLS} FROM users WHERE id = ?1"),
                    [id],
                    user_from_row,
                )
                .optional()?)
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    &format!("SELECT {USER_COLS} FROM users WHERE email = ?1"),
                    [email],
                    user_from_row,
                )
                .optional()?)
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    &format!("SELECT {USER_COLS} FROM users WHERE username = ?1"),
                    [username],
                    user_from_row,
                )
                .optional()?)
        })
    }

    pub fn set_confirmed(&self, id: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("UPDATE users SET confirmed = 1 WHERE id = ?1", [id])?;
            Ok(())
        })
    }

    pub fn set_password_hash(&self, id: &str, hash: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET password_hash = ?2 WHERE id = ?1",
                params![id, hash],
            )?;
            Ok(())
        })
    }

    /// Apply an email change as a single constraint-checked write.
    /// Returns false when another identity holds the email — the UNIQUE
    /// constraint is the authority, not any earlier check.
    pub fn change_email(&self, id: &str, new_email: &str, avatar_hash: &str) -> Result<bool> {
        self.with_conn(|conn| {
            match conn.execute(
                "UPDATE users SET email = ?2, avatar_hash = ?3 WHERE id = ?1",
                params![id, new_email, avatar_hash],
            ) {
                Ok(_) => Ok(true),
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
                {
                    Ok(false)
                }
                Err(e) => Err(e.into()),
            }
        })
    }

    pub fn update_profile(
        &self,
        id: &str,
        name: Option<&str>,
        location: Option<&str>,
        about_me: Option<&str>,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET name = ?2, location = ?3, about_me = ?4 WHERE id = ?1",
                params![id, name, location, about_me],
            )?;
            Ok(())
        })
    }

    pub fn touch_last_seen(&self, id: &str, now: DateTime<Utc>) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET last_seen = ?2 WHERE id = ?1",
                params![id, now],
            )?;
            Ok(())
        })
    }

    /// FK cascades remove the user's follow edges in both directions,
    /// plus their posts and comments.
    pub fn delete_user(&self, id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute("DELETE FROM users WHERE id = ?1", [id])?;
            Ok(n > 0)
        })
    }

    /// (post_count, follower_count, followed_count) — the reflexive
    /// edge is excluded from both follow counts.
    pub fn user_stats(&self, id: &str) -> Result<(u64, u64, u64)> {
        self.with_conn(|conn| {
            let posts: i64 = conn.query_row(
                "SELECT COUNT(*) FROM posts WHERE author_id = ?1",
                [id],
                |row| row.get(0),
            )?;
            let followers: i64 = conn.query_row(
                "SELECT COUNT(*) FROM follows WHERE followed_id = ?1 AND follower_id != ?1",
                [id],
                |row| row.get(0),
            )?;
            let followed: i64 = conn.query_row(
                "SELECT COUNT(*) FROM follows WHERE follower_id = ?1 AND followed_id != ?1",
                [id],
                |row| row.get(0),
            )?;
            Ok((posts as u64, followers as u64, followed as u64))
        })
    }

    // -- Follows --

    /// No-op if the edge already exists.
    pub fn insert_follow(
        &self,
        follower_id: &str,
        followed_id: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO follows (follower_id, followed_id, created_at) \
                 VALUES (?1, ?2, ?3)",
                params![follower_id, followed_id, now],
            )?;
            Ok(())
        })
    }

    /// No-op if the edge does not exist.
    pub fn delete_follow(&self, follower_id: &str, followed_id: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "DELETE FROM follows WHERE follower_id = ?1 AND followed_id = ?2",
                params![follower_id, followed_id],
            )?;
            Ok(())
        })
    }

    pub fn follow_exists(&self, follower_id: &str, followed_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let found: Option<i64> = conn
                .query_row(
                    "SELECT 1 FROM follows WHERE follower_id = ?1 AND followed_id = ?2",
                    params![follower_id, followed_id],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(found.is_some())
        })
    }

    pub fn follow_count(&self) -> Result<u64> {
        self.with_conn(|conn| {
            let n: i64 = conn.query_row("SELECT COUNT(*) FROM follows", [], |row| row.get(0))?;
            Ok(n as u64)
        })
    }

    pub fn followers_of(&self, id: &str, limit: u32, offset: u32) -> Result<Vec<FollowListRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT f.follower_id, u.username, f.created_at \
                 FROM follows f JOIN users u ON u.id = f.follower_id \
                 WHERE f.followed_id = ?1 AND f.follower_id != ?1 \
                 ORDER BY f.created_at DESC LIMIT ?2 OFFSET ?3",
            )?;
            let rows = stmt
                .query_map(params![id, limit, offset], |row| {
                    Ok(FollowListRow {
                        user_id: row.get(0)?,
                        username: row.get(1)?,
                        since: row.get(2)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    pub fn followed_by(&self, id: &str, limit: u32, offset: u32) -> Result<Vec<FollowListRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT f.followed_id, u.username, f.created_at \
                 FROM follows f JOIN users u ON u.id = f.followed_id \
                 WHERE f.follower_id = ?1 AND f.followed_id != ?1 \
                 ORDER BY f.created_at DESC LIMIT ?2 OFFSET ?3",
            )?;
            let rows = stmt
                .query_map(params![id, limit, offset], |row| {
                    Ok(FollowListRow {
                        user_id: row.get(0)?,
                        username: row.get(1)?,
                        since: row.get(2)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    // -- Posts --

    pub fn insert_post(
        &self,
        id: &str,
        body: &str,
        body_html: &str,
        author_id: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO posts (id, body, body_html, created_at, author_id) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![id, body, body_html, now, author_id],
            )?;
            Ok(())
        })
    }

    /// body_html is derived from body; they only ever change together.
    pub fn update_post_body(&self, id: &str, body: &str, body_html: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE posts SET body = ?2, body_html = ?3 WHERE id = ?1",
                params![id, body, body_html],
            )?;
            Ok(n > 0)
        })
    }

    pub fn get_post(&self, id: &str) -> Result<Option<PostRow>> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row(&format!("{POST_SELECT} WHERE p.id = ?1"), [id], post_from_row)
                .optional()?)
        })
    }

    pub fn list_posts(&self, limit: u32, offset: u32) -> Result<Vec<PostRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{POST_SELECT} ORDER BY p.created_at DESC LIMIT ?1 OFFSET ?2"
            ))?;
            let rows = stmt
                .query_map(params![limit, offset], post_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    pub fn count_posts(&self) -> Result<u64> {
        self.with_conn(|conn| {
            let n: i64 = conn.query_row("SELECT COUNT(*) FROM posts", [], |row| row.get(0))?;
            Ok(n as u64)
        })
    }

    pub fn list_posts_by_author(
        &self,
        author_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<PostRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{POST_SELECT} WHERE p.author_id = ?1 \
                 ORDER BY p.created_at DESC LIMIT ?2 OFFSET ?3"
            ))?;
            let rows = stmt
                .query_map(params![author_id, limit, offset], post_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    pub fn count_posts_by_author(&self, author_id: &str) -> Result<u64> {
        self.with_conn(|conn| {
            let n: i64 = conn.query_row(
                "SELECT COUNT(*) FROM posts WHERE author_id = ?1",
                [author_id],
                |row| row.get(0),
            )?;
            Ok(n as u64)
        })
    }

    /// The personalized feed: posts by anyone the user follows. The
    /// reflexive edge makes the user's own posts part of the feed.
    pub fn followed_feed(&self, user_id: &str, limit: u32, offset: u32) -> Result<Vec<PostRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{POST_SELECT} JOIN follows f ON f.followed_id = p.author_id \
                 WHERE f.follower_id = ?1 \
                 ORDER BY p.created_at DESC LIMIT ?2 OFFSET ?3"
            ))?;
            let rows = stmt
                .query_map(params![user_id, limit, offset], post_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    pub fn count_followed_feed(&self, user_id: &str) -> Result<u64> {
        self.with_conn(|conn| {
            let n: i64 = conn.query_row(
                "SELECT COUNT(*) FROM posts p \
                 JOIN follows f ON f.followed_id = p.author_id \
                 WHERE f.follower_id = ?1",
                [user_id],
                |row| row.get(0),
            )?;
            Ok(n as u64)
        })
    }

    // -- Comments --

    pub fn insert_comment(
        &self,
        id: &str,
        body: &str,
        body_html: &str,
        author_id: &str,
        post_id: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO comments (id, body, body_html, created_at, author_id, post_id) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![id, body, body_html, now, author_id, post_id],
            )?;
            Ok(())
        })
    }

    pub fn get_comment(&self, id: &str) -> Result<Option<CommentRow>> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    &format!("{COMMENT_SELECT} WHERE c.id = ?1"),
                    [id],
                    comment_from_row,
                )
                .optional()?)
        })
    }

    /// Comments under a post read oldest-first, like a thread.
    pub fn list_comments_for_post(
        &self,
        post_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<CommentRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{COMMENT_SELECT} WHERE c.post_id = ?1 \
                 ORDER BY c.created_at ASC LIMIT ?2 OFFSET ?3"
            ))?;
            let rows = stmt
                .query_map(params![post_id, limit, offset], comment_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    pub fn count_comments_for_post(&self, post_id: &str) -> Result<u64> {
        self.with_conn(|conn| {
            let n: i64 = conn.query_row(
                "SELECT COUNT(*) FROM comments WHERE post_id = ?1",
                [post_id],
                |row| row.get(0),
            )?;
            Ok(n as u64)
        })
    }

    /// Site-wide comment stream for moderation, newest first.
    pub fn list_comments(&self, limit: u32, offset: u32) -> Result<Vec<CommentRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{COMMENT_SELECT} ORDER BY c.created_at DESC LIMIT ?1 OFFSET ?2"
            ))?;
            let rows = stmt
                .query_map(params![limit, offset], comment_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    pub fn count_comments(&self) -> Result<u64> {
        self.with_conn(|conn| {
            let n: i64 = conn.query_row("SELECT COUNT(*) FROM comments", [], |row| row.get(0))?;
            Ok(n as u64)
        })
    }

    /// Moderation toggle: hides or restores a comment without deleting it.
    pub fn set_comment_disabled(&self, id: &str, disabled: bool) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE comments SET disabled = ?2 WHERE id = ?1",
                params![id, disabled],
            )?;
            Ok(n > 0)
        })
    }
}
