use anyhow::Result;
use quill_auth::permission::builtin_roles;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS roles (
            id          INTEGER PRIMARY KEY,
            name        TEXT NOT NULL UNIQUE,
            is_default  INTEGER NOT NULL DEFAULT 0,
            permissions INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS users (
            id            TEXT PRIMARY KEY,
            email         TEXT NOT NULL UNIQUE,
            username      TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            role_id       INTEGER NOT NULL REFERENCES roles(id),
            confirmed     INTEGER NOT NULL DEFAULT 0,
            name          TEXT,
            location      TEXT,
            about_me      TEXT,
            member_since  TEXT NOT NULL,
            last_seen     TEXT NOT NULL,
            avatar_hash   TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS follows (
            follower_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            followed_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            created_at  TEXT NOT NULL,
            PRIMARY KEY (follower_id, followed_id)
        );

        CREATE INDEX IF NOT EXISTS idx_follows_followed
            ON follows(followed_id);

        CREATE TABLE IF NOT EXISTS posts (
            id          TEXT PRIMARY KEY,
            body        TEXT NOT NULL,
            body_html   TEXT NOT NULL,
            created_at  TEXT NOT NULL,
            author_id   TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_posts_created
            ON posts(created_at);
        CREATE INDEX IF NOT EXISTS idx_posts_author
            ON posts(author_id, created_at);

        CREATE TABLE IF NOT EXISTS comments (
            id          TEXT PRIMARY KEY,
            body        TEXT NOT NULL,
            body_html   TEXT NOT NULL,
            created_at  TEXT NOT NULL,
            disabled    INTEGER NOT NULL DEFAULT 0,
            author_id   TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            post_id     TEXT NOT NULL REFERENCES posts(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_comments_post
            ON comments(post_id, created_at);
        ",
    )?;

    seed_roles(conn)?;

    info!("Database migrations complete");
    Ok(())
}

/// Upsert the built-in role table by name. Safe to re-run: existing
/// roles are updated in place, never duplicated.
fn seed_roles(conn: &Connection) -> Result<()> {
    for role in builtin_roles() {
        conn.execute(
            "INSERT INTO roles (name, is_default, permissions) VALUES (?1, ?2, ?3)
             ON CONFLICT(name) DO UPDATE SET
                 is_default = excluded.is_default,
                 permissions = excluded.permissions",
            (role.name, role.is_default, role.permissions),
        )?;
    }
    Ok(())
}
