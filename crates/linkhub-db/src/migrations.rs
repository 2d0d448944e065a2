use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS members (
            id                  INTEGER PRIMARY KEY AUTOINCREMENT,
            social_id           TEXT NOT NULL,
            provider            TEXT NOT NULL,
            role                TEXT NOT NULL DEFAULT 'user',
            nickname            TEXT NOT NULL,
            about_me            TEXT,
            news_email          TEXT NOT NULL,
            is_subscribed       INTEGER NOT NULL DEFAULT 0,
            favorite_category   TEXT,
            is_deleted          INTEGER NOT NULL DEFAULT 0,
            created_at          TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(social_id, provider)
        );

        CREATE TABLE IF NOT EXISTS profile_images (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            member_id   INTEGER NOT NULL UNIQUE REFERENCES members(id),
            path        TEXT NOT NULL,
            name        TEXT NOT NULL,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS follows (
            id           INTEGER PRIMARY KEY AUTOINCREMENT,
            follower_id  INTEGER NOT NULL REFERENCES members(id),
            followee_id  INTEGER NOT NULL REFERENCES members(id),
            created_at   TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(follower_id, followee_id)
        );

        CREATE INDEX IF NOT EXISTS idx_follows_followee
            ON follows(followee_id, created_at);

        CREATE TABLE IF NOT EXISTS spaces (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            owner_id        INTEGER NOT NULL REFERENCES members(id),
            name            TEXT NOT NULL,
            description     TEXT,
            category        TEXT NOT NULL,
            is_visible      INTEGER NOT NULL DEFAULT 1,
            view_count      INTEGER NOT NULL DEFAULT 0,
            scrap_count     INTEGER NOT NULL DEFAULT 0,
            favorite_count  INTEGER NOT NULL DEFAULT 0,
            image_path      TEXT,
            version         INTEGER NOT NULL DEFAULT 0,
            created_at      TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_spaces_visible
            ON spaces(is_visible, created_at);

        CREATE INDEX IF NOT EXISTS idx_spaces_owner
            ON spaces(owner_id, created_at);

        CREATE TABLE IF NOT EXISTS favorites (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            member_id   INTEGER NOT NULL REFERENCES members(id),
            space_id    INTEGER NOT NULL REFERENCES spaces(id),
            created_at  TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(member_id, space_id)
        );

        CREATE TABLE IF NOT EXISTS links (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            space_id    INTEGER NOT NULL REFERENCES spaces(id),
            url         TEXT NOT NULL,
            title       TEXT NOT NULL,
            tag_name    TEXT,
            tag_color   TEXT,
            like_count  INTEGER NOT NULL DEFAULT 0,
            version     INTEGER NOT NULL DEFAULT 0,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_links_space
            ON links(space_id, created_at);

        CREATE TABLE IF NOT EXISTS link_likes (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            member_id   INTEGER NOT NULL REFERENCES members(id),
            link_id     INTEGER NOT NULL REFERENCES links(id),
            created_at  TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(member_id, link_id)
        );

        -- Counter events that exhausted their retry budget land here instead
        -- of vanishing.
        CREATE TABLE IF NOT EXISTS counter_dead_letters (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            kind        TEXT NOT NULL,
            target_id   INTEGER NOT NULL,
            delta       INTEGER NOT NULL,
            attempts    INTEGER NOT NULL,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
