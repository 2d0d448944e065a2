use anyhow::Result;
use rusqlite::{Connection, Row, params};

use crate::models::LinkRow;
use crate::{Database, OptionalExt};

const LINK_COLS: &str = "id, space_id, url, title, tag_name, tag_color, like_count, created_at";

fn map_link(row: &Row<'_>) -> rusqlite::Result<LinkRow> {
    Ok(LinkRow {
        id: row.get(0)?,
        space_id: row.get(1)?,
        url: row.get(2)?,
        title: row.get(3)?,
        tag_name: row.get(4)?,
        tag_color: row.get(5)?,
        like_count: row.get(6)?,
        created_at: row.get(7)?,
    })
}

pub struct NewLink<'a> {
    pub space_id: i64,
    pub url: &'a str,
    pub title: &'a str,
    pub tag_name: Option<&'a str>,
    pub tag_color: Option<&'a str>,
}

impl Database {
    // -- Links --

    pub fn insert_link(&self, link: &NewLink<'_>) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO links (space_id, url, title, tag_name, tag_color)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    link.space_id,
                    link.url,
                    link.title,
                    link.tag_name,
                    link.tag_color,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// Update url/title; the tag is touched only when a replacement is given.
    pub fn update_link(
        &self,
        link_id: i64,
        url: &str,
        title: &str,
        tag: Option<(&str, &str)>,
    ) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = match tag {
                Some((tag_name, tag_color)) => conn.execute(
                    "UPDATE links SET url = ?2, title = ?3, tag_name = ?4, tag_color = ?5
                     WHERE id = ?1",
                    params![link_id, url, title, tag_name, tag_color],
                )?,
                None => conn.execute(
                    "UPDATE links SET url = ?2, title = ?3 WHERE id = ?1",
                    params![link_id, url, title],
                )?,
            };
            Ok(changed == 1)
        })
    }

    pub fn get_link(&self, link_id: i64) -> Result<Option<LinkRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {LINK_COLS} FROM links WHERE id = ?1");
            conn.prepare(&sql)?.query_row([link_id], map_link).optional()
        })
    }

    /// Page of a space's links, newest first with an id tiebreak.
    pub fn links_page(&self, space_id: i64, limit: u32, offset: u32) -> Result<Vec<LinkRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {LINK_COLS} FROM links WHERE space_id = ?1
                 ORDER BY created_at DESC, id DESC LIMIT ?2 OFFSET ?3"
            );
            let rows = conn
                .prepare(&sql)?
                .query_map(params![space_id, limit, offset], map_link)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Batch-fetch which of the given links the member has liked.
    pub fn liked_link_ids(&self, member_id: i64, link_ids: &[i64]) -> Result<Vec<i64>> {
        if link_ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let placeholders: Vec<String> =
                (2..=link_ids.len() + 1).map(|i| format!("?{}", i)).collect();
            let sql = format!(
                "SELECT link_id FROM link_likes WHERE member_id = ?1 AND link_id IN ({})",
                placeholders.join(", ")
            );

            let mut stmt = conn.prepare(&sql)?;
            let mut params: Vec<&dyn rusqlite::types::ToSql> = vec![&member_id];
            params.extend(
                link_ids
                    .iter()
                    .map(|id| id as &dyn rusqlite::types::ToSql),
            );

            let rows = stmt
                .query_map(params.as_slice(), |row| row.get(0))?
                .collect::<std::result::Result<Vec<i64>, _>>()?;
            Ok(rows)
        })
    }

    // -- Optimistic like counter --

    pub fn read_link_like_counter(&self, link_id: i64) -> Result<Option<(i64, i64)>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT like_count, version FROM links WHERE id = ?1",
                [link_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
        })
    }

    /// Persist a new like count iff the version is unchanged since the read.
    pub fn try_update_link_like_counter(
        &self,
        link_id: i64,
        new_value: i64,
        expected_version: i64,
    ) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE links SET like_count = ?2, version = version + 1
                 WHERE id = ?1 AND version = ?3",
                params![link_id, new_value, expected_version],
            )?;
            Ok(changed == 1)
        })
    }
}

// Connection-level helpers, composable inside the like registrar transaction.

pub fn link_exists(conn: &Connection, link_id: i64) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row("SELECT 1 FROM links WHERE id = ?1", [link_id], |row| {
            row.get(0)
        })
        .optional()?;
    Ok(found.is_some())
}

pub fn like_exists(conn: &Connection, member_id: i64, link_id: i64) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM link_likes WHERE member_id = ?1 AND link_id = ?2",
            params![member_id, link_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

pub fn insert_like(conn: &Connection, member_id: i64, link_id: i64) -> Result<i64> {
    conn.execute(
        "INSERT INTO link_likes (member_id, link_id) VALUES (?1, ?2)",
        params![member_id, link_id],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn delete_like(conn: &Connection, member_id: i64, link_id: i64) -> Result<usize> {
    Ok(conn.execute(
        "DELETE FROM link_likes WHERE member_id = ?1 AND link_id = ?2",
        params![member_id, link_id],
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::members::NewMember;
    use crate::spaces::NewSpace;

    fn seed(db: &Database) -> (i64, i64) {
        let member = db
            .insert_member(&NewMember {
                social_id: "soc-1",
                provider: "google",
                role: "user",
                nickname: "owner",
                about_me: None,
                news_email: "news@example.com",
                is_subscribed: false,
                favorite_category: None,
                image_path: "https://img.example.com/default.png",
                image_name: "default-image",
            })
            .unwrap();
        let space = db
            .insert_space(&NewSpace {
                owner_id: member,
                name: "reading list",
                description: None,
                category: "etc",
                is_visible: true,
                image_path: None,
            })
            .unwrap();
        (member, space)
    }

    #[test]
    fn update_without_tag_keeps_existing_tag() {
        let db = Database::open_in_memory().unwrap();
        let (_, space) = seed(&db);
        let link = db
            .insert_link(&NewLink {
                space_id: space,
                url: "https://example.com",
                title: "example",
                tag_name: Some("rust"),
                tag_color: Some("orange"),
            })
            .unwrap();

        db.update_link(link, "https://example.org", "renamed", None)
            .unwrap();
        let row = db.get_link(link).unwrap().unwrap();
        assert_eq!(row.url, "https://example.org");
        assert_eq!(row.tag_name.as_deref(), Some("rust"));
        assert_eq!(row.tag_color.as_deref(), Some("orange"));

        db.update_link(link, "https://example.org", "renamed", Some(("web", "blue")))
            .unwrap();
        let row = db.get_link(link).unwrap().unwrap();
        assert_eq!(row.tag_name.as_deref(), Some("web"));
        assert_eq!(row.tag_color.as_deref(), Some("blue"));
    }

    #[test]
    fn page_never_exceeds_probe_limit() {
        let db = Database::open_in_memory().unwrap();
        let (_, space) = seed(&db);
        for i in 0..7 {
            db.insert_link(&NewLink {
                space_id: space,
                url: "https://example.com",
                title: &format!("link {i}"),
                tag_name: None,
                tag_color: None,
            })
            .unwrap();
        }

        assert_eq!(db.links_page(space, 4, 0).unwrap().len(), 4);
        assert_eq!(db.links_page(space, 4, 4).unwrap().len(), 3);
    }

    #[test]
    fn liked_link_ids_is_scoped_to_member_and_set() {
        let db = Database::open_in_memory().unwrap();
        let (member, space) = seed(&db);
        let a = db
            .insert_link(&NewLink {
                space_id: space,
                url: "https://a.example",
                title: "a",
                tag_name: None,
                tag_color: None,
            })
            .unwrap();
        let b = db
            .insert_link(&NewLink {
                space_id: space,
                url: "https://b.example",
                title: "b",
                tag_name: None,
                tag_color: None,
            })
            .unwrap();

        db.with_conn(|conn| {
            insert_like(conn, member, a)?;
            Ok(())
        })
        .unwrap();

        assert_eq!(db.liked_link_ids(member, &[a, b]).unwrap(), vec![a]);
        assert!(db.liked_link_ids(member, &[b]).unwrap().is_empty());
        assert!(db.liked_link_ids(member, &[]).unwrap().is_empty());
    }

    #[test]
    fn like_counter_version_check() {
        let db = Database::open_in_memory().unwrap();
        let (_, space) = seed(&db);
        let link = db
            .insert_link(&NewLink {
                space_id: space,
                url: "https://example.com",
                title: "l",
                tag_name: None,
                tag_color: None,
            })
            .unwrap();

        let (count, version) = db.read_link_like_counter(link).unwrap().unwrap();
        assert!(db.try_update_link_like_counter(link, count + 1, version).unwrap());
        assert!(!db.try_update_link_like_counter(link, count + 1, version).unwrap());
        assert_eq!(db.read_link_like_counter(link).unwrap().unwrap().0, 1);

        assert!(db.read_link_like_counter(9999).unwrap().is_none());
    }
}
