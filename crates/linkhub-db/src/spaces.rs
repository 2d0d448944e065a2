use anyhow::Result;
use rusqlite::{Connection, Row, params};

use crate::models::{DeadLetterRow, SpaceRow};
use crate::{Database, OptionalExt};

const SPACE_COLS: &str = "id, owner_id, name, description, category, is_visible, view_count, \
     scrap_count, favorite_count, image_path, created_at";

fn map_space(row: &Row<'_>) -> rusqlite::Result<SpaceRow> {
    Ok(SpaceRow {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        category: row.get(4)?,
        is_visible: row.get(5)?,
        view_count: row.get(6)?,
        scrap_count: row.get(7)?,
        favorite_count: row.get(8)?,
        image_path: row.get(9)?,
        created_at: row.get(10)?,
    })
}

pub struct NewSpace<'a> {
    pub owner_id: i64,
    pub name: &'a str,
    pub description: Option<&'a str>,
    pub category: &'a str,
    pub is_visible: bool,
    pub image_path: Option<&'a str>,
}

/// Space counters the reconciler may adjust asynchronously. The favorite
/// counter is excluded: it moves synchronously inside the registrar
/// transaction.
#[derive(Debug, Clone, Copy)]
pub enum SpaceCounter {
    View,
    Scrap,
}

impl SpaceCounter {
    fn column(self) -> &'static str {
        match self {
            Self::View => "view_count",
            Self::Scrap => "scrap_count",
        }
    }
}

impl Database {
    // -- Spaces --

    pub fn insert_space(&self, space: &NewSpace<'_>) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO spaces (owner_id, name, description, category, is_visible, image_path)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    space.owner_id,
                    space.name,
                    space.description,
                    space.category,
                    space.is_visible,
                    space.image_path,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn update_space(
        &self,
        space_id: i64,
        name: &str,
        description: Option<&str>,
        category: &str,
        is_visible: bool,
    ) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE spaces SET name = ?2, description = ?3, category = ?4, is_visible = ?5
                 WHERE id = ?1",
                params![space_id, name, description, category, is_visible],
            )?;
            Ok(changed == 1)
        })
    }

    pub fn get_space(&self, space_id: i64) -> Result<Option<SpaceRow>> {
        self.with_conn(|conn| get_space(conn, space_id))
    }

    /// Page of visible spaces matching the keyword/category filters.
    /// Fetches `limit` rows (callers pass size + 1 to probe for a next page),
    /// ordered newest first with an id tiebreak so repeated identical queries
    /// return identical order.
    pub fn search_public_spaces(
        &self,
        keyword: Option<&str>,
        category: Option<&str>,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<SpaceRow>> {
        self.search_spaces(None, keyword, category, limit, offset)
    }

    /// Same filters, restricted to one owner and including hidden spaces.
    pub fn search_my_spaces(
        &self,
        owner_id: i64,
        keyword: Option<&str>,
        category: Option<&str>,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<SpaceRow>> {
        self.search_spaces(Some(owner_id), keyword, category, limit, offset)
    }

    fn search_spaces(
        &self,
        owner_id: Option<i64>,
        keyword: Option<&str>,
        category: Option<&str>,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<SpaceRow>> {
        self.with_conn(|conn| {
            let mut sql = format!("SELECT {SPACE_COLS} FROM spaces WHERE 1 = 1");
            let mut params: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

            match owner_id {
                Some(owner) => {
                    sql.push_str(&format!(" AND owner_id = ?{}", params.len() + 1));
                    params.push(Box::new(owner));
                }
                None => sql.push_str(" AND is_visible = 1"),
            }
            if let Some(keyword) = keyword {
                let pattern = format!("%{}%", keyword);
                sql.push_str(&format!(
                    " AND (name LIKE ?{n} OR description LIKE ?{n})",
                    n = params.len() + 1
                ));
                params.push(Box::new(pattern));
            }
            if let Some(category) = category {
                sql.push_str(&format!(" AND category = ?{}", params.len() + 1));
                params.push(Box::new(category.to_string()));
            }
            sql.push_str(&format!(
                " ORDER BY created_at DESC, id DESC LIMIT ?{} OFFSET ?{}",
                params.len() + 1,
                params.len() + 2
            ));
            params.push(Box::new(limit));
            params.push(Box::new(offset));

            let mut stmt = conn.prepare(&sql)?;
            let param_refs: Vec<&dyn rusqlite::types::ToSql> =
                params.iter().map(|p| p.as_ref()).collect();
            let rows = stmt
                .query_map(param_refs.as_slice(), map_space)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Optimistic counters --

    /// Read a counter with its version token, for a read-modify-write cycle.
    pub fn read_space_counter(
        &self,
        space_id: i64,
        counter: SpaceCounter,
    ) -> Result<Option<(i64, i64)>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {}, version FROM spaces WHERE id = ?1",
                counter.column()
            );
            conn.query_row(&sql, [space_id], |row| Ok((row.get(0)?, row.get(1)?)))
                .optional()
        })
    }

    /// Persist a new counter value iff the version is unchanged since the
    /// read. Returns false on a version clash (a concurrent writer won).
    pub fn try_update_space_counter(
        &self,
        space_id: i64,
        counter: SpaceCounter,
        new_value: i64,
        expected_version: i64,
    ) -> Result<bool> {
        self.with_conn(|conn| {
            let sql = format!(
                "UPDATE spaces SET {} = ?2, version = version + 1
                 WHERE id = ?1 AND version = ?3",
                counter.column()
            );
            let changed = conn.execute(&sql, params![space_id, new_value, expected_version])?;
            Ok(changed == 1)
        })
    }

    // -- Dead letters --

    pub fn record_dead_letter(
        &self,
        kind: &str,
        target_id: i64,
        delta: i64,
        attempts: u32,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO counter_dead_letters (kind, target_id, delta, attempts)
                 VALUES (?1, ?2, ?3, ?4)",
                params![kind, target_id, delta, attempts],
            )?;
            Ok(())
        })
    }

    pub fn dead_letters(&self) -> Result<Vec<DeadLetterRow>> {
        self.with_conn(|conn| {
            let rows = conn
                .prepare(
                    "SELECT id, kind, target_id, delta, attempts, created_at
                     FROM counter_dead_letters ORDER BY id",
                )?
                .query_map([], |row| {
                    Ok(DeadLetterRow {
                        id: row.get(0)?,
                        kind: row.get(1)?,
                        target_id: row.get(2)?,
                        delta: row.get(3)?,
                        attempts: row.get(4)?,
                        created_at: row.get(5)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

// Connection-level helpers, composable inside the favorite registrar
// transaction.

pub fn get_space(conn: &Connection, space_id: i64) -> Result<Option<SpaceRow>> {
    let sql = format!("SELECT {SPACE_COLS} FROM spaces WHERE id = ?1");
    conn.prepare(&sql)?
        .query_row([space_id], map_space)
        .optional()
}

pub fn favorite_exists(conn: &Connection, member_id: i64, space_id: i64) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM favorites WHERE member_id = ?1 AND space_id = ?2",
            params![member_id, space_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

pub fn insert_favorite(conn: &Connection, member_id: i64, space_id: i64) -> Result<i64> {
    conn.execute(
        "INSERT INTO favorites (member_id, space_id) VALUES (?1, ?2)",
        params![member_id, space_id],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn delete_favorite(conn: &Connection, member_id: i64, space_id: i64) -> Result<usize> {
    Ok(conn.execute(
        "DELETE FROM favorites WHERE member_id = ?1 AND space_id = ?2",
        params![member_id, space_id],
    )?)
}

/// Synchronous favorite-counter bump, clamped at zero.
pub fn bump_favorite_count(conn: &Connection, space_id: i64, delta: i64) -> Result<i64> {
    conn.execute(
        "UPDATE spaces SET favorite_count = MAX(favorite_count + ?2, 0) WHERE id = ?1",
        params![space_id, delta],
    )?;
    let count = conn.query_row(
        "SELECT favorite_count FROM spaces WHERE id = ?1",
        [space_id],
        |row| row.get(0),
    )?;
    Ok(count)
}
