use anyhow::Result;
use rusqlite::{Connection, Row, params};

use crate::models::{MemberInfoRow, MemberRow};
use crate::{Database, OptionalExt};

/// Column set + mapper shared by every member lookup.
const MEMBER_COLS: &str = "id, social_id, provider, role, nickname, about_me, news_email, \
     is_subscribed, favorite_category, created_at";

fn map_member(row: &Row<'_>) -> rusqlite::Result<MemberRow> {
    Ok(MemberRow {
        id: row.get(0)?,
        social_id: row.get(1)?,
        provider: row.get(2)?,
        role: row.get(3)?,
        nickname: row.get(4)?,
        about_me: row.get(5)?,
        news_email: row.get(6)?,
        is_subscribed: row.get(7)?,
        favorite_category: row.get(8)?,
        created_at: row.get(9)?,
    })
}

pub struct NewMember<'a> {
    pub social_id: &'a str,
    pub provider: &'a str,
    pub role: &'a str,
    pub nickname: &'a str,
    pub about_me: Option<&'a str>,
    pub news_email: &'a str,
    pub is_subscribed: bool,
    pub favorite_category: Option<&'a str>,
    pub image_path: &'a str,
    pub image_name: &'a str,
}

impl Database {
    // -- Members --

    /// Insert a member together with their active profile image, atomically.
    pub fn insert_member(&self, member: &NewMember<'_>) -> Result<i64> {
        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;
            tx.execute(
                "INSERT INTO members (social_id, provider, role, nickname, about_me, news_email, is_subscribed, favorite_category)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    member.social_id,
                    member.provider,
                    member.role,
                    member.nickname,
                    member.about_me,
                    member.news_email,
                    member.is_subscribed,
                    member.favorite_category,
                ],
            )?;
            let member_id = tx.last_insert_rowid();
            tx.execute(
                "INSERT INTO profile_images (member_id, path, name) VALUES (?1, ?2, ?3)",
                params![member_id, member.image_path, member.image_name],
            )?;
            tx.commit()?;
            Ok(member_id)
        })
    }

    pub fn find_member_by_social(
        &self,
        social_id: &str,
        provider: &str,
    ) -> Result<Option<MemberRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {MEMBER_COLS} FROM members
                 WHERE social_id = ?1 AND provider = ?2 AND is_deleted = 0"
            );
            conn.prepare(&sql)?
                .query_row(params![social_id, provider], map_member)
                .optional()
        })
    }

    pub fn get_member(&self, member_id: i64) -> Result<Option<MemberRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {MEMBER_COLS} FROM members WHERE id = ?1 AND is_deleted = 0");
            conn.prepare(&sql)?
                .query_row([member_id], map_member)
                .optional()
        })
    }

    /// Batch-fetch nickname + profile image for a set of member ids.
    /// Soft-deleted members are omitted; callers substitute a placeholder.
    pub fn member_infos(&self, member_ids: &[i64]) -> Result<Vec<MemberInfoRow>> {
        if member_ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let placeholders: Vec<String> =
                (1..=member_ids.len()).map(|i| format!("?{}", i)).collect();
            let sql = format!(
                "SELECT m.id, m.nickname, pi.path
                 FROM members m
                 LEFT JOIN profile_images pi ON pi.member_id = m.id
                 WHERE m.id IN ({}) AND m.is_deleted = 0",
                placeholders.join(", ")
            );

            let mut stmt = conn.prepare(&sql)?;
            let params: Vec<&dyn rusqlite::types::ToSql> = member_ids
                .iter()
                .map(|id| id as &dyn rusqlite::types::ToSql)
                .collect();

            let rows = stmt
                .query_map(params.as_slice(), |row| {
                    Ok(MemberInfoRow {
                        id: row.get(0)?,
                        nickname: row.get(1)?,
                        image_path: row.get(2)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    /// Soft delete. Returns false if the member was already gone.
    pub fn soft_delete_member(&self, member_id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE members SET is_deleted = 1 WHERE id = ?1 AND is_deleted = 0",
                [member_id],
            )?;
            Ok(changed == 1)
        })
    }

    /// Replace the member's active profile image. The previous image row is
    /// dropped; a member owns at most one.
    pub fn set_profile_image(&self, member_id: i64, path: &str, name: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO profile_images (member_id, path, name) VALUES (?1, ?2, ?3)
                 ON CONFLICT(member_id) DO UPDATE SET path = excluded.path, name = excluded.name",
                params![member_id, path, name],
            )?;
            Ok(())
        })
    }

    // -- Follows --

    pub fn is_following(&self, follower_id: i64, followee_id: i64) -> Result<bool> {
        self.with_conn(|conn| follow_exists(conn, follower_id, followee_id))
    }

    pub fn follower_count(&self, member_id: i64) -> Result<i64> {
        self.with_conn(|conn| {
            Ok(conn.query_row(
                "SELECT COUNT(*) FROM follows WHERE followee_id = ?1",
                [member_id],
                |row| row.get(0),
            )?)
        })
    }

    pub fn following_count(&self, member_id: i64) -> Result<i64> {
        self.with_conn(|conn| {
            Ok(conn.query_row(
                "SELECT COUNT(*) FROM follows WHERE follower_id = ?1",
                [member_id],
                |row| row.get(0),
            )?)
        })
    }

    /// Page of member ids following `member_id`, newest edge first.
    pub fn follower_ids_page(&self, member_id: i64, limit: u32, offset: u32) -> Result<Vec<i64>> {
        self.with_conn(|conn| {
            let rows = conn
                .prepare(
                    "SELECT follower_id FROM follows WHERE followee_id = ?1
                     ORDER BY created_at DESC, id DESC LIMIT ?2 OFFSET ?3",
                )?
                .query_map(params![member_id, limit, offset], |row| row.get(0))?
                .collect::<std::result::Result<Vec<i64>, _>>()?;
            Ok(rows)
        })
    }

    /// Page of member ids that `member_id` follows, newest edge first.
    pub fn following_ids_page(&self, member_id: i64, limit: u32, offset: u32) -> Result<Vec<i64>> {
        self.with_conn(|conn| {
            let rows = conn
                .prepare(
                    "SELECT followee_id FROM follows WHERE follower_id = ?1
                     ORDER BY created_at DESC, id DESC LIMIT ?2 OFFSET ?3",
                )?
                .query_map(params![member_id, limit, offset], |row| row.get(0))?
                .collect::<std::result::Result<Vec<i64>, _>>()?;
            Ok(rows)
        })
    }
}

// Connection-level helpers, composable inside a registrar transaction.

pub fn member_exists(conn: &Connection, member_id: i64) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM members WHERE id = ?1 AND is_deleted = 0",
            [member_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

pub fn follow_exists(conn: &Connection, follower_id: i64, followee_id: i64) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM follows WHERE follower_id = ?1 AND followee_id = ?2",
            params![follower_id, followee_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

pub fn insert_follow(conn: &Connection, follower_id: i64, followee_id: i64) -> Result<i64> {
    conn.execute(
        "INSERT INTO follows (follower_id, followee_id) VALUES (?1, ?2)",
        params![follower_id, followee_id],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn delete_follow(conn: &Connection, follower_id: i64, followee_id: i64) -> Result<usize> {
    Ok(conn.execute(
        "DELETE FROM follows WHERE follower_id = ?1 AND followee_id = ?2",
        params![follower_id, followee_id],
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_member<'a>(social_id: &'a str, nickname: &'a str) -> NewMember<'a> {
        NewMember {
            social_id,
            provider: "google",
            role: "user",
            nickname,
            about_me: None,
            news_email: "news@example.com",
            is_subscribed: false,
            favorite_category: None,
            image_path: "https://img.example.com/default.png",
            image_name: "default-image",
        }
    }

    #[test]
    fn social_key_lookup_skips_soft_deleted() {
        let db = Database::open_in_memory().unwrap();
        let id = db.insert_member(&sample_member("soc-1", "ten")).unwrap();

        let found = db.find_member_by_social("soc-1", "google").unwrap();
        assert_eq!(found.unwrap().id, id);

        assert!(db.soft_delete_member(id).unwrap());
        assert!(db.find_member_by_social("soc-1", "google").unwrap().is_none());
        assert!(db.get_member(id).unwrap().is_none());
        // Second delete is a no-op
        assert!(!db.soft_delete_member(id).unwrap());
    }

    #[test]
    fn duplicate_social_pair_is_rejected_by_schema() {
        let db = Database::open_in_memory().unwrap();
        db.insert_member(&sample_member("soc-1", "a")).unwrap();
        let err = db.insert_member(&sample_member("soc-1", "b")).unwrap_err();
        assert!(crate::is_unique_violation(&err));
    }

    #[test]
    fn member_infos_batches_and_omits_deleted() {
        let db = Database::open_in_memory().unwrap();
        let a = db.insert_member(&sample_member("soc-a", "alpha")).unwrap();
        let b = db.insert_member(&sample_member("soc-b", "beta")).unwrap();
        db.soft_delete_member(b).unwrap();

        let infos = db.member_infos(&[a, b, 9999]).unwrap();
        assert_eq!(infos.len(), 1);
        assert_eq!(infos[0].id, a);
        assert_eq!(infos[0].nickname, "alpha");
        assert!(infos[0].image_path.is_some());

        assert!(db.member_infos(&[]).unwrap().is_empty());
    }

    #[test]
    fn profile_image_is_replaced_not_accumulated() {
        let db = Database::open_in_memory().unwrap();
        let id = db.insert_member(&sample_member("soc-1", "ten")).unwrap();
        db.set_profile_image(id, "https://img.example.com/new.png", "new")
            .unwrap();

        let infos = db.member_infos(&[id]).unwrap();
        assert_eq!(infos.len(), 1);
        assert_eq!(
            infos[0].image_path.as_deref(),
            Some("https://img.example.com/new.png")
        );
    }

    #[test]
    fn follow_edges_are_unique() {
        let db = Database::open_in_memory().unwrap();
        let a = db.insert_member(&sample_member("soc-a", "alpha")).unwrap();
        let b = db.insert_member(&sample_member("soc-b", "beta")).unwrap();

        db.with_conn(|conn| {
            assert!(!follow_exists(conn, a, b)?);
            insert_follow(conn, a, b)?;
            assert!(follow_exists(conn, a, b)?);
            let err = insert_follow(conn, a, b).unwrap_err();
            assert!(crate::is_unique_violation(&err));
            Ok(())
        })
        .unwrap();

        assert_eq!(db.follower_count(b).unwrap(), 1);
        assert_eq!(db.following_count(a).unwrap(), 1);
        assert_eq!(db.follower_ids_page(b, 10, 0).unwrap(), vec![a]);
        assert_eq!(db.following_ids_page(a, 10, 0).unwrap(), vec![b]);
    }
}
