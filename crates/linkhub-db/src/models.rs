//! Database row types, mapped one-to-one onto SQLite rows.
//! Distinct from the API models so the storage layer stays independent.

pub struct MemberRow {
    pub id: i64,
    pub social_id: String,
    pub provider: String,
    pub role: String,
    pub nickname: String,
    pub about_me: Option<String>,
    pub news_email: String,
    pub is_subscribed: bool,
    pub favorite_category: Option<String>,
    pub created_at: String,
}

/// Batch-enrichment projection: nickname + active profile image for one
/// member, used to decorate pages from other aggregates.
pub struct MemberInfoRow {
    pub id: i64,
    pub nickname: String,
    pub image_path: Option<String>,
}

pub struct SpaceRow {
    pub id: i64,
    pub owner_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub category: String,
    pub is_visible: bool,
    pub view_count: i64,
    pub scrap_count: i64,
    pub favorite_count: i64,
    pub image_path: Option<String>,
    pub created_at: String,
}

pub struct LinkRow {
    pub id: i64,
    pub space_id: i64,
    pub url: String,
    pub title: String,
    pub tag_name: Option<String>,
    pub tag_color: Option<String>,
    pub like_count: i64,
    pub created_at: String,
}

pub struct DeadLetterRow {
    pub id: i64,
    pub kind: String,
    pub target_id: i64,
    pub delta: i64,
    pub attempts: i64,
    pub created_at: String,
}
