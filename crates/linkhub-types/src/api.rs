use serde::{Deserialize, Serialize};

use crate::models::{Category, Provider, TagColor};
use crate::{LinkId, MemberId, SpaceId};

/// Nickname shown when the owning member can no longer be resolved
/// (soft-deleted after their content was created).
pub const UNKNOWN_NICKNAME: &str = "unknown";

// -- Images --

/// Raw upload handed to the image store collaborator.
#[derive(Debug, Clone, Deserialize)]
pub struct ImageUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Stored object location returned by the image store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageInfo {
    pub path: String,
    pub name: String,
}

// -- Members --

#[derive(Debug, Deserialize)]
pub struct JoinRequest {
    pub social_id: String,
    pub provider: Provider,
    pub nickname: String,
    pub about_me: Option<String>,
    pub news_email: String,
    pub is_subscribed: bool,
    pub favorite_category: Option<Category>,
    pub image: Option<ImageUpload>,
}

#[derive(Debug, Serialize)]
pub struct JoinResponse {
    pub member_id: MemberId,
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub member_id: MemberId,
    pub nickname: String,
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct MemberProfileResponse {
    pub member_id: MemberId,
    pub nickname: String,
    pub about_me: Option<String>,
    pub image_path: Option<String>,
    pub favorite_category: Option<Category>,
    pub follower_count: i64,
    pub following_count: i64,
    pub is_followed_by_viewer: bool,
}

/// One row of a followers/followings listing.
#[derive(Debug, Serialize)]
pub struct MemberListItem {
    pub member_id: MemberId,
    pub nickname: String,
    pub image_path: Option<String>,
}

// -- Spaces --

#[derive(Debug, Deserialize)]
pub struct SpaceCreateRequest {
    pub name: String,
    pub description: Option<String>,
    pub category: Category,
    pub is_visible: bool,
    pub image: Option<ImageUpload>,
}

#[derive(Debug, Deserialize)]
pub struct SpaceUpdateRequest {
    pub name: String,
    pub description: Option<String>,
    pub category: Category,
    pub is_visible: bool,
}

/// Keyword/category filter for space listings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SpaceQueryFilter {
    pub keyword: Option<String>,
    pub category: Option<Category>,
}

#[derive(Debug, Serialize)]
pub struct SpaceListItem {
    pub space_id: SpaceId,
    pub name: String,
    pub description: String,
    pub category: Category,
    pub is_visible: bool,
    pub view_count: i64,
    pub scrap_count: i64,
    pub favorite_count: i64,
    pub image_path: Option<String>,
    pub owner_id: MemberId,
    pub owner_nickname: String,
}

#[derive(Debug, Serialize)]
pub struct SpaceDetailResponse {
    pub space_id: SpaceId,
    pub name: String,
    pub description: String,
    pub category: Category,
    pub is_visible: bool,
    pub view_count: i64,
    pub scrap_count: i64,
    pub favorite_count: i64,
    pub image_path: Option<String>,
    pub owner_id: MemberId,
    pub owner_nickname: String,
}

#[derive(Debug, Serialize)]
pub struct FavoriteCreatedResponse {
    pub favorite_id: i64,
    pub favorite_count: i64,
}

// -- Links --

#[derive(Debug, Deserialize)]
pub struct LinkCreateRequest {
    pub url: String,
    pub title: String,
    pub tag_name: Option<String>,
    pub tag_color: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LinkUpdateRequest {
    pub url: String,
    pub title: String,
    pub tag_name: Option<String>,
    pub tag_color: Option<String>,
}

impl LinkUpdateRequest {
    /// The tag is replaced only when both halves are supplied.
    pub fn tag_update(&self) -> Option<(&str, &str)> {
        match (self.tag_name.as_deref(), self.tag_color.as_deref()) {
            (Some(name), Some(color)) => Some((name, color)),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LinkListItem {
    pub link_id: LinkId,
    pub url: String,
    pub title: String,
    pub tag_name: Option<String>,
    pub tag_color: Option<TagColor>,
    pub like_count: i64,
    pub liked_by_viewer: bool,
}
