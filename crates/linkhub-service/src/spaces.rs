use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{info, warn};

use linkhub_db::models::{MemberInfoRow, SpaceRow};
use linkhub_db::{Database, is_unique_violation, spaces as db};
use linkhub_types::api::{
    FavoriteCreatedResponse, ImageUpload, SpaceCreateRequest, SpaceDetailResponse, SpaceListItem,
    SpaceQueryFilter, SpaceUpdateRequest, UNKNOWN_NICKNAME,
};
use linkhub_types::error::{ServiceError, ServiceResult};
use linkhub_types::events::CounterEvent;
use linkhub_types::models::Category;
use linkhub_types::page::{PageRequest, Slice};
use linkhub_types::{MemberId, SpaceId};

use crate::collaborators::ImageStore;
use crate::reconciler::CounterReconciler;

const SPACE_IMAGE_FOLDER: &str = "space-image/";

pub struct SpaceService {
    db: Arc<Database>,
    images: Arc<dyn ImageStore>,
    counters: CounterReconciler,
}

impl SpaceService {
    pub fn new(db: Arc<Database>, images: Arc<dyn ImageStore>, counters: CounterReconciler) -> Self {
        Self {
            db,
            images,
            counters,
        }
    }

    // -- CRUD --

    pub fn create_space(
        &self,
        owner_id: MemberId,
        req: SpaceCreateRequest,
    ) -> ServiceResult<SpaceId> {
        self.db
            .get_member(owner_id)?
            .ok_or_else(|| ServiceError::not_found("member"))?;

        let image_path = match req.image.as_ref() {
            Some(upload) => Some(self.save_image(upload)?),
            None => None,
        };

        let space_id = self.db.insert_space(&db::NewSpace {
            owner_id,
            name: &req.name,
            description: req.description.as_deref(),
            category: req.category.as_str(),
            is_visible: req.is_visible,
            image_path: image_path.as_deref(),
        })?;

        info!("Member {} created space {}", owner_id, space_id);
        Ok(space_id)
    }

    pub fn update_space(
        &self,
        space_id: SpaceId,
        editor_id: MemberId,
        req: SpaceUpdateRequest,
    ) -> ServiceResult<()> {
        let space = self
            .db
            .get_space(space_id)?
            .ok_or_else(|| ServiceError::not_found("space"))?;
        if space.owner_id != editor_id {
            return Err(ServiceError::unauthorized("only the owner may edit a space"));
        }

        self.db.update_space(
            space_id,
            &req.name,
            req.description.as_deref(),
            req.category.as_str(),
            req.is_visible,
        )?;
        Ok(())
    }

    /// Space detail with owner enrichment. Publishes a view-count event; the
    /// read path never waits for the counter to land.
    pub fn get_space(
        &self,
        space_id: SpaceId,
        viewer: Option<MemberId>,
    ) -> ServiceResult<SpaceDetailResponse> {
        let space = self
            .db
            .get_space(space_id)?
            .ok_or_else(|| ServiceError::not_found("space"))?;
        ensure_accessible(&space, viewer)?;

        let owner_nickname = self
            .db
            .member_infos(&[space.owner_id])?
            .pop()
            .map(|info| info.nickname)
            .unwrap_or_else(|| UNKNOWN_NICKNAME.to_string());

        self.counters.publish(CounterEvent::SpaceView { space_id });

        Ok(SpaceDetailResponse {
            space_id: space.id,
            name: space.name,
            description: space.description.unwrap_or_default(),
            category: parse_category(&space.category, space.id),
            is_visible: space.is_visible,
            view_count: space.view_count,
            scrap_count: space.scrap_count,
            favorite_count: space.favorite_count,
            image_path: space.image_path,
            owner_id: space.owner_id,
            owner_nickname,
        })
    }

    /// A member copied this space into their own collection.
    pub fn mark_scrapped(&self, space_id: SpaceId) -> ServiceResult<()> {
        self.db
            .get_space(space_id)?
            .ok_or_else(|| ServiceError::not_found("space"))?;
        self.counters.publish(CounterEvent::SpaceScrap { space_id });
        Ok(())
    }

    // -- Favorite registrar --

    /// Register the space in the member's favorites exactly once. Existence
    /// check, edge insert, and the synchronous favorite-counter bump all share
    /// one transaction; the UNIQUE constraint backstops concurrent identical
    /// requests.
    pub fn create_favorite(
        &self,
        space_id: SpaceId,
        member_id: MemberId,
    ) -> ServiceResult<FavoriteCreatedResponse> {
        let response = self.db.with_tx(|tx| {
            let Some(space) = db::get_space(tx, space_id)? else {
                return Ok(Err(ServiceError::not_found("space")));
            };
            if let Err(e) = ensure_accessible(&space, Some(member_id)) {
                return Ok(Err(e));
            }
            if db::favorite_exists(tx, member_id, space_id)? {
                return Ok(Err(ServiceError::duplicate("favorite")));
            }

            let favorite_id = match db::insert_favorite(tx, member_id, space_id) {
                Ok(id) => id,
                Err(e) if is_unique_violation(&e) => {
                    return Ok(Err(ServiceError::duplicate("favorite")));
                }
                Err(e) => return Err(e),
            };
            let favorite_count = db::bump_favorite_count(tx, space_id, 1)?;

            Ok(Ok(FavoriteCreatedResponse {
                favorite_id,
                favorite_count,
            }))
        })??;

        Ok(response)
    }

    pub fn remove_favorite(&self, space_id: SpaceId, member_id: MemberId) -> ServiceResult<i64> {
        let count = self.db.with_tx(|tx| {
            if db::get_space(tx, space_id)?.is_none() {
                return Ok(Err(ServiceError::not_found("space")));
            }
            if db::delete_favorite(tx, member_id, space_id)? == 0 {
                return Ok(Err(ServiceError::not_found("favorite")));
            }
            Ok(Ok(db::bump_favorite_count(tx, space_id, -1)?))
        })??;

        Ok(count)
    }

    // -- Query composer --

    /// Paginated public listing: one filtered page query, one batch nickname
    /// query, zipped by owner id in page order.
    pub fn find_public_spaces(
        &self,
        filter: &SpaceQueryFilter,
        page: PageRequest,
    ) -> ServiceResult<Slice<SpaceListItem>> {
        let rows = self.db.search_public_spaces(
            filter.keyword.as_deref(),
            filter.category.map(|c| c.as_str()),
            page.probe_limit(),
            page.offset(),
        )?;
        self.compose_space_page(rows, page)
    }

    /// The caller's own spaces, hidden ones included.
    pub fn find_my_spaces(
        &self,
        member_id: MemberId,
        filter: &SpaceQueryFilter,
        page: PageRequest,
    ) -> ServiceResult<Slice<SpaceListItem>> {
        let rows = self.db.search_my_spaces(
            member_id,
            filter.keyword.as_deref(),
            filter.category.map(|c| c.as_str()),
            page.probe_limit(),
            page.offset(),
        )?;
        self.compose_space_page(rows, page)
    }

    fn compose_space_page(
        &self,
        rows: Vec<SpaceRow>,
        page: PageRequest,
    ) -> ServiceResult<Slice<SpaceListItem>> {
        let slice = Slice::from_probed(rows, page);

        let owner_ids: Vec<MemberId> = slice
            .items
            .iter()
            .map(|row| row.owner_id)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let infos: HashMap<MemberId, MemberInfoRow> = self
            .db
            .member_infos(&owner_ids)?
            .into_iter()
            .map(|info| (info.id, info))
            .collect();

        Ok(slice.map(|row| {
            let owner_nickname = infos
                .get(&row.owner_id)
                .map(|info| info.nickname.clone())
                .unwrap_or_else(|| UNKNOWN_NICKNAME.to_string());
            SpaceListItem {
                space_id: row.id,
                name: row.name,
                description: row.description.unwrap_or_default(),
                category: parse_category(&row.category, row.id),
                is_visible: row.is_visible,
                view_count: row.view_count,
                scrap_count: row.scrap_count,
                favorite_count: row.favorite_count,
                image_path: row.image_path,
                owner_id: row.owner_id,
                owner_nickname,
            }
        }))
    }

    fn save_image(&self, upload: &ImageUpload) -> ServiceResult<String> {
        Ok(self.images.save(upload, SPACE_IMAGE_FOLDER)?.path)
    }
}

/// Visibility + membership rule: hidden spaces are reachable only by their
/// owner.
fn ensure_accessible(space: &SpaceRow, viewer: Option<MemberId>) -> ServiceResult<()> {
    if space.is_visible || viewer == Some(space.owner_id) {
        Ok(())
    } else {
        Err(ServiceError::unauthorized("space is not visible"))
    }
}

fn parse_category(raw: &str, space_id: SpaceId) -> Category {
    raw.parse().unwrap_or_else(|e| {
        warn!("Corrupt category on space {}: {}", space_id, e);
        Category::Etc
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::members::test_support::{StubImageStore, join_request, service as member_service};
    use std::time::Duration;

    fn space_service(db: Arc<Database>) -> SpaceService {
        SpaceService::new(
            db.clone(),
            Arc::new(StubImageStore),
            CounterReconciler::spawn(db),
        )
    }

    fn create_request(name: &str, category: Category, visible: bool) -> SpaceCreateRequest {
        SpaceCreateRequest {
            name: name.to_string(),
            description: Some("collected links".to_string()),
            category,
            is_visible: visible,
            image: None,
        }
    }

    async fn wait_until(deadline_ms: u64, mut check: impl FnMut() -> bool) -> bool {
        for _ in 0..(deadline_ms / 10) {
            if check() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        check()
    }

    #[tokio::test]
    async fn favorite_lands_once_then_duplicates() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let members = member_service(db.clone());
        let spaces = space_service(db.clone());

        let owner = members.join(join_request("soc-o", "owner")).unwrap().member_id;
        let fan = members.join(join_request("soc-f", "fan")).unwrap().member_id;
        let space = spaces
            .create_space(owner, create_request("s", Category::Etc, true))
            .unwrap();

        let created = spaces.create_favorite(space, fan).unwrap();
        assert_eq!(created.favorite_count, 1);

        let err = spaces.create_favorite(space, fan).unwrap_err();
        assert!(matches!(err, ServiceError::Duplicate(_)));
        assert_eq!(db.get_space(space).unwrap().unwrap().favorite_count, 1);
    }

    #[tokio::test]
    async fn favorite_respects_visibility_and_existence() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let members = member_service(db.clone());
        let spaces = space_service(db.clone());

        let owner = members.join(join_request("soc-o", "owner")).unwrap().member_id;
        let fan = members.join(join_request("soc-f", "fan")).unwrap().member_id;
        let hidden = spaces
            .create_space(owner, create_request("h", Category::Etc, false))
            .unwrap();

        assert!(matches!(
            spaces.create_favorite(9999, fan).unwrap_err(),
            ServiceError::NotFound(_)
        ));
        assert!(matches!(
            spaces.create_favorite(hidden, fan).unwrap_err(),
            ServiceError::Unauthorized(_)
        ));
        // The owner can still favorite their own hidden space
        spaces.create_favorite(hidden, owner).unwrap();
    }

    #[tokio::test]
    async fn remove_favorite_decrements_and_requires_edge() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let members = member_service(db.clone());
        let spaces = space_service(db.clone());

        let owner = members.join(join_request("soc-o", "owner")).unwrap().member_id;
        let fan = members.join(join_request("soc-f", "fan")).unwrap().member_id;
        let space = spaces
            .create_space(owner, create_request("s", Category::Etc, true))
            .unwrap();

        spaces.create_favorite(space, fan).unwrap();
        assert_eq!(spaces.remove_favorite(space, fan).unwrap(), 0);
        assert!(matches!(
            spaces.remove_favorite(space, fan).unwrap_err(),
            ServiceError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn public_listing_filters_and_enriches() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let members = member_service(db.clone());
        let spaces = space_service(db.clone());

        let owner = members.join(join_request("soc-o", "curator")).unwrap().member_id;
        spaces
            .create_space(owner, create_request("foo digest", Category::KnowledgeIssue, true))
            .unwrap();
        spaces
            .create_space(owner, create_request("foo recipes", Category::LifeKnowhow, true))
            .unwrap();
        spaces
            .create_space(owner, create_request("hidden foo", Category::KnowledgeIssue, false))
            .unwrap();

        let filter = SpaceQueryFilter {
            keyword: Some("foo".to_string()),
            category: Some(Category::KnowledgeIssue),
        };
        let page = spaces
            .find_public_spaces(&filter, PageRequest::new(0, 10))
            .unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].name, "foo digest");
        assert_eq!(page.items[0].owner_nickname, "curator");
    }

    #[tokio::test]
    async fn listing_pagination_and_placeholder_nickname() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let members = member_service(db.clone());
        let spaces = space_service(db.clone());

        let owner = members.join(join_request("soc-o", "curator")).unwrap().member_id;
        for i in 0..4 {
            spaces
                .create_space(owner, create_request(&format!("s{i}"), Category::Etc, true))
                .unwrap();
        }
        members.withdraw(owner).unwrap();

        let first = spaces
            .find_public_spaces(&SpaceQueryFilter::default(), PageRequest::new(0, 3))
            .unwrap();
        assert_eq!(first.items.len(), 3);
        assert!(first.has_next);
        // Every row still carries a non-null nickname
        assert!(first
            .items
            .iter()
            .all(|item| item.owner_nickname == UNKNOWN_NICKNAME));

        let second = spaces
            .find_public_spaces(&SpaceQueryFilter::default(), PageRequest::new(1, 3))
            .unwrap();
        assert_eq!(second.items.len(), 1);
        assert!(!second.has_next);
    }

    #[tokio::test]
    async fn my_spaces_include_hidden_ones() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let members = member_service(db.clone());
        let spaces = space_service(db.clone());

        let owner = members.join(join_request("soc-o", "curator")).unwrap().member_id;
        spaces
            .create_space(owner, create_request("mine hidden", Category::Etc, false))
            .unwrap();

        let mine = spaces
            .find_my_spaces(owner, &SpaceQueryFilter::default(), PageRequest::default())
            .unwrap();
        assert_eq!(mine.items.len(), 1);
        assert!(!mine.items[0].is_visible);
    }

    #[tokio::test]
    async fn get_space_enforces_visibility_and_counts_views() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let members = member_service(db.clone());
        let spaces = space_service(db.clone());

        let owner = members.join(join_request("soc-o", "owner")).unwrap().member_id;
        let stranger = members.join(join_request("soc-s", "s")).unwrap().member_id;
        let hidden = spaces
            .create_space(owner, create_request("h", Category::Etc, false))
            .unwrap();

        assert!(matches!(
            spaces.get_space(hidden, Some(stranger)).unwrap_err(),
            ServiceError::Unauthorized(_)
        ));
        assert!(matches!(
            spaces.get_space(hidden, None).unwrap_err(),
            ServiceError::Unauthorized(_)
        ));

        let detail = spaces.get_space(hidden, Some(owner)).unwrap();
        assert_eq!(detail.owner_nickname, "owner");

        let db2 = db.clone();
        let settled =
            wait_until(2_000, move || db2.get_space(hidden).unwrap().unwrap().view_count == 1)
                .await;
        assert!(settled, "view count never landed");
    }

    #[tokio::test]
    async fn scrap_event_lands() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let members = member_service(db.clone());
        let spaces = space_service(db.clone());

        let owner = members.join(join_request("soc-o", "owner")).unwrap().member_id;
        let space = spaces
            .create_space(owner, create_request("s", Category::Etc, true))
            .unwrap();

        spaces.mark_scrapped(space).unwrap();
        assert!(matches!(
            spaces.mark_scrapped(9999).unwrap_err(),
            ServiceError::NotFound(_)
        ));

        let db2 = db.clone();
        let settled =
            wait_until(2_000, move || db2.get_space(space).unwrap().unwrap().scrap_count == 1)
                .await;
        assert!(settled);
    }

    #[tokio::test]
    async fn update_space_is_owner_only() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let members = member_service(db.clone());
        let spaces = space_service(db.clone());

        let owner = members.join(join_request("soc-o", "owner")).unwrap().member_id;
        let other = members.join(join_request("soc-x", "other")).unwrap().member_id;
        let space = spaces
            .create_space(owner, create_request("s", Category::Etc, true))
            .unwrap();

        let update = SpaceUpdateRequest {
            name: "renamed".to_string(),
            description: None,
            category: Category::HobbyLeisure,
            is_visible: false,
        };
        assert!(matches!(
            spaces.update_space(space, other, update).unwrap_err(),
            ServiceError::Unauthorized(_)
        ));

        spaces
            .update_space(
                space,
                owner,
                SpaceUpdateRequest {
                    name: "renamed".to_string(),
                    description: None,
                    category: Category::HobbyLeisure,
                    is_visible: false,
                },
            )
            .unwrap();
        let row = db.get_space(space).unwrap().unwrap();
        assert_eq!(row.name, "renamed");
        assert!(!row.is_visible);
    }
}
