use std::collections::HashSet;
use std::sync::Arc;

use linkhub_db::{Database, is_unique_violation, links as db};
use linkhub_types::api::{LinkCreateRequest, LinkListItem, LinkUpdateRequest};
use linkhub_types::error::{ServiceError, ServiceResult};
use linkhub_types::events::CounterEvent;
use linkhub_types::models::TagColor;
use linkhub_types::page::{PageRequest, Slice};
use linkhub_types::{LinkId, MemberId, SpaceId};

use crate::reconciler::CounterReconciler;

pub struct LinkService {
    db: Arc<Database>,
    counters: CounterReconciler,
}

impl LinkService {
    pub fn new(db: Arc<Database>, counters: CounterReconciler) -> Self {
        Self { db, counters }
    }

    // -- CRUD --

    pub fn create_link(
        &self,
        space_id: SpaceId,
        member_id: MemberId,
        req: LinkCreateRequest,
    ) -> ServiceResult<LinkId> {
        self.ensure_space_editable(space_id, member_id)?;
        let tag = parse_tag(req.tag_name.as_deref(), req.tag_color.as_deref())?;

        let link_id = self.db.insert_link(&db::NewLink {
            space_id,
            url: &req.url,
            title: &req.title,
            tag_name: tag.map(|(name, _)| name),
            tag_color: tag.map(|(_, color)| color.as_str()),
        })?;
        Ok(link_id)
    }

    pub fn update_link(
        &self,
        link_id: LinkId,
        member_id: MemberId,
        req: LinkUpdateRequest,
    ) -> ServiceResult<()> {
        let link = self
            .db
            .get_link(link_id)?
            .ok_or_else(|| ServiceError::not_found("link"))?;
        self.ensure_space_editable(link.space_id, member_id)?;

        // The tag moves only when both halves were supplied
        let tag = match req.tag_update() {
            Some((name, color)) => {
                let color = parse_color(color)?;
                Some((name, color.as_str()))
            }
            None => None,
        };

        self.db.update_link(link_id, &req.url, &req.title, tag)?;
        Ok(())
    }

    // -- Query composer --

    /// Page of a space's links, enriched with whether the viewer liked each
    /// one — a single batch query over the page's link-id set.
    pub fn find_links(
        &self,
        space_id: SpaceId,
        viewer: Option<MemberId>,
        page: PageRequest,
    ) -> ServiceResult<Slice<LinkListItem>> {
        let space = self
            .db
            .get_space(space_id)?
            .ok_or_else(|| ServiceError::not_found("space"))?;
        if !space.is_visible && viewer != Some(space.owner_id) {
            return Err(ServiceError::unauthorized("space is not visible"));
        }

        let rows = self
            .db
            .links_page(space_id, page.probe_limit(), page.offset())?;
        let slice = Slice::from_probed(rows, page);

        let liked: HashSet<LinkId> = match viewer {
            Some(viewer) => {
                let ids: Vec<LinkId> = slice.items.iter().map(|row| row.id).collect();
                self.db.liked_link_ids(viewer, &ids)?.into_iter().collect()
            }
            None => HashSet::new(),
        };

        Ok(slice.map(|row| LinkListItem {
            link_id: row.id,
            url: row.url,
            title: row.title,
            tag_name: row.tag_name,
            tag_color: row.tag_color.and_then(|c| c.parse().ok()),
            like_count: row.like_count,
            liked_by_viewer: liked.contains(&row.id),
        }))
    }

    // -- Likes --

    /// Record the like edge synchronously, then hand the counter bump to the
    /// reconciler. The request returns before the counter lands.
    pub fn like_link(&self, link_id: LinkId, member_id: MemberId) -> ServiceResult<()> {
        self.db.with_tx(|tx| {
            if !db::link_exists(tx, link_id)? {
                return Ok(Err(ServiceError::not_found("link")));
            }
            if db::like_exists(tx, member_id, link_id)? {
                return Ok(Err(ServiceError::duplicate("link like")));
            }
            match db::insert_like(tx, member_id, link_id) {
                Ok(_) => Ok(Ok(())),
                Err(e) if is_unique_violation(&e) => Ok(Err(ServiceError::duplicate("link like"))),
                Err(e) => Err(e),
            }
        })??;

        self.counters
            .publish(CounterEvent::LinkLike { link_id, delta: 1 });
        Ok(())
    }

    pub fn unlike_link(&self, link_id: LinkId, member_id: MemberId) -> ServiceResult<()> {
        self.db.with_tx(|tx| {
            if db::delete_like(tx, member_id, link_id)? == 0 {
                return Ok(Err(ServiceError::not_found("link like")));
            }
            Ok(Ok(()))
        })??;

        self.counters
            .publish(CounterEvent::LinkLike { link_id, delta: -1 });
        Ok(())
    }

    fn ensure_space_editable(&self, space_id: SpaceId, member_id: MemberId) -> ServiceResult<()> {
        let space = self
            .db
            .get_space(space_id)?
            .ok_or_else(|| ServiceError::not_found("space"))?;
        if space.owner_id != member_id {
            return Err(ServiceError::unauthorized(
                "only the owner may edit the space's links",
            ));
        }
        Ok(())
    }
}

fn parse_tag<'a>(
    tag_name: Option<&'a str>,
    tag_color: Option<&str>,
) -> ServiceResult<Option<(&'a str, TagColor)>> {
    match (tag_name, tag_color) {
        (None, None) => Ok(None),
        (Some(name), Some(color)) => Ok(Some((name, parse_color(color)?))),
        _ => Err(ServiceError::unauthorized(
            "tag name and color must be set together",
        )),
    }
}

fn parse_color(color: &str) -> ServiceResult<TagColor> {
    color
        .parse()
        .map_err(|e| ServiceError::unauthorized(format!("{}", e)))
}
