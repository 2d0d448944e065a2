use std::collections::HashMap;
use std::sync::Arc;

use anyhow::anyhow;
use tracing::info;

use linkhub_db::models::MemberInfoRow;
use linkhub_db::{Database, is_unique_violation, members as db};
use linkhub_types::MemberId;
use linkhub_types::api::{
    ImageInfo, ImageUpload, JoinRequest, JoinResponse, LoginResponse, MemberListItem,
    MemberProfileResponse, UNKNOWN_NICKNAME,
};
use linkhub_types::error::{ServiceError, ServiceResult};
use linkhub_types::models::{Provider, Role};
use linkhub_types::page::{PageRequest, Slice};

use crate::auth::TokenIssuer;
use crate::collaborators::{
    EmailSender, ImageStore, VerificationCodeStore, generate_verification_code,
};

const MEMBER_IMAGE_FOLDER: &str = "member-image/";
const MAX_IMAGE_PATH_LEN: usize = 2083;
const MAX_IMAGE_NAME_LEN: usize = 255;

pub struct MemberService {
    db: Arc<Database>,
    tokens: Arc<dyn TokenIssuer>,
    images: Arc<dyn ImageStore>,
    email: Arc<dyn EmailSender>,
    codes: Arc<VerificationCodeStore>,
    default_image: ImageInfo,
}

impl MemberService {
    pub fn new(
        db: Arc<Database>,
        tokens: Arc<dyn TokenIssuer>,
        images: Arc<dyn ImageStore>,
        email: Arc<dyn EmailSender>,
        codes: Arc<VerificationCodeStore>,
        default_image: ImageInfo,
    ) -> Self {
        Self {
            db,
            tokens,
            images,
            email,
            codes,
            default_image,
        }
    }

    // -- Registration / login --

    /// First social login creates the member. A second join with the same
    /// `(social_id, provider)` pair is a re-registration attempt.
    pub fn join(&self, req: JoinRequest) -> ServiceResult<JoinResponse> {
        if self
            .db
            .find_member_by_social(&req.social_id, req.provider.as_str())?
            .is_some()
        {
            return Err(ServiceError::unauthorized("member already joined"));
        }

        let image = self.stored_or_default_image(req.image.as_ref())?;

        let member_id = self
            .db
            .insert_member(&db::NewMember {
                social_id: &req.social_id,
                provider: req.provider.as_str(),
                role: Role::User.as_str(),
                nickname: &req.nickname,
                about_me: req.about_me.as_deref(),
                news_email: &req.news_email,
                is_subscribed: req.is_subscribed,
                favorite_category: req.favorite_category.map(|c| c.as_str()),
                image_path: &image.path,
                image_name: &image.name,
            })
            .map_err(|e| {
                // Lost a join race: the schema backstop caught the duplicate
                if is_unique_violation(&e) {
                    ServiceError::unauthorized("member already joined")
                } else {
                    ServiceError::Storage(e)
                }
            })?;

        let token = self.tokens.issue(member_id, Role::User)?;
        info!("Member {} joined via {}", member_id, req.provider.as_str());

        Ok(JoinResponse { member_id, token })
    }

    pub fn login(&self, social_id: &str, provider: Provider) -> ServiceResult<LoginResponse> {
        let member = self
            .db
            .find_member_by_social(social_id, provider.as_str())?
            .ok_or_else(|| ServiceError::not_found("member for social login"))?;

        let role = member.role.parse::<Role>().unwrap_or(Role::User);
        let token = self.tokens.issue(member.id, role)?;

        Ok(LoginResponse {
            member_id: member.id,
            nickname: member.nickname,
            token,
        })
    }

    /// Soft delete: the member disappears from every lookup; content they
    /// owned keeps listing with the placeholder nickname.
    pub fn withdraw(&self, member_id: MemberId) -> ServiceResult<()> {
        if !self.db.soft_delete_member(member_id)? {
            return Err(ServiceError::not_found("member"));
        }
        info!("Member {} withdrew", member_id);
        Ok(())
    }

    // -- Email verification --

    pub fn send_verification_email(&self, email: &str) -> ServiceResult<()> {
        let code = generate_verification_code();
        self.email.send_verification_code(email, &code)?;
        self.codes.put(&code, email);
        Ok(())
    }

    /// True iff the code is live and was issued for this email. A miss is a
    /// plain `false`, never an error.
    pub fn verify_email(&self, email: &str, code: &str) -> bool {
        self.codes.get(code).is_some_and(|stored| stored == email)
    }

    // -- Profile --

    pub fn profile(
        &self,
        member_id: MemberId,
        viewer: Option<MemberId>,
    ) -> ServiceResult<MemberProfileResponse> {
        let member = self
            .db
            .get_member(member_id)?
            .ok_or_else(|| ServiceError::not_found("member"))?;

        let image_path = self
            .db
            .member_infos(&[member_id])?
            .pop()
            .and_then(|info| info.image_path);
        let follower_count = self.db.follower_count(member_id)?;
        let following_count = self.db.following_count(member_id)?;
        let is_followed_by_viewer = match viewer {
            Some(viewer) if viewer != member_id => self.db.is_following(viewer, member_id)?,
            _ => false,
        };

        Ok(MemberProfileResponse {
            member_id: member.id,
            nickname: member.nickname,
            about_me: member.about_me,
            image_path,
            favorite_category: member.favorite_category.and_then(|c| c.parse().ok()),
            follower_count,
            following_count,
            is_followed_by_viewer,
        })
    }

    pub fn change_profile_image(
        &self,
        member_id: MemberId,
        upload: ImageUpload,
    ) -> ServiceResult<ImageInfo> {
        self.db
            .get_member(member_id)?
            .ok_or_else(|| ServiceError::not_found("member"))?;

        let image = self.stored_or_default_image(Some(&upload))?;
        self.db
            .set_profile_image(member_id, &image.path, &image.name)?;
        Ok(image)
    }

    // -- Follow registrar --

    /// Create a follow edge exactly once per (follower, followee) pair.
    /// Existence check and insert share one transaction; the UNIQUE
    /// constraint backstops concurrent identical requests.
    pub fn create_follow(
        &self,
        follower_id: MemberId,
        followee_id: MemberId,
    ) -> ServiceResult<i64> {
        if follower_id == followee_id {
            return Err(ServiceError::unauthorized("cannot follow yourself"));
        }

        let outcome = self.db.with_tx(|tx| {
            if !db::member_exists(tx, followee_id)? {
                return Ok(Err(ServiceError::not_found("followee member")));
            }
            if db::follow_exists(tx, follower_id, followee_id)? {
                return Ok(Err(ServiceError::duplicate("follow")));
            }
            match db::insert_follow(tx, follower_id, followee_id) {
                Ok(id) => Ok(Ok(id)),
                Err(e) if is_unique_violation(&e) => Ok(Err(ServiceError::duplicate("follow"))),
                Err(e) => Err(e),
            }
        })??;

        Ok(outcome)
    }

    pub fn remove_follow(&self, follower_id: MemberId, followee_id: MemberId) -> ServiceResult<()> {
        self.db.with_tx(|tx| {
            if db::delete_follow(tx, follower_id, followee_id)? == 0 {
                return Ok(Err(ServiceError::not_found("follow")));
            }
            Ok(Ok(()))
        })??;
        Ok(())
    }

    /// Page of members following `member_id`, enriched with nickname and
    /// image in one batch query.
    pub fn followers(
        &self,
        member_id: MemberId,
        page: PageRequest,
    ) -> ServiceResult<Slice<MemberListItem>> {
        self.db
            .get_member(member_id)?
            .ok_or_else(|| ServiceError::not_found("member"))?;

        let ids = self
            .db
            .follower_ids_page(member_id, page.probe_limit(), page.offset())?;
        self.enrich_member_page(ids, page)
    }

    /// Page of members that `member_id` follows.
    pub fn followings(
        &self,
        member_id: MemberId,
        page: PageRequest,
    ) -> ServiceResult<Slice<MemberListItem>> {
        self.db
            .get_member(member_id)?
            .ok_or_else(|| ServiceError::not_found("member"))?;

        let ids = self
            .db
            .following_ids_page(member_id, page.probe_limit(), page.offset())?;
        self.enrich_member_page(ids, page)
    }

    /// Zip a page of member ids with its batch enrichment, preserving the
    /// page order. A missing enrichment resolves to the placeholder.
    fn enrich_member_page(
        &self,
        ids: Vec<MemberId>,
        page: PageRequest,
    ) -> ServiceResult<Slice<MemberListItem>> {
        let slice = Slice::from_probed(ids, page);
        let infos: HashMap<MemberId, MemberInfoRow> = self
            .db
            .member_infos(&slice.items)?
            .into_iter()
            .map(|info| (info.id, info))
            .collect();

        Ok(slice.map(|id| match infos.get(&id) {
            Some(info) => MemberListItem {
                member_id: id,
                nickname: info.nickname.clone(),
                image_path: info.image_path.clone(),
            },
            None => MemberListItem {
                member_id: id,
                nickname: UNKNOWN_NICKNAME.to_string(),
                image_path: None,
            },
        }))
    }

    fn stored_or_default_image(&self, upload: Option<&ImageUpload>) -> ServiceResult<ImageInfo> {
        let image = match upload {
            Some(upload) => self.images.save(upload, MEMBER_IMAGE_FOLDER)?,
            None => self.default_image.clone(),
        };
        if image.path.len() > MAX_IMAGE_PATH_LEN {
            return Err(ServiceError::Storage(anyhow!(
                "image path exceeds {} chars",
                MAX_IMAGE_PATH_LEN
            )));
        }
        if image.name.len() > MAX_IMAGE_NAME_LEN {
            return Err(ServiceError::Storage(anyhow!(
                "image name exceeds {} chars",
                MAX_IMAGE_NAME_LEN
            )));
        }
        Ok(image)
    }
}
