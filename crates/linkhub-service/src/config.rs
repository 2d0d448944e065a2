use std::path::Path;
use std::sync::Arc;

use anyhow::Result;

use linkhub_db::Database;
use linkhub_types::api::ImageInfo;

use crate::auth::{JwtTokenIssuer, TokenIssuer};
use crate::collaborators::{EmailSender, ImageStore, VerificationCodeStore};
use crate::links::LinkService;
use crate::members::MemberService;
use crate::reconciler::CounterReconciler;
use crate::spaces::SpaceService;

/// Service configuration, read from the environment (with `.env` support).
#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: String,
    pub jwt_secret: String,
    pub token_ttl_days: i64,
    pub default_profile_image_path: String,
    pub default_profile_image_name: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        // Load .env if present
        let _ = dotenvy::dotenv();

        let db_path = std::env::var("LINKHUB_DB_PATH").unwrap_or_else(|_| "linkhub.db".into());
        let jwt_secret =
            std::env::var("LINKHUB_JWT_SECRET").unwrap_or_else(|_| "dev-secret-change-me".into());
        let token_ttl_days: i64 = std::env::var("LINKHUB_TOKEN_TTL_DAYS")
            .unwrap_or_else(|_| "30".into())
            .parse()?;
        let default_profile_image_path = std::env::var("LINKHUB_DEFAULT_PROFILE_IMAGE_PATH")
            .unwrap_or_else(|_| "https://cdn.linkhub.example/member-image/member-default.png".into());
        let default_profile_image_name = std::env::var("LINKHUB_DEFAULT_PROFILE_IMAGE_NAME")
            .unwrap_or_else(|_| "default-image".into());

        Ok(Self {
            db_path,
            jwt_secret,
            token_ttl_days,
            default_profile_image_path,
            default_profile_image_name,
        })
    }
}

impl Config {
    pub fn open_database(&self) -> Result<Database> {
        Database::open(Path::new(&self.db_path))
    }

    /// Wire the full service set from this configuration. The image store and
    /// email sender remain caller-supplied; everything else comes from here.
    /// Must run inside a tokio runtime (the reconciler task spawns on it).
    pub fn services(
        &self,
        db: Arc<Database>,
        images: Arc<dyn ImageStore>,
        email: Arc<dyn EmailSender>,
    ) -> Services {
        let tokens: Arc<dyn TokenIssuer> = Arc::new(JwtTokenIssuer::new(
            self.jwt_secret.clone(),
            self.token_ttl_days,
        ));
        let counters = CounterReconciler::spawn(db.clone());
        let default_image = ImageInfo {
            path: self.default_profile_image_path.clone(),
            name: self.default_profile_image_name.clone(),
        };

        Services {
            members: MemberService::new(
                db.clone(),
                tokens,
                images.clone(),
                email,
                Arc::new(VerificationCodeStore::new()),
                default_image,
            ),
            spaces: SpaceService::new(db.clone(), images, counters.clone()),
            links: LinkService::new(db, counters),
        }
    }
}

/// The wired service set, sharing one database and one reconciler.
pub struct Services {
    pub members: MemberService,
    pub spaces: SpaceService,
    pub links: LinkService,
}
