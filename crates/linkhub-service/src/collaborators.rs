use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use anyhow::Result;
use rand::Rng;
use tracing::info;

use linkhub_types::api::{ImageInfo, ImageUpload};

/// Object-storage uploader seam: stores a file payload under a folder prefix
/// and returns the stored object's path and display name.
pub trait ImageStore: Send + Sync {
    fn save(&self, upload: &ImageUpload, folder: &str) -> Result<ImageInfo>;
}

/// Transactional email sender seam.
pub trait EmailSender: Send + Sync {
    fn send_verification_code(&self, to: &str, code: &str) -> Result<()>;
}

/// Dev/test sender that only logs the would-be delivery.
pub struct LogEmailSender;

impl EmailSender for LogEmailSender {
    fn send_verification_code(&self, to: &str, code: &str) -> Result<()> {
        info!("Verification email to {}: code {}", to, code);
        Ok(())
    }
}

/// Six-digit verification code, zero-padded.
pub fn generate_verification_code() -> String {
    format!("{:06}", rand::rng().random_range(0..1_000_000u32))
}

pub const VERIFICATION_CODE_TTL: Duration = Duration::from_secs(3 * 60);

/// Ephemeral code → email store with a fixed expiry, standing in for the
/// external cache collaborator. Expired entries are dropped on access.
pub struct VerificationCodeStore {
    entries: Mutex<HashMap<String, (String, Instant)>>,
    ttl: Duration,
}

impl VerificationCodeStore {
    pub fn new() -> Self {
        Self::with_ttl(VERIFICATION_CODE_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    pub fn put(&self, code: &str, email: &str) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.retain(|_, (_, stored_at)| stored_at.elapsed() < self.ttl);
        entries.insert(code.to_string(), (email.to_string(), Instant::now()));
    }

    /// The email the code was issued for, if the entry is still live.
    pub fn get(&self, code: &str) -> Option<String> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        match entries.get(code) {
            Some((email, stored_at)) if stored_at.elapsed() < self.ttl => Some(email.clone()),
            Some(_) => {
                entries.remove(code);
                None
            }
            None => None,
        }
    }
}

impl Default for VerificationCodeStore {
    fn default() -> Self {
        Self::new()
    }
}
