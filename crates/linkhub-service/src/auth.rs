use anyhow::Result;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use linkhub_types::MemberId;
use linkhub_types::models::Role;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: MemberId,
    pub role: Role,
    pub exp: usize,
}

/// Identity/token issuer seam: given a member's durable identity, returns a
/// signed bearer token; given a token, returns the caller's claims.
pub trait TokenIssuer: Send + Sync {
    fn issue(&self, member_id: MemberId, role: Role) -> Result<String>;
    fn verify(&self, token: &str) -> Result<Claims>;
}

/// HS256 JWT issuer.
pub struct JwtTokenIssuer {
    secret: String,
    ttl_days: i64,
}

impl JwtTokenIssuer {
    pub fn new(secret: impl Into<String>, ttl_days: i64) -> Self {
        Self {
            secret: secret.into(),
            ttl_days,
        }
    }
}

impl TokenIssuer for JwtTokenIssuer {
    fn issue(&self, member_id: MemberId, role: Role) -> Result<String> {
        let claims = Claims {
            sub: member_id,
            role,
            exp: (chrono::Utc::now() + chrono::Duration::days(self.ttl_days)).timestamp() as usize,
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )?;

        Ok(token)
    }

    fn verify(&self, token: &str) -> Result<Claims> {
        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issue_verify_roundtrip() {
        let issuer = JwtTokenIssuer::new("test-secret", 30);
        let token = issuer.issue(42, Role::User).unwrap();

        let claims = issuer.verify(&token).unwrap();
        assert_eq!(claims.sub, 42);
        assert_eq!(claims.role, Role::User);
    }

    #[test]
    fn wrong_secret_fails() {
        let issuer = JwtTokenIssuer::new("secret-a", 30);
        let token = issuer.issue(1, Role::User).unwrap();

        let other = JwtTokenIssuer::new("secret-b", 30);
        assert!(other.verify(&token).is_err());
    }
}
