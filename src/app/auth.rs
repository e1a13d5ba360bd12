use anyhow::{anyhow, Result};
use pasetors::claims::{Claims, ClaimsValidationRules};
use pasetors::keys::SymmetricKey;
use pasetors::token::UntrustedToken;
use pasetors::{local, version4::V4, Local};
use rand::RngCore;
use sha2::{Digest, Sha256};
use sqlx::Row;
use time::{Duration, OffsetDateTime};

use crate::app::users::UserService;
use crate::config::MAX_SESSION_TTL_HOURS;
use crate::domain::user::{UpsertUser, User};
use crate::infra::db::Db;

const IDENTITY_ISSUER: &str = "snapline";
const IDENTITY_AUDIENCE: &str = "snapline";
const SESSION_ID_BYTES: usize = 32;

#[derive(Debug, Clone)]
pub struct AuthSession {
    pub user_id: String,
}

/// A freshly created session. `sid` is the raw cookie value; only its hash
/// is stored.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub sid: String,
    pub expires_at: OffsetDateTime,
}

#[derive(Clone)]
pub struct SessionService {
    db: Db,
    identity_key: [u8; 32],
    ttl_hours: u64,
}

impl SessionService {
    pub fn new(db: Db, identity_key: [u8; 32], ttl_hours: u64) -> Self {
        Self {
            db,
            identity_key,
            ttl_hours,
        }
    }

    pub fn verify_identity_token(&self, token: &str) -> Result<Option<UpsertUser>> {
        verify_identity_token(&self.identity_key, token)
    }

    /// Callback flow: verify the token, upsert the user it names and open a
    /// session for them.
    pub async fn login_with_identity_token(
        &self,
        token: &str,
    ) -> Result<Option<(User, IssuedSession)>> {
        let identity = match self.verify_identity_token(token)? {
            Some(identity) => identity,
            None => return Ok(None),
        };

        let user = UserService::new(self.db.clone())
            .upsert_user(&identity)
            .await?;
        let session = self.create_session(&user.id).await?;

        Ok(Some((user, session)))
    }

    pub async fn create_session(&self, user_id: &str) -> Result<IssuedSession> {
        let mut raw = [0u8; SESSION_ID_BYTES];
        rand::thread_rng().fill_bytes(&mut raw);
        let sid = hex::encode(raw);
        let ttl_hours = self.ttl_hours.min(MAX_SESSION_TTL_HOURS) as i64;
        let expires_at = OffsetDateTime::now_utc() + Duration::hours(ttl_hours);

        sqlx::query("INSERT INTO sessions (sid, sess, expire) VALUES ($1, $2, $3)")
            .bind(hash_sid(&sid))
            .bind(serde_json::json!({ "userId": user_id }))
            .bind(expires_at)
            .execute(self.db.pool())
            .await?;

        Ok(IssuedSession { sid, expires_at })
    }

    pub async fn authenticate(&self, sid: &str) -> Result<Option<AuthSession>> {
        let row = sqlx::query(
            "SELECT sess->>'userId' AS user_id \
             FROM sessions \
             WHERE sid = $1 AND expire > now()",
        )
        .bind(hash_sid(sid))
        .fetch_optional(self.db.pool())
        .await?;

        let user_id: Option<String> = match row {
            Some(row) => row.try_get("user_id")?,
            None => None,
        };

        Ok(user_id.map(|user_id| AuthSession { user_id }))
    }

    pub async fn destroy(&self, sid: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM sessions WHERE sid = $1")
            .bind(hash_sid(sid))
            .execute(self.db.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn prune_expired(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE expire <= now()")
            .execute(self.db.pool())
            .await?;

        Ok(result.rows_affected())
    }
}

/// Decrypts an identity token into the user fields it asserts. Any token
/// that fails decryption or claim validation yields `None`.
pub fn verify_identity_token(identity_key: &[u8; 32], token: &str) -> Result<Option<UpsertUser>> {
    let key = SymmetricKey::<V4>::from(identity_key)?;
    let mut rules = ClaimsValidationRules::new();
    rules.validate_issuer_with(IDENTITY_ISSUER);
    rules.validate_audience_with(IDENTITY_AUDIENCE);

    let untrusted = match UntrustedToken::<Local, V4>::try_from(token) {
        Ok(token) => token,
        Err(_) => return Ok(None),
    };
    let trusted = match local::decrypt(&key, &untrusted, &rules, None, None) {
        Ok(token) => token,
        Err(_) => return Ok(None),
    };
    let claims = match trusted.payload_claims() {
        Some(claims) => claims,
        None => return Ok(None),
    };

    let id = match claim_str(claims, "sub") {
        Some(sub) if !sub.is_empty() => sub,
        _ => return Ok(None),
    };

    Ok(Some(UpsertUser {
        id,
        username: claim_str(claims, "username"),
        email: claim_str(claims, "email"),
        first_name: claim_str(claims, "first_name"),
        last_name: claim_str(claims, "last_name"),
        profile_image_url: claim_str(claims, "profile_image_url"),
    }))
}

/// Builds an identity token the callback accepts. Used by the login provider
/// side and by tests.
pub fn issue_identity_token(
    identity_key: &[u8; 32],
    identity: &UpsertUser,
    valid_for: std::time::Duration,
) -> Result<String> {
    let key = SymmetricKey::<V4>::from(identity_key)?;
    let mut claims = Claims::new_expires_in(&valid_for)?;
    claims.issuer(IDENTITY_ISSUER)?;
    claims.audience(IDENTITY_AUDIENCE)?;
    claims.subject(&identity.id)?;

    let optional = [
        ("username", &identity.username),
        ("email", &identity.email),
        ("first_name", &identity.first_name),
        ("last_name", &identity.last_name),
        ("profile_image_url", &identity.profile_image_url),
    ];
    for (name, value) in optional {
        if let Some(value) = value {
            claims
                .add_additional(name, value.as_str())
                .map_err(|err| anyhow!("invalid {} claim: {}", name, err))?;
        }
    }

    Ok(local::encrypt(&key, &claims, None, None)?)
}

fn hash_sid(sid: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(sid.as_bytes());
    hex::encode(hasher.finalize())
}

fn claim_str(claims: &Claims, name: &str) -> Option<String> {
    claims
        .get_claim(name)
        .and_then(|value| value.as_str())
        .map(str::to_string)
}
