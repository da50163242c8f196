//! Identity & Session (component B): password verification, bearer-token
//! minting, and a distributed revocation set whose entries expire
//! automatically via store-side leases.

use std::time::Duration;

use chrono::Utc;
use gwctl_store::{GetPrefixOptions, PutOptions, StoreAdapter};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::AuthError;

const USER_PREFIX: &str = "users/";
const TOKEN_BLACKLIST_PREFIX: &str = "token_blacklist/";
const DEFAULT_TOKEN_TTL_SECS: i64 = 2 * 60 * 60;
const STORE_DEADLINE: Duration = Duration::from_secs(5);
const REVOCATION_LOOKUP_DEADLINE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Serialize, Deserialize)]
struct UserRecord {
    username: String,
    password_hash: String,
}

/// Claims embedded in every signed bearer token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: i64,
    pub iat: i64,
}

/// A minted bearer token and the identity it carries.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub username: String,
    pub expires_at: i64,
}

/// Identity & Session service: owns the user store and the token revocation
/// set. Holds the signing secret in memory only.
pub struct AuthService<S: StoreAdapter> {
    store: std::sync::Arc<S>,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    token_ttl_secs: i64,
}

impl<S: StoreAdapter> AuthService<S> {
    pub fn new(store: std::sync::Arc<S>, secret: &[u8]) -> Self {
        Self {
            store,
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            token_ttl_secs: DEFAULT_TOKEN_TTL_SECS,
        }
    }

    /// Create a user with a bcrypt-hashed password. Fails if one already
    /// exists.
    pub async fn register(&self, username: &str, password: &str) -> Result<(), AuthError> {
        let key = format!("{USER_PREFIX}{username}");
        if self.store.get(&key, STORE_DEADLINE).await?.is_some() {
            return Err(AuthError::UserExists { username: username.to_string() });
        }
        let password_hash =
            bcrypt::hash(password, bcrypt::DEFAULT_COST).map_err(|e| AuthError::Hashing(e.to_string()))?;
        let record = UserRecord { username: username.to_string(), password_hash };
        let value = serde_json::to_vec(&record).map_err(|e| AuthError::Hashing(e.to_string()))?;
        self.store.put(&key, &value, PutOptions::default(), STORE_DEADLINE).await?;
        info!(username, "user registered");
        Ok(())
    }

    /// Remove a user record. Idempotent from the caller's point of view —
    /// the registry treats a missing user as `UserNotFound` only when the
    /// caller asked to inspect it first, not on delete.
    pub async fn delete_user(&self, username: &str) -> Result<(), AuthError> {
        let key = format!("{USER_PREFIX}{username}");
        self.store.delete(&key, STORE_DEADLINE).await?;
        Ok(())
    }

    /// Usernames under `users/`, for REST listing.
    pub async fn list_users(&self) -> Result<Vec<String>, AuthError> {
        let kvs = self.store.get_prefix(USER_PREFIX, GetPrefixOptions::default(), STORE_DEADLINE).await?;
        Ok(kvs.into_iter().filter_map(|kv| kv.key.strip_prefix(USER_PREFIX).map(str::to_owned)).collect())
    }

    pub async fn get_user(&self, username: &str) -> Result<(), AuthError> {
        let key = format!("{USER_PREFIX}{username}");
        match self.store.get(&key, STORE_DEADLINE).await? {
            Some(_) => Ok(()),
            None => Err(AuthError::UserNotFound { username: username.to_string() }),
        }
    }

    /// Verify credentials and mint a bearer token valid for
    /// [`DEFAULT_TOKEN_TTL_SECS`].
    pub async fn login(&self, username: &str, password: &str) -> Result<IssuedToken, AuthError> {
        let key = format!("{USER_PREFIX}{username}");
        let raw = self.store.get(&key, STORE_DEADLINE).await?.ok_or(AuthError::InvalidCredentials)?;
        let record: UserRecord = serde_json::from_slice(&raw).map_err(|_| AuthError::InvalidCredentials)?;
        let matches = bcrypt::verify(password, &record.password_hash).unwrap_or(false);
        if !matches {
            return Err(AuthError::InvalidCredentials);
        }

        let now = Utc::now().timestamp();
        let exp = now + self.token_ttl_secs;
        let claims = Claims { sub: username.to_string(), exp, iat: now };
        let token = jsonwebtoken::encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AuthError::InvalidToken { reason: e.to_string() })?;
        Ok(IssuedToken { token, username: username.to_string(), expires_at: exp })
    }

    /// Revoke `token`: writes it into the revocation set with a lease
    /// matching its remaining lifetime, so the entry self-expires the
    /// instant the token would have anyway.
    pub async fn logout(&self, token: &str) -> Result<(), AuthError> {
        let claims = self.decode(token)?;
        let now = Utc::now().timestamp();
        let remaining = (claims.exp - now).max(1);
        let lease_id = self.store.grant_lease(remaining, STORE_DEADLINE).await?;
        let key = format!("{TOKEN_BLACKLIST_PREFIX}{token}");
        self.store
            .put(&key, b"1", PutOptions { lease_id: Some(lease_id) }, STORE_DEADLINE)
            .await?;
        Ok(())
    }

    /// Full auth-middleware pipeline: signature+expiry, then revocation
    /// lookup. Store errors during the revocation check are never silently
    /// swallowed — they fail closed.
    pub async fn authenticate(&self, token: &str) -> Result<Claims, AuthError> {
        let claims = self.decode(token)?;
        let key = format!("{TOKEN_BLACKLIST_PREFIX}{token}");
        match self.store.get(&key, REVOCATION_LOOKUP_DEADLINE).await {
            Ok(Some(_)) => Err(AuthError::Revoked),
            Ok(None) => Ok(claims),
            Err(e) => {
                warn!(error = %e, "revocation lookup failed, failing closed");
                Err(AuthError::Store(e))
            }
        }
    }

    fn decode(&self, token: &str) -> Result<Claims, AuthError> {
        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &Validation::default())
            .map_err(|e| AuthError::InvalidToken { reason: e.to_string() })?;
        Ok(data.claims)
    }
}

/// Produce a random 32-byte base64 secret for when `JWT_SECRET` is unset.
pub fn generate_secret() -> String {
    use rand::RngCore;
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    base64::Engine::encode(&base64::engine::general_purpose::STANDARD, bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gwctl_store::MemoryStore;

    fn service() -> AuthService<MemoryStore> {
        AuthService::new(std::sync::Arc::new(MemoryStore::new()), b"test-secret-value-1234567890")
    }

    #[tokio::test]
    async fn register_then_login_succeeds() {
        let auth = service();
        auth.register("alice", "hunter2").await.unwrap();
        let issued = auth.login("alice", "hunter2").await.unwrap();
        assert_eq!(issued.username, "alice");
        let claims = auth.authenticate(&issued.token).await.unwrap();
        assert_eq!(claims.sub, "alice");
    }

    #[tokio::test]
    async fn login_with_wrong_password_fails() {
        let auth = service();
        auth.register("alice", "hunter2").await.unwrap();
        let err = auth.login("alice", "wrong").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn double_register_conflicts() {
        let auth = service();
        auth.register("alice", "hunter2").await.unwrap();
        let err = auth.register("alice", "hunter3").await.unwrap_err();
        assert!(matches!(err, AuthError::UserExists { .. }));
    }

    #[tokio::test]
    async fn logout_revokes_token() {
        let auth = service();
        auth.register("alice", "hunter2").await.unwrap();
        let issued = auth.login("alice", "hunter2").await.unwrap();
        auth.logout(&issued.token).await.unwrap();
        let err = auth.authenticate(&issued.token).await.unwrap_err();
        assert!(matches!(err, AuthError::Revoked));
    }

    #[tokio::test]
    async fn list_users_returns_registered_usernames() {
        let auth = service();
        auth.register("alice", "hunter2").await.unwrap();
        auth.register("bob", "hunter3").await.unwrap();
        let mut users = auth.list_users().await.unwrap();
        users.sort();
        assert_eq!(users, vec!["alice".to_string(), "bob".to_string()]);
    }

    #[tokio::test]
    async fn malformed_token_rejected() {
        let auth = service();
        let err = auth.authenticate("not-a-jwt").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken { .. }));
    }
}
