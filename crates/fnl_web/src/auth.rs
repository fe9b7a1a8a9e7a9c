//! Password hashing and signed session tokens.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::{AUTHORIZATION, COOKIE};
use axum::http::request::Parts;
use axum::http::HeaderMap;
use fnl_core::Account;
use hmac::{Hmac, Mac};
use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::ApiError;
use crate::AppState;

pub const DEFAULT_ITERATIONS: u32 = 600_000;
pub const SESSION_COOKIE: &str = "fnl_session";
pub const SESSION_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

const SCHEME: &str = "pbkdf2-sha256";
const SALT_LENGTH: usize = 16;
const HASH_LENGTH: usize = 32;

type HmacSha256 = Hmac<Sha256>;

/// Salted PBKDF2-HMAC-SHA256. Hashes are stored as
/// `pbkdf2-sha256$<iterations>$<salt hex>$<hash hex>`, so the work factor can
/// change without invalidating existing accounts.
#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    iterations: u32,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
        }
    }
}

fn derive(password: &str, salt: &[u8], iterations: u32) -> [u8; HASH_LENGTH] {
    let mut hash = [0u8; HASH_LENGTH];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations, &mut hash);
    hash
}

impl PasswordHasher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_iterations(iterations: u32) -> Self {
        Self {
            iterations: iterations.max(1),
        }
    }

    pub fn hash(&self, password: &str) -> String {
        let salt: [u8; SALT_LENGTH] = rand::random();
        let hash = derive(password, &salt, self.iterations);
        format!(
            "{}${}${}${}",
            SCHEME,
            self.iterations,
            hex::encode(salt),
            hex::encode(hash)
        )
    }

    /// False for a wrong password and for any malformed stored hash.
    pub fn verify(&self, password: &str, stored: &str) -> bool {
        let parts: Vec<&str> = stored.split('$').collect();
        let [scheme, iterations, salt, expected] = parts.as_slice() else {
            return false;
        };
        if *scheme != SCHEME {
            return false;
        }
        let (Ok(iterations), Ok(salt), Ok(expected)) =
            (iterations.parse::<u32>(), hex::decode(salt), hex::decode(expected))
        else {
            return false;
        };
        if iterations == 0 {
            return false;
        }
        let actual = derive(password, &salt, iterations);
        actual.as_slice().ct_eq(expected.as_slice()).into()
    }
}

struct Session {
    user_id: String,
    created_at: Instant,
}

/// Live sessions, keyed by session id.
///
/// A token is `<session id>.<hex HMAC-SHA256(secret, session id)>`; tokens
/// with a bad signature are rejected before the table is consulted. Sessions
/// older than the TTL are refused, and pruned whenever a new one starts.
pub struct SessionStore {
    secret: Vec<u8>,
    ttl: Duration,
    sessions: RwLock<HashMap<String, Session>>,
}

impl SessionStore {
    pub fn new(secret: &str) -> Self {
        Self::with_ttl(secret, SESSION_TTL)
    }

    pub fn with_ttl(secret: &str, ttl: Duration) -> Self {
        Self {
            secret: secret.as_bytes().to_vec(),
            ttl,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn expired(&self, session: &Session) -> bool {
        session.created_at.elapsed() >= self.ttl
    }

    /// Number of sessions held, expired ones included until the next prune.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    fn mac(&self, session_id: &str) -> Option<HmacSha256> {
        let mut mac = <HmacSha256 as Mac>::new_from_slice(&self.secret).ok()?;
        mac.update(session_id.as_bytes());
        Some(mac)
    }

    /// Starts a session for `user_id` and returns its token.
    pub async fn create(&self, user_id: &str) -> Option<String> {
        let session_id = Uuid::new_v4().to_string();
        let signature = hex::encode(self.mac(&session_id)?.finalize().into_bytes());
        let mut sessions = self.sessions.write().await;
        sessions.retain(|_, session| !self.expired(session));
        sessions.insert(
            session_id.clone(),
            Session {
                user_id: user_id.to_string(),
                created_at: Instant::now(),
            },
        );
        Some(format!("{}.{}", session_id, signature))
    }

    fn verified_id<'a>(&self, token: &'a str) -> Option<&'a str> {
        let (session_id, signature) = token.split_once('.')?;
        let signature = hex::decode(signature).ok()?;
        self.mac(session_id)?.verify_slice(&signature).ok()?;
        Some(session_id)
    }

    /// The user behind `token`, if it is authentic and still live.
    pub async fn resolve(&self, token: &str) -> Option<String> {
        let session_id = self.verified_id(token)?;
        {
            let sessions = self.sessions.read().await;
            let session = sessions.get(session_id)?;
            if !self.expired(session) {
                return Some(session.user_id.clone());
            }
        }
        self.sessions.write().await.remove(session_id);
        None
    }

    pub async fn revoke(&self, token: &str) -> bool {
        match self.verified_id(token) {
            Some(session_id) => self.sessions.write().await.remove(session_id).is_some(),
            None => false,
        }
    }
}

/// Token from `Authorization: Bearer`, else from the session cookie.
pub fn token_from_headers(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.to_string())
        .filter(|t| !t.is_empty())
}

pub fn session_cookie(token: &str, max_age: Duration) -> String {
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE,
        token,
        max_age.as_secs()
    )
}

pub fn expired_session_cookie() -> String {
    format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", SESSION_COOKIE)
}

/// The signed-in account. Rejects the request with 401 otherwise.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub account: Account,
    pub token: String,
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let token = token_from_headers(&parts.headers).ok_or(ApiError::Unauthorized)?;
        let user_id = state.sessions.resolve(&token).await.ok_or(ApiError::Unauthorized)?;
        let account = state
            .accounts
            .find_by_id(&user_id)
            .await?
            .ok_or(ApiError::Unauthorized)?;
        Ok(CurrentUser { account, token })
    }
}
