//! Caller identity checks for the import routes.
//!
//! Both routes are invoked by Google infrastructure with a Google-signed ID
//! token in the `Authorization` header. A caller is accepted only when the
//! token verifies for the route's audience, its email is verified, and that
//! email is the principal configured for the route.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use parking_lot::RwLock;
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::Mutex;

pub const GOOGLE_CERTS_URL: &str = "https://www.googleapis.com/oauth2/v3/certs";
pub const GOOGLE_ISSUERS: [&str; 2] = ["https://accounts.google.com", "accounts.google.com"];

const JWKS_TTL: Duration = Duration::from_secs(3600);
const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(10);
const JWKS_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing bearer token")]
    MissingToken,

    #[error("invalid token: {0}")]
    InvalidToken(String),

    #[error("token email is not verified")]
    UnverifiedEmail,

    #[error("unexpected principal {actual:?}, expected {expected}")]
    UnexpectedPrincipal {
        expected: String,
        actual: Option<String>,
    },
}

/// Claims of a verified ID token that matter for authorization.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct VerifiedIdentity {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub email_verified: bool,
}

#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    /// Verifies `token` and checks it was minted for `audience`.
    async fn verify(&self, token: &str, audience: &str) -> Result<VerifiedIdentity, AuthError>;
}

/// The principal allowed on one route and the audience its tokens carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectedCaller {
    pub email: String,
    pub audience: String,
}

/// Extracts the token from an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header: Option<&str>) -> Result<&str, AuthError> {
    let value = header.ok_or(AuthError::MissingToken)?;
    let (scheme, token) = value.split_once(' ').ok_or(AuthError::MissingToken)?;
    let token = token.trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return Err(AuthError::MissingToken);
    }
    Ok(token)
}

/// Verifies the header's token and checks it belongs to `expected`.
pub async fn authorize(
    verifier: &dyn IdentityVerifier,
    authorization: Option<&str>,
    expected: &ExpectedCaller,
) -> Result<VerifiedIdentity, AuthError> {
    let token = bearer_token(authorization)?;
    let identity = verifier.verify(token, &expected.audience).await?;

    if !identity.email_verified {
        return Err(AuthError::UnverifiedEmail);
    }
    if identity.email.as_deref() != Some(expected.email.as_str()) {
        return Err(AuthError::UnexpectedPrincipal {
            expected: expected.email.clone(),
            actual: identity.email,
        });
    }
    Ok(identity)
}

struct CachedKeys {
    keys_by_kid: HashMap<String, DecodingKey>,
    /// Unset until the first successful fetch.
    fetched_at: Option<Instant>,
    last_refresh_attempt: Instant,
}

/// Verifies RS256 ID tokens against a JWKS endpoint, caching keys by `kid`.
///
/// Only one refresh runs at a time. Callers that miss while it is in flight
/// wait for it and reuse its keys. An expired key is still served while a
/// refresh is rate-limited or failing.
pub struct GoogleIdTokenVerifier {
    client: reqwest::Client,
    jwks_url: String,
    issuers: Vec<String>,
    ttl: Duration,
    cache: RwLock<Option<CachedKeys>>,
    refresh: Mutex<()>,
}

impl GoogleIdTokenVerifier {
    /// Verifier for Google-issued tokens.
    pub fn google() -> Result<Self, reqwest::Error> {
        Self::new(
            GOOGLE_CERTS_URL,
            GOOGLE_ISSUERS.iter().map(|issuer| issuer.to_string()).collect(),
        )
    }

    pub fn new(jwks_url: impl Into<String>, issuers: Vec<String>) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(JWKS_FETCH_TIMEOUT)
            .connect_timeout(Duration::from_secs(5))
            .build()?;
        Ok(Self {
            client,
            jwks_url: jwks_url.into(),
            issuers,
            ttl: JWKS_TTL,
            cache: RwLock::new(None),
            refresh: Mutex::new(()),
        })
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Fetches the signing keys before the first request arrives.
    ///
    /// A failure is logged, not returned; the first token retries the fetch
    /// once the refresh interval has passed.
    pub async fn warm(&self) -> usize {
        let _refresh = self.refresh.lock().await;
        match self.refresh_keys().await {
            Ok(count) => {
                tracing::info!(jwks_url = self.jwks_url.as_str(), kid_count = count, "JWKS cached");
                count
            }
            Err(e) => {
                tracing::warn!(
                    jwks_url = self.jwks_url.as_str(),
                    error = %e,
                    "failed to fetch JWKS at startup"
                );
                0
            }
        }
    }

    async fn key_for(&self, kid: &str) -> Result<DecodingKey, AuthError> {
        if let Some(key) = self.cached_key(kid, true) {
            return Ok(key);
        }

        let _refresh = self.refresh.lock().await;
        // A refresh may have completed while this caller waited.
        if let Some(key) = self.cached_key(kid, true) {
            return Ok(key);
        }

        let rate_limited = self
            .cache
            .read()
            .as_ref()
            .is_some_and(|entry| entry.last_refresh_attempt.elapsed() < MIN_REFRESH_INTERVAL);
        if rate_limited {
            return self.cached_key(kid, false).ok_or_else(|| unknown_key(kid));
        }

        match self.refresh_keys().await {
            Ok(_) => self.cached_key(kid, false).ok_or_else(|| unknown_key(kid)),
            Err(e) => match self.cached_key(kid, false) {
                Some(key) => {
                    tracing::warn!(kid, error = %e, "JWKS refresh failed; using expired key");
                    Ok(key)
                }
                None => Err(e),
            },
        }
    }

    /// Looks `kid` up in the cache, ignoring the TTL unless `fresh_only`.
    fn cached_key(&self, kid: &str, fresh_only: bool) -> Option<DecodingKey> {
        let cache = self.cache.read();
        let entry = cache.as_ref()?;
        if fresh_only && !entry.fetched_at.is_some_and(|at| at.elapsed() < self.ttl) {
            return None;
        }
        entry.keys_by_kid.get(kid).cloned()
    }

    /// Refetches the key set. Callers hold the refresh lock.
    async fn refresh_keys(&self) -> Result<usize, AuthError> {
        {
            let mut cache = self.cache.write();
            match cache.as_mut() {
                Some(entry) => entry.last_refresh_attempt = Instant::now(),
                None => {
                    *cache = Some(CachedKeys {
                        keys_by_kid: HashMap::new(),
                        fetched_at: None,
                        last_refresh_attempt: Instant::now(),
                    });
                }
            }
        }

        let jwk_set = self.fetch_jwks().await?;
        let mut keys_by_kid = HashMap::new();
        for jwk in &jwk_set.keys {
            let Some(key_id) = &jwk.common.key_id else {
                continue;
            };
            match DecodingKey::from_jwk(jwk) {
                Ok(key) => {
                    keys_by_kid.insert(key_id.clone(), key);
                }
                Err(e) => {
                    tracing::debug!(kid = key_id.as_str(), error = %e, "skipping unusable JWK");
                }
            }
        }

        let count = keys_by_kid.len();
        let now = Instant::now();
        *self.cache.write() = Some(CachedKeys {
            keys_by_kid,
            fetched_at: Some(now),
            last_refresh_attempt: now,
        });
        Ok(count)
    }

    async fn fetch_jwks(&self) -> Result<JwkSet, AuthError> {
        let response = self
            .client
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|e| AuthError::InvalidToken(format!("failed to fetch signing keys: {e}")))?;

        if !response.status().is_success() {
            return Err(AuthError::InvalidToken(format!(
                "failed to fetch signing keys: HTTP {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AuthError::InvalidToken(format!("failed to parse signing keys: {e}")))
    }
}

fn unknown_key(kid: &str) -> AuthError {
    AuthError::InvalidToken(format!("unknown signing key {kid}"))
}

#[async_trait]
impl IdentityVerifier for GoogleIdTokenVerifier {
    async fn verify(&self, token: &str, audience: &str) -> Result<VerifiedIdentity, AuthError> {
        let header = decode_header(token).map_err(|e| AuthError::InvalidToken(e.to_string()))?;
        let kid = header
            .kid
            .ok_or_else(|| AuthError::InvalidToken("token header has no kid".into()))?;
        let key = self.key_for(&kid).await?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&self.issuers);
        validation.set_audience(&[audience]);

        let data = decode::<VerifiedIdentity>(token, &key, &validation)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))?;
        Ok(data.claims)
    }
}

impl std::fmt::Debug for GoogleIdTokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleIdTokenVerifier")
            .field("jwks_url", &self.jwks_url)
            .field("issuers", &self.issuers)
            .field("ttl", &self.ttl)
            .finish()
    }
}
