//! OIDC token verification.
//! Mission: Verify bearer tokens against the configured realm's JWKS without
//! re-fetching keys on every request.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use parking_lot::RwLock;
use tracing::debug;

use super::models::{AuthUser, TokenClaims};

const JWKS_CACHE_TTL: Duration = Duration::from_secs(600);

struct CachedJwks {
    keys: JwkSet,
    fetched_at: Instant,
}

/// Verifies bearer tokens issued by the configured OIDC realm.
///
/// The identity provider itself (token issuance, login flows) is out of
/// scope (spec §1); this only trusts its signature and claims.
pub struct OidcVerifier {
    http: reqwest::Client,
    jwks_url: String,
    issuer: String,
    audience: String,
    cache: RwLock<Option<CachedJwks>>,
}

impl OidcVerifier {
    pub fn new(http: reqwest::Client, jwks_url: String, issuer: String, audience: String) -> Arc<Self> {
        Arc::new(Self { http, jwks_url, issuer, audience, cache: RwLock::new(None) })
    }

    /// Verify a bearer token and extract the caller identity.
    pub async fn verify(&self, token: &str) -> Result<AuthUser> {
        let header = decode_header(token).context("malformed token header")?;
        let kid = header.kid.context("token header missing kid")?;

        let jwks = self.jwks(false).await?;
        let jwk = match jwks.keys.iter().find(|k| k.common.key_id.as_deref() == Some(kid.as_str())) {
            Some(jwk) => jwk.clone(),
            None => {
                // Key rotation: refresh once before giving up.
                let refreshed = self.jwks(true).await?;
                refreshed
                    .keys
                    .iter()
                    .find(|k| k.common.key_id.as_deref() == Some(kid.as_str()))
                    .cloned()
                    .context("no matching signing key for token")?
            }
        };

        let decoding_key = DecodingKey::from_jwk(&jwk).context("unsupported signing key")?;
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));

        let token_data = decode::<TokenClaims>(token, &decoding_key, &validation).context("token verification failed")?;
        Ok(token_data.claims.into())
    }

    async fn jwks(&self, force: bool) -> Result<JwkSet> {
        if !force {
            if let Some(cached) = self.cache.read().as_ref() {
                if cached.fetched_at.elapsed() < JWKS_CACHE_TTL {
                    return Ok(cached.keys.clone());
                }
            }
        }

        debug!(url = %self.jwks_url, "fetching JWKS");
        let resp = self.http.get(&self.jwks_url).send().await.context("failed to fetch JWKS")?;
        if !resp.status().is_success() {
            anyhow::bail!("JWKS endpoint returned {}", resp.status());
        }
        let keys: JwkSet = resp.json().await.context("failed to parse JWKS")?;

        *self.cache.write() = Some(CachedJwks { keys: keys.clone(), fetched_at: Instant::now() });
        Ok(keys)
    }
}
