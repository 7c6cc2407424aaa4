//! Bearer-token authentication for the administrative account.
//!
//! Tokens are compact HS256 JWTs (`header.claims.signature`, each part
//! base64url without padding) carrying `{sub, iat, exp}`. Anything that is
//! not a well-formed, correctly signed, unexpired token is rejected with
//! [`ReportError::Unauthorized`]; there is no partial trust.
//!
//! The core library never sees tokens. The HTTP layer verifies them and hands
//! the resulting [`Principal`] to [`crate::service::ReportService`].

use crate::config::ServiceConfig;
use crate::error::ReportError;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

type HmacSha256 = Hmac<Sha256>;

/// `{"alg":"HS256","typ":"JWT"}`, pre-encoded.
const HEADER: &str = "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9";

/// An authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub subject: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    iat: i64,
    exp: i64,
}

/// The single configured administrative account.
#[derive(Clone)]
pub struct AdminAccount {
    username: String,
    password: String,
}

impl AdminAccount {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    fn matches(&self, username: &str, password: &str) -> bool {
        // Both comparisons always run so timing does not reveal which failed.
        let user_ok = digest_eq(username, &self.username);
        let pass_ok = digest_eq(password, &self.password);
        user_ok & pass_ok
    }
}

fn digest_eq(a: &str, b: &str) -> bool {
    Sha256::digest(a.as_bytes()) == Sha256::digest(b.as_bytes())
}

/// Issues and verifies bearer tokens.
#[derive(Clone)]
pub struct TokenAuthority {
    key: Vec<u8>,
    ttl_secs: i64,
    admin: AdminAccount,
}

impl std::fmt::Debug for TokenAuthority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenAuthority")
            .field("ttl_secs", &self.ttl_secs)
            .field("admin", &self.admin.username)
            .finish_non_exhaustive()
    }
}

impl TokenAuthority {
    pub fn new(secret: impl AsRef<[u8]>, ttl_secs: u64, admin: AdminAccount) -> Self {
        Self {
            key: secret.as_ref().to_vec(),
            ttl_secs: i64::try_from(ttl_secs).unwrap_or(i64::MAX),
            admin,
        }
    }

    pub fn from_config(config: &ServiceConfig) -> Self {
        Self::new(
            &config.token_secret,
            config.token_ttl_secs,
            AdminAccount::new(&config.admin_username, &config.admin_password),
        )
    }

    /// Check credentials and issue a token for the account.
    pub fn login(&self, username: &str, password: &str) -> Result<String, ReportError> {
        if !self.admin.matches(username, password) {
            warn!("Rejected login attempt for '{}'", username);
            return Err(ReportError::InvalidCredentials);
        }
        let token = self.issue(username)?;
        info!("Issued token for '{}' (ttl {}s)", username, self.ttl_secs);
        Ok(token)
    }

    pub fn issue(&self, subject: &str) -> Result<String, ReportError> {
        self.issue_at(subject, Utc::now().timestamp())
    }

    fn issue_at(&self, subject: &str, now: i64) -> Result<String, ReportError> {
        let claims = Claims {
            sub: subject.to_string(),
            iat: now,
            exp: now.saturating_add(self.ttl_secs),
        };
        let body = serde_json::to_vec(&claims)
            .map_err(|e| ReportError::Internal(format!("encode claims: {e}")))?;
        let signing_input = format!("{HEADER}.{}", URL_SAFE_NO_PAD.encode(body));
        let signature = URL_SAFE_NO_PAD.encode(self.mac(&signing_input)?.finalize().into_bytes());
        Ok(format!("{signing_input}.{signature}"))
    }

    pub fn verify(&self, token: &str) -> Result<Principal, ReportError> {
        self.verify_at(token, Utc::now().timestamp())
    }

    fn verify_at(&self, token: &str, now: i64) -> Result<Principal, ReportError> {
        let (signing_input, signature) = token
            .rsplit_once('.')
            .ok_or_else(|| ReportError::unauthorized("malformed token"))?;
        let (header, body) = signing_input
            .split_once('.')
            .ok_or_else(|| ReportError::unauthorized("malformed token"))?;
        if header != HEADER {
            return Err(ReportError::unauthorized("unsupported token header"));
        }

        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| ReportError::unauthorized("malformed signature"))?;
        self.mac(signing_input)?
            .verify_slice(&signature)
            .map_err(|_| ReportError::unauthorized("bad signature"))?;

        let body = URL_SAFE_NO_PAD
            .decode(body)
            .map_err(|_| ReportError::unauthorized("malformed claims"))?;
        let claims: Claims = serde_json::from_slice(&body)
            .map_err(|_| ReportError::unauthorized("malformed claims"))?;
        if now >= claims.exp {
            debug!("Token for '{}' expired at {}", claims.sub, claims.exp);
            return Err(ReportError::unauthorized("token expired"));
        }
        Ok(Principal {
            subject: claims.sub,
        })
    }

    fn mac(&self, signing_input: &str) -> Result<HmacSha256, ReportError> {
        let mut mac = HmacSha256::new_from_slice(&self.key)
            .map_err(|e| ReportError::Internal(format!("hmac key: {e}")))?;
        mac.update(signing_input.as_bytes());
        Ok(mac)
    }
}

/// Pull the token out of an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header: Option<&str>) -> Result<&str, ReportError> {
    let value = header.ok_or_else(|| ReportError::unauthorized("missing bearer token"))?;
    let (scheme, token) = value
        .trim()
        .split_once(' ')
        .ok_or_else(|| ReportError::unauthorized("malformed authorization header"))?;
    let token = token.trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return Err(ReportError::unauthorized("malformed authorization header"));
    }
    Ok(token)
}
