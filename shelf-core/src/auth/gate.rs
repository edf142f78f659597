use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::debug;

use crate::auth::credentials::CredentialVerifier;
use crate::error::{Result, ShelfError};

pub const DEFAULT_TOKEN_TTL_SECS: u64 = 3600;

const REJECTED: &str = "invalid or missing token";

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    iat: i64,
    exp: i64,
}

/// Identity carried by an accepted token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Principal {
    pub subject: String,
    pub expires_at: i64,
}

/// Issues and checks HS256 bearer tokens in front of every mutating operation.
pub struct AuthGate {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl_secs: i64,
}

impl AuthGate {
    pub fn new(secret: &[u8], ttl_secs: u64) -> Result<Self> {
        if secret.is_empty() {
            return Err(ShelfError::Config("token secret is empty".into()));
        }
        let ttl_secs = i64::try_from(ttl_secs)
            .map_err(|_| ShelfError::Config(format!("token ttl too large: {ttl_secs}")))?;
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        Ok(Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            ttl_secs,
        })
    }

    pub fn issue(&self, subject: &str) -> Result<String> {
        self.issue_at(subject, OffsetDateTime::now_utc().unix_timestamp())
    }

    fn issue_at(&self, subject: &str, now: i64) -> Result<String> {
        let claims = Claims {
            sub: subject.to_string(),
            iat: now,
            exp: now + self.ttl_secs,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| ShelfError::Config(format!("token signing: {e}")))
    }

    /// Bad signature, expiry and garbage all produce the same rejection.
    pub fn verify(&self, token: &str) -> Result<Principal> {
        match decode::<Claims>(token, &self.decoding, &self.validation) {
            Ok(data) => Ok(Principal {
                subject: data.claims.sub,
                expires_at: data.claims.exp,
            }),
            Err(e) => {
                debug!(error = %e, "token rejected");
                Err(ShelfError::Unauthorized(REJECTED.into()))
            }
        }
    }

    /// Check an `Authorization` header value of the form `Bearer <token>`.
    pub fn authorize(&self, header: Option<&str>) -> Result<Principal> {
        let token = header
            .and_then(|h| h.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ShelfError::Unauthorized(REJECTED.into()))?;
        self.verify(token)
    }

    pub fn login(
        &self,
        verifier: &dyn CredentialVerifier,
        username: &str,
        password: &str,
    ) -> Result<String> {
        if !verifier.verify(username, password) {
            return Err(ShelfError::Unauthorized("invalid credentials".into()));
        }
        self.issue(username)
    }
}
