//! # Signed Session Tokens
//!
//! Back-office users authenticate with a bearer token that carries their
//! identity and role. The token is signed with an Ed25519 key derived from a
//! shared secret, so any node configured with the same secret can verify it
//! without a session store.
//!
//! ## Token Format
//!
//! ```text
//! v1.<hex(claims JSON)>.<hex(ed25519 signature over the claims JSON)>
//! ```
//!
//! ## Security Invariant
//!
//! The signing key is never serialized or logged; `Debug` prints only the
//! public half.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::actor::{Actor, Role};
use crate::error::SessionError;
use crate::identity::UserId;
use crate::temporal::Timestamp;

const TOKEN_VERSION: &str = "v1";

/// Claims carried by a session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// The authenticated user.
    pub sub: UserId,
    /// Display name recorded in audit entries.
    pub name: String,
    /// The user's role.
    pub role: Role,
    /// Expiry as Unix seconds.
    pub exp: i64,
}

impl SessionClaims {
    /// Claims for `user` that expire `ttl_secs` after `now`.
    pub fn new(sub: UserId, name: impl Into<String>, role: Role, now: Timestamp, ttl_secs: i64) -> Self {
        Self {
            sub,
            name: name.into(),
            role,
            exp: now.as_datetime().timestamp() + ttl_secs,
        }
    }

    /// The actor these claims resolve to.
    pub fn actor(&self) -> Actor {
        Actor::user(self.sub, self.name.clone(), self.role)
    }
}

/// Issues and verifies session tokens.
pub struct SessionSigner {
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
}

impl SessionSigner {
    /// Derive the signing key from `secret` (SHA-256 of the secret bytes).
    pub fn from_secret(secret: &str) -> Self {
        let seed: [u8; 32] = Sha256::digest(secret.as_bytes()).into();
        let signing_key = SigningKey::from_bytes(&seed);
        let verifying_key = signing_key.verifying_key();
        Self {
            signing_key,
            verifying_key,
        }
    }

    /// Hex-encoded public key, safe to log.
    pub fn public_key_hex(&self) -> String {
        to_hex(self.verifying_key.as_bytes())
    }

    /// Sign `claims` into a token string.
    pub fn issue(&self, claims: &SessionClaims) -> Result<String, SessionError> {
        let payload =
            serde_json::to_vec(claims).map_err(|e| SessionError::Encoding(e.to_string()))?;
        let signature = self.signing_key.sign(&payload);
        Ok(format!(
            "{TOKEN_VERSION}.{}.{}",
            to_hex(&payload),
            to_hex(&signature.to_bytes())
        ))
    }

    /// Verify `token` and return its claims if the signature holds and the
    /// token has not expired at `now`.
    pub fn verify(&self, token: &str, now: Timestamp) -> Result<SessionClaims, SessionError> {
        let mut parts = token.trim().split('.');
        let (version, payload_hex, signature_hex) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(v), Some(p), Some(s), None) => (v, p, s),
            _ => return Err(SessionError::Malformed),
        };
        if version != TOKEN_VERSION {
            return Err(SessionError::Malformed);
        }

        let payload = from_hex(payload_hex).ok_or(SessionError::Malformed)?;
        let signature_bytes: [u8; 64] = from_hex(signature_hex)
            .and_then(|b| b.try_into().ok())
            .ok_or(SessionError::Malformed)?;
        let signature = Signature::from_bytes(&signature_bytes);

        self.verifying_key
            .verify(&payload, &signature)
            .map_err(|_| SessionError::BadSignature)?;

        let claims: SessionClaims =
            serde_json::from_slice(&payload).map_err(|_| SessionError::Malformed)?;
        if claims.exp <= now.as_datetime().timestamp() {
            return Err(SessionError::Expired);
        }
        Ok(claims)
    }
}

impl std::fmt::Debug for SessionSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionSigner")
            .field("public_key", &self.public_key_hex())
            .finish()
    }
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn from_hex(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 || !s.is_ascii() {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).ok())
        .collect()
}
