//! # Authentication & Authorization Middleware
//!
//! Every `/v1/*` request carries `Authorization: Bearer <session token>`.
//! The token is verified with the service's [`SessionSigner`]; on success
//! the resolved [`Actor`] is injected into the request extensions as a
//! [`CallerIdentity`], which handlers extract via `FromRequestParts`.
//!
//! ```text
//! Bearer v1.<hex claims>.<hex signature>
//! ```
//!
//! There is no anonymous mode: a missing, malformed, forged or expired token
//! is answered with 401 before any handler runs.

use std::sync::Arc;

use axum::extract::Request;
use axum::http::header;
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use fwd_core::{Actor, Role, SessionClaims, SessionSigner, Timestamp};

use crate::error::AppError;

// ── CallerIdentity ──────────────────────────────────────────────────────────

/// The verified caller of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    /// The actor every mutation of this request is attributed to.
    pub actor: Actor,
    /// Token expiry (Unix seconds).
    pub expires_at: i64,
}

impl CallerIdentity {
    /// Identity carried by verified session claims.
    pub fn from_claims(claims: &SessionClaims) -> Self {
        Self {
            actor: claims.actor(),
            expires_at: claims.exp,
        }
    }

    /// Check if the caller has at least the given minimum role.
    pub fn has_role(&self, minimum: Role) -> bool {
        self.actor.has_role(minimum)
    }

    /// The caller's role, if the token carried one.
    pub fn role(&self) -> Option<Role> {
        self.actor.role
    }
}

/// Extracts the identity that the auth middleware injected into extensions.
/// Returns 401 if no identity is present.
impl<S: Send + Sync> axum::extract::FromRequestParts<S> for CallerIdentity {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CallerIdentity>()
            .cloned()
            .ok_or_else(|| AppError::Unauthorized("no caller identity in request context".into()))
    }
}

/// Check that the caller has at least the required role.
/// Returns 403 Forbidden if the caller's role is insufficient.
pub fn require_role(caller: &CallerIdentity, minimum: Role) -> Result<(), AppError> {
    if caller.has_role(minimum) {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!(
            "role '{}' required, caller has '{}'",
            minimum.as_str(),
            caller.role().map(|r| r.as_str()).unwrap_or("none")
        )))
    }
}

// ── Auth Configuration ──────────────────────────────────────────────────────

/// Auth configuration injected into request extensions.
///
/// `Debug` shows only the verifying key.
#[derive(Clone)]
pub struct AuthConfig {
    pub signer: Arc<SessionSigner>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("public_key", &self.signer.public_key_hex())
            .finish()
    }
}

// ── Token Validation ────────────────────────────────────────────────────────

/// Resolve the `Authorization` header value into a caller identity.
pub fn authenticate(
    header_value: Option<&str>,
    signer: &SessionSigner,
    now: Timestamp,
) -> Result<CallerIdentity, AppError> {
    let value = header_value.ok_or_else(|| {
        AppError::Unauthorized("missing authorization header".into())
    })?;
    let token = value.strip_prefix("Bearer ").ok_or_else(|| {
        AppError::Unauthorized("authorization header must use Bearer scheme".into())
    })?;
    let claims = signer.verify(token.trim(), now)?;
    Ok(CallerIdentity::from_claims(&claims))
}

// ── Middleware ───────────────────────────────────────────────────────────────

/// Verify the bearer session token and inject the [`CallerIdentity`].
pub async fn auth_middleware(mut request: Request, next: Next) -> Response {
    let Some(config) = request.extensions().get::<AuthConfig>().cloned() else {
        tracing::error!("auth middleware installed without AuthConfig");
        return AppError::Internal("authentication is not configured".into()).into_response();
    };

    let header_value = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    match authenticate(header_value, &config.signer, Timestamp::now()) {
        Ok(identity) => {
            tracing::debug!(
                user_id = ?identity.actor.id,
                role = ?identity.actor.role,
                "request authenticated"
            );
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        Err(err) => {
            tracing::warn!(reason = %err, "authentication failed");
            err.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fwd_core::UserId;

    fn signer() -> SessionSigner {
        SessionSigner::from_secret("test-secret")
    }

    fn token(signer: &SessionSigner, role: Role, ttl: i64) -> (UserId, String) {
        let user = UserId::new();
        let claims = SessionClaims::new(user, "Priya", role, Timestamp::now(), ttl);
        (user, signer.issue(&claims).unwrap())
    }

    #[test]
    fn test_valid_token_resolves_actor() {
        let signer = signer();
        let (user, token) = token(&signer, Role::Manager, 3600);
        let header = format!("Bearer {token}");
        let identity = authenticate(Some(&header), &signer, Timestamp::now()).unwrap();
        assert_eq!(identity.actor.id, Some(user));
        assert_eq!(identity.actor.name.as_deref(), Some("Priya"));
        assert!(identity.has_role(Role::Staff));
        assert!(identity.has_role(Role::Manager));
        assert!(!identity.has_role(Role::Admin));
    }

    #[test]
    fn test_missing_header_rejected() {
        let err = authenticate(None, &signer(), Timestamp::now()).unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[test]
    fn test_non_bearer_scheme_rejected() {
        let err = authenticate(Some("Basic abc"), &signer(), Timestamp::now()).unwrap_err();
        assert!(err.to_string().contains("Bearer"));
    }

    #[test]
    fn test_token_from_other_secret_rejected() {
        let (_, token) = token(&SessionSigner::from_secret("other"), Role::Admin, 3600);
        let header = format!("Bearer {token}");
        let err = authenticate(Some(&header), &signer(), Timestamp::now()).unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[test]
    fn test_expired_token_rejected() {
        let signer = signer();
        let (_, token) = token(&signer, Role::Staff, -1);
        let header = format!("Bearer {token}");
        assert!(authenticate(Some(&header), &signer, Timestamp::now()).is_err());
    }

    #[test]
    fn test_require_role() {
        let staff = CallerIdentity {
            actor: Actor::user(UserId::new(), "S", Role::Staff),
            expires_at: 0,
        };
        let admin = CallerIdentity {
            actor: Actor::user(UserId::new(), "A", Role::Admin),
            expires_at: 0,
        };
        assert!(matches!(
            require_role(&staff, Role::Manager),
            Err(AppError::Forbidden(_))
        ));
        assert!(require_role(&admin, Role::Manager).is_ok());
    }

    #[test]
    fn test_auth_config_debug_shows_only_public_key() {
        let config = AuthConfig {
            signer: Arc::new(signer()),
        };
        let debug = format!("{config:?}");
        assert!(debug.contains(&config.signer.public_key_hex()));
        assert!(!debug.contains("test-secret"));
    }
}
