//! Bearer token authentication for the model viewer API.
//!
//! Clients exchange a username and password for a JSON Web Token at
//! `POST /api/login` and present it on every protected request:
//!
//! ```text
//! Authorization: Bearer <token>
//! ```
//!
//! # Token Format
//!
//! Tokens are HS256-signed JWTs carrying the user id and username:
//!
//! ```text
//! { "id": 1, "username": "alice", "iat": 1735686000, "exp": 1735689600 }
//! ```
//!
//! # Security Properties
//!
//! - **Stateless**: no session table; a token stays valid until `exp` and
//!   cannot be revoked earlier. Rotating the secret invalidates all tokens.
//! - **No leeway**: a token is rejected as soon as its expiry has passed
//! - **bcrypt**: password hashes are verified on the blocking thread pool
//!
//! # Example
//!
//! ```rust
//! use model_viewer::server::auth::TokenAuth;
//! use std::time::Duration;
//!
//! let auth = TokenAuth::new("my-secret-key", Duration::from_secs(3600));
//! let (token, _expires_at) = auth.issue(1, "alice").unwrap();
//!
//! let claims = auth.verify(&token).unwrap();
//! assert_eq!(claims.username, "alice");
//! ```

use std::time::Duration;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use super::handlers::ErrorResponse;

// =============================================================================
// Types
// =============================================================================

/// Claims embedded in a session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub id: i32,

    /// Username at the time of login
    pub username: String,

    /// Issued at (Unix epoch seconds)
    pub iat: i64,

    /// Expiry (Unix epoch seconds)
    pub exp: i64,
}

/// Authentication error types.
#[derive(Debug, Clone)]
pub enum AuthError {
    /// No Authorization header on a protected request
    MissingToken,

    /// Authorization header is not `Bearer <token>`
    MalformedHeader,

    /// Token signature or structure is invalid
    InvalidToken,

    /// Token expiry has passed
    Expired,

    /// Unknown username or wrong password
    InvalidCredentials,

    /// Token signing or password hashing failed
    Internal(String),
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::MissingToken => write!(f, "No token"),
            AuthError::MalformedHeader => write!(f, "Malformed Authorization header"),
            AuthError::InvalidToken => write!(f, "Invalid token"),
            AuthError::Expired => write!(f, "Token expired"),
            AuthError::InvalidCredentials => write!(f, "Invalid credentials"),
            AuthError::Internal(msg) => write!(f, "Authentication failed: {}", msg),
        }
    }
}

impl std::error::Error for AuthError {}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            AuthError::MissingToken => (StatusCode::UNAUTHORIZED, "missing_token"),
            AuthError::MalformedHeader => (StatusCode::UNAUTHORIZED, "malformed_header"),
            AuthError::InvalidToken => (StatusCode::UNAUTHORIZED, "invalid_token"),
            AuthError::Expired => (StatusCode::UNAUTHORIZED, "token_expired"),
            AuthError::InvalidCredentials => (StatusCode::UNAUTHORIZED, "invalid_credentials"),
            AuthError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };

        // Forged tokens and failed logins are worth a warning; expired and
        // missing tokens are routine
        let message = match &self {
            AuthError::Internal(detail) => {
                error!(
                    error_type = error_type,
                    status = status.as_u16(),
                    "Authentication error: {}",
                    detail
                );
                "Authentication failed".to_string()
            }
            AuthError::InvalidToken | AuthError::InvalidCredentials => {
                warn!(
                    error_type = error_type,
                    status = status.as_u16(),
                    "Authentication failed: {}",
                    self
                );
                self.to_string()
            }
            _ => {
                debug!(
                    error_type = error_type,
                    status = status.as_u16(),
                    "Authentication failed: {}",
                    self
                );
                self.to_string()
            }
        };

        let error_response = ErrorResponse::with_status(error_type, message, status);
        (status, Json(error_response)).into_response()
    }
}

// =============================================================================
// Token Authentication
// =============================================================================

/// Issues and verifies HS256 session tokens.
#[derive(Clone)]
pub struct TokenAuth {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

impl TokenAuth {
    /// Create an authenticator from a shared secret and token lifetime.
    pub fn new(secret: impl AsRef<[u8]>, ttl: Duration) -> Self {
        let secret = secret.as_ref();
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            ttl,
        }
    }

    /// Lifetime of newly issued tokens.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a token valid for the configured lifetime.
    ///
    /// Returns the encoded token and its expiry (Unix epoch seconds).
    pub fn issue(&self, id: i32, username: &str) -> Result<(String, i64), AuthError> {
        let exp = i64::try_from(self.ttl.as_secs())
            .ok()
            .and_then(|ttl| chrono::Utc::now().timestamp().checked_add(ttl))
            .ok_or_else(|| AuthError::Internal("token lifetime out of range".to_string()))?;
        let token = self.issue_with_expiry(id, username, exp)?;
        Ok((token, exp))
    }

    /// Issue a token with an explicit expiry timestamp.
    pub fn issue_with_expiry(&self, id: i32, username: &str, exp: i64) -> Result<String, AuthError> {
        let claims = Claims {
            id,
            username: username.to_string(),
            iat: chrono::Utc::now().timestamp(),
            exp,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Internal(e.to_string()))
    }

    /// Verify a token's signature and expiry and return its claims.
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::Expired,
                _ => AuthError::InvalidToken,
            })
    }
}

// =============================================================================
// Passwords
// =============================================================================

/// Hash a password with bcrypt.
pub fn hash_password(password: &str, cost: u32) -> Result<String, AuthError> {
    bcrypt::hash(password, cost).map_err(|e| AuthError::Internal(e.to_string()))
}

/// Check a password against a stored bcrypt hash.
///
/// bcrypt is deliberately slow, so this runs on the blocking thread pool.
/// A malformed stored hash counts as a mismatch.
pub async fn verify_password(password: String, password_hash: String) -> Result<bool, AuthError> {
    tokio::task::spawn_blocking(move || bcrypt::verify(&password, &password_hash))
        .await
        .map_err(|e| AuthError::Internal(e.to_string()))?
        .or_else(|e| {
            warn!("Stored password hash is unreadable: {}", e);
            Ok(false)
        })
}

// =============================================================================
// Axum Middleware
// =============================================================================

/// Extract the token from an `Authorization: Bearer <token>` header.
///
/// The scheme is matched case-insensitively.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::MissingToken)?
        .to_str()
        .map_err(|_| AuthError::MalformedHeader)?;

    let (scheme, token) = value
        .trim()
        .split_once(' ')
        .ok_or(AuthError::MalformedHeader)?;
    let token = token.trim();

    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return Err(AuthError::MalformedHeader);
    }
    Ok(token)
}

/// Axum middleware guarding protected routes.
///
/// Valid tokens have their [`Claims`] inserted into the request extensions,
/// where handlers read them through [`AuthUser`].
///
/// # Example
///
/// ```ignore
/// use axum::{Router, middleware};
/// use model_viewer::server::auth::{TokenAuth, auth_middleware};
///
/// let auth = TokenAuth::new("secret-key", Duration::from_secs(3600));
/// let app = Router::new()
///     .route("/api/annotations", get(list_annotations_handler))
///     .layer(middleware::from_fn_with_state(auth, auth_middleware));
/// ```
pub async fn auth_middleware(
    State(auth): State<TokenAuth>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let claims = auth.verify(bearer_token(request.headers())?)?;
    request.extensions_mut().insert(claims);
    Ok(next.run(request).await)
}

/// The authenticated caller of a protected route.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Claims);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Claims>()
            .cloned()
            .map(AuthUser)
            .ok_or(AuthError::MissingToken)
    }
}

// =============================================================================
// Tests
// =============================================================================
