use axum::{
    body::Body,
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderMap, Request},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::error::{AppError, AppResult};
use crate::AppState;

pub const SESSION_COOKIE: &str = "newsroom_session";
const ISSUER: &str = "newsroom";
const SUBJECT: &str = "admin";

/// Trimmed exact comparison against the configured secret. Inner whitespace counts.
pub fn verify_secret(configured: Option<&str>, candidate: &str) -> bool {
    let candidate = candidate.trim();
    match configured {
        Some(expected) => !candidate.is_empty() && constant_time_eq(candidate, expected.trim()),
        None => false,
    }
}

/// Compares SHA-256 digests with `subtle` so neither content nor length leaks through timing.
fn constant_time_eq(a: &str, b: &str) -> bool {
    let a = Sha256::digest(a.as_bytes());
    let b = Sha256::digest(b.as_bytes());
    a.ct_eq(&b).into()
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
}

/// Issues and checks the signed admin session tokens handed out by `POST /api/auth`.
#[derive(Clone)]
pub struct SessionService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl_minutes: i64,
}

impl SessionService {
    pub fn new(key: &[u8], ttl_minutes: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(key),
            decoding_key: DecodingKey::from_secret(key),
            ttl_minutes,
        }
    }

    pub fn ttl_seconds(&self) -> i64 {
        self.ttl_minutes.saturating_mul(60)
    }

    pub fn issue(&self) -> AppResult<String> {
        let now = Utc::now();
        let expires = Duration::try_minutes(self.ttl_minutes)
            .and_then(|ttl| now.checked_add_signed(ttl))
            .ok_or_else(|| {
                AppError::internal(format!("session ttl out of range: {}", self.ttl_minutes))
            })?;
        let claims = SessionClaims {
            sub: SUBJECT.to_string(),
            iat: now.timestamp(),
            exp: expires.timestamp(),
            iss: ISSUER.to_string(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::internal(format!("session token: {}", e)))
    }

    pub fn validate(&self, token: &str) -> AppResult<SessionClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[ISSUER]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);

        let data = decode::<SessionClaims>(token, &self.decoding_key, &validation)
            .map_err(|e| AppError::unauthorized(format!("Invalid session: {}", e)))?;
        if data.claims.sub != SUBJECT {
            return Err(AppError::unauthorized("Invalid session"));
        }
        Ok(data.claims)
    }
}

fn session_cookie(token: &str, max_age: i64, secure: bool) -> String {
    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Strict; Max-Age={}",
        SESSION_COOKIE, token, max_age
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    scheme.eq_ignore_ascii_case("bearer").then(|| token.trim())
}

/// Accepts the raw admin secret or a session token as bearer credential, or a session cookie.
pub fn authorize(state: &AppState, headers: &HeaderMap) -> AppResult<()> {
    let bearer = bearer_token(headers);
    if let Some(token) = bearer {
        if verify_secret(state.config.admin_secret.as_deref(), token) {
            return Ok(());
        }
        if state.sessions.validate(token).is_ok() {
            return Ok(());
        }
    }

    let cookie = cookie_value(headers, SESSION_COOKIE);
    if let Some(token) = cookie {
        if state.sessions.validate(token).is_ok() {
            return Ok(());
        }
    }

    if state.config.admin_secret.is_none() {
        tracing::warn!("admin request rejected: ADMIN_SECRET is not configured");
    }
    match (bearer, cookie) {
        (None, None) => Err(AppError::unauthorized("Authorization required")),
        _ => Err(AppError::unauthorized("Invalid authorization token")),
    }
}

/// Guard in front of every mutating route.
pub async fn require_admin(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    tracing::trace!("require_admin started");
    if let Err(e) = authorize(&state, req.headers()) {
        tracing::warn!(method = %req.method(), uri = %req.uri(), "admin check failed");
        return Err(e);
    }
    Ok(next.run(req).await)
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(alias = "password")]
    pub secret: Option<String>,
}

pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> AppResult<Response> {
    let Json(request) = payload?;
    let candidate = request.secret.unwrap_or_default();

    let Some(expected) = state.config.admin_secret.as_deref() else {
        return Err(AppError::internal("Admin secret not configured"));
    };
    tracing::debug!(
        provided_length = candidate.trim().len(),
        expected_length = expected.len(),
        "checking admin secret"
    );

    if !verify_secret(Some(expected), &candidate) {
        tracing::warn!("invalid admin secret provided");
        return Err(AppError::unauthorized("Invalid admin secret"));
    }

    let token = state.sessions.issue()?;
    let cookie = session_cookie(
        &token,
        state.sessions.ttl_seconds(),
        state.config.cookie_secure,
    );
    tracing::info!("admin session issued");

    Ok(([(header::SET_COOKIE, cookie)], Json(json!({ "success": true }))).into_response())
}

pub async fn logout(State(state): State<AppState>) -> Response {
    let cookie = session_cookie("", 0, state.config.cookie_secure);
    ([(header::SET_COOKIE, cookie)], Json(json!({ "success": true }))).into_response()
}
