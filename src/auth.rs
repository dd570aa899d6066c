//! Bearer token handling.
//!
//! Tokens are HS256 JWTs issued by the auth service with the shared
//! `JWT_SECRET`. Only the claims this service needs are decoded.

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::errors::AppError;
use crate::models::UserType;
use crate::state::AppState;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    pub user_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub user_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
}

#[derive(Deserialize)]
struct Header {
    alg: String,
}

/// The caller, as established from a verified token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: i64,
    pub email: Option<String>,
    pub user_type: UserType,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.user_type == UserType::Admin
    }

    pub fn is_tutor(&self) -> bool {
        self.user_type == UserType::Tutor
    }
}

fn mac(secret: &str) -> anyhow::Result<HmacSha256> {
    HmacSha256::new_from_slice(secret.as_bytes()).map_err(|e| anyhow::anyhow!("invalid secret: {e}"))
}

pub fn sign_token(claims: &Claims, secret: &str) -> anyhow::Result<String> {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(claims)?);
    let signing_input = format!("{header}.{payload}");

    let mut mac = mac(secret)?;
    mac.update(signing_input.as_bytes());
    let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

    Ok(format!("{signing_input}.{signature}"))
}

/// Verifies signature and expiry; `now` is seconds since the epoch.
pub fn verify_token(token: &str, secret: &str, now: i64) -> anyhow::Result<Claims> {
    let mut parts = token.split('.');
    let (Some(header), Some(payload), Some(signature), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        anyhow::bail!("malformed token");
    };

    let header: Header = serde_json::from_slice(&URL_SAFE_NO_PAD.decode(header)?)?;
    anyhow::ensure!(header.alg == "HS256", "unsupported algorithm {}", header.alg);

    let mut mac = mac(secret)?;
    mac.update(header_and_payload(token).as_bytes());
    mac.verify_slice(&URL_SAFE_NO_PAD.decode(signature)?)
        .map_err(|_| anyhow::anyhow!("bad signature"))?;

    let claims: Claims = serde_json::from_slice(&URL_SAFE_NO_PAD.decode(payload)?)?;
    if let Some(exp) = claims.exp {
        anyhow::ensure!(exp > now, "token expired");
    }
    Ok(claims)
}

fn header_and_payload(token: &str) -> &str {
    token.rsplit_once('.').map(|(head, _)| head).unwrap_or(token)
}

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split_whitespace().nth(1))
        .filter(|t| !t.is_empty())
}

/// Resolves a raw token into the calling user.
pub fn authenticate(token: &str, secret: &str) -> Result<AuthUser, AppError> {
    let claims = verify_token(token, secret, chrono::Utc::now().timestamp()).map_err(|e| {
        tracing::debug!(error = %e, "token rejected");
        AppError::Unauthorized("Invalid token".to_string())
    })?;
    let user_type = claims
        .user_type
        .parse()
        .map_err(|_| AppError::Unauthorized("Invalid token".to_string()))?;
    Ok(AuthUser {
        id: claims.user_id,
        email: claims.email,
        user_type,
    })
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)
            .ok_or_else(|| AppError::Unauthorized("No token provided".to_string()))?;
        authenticate(token, &state.config.jwt_secret)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(exp: Option<i64>) -> Claims {
        Claims {
            user_id: 42,
            email: Some("tutor@example.com".to_string()),
            user_type: "tutor".to_string(),
            exp,
        }
    }

    #[test]
    fn test_sign_then_verify() {
        let token = sign_token(&claims(None), "secret").unwrap();
        let decoded = verify_token(&token, "secret", 0).unwrap();
        assert_eq!(decoded.user_id, 42);
        assert_eq!(decoded.user_type, "tutor");
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = sign_token(&claims(None), "secret").unwrap();
        assert!(verify_token(&token, "other", 0).is_err());
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let token = sign_token(&claims(None), "secret").unwrap();
        let mut parts: Vec<&str> = token.split('.').collect();
        let forged = URL_SAFE_NO_PAD.encode(br#"{"userId":1,"userType":"admin"}"#);
        parts[1] = &forged;
        assert!(verify_token(&parts.join("."), "secret", 0).is_err());
    }

    #[test]
    fn test_expired_token_rejected() {
        let token = sign_token(&claims(Some(1_000)), "secret").unwrap();
        assert!(verify_token(&token, "secret", 999).is_ok());
        assert!(verify_token(&token, "secret", 1_000).is_err());
    }

    #[test]
    fn test_malformed_token_rejected() {
        assert!(verify_token("abc", "secret", 0).is_err());
        assert!(verify_token("a.b.c.d", "secret", 0).is_err());
    }

    #[test]
    fn test_authenticate_maps_tutee_to_student() {
        let mut c = claims(None);
        c.user_type = "tutee".to_string();
        let token = sign_token(&c, "secret").unwrap();
        let user = authenticate(&token, "secret").unwrap();
        assert_eq!(user.user_type, UserType::Student);
        assert!(!user.is_tutor());
    }

    #[test]
    fn test_bearer_token() {
        let mut headers = HeaderMap::new();
        assert!(bearer_token(&headers).is_none());
        headers.insert(AUTHORIZATION, "Bearer abc.def.ghi".parse().unwrap());
        assert_eq!(bearer_token(&headers), Some("abc.def.ghi"));
    }
}
