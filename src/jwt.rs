//! Session token handling.
//!
//! Two separate operations live here and must not be confused:
//! [`decode`] reads the claims of a compact token without checking its signature, which is only
//! good enough for deciding what to show a user; [`verify`] checks the HMAC signature and expiry
//! and is the only one whose result can be trusted.

use anyhow::{Context, Result};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Deserializer, Serialize};

pub const DEFAULT_EXPIRY_THRESHOLD_MINUTES: i64 = 5;

/// Claims read from an unverified token. Every field is optional since the source is untrusted,
/// and a claim of the wrong type reads as absent instead of failing the whole payload.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPayload {
    #[serde(default)]
    pub user_id: Option<serde_json::Value>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub role: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub fullname: Option<String>,
    #[serde(default, deserialize_with = "numeric_date")]
    pub exp: Option<i64>,
    #[serde(default, deserialize_with = "numeric_date")]
    pub iat: Option<i64>,
}

fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Some(s),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    })
}

/// Unix seconds; fractional values are floored and out-of-range values saturate.
fn numeric_date<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_u64().map(|_| i64::MAX))
            .or_else(|| n.as_f64().map(|f| f.floor() as i64)),
        _ => None,
    })
}

/// Claims issued by this service at login.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionClaims {
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fullname: Option<String>,
    pub exp: i64,
    pub iat: i64,
}

/// Read the payload segment of a compact token. Returns `None` on any malformed input.
pub fn decode(token: &str) -> Option<TokenPayload> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return None;
    }
    let bytes = URL_SAFE_NO_PAD
        .decode(parts[1].trim_end_matches('='))
        .ok()?;
    let value: serde_json::Value = serde_json::from_slice(&bytes).ok()?;
    if !value.is_object() {
        return None;
    }
    serde_json::from_value(value).ok()
}

pub fn is_valid(token: &str) -> bool {
    is_valid_at(token, now())
}

pub fn is_valid_at(token: &str, now: i64) -> bool {
    match decode(token).and_then(|p| p.exp) {
        Some(exp) => exp > now,
        None => false,
    }
}

/// Undecodable tokens count as expiring.
pub fn is_expiring_soon(token: &str, threshold_minutes: i64) -> bool {
    is_expiring_soon_at(token, threshold_minutes, now())
}

pub fn is_expiring_soon_at(token: &str, threshold_minutes: i64, now: i64) -> bool {
    match decode(token).and_then(|p| p.exp) {
        Some(exp) => exp.saturating_sub(now) < threshold_minutes.saturating_mul(60),
        None => true,
    }
}

/// Seconds until expiry, clamped at zero.
pub fn time_remaining(token: &str) -> i64 {
    time_remaining_at(token, now())
}

pub fn time_remaining_at(token: &str, now: i64) -> i64 {
    decode(token)
        .and_then(|p| p.exp)
        .map(|exp| exp.saturating_sub(now).max(0))
        .unwrap_or(0)
}

pub fn sign(claims: &SessionClaims, secret: &str) -> Result<String> {
    jsonwebtoken::encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .context("Failed to sign session token")
}

pub fn verify(token: &str, secret: &str) -> Result<SessionClaims> {
    let data = jsonwebtoken::decode::<SessionClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .context("Invalid session token")?;
    Ok(data.claims)
}

fn now() -> i64 {
    Utc::now().timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const NOW: i64 = 1_700_000_000;

    fn token_with(payload: serde_json::Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let body = URL_SAFE_NO_PAD.encode(payload.to_string());
        format!("{}.{}.signature", header, body)
    }

    #[test]
    fn test_decode_reads_claims() {
        let token = token_with(json!({
            "userId": 7,
            "email": "a@b.c",
            "role": "admin",
            "fullname": "Ada",
            "exp": NOW + 60,
            "iat": NOW,
        }));
        let payload = decode(&token).unwrap();
        assert_eq!(payload.user_id, Some(json!(7)));
        assert_eq!(payload.role.as_deref(), Some("admin"));
        assert_eq!(payload.exp, Some(NOW + 60));
    }

    #[test]
    fn test_decode_rejects_wrong_segment_count() {
        let token = token_with(json!({ "exp": NOW + 60 }));
        let two = token.rsplitn(2, '.').nth(1).unwrap().to_string();
        assert!(decode(&two).is_none());
        assert!(decode(&format!("{}.extra", token)).is_none());
        assert!(decode("").is_none());
        assert!(!is_valid_at(&two, NOW));
    }

    #[test]
    fn test_decode_rejects_non_json_payload() {
        let body = URL_SAFE_NO_PAD.encode("not json");
        let token = format!("a.{}.c", body);
        assert!(decode(&token).is_none());
        assert!(decode("a.!!!.c").is_none());
        assert!(!is_valid_at(&token, NOW));
    }

    #[test]
    fn test_decode_rejects_non_object_payload() {
        for raw in ["[]", "42", "\"exp\""] {
            let body = URL_SAFE_NO_PAD.encode(raw);
            assert!(decode(&format!("a.{}.c", body)).is_none());
        }
    }

    #[test]
    fn test_decode_tolerates_padding() {
        let body = base64::engine::general_purpose::URL_SAFE.encode(r#"{"exp":12}"#);
        assert!(body.ends_with('='));
        assert_eq!(decode(&format!("a.{}.c", body)).unwrap().exp, Some(12));
    }

    #[test]
    fn test_is_valid_depends_on_exp() {
        assert!(is_valid_at(&token_with(json!({ "exp": NOW + 1 })), NOW));
        assert!(!is_valid_at(&token_with(json!({ "exp": NOW })), NOW));
        assert!(!is_valid_at(&token_with(json!({ "exp": NOW - 10 })), NOW));
        assert!(!is_valid_at(&token_with(json!({ "role": "admin" })), NOW));
    }

    #[test]
    fn test_expiring_soon_threshold() {
        let threshold = DEFAULT_EXPIRY_THRESHOLD_MINUTES;
        assert!(is_expiring_soon_at(&token_with(json!({ "exp": NOW + 299 })), threshold, NOW));
        assert!(!is_expiring_soon_at(&token_with(json!({ "exp": NOW + 300 })), threshold, NOW));
        assert!(!is_expiring_soon_at(&token_with(json!({ "exp": NOW + 3600 })), threshold, NOW));
        assert!(is_expiring_soon_at(&token_with(json!({ "exp": NOW + 3600 })), 61, NOW));
        assert!(is_expiring_soon_at("garbage", threshold, NOW));
    }

    #[test]
    fn test_extreme_exp_does_not_overflow() {
        let past = token_with(json!({ "exp": i64::MIN }));
        assert!(!is_valid_at(&past, NOW));
        assert!(is_expiring_soon_at(&past, DEFAULT_EXPIRY_THRESHOLD_MINUTES, NOW));
        assert_eq!(time_remaining_at(&past, NOW), 0);

        let far = token_with(json!({ "exp": i64::MAX }));
        assert!(is_valid_at(&far, NOW));
        assert!(!is_expiring_soon_at(&far, DEFAULT_EXPIRY_THRESHOLD_MINUTES, NOW));
        assert!(!is_expiring_soon_at(&far, i64::MAX, i64::MIN));
        assert_eq!(time_remaining_at(&far, NOW), i64::MAX - NOW);
        assert_eq!(time_remaining_at(&far, i64::MIN), i64::MAX);
    }

    #[test]
    fn test_decode_floors_fractional_exp() {
        let token = token_with(json!({ "exp": 1_900_000_000.5, "role": "admin" }));
        let payload = decode(&token).unwrap();
        assert_eq!(payload.exp, Some(1_900_000_000));
        assert_eq!(payload.role.as_deref(), Some("admin"));
        assert!(is_valid_at(&token, NOW));
    }

    #[test]
    fn test_decode_tolerates_odd_claim_types() {
        let token = token_with(json!({
            "email": 5,
            "role": ["admin"],
            "fullname": null,
            "iat": "yesterday",
            "exp": NOW + 60,
        }));
        let payload = decode(&token).unwrap();
        assert_eq!(payload.email.as_deref(), Some("5"));
        assert_eq!(payload.role, None);
        assert_eq!(payload.fullname, None);
        assert_eq!(payload.iat, None);
        assert!(is_valid_at(&token, NOW));

        let huge = token_with(json!({ "exp": u64::MAX }));
        assert_eq!(decode(&huge).unwrap().exp, Some(i64::MAX));
    }

    #[test]
    fn test_time_remaining() {
        assert_eq!(time_remaining_at(&token_with(json!({ "exp": NOW + 42 })), NOW), 42);
        assert_eq!(time_remaining_at(&token_with(json!({ "exp": NOW - 42 })), NOW), 0);
        assert_eq!(time_remaining_at("x.y", NOW), 0);
    }

    #[test]
    fn test_sign_then_verify() {
        let now = Utc::now().timestamp();
        let claims = SessionClaims {
            user_id: "admin".to_string(),
            email: Some("admin@example.com".to_string()),
            role: Some("admin".to_string()),
            fullname: None,
            exp: now + 3600,
            iat: now,
        };
        let token = sign(&claims, "secret").unwrap();
        assert_eq!(verify(&token, "secret").unwrap(), claims);
        assert!(verify(&token, "other").is_err());

        // The unverified view sees the same claims.
        let payload = decode(&token).unwrap();
        assert_eq!(payload.role.as_deref(), Some("admin"));
        assert!(is_valid(&token));
    }

    #[test]
    fn test_verify_rejects_expired() {
        let now = Utc::now().timestamp();
        let claims = SessionClaims {
            user_id: "u".to_string(),
            email: None,
            role: None,
            fullname: None,
            exp: now - 3600,
            iat: now - 7200,
        };
        let token = sign(&claims, "secret").unwrap();
        assert!(verify(&token, "secret").is_err());
        assert!(decode(&token).is_some());
    }
}
