use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, TimeZone, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::debug;

use shared_models::auth::{JwtClaims, JwtHeader, User};

type HmacSha256 = Hmac<Sha256>;

pub fn validate_token(token: &str, jwt_secret: &str) -> Result<User, String> {
    validate_token_at(token, jwt_secret, Utc::now())
}

/// Validates an HS256 Supabase access token against `now`.
pub fn validate_token_at(token: &str, jwt_secret: &str, now: DateTime<Utc>) -> Result<User, String> {
    if jwt_secret.is_empty() {
        return Err("JWT secret is not set".to_string());
    }

    let parts: Vec<&str> = token.split('.').collect();
    let [header_b64, claims_b64, signature_b64] = parts.as_slice() else {
        return Err("Invalid token format".to_string());
    };

    let header: JwtHeader = URL_SAFE_NO_PAD
        .decode(header_b64)
        .ok()
        .and_then(|bytes| serde_json::from_slice(&bytes).ok())
        .ok_or_else(|| "Invalid token header".to_string())?;
    if header.alg != "HS256" {
        return Err(format!("Unsupported token algorithm: {}", header.alg));
    }

    verify_signature(header_b64, claims_b64, signature_b64, jwt_secret)?;

    let claims_json = URL_SAFE_NO_PAD
        .decode(claims_b64)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .ok_or_else(|| "Invalid claims encoding".to_string())?;

    let claims: JwtClaims = serde_json::from_str(&claims_json).map_err(|e| {
        debug!("Failed to parse claims: {}", e);
        "Invalid claims format".to_string()
    })?;

    if let Some(exp) = claims.exp {
        let now_secs = now.timestamp().max(0) as u64;
        if exp < now_secs {
            debug!("Token expired at {} (now: {})", exp, now_secs);
            return Err("Token expired".to_string());
        }
    }

    let created_at = claims
        .iat
        .and_then(|timestamp| Utc.timestamp_opt(timestamp as i64, 0).single());

    let user = User {
        id: claims.sub,
        email: claims.email,
        role: claims.role,
        metadata: claims.user_metadata,
        created_at,
    };

    debug!("Token validated for user: {}", user.id);
    Ok(user)
}

fn verify_signature(
    header_b64: &str,
    claims_b64: &str,
    signature_b64: &str,
    jwt_secret: &str,
) -> Result<(), String> {
    let signature = URL_SAFE_NO_PAD.decode(signature_b64).map_err(|e| {
        debug!("Failed to decode signature: {}", e);
        "Invalid signature encoding".to_string()
    })?;

    let mut mac = HmacSha256::new_from_slice(jwt_secret.as_bytes())
        .map_err(|_| "Failed to create HMAC".to_string())?;
    mac.update(format!("{}.{}", header_b64, claims_b64).as_bytes());

    mac.verify_slice(&signature).map_err(|_| {
        debug!("Token signature verification failed");
        "Invalid token signature".to_string()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{JwtTestUtils, TestUser};

    const SECRET: &str = "unit-test-secret";

    #[test]
    fn round_trips_claims_into_user() {
        let staff = TestUser::staff("nurse@example.com");
        let token = JwtTestUtils::create_test_token(&staff, SECRET, Some(1));

        let user = validate_token(&token, SECRET).unwrap();
        assert_eq!(user.id, staff.id);
        assert_eq!(user.role.as_deref(), Some("staff"));
        assert!(user.created_at.is_some());
    }

    #[test]
    fn rejects_expired_and_malformed_tokens() {
        let user = TestUser::default();
        let expired = JwtTestUtils::create_expired_token(&user, SECRET);
        assert_eq!(validate_token(&expired, SECRET).unwrap_err(), "Token expired");

        let malformed = JwtTestUtils::create_malformed_token();
        assert!(validate_token(&malformed, SECRET).is_err());
        assert_eq!(validate_token("only.two", SECRET).unwrap_err(), "Invalid token format");
    }

    #[test]
    fn empty_secret_is_rejected() {
        let token = JwtTestUtils::create_test_token(&TestUser::default(), SECRET, None);
        assert_eq!(validate_token(&token, "").unwrap_err(), "JWT secret is not set");
    }
}
