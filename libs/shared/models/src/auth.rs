use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtHeader {
    pub alg: String,
    pub typ: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: String,
    pub exp: Option<u64>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub app_metadata: Option<serde_json::Value>,
    pub user_metadata: Option<serde_json::Value>,
    pub aud: Option<String>,
    pub iat: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    pub role: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn has_role(&self, role: &str) -> bool {
        self.role
            .as_deref()
            .map(|r| r.eq_ignore_ascii_case(role))
            .unwrap_or(false)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role("admin")
    }

    /// Clinic staff tokens carry their job role (doctor, nurse, ...) or the generic "staff".
    pub fn is_staff(&self) -> bool {
        matches!(
            self.role.as_deref().map(str::to_ascii_lowercase).as_deref(),
            Some("staff") | Some("doctor") | Some("nurse") | Some("therapist")
        )
    }
}
