// libs/staff-cell/src/models.rs
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StaffProfile {
    pub id: Uuid,
    pub full_name: String,
    pub role: String,
    pub specialty: Option<String>,
    pub is_available: bool,
    pub is_verified: bool,
    pub verified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl StaffProfile {
    /// Verified and currently taking appointments.
    pub fn is_bookable(&self) -> bool {
        self.is_verified && self.is_available
    }

    pub fn matches(&self, filter: &StaffFilter) -> bool {
        let role_ok = filter
            .role
            .as_deref()
            .map(|role| self.role.eq_ignore_ascii_case(role.trim()))
            .unwrap_or(true);

        let specialty_ok = filter
            .specialty
            .as_deref()
            .map(|wanted| {
                self.specialty
                    .as_deref()
                    .map(|s| s.eq_ignore_ascii_case(wanted.trim()))
                    .unwrap_or(false)
            })
            .unwrap_or(true);

        role_ok && specialty_ok
    }

    pub fn is_eligible(&self, filter: &StaffFilter) -> bool {
        self.is_bookable() && self.matches(filter)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StaffFilter {
    pub role: Option<String>,
    pub specialty: Option<String>,
    #[serde(default)]
    pub eligible_only: bool,
}

impl StaffFilter {
    pub fn eligible(role: Option<String>, specialty: Option<String>) -> Self {
        Self {
            role: role.filter(|r| !r.trim().is_empty()),
            specialty: specialty.filter(|s| !s.trim().is_empty()),
            eligible_only: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaffSearchQuery {
    pub role: Option<String>,
    pub specialty: Option<String>,
    pub eligible_only: Option<bool>,
}

impl From<StaffSearchQuery> for StaffFilter {
    fn from(query: StaffSearchQuery) -> Self {
        Self {
            role: query.role,
            specialty: query.specialty,
            eligible_only: query.eligible_only.unwrap_or(false),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateStaffAvailabilityRequest {
    pub is_available: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
pub enum StaffError {
    #[error("Staff member not found")]
    NotFound,

    #[error("Not allowed to modify this staff profile")]
    Unauthorized,

    #[error("Database error: {0}")]
    DatabaseError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nurse() -> StaffProfile {
        StaffProfile {
            id: Uuid::new_v4(),
            full_name: "Ada Obi".to_string(),
            role: "nurse".to_string(),
            specialty: Some("Pediatrics".to_string()),
            is_available: true,
            is_verified: true,
            verified_at: Some(Utc::now()),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn filter_matching_ignores_case() {
        let staff = nurse();
        assert!(staff.matches(&StaffFilter::eligible(Some("Nurse".into()), None)));
        assert!(staff.matches(&StaffFilter::eligible(None, Some("pediatrics".into()))));
        assert!(!staff.matches(&StaffFilter::eligible(Some("doctor".into()), None)));
        assert!(!staff.matches(&StaffFilter::eligible(None, Some("cardiology".into()))));
    }

    #[test]
    fn blank_filter_values_are_dropped() {
        let filter = StaffFilter::eligible(Some("  ".into()), Some(String::new()));
        assert_eq!(filter.role, None);
        assert_eq!(filter.specialty, None);
        assert!(nurse().is_eligible(&filter));
    }

    #[test]
    fn unverified_or_unavailable_staff_are_not_eligible() {
        let mut staff = nurse();
        staff.is_verified = false;
        assert!(!staff.is_eligible(&StaffFilter::default()));

        let mut staff = nurse();
        staff.is_available = false;
        assert!(!staff.is_eligible(&StaffFilter::default()));
    }

    #[test]
    fn specialty_filter_excludes_staff_without_specialty() {
        let mut staff = nurse();
        staff.specialty = None;
        assert!(!staff.matches(&StaffFilter::eligible(None, Some("pediatrics".into()))));
    }
}
