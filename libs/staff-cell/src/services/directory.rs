// libs/staff-cell/src/services/directory.rs
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{StaffError, StaffFilter, StaffProfile};

/// Read/write access to the clinic's staff profiles.
///
/// Listings come back in the directory's stable order: earliest
/// verification first, never-verified profiles last, ties broken by id.
#[async_trait]
pub trait StaffDirectory: Send + Sync {
    async fn list_staff(&self, filter: &StaffFilter) -> Result<Vec<StaffProfile>, StaffError>;

    async fn get_staff(&self, staff_id: Uuid) -> Result<StaffProfile, StaffError>;

    async fn set_availability(
        &self,
        staff_id: Uuid,
        is_available: bool,
    ) -> Result<StaffProfile, StaffError>;

    /// Verified, available staff matching the role/specialty filter.
    async fn eligible_staff(&self, filter: &StaffFilter) -> Result<Vec<StaffProfile>, StaffError> {
        let filter = StaffFilter {
            eligible_only: true,
            ..filter.clone()
        };
        let staff = self.list_staff(&filter).await?;
        Ok(staff.into_iter().filter(|s| s.is_eligible(&filter)).collect())
    }
}

pub fn directory_order(a: &StaffProfile, b: &StaffProfile) -> std::cmp::Ordering {
    let by_verification = match (a.verified_at, b.verified_at) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    };
    by_verification.then_with(|| a.id.cmp(&b.id))
}

// ==============================================================================
// IN-MEMORY DIRECTORY
// ==============================================================================

#[derive(Default)]
pub struct InMemoryStaffDirectory {
    staff: RwLock<Vec<StaffProfile>>,
}

impl InMemoryStaffDirectory {
    pub fn new(staff: Vec<StaffProfile>) -> Self {
        Self {
            staff: RwLock::new(staff),
        }
    }
}

#[async_trait]
impl StaffDirectory for InMemoryStaffDirectory {
    async fn list_staff(&self, filter: &StaffFilter) -> Result<Vec<StaffProfile>, StaffError> {
        let staff = self.staff.read().await;
        let mut listed: Vec<StaffProfile> = staff
            .iter()
            .filter(|s| s.matches(filter))
            .filter(|s| !filter.eligible_only || s.is_bookable())
            .cloned()
            .collect();
        listed.sort_by(directory_order);
        Ok(listed)
    }

    async fn get_staff(&self, staff_id: Uuid) -> Result<StaffProfile, StaffError> {
        let staff = self.staff.read().await;
        staff
            .iter()
            .find(|s| s.id == staff_id)
            .cloned()
            .ok_or(StaffError::NotFound)
    }

    async fn set_availability(
        &self,
        staff_id: Uuid,
        is_available: bool,
    ) -> Result<StaffProfile, StaffError> {
        let mut staff = self.staff.write().await;
        let profile = staff
            .iter_mut()
            .find(|s| s.id == staff_id)
            .ok_or(StaffError::NotFound)?;
        profile.is_available = is_available;
        info!("Staff {} availability set to {}", staff_id, is_available);
        Ok(profile.clone())
    }
}

// ==============================================================================
// SUPABASE DIRECTORY
// ==============================================================================

pub struct SupabaseStaffDirectory {
    supabase: SupabaseClient,
}

impl SupabaseStaffDirectory {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::with_service_role(config),
        }
    }

    fn list_path(filter: &StaffFilter) -> String {
        let mut path = "/rest/v1/staff_profiles?select=*".to_string();

        if filter.eligible_only {
            path.push_str("&is_verified=eq.true&is_available=eq.true");
        }
        if let Some(role) = filter.role.as_deref() {
            path.push_str(&format!("&role=ilike.{}", urlencoding::encode(role.trim())));
        }
        if let Some(specialty) = filter.specialty.as_deref() {
            path.push_str(&format!("&specialty=ilike.{}", urlencoding::encode(specialty.trim())));
        }

        path.push_str("&order=verified_at.asc.nullslast,id.asc");
        path
    }

    fn parse_rows(rows: Vec<Value>) -> Result<Vec<StaffProfile>, StaffError> {
        rows.into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<StaffProfile>, _>>()
            .map_err(|e| StaffError::DatabaseError(format!("Failed to parse staff profile: {}", e)))
    }
}

#[async_trait]
impl StaffDirectory for SupabaseStaffDirectory {
    async fn list_staff(&self, filter: &StaffFilter) -> Result<Vec<StaffProfile>, StaffError> {
        let path = Self::list_path(filter);
        debug!("Listing staff with filter {:?}", filter);

        let rows: Vec<Value> = self.supabase
            .request(Method::GET, &path, None, None)
            .await
            .map_err(|e| StaffError::DatabaseError(e.to_string()))?;

        let mut staff = Self::parse_rows(rows)?;
        // ilike without wildcards is a case-insensitive equality, re-check locally anyway
        staff.retain(|s| s.matches(filter));
        staff.sort_by(directory_order);
        Ok(staff)
    }

    async fn get_staff(&self, staff_id: Uuid) -> Result<StaffProfile, StaffError> {
        let path = format!("/rest/v1/staff_profiles?id=eq.{}", staff_id);

        let rows: Vec<Value> = self.supabase
            .request(Method::GET, &path, None, None)
            .await
            .map_err(|e| StaffError::DatabaseError(e.to_string()))?;

        Self::parse_rows(rows)?
            .into_iter()
            .next()
            .ok_or(StaffError::NotFound)
    }

    async fn set_availability(
        &self,
        staff_id: Uuid,
        is_available: bool,
    ) -> Result<StaffProfile, StaffError> {
        let path = format!("/rest/v1/staff_profiles?id=eq.{}", staff_id);
        let body = json!({
            "is_available": is_available,
            "updated_at": Utc::now().to_rfc3339(),
        });

        let rows: Vec<Value> = self.supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                None,
                Some(body),
                Some(SupabaseClient::return_representation()),
            )
            .await
            .map_err(|e| StaffError::DatabaseError(e.to_string()))?;

        let profile = Self::parse_rows(rows)?
            .into_iter()
            .next()
            .ok_or(StaffError::NotFound)?;

        info!("Staff {} availability set to {}", staff_id, is_available);
        Ok(profile)
    }
}
