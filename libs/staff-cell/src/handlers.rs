use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{StaffError, StaffFilter, StaffSearchQuery, UpdateStaffAvailabilityRequest};
use crate::services::StaffDirectory;

#[derive(Clone)]
pub struct StaffCellState {
    pub config: Arc<AppConfig>,
    pub directory: Arc<dyn StaffDirectory>,
}

impl StaffCellState {
    pub fn new(config: Arc<AppConfig>, directory: Arc<dyn StaffDirectory>) -> Self {
        Self { config, directory }
    }
}

fn map_staff_error(e: StaffError) -> AppError {
    match e {
        StaffError::NotFound => AppError::NotFound("Staff member not found".to_string()),
        StaffError::Unauthorized => AppError::Forbidden(e.to_string()),
        StaffError::DatabaseError(msg) => AppError::Database(msg),
    }
}

pub async fn list_staff(
    State(state): State<StaffCellState>,
    Query(query): Query<StaffSearchQuery>,
) -> Result<Json<Value>, AppError> {
    let filter = StaffFilter::from(query);
    let staff = state.directory.list_staff(&filter).await.map_err(map_staff_error)?;

    Ok(Json(json!({
        "staff": staff,
        "total": staff.len()
    })))
}

pub async fn get_staff(
    State(state): State<StaffCellState>,
    Path(staff_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let profile = state.directory.get_staff(staff_id).await.map_err(map_staff_error)?;
    Ok(Json(json!(profile)))
}

/// Staff toggle their own `is_available` flag; admins may toggle anyone's.
pub async fn update_staff_availability(
    State(state): State<StaffCellState>,
    Path(staff_id): Path<Uuid>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateStaffAvailabilityRequest>,
) -> Result<Json<Value>, AppError> {
    let is_self = user.id == staff_id.to_string() && user.is_staff();
    if !is_self && !user.is_admin() {
        return Err(map_staff_error(StaffError::Unauthorized));
    }

    let profile = state.directory
        .set_availability(staff_id, request.is_available)
        .await
        .map_err(map_staff_error)?;

    info!("User {} set availability of staff {} to {}", user.id, staff_id, request.is_available);

    Ok(Json(json!({
        "success": true,
        "staff": profile
    })))
}
