// libs/appointment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{Actor, AppointmentAction, AutoAssignRequest, SchedulingError, SlotQuery, WalkInRequest};
use crate::services::SchedulingService;

#[derive(Clone)]
pub struct AppointmentCellState {
    pub config: Arc<AppConfig>,
    pub scheduling: Arc<SchedulingService>,
}

impl AppointmentCellState {
    pub fn new(config: Arc<AppConfig>, scheduling: Arc<SchedulingService>) -> Self {
        Self { config, scheduling }
    }
}

#[derive(Debug, Deserialize)]
pub struct QueueQuery {
    /// Admins may look at any staff member's queue.
    pub staff_id: Option<Uuid>,
}

pub fn map_scheduling_error(e: SchedulingError) -> AppError {
    match e {
        SchedulingError::InvalidSlot(_) => AppError::BadRequest(e.to_string()),
        SchedulingError::Validation(msg) => AppError::ValidationError(msg),
        SchedulingError::NoStaffAvailable | SchedulingError::InvalidTransition { .. } => {
            AppError::Conflict(e.to_string())
        }
        SchedulingError::NotFound(_) => AppError::NotFound(e.to_string()),
        SchedulingError::Unauthorized(msg) => AppError::Forbidden(msg),
        SchedulingError::Database(msg) => AppError::Database(msg),
    }
}

fn actor_for(user: &User) -> Result<Actor, AppError> {
    Actor::from_user(user).map_err(map_scheduling_error)
}

// ==============================================================================
// SLOT HANDLERS
// ==============================================================================

pub async fn get_available_slots(
    State(state): State<AppointmentCellState>,
    Query(query): Query<SlotQuery>,
) -> Result<Json<Value>, AppError> {
    let availability = state.scheduling
        .clinic_availability(query)
        .await
        .map_err(map_scheduling_error)?;

    Ok(Json(json!(availability)))
}

// ==============================================================================
// BOOKING HANDLERS
// ==============================================================================

pub async fn auto_assign_appointment(
    State(state): State<AppointmentCellState>,
    Extension(user): Extension<User>,
    Json(request): Json<AutoAssignRequest>,
) -> Result<Json<Value>, AppError> {
    let actor = actor_for(&user)?;

    let appointment = state.scheduling
        .auto_assign(request, &actor, Utc::now())
        .await
        .map_err(map_scheduling_error)?;

    info!("User {} booked appointment {}", user.id, appointment.id);

    Ok(Json(json!({
        "success": true,
        "room_key": appointment.room_key(),
        "appointment": appointment,
        "message": "Appointment booked and awaiting staff approval"
    })))
}

pub async fn register_walk_in(
    State(state): State<AppointmentCellState>,
    Extension(user): Extension<User>,
    Json(request): Json<WalkInRequest>,
) -> Result<Json<Value>, AppError> {
    let actor = actor_for(&user)?;

    let appointment = state.scheduling
        .register_walk_in(request, &actor, Utc::now())
        .await
        .map_err(map_scheduling_error)?;

    Ok(Json(json!({
        "success": true,
        "room_key": appointment.room_key(),
        "appointment": appointment
    })))
}

// ==============================================================================
// LIFECYCLE HANDLERS
// ==============================================================================

pub async fn transition_appointment(
    State(state): State<AppointmentCellState>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
    Json(action): Json<AppointmentAction>,
) -> Result<Json<Value>, AppError> {
    let actor = actor_for(&user)?;
    let action_name = action.name();

    let appointment = state.scheduling
        .transition(appointment_id, action, &actor, Utc::now())
        .await
        .map_err(map_scheduling_error)?;

    Ok(Json(json!({
        "success": true,
        "action": action_name,
        "appointment": appointment
    })))
}

pub async fn get_appointment(
    State(state): State<AppointmentCellState>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let actor = actor_for(&user)?;

    let details = state.scheduling
        .get_appointment(appointment_id, &actor, Utc::now())
        .await
        .map_err(map_scheduling_error)?;

    Ok(Json(json!(details)))
}

// ==============================================================================
// LISTING HANDLERS
// ==============================================================================

pub async fn get_my_appointments(
    State(state): State<AppointmentCellState>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let actor = actor_for(&user)?;

    let appointments = state.scheduling
        .patient_appointments(actor.id)
        .await
        .map_err(map_scheduling_error)?;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len()
    })))
}

pub async fn get_staff_queue(
    State(state): State<AppointmentCellState>,
    Query(query): Query<QueueQuery>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let actor = actor_for(&user)?;
    let staff_id = query.staff_id.unwrap_or(actor.id);

    let queue = state.scheduling
        .staff_queue(staff_id, &actor, Utc::now())
        .await
        .map_err(map_scheduling_error)?;

    Ok(Json(json!({
        "staff_id": staff_id,
        "appointments": queue,
        "total": queue.len()
    })))
}
