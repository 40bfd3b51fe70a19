// libs/appointment-cell/src/models.rs
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::fmt;

use shared_models::auth::User;
use staff_cell::models::{StaffError, StaffFilter};

/// `start + minutes`, saturating at the latest representable instant for
/// durations read back from storage that do not fit.
fn end_after(start: DateTime<Utc>, minutes: i64) -> DateTime<Utc> {
    Duration::try_minutes(minutes)
        .and_then(|d| start.checked_add_signed(d))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub staff_id: Option<Uuid>,
    pub appointment_date: DateTime<Utc>,
    pub duration_minutes: i64,
    pub status: AppointmentStatus,
    pub reason: Option<String>,
    #[serde(default)]
    pub symptoms: Vec<String>,
    pub cancellation_reason: Option<String>,
    pub created_by: Uuid,
    pub rescheduled_from: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    pub fn end_time(&self) -> DateTime<Utc> {
        end_after(self.appointment_date, self.duration_minutes)
    }

    /// Half-open overlap with `[start, end)`.
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.appointment_date < end && start < self.end_time()
    }

    /// True when this appointment blocks its staff member's time.
    pub fn occupies_slot(&self) -> bool {
        self.status.occupies_slot()
    }

    /// Conversation key handed to messaging once a staff member is bound.
    pub fn room_key(&self) -> Option<RoomKey> {
        self.staff_id.map(|staff_id| RoomKey {
            patient_id: self.patient_id,
            staff_id,
        })
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Pending,
    Approved,
    Confirmed,
    Completed,
    Cancelled,
    NoShow,
    Rescheduled,
}

impl AppointmentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::Completed | AppointmentStatus::Cancelled | AppointmentStatus::NoShow
        )
    }

    /// Cancelled rows and rows superseded by a reschedule release their time.
    pub fn occupies_slot(&self) -> bool {
        !matches!(self, AppointmentStatus::Cancelled | AppointmentStatus::Rescheduled)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Pending => write!(f, "pending"),
            AppointmentStatus::Approved => write!(f, "approved"),
            AppointmentStatus::Confirmed => write!(f, "confirmed"),
            AppointmentStatus::Completed => write!(f, "completed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
            AppointmentStatus::NoShow => write!(f, "no_show"),
            AppointmentStatus::Rescheduled => write!(f, "rescheduled"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct RoomKey {
    pub patient_id: Uuid,
    pub staff_id: Uuid,
}

/// An appointment row before the store assigns id and timestamps.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewAppointment {
    pub patient_id: Uuid,
    pub staff_id: Uuid,
    pub appointment_date: DateTime<Utc>,
    pub duration_minutes: i64,
    pub status: AppointmentStatus,
    pub reason: Option<String>,
    pub symptoms: Vec<String>,
    pub created_by: Uuid,
    pub rescheduled_from: Option<Uuid>,
}

impl NewAppointment {
    pub fn end_time(&self) -> DateTime<Utc> {
        end_after(self.appointment_date, self.duration_minutes)
    }

    pub fn into_appointment(self, id: Uuid, now: DateTime<Utc>) -> Appointment {
        Appointment {
            id,
            patient_id: self.patient_id,
            staff_id: Some(self.staff_id),
            appointment_date: self.appointment_date,
            duration_minutes: self.duration_minutes,
            status: self.status,
            reason: self.reason,
            symptoms: self.symptoms,
            cancellation_reason: None,
            created_by: self.created_by,
            rescheduled_from: self.rescheduled_from,
            created_at: now,
            updated_at: now,
        }
    }
}

/// An appointment as seen by one caller, with the actions open to them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppointmentDetails {
    pub appointment: Appointment,
    pub allowed_actions: Vec<String>,
    pub room_key: Option<RoomKey>,
}

/// Conditional status write: applied only while the row still has the expected status.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    pub status: AppointmentStatus,
    pub cancellation_reason: Option<String>,
}

// ==============================================================================
// SLOTS
// ==============================================================================

/// Candidate start time; computed per request, never stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Slot {
    pub start_time: DateTime<Utc>,
    pub duration_minutes: i64,
    pub available: bool,
    #[serde(default)]
    pub free_staff: Vec<Uuid>,
}

impl Slot {
    pub fn new(start_time: DateTime<Utc>, duration_minutes: i64) -> Self {
        Self {
            start_time,
            duration_minutes,
            available: false,
            free_staff: Vec::new(),
        }
    }

    pub fn end_time(&self) -> DateTime<Utc> {
        end_after(self.start_time, self.duration_minutes)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClinicAvailability {
    pub date: NaiveDate,
    pub duration_minutes: i64,
    pub eligible_staff: usize,
    pub slots: Vec<Slot>,
}

// ==============================================================================
// ACTORS AND ACTIONS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    Patient,
    Staff,
    Admin,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Actor {
    pub id: Uuid,
    pub role: ActorRole,
}

impl Actor {
    pub fn patient(id: Uuid) -> Self {
        Self { id, role: ActorRole::Patient }
    }

    pub fn staff(id: Uuid) -> Self {
        Self { id, role: ActorRole::Staff }
    }

    pub fn admin(id: Uuid) -> Self {
        Self { id, role: ActorRole::Admin }
    }

    pub fn from_user(user: &User) -> Result<Self, SchedulingError> {
        let id = Uuid::parse_str(&user.id)
            .map_err(|_| SchedulingError::Validation(format!("Invalid user id: {}", user.id)))?;

        let role = if user.is_admin() {
            ActorRole::Admin
        } else if user.is_staff() {
            ActorRole::Staff
        } else {
            ActorRole::Patient
        };

        Ok(Self { id, role })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum AppointmentAction {
    Approve,
    Confirm,
    Cancel {
        reason: String,
    },
    Complete,
    NoShow,
    Reschedule {
        new_date: DateTime<Utc>,
        duration_minutes: Option<i64>,
        reason: Option<String>,
    },
}

impl AppointmentAction {
    pub fn name(&self) -> &'static str {
        match self {
            AppointmentAction::Approve => "approve",
            AppointmentAction::Confirm => "confirm",
            AppointmentAction::Cancel { .. } => "cancel",
            AppointmentAction::Complete => "complete",
            AppointmentAction::NoShow => "no_show",
            AppointmentAction::Reschedule { .. } => "reschedule",
        }
    }
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoAssignRequest {
    pub patient_id: Uuid,
    pub appointment_date: DateTime<Utc>,
    pub duration_minutes: Option<i64>,
    pub role: Option<String>,
    pub specialty: Option<String>,
    pub reason: Option<String>,
    #[serde(default)]
    pub symptoms: Vec<String>,
}

impl AutoAssignRequest {
    pub fn filter(&self) -> StaffFilter {
        StaffFilter::eligible(self.role.clone(), self.specialty.clone())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalkInRequest {
    pub patient_id: Uuid,
    /// Defaults to the registering staff member.
    pub staff_id: Option<Uuid>,
    pub appointment_date: DateTime<Utc>,
    pub duration_minutes: Option<i64>,
    pub reason: Option<String>,
    #[serde(default)]
    pub symptoms: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotQuery {
    pub date: NaiveDate,
    pub duration_minutes: Option<i64>,
    pub role: Option<String>,
    pub specialty: Option<String>,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, thiserror::Error)]
pub enum SchedulingError {
    #[error("Invalid slot: {0}")]
    InvalidSlot(String),

    #[error("No staff member available at the requested time")]
    NoStaffAvailable,

    #[error("Cannot {action} an appointment that is {from}")]
    InvalidTransition {
        from: AppointmentStatus,
        action: String,
    },

    #[error("{0} not found")]
    NotFound(String),

    #[error("Not allowed: {0}")]
    Unauthorized(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<StaffError> for SchedulingError {
    fn from(error: StaffError) -> Self {
        match error {
            StaffError::NotFound => SchedulingError::NotFound("Staff member".to_string()),
            StaffError::Unauthorized => SchedulingError::Unauthorized(error.to_string()),
            StaffError::DatabaseError(msg) => SchedulingError::Database(msg),
        }
    }
}
