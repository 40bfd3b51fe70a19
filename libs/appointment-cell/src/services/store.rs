// libs/appointment-cell/src/services/store.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{Appointment, AppointmentStatus, NewAppointment, SchedulingError, StatusUpdate};
use crate::services::availability::staff_is_free;

/// Persistence for appointments. The two write operations are the atomic
/// units of the scheduling core:
///
/// * `insert_if_free` checks the staff member's occupying appointments and
///   inserts in one step, returning `None` when the range is taken.
/// * `update_status` writes only while the row still has `expected` status,
///   returning `None` when it does not (or the row is missing).
#[async_trait]
pub trait AppointmentStore: Send + Sync {
    async fn get(&self, appointment_id: Uuid) -> Result<Option<Appointment>, SchedulingError>;

    /// Appointments of any status for `staff_ids` starting in `[from, to)`.
    async fn list_for_staff(
        &self,
        staff_ids: &[Uuid],
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Appointment>, SchedulingError>;

    /// Occupying appointments of one staff member starting at or after `from`.
    async fn list_upcoming_for_staff(
        &self,
        staff_id: Uuid,
        from: DateTime<Utc>,
    ) -> Result<Vec<Appointment>, SchedulingError>;

    async fn list_for_patient(&self, patient_id: Uuid) -> Result<Vec<Appointment>, SchedulingError>;

    async fn insert_if_free(
        &self,
        draft: NewAppointment,
        ignore: Option<Uuid>,
    ) -> Result<Option<Appointment>, SchedulingError>;

    async fn update_status(
        &self,
        appointment_id: Uuid,
        expected: AppointmentStatus,
        update: StatusUpdate,
    ) -> Result<Option<Appointment>, SchedulingError>;
}

// ==============================================================================
// IN-MEMORY STORE
// ==============================================================================

/// Single-process store. One mutex guards every row, so the overlap check
/// and the insert in `insert_if_free` cannot interleave with another write.
#[derive(Default)]
pub struct InMemoryAppointmentStore {
    appointments: Mutex<Vec<Appointment>>,
}

impl InMemoryAppointmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_appointments(appointments: Vec<Appointment>) -> Self {
        Self {
            appointments: Mutex::new(appointments),
        }
    }

    pub async fn all(&self) -> Vec<Appointment> {
        self.appointments.lock().await.clone()
    }
}

#[async_trait]
impl AppointmentStore for InMemoryAppointmentStore {
    async fn get(&self, appointment_id: Uuid) -> Result<Option<Appointment>, SchedulingError> {
        let appointments = self.appointments.lock().await;
        Ok(appointments.iter().find(|a| a.id == appointment_id).cloned())
    }

    async fn list_for_staff(
        &self,
        staff_ids: &[Uuid],
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        let appointments = self.appointments.lock().await;
        let mut listed: Vec<Appointment> = appointments
            .iter()
            .filter(|a| a.staff_id.map(|id| staff_ids.contains(&id)).unwrap_or(false))
            .filter(|a| a.appointment_date >= from && a.appointment_date < to)
            .cloned()
            .collect();
        listed.sort_by_key(|a| a.appointment_date);
        Ok(listed)
    }

    async fn list_upcoming_for_staff(
        &self,
        staff_id: Uuid,
        from: DateTime<Utc>,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        let appointments = self.appointments.lock().await;
        let mut listed: Vec<Appointment> = appointments
            .iter()
            .filter(|a| a.staff_id == Some(staff_id) && a.occupies_slot() && a.appointment_date >= from)
            .cloned()
            .collect();
        listed.sort_by_key(|a| a.appointment_date);
        Ok(listed)
    }

    async fn list_for_patient(&self, patient_id: Uuid) -> Result<Vec<Appointment>, SchedulingError> {
        let appointments = self.appointments.lock().await;
        let mut listed: Vec<Appointment> = appointments
            .iter()
            .filter(|a| a.patient_id == patient_id)
            .cloned()
            .collect();
        listed.sort_by_key(|a| a.appointment_date);
        Ok(listed)
    }

    async fn insert_if_free(
        &self,
        draft: NewAppointment,
        ignore: Option<Uuid>,
    ) -> Result<Option<Appointment>, SchedulingError> {
        let mut appointments = self.appointments.lock().await;

        if !staff_is_free(draft.staff_id, draft.appointment_date, draft.end_time(), &appointments, ignore) {
            debug!("Staff {} already booked at {}", draft.staff_id, draft.appointment_date);
            return Ok(None);
        }

        let appointment = draft.into_appointment(Uuid::new_v4(), Utc::now());
        appointments.push(appointment.clone());
        Ok(Some(appointment))
    }

    async fn update_status(
        &self,
        appointment_id: Uuid,
        expected: AppointmentStatus,
        update: StatusUpdate,
    ) -> Result<Option<Appointment>, SchedulingError> {
        let mut appointments = self.appointments.lock().await;

        let Some(appointment) = appointments
            .iter_mut()
            .find(|a| a.id == appointment_id && a.status == expected)
        else {
            return Ok(None);
        };

        appointment.status = update.status;
        if update.cancellation_reason.is_some() {
            appointment.cancellation_reason = update.cancellation_reason;
        }
        appointment.updated_at = Utc::now();
        Ok(Some(appointment.clone()))
    }
}

// ==============================================================================
// SUPABASE STORE
// ==============================================================================

/// Store backed by the hosted Postgres. Conflict-free insertion is done by
/// the `book_appointment_if_free` function (see `sql/`), which takes a
/// per-staff transaction lock before its overlap check.
pub struct SupabaseAppointmentStore {
    supabase: SupabaseClient,
}

impl SupabaseAppointmentStore {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::with_service_role(config),
        }
    }

    fn encode_time(time: DateTime<Utc>) -> String {
        urlencoding::encode(&time.to_rfc3339()).into_owned()
    }

    fn parse_rows(rows: Vec<Value>) -> Result<Vec<Appointment>, SchedulingError> {
        rows.into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Appointment>, _>>()
            .map_err(|e| SchedulingError::Database(format!("Failed to parse appointment: {}", e)))
    }

    async fn fetch(&self, path: &str) -> Result<Vec<Appointment>, SchedulingError> {
        let rows: Vec<Value> = self.supabase
            .request(Method::GET, path, None, None)
            .await
            .map_err(|e| SchedulingError::Database(e.to_string()))?;
        Self::parse_rows(rows)
    }
}

#[async_trait]
impl AppointmentStore for SupabaseAppointmentStore {
    async fn get(&self, appointment_id: Uuid) -> Result<Option<Appointment>, SchedulingError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        Ok(self.fetch(&path).await?.into_iter().next())
    }

    async fn list_for_staff(
        &self,
        staff_ids: &[Uuid],
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        if staff_ids.is_empty() {
            return Ok(Vec::new());
        }

        let ids = staff_ids
            .iter()
            .map(Uuid::to_string)
            .collect::<Vec<_>>()
            .join(",");
        let path = format!(
            "/rest/v1/appointments?staff_id=in.({})&appointment_date=gte.{}&appointment_date=lt.{}&order=appointment_date.asc",
            ids,
            Self::encode_time(from),
            Self::encode_time(to)
        );

        self.fetch(&path).await
    }

    async fn list_upcoming_for_staff(
        &self,
        staff_id: Uuid,
        from: DateTime<Utc>,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        let path = format!(
            "/rest/v1/appointments?staff_id=eq.{}&appointment_date=gte.{}&status=not.in.(cancelled,rescheduled)&order=appointment_date.asc",
            staff_id,
            Self::encode_time(from)
        );
        self.fetch(&path).await
    }

    async fn list_for_patient(&self, patient_id: Uuid) -> Result<Vec<Appointment>, SchedulingError> {
        let path = format!(
            "/rest/v1/appointments?patient_id=eq.{}&order=appointment_date.asc",
            patient_id
        );
        self.fetch(&path).await
    }

    async fn insert_if_free(
        &self,
        draft: NewAppointment,
        ignore: Option<Uuid>,
    ) -> Result<Option<Appointment>, SchedulingError> {
        let args = json!({
            "p_patient_id": draft.patient_id,
            "p_staff_id": draft.staff_id,
            "p_appointment_date": draft.appointment_date.to_rfc3339(),
            "p_duration_minutes": draft.duration_minutes,
            "p_status": draft.status.to_string(),
            "p_reason": draft.reason,
            "p_symptoms": draft.symptoms,
            "p_created_by": draft.created_by,
            "p_rescheduled_from": draft.rescheduled_from,
            "p_ignore_appointment": ignore,
        });

        let rows: Vec<Value> = self.supabase
            .rpc("book_appointment_if_free", args)
            .await
            .map_err(|e| SchedulingError::Database(e.to_string()))?;

        let created = Self::parse_rows(rows)?.into_iter().next();
        match &created {
            Some(appointment) => info!("Booked appointment {} for staff {}", appointment.id, draft.staff_id),
            None => warn!("Staff {} already booked at {}", draft.staff_id, draft.appointment_date),
        }
        Ok(created)
    }

    async fn update_status(
        &self,
        appointment_id: Uuid,
        expected: AppointmentStatus,
        update: StatusUpdate,
    ) -> Result<Option<Appointment>, SchedulingError> {
        let path = format!(
            "/rest/v1/appointments?id=eq.{}&status=eq.{}",
            appointment_id, expected
        );

        let mut body = json!({
            "status": update.status.to_string(),
            "updated_at": Utc::now().to_rfc3339(),
        });
        if let Some(reason) = update.cancellation_reason {
            body["cancellation_reason"] = json!(reason);
        }

        let rows: Vec<Value> = self.supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                None,
                Some(body),
                Some(SupabaseClient::return_representation()),
            )
            .await
            .map_err(|e| SchedulingError::Database(e.to_string()))?;

        Ok(Self::parse_rows(rows)?.into_iter().next())
    }
}
