// libs/appointment-cell/src/services/assignment.rs
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use staff_cell::models::{StaffFilter, StaffProfile};
use staff_cell::services::StaffDirectory;

use crate::models::{Appointment, AppointmentStatus, NewAppointment, SchedulingError};
use crate::services::availability::free_staff;
use crate::services::selection::StaffSelectionStrategy;
use crate::services::slots::SlotGenerator;
use crate::services::store::AppointmentStore;

/// Everything needed to place one appointment with some eligible staff member.
#[derive(Debug, Clone)]
pub struct AssignmentDraft {
    pub patient_id: Uuid,
    pub start: DateTime<Utc>,
    pub duration_minutes: i64,
    pub filter: StaffFilter,
    pub reason: Option<String>,
    pub symptoms: Vec<String>,
    pub created_by: Uuid,
    /// Tried before the strategy's ranking when it is free.
    pub preferred_staff: Option<Uuid>,
    /// Appointment being replaced; it does not count as a conflict.
    pub replaces: Option<Uuid>,
}

pub struct AutoAssignmentEngine {
    slots: SlotGenerator,
    directory: Arc<dyn StaffDirectory>,
    store: Arc<dyn AppointmentStore>,
    strategy: Arc<dyn StaffSelectionStrategy>,
}

impl AutoAssignmentEngine {
    pub fn new(
        slots: SlotGenerator,
        directory: Arc<dyn StaffDirectory>,
        store: Arc<dyn AppointmentStore>,
        strategy: Arc<dyn StaffSelectionStrategy>,
    ) -> Self {
        Self {
            slots,
            directory,
            store,
            strategy,
        }
    }

    /// Binds the draft to the first free eligible staff member the store
    /// accepts. A refused insert means a concurrent booking took that
    /// staff member's time; the next candidate is tried.
    #[instrument(skip(self, draft, now), fields(patient_id = %draft.patient_id, start = %draft.start))]
    pub async fn assign(&self, draft: AssignmentDraft, now: DateTime<Utc>) -> Result<Appointment, SchedulingError> {
        self.slots.validate_request(draft.start, draft.duration_minutes, now)?;

        let end = draft.start + Duration::minutes(draft.duration_minutes);
        let eligible = self.directory.eligible_staff(&draft.filter).await?;
        if eligible.is_empty() {
            warn!("No eligible staff for filter {:?}", draft.filter);
            return Err(SchedulingError::NoStaffAvailable);
        }

        let day_appointments = self.day_appointments(&eligible, draft.start).await?;
        let free: Vec<StaffProfile> = free_staff(&eligible, draft.start, end, &day_appointments, draft.replaces)
            .into_iter()
            .cloned()
            .collect();
        debug!("{} of {} eligible staff free at {}", free.len(), eligible.len(), draft.start);

        let mut candidates = self.strategy.rank(free, &day_appointments);
        if let Some(preferred) = draft.preferred_staff {
            if let Some(index) = candidates.iter().position(|s| s.id == preferred) {
                let staff = candidates.remove(index);
                candidates.insert(0, staff);
            }
        }

        for candidate in candidates {
            let new_appointment = NewAppointment {
                patient_id: draft.patient_id,
                staff_id: candidate.id,
                appointment_date: draft.start,
                duration_minutes: draft.duration_minutes,
                status: AppointmentStatus::Pending,
                reason: draft.reason.clone(),
                symptoms: draft.symptoms.clone(),
                created_by: draft.created_by,
                rescheduled_from: draft.replaces,
            };

            match self.store.insert_if_free(new_appointment, draft.replaces).await? {
                Some(appointment) => {
                    info!(
                        "Assigned appointment {} to {} ({}) via {}",
                        appointment.id,
                        candidate.full_name,
                        candidate.id,
                        self.strategy.name()
                    );
                    return Ok(appointment);
                }
                None => debug!("Lost race for staff {}, trying next candidate", candidate.id),
            }
        }

        warn!("No staff available at {} for {} minutes", draft.start, draft.duration_minutes);
        Err(SchedulingError::NoStaffAvailable)
    }

    /// Books a walk-in directly into `staff_id`'s schedule as `approved`.
    #[instrument(skip(self, reason, symptoms, now))]
    #[allow(clippy::too_many_arguments)]
    pub async fn book_walk_in(
        &self,
        staff_id: Uuid,
        patient_id: Uuid,
        start: DateTime<Utc>,
        duration_minutes: i64,
        reason: Option<String>,
        symptoms: Vec<String>,
        created_by: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Appointment, SchedulingError> {
        self.slots.validate_request(start, duration_minutes, now)?;

        let staff = self.directory.get_staff(staff_id).await?;
        if !staff.is_verified {
            return Err(SchedulingError::Unauthorized(format!(
                "Staff member {} is not verified",
                staff_id
            )));
        }

        let new_appointment = NewAppointment {
            patient_id,
            staff_id,
            appointment_date: start,
            duration_minutes,
            status: AppointmentStatus::Approved,
            reason,
            symptoms,
            created_by,
            rescheduled_from: None,
        };

        let appointment = self
            .store
            .insert_if_free(new_appointment, None)
            .await?
            .ok_or(SchedulingError::NoStaffAvailable)?;

        info!("Registered walk-in {} with staff {}", appointment.id, staff_id);
        Ok(appointment)
    }

    async fn day_appointments(
        &self,
        staff: &[StaffProfile],
        start: DateTime<Utc>,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        let Some((open, close)) = self.slots.operating_window(start.date_naive()) else {
            return Ok(Vec::new());
        };
        let ids: Vec<Uuid> = staff.iter().map(|s| s.id).collect();
        self.store.list_for_staff(&ids, open, close).await
    }
}
