// libs/appointment-cell/src/services/scheduling.rs
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use staff_cell::models::StaffFilter;
use staff_cell::services::StaffDirectory;

use crate::models::{
    Actor, ActorRole, Appointment, AppointmentAction, AppointmentDetails, AppointmentStatus,
    AutoAssignRequest, ClinicAvailability, SchedulingError, Slot, SlotQuery, StatusUpdate,
    WalkInRequest,
};
use crate::services::assignment::{AssignmentDraft, AutoAssignmentEngine};
use crate::services::availability::resolve_availability;
use crate::services::lifecycle::AppointmentLifecycleService;
use crate::services::selection::{strategy_from_name, StaffSelectionStrategy};
use crate::services::slots::SlotGenerator;
use crate::services::store::{AppointmentStore, InMemoryAppointmentStore, SupabaseAppointmentStore};

const DEFAULT_RESCHEDULE_REASON: &str = "rescheduled";

/// Entry point for every scheduling operation exposed over HTTP.
pub struct SchedulingService {
    slots: SlotGenerator,
    directory: Arc<dyn StaffDirectory>,
    store: Arc<dyn AppointmentStore>,
    engine: AutoAssignmentEngine,
    lifecycle: AppointmentLifecycleService,
}

impl SchedulingService {
    pub fn new(
        slots: SlotGenerator,
        directory: Arc<dyn StaffDirectory>,
        store: Arc<dyn AppointmentStore>,
        strategy: Arc<dyn StaffSelectionStrategy>,
    ) -> Self {
        let engine = AutoAssignmentEngine::new(slots.clone(), directory.clone(), store.clone(), strategy);
        Self {
            slots,
            directory,
            store,
            engine,
            lifecycle: AppointmentLifecycleService::new(),
        }
    }

    /// Hosted store when Supabase is configured, otherwise an in-memory one.
    pub fn from_config(config: &AppConfig, directory: Arc<dyn StaffDirectory>) -> Self {
        let store: Arc<dyn AppointmentStore> = if config.is_backend_configured() {
            info!("Using Supabase appointment store at {}", config.supabase_url);
            Arc::new(SupabaseAppointmentStore::new(config))
        } else {
            warn!("Supabase not configured, appointments are kept in memory");
            Arc::new(InMemoryAppointmentStore::new())
        };

        let strategy = strategy_from_name(&config.staff_selection_policy);
        info!("Staff selection policy: {}", strategy.name());

        Self::new(SlotGenerator::new(config.clinic.clone()), directory, store, strategy)
    }

    pub fn generate_slots(&self, date: NaiveDate, duration_minutes: Option<i64>) -> Result<Vec<Slot>, SchedulingError> {
        let duration = duration_minutes.unwrap_or_else(|| self.slots.default_duration());
        self.slots.generate(date, duration)
    }

    /// Slot grid for the day, marked against the eligible pool's bookings.
    #[instrument(skip(self))]
    pub async fn clinic_availability(&self, query: SlotQuery) -> Result<ClinicAvailability, SchedulingError> {
        let duration = query.duration_minutes.unwrap_or_else(|| self.slots.default_duration());
        let slots = self.slots.generate(query.date, duration)?;

        let pool = self
            .directory
            .eligible_staff(&StaffFilter::eligible(query.role, query.specialty))
            .await?;

        let appointments = match self.slots.operating_window(query.date) {
            Some((open, close)) if !pool.is_empty() => {
                let ids: Vec<Uuid> = pool.iter().map(|s| s.id).collect();
                self.store.list_for_staff(&ids, open, close).await?
            }
            _ => Vec::new(),
        };

        let slots = resolve_availability(slots, &pool, &appointments);
        debug!(
            "{} of {} slots available on {}",
            slots.iter().filter(|s| s.available).count(),
            slots.len(),
            query.date
        );

        Ok(ClinicAvailability {
            date: query.date,
            duration_minutes: duration,
            eligible_staff: pool.len(),
            slots,
        })
    }

    /// Patients book for themselves; staff and admins may book for anyone.
    pub async fn auto_assign(
        &self,
        request: AutoAssignRequest,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<Appointment, SchedulingError> {
        if actor.role == ActorRole::Patient && actor.id != request.patient_id {
            return Err(SchedulingError::Unauthorized(
                "Patients can only book appointments for themselves".to_string(),
            ));
        }

        let draft = AssignmentDraft {
            patient_id: request.patient_id,
            start: request.appointment_date,
            duration_minutes: request.duration_minutes.unwrap_or_else(|| self.slots.default_duration()),
            filter: request.filter(),
            reason: request.reason,
            symptoms: request.symptoms,
            created_by: actor.id,
            preferred_staff: None,
            replaces: None,
        };

        self.engine.assign(draft, now).await
    }

    /// Staff register walk-ins into their own schedule; admins name the staff member.
    pub async fn register_walk_in(
        &self,
        request: WalkInRequest,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<Appointment, SchedulingError> {
        let staff_id = match actor.role {
            ActorRole::Staff => {
                let staff_id = request.staff_id.unwrap_or(actor.id);
                if staff_id != actor.id {
                    return Err(SchedulingError::Unauthorized(
                        "Staff can only register walk-ins into their own schedule".to_string(),
                    ));
                }
                staff_id
            }
            ActorRole::Admin => request.staff_id.ok_or_else(|| {
                SchedulingError::Validation("staff_id is required when an admin registers a walk-in".to_string())
            })?,
            ActorRole::Patient => {
                return Err(SchedulingError::Unauthorized(
                    "Only staff can register walk-in patients".to_string(),
                ))
            }
        };

        let duration = request.duration_minutes.unwrap_or_else(|| self.slots.default_duration());
        self.engine
            .book_walk_in(
                staff_id,
                request.patient_id,
                request.appointment_date,
                duration,
                request.reason,
                request.symptoms,
                actor.id,
                now,
            )
            .await
    }

    /// Applies `action` as `actor`. Returns the updated appointment, or for a
    /// reschedule the replacement appointment.
    #[instrument(skip(self, action, now), fields(action = action.name()))]
    pub async fn transition(
        &self,
        appointment_id: Uuid,
        action: AppointmentAction,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<Appointment, SchedulingError> {
        let appointment = self.load(appointment_id).await?;
        let target = self.lifecycle.target_status(&appointment, &action, actor, now)?;

        match action {
            AppointmentAction::Reschedule { new_date, duration_minutes, reason } => {
                self.reschedule(appointment, new_date, duration_minutes, reason, actor, now).await
            }
            AppointmentAction::Cancel { reason } => {
                let update = StatusUpdate {
                    status: target,
                    cancellation_reason: Some(reason),
                };
                self.apply(&appointment, "cancel", update).await
            }
            other => {
                let update = StatusUpdate {
                    status: target,
                    cancellation_reason: None,
                };
                self.apply(&appointment, other.name(), update).await
            }
        }
    }

    pub async fn get_appointment(
        &self,
        appointment_id: Uuid,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<AppointmentDetails, SchedulingError> {
        let appointment = self.load(appointment_id).await?;

        let visible = match actor.role {
            ActorRole::Admin => true,
            ActorRole::Patient => appointment.patient_id == actor.id,
            ActorRole::Staff => appointment.staff_id == Some(actor.id),
        };
        if !visible {
            return Err(SchedulingError::Unauthorized(
                "Appointment belongs to another patient or staff member".to_string(),
            ));
        }

        let allowed_actions = self
            .lifecycle
            .allowed_actions(&appointment, actor, now)
            .into_iter()
            .map(str::to_string)
            .collect();

        Ok(AppointmentDetails {
            room_key: appointment.room_key(),
            appointment,
            allowed_actions,
        })
    }

    pub async fn patient_appointments(&self, patient_id: Uuid) -> Result<Vec<Appointment>, SchedulingError> {
        self.store.list_for_patient(patient_id).await
    }

    /// Upcoming bookings for a staff member. Staff see their own queue only.
    pub async fn staff_queue(
        &self,
        staff_id: Uuid,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        let allowed = match actor.role {
            ActorRole::Admin => true,
            ActorRole::Staff => actor.id == staff_id,
            ActorRole::Patient => false,
        };
        if !allowed {
            return Err(SchedulingError::Unauthorized(
                "Queues are visible to their staff member and admins".to_string(),
            ));
        }

        self.store.list_upcoming_for_staff(staff_id, now).await
    }

    async fn load(&self, appointment_id: Uuid) -> Result<Appointment, SchedulingError> {
        self.store
            .get(appointment_id)
            .await?
            .ok_or_else(|| SchedulingError::NotFound(format!("Appointment {}", appointment_id)))
    }

    /// Conditional write on the status the rules were checked against. A
    /// refused write means another transition got there first.
    async fn apply(
        &self,
        appointment: &Appointment,
        action: &str,
        update: StatusUpdate,
    ) -> Result<Appointment, SchedulingError> {
        let target = update.status;

        match self.store.update_status(appointment.id, appointment.status, update).await? {
            Some(updated) => {
                info!("Appointment {} {} -> {}", updated.id, appointment.status, updated.status);
                Ok(updated)
            }
            None => {
                let current = self.load(appointment.id).await?;
                warn!(
                    "Appointment {} moved to {} before {} could set {}",
                    appointment.id, current.status, action, target
                );
                Err(SchedulingError::InvalidTransition {
                    from: current.status,
                    action: action.to_string(),
                })
            }
        }
    }

    /// Cancel-and-recreate. The replacement is booked first, preferring the
    /// current staff member; the original is then cancelled. If the original
    /// changed in between, the replacement is withdrawn.
    async fn reschedule(
        &self,
        original: Appointment,
        new_date: DateTime<Utc>,
        duration_minutes: Option<i64>,
        reason: Option<String>,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<Appointment, SchedulingError> {
        let filter = match original.staff_id {
            Some(staff_id) => match self.directory.get_staff(staff_id).await {
                Ok(staff) => StaffFilter::eligible(Some(staff.role), staff.specialty),
                Err(e) => {
                    debug!("Current staff {} not resolvable ({}), using any eligible staff", staff_id, e);
                    StaffFilter::eligible(None, None)
                }
            },
            None => StaffFilter::eligible(None, None),
        };

        let draft = AssignmentDraft {
            patient_id: original.patient_id,
            start: new_date,
            duration_minutes: duration_minutes.unwrap_or(original.duration_minutes),
            filter,
            reason: original.reason.clone(),
            symptoms: original.symptoms.clone(),
            created_by: actor.id,
            preferred_staff: original.staff_id,
            replaces: Some(original.id),
        };
        let replacement = self.engine.assign(draft, now).await?;

        let cancel = StatusUpdate {
            status: AppointmentStatus::Cancelled,
            cancellation_reason: Some(reason.unwrap_or_else(|| DEFAULT_RESCHEDULE_REASON.to_string())),
        };

        if let Err(e) = self.apply(&original, "reschedule", cancel).await {
            let withdraw = StatusUpdate {
                status: AppointmentStatus::Cancelled,
                cancellation_reason: Some("reschedule aborted".to_string()),
            };
            match self
                .store
                .update_status(replacement.id, AppointmentStatus::Pending, withdraw)
                .await
            {
                Ok(Some(_)) => info!("Withdrew replacement {} after {}", replacement.id, e),
                Ok(None) => warn!("Replacement appointment {} changed before it could be withdrawn", replacement.id),
                Err(withdraw_err) => warn!(
                    "Failed to withdraw replacement appointment {}: {}",
                    replacement.id, withdraw_err
                ),
            }
            return Err(e);
        }

        info!("Appointment {} rescheduled as {}", original.id, replacement.id);
        Ok(replacement)
    }
}
