// libs/appointment-cell/src/services/lifecycle.rs
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::models::{Actor, ActorRole, Appointment, AppointmentAction, AppointmentStatus, SchedulingError};

/// Actor-gated transition rules for appointments.
///
/// The service decides; it never writes. Callers apply the returned status
/// with a conditional write on the appointment's current status.
#[derive(Debug, Default, Clone, Copy)]
pub struct AppointmentLifecycleService;

impl AppointmentLifecycleService {
    pub fn new() -> Self {
        Self
    }

    /// Status the appointment moves to when `actor` performs `action` at `now`.
    ///
    /// For `Reschedule` this is the status of the original appointment, which
    /// is cancelled once its replacement exists.
    pub fn target_status(
        &self,
        appointment: &Appointment,
        action: &AppointmentAction,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<AppointmentStatus, SchedulingError> {
        let from = appointment.status;
        debug!("Checking {} on {} appointment {} by {:?}", action.name(), from, appointment.id, actor.role);

        let invalid = || {
            warn!("Rejected {} on {} appointment {} by {:?} {}", action.name(), from, appointment.id, actor.role, actor.id);
            SchedulingError::InvalidTransition {
                from,
                action: action.name().to_string(),
            }
        };

        if from.is_terminal() || from == AppointmentStatus::Rescheduled {
            return Err(invalid());
        }

        let owner = Self::is_owner(appointment, actor);
        let assigned = Self::is_assigned_staff(appointment, actor);
        let admin = actor.role == ActorRole::Admin;
        let started = appointment.appointment_date <= now;

        use AppointmentAction as A;
        use AppointmentStatus as S;

        let target = match (action, from) {
            (A::Approve, S::Pending) if assigned => S::Approved,
            (A::Confirm, S::Approved) if owner => S::Confirmed,
            (A::Cancel { .. }, S::Pending | S::Approved) if owner || assigned || admin => S::Cancelled,
            (A::Complete, S::Approved | S::Confirmed) if assigned && started => S::Completed,
            (A::NoShow, S::Approved | S::Confirmed) if assigned && started => S::NoShow,
            (A::Reschedule { .. }, S::Pending | S::Approved) if owner || assigned || admin => S::Cancelled,
            _ => return Err(invalid()),
        };

        Ok(target)
    }

    /// Actions `actor` could perform on the appointment right now.
    pub fn allowed_actions(&self, appointment: &Appointment, actor: &Actor, now: DateTime<Utc>) -> Vec<&'static str> {
        let candidates = [
            AppointmentAction::Approve,
            AppointmentAction::Confirm,
            AppointmentAction::Cancel { reason: String::new() },
            AppointmentAction::Complete,
            AppointmentAction::NoShow,
            AppointmentAction::Reschedule {
                new_date: appointment.appointment_date,
                duration_minutes: None,
                reason: None,
            },
        ];

        candidates
            .iter()
            .filter(|action| self.target_status(appointment, action, actor, now).is_ok())
            .map(AppointmentAction::name)
            .collect()
    }

    fn is_owner(appointment: &Appointment, actor: &Actor) -> bool {
        actor.role == ActorRole::Patient && actor.id == appointment.patient_id
    }

    fn is_assigned_staff(appointment: &Appointment, actor: &Actor) -> bool {
        actor.role == ActorRole::Staff && appointment.staff_id == Some(actor.id)
    }
}
