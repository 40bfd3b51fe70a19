// libs/appointment-cell/src/services/selection.rs
use std::sync::Arc;

use tracing::warn;

use staff_cell::models::StaffProfile;
use staff_cell::services::directory_order;

use crate::models::Appointment;

/// Orders free, eligible staff for auto-assignment. The engine tries the
/// candidates in the returned order and binds the first one it can book.
pub trait StaffSelectionStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// `day_appointments` are the candidates' appointments on the requested day.
    fn rank(&self, candidates: Vec<StaffProfile>, day_appointments: &[Appointment]) -> Vec<StaffProfile>;
}

/// First eligible staff member in directory order.
#[derive(Debug, Default, Clone, Copy)]
pub struct FirstEligible;

impl StaffSelectionStrategy for FirstEligible {
    fn name(&self) -> &'static str {
        "first_eligible"
    }

    fn rank(&self, mut candidates: Vec<StaffProfile>, _day_appointments: &[Appointment]) -> Vec<StaffProfile> {
        candidates.sort_by(directory_order);
        candidates
    }
}

/// Fewest occupying appointments that day first, directory order on ties.
#[derive(Debug, Default, Clone, Copy)]
pub struct LeastBooked;

impl StaffSelectionStrategy for LeastBooked {
    fn name(&self) -> &'static str {
        "least_booked"
    }

    fn rank(&self, mut candidates: Vec<StaffProfile>, day_appointments: &[Appointment]) -> Vec<StaffProfile> {
        let load = |staff: &StaffProfile| {
            day_appointments
                .iter()
                .filter(|apt| apt.staff_id == Some(staff.id) && apt.occupies_slot())
                .count()
        };

        candidates.sort_by(|a, b| load(a).cmp(&load(b)).then_with(|| directory_order(a, b)));
        candidates
    }
}

pub fn strategy_from_name(name: &str) -> Arc<dyn StaffSelectionStrategy> {
    match name.trim().to_ascii_lowercase().as_str() {
        "least_booked" => Arc::new(LeastBooked),
        "first_eligible" | "" => Arc::new(FirstEligible),
        other => {
            warn!("Unknown staff selection policy '{}', using first_eligible", other);
            Arc::new(FirstEligible)
        }
    }
}
