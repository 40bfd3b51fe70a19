pub mod assignment;
pub mod availability;
pub mod lifecycle;
pub mod scheduling;
pub mod selection;
pub mod slots;
pub mod store;

pub use assignment::{AssignmentDraft, AutoAssignmentEngine};
pub use availability::{free_staff, resolve_availability, staff_is_free};
pub use lifecycle::AppointmentLifecycleService;
pub use scheduling::SchedulingService;
pub use selection::{strategy_from_name, FirstEligible, LeastBooked, StaffSelectionStrategy};
pub use slots::SlotGenerator;
pub use store::{AppointmentStore, InMemoryAppointmentStore, SupabaseAppointmentStore};
