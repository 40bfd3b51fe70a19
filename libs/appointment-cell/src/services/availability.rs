// libs/appointment-cell/src/services/availability.rs
use chrono::{DateTime, Utc};
use uuid::Uuid;

use staff_cell::models::StaffProfile;

use crate::models::{Appointment, Slot};

/// No occupying appointment of `staff_id` overlaps `[start, end)`.
/// `ignore` skips one appointment, used when it is about to be replaced.
pub fn staff_is_free(
    staff_id: Uuid,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    appointments: &[Appointment],
    ignore: Option<Uuid>,
) -> bool {
    !appointments.iter().any(|apt| {
        apt.staff_id == Some(staff_id)
            && Some(apt.id) != ignore
            && apt.occupies_slot()
            && apt.overlaps(start, end)
    })
}

/// Members of `pool` free over `[start, end)`, pool order preserved.
pub fn free_staff<'a>(
    pool: &'a [StaffProfile],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    appointments: &[Appointment],
    ignore: Option<Uuid>,
) -> Vec<&'a StaffProfile> {
    pool.iter()
        .filter(|staff| staff_is_free(staff.id, start, end, appointments, ignore))
        .collect()
}

/// Marks each slot with the staff of `pool` who are free for its whole
/// range. A slot is available when at least one of them is free.
pub fn resolve_availability(
    slots: Vec<Slot>,
    pool: &[StaffProfile],
    appointments: &[Appointment],
) -> Vec<Slot> {
    let mut resolved: Vec<Slot> = slots
        .into_iter()
        .map(|mut slot| {
            slot.free_staff = free_staff(pool, slot.start_time, slot.end_time(), appointments, None)
                .into_iter()
                .map(|staff| staff.id)
                .collect();
            slot.available = !slot.free_staff.is_empty();
            slot
        })
        .collect();

    resolved.sort_by_key(|slot| slot.start_time);
    resolved
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate, TimeZone};
    use shared_config::ClinicHours;

    use crate::models::{AppointmentStatus, NewAppointment};
    use crate::services::slots::SlotGenerator;

    fn staff() -> StaffProfile {
        StaffProfile {
            id: Uuid::new_v4(),
            full_name: "Staff".to_string(),
            role: "doctor".to_string(),
            specialty: None,
            is_available: true,
            is_verified: true,
            verified_at: Some(Utc::now()),
            created_at: Utc::now(),
        }
    }

    fn booked(staff_id: Uuid, hour: u32, minute: u32, minutes: i64, status: AppointmentStatus) -> Appointment {
        let start = Utc.with_ymd_and_hms(2024, 6, 10, hour, minute, 0).unwrap();
        NewAppointment {
            patient_id: Uuid::new_v4(),
            staff_id,
            appointment_date: start,
            duration_minutes: minutes,
            status,
            reason: None,
            symptoms: vec![],
            created_by: Uuid::new_v4(),
            rescheduled_from: None,
        }
        .into_appointment(Uuid::new_v4(), start)
    }

    fn day_slots() -> Vec<Slot> {
        SlotGenerator::new(ClinicHours::default())
            .generate(NaiveDate::from_ymd_opt(2024, 6, 10).unwrap(), 30)
            .unwrap()
    }

    #[test]
    fn slot_stays_available_while_one_staff_is_free() {
        let (a, b) = (staff(), staff());
        let appointments = vec![booked(a.id, 9, 0, 30, AppointmentStatus::Approved)];

        let slots = resolve_availability(day_slots(), &[a.clone(), b.clone()], &appointments);
        let nine = &slots[2];

        assert!(nine.available);
        assert_eq!(nine.free_staff, vec![b.id]);
    }

    #[test]
    fn unavailable_slot_means_every_pool_member_is_booked() {
        let (a, b) = (staff(), staff());
        let appointments = vec![
            booked(a.id, 9, 0, 60, AppointmentStatus::Pending),
            booked(b.id, 9, 15, 30, AppointmentStatus::Confirmed),
        ];
        let pool = [a.clone(), b.clone()];

        let slots = resolve_availability(day_slots(), &pool, &appointments);

        for slot in slots.iter().filter(|s| !s.available) {
            for member in &pool {
                assert!(appointments.iter().any(|apt| {
                    apt.staff_id == Some(member.id) && apt.occupies_slot() && apt.overlaps(slot.start_time, slot.end_time())
                }));
            }
        }
        let unavailable: Vec<_> = slots.iter().filter(|s| !s.available).map(|s| s.start_time).collect();
        assert_eq!(unavailable, vec![
            Utc.with_ymd_and_hms(2024, 6, 10, 9, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 6, 10, 9, 30, 0).unwrap(),
        ]);
    }

    #[test]
    fn cancelled_appointments_do_not_block() {
        let a = staff();
        let appointments = vec![booked(a.id, 9, 0, 30, AppointmentStatus::Cancelled)];
        let start = Utc.with_ymd_and_hms(2024, 6, 10, 9, 0, 0).unwrap();

        assert!(staff_is_free(a.id, start, start + Duration::minutes(30), &appointments, None));
    }

    #[test]
    fn ignored_appointment_does_not_block() {
        let a = staff();
        let existing = booked(a.id, 9, 0, 30, AppointmentStatus::Pending);
        let start = existing.appointment_date;

        assert!(!staff_is_free(a.id, start, start + Duration::minutes(30), &[existing.clone()], None));
        assert!(staff_is_free(a.id, start, start + Duration::minutes(30), &[existing.clone()], Some(existing.id)));
    }

    #[test]
    fn empty_pool_leaves_everything_unavailable() {
        let slots = resolve_availability(day_slots(), &[], &[]);
        assert!(slots.iter().all(|s| !s.available && s.free_staff.is_empty()));
    }

    #[test]
    fn output_is_chronological_even_for_shuffled_input() {
        let mut slots = day_slots();
        slots.reverse();
        let resolved = resolve_availability(slots, &[staff()], &[]);
        assert!(resolved.windows(2).all(|w| w[0].start_time < w[1].start_time));
    }
}
