use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use futures::future::join_all;
use uuid::Uuid;

use appointment_cell::models::{Actor, AppointmentStatus, AutoAssignRequest, SchedulingError};
use appointment_cell::services::{
    FirstEligible, InMemoryAppointmentStore, LeastBooked, SchedulingService, SlotGenerator,
    StaffSelectionStrategy,
};
use shared_config::ClinicHours;
use staff_cell::models::StaffProfile;
use staff_cell::services::InMemoryStaffDirectory;

fn staff(verified_days_ago: i64) -> StaffProfile {
    StaffProfile {
        id: Uuid::new_v4(),
        full_name: format!("Staff {}", verified_days_ago),
        role: "nurse".to_string(),
        specialty: None,
        is_available: true,
        is_verified: true,
        verified_at: Some(Utc::now() - Duration::days(verified_days_ago)),
        created_at: Utc::now(),
    }
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 9, 12, 0, 0).unwrap()
}

fn request_at(start: DateTime<Utc>, minutes: i64) -> (AutoAssignRequest, Actor) {
    let patient = Actor::patient(Uuid::new_v4());
    let request = AutoAssignRequest {
        patient_id: patient.id,
        appointment_date: start,
        duration_minutes: Some(minutes),
        role: None,
        specialty: None,
        reason: None,
        symptoms: vec![],
    };
    (request, patient)
}

fn service(
    pool: Vec<StaffProfile>,
    strategy: Arc<dyn StaffSelectionStrategy>,
) -> (Arc<SchedulingService>, Arc<InMemoryAppointmentStore>) {
    let store = Arc::new(InMemoryAppointmentStore::new());
    let service = SchedulingService::new(
        SlotGenerator::new(ClinicHours::default()),
        Arc::new(InMemoryStaffDirectory::new(pool)),
        store.clone(),
        strategy,
    );
    (Arc::new(service), store)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn single_staff_race_books_exactly_once() {
    let (service, store) = service(vec![staff(30)], Arc::new(FirstEligible));
    let start = Utc.with_ymd_and_hms(2024, 6, 10, 9, 0, 0).unwrap();

    let tasks = (0..16).map(|_| {
        let service = service.clone();
        tokio::spawn(async move {
            let (request, patient) = request_at(start, 30);
            service.auto_assign(request, &patient, now()).await
        })
    });

    let results: Vec<_> = join_all(tasks).await.into_iter().map(|r| r.unwrap()).collect();

    let booked: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(booked.len(), 1);
    assert_eq!(booked[0].status, AppointmentStatus::Pending);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| *e == SchedulingError::NoStaffAvailable));
    assert_eq!(store.all().await.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_overlapping_requests_never_double_book() {
    let pool = vec![staff(90), staff(60), staff(30)];
    let strategies: Vec<Arc<dyn StaffSelectionStrategy>> = vec![Arc::new(FirstEligible), Arc::new(LeastBooked)];
    for strategy in strategies {
        let (service, store) = service(pool.clone(), strategy);
        let base = Utc.with_ymd_and_hms(2024, 6, 10, 10, 0, 0).unwrap();

        // staggered 45-minute requests that overlap their neighbours
        let tasks = (0..24).map(|i| {
            let service = service.clone();
            let start = base + Duration::minutes(15 * (i % 6));
            tokio::spawn(async move {
                let (request, patient) = request_at(start, 45);
                service.auto_assign(request, &patient, now()).await
            })
        });
        let results: Vec<_> = join_all(tasks).await.into_iter().map(|r| r.unwrap()).collect();
        assert!(results.iter().any(|r| r.is_ok()));

        let all = store.all().await;
        for (i, a) in all.iter().enumerate() {
            for b in all.iter().skip(i + 1) {
                if a.staff_id == b.staff_id {
                    assert!(
                        !a.overlaps(b.appointment_date, b.end_time()),
                        "staff {:?} double-booked at {} and {}",
                        a.staff_id,
                        a.appointment_date,
                        b.appointment_date
                    );
                }
            }
        }
    }
}

#[tokio::test]
async fn availability_reflects_bookings() {
    let nurse = staff(30);
    let (service, _) = service(vec![nurse.clone()], Arc::new(FirstEligible));
    let start = Utc.with_ymd_and_hms(2024, 6, 10, 9, 0, 0).unwrap();

    let (request, patient) = request_at(start, 30);
    service.auto_assign(request, &patient, now()).await.unwrap();

    let availability = service
        .clinic_availability(appointment_cell::models::SlotQuery {
            date: start.date_naive(),
            duration_minutes: None,
            role: Some("Nurse".to_string()),
            specialty: None,
        })
        .await
        .unwrap();

    assert_eq!(service.generate_slots(start.date_naive(), None).unwrap().len(), 20);
    assert_eq!(availability.eligible_staff, 1);
    assert_eq!(availability.slots.len(), 20);
    let nine = availability.slots.iter().find(|s| s.start_time == start).unwrap();
    assert!(!nine.available);
    assert!(availability.slots.iter().filter(|s| s.start_time != start).all(|s| s.available));
}
