use chrono::{Duration, Utc};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};
use assert_matches::assert_matches;

use shared_utils::test_utils::{MockSupabaseResponses, TestConfig};
use staff_cell::models::{StaffError, StaffFilter};
use staff_cell::services::{StaffDirectory, SupabaseStaffDirectory};

async fn directory_for(server: &MockServer) -> SupabaseStaffDirectory {
    let config = TestConfig::with_supabase_url(&server.uri()).to_app_config();
    SupabaseStaffDirectory::new(&config)
}

#[tokio::test]
async fn eligible_staff_queries_verified_and_available_rows() {
    let server = MockServer::start().await;
    let early = Uuid::new_v4().to_string();
    let late = Uuid::new_v4().to_string();

    Mock::given(method("GET"))
        .and(path("/rest/v1/staff_profiles"))
        .and(query_param("is_verified", "eq.true"))
        .and(query_param("is_available", "eq.true"))
        .and(query_param("role", "ilike.nurse"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::staff_profile_response(&late, "Late Verified", "nurse", None, Some(Utc::now() - Duration::days(1))),
            MockSupabaseResponses::staff_profile_response(&early, "Early Verified", "nurse", None, Some(Utc::now() - Duration::days(90))),
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let directory = directory_for(&server).await;
    let staff = directory
        .eligible_staff(&StaffFilter::eligible(Some("nurse".to_string()), None))
        .await
        .unwrap();

    let ids: Vec<String> = staff.iter().map(|s| s.id.to_string()).collect();
    assert_eq!(ids, vec![early, late]);
}

#[tokio::test]
async fn get_staff_returns_not_found_for_empty_result() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/staff_profiles"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let directory = directory_for(&server).await;
    let result = directory.get_staff(Uuid::new_v4()).await;

    assert_matches!(result, Err(StaffError::NotFound));
}

#[tokio::test]
async fn set_availability_patches_profile() {
    let server = MockServer::start().await;
    let staff_id = Uuid::new_v4();
    let mut row = MockSupabaseResponses::staff_profile_response(
        &staff_id.to_string(), "Dr. Example", "doctor", Some("cardiology"), Some(Utc::now()),
    );
    row["is_available"] = json!(false);

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/staff_profiles"))
        .and(query_param("id", format!("eq.{}", staff_id)))
        .and(body_partial_json(json!({ "is_available": false })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([row])))
        .expect(1)
        .mount(&server)
        .await;

    let directory = directory_for(&server).await;
    let profile = directory.set_availability(staff_id, false).await.unwrap();

    assert_eq!(profile.id, staff_id);
    assert!(!profile.is_available);
}

#[tokio::test]
async fn backend_failure_maps_to_database_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/staff_profiles"))
        .respond_with(ResponseTemplate::new(500).set_body_json(
            MockSupabaseResponses::error_response("boom", "XX000"),
        ))
        .mount(&server)
        .await;

    let directory = directory_for(&server).await;
    let result = directory.list_staff(&StaffFilter::default()).await;

    assert_matches!(result, Err(StaffError::DatabaseError(_)));
}
