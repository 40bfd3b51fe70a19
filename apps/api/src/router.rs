use std::sync::Arc;

use axum::{
    Router,
    routing::get,
};
use tracing::{info, warn};

use appointment_cell::handlers::AppointmentCellState;
use appointment_cell::router::appointment_routes;
use appointment_cell::services::SchedulingService;
use shared_config::AppConfig;
use staff_cell::handlers::StaffCellState;
use staff_cell::router::staff_routes;
use staff_cell::services::{InMemoryStaffDirectory, StaffDirectory, SupabaseStaffDirectory};

pub fn create_router(config: Arc<AppConfig>) -> Router {
    let directory: Arc<dyn StaffDirectory> = if config.is_backend_configured() {
        info!("Using Supabase staff directory");
        Arc::new(SupabaseStaffDirectory::new(&config))
    } else {
        warn!("Supabase not configured, staff directory starts empty");
        Arc::new(InMemoryStaffDirectory::default())
    };

    let scheduling = Arc::new(SchedulingService::from_config(&config, directory.clone()));

    Router::new()
        .route("/", get(|| async { "Clinic scheduling API is running!" }))
        .nest("/appointments", appointment_routes(AppointmentCellState::new(config.clone(), scheduling)))
        .nest("/staff", staff_routes(StaffCellState::new(config.clone(), directory)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::{Request, StatusCode}};
    use tower::ServiceExt;

    use shared_utils::test_utils::TestConfig;

    fn offline_config() -> Arc<AppConfig> {
        let mut config = TestConfig::default().to_app_config();
        config.supabase_url = String::new();
        Arc::new(config)
    }

    #[tokio::test]
    async fn health_route_is_public() {
        let response = create_router(offline_config())
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn cell_routes_require_auth() {
        for uri in ["/appointments/mine", "/staff"] {
            let response = create_router(offline_config())
                .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{}", uri);
        }
    }
}
