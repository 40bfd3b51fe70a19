use axum::{
    Router,
    routing::{get, patch},
    middleware,
};

use shared_utils::extractor::auth_middleware;

use crate::handlers::{self, StaffCellState};

pub fn staff_routes(state: StaffCellState) -> Router {
    let protected_routes = Router::new()
        .route("/", get(handlers::list_staff))
        .route("/{staff_id}", get(handlers::get_staff))
        .route("/{staff_id}/availability", patch(handlers::update_staff_availability))
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware));

    Router::new()
        .merge(protected_routes)
        .with_state(state)
}
