// libs/appointment-cell/src/router.rs
use axum::{
    Router,
    routing::{get, post},
    middleware,
};

use shared_utils::extractor::auth_middleware;

use crate::handlers::{self, AppointmentCellState};

pub fn appointment_routes(state: AppointmentCellState) -> Router {
    let protected_routes = Router::new()
        .route("/slots", get(handlers::get_available_slots))
        .route("/auto-assign", post(handlers::auto_assign_appointment))
        .route("/walk-in", post(handlers::register_walk_in))
        .route("/mine", get(handlers::get_my_appointments))
        .route("/queue", get(handlers::get_staff_queue))
        .route("/{appointment_id}", get(handlers::get_appointment))
        .route("/{appointment_id}/transition", post(handlers::transition_appointment))
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware));

    Router::new()
        .merge(protected_routes)
        .with_state(state)
}
