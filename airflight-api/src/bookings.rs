use airflight_core::{BoardingPass, FlightId, Ticket};
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    routing::put,
    Json, Router,
};
use serde::Deserialize;

use crate::error::AppError;
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateBookingRequest {
    #[serde(alias = "passanger")]
    pub passenger: String,
    pub fare_conditions: String,
    pub flight_ids: Vec<FlightId>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/bookings/{guid}", put(create_booking))
        .route("/bookings/{guid}/check-in/{flight_id}", put(check_in))
}

// ============================================================================
// Handlers
// ============================================================================

/// PUT /bookings/{guid}
/// Books every listed flight under `guid`, or returns the tickets of the
/// booking already stored under it.
pub async fn create_booking(
    State(state): State<AppState>,
    Path(guid): Path<String>,
    payload: Result<Json<CreateBookingRequest>, JsonRejection>,
) -> Result<Json<Vec<Ticket>>, AppError> {
    let Json(req) = payload?;

    let tickets = state
        .bookings
        .create_or_fetch_booking(&guid, &req.passenger, &req.fare_conditions, &req.flight_ids)
        .await?;

    Ok(Json(tickets))
}

/// PUT /bookings/{guid}/check-in/{flight_id}
pub async fn check_in(
    State(state): State<AppState>,
    path: Result<Path<(String, FlightId)>, PathRejection>,
) -> Result<Json<BoardingPass>, AppError> {
    let Path((guid, flight_id)) = path?;

    let pass = state.check_in.check_in(&guid, flight_id).await?;
    Ok(Json(pass))
}
