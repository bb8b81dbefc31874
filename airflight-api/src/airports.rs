use airflight_core::schedule::{self, ScheduleEntry};
use airflight_core::Airport;
use axum::{
    extract::{
        rejection::{PathRejection, QueryRejection},
        Path, Query, State,
    },
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AirportFilter {
    pub city: Option<String>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/cities", get(list_cities))
        .route("/airports", get(list_airports))
        .route("/airports/{airport_code}/inbound-schedule", get(inbound_schedule))
        .route("/airports/{airport_code}/outbound-schedule", get(outbound_schedule))
}

/// GET /cities
pub async fn list_cities(State(state): State<AppState>) -> Result<Json<Vec<String>>, AppError> {
    let cities = state.flight_repo.list_cities().await.map_err(internal)?;
    Ok(Json(cities))
}

/// GET /airports?city=
pub async fn list_airports(
    State(state): State<AppState>,
    filter: Result<Query<AirportFilter>, QueryRejection>,
) -> Result<Json<Vec<Airport>>, AppError> {
    let Query(filter) = filter?;
    let airports = state
        .flight_repo
        .list_airports(filter.city.as_deref())
        .await
        .map_err(internal)?;
    Ok(Json(airports))
}

/// GET /airports/{airport_code}/inbound-schedule
pub async fn inbound_schedule(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
) -> Result<Json<Vec<ScheduleEntry>>, AppError> {
    let Path(airport_code) = path?;
    let flights = state.flight_repo.flights_arriving_at(&airport_code).await.map_err(internal)?;
    Ok(Json(schedule::inbound(&flights)))
}

/// GET /airports/{airport_code}/outbound-schedule
pub async fn outbound_schedule(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
) -> Result<Json<Vec<ScheduleEntry>>, AppError> {
    let Path(airport_code) = path?;
    let flights = state.flight_repo.flights_departing_from(&airport_code).await.map_err(internal)?;
    Ok(Json(schedule::outbound(&flights)))
}

fn internal(err: airflight_core::StoreError) -> AppError {
    AppError::InternalServerError(err.to_string())
}
