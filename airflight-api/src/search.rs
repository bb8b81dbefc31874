use airflight_core::{Flight, Itinerary, RouteQuery};
use axum::{
    extract::{rejection::QueryRejection, Query, State},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::AppError;
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Raw query string; every field is checked by hand so that a missing or
/// malformed value yields a descriptive 400.
#[derive(Debug, Deserialize)]
pub struct RouteParams {
    pub from: Option<String>,
    pub to: Option<String>,
    pub departure_date: Option<String>,
    pub booking_class: Option<String>,
    pub connections: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RouteResponse {
    pub flight_no: String,
    pub departure_airport: String,
    pub arrival_airport: String,
    pub scheduled_departure: DateTime<Utc>,
    pub scheduled_arrival: DateTime<Utc>,
    pub connections: usize,
    pub legs: Vec<Flight>,
}

impl From<Itinerary> for RouteResponse {
    fn from(itinerary: Itinerary) -> Self {
        let first = itinerary.first().clone();
        let last = itinerary.last().clone();
        Self {
            flight_no: first.flight_no,
            departure_airport: first.departure_airport,
            arrival_airport: last.arrival_airport,
            scheduled_departure: first.scheduled_departure,
            scheduled_arrival: last.scheduled_arrival,
            connections: itinerary.connections(),
            legs: itinerary.legs,
        }
    }
}

impl TryFrom<RouteParams> for RouteQuery {
    type Error = AppError;

    fn try_from(params: RouteParams) -> Result<Self, Self::Error> {
        let from = required(params.from, "from")?;
        let to = required(params.to, "to")?;
        let booking_class = required(params.booking_class, "booking_class")?;

        let raw_date = required(params.departure_date, "departure_date")?;
        let departure_date = NaiveDate::parse_from_str(&raw_date, "%Y-%m-%d").map_err(|_| {
            AppError::ValidationError(format!("Invalid departure_date '{}', expected YYYY-MM-DD", raw_date))
        })?;

        let connections = match params.connections.as_deref().map(str::trim) {
            None | Some("") => 0,
            Some(raw) => raw
                .parse::<u32>()
                .map_err(|_| AppError::ValidationError(format!("Invalid connections '{}'", raw)))?,
        };

        Ok(RouteQuery {
            from,
            to,
            departure_date,
            booking_class,
            connections,
        })
    }
}

fn required(value: Option<String>, name: &str) -> Result<String, AppError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(AppError::ValidationError(format!("Missing {} parameter", name))),
    }
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/routes", get(search_routes))
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /routes?from=&to=&departure_date=&booking_class=&connections=
pub async fn search_routes(
    State(state): State<AppState>,
    params: Result<Query<RouteParams>, QueryRejection>,
) -> Result<Json<Vec<RouteResponse>>, AppError> {
    let Query(params) = params?;
    let query = RouteQuery::try_from(params)?;

    let itineraries = state.search.search(&query).await?;
    debug!("Route search {} -> {} on {}: {} itineraries", query.from, query.to, query.departure_date, itineraries.len());

    Ok(Json(itineraries.into_iter().map(RouteResponse::from).collect()))
}
