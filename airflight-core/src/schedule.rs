//! Weekly schedule views of an airport's traffic.

use serde::Serialize;

use crate::models::Flight;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduleEntry {
    pub day_of_week: String,
    /// `HH:MM`, UTC
    pub time: String,
    pub flight_no: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin_airport: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination_airport: Option<String>,
}

/// Arrivals keyed on arrival time and the airport they come from.
pub fn inbound(flights: &[Flight]) -> Vec<ScheduleEntry> {
    flights
        .iter()
        .map(|f| ScheduleEntry {
            day_of_week: f.scheduled_arrival.format("%A").to_string(),
            time: f.scheduled_arrival.format("%H:%M").to_string(),
            flight_no: f.flight_no.clone(),
            origin_airport: Some(f.departure_airport.clone()),
            destination_airport: None,
        })
        .collect()
}

/// Departures keyed on departure time and the airport they fly to.
pub fn outbound(flights: &[Flight]) -> Vec<ScheduleEntry> {
    flights
        .iter()
        .map(|f| ScheduleEntry {
            day_of_week: f.scheduled_departure.format("%A").to_string(),
            time: f.scheduled_departure.format("%H:%M").to_string(),
            flight_no: f.flight_no.clone(),
            origin_airport: None,
            destination_airport: Some(f.arrival_airport.clone()),
        })
        .collect()
}
