use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::{FareConditions, Flight};
use crate::repository::FlightRepository;
use crate::{CoreError, CoreResult};

/// Upper bound (exclusive) of the gap between an arrival and the next departure
pub const LAYOVER_WINDOW_HOURS: i64 = 24;

#[derive(Debug, Clone, Deserialize)]
pub struct RouteQuery {
    /// Airport code or city
    pub from: String,
    /// Airport code or city
    pub to: String,
    pub departure_date: NaiveDate,
    pub booking_class: String,
    #[serde(default)]
    pub connections: u32,
}

/// Flights chained arrival-to-departure, first leg first
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Itinerary {
    pub legs: Vec<Flight>,
}

impl Itinerary {
    pub fn first(&self) -> &Flight {
        &self.legs[0]
    }

    pub fn last(&self) -> &Flight {
        &self.legs[self.legs.len() - 1]
    }

    pub fn connections(&self) -> usize {
        self.legs.len() - 1
    }

    fn dedup_key(&self) -> Vec<(String, DateTime<Utc>)> {
        self.legs
            .iter()
            .map(|f| (f.flight_no.clone(), f.scheduled_departure))
            .collect()
    }
}

/// Direct and connecting itinerary search
pub struct ItinerarySearch {
    flights: Arc<dyn FlightRepository>,
    max_connections: u32,
}

impl ItinerarySearch {
    /// `max_connections` caps the `connections` a query may ask for.
    pub fn new(flights: Arc<dyn FlightRepository>, max_connections: u32) -> Self {
        Self { flights, max_connections }
    }

    pub async fn search(&self, query: &RouteQuery) -> CoreResult<Vec<Itinerary>> {
        if query.from.trim().is_empty() || query.to.trim().is_empty() {
            return Err(CoreError::ValidationError("From and to are required".to_string()));
        }
        // Fare class only gates bookability downstream; flights carry none
        let _fare_conditions: FareConditions = query.booking_class.parse()?;
        if query.connections > self.max_connections {
            return Err(CoreError::ValidationError(format!(
                "Connections must be between 0 and {}",
                self.max_connections
            )));
        }

        let day_start = query.departure_date.and_time(NaiveTime::MIN).and_utc();
        let day_end = query
            .departure_date
            .succ_opt()
            .map(|next| next.and_time(NaiveTime::MIN).and_utc())
            .ok_or_else(|| {
                CoreError::ValidationError(format!("Departure date {} is out of range", query.departure_date))
            })?;

        let origins = self.resolve(&query.from).await?;
        let destinations = self.resolve(&query.to).await?;

        let origin_codes: Vec<String> = origins.iter().cloned().collect();
        let mut frontier: Vec<Vec<Flight>> = self
            .flights
            .flights_departing(&origin_codes, day_start, day_end)
            .await?
            .into_iter()
            .map(|f| vec![f])
            .collect();

        let mut itineraries = Vec::new();
        let mut seen = HashSet::new();
        let mut depth = 0;

        loop {
            let mut open = Vec::new();
            for legs in frontier {
                let itinerary = Itinerary { legs };
                if destinations.contains(&itinerary.last().arrival_airport) {
                    if seen.insert(itinerary.dedup_key()) {
                        itineraries.push(itinerary);
                    }
                } else if depth < query.connections {
                    open.push(itinerary.legs);
                }
            }
            if open.is_empty() {
                break;
            }
            frontier = self.extend(open).await?;
            depth += 1;
        }

        itineraries.sort_by(|a, b| {
            (a.first().scheduled_departure, a.last().scheduled_arrival, a.legs.len())
                .cmp(&(b.first().scheduled_departure, b.last().scheduled_arrival, b.legs.len()))
                .then_with(|| a.dedup_key().cmp(&b.dedup_key()))
        });

        debug!(
            "Route search {} -> {} on {} (up to {} connections): {} itineraries",
            query.from,
            query.to,
            query.departure_date,
            query.connections,
            itineraries.len()
        );
        Ok(itineraries)
    }

    async fn resolve(&self, point: &str) -> CoreResult<BTreeSet<String>> {
        let codes: BTreeSet<String> = self
            .flights
            .resolve_airports(point)
            .await?
            .into_iter()
            .map(|a| a.airport_code)
            .collect();
        if codes.is_empty() {
            return Err(CoreError::AirportNotFound(point.to_string()));
        }
        Ok(codes)
    }

    /// Appends every admissible next leg to each path.
    ///
    /// One store query covers the whole frontier; the per-path layover
    /// window and the no-revisit rule are applied in memory.
    async fn extend(&self, paths: Vec<Vec<Flight>>) -> CoreResult<Vec<Vec<Flight>>> {
        let layover = Duration::hours(LAYOVER_WINDOW_HOURS);

        let hubs: BTreeSet<String> = paths
            .iter()
            .filter_map(|p| p.last())
            .map(|f| f.arrival_airport.clone())
            .collect();
        let earliest = paths.iter().filter_map(|p| p.last()).map(|f| f.scheduled_arrival).min();
        let latest = paths.iter().filter_map(|p| p.last()).map(|f| f.scheduled_arrival).max();
        let (Some(earliest), Some(latest)) = (earliest, latest) else {
            return Ok(Vec::new());
        };

        let hub_codes: Vec<String> = hubs.into_iter().collect();
        let until = latest.checked_add_signed(layover).unwrap_or(DateTime::<Utc>::MAX_UTC);
        let candidates = self.flights.flights_departing(&hub_codes, earliest, until).await?;

        let mut extended = Vec::new();
        for path in paths {
            let Some(last) = path.last() else { continue };
            let visited: HashSet<&str> = path
                .iter()
                .map(|f| f.departure_airport.as_str())
                .chain(std::iter::once(last.arrival_airport.as_str()))
                .collect();

            for next in &candidates {
                let connects = next.departure_airport == last.arrival_airport
                    && next.scheduled_departure > last.scheduled_arrival
                    && last
                        .scheduled_arrival
                        .checked_add_signed(layover)
                        .map_or(true, |limit| next.scheduled_departure < limit)
                    && !visited.contains(next.arrival_airport.as_str());
                if connects {
                    let mut legs = path.clone();
                    legs.push(next.clone());
                    extended.push(legs);
                }
            }
        }
        Ok(extended)
    }
}
