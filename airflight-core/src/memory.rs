//! In-memory persistence gateway.
//!
//! Transactions hold the store mutex from `begin` until commit or drop and work
//! on a private copy of the data, so they are fully serialized and a dropped
//! transaction leaves nothing behind. Constraint checks mirror the Postgres
//! schema so both gateways fail the same way.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::models::{Airport, BoardingPass, Booking, FareConditions, Flight, FlightId, Seat, Ticket};
use crate::repository::{FlightRepository, ReservationStore, ReservationTx, StoreResult};

#[derive(Debug, Clone, Default)]
struct StoreState {
    airports: BTreeMap<String, Airport>,
    flights: BTreeMap<FlightId, Flight>,
    seats: Vec<Seat>,
    bookings: Vec<Booking>,
    tickets: BTreeMap<String, Ticket>,
    boarding_passes: Vec<BoardingPass>,
}

#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<StoreState>>,
    operations: Arc<AtomicUsize>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_airport(&self, airport: Airport) {
        let mut state = self.state.lock().await;
        state.airports.insert(airport.airport_code.clone(), airport);
    }

    pub async fn add_flight(&self, flight: Flight) {
        let mut state = self.state.lock().await;
        state.flights.insert(flight.flight_id, flight);
    }

    pub async fn add_seats(&self, aircraft_code: &str, fare_conditions: FareConditions, seat_nos: &[&str]) {
        let mut state = self.state.lock().await;
        for seat_no in seat_nos {
            state.seats.push(Seat {
                aircraft_code: aircraft_code.to_string(),
                seat_no: seat_no.to_string(),
                fare_conditions,
            });
        }
    }

    /// Committed booking rows for `guid`.
    pub async fn bookings(&self, guid: &str) -> Vec<Booking> {
        let state = self.state.lock().await;
        state.bookings.iter().filter(|b| b.guid == guid).cloned().collect()
    }

    pub async fn ticket_count(&self) -> usize {
        self.state.lock().await.tickets.len()
    }

    /// Committed boarding passes on `flight_id`, in boarding order.
    pub async fn boarding_passes(&self, flight_id: FlightId) -> Vec<BoardingPass> {
        let state = self.state.lock().await;
        let mut passes: Vec<BoardingPass> = state
            .boarding_passes
            .iter()
            .filter(|p| p.flight_id == flight_id)
            .cloned()
            .collect();
        passes.sort_by_key(|p| p.boarding_no);
        passes
    }

    /// Number of transactions begun plus reads served.
    pub fn operation_count(&self) -> usize {
        self.operations.load(Ordering::SeqCst)
    }

    async fn read(&self) -> tokio::sync::MutexGuard<'_, StoreState> {
        self.operations.fetch_add(1, Ordering::SeqCst);
        self.state.lock().await
    }
}

#[async_trait]
impl ReservationStore for InMemoryStore {
    async fn begin(&self) -> StoreResult<Box<dyn ReservationTx>> {
        self.operations.fetch_add(1, Ordering::SeqCst);
        let guard = self.state.clone().lock_owned().await;
        let work = guard.clone();
        Ok(Box::new(MemoryTx { guard, work }))
    }
}

struct MemoryTx {
    guard: OwnedMutexGuard<StoreState>,
    work: StoreState,
}

#[async_trait]
impl ReservationTx for MemoryTx {
    async fn lock_booking_guid(&mut self, _guid: &str) -> StoreResult<()> {
        // The whole store is already held by this transaction
        Ok(())
    }

    async fn bookings_by_guid(&mut self, guid: &str) -> StoreResult<Vec<Booking>> {
        let mut rows: Vec<Booking> = self.work.bookings.iter().filter(|b| b.guid == guid).cloned().collect();
        rows.sort_by_key(|b| b.leg_no);
        Ok(rows)
    }

    async fn find_booking(&mut self, guid: &str, flight_id: FlightId) -> StoreResult<Option<Booking>> {
        Ok(self
            .work
            .bookings
            .iter()
            .find(|b| b.guid == guid && b.flight_id == flight_id)
            .cloned())
    }

    async fn tickets_by_numbers(&mut self, ticket_nos: &[String]) -> StoreResult<Vec<Ticket>> {
        Ok(ticket_nos
            .iter()
            .filter_map(|no| self.work.tickets.get(no).cloned())
            .collect())
    }

    async fn ticket_exists(&mut self, ticket_no: &str) -> StoreResult<bool> {
        Ok(self.work.tickets.contains_key(ticket_no))
    }

    async fn find_flight(&mut self, flight_id: FlightId) -> StoreResult<Option<Flight>> {
        Ok(self.work.flights.get(&flight_id).cloned())
    }

    async fn insert_booking(&mut self, booking: &Booking) -> StoreResult<()> {
        if !self.work.flights.contains_key(&booking.flight_id) {
            return Err(format!("bookings: flight {} does not exist", booking.flight_id).into());
        }
        if self
            .work
            .bookings
            .iter()
            .any(|b| b.guid == booking.guid && b.flight_id == booking.flight_id)
        {
            return Err(format!(
                "bookings: duplicate key (guid, flight_id) = ({}, {})",
                booking.guid, booking.flight_id
            )
            .into());
        }
        self.work.bookings.push(booking.clone());
        Ok(())
    }

    async fn insert_ticket(&mut self, ticket: &Ticket) -> StoreResult<()> {
        if self.work.tickets.contains_key(&ticket.ticket_no) {
            return Err(format!("tickets: duplicate key ticket_no = {}", ticket.ticket_no).into());
        }
        self.work.tickets.insert(ticket.ticket_no.clone(), ticket.clone());
        Ok(())
    }

    async fn lock_flight(&mut self, flight_id: FlightId) -> StoreResult<Option<Flight>> {
        Ok(self.work.flights.get(&flight_id).cloned())
    }

    async fn boarding_pass_for_booking(
        &mut self,
        guid: &str,
        flight_id: FlightId,
    ) -> StoreResult<Option<BoardingPass>> {
        let ticket_nos: BTreeSet<&str> = self
            .work
            .bookings
            .iter()
            .filter(|b| b.guid == guid && b.flight_id == flight_id)
            .map(|b| b.ticket_no.as_str())
            .collect();

        Ok(self
            .work
            .boarding_passes
            .iter()
            .find(|p| p.flight_id == flight_id && ticket_nos.contains(p.ticket_no.as_str()))
            .cloned())
    }

    async fn free_seats(
        &mut self,
        flight_id: FlightId,
        aircraft_code: &str,
        fare_conditions: FareConditions,
    ) -> StoreResult<Vec<String>> {
        let taken: BTreeSet<&str> = self
            .work
            .boarding_passes
            .iter()
            .filter(|p| p.flight_id == flight_id)
            .map(|p| p.seat_no.as_str())
            .collect();

        Ok(self
            .work
            .seats
            .iter()
            .filter(|s| s.aircraft_code == aircraft_code && s.fare_conditions == fare_conditions)
            .filter(|s| !taken.contains(s.seat_no.as_str()))
            .map(|s| s.seat_no.clone())
            .collect())
    }

    async fn max_boarding_no(&mut self, flight_id: FlightId) -> StoreResult<i32> {
        Ok(self
            .work
            .boarding_passes
            .iter()
            .filter(|p| p.flight_id == flight_id)
            .map(|p| p.boarding_no)
            .max()
            .unwrap_or(0))
    }

    async fn insert_boarding_pass(&mut self, pass: &BoardingPass) -> StoreResult<()> {
        for existing in self.work.boarding_passes.iter().filter(|p| p.flight_id == pass.flight_id) {
            if existing.ticket_no == pass.ticket_no {
                return Err(format!(
                    "boarding_passes: duplicate key (ticket_no, flight_id) = ({}, {})",
                    pass.ticket_no, pass.flight_id
                )
                .into());
            }
            if existing.seat_no == pass.seat_no {
                return Err(format!("boarding_passes: seat {} already taken on flight {}", pass.seat_no, pass.flight_id).into());
            }
            if existing.boarding_no == pass.boarding_no {
                return Err(format!(
                    "boarding_passes: boarding number {} already issued on flight {}",
                    pass.boarding_no, pass.flight_id
                )
                .into());
            }
        }
        self.work.boarding_passes.push(pass.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let MemoryTx { mut guard, work } = *self;
        *guard = work;
        Ok(())
    }
}

#[async_trait]
impl FlightRepository for InMemoryStore {
    async fn resolve_airports(&self, point: &str) -> StoreResult<Vec<Airport>> {
        let state = self.read().await;
        Ok(state
            .airports
            .values()
            .filter(|a| a.city == point || a.airport_code == point)
            .cloned()
            .collect())
    }

    async fn flights_departing(
        &self,
        airports: &[String],
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> StoreResult<Vec<Flight>> {
        let state = self.read().await;
        let mut flights: Vec<Flight> = state
            .flights
            .values()
            .filter(|f| airports.contains(&f.departure_airport))
            .filter(|f| f.scheduled_departure >= from && f.scheduled_departure < until)
            .cloned()
            .collect();
        flights.sort_by_key(|f| f.scheduled_departure);
        Ok(flights)
    }

    async fn list_cities(&self) -> StoreResult<Vec<String>> {
        let state = self.read().await;
        let cities: BTreeSet<String> = state.airports.values().map(|a| a.city.clone()).collect();
        Ok(cities.into_iter().collect())
    }

    async fn list_airports(&self, city: Option<&str>) -> StoreResult<Vec<Airport>> {
        let state = self.read().await;
        Ok(state
            .airports
            .values()
            .filter(|a| city.map_or(true, |c| a.city == c))
            .cloned()
            .collect())
    }

    async fn flights_arriving_at(&self, airport_code: &str) -> StoreResult<Vec<Flight>> {
        let state = self.read().await;
        let mut flights: Vec<Flight> = state
            .flights
            .values()
            .filter(|f| f.arrival_airport == airport_code)
            .cloned()
            .collect();
        flights.sort_by_key(|f| f.scheduled_arrival);
        Ok(flights)
    }

    async fn flights_departing_from(&self, airport_code: &str) -> StoreResult<Vec<Flight>> {
        let state = self.read().await;
        let mut flights: Vec<Flight> = state
            .flights
            .values()
            .filter(|f| f.departure_airport == airport_code)
            .cloned()
            .collect();
        flights.sort_by_key(|f| f.scheduled_departure);
        Ok(flights)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn flight(id: FlightId) -> Flight {
        Flight {
            flight_id: id,
            flight_no: format!("PG{:04}", id),
            departure_airport: "LED".to_string(),
            arrival_airport: "SVO".to_string(),
            scheduled_departure: Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap(),
            scheduled_arrival: Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap(),
            aircraft_code: "321".to_string(),
        }
    }

    fn booking(guid: &str, flight_id: FlightId, ticket_no: &str) -> Booking {
        Booking {
            guid: guid.to_string(),
            flight_id,
            leg_no: 0,
            passenger: "Doe".to_string(),
            fare_conditions: FareConditions::Economy,
            ticket_no: ticket_no.to_string(),
        }
    }

    #[tokio::test]
    async fn test_dropped_transaction_rolls_back() {
        let store = InMemoryStore::new();
        store.add_flight(flight(1)).await;

        {
            let mut tx = store.begin().await.unwrap();
            tx.insert_booking(&booking("g1", 1, "T1")).await.unwrap();
            // dropped without commit
        }
        assert!(store.bookings("g1").await.is_empty());

        let mut tx = store.begin().await.unwrap();
        tx.insert_booking(&booking("g1", 1, "T1")).await.unwrap();
        tx.commit().await.unwrap();
        assert_eq!(store.bookings("g1").await.len(), 1);
    }

    #[tokio::test]
    async fn test_constraints_mirror_schema() {
        let store = InMemoryStore::new();
        store.add_flight(flight(1)).await;

        let mut tx = store.begin().await.unwrap();
        assert!(tx.insert_booking(&booking("g1", 2, "T1")).await.is_err());
        tx.insert_booking(&booking("g1", 1, "T1")).await.unwrap();
        assert!(tx.insert_booking(&booking("g1", 1, "T2")).await.is_err());

        let pass = BoardingPass {
            ticket_no: "T1".to_string(),
            flight_id: 1,
            boarding_no: 1,
            seat_no: "1A".to_string(),
        };
        tx.insert_boarding_pass(&pass).await.unwrap();

        let same_seat = BoardingPass { ticket_no: "T2".to_string(), boarding_no: 2, ..pass.clone() };
        assert!(tx.insert_boarding_pass(&same_seat).await.is_err());

        let same_number = BoardingPass { ticket_no: "T3".to_string(), seat_no: "1B".to_string(), ..pass };
        assert!(tx.insert_boarding_pass(&same_number).await.is_err());
    }

    #[tokio::test]
    async fn test_flights_departing_window_is_half_open() {
        let store = InMemoryStore::new();
        store.add_flight(flight(1)).await;
        let departure = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        let airports = vec!["LED".to_string()];

        let found = store.flights_departing(&airports, departure, departure + chrono::Duration::hours(1)).await.unwrap();
        assert_eq!(found.len(), 1);

        let found = store.flights_departing(&airports, departure - chrono::Duration::hours(1), departure).await.unwrap();
        assert!(found.is_empty());
    }
}
