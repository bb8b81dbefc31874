use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{Airport, BoardingPass, Booking, FareConditions, Flight, FlightId, Ticket};

pub type StoreError = Box<dyn std::error::Error + Send + Sync>;
pub type StoreResult<T> = Result<T, StoreError>;

/// Read-only access to the flight reference data
#[async_trait]
pub trait FlightRepository: Send + Sync {
    /// Airports whose city or airport code equals `point`.
    async fn resolve_airports(&self, point: &str) -> StoreResult<Vec<Airport>>;

    /// Flights departing any of `airports` with `from <= scheduled_departure < until`.
    async fn flights_departing(
        &self,
        airports: &[String],
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> StoreResult<Vec<Flight>>;

    async fn list_cities(&self) -> StoreResult<Vec<String>>;

    async fn list_airports(&self, city: Option<&str>) -> StoreResult<Vec<Airport>>;

    async fn flights_arriving_at(&self, airport_code: &str) -> StoreResult<Vec<Flight>>;

    async fn flights_departing_from(&self, airport_code: &str) -> StoreResult<Vec<Flight>>;
}

/// Entry point of the transactional gateway
#[async_trait]
pub trait ReservationStore: Send + Sync {
    async fn begin(&self) -> StoreResult<Box<dyn ReservationTx>>;
}

/// One open transaction.
///
/// Dropping it without calling [`ReservationTx::commit`] rolls back every write.
#[async_trait]
pub trait ReservationTx: Send {
    /// Serializes every transaction touching `guid` until this one ends.
    async fn lock_booking_guid(&mut self, guid: &str) -> StoreResult<()>;

    /// Booking rows for `guid`, ordered by leg number.
    async fn bookings_by_guid(&mut self, guid: &str) -> StoreResult<Vec<Booking>>;

    async fn find_booking(&mut self, guid: &str, flight_id: FlightId) -> StoreResult<Option<Booking>>;

    async fn tickets_by_numbers(&mut self, ticket_nos: &[String]) -> StoreResult<Vec<Ticket>>;

    async fn ticket_exists(&mut self, ticket_no: &str) -> StoreResult<bool>;

    async fn find_flight(&mut self, flight_id: FlightId) -> StoreResult<Option<Flight>>;

    async fn insert_booking(&mut self, booking: &Booking) -> StoreResult<()>;

    async fn insert_ticket(&mut self, ticket: &Ticket) -> StoreResult<()>;

    /// Locks the flight row (and so its boarding-pass set) until this transaction ends.
    async fn lock_flight(&mut self, flight_id: FlightId) -> StoreResult<Option<Flight>>;

    /// The boarding pass of the ticket that `guid` holds on `flight_id`, if issued.
    async fn boarding_pass_for_booking(
        &mut self,
        guid: &str,
        flight_id: FlightId,
    ) -> StoreResult<Option<BoardingPass>>;

    /// Seat numbers of `aircraft_code` in `fare_conditions` without a boarding pass on `flight_id`.
    async fn free_seats(
        &mut self,
        flight_id: FlightId,
        aircraft_code: &str,
        fare_conditions: FareConditions,
    ) -> StoreResult<Vec<String>>;

    /// Highest boarding number issued on `flight_id`, 0 when none.
    async fn max_boarding_no(&mut self, flight_id: FlightId) -> StoreResult<i32>;

    async fn insert_boarding_pass(&mut self, pass: &BoardingPass) -> StoreResult<()>;

    async fn commit(self: Box<Self>) -> StoreResult<()>;
}
