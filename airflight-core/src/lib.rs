pub mod models;
pub mod repository;
pub mod memory;
pub mod ticket;
pub mod booking;
pub mod checkin;
pub mod search;
pub mod schedule;

pub use booking::BookingService;
pub use checkin::CheckInService;
pub use memory::InMemoryStore;
pub use models::{Airport, BoardingPass, Booking, FareConditions, Flight, FlightId, Seat, Ticket};
pub use repository::{FlightRepository, ReservationStore, ReservationTx, StoreError, StoreResult};
pub use search::{Itinerary, ItinerarySearch, RouteQuery};

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    ValidationError(String),
    #[error("Booking not found for GUID {guid} and flight ID {flight_id}")]
    BookingNotFound { guid: String, flight_id: FlightId },
    #[error("No airports found for '{0}'")]
    AirportNotFound(String),
    #[error("Flight not found: {0}")]
    FlightNotFound(FlightId),
    #[error("No available seats for fare condition {fare_conditions} on flight {flight_id}")]
    NoSeatAvailable {
        flight_id: FlightId,
        fare_conditions: FareConditions,
    },
    #[error("Persistence error: {0}")]
    PersistenceError(#[from] StoreError),
}

pub type CoreResult<T> = Result<T, CoreError>;
