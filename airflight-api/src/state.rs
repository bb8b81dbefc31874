use std::sync::Arc;

use airflight_core::{BookingService, CheckInService, FlightRepository, ItinerarySearch};

#[derive(Clone)]
pub struct AppState {
    pub bookings: Arc<BookingService>,
    pub check_in: Arc<CheckInService>,
    pub search: Arc<ItinerarySearch>,
    pub flight_repo: Arc<dyn FlightRepository>,
}

impl AppState {
    /// Wires every service over one reservation store and one flight repository.
    pub fn new(
        reservations: Arc<dyn airflight_core::ReservationStore>,
        flight_repo: Arc<dyn FlightRepository>,
        max_connections: u32,
    ) -> Self {
        Self {
            bookings: Arc::new(BookingService::new(reservations.clone())),
            check_in: Arc::new(CheckInService::new(reservations)),
            search: Arc::new(ItinerarySearch::new(flight_repo.clone(), max_connections)),
            flight_repo,
        }
    }
}
