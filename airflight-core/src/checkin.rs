use std::sync::Arc;

use tracing::{debug, info};

use crate::models::{BoardingPass, FlightId};
use crate::repository::ReservationStore;
use crate::{CoreError, CoreResult};

/// Seat assignment and boarding-pass issue at check-in
pub struct CheckInService {
    store: Arc<dyn ReservationStore>,
}

impl CheckInService {
    pub fn new(store: Arc<dyn ReservationStore>) -> Self {
        Self { store }
    }

    /// Issues the boarding pass for the leg `flight_id` of booking `guid`.
    ///
    /// Repeated calls return the pass issued first. Seat choice and boarding
    /// number are computed while the flight row is locked, so concurrent
    /// check-ins on one flight never share either.
    pub async fn check_in(&self, guid: &str, flight_id: FlightId) -> CoreResult<BoardingPass> {
        if guid.trim().is_empty() {
            return Err(CoreError::ValidationError("GUID is required".to_string()));
        }

        let mut tx = self.store.begin().await?;

        if let Some(pass) = tx.boarding_pass_for_booking(guid, flight_id).await? {
            tx.commit().await?;
            debug!("Boarding pass for {} on flight {} already issued", guid, flight_id);
            return Ok(pass);
        }

        let booking = tx.find_booking(guid, flight_id).await?.ok_or_else(|| CoreError::BookingNotFound {
            guid: guid.to_string(),
            flight_id,
        })?;

        let flight = tx
            .lock_flight(flight_id)
            .await?
            .ok_or(CoreError::FlightNotFound(flight_id))?;

        // Re-check under the lock: a concurrent check-in for this booking may have committed meanwhile
        if let Some(pass) = tx.boarding_pass_for_booking(guid, flight_id).await? {
            tx.commit().await?;
            debug!("Boarding pass for {} on flight {} issued concurrently", guid, flight_id);
            return Ok(pass);
        }

        let free_seats = tx
            .free_seats(flight_id, &flight.aircraft_code, booking.fare_conditions)
            .await?;
        let seat_no = select_seat(free_seats).ok_or(CoreError::NoSeatAvailable {
            flight_id,
            fare_conditions: booking.fare_conditions,
        })?;

        let boarding_no = tx.max_boarding_no(flight_id).await? + 1;

        let pass = BoardingPass {
            ticket_no: booking.ticket_no,
            flight_id,
            boarding_no,
            seat_no,
        };
        tx.insert_boarding_pass(&pass).await?;
        tx.commit().await?;

        info!(
            "Checked in {} on flight {}: seat {}, boarding no {}",
            pass.ticket_no, flight_id, pass.seat_no, pass.boarding_no
        );
        Ok(pass)
    }
}

/// Lowest seat in cabin order: row number first, then seat letter.
pub fn select_seat(free_seats: Vec<String>) -> Option<String> {
    free_seats.into_iter().min_by(|a, b| seat_order_key(a).cmp(&seat_order_key(b)))
}

fn seat_order_key(seat_no: &str) -> (u32, &str) {
    let split = seat_no.find(|c: char| !c.is_ascii_digit()).unwrap_or(seat_no.len());
    let row = seat_no[..split].parse().unwrap_or(u32::MAX);
    (row, &seat_no[split..])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::booking::BookingService;
    use crate::memory::InMemoryStore;
    use crate::models::{FareConditions, Flight};
    use chrono::{TimeZone, Utc};
    use std::collections::HashSet;

    async fn seeded_store() -> InMemoryStore {
        let store = InMemoryStore::new();
        store
            .add_flight(Flight {
                flight_id: 100,
                flight_no: "PG0100".to_string(),
                departure_airport: "LED".to_string(),
                arrival_airport: "SVO".to_string(),
                scheduled_departure: Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap(),
                scheduled_arrival: Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap(),
                aircraft_code: "SU9".to_string(),
            })
            .await;
        store.add_seats("SU9", FareConditions::Business, &["1A"]).await;
        store.add_seats("SU9", FareConditions::Comfort, &["5C"]).await;
        store
            .add_seats("SU9", FareConditions::Economy, &["10A", "2A", "2B", "11C", "3F"])
            .await;
        // Same seat numbers on another aircraft type must not leak in
        store.add_seats("733", FareConditions::Economy, &["1A", "1B"]).await;
        store
    }

    async fn book(store: &InMemoryStore, guid: &str, fare: &str) {
        BookingService::new(Arc::new(store.clone()))
            .create_or_fetch_booking(guid, "Doe", fare, &[100])
            .await
            .unwrap();
    }

    fn service(store: &InMemoryStore) -> CheckInService {
        CheckInService::new(Arc::new(store.clone()))
    }

    #[test]
    fn test_select_seat_uses_cabin_order() {
        let seats = vec!["10A".to_string(), "2B".to_string(), "2A".to_string(), "9C".to_string()];
        assert_eq!(select_seat(seats).as_deref(), Some("2A"));
        assert_eq!(select_seat(vec![]), None);
    }

    #[tokio::test]
    async fn test_first_check_in_gets_first_seat_and_number() {
        let store = seeded_store().await;
        book(&store, "g1", "Economy").await;

        let pass = service(&store).check_in("g1", 100).await.unwrap();
        assert_eq!(pass.seat_no, "2A");
        assert_eq!(pass.boarding_no, 1);
        assert_eq!(pass.flight_id, 100);
        assert_eq!(pass.ticket_no, store.bookings("g1").await[0].ticket_no);
    }

    #[tokio::test]
    async fn test_check_in_is_idempotent() {
        let store = seeded_store().await;
        book(&store, "g1", "Economy").await;
        let svc = service(&store);

        let first = svc.check_in("g1", 100).await.unwrap();
        let second = svc.check_in("g1", 100).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(store.boarding_passes(100).await.len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_booking_is_not_found() {
        let store = seeded_store().await;
        book(&store, "g1", "Economy").await;

        let result = service(&store).check_in("nobody", 100).await;
        assert!(matches!(result, Err(CoreError::BookingNotFound { .. })));

        let result = service(&store).check_in("g1", 101).await;
        assert!(matches!(result, Err(CoreError::BookingNotFound { flight_id: 101, .. })));
    }

    #[tokio::test]
    async fn test_no_seat_left_in_fare_class() {
        let store = seeded_store().await;
        book(&store, "c1", "Comfort").await;
        book(&store, "c2", "Comfort").await;
        book(&store, "e1", "EconomySec").await;
        let svc = service(&store);

        assert_eq!(svc.check_in("c1", 100).await.unwrap().seat_no, "5C");
        assert!(matches!(
            svc.check_in("c2", 100).await,
            Err(CoreError::NoSeatAvailable { flight_id: 100, fare_conditions: FareConditions::Comfort })
        ));
        assert!(matches!(svc.check_in("e1", 100).await, Err(CoreError::NoSeatAvailable { .. })));
        assert_eq!(store.boarding_passes(100).await.len(), 1);
    }

    #[tokio::test]
    async fn test_boarding_numbers_are_dense_across_fare_classes() {
        let store = seeded_store().await;
        for (guid, fare) in [("a", "Economy"), ("b", "Business"), ("c", "Economy"), ("d", "Comfort")] {
            book(&store, guid, fare).await;
        }
        let svc = service(&store);
        for guid in ["a", "b", "c", "d"] {
            svc.check_in(guid, 100).await.unwrap();
        }

        let passes = store.boarding_passes(100).await;
        let numbers: Vec<i32> = passes.iter().map(|p| p.boarding_no).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4]);
        let seats: Vec<&str> = passes.iter().map(|p| p.seat_no.as_str()).collect();
        assert_eq!(seats, vec!["2A", "1A", "2B", "5C"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_check_ins_never_share_seats() {
        let store = seeded_store().await;
        let guids: Vec<String> = (0..7).map(|i| format!("pax-{}", i)).collect();
        for guid in &guids {
            book(&store, guid, "Economy").await;
        }
        let svc = Arc::new(service(&store));

        let handles: Vec<_> = guids
            .iter()
            .cloned()
            .map(|guid| {
                let svc = svc.clone();
                tokio::spawn(async move { svc.check_in(&guid, 100).await })
            })
            .collect();

        let mut issued = Vec::new();
        let mut sold_out = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(pass) => issued.push(pass),
                Err(CoreError::NoSeatAvailable { .. }) => sold_out += 1,
                Err(e) => panic!("unexpected error: {}", e),
            }
        }

        // Five Economy seats on the aircraft
        assert_eq!(issued.len(), 5);
        assert_eq!(sold_out, 2);
        let seats: HashSet<&str> = issued.iter().map(|p| p.seat_no.as_str()).collect();
        assert_eq!(seats.len(), 5);
        let mut numbers: Vec<i32> = issued.iter().map(|p| p.boarding_no).collect();
        numbers.sort();
        assert_eq!(numbers, vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_check_ins_for_one_booking_issue_one_pass() {
        let store = seeded_store().await;
        book(&store, "g1", "Economy").await;
        let svc = Arc::new(service(&store));

        let a = tokio::spawn({
            let svc = svc.clone();
            async move { svc.check_in("g1", 100).await }
        });
        let b = tokio::spawn({
            let svc = svc.clone();
            async move { svc.check_in("g1", 100).await }
        });

        let a = a.await.unwrap().unwrap();
        let b = b.await.unwrap().unwrap();
        assert_eq!(a, b);
        assert_eq!(store.boarding_passes(100).await, vec![a]);
    }
}
