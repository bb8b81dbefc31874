use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info, warn};

use crate::models::{Booking, FareConditions, FlightId, Ticket};
use crate::repository::ReservationStore;
use crate::ticket::{allocate_ticket_no, random_ticket_no};
use crate::{CoreError, CoreResult};

/// Idempotent booking creation keyed by a client-supplied GUID
pub struct BookingService {
    store: Arc<dyn ReservationStore>,
    rng: Mutex<StdRng>,
}

impl BookingService {
    pub fn new(store: Arc<dyn ReservationStore>) -> Self {
        Self::with_rng(store, StdRng::from_entropy())
    }

    /// Draws ticket numbers from `rng` instead of an entropy-seeded generator.
    pub fn with_rng(store: Arc<dyn ReservationStore>, rng: StdRng) -> Self {
        Self {
            store,
            rng: Mutex::new(rng),
        }
    }

    fn next_ticket_no(&self) -> String {
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        random_ticket_no(&mut *rng)
    }

    /// Creates one booking row and one ticket per leg, or returns the tickets
    /// of an earlier booking with the same `guid` untouched.
    ///
    /// A replay ignores `passenger`, `fare_conditions` and `flight_ids`; the
    /// first request to commit wins.
    pub async fn create_or_fetch_booking(
        &self,
        guid: &str,
        passenger: &str,
        fare_conditions: &str,
        flight_ids: &[FlightId],
    ) -> CoreResult<Vec<Ticket>> {
        let fare_conditions = validate_request(guid, fare_conditions, flight_ids)?;

        let mut tx = self.store.begin().await?;
        tx.lock_booking_guid(guid).await?;

        let existing = tx.bookings_by_guid(guid).await?;
        if !existing.is_empty() {
            let ticket_nos: Vec<String> = existing.into_iter().map(|b| b.ticket_no).collect();
            let mut tickets = tx.tickets_by_numbers(&ticket_nos).await?;
            tx.commit().await?;

            if tickets.len() != ticket_nos.len() {
                return Err(CoreError::PersistenceError(
                    format!("booking {} references {} tickets but {} exist", guid, ticket_nos.len(), tickets.len()).into(),
                ));
            }
            tickets.sort_by_key(|t| ticket_nos.iter().position(|no| *no == t.ticket_no));

            debug!("Booking {} already exists, returning {} tickets", guid, tickets.len());
            return Ok(tickets);
        }

        let mut tickets: Vec<Ticket> = Vec::with_capacity(flight_ids.len());
        let mut issued: Vec<String> = Vec::with_capacity(flight_ids.len());

        for (leg_no, &flight_id) in flight_ids.iter().enumerate() {
            if tx.find_flight(flight_id).await?.is_none() {
                warn!("Booking {} rejected: unknown flight {}", guid, flight_id);
                return Err(CoreError::FlightNotFound(flight_id));
            }

            let ticket_no = allocate_ticket_no(tx.as_mut(), &issued, || self.next_ticket_no())
                .await?
                .ok_or_else(|| CoreError::PersistenceError("could not allocate a unique ticket number".into()))?;

            let booking = Booking {
                guid: guid.to_string(),
                flight_id,
                leg_no: leg_no as i32,
                passenger: passenger.to_string(),
                fare_conditions,
                ticket_no: ticket_no.clone(),
            };
            let ticket = Ticket {
                ticket_no: ticket_no.clone(),
                flight_id,
                fare_conditions,
            };

            tx.insert_ticket(&ticket).await?;
            tx.insert_booking(&booking).await?;

            issued.push(ticket_no);
            tickets.push(ticket);
        }

        tx.commit().await?;

        info!("Booking {} created: {} legs, {}", guid, tickets.len(), fare_conditions);
        Ok(tickets)
    }
}

fn validate_request(guid: &str, fare_conditions: &str, flight_ids: &[FlightId]) -> CoreResult<FareConditions> {
    if guid.trim().is_empty() {
        return Err(CoreError::ValidationError("Missing guid parameter".to_string()));
    }

    let fare_conditions: FareConditions = fare_conditions.parse()?;

    if flight_ids.is_empty() {
        return Err(CoreError::ValidationError("At least one flight id is required".to_string()));
    }

    let mut seen = HashSet::with_capacity(flight_ids.len());
    if let Some(dup) = flight_ids.iter().find(|id| !seen.insert(**id)) {
        return Err(CoreError::ValidationError(format!("Flight {} appears more than once", dup)));
    }

    Ok(fare_conditions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryStore;
    use crate::models::Flight;
    use chrono::{TimeZone, Utc};

    async fn seeded_store() -> InMemoryStore {
        let store = InMemoryStore::new();
        for (id, from, to) in [(100, "LED", "SVO"), (101, "SVO", "KZN"), (999, "KZN", "LED")] {
            store
                .add_flight(Flight {
                    flight_id: id,
                    flight_no: format!("PG{:04}", id),
                    departure_airport: from.to_string(),
                    arrival_airport: to.to_string(),
                    scheduled_departure: Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap(),
                    scheduled_arrival: Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap(),
                    aircraft_code: "321".to_string(),
                })
                .await;
        }
        store
    }

    fn service(store: &InMemoryStore) -> BookingService {
        BookingService::new(Arc::new(store.clone()))
    }

    #[tokio::test]
    async fn test_creates_one_ticket_per_leg() {
        let store = seeded_store().await;
        let tickets = service(&store)
            .create_or_fetch_booking("g1", "Doe", "Economy", &[100, 101])
            .await
            .unwrap();

        assert_eq!(tickets.len(), 2);
        assert_eq!(tickets[0].flight_id, 100);
        assert_eq!(tickets[1].flight_id, 101);
        assert!(tickets.iter().all(|t| t.fare_conditions == FareConditions::Economy));
        assert_ne!(tickets[0].ticket_no, tickets[1].ticket_no);

        let rows = store.bookings("g1").await;
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|b| b.passenger == "Doe"));
        assert_eq!(store.ticket_count().await, 2);
    }

    #[tokio::test]
    async fn test_resubmission_returns_original_tickets() {
        let store = seeded_store().await;
        let svc = service(&store);

        let first = svc.create_or_fetch_booking("g1", "Doe", "Economy", &[100, 101]).await.unwrap();
        let second = svc.create_or_fetch_booking("g1", "Roe", "Business", &[999]).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(second.iter().map(|t| t.flight_id).collect::<Vec<_>>(), vec![100, 101]);
        assert_eq!(store.ticket_count().await, 2);
    }

    #[tokio::test]
    async fn test_replay_keeps_request_leg_order() {
        let store = seeded_store().await;
        let svc = service(&store);

        let first = svc.create_or_fetch_booking("g2", "Doe", "Comfort", &[999, 100]).await.unwrap();
        let replay = svc.create_or_fetch_booking("g2", "Doe", "Comfort", &[999, 100]).await.unwrap();
        assert_eq!(replay.iter().map(|t| t.flight_id).collect::<Vec<_>>(), vec![999, 100]);
        assert_eq!(first, replay);
    }

    #[tokio::test]
    async fn test_invalid_input_never_reaches_store() {
        let store = seeded_store().await;
        let svc = service(&store);

        for (guid, fare, legs) in [
            ("g1", "First", vec![100]),
            ("  ", "Economy", vec![100]),
            ("g1", "Economy", vec![]),
            ("g1", "Economy", vec![100, 100]),
        ] {
            let result = svc.create_or_fetch_booking(guid, "Doe", fare, &legs).await;
            assert!(matches!(result, Err(CoreError::ValidationError(_))), "{:?}", result);
        }
        assert_eq!(store.operation_count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_leg_rolls_back_whole_booking() {
        let store = seeded_store().await;
        let result = service(&store)
            .create_or_fetch_booking("g1", "Doe", "Economy", &[100, 404])
            .await;

        assert!(matches!(result, Err(CoreError::FlightNotFound(404))));
        assert!(store.bookings("g1").await.is_empty());
        assert_eq!(store.ticket_count().await, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_same_guid_creates_once() {
        let store = seeded_store().await;
        let svc = Arc::new(service(&store));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let svc = svc.clone();
                let legs = if i % 2 == 0 { vec![100, 101] } else { vec![999] };
                tokio::spawn(async move { svc.create_or_fetch_booking("race", "Doe", "Economy", &legs).await })
            })
            .collect();

        let mut results = Vec::new();
        for handle in handles {
            results.push(handle.await.unwrap().unwrap());
        }

        assert!(results.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(store.ticket_count().await, results[0].len());
    }

    #[tokio::test]
    async fn test_exhausted_ticket_numbers_fail_without_writes() {
        let store = seeded_store().await;

        // Occupy every number the seeded generator will offer
        let mut preview = StdRng::seed_from_u64(11);
        let mut tx = store.begin().await.unwrap();
        for _ in 0..crate::ticket::TICKET_NO_ATTEMPTS {
            tx.insert_ticket(&Ticket {
                ticket_no: random_ticket_no(&mut preview),
                flight_id: 999,
                fare_conditions: FareConditions::Economy,
            })
            .await
            .unwrap();
        }
        tx.commit().await.unwrap();

        let svc = BookingService::with_rng(Arc::new(store.clone()), StdRng::seed_from_u64(11));
        let result = svc.create_or_fetch_booking("g9", "Doe", "Economy", &[100]).await;

        assert!(matches!(result, Err(CoreError::PersistenceError(_))), "{:?}", result);
        assert!(store.bookings("g9").await.is_empty());
        assert_eq!(store.ticket_count().await, crate::ticket::TICKET_NO_ATTEMPTS);
    }
}
