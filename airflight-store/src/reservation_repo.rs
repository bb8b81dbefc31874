use airflight_core::models::{BoardingPass, Booking, FareConditions, Flight, FlightId, Ticket};
use airflight_core::repository::{ReservationStore, ReservationTx, StoreResult};
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};

use crate::flight_repo::{FlightRow, FLIGHT_COLUMNS};

/// Transactional gateway over the reservation tables.
pub struct PgReservationStore {
    pool: PgPool,
}

impl PgReservationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReservationStore for PgReservationStore {
    async fn begin(&self) -> StoreResult<Box<dyn ReservationTx>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgReservationTx { tx }))
    }
}

/// Rolled back by sqlx when dropped uncommitted.
pub struct PgReservationTx {
    tx: Transaction<'static, Postgres>,
}

#[derive(sqlx::FromRow)]
struct BookingRow {
    guid: String,
    flight_id: i32,
    leg_no: i32,
    passenger: String,
    fare_conditions: String,
    ticket_no: String,
}

impl TryFrom<BookingRow> for Booking {
    type Error = airflight_core::CoreError;

    fn try_from(row: BookingRow) -> Result<Self, Self::Error> {
        Ok(Booking {
            guid: row.guid,
            flight_id: row.flight_id,
            leg_no: row.leg_no,
            passenger: row.passenger,
            fare_conditions: row.fare_conditions.parse()?,
            ticket_no: row.ticket_no,
        })
    }
}

#[derive(sqlx::FromRow)]
struct TicketRow {
    ticket_no: String,
    flight_id: i32,
    fare_conditions: String,
}

impl TryFrom<TicketRow> for Ticket {
    type Error = airflight_core::CoreError;

    fn try_from(row: TicketRow) -> Result<Self, Self::Error> {
        Ok(Ticket {
            ticket_no: row.ticket_no,
            flight_id: row.flight_id,
            fare_conditions: row.fare_conditions.parse()?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct BoardingPassRow {
    ticket_no: String,
    flight_id: i32,
    boarding_no: i32,
    seat_no: String,
}

impl From<BoardingPassRow> for BoardingPass {
    fn from(row: BoardingPassRow) -> Self {
        BoardingPass {
            ticket_no: row.ticket_no,
            flight_id: row.flight_id,
            boarding_no: row.boarding_no,
            seat_no: row.seat_no,
        }
    }
}

#[async_trait]
impl ReservationTx for PgReservationTx {
    async fn lock_booking_guid(&mut self, guid: &str) -> StoreResult<()> {
        // Held until commit or rollback, so a second request for the same guid
        // waits and then sees the committed rows.
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(guid)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn bookings_by_guid(&mut self, guid: &str) -> StoreResult<Vec<Booking>> {
        let rows = sqlx::query_as::<_, BookingRow>(
            r#"
            SELECT guid, flight_id, leg_no, passenger, fare_conditions, ticket_no
            FROM bookings
            WHERE guid = $1
            ORDER BY leg_no
            "#,
        )
        .bind(guid)
        .fetch_all(&mut *self.tx)
        .await?;

        let mut bookings = Vec::with_capacity(rows.len());
        for row in rows {
            bookings.push(Booking::try_from(row)?);
        }
        Ok(bookings)
    }

    async fn find_booking(&mut self, guid: &str, flight_id: FlightId) -> StoreResult<Option<Booking>> {
        let row = sqlx::query_as::<_, BookingRow>(
            r#"
            SELECT guid, flight_id, leg_no, passenger, fare_conditions, ticket_no
            FROM bookings
            WHERE guid = $1 AND flight_id = $2
            "#,
        )
        .bind(guid)
        .bind(flight_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(row.map(Booking::try_from).transpose()?)
    }

    async fn tickets_by_numbers(&mut self, ticket_nos: &[String]) -> StoreResult<Vec<Ticket>> {
        let rows = sqlx::query_as::<_, TicketRow>(
            "SELECT ticket_no, flight_id, fare_conditions FROM tickets WHERE ticket_no = ANY($1)",
        )
        .bind(ticket_nos)
        .fetch_all(&mut *self.tx)
        .await?;

        let mut tickets = Vec::with_capacity(rows.len());
        for row in rows {
            tickets.push(Ticket::try_from(row)?);
        }
        Ok(tickets)
    }

    async fn ticket_exists(&mut self, ticket_no: &str) -> StoreResult<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM tickets WHERE ticket_no = $1)")
            .bind(ticket_no)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(exists)
    }

    async fn find_flight(&mut self, flight_id: FlightId) -> StoreResult<Option<Flight>> {
        let sql = format!("SELECT {FLIGHT_COLUMNS} FROM flights WHERE flight_id = $1");
        let row = sqlx::query_as::<_, FlightRow>(&sql)
            .bind(flight_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(row.map(Flight::from))
    }

    async fn insert_booking(&mut self, booking: &Booking) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO bookings (guid, flight_id, leg_no, passenger, fare_conditions, ticket_no)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(&booking.guid)
        .bind(booking.flight_id)
        .bind(booking.leg_no)
        .bind(&booking.passenger)
        .bind(booking.fare_conditions.as_str())
        .bind(&booking.ticket_no)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn insert_ticket(&mut self, ticket: &Ticket) -> StoreResult<()> {
        sqlx::query("INSERT INTO tickets (ticket_no, flight_id, fare_conditions) VALUES ($1, $2, $3)")
            .bind(&ticket.ticket_no)
            .bind(ticket.flight_id)
            .bind(ticket.fare_conditions.as_str())
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn lock_flight(&mut self, flight_id: FlightId) -> StoreResult<Option<Flight>> {
        // Row lock serializes check-ins on one flight; boarding numbers and
        // seat picks below are computed under it. Bookings referencing the
        // flight take KEY SHARE and must not wait on it.
        let sql = format!("SELECT {FLIGHT_COLUMNS} FROM flights WHERE flight_id = $1 FOR NO KEY UPDATE");
        let row = sqlx::query_as::<_, FlightRow>(&sql)
            .bind(flight_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(row.map(Flight::from))
    }

    async fn boarding_pass_for_booking(
        &mut self,
        guid: &str,
        flight_id: FlightId,
    ) -> StoreResult<Option<BoardingPass>> {
        let row = sqlx::query_as::<_, BoardingPassRow>(
            r#"
            SELECT bp.ticket_no, bp.flight_id, bp.boarding_no, bp.seat_no
            FROM boarding_passes bp
            JOIN bookings b ON b.ticket_no = bp.ticket_no AND b.flight_id = bp.flight_id
            WHERE b.guid = $1 AND b.flight_id = $2
            "#,
        )
        .bind(guid)
        .bind(flight_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(row.map(BoardingPass::from))
    }

    async fn free_seats(
        &mut self,
        flight_id: FlightId,
        aircraft_code: &str,
        fare_conditions: FareConditions,
    ) -> StoreResult<Vec<String>> {
        let seats: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT s.seat_no
            FROM seats s
            WHERE s.aircraft_code = $1
              AND s.fare_conditions = $2
              AND NOT EXISTS (
                  SELECT 1 FROM boarding_passes bp
                  WHERE bp.flight_id = $3 AND bp.seat_no = s.seat_no
              )
            "#,
        )
        .bind(aircraft_code)
        .bind(fare_conditions.as_str())
        .bind(flight_id)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(seats)
    }

    async fn max_boarding_no(&mut self, flight_id: FlightId) -> StoreResult<i32> {
        let max: i32 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(boarding_no), 0) FROM boarding_passes WHERE flight_id = $1",
        )
        .bind(flight_id)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(max)
    }

    async fn insert_boarding_pass(&mut self, pass: &BoardingPass) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO boarding_passes (ticket_no, flight_id, boarding_no, seat_no) VALUES ($1, $2, $3, $4)",
        )
        .bind(&pass.ticket_no)
        .bind(pass.flight_id)
        .bind(pass.boarding_no)
        .bind(&pass.seat_no)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
