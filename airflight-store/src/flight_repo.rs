use airflight_core::models::{Airport, Flight};
use airflight_core::repository::{FlightRepository, StoreResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

pub struct PostgresFlightRepository {
    pool: PgPool,
}

impl PostgresFlightRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// Internal structs for type-safe querying
#[derive(sqlx::FromRow)]
pub(crate) struct FlightRow {
    pub flight_id: i32,
    pub flight_no: String,
    pub departure_airport: String,
    pub arrival_airport: String,
    pub scheduled_departure: DateTime<Utc>,
    pub scheduled_arrival: DateTime<Utc>,
    pub aircraft_code: String,
}

impl From<FlightRow> for Flight {
    fn from(row: FlightRow) -> Self {
        Flight {
            flight_id: row.flight_id,
            flight_no: row.flight_no,
            departure_airport: row.departure_airport,
            arrival_airport: row.arrival_airport,
            scheduled_departure: row.scheduled_departure,
            scheduled_arrival: row.scheduled_arrival,
            aircraft_code: row.aircraft_code,
        }
    }
}

#[derive(sqlx::FromRow)]
struct AirportRow {
    airport_code: String,
    airport_name: String,
    city: String,
    timezone: String,
}

impl From<AirportRow> for Airport {
    fn from(row: AirportRow) -> Self {
        Airport {
            airport_code: row.airport_code,
            airport_name: row.airport_name,
            city: row.city,
            timezone: row.timezone,
        }
    }
}

pub(crate) const FLIGHT_COLUMNS: &str = "flight_id, flight_no, departure_airport, arrival_airport, \
     scheduled_departure, scheduled_arrival, aircraft_code";

#[async_trait]
impl FlightRepository for PostgresFlightRepository {
    async fn resolve_airports(&self, point: &str) -> StoreResult<Vec<Airport>> {
        let rows = sqlx::query_as::<_, AirportRow>(
            r#"
            SELECT airport_code, airport_name, city, timezone
            FROM airports
            WHERE city = $1 OR airport_code = $1
            ORDER BY airport_code
            "#,
        )
        .bind(point)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Airport::from).collect())
    }

    async fn flights_departing(
        &self,
        airports: &[String],
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> StoreResult<Vec<Flight>> {
        if airports.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            r#"
            SELECT {FLIGHT_COLUMNS}
            FROM flights
            WHERE departure_airport = ANY($1)
              AND scheduled_departure >= $2
              AND scheduled_departure < $3
            ORDER BY scheduled_departure, flight_id
            "#
        );
        let rows = sqlx::query_as::<_, FlightRow>(&sql)
            .bind(airports)
            .bind(from)
            .bind(until)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(Flight::from).collect())
    }

    async fn list_cities(&self) -> StoreResult<Vec<String>> {
        let cities: Vec<String> = sqlx::query_scalar("SELECT DISTINCT city FROM airports ORDER BY city")
            .fetch_all(&self.pool)
            .await?;
        Ok(cities)
    }

    async fn list_airports(&self, city: Option<&str>) -> StoreResult<Vec<Airport>> {
        let rows = sqlx::query_as::<_, AirportRow>(
            r#"
            SELECT airport_code, airport_name, city, timezone
            FROM airports
            WHERE $1::text IS NULL OR city = $1
            ORDER BY airport_code
            "#,
        )
        .bind(city)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Airport::from).collect())
    }

    async fn flights_arriving_at(&self, airport_code: &str) -> StoreResult<Vec<Flight>> {
        let sql = format!(
            "SELECT {FLIGHT_COLUMNS} FROM flights WHERE arrival_airport = $1 ORDER BY scheduled_arrival, flight_id"
        );
        let rows = sqlx::query_as::<_, FlightRow>(&sql)
            .bind(airport_code)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Flight::from).collect())
    }

    async fn flights_departing_from(&self, airport_code: &str) -> StoreResult<Vec<Flight>> {
        let sql = format!(
            "SELECT {FLIGHT_COLUMNS} FROM flights WHERE departure_airport = $1 ORDER BY scheduled_departure, flight_id"
        );
        let rows = sqlx::query_as::<_, FlightRow>(&sql)
            .bind(airport_code)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Flight::from).collect())
    }
}
