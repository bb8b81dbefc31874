use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::CoreError;

pub type FlightId = i32;

// ============================================================================
// Reference data (provisioned externally, read-only to the services)
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Airport {
    pub airport_code: String,
    pub airport_name: String,
    pub city: String,
    pub timezone: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flight {
    pub flight_id: FlightId,
    pub flight_no: String,
    pub departure_airport: String,
    pub arrival_airport: String,
    pub scheduled_departure: DateTime<Utc>,
    pub scheduled_arrival: DateTime<Utc>,
    pub aircraft_code: String,
}

/// One physical seat of an aircraft type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seat {
    pub aircraft_code: String,
    pub seat_no: String,
    pub fare_conditions: FareConditions,
}

// ============================================================================
// Reservation data (written once by the services, never mutated)
// ============================================================================

/// Fare/service class governing seat eligibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FareConditions {
    Economy,
    EconomySec,
    Comfort,
    Business,
}

impl FareConditions {
    pub const ALL: [FareConditions; 4] = [
        FareConditions::Economy,
        FareConditions::EconomySec,
        FareConditions::Comfort,
        FareConditions::Business,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FareConditions::Economy => "Economy",
            FareConditions::EconomySec => "EconomySec",
            FareConditions::Comfort => "Comfort",
            FareConditions::Business => "Business",
        }
    }
}

impl fmt::Display for FareConditions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FareConditions {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FareConditions::ALL
            .into_iter()
            .find(|fare| fare.as_str() == s)
            .ok_or_else(|| {
                CoreError::ValidationError(format!(
                    "Invalid fare condition '{}'. Must be 'Economy', 'EconomySec', 'Comfort', or 'Business'",
                    s
                ))
            })
    }
}

/// One leg of a booking. All rows sharing a `guid` are written in one transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub guid: String,
    pub flight_id: FlightId,
    /// Position of the leg in the request that created the booking.
    pub leg_no: i32,
    pub passenger: String,
    pub fare_conditions: FareConditions,
    pub ticket_no: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    pub ticket_no: String,
    pub flight_id: FlightId,
    pub fare_conditions: FareConditions,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardingPass {
    pub ticket_no: String,
    pub flight_id: FlightId,
    pub boarding_no: i32,
    pub seat_no: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fare_conditions_parse() {
        for fare in FareConditions::ALL {
            assert_eq!(fare.as_str().parse::<FareConditions>().unwrap(), fare);
        }
        assert!(matches!(
            "First".parse::<FareConditions>(),
            Err(CoreError::ValidationError(_))
        ));
        // Case matters on the wire
        assert!("economy".parse::<FareConditions>().is_err());
    }

    #[test]
    fn test_fare_conditions_serde_uses_wire_names() {
        let json = serde_json::to_string(&FareConditions::EconomySec).unwrap();
        assert_eq!(json, "\"EconomySec\"");

        let ticket: Ticket = serde_json::from_str(
            r#"{"ticket_no":"ABC","flight_id":7,"fare_conditions":"Business"}"#,
        )
        .expect("Failed to deserialize");
        assert_eq!(ticket.fare_conditions, FareConditions::Business);
    }
}
