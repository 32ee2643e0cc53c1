//! Flight, group and pricing data models.
//!
//! # CHANGELOG (recent first, max 5 entries)
//! 07/21/2026 - Added pricing entries and partner-booking flags (Claude)
//! 07/18/2026 - Initial implementation (Claude)

use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::ids;

/// The four award cabins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cabin {
    Y,
    W,
    J,
    F,
}

impl Cabin {
    pub const ALL: [Cabin; 4] = [Cabin::Y, Cabin::W, Cabin::J, Cabin::F];

    pub fn as_char(&self) -> char {
        match self {
            Cabin::Y => 'Y',
            Cabin::W => 'W',
            Cabin::J => 'J',
            Cabin::F => 'F',
        }
    }
}

/// One value per cabin.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CabinValues<T> {
    pub y: T,
    pub w: T,
    pub j: T,
    pub f: T,
}

impl<T> CabinValues<T> {
    pub fn get(&self, cabin: Cabin) -> &T {
        match cabin {
            Cabin::Y => &self.y,
            Cabin::W => &self.w,
            Cabin::J => &self.j,
            Cabin::F => &self.f,
        }
    }
}

/// The atomic offer: one flight with per-cabin award availability.
///
/// Identity is the (flight_number, departs_at, arrives_at) tuple; everything
/// else is mutable between provider responses and excluded from the digest.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Flight {
    /// Carrier-prefixed number, e.g. "VN123".
    pub flight_number: String,
    pub departs_at: DateTime<FixedOffset>,
    pub arrives_at: DateTime<FixedOffset>,
    pub duration_minutes: u32,
    pub origin: String,
    pub destination: String,
    /// Award seat counts per cabin.
    pub seats: CabinValues<u32>,
    /// Whether the cabin is bookable through a partner program.
    pub partner: CabinValues<bool>,
    /// Fare descriptors per cabin, when the provider reports them.
    #[serde(default)]
    pub fares: CabinValues<Option<String>>,
    #[serde(default)]
    pub aircraft: Option<String>,
    /// Upstream feed that produced this offer.
    pub source: String,
}

impl Flight {
    /// Stable short identifier; memoized process-wide.
    pub fn uuid(&self) -> String {
        ids::flight_uuid(
            &self.flight_number,
            &self.departs_at.to_rfc3339(),
            &self.arrives_at.to_rfc3339(),
        )
    }

    /// Two-character carrier prefix, upper-cased.
    pub fn carrier(&self) -> String {
        self.flight_number.chars().take(2).collect::<String>().to_uppercase()
    }

    pub fn departs_ms(&self) -> i64 {
        self.departs_at.timestamp_millis()
    }

    pub fn arrives_ms(&self) -> i64 {
        self.arrives_at.timestamp_millis()
    }

    /// Calendar date of departure in the departure airport's local time.
    pub fn local_departure_date(&self) -> NaiveDate {
        self.departs_at.date_naive()
    }
}

/// A provider response bucket: flights for one (origin, destination, date,
/// alliance, source) tuple, with a timing envelope for group-level pruning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub origin: String,
    pub destination: String,
    pub date: NaiveDate,
    /// Alliance tag, e.g. "OW", "ST", "SA", or "*" when mixed.
    pub alliance: String,
    pub source: String,
    pub flights: Vec<Flight>,
    #[serde(default)]
    pub earliest_departure: Option<DateTime<FixedOffset>>,
    #[serde(default)]
    pub latest_departure: Option<DateTime<FixedOffset>>,
    #[serde(default)]
    pub earliest_arrival: Option<DateTime<FixedOffset>>,
    #[serde(default)]
    pub latest_arrival: Option<DateTime<FixedOffset>>,
}

impl Group {
    pub fn key(&self) -> String {
        format!(
            "{}-{}-{}-{}-{}",
            self.origin, self.destination, self.date, self.alliance, self.source
        )
    }
}

/// Per-cabin mileage and tax record for one flight on one feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingEntry {
    pub flight_number: String,
    pub origin: String,
    pub destination: String,
    pub source: String,
    #[serde(default)]
    pub miles: CabinValues<Option<u32>>,
    #[serde(default)]
    pub taxes: CabinValues<Option<f64>>,
    #[serde(default)]
    pub fare_classes: CabinValues<Vec<String>>,
}

impl PricingEntry {
    pub fn id(&self) -> String {
        ids::pricing_id(&self.flight_number, &self.origin, &self.destination, &self.source)
    }

    /// Index key shared with the pricing lookup in the metadata pass.
    pub fn route_key(&self) -> (String, String, String, String) {
        (
            self.flight_number.clone(),
            self.origin.clone(),
            self.destination.clone(),
            self.source.clone(),
        )
    }
}

#[cfg(test)]
pub(crate) mod test_fixtures {
    use super::*;

    /// Build a flight with full Y availability and the given timing.
    pub fn flight(number: &str, origin: &str, dest: &str, departs: &str, arrives: &str) -> Flight {
        let departs_at = DateTime::parse_from_rfc3339(departs).unwrap();
        let arrives_at = DateTime::parse_from_rfc3339(arrives).unwrap();
        let duration_minutes =
            ((arrives_at.timestamp() - departs_at.timestamp()) / 60).max(0) as u32;
        Flight {
            flight_number: number.into(),
            departs_at,
            arrives_at,
            duration_minutes,
            origin: origin.into(),
            destination: dest.into(),
            seats: CabinValues { y: 9, w: 0, j: 0, f: 0 },
            partner: CabinValues::default(),
            fares: CabinValues::default(),
            aircraft: None,
            source: "test".into(),
        }
    }

    /// Wrap flights into a group, deriving the timing envelope.
    pub fn group(alliance: &str, flights: Vec<Flight>) -> Group {
        let first = flights.first().expect("group needs at least one flight");
        let origin = first.origin.clone();
        let destination = first.destination.clone();
        let date = first.local_departure_date();
        let earliest_departure = flights.iter().map(|f| f.departs_at).min();
        let latest_departure = flights.iter().map(|f| f.departs_at).max();
        let earliest_arrival = flights.iter().map(|f| f.arrives_at).min();
        let latest_arrival = flights.iter().map(|f| f.arrives_at).max();
        Group {
            origin,
            destination,
            date,
            alliance: alliance.into(),
            source: "test".into(),
            flights,
            earliest_departure,
            latest_departure,
            earliest_arrival,
            latest_arrival,
        }
    }
}
