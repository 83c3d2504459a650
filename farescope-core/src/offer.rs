use crate::search::CabinClass;
use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;

/// An exact monetary amount.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Money {
    pub amount: Decimal,
    pub currency: String,
}

impl Money {
    pub fn new(amount: Decimal, currency: impl Into<String>) -> Self {
        Self {
            amount,
            currency: currency.into(),
        }
    }

    /// Amount rounded half-away-from-zero to two decimals.
    pub fn rounded(&self) -> Decimal {
        self.amount
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.rounded(), self.currency)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopDetail {
    pub airport: String,
    #[serde(default)]
    pub city: Option<String>,
    pub arrival_time: DateTime<Utc>,
    pub departure_time: DateTime<Utc>,
    #[serde(default)]
    pub duration_minutes: u32,
}

/// One bookable itinerary as returned by a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Offer {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub provider: String,
    /// Providers that returned the same itinerary but lost deduplication.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub also_from: Vec<String>,
    pub origin: String,
    pub destination: String,
    pub departure_time: DateTime<Utc>,
    pub arrival_time: DateTime<Utc>,
    #[serde(default)]
    pub duration_minutes: u32,
    #[serde(default)]
    pub stops: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stop_details: Vec<StopDetail>,
    pub airline_code: String,
    pub flight_number: String,
    #[serde(default)]
    pub aircraft_code: Option<String>,
    pub cabin: CabinClass,
    pub price: Money,
    #[serde(default)]
    pub refundable: bool,
    #[serde(default)]
    pub baggage_included: bool,
    #[serde(default)]
    pub booking_url: Option<String>,
    pub valid_until: DateTime<Utc>,
    #[serde(default)]
    pub seats_available: Option<u32>,
    #[serde(default)]
    pub relevance_score: f64,
}

/// Identity used to detect the same itinerary coming from several providers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OfferIdentity {
    pub airline_code: String,
    pub flight_number: String,
    pub departure_time: DateTime<Utc>,
    pub arrival_time: DateTime<Utc>,
    pub cabin: CabinClass,
    pub price: Decimal,
    pub currency: String,
}

impl Offer {
    pub fn identity(&self) -> OfferIdentity {
        OfferIdentity {
            airline_code: self.airline_code.to_ascii_uppercase(),
            flight_number: self.flight_number.to_ascii_uppercase(),
            departure_time: self.departure_time,
            arrival_time: self.arrival_time,
            cabin: self.cabin,
            price: self.price.rounded().normalize(),
            currency: self.price.currency.to_ascii_uppercase(),
        }
    }

    /// Deterministic id for offers whose provider did not supply one.
    pub fn derived_id(&self) -> String {
        format!(
            "{}-{}{}-{}-{}",
            self.provider,
            self.airline_code.to_ascii_uppercase(),
            self.flight_number.to_ascii_uppercase(),
            self.departure_time.timestamp(),
            self.price.rounded()
        )
    }

    pub fn is_direct(&self) -> bool {
        self.stops == 0
    }
}
