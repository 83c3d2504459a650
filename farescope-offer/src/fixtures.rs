use chrono::{DateTime, TimeZone, Utc};
use farescope_core::{CabinClass, Money, Offer};
use rust_decimal::Decimal;

pub fn searched_at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 5, 1, 9, 0, 0).unwrap()
}

/// Direct LHR-BCN economy offer departing 08:00 and landing 10:00 UTC.
pub fn offer(airline: &str, flight: &str, price_eur: i64) -> Offer {
    Offer {
        id: format!("{}{}", airline, flight),
        provider: "amadeus".to_string(),
        also_from: Vec::new(),
        origin: "LHR".to_string(),
        destination: "BCN".to_string(),
        departure_time: Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap(),
        arrival_time: Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap(),
        duration_minutes: 120,
        stops: 0,
        stop_details: Vec::new(),
        airline_code: airline.to_string(),
        flight_number: flight.to_string(),
        aircraft_code: Some("320".to_string()),
        cabin: CabinClass::Economy,
        price: Money::new(Decimal::new(price_eur, 0), "EUR"),
        refundable: false,
        baggage_included: true,
        booking_url: None,
        valid_until: Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap(),
        seats_available: Some(9),
        relevance_score: 0.5,
    }
}
