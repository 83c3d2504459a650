use crate::iata::IataCode;
use crate::{CoreError, CoreResult};
use chrono::NaiveDate;
use farescope_shared::Redacted;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub const MAX_PASSENGERS: u32 = 9;
const DEFAULT_FLEXIBLE_RANGE_DAYS: u8 = 3;
const ANONYMOUS_SESSION: &str = "anonymous";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TripType {
    #[serde(alias = "one_way", alias = "one-way")]
    Oneway,
    #[serde(alias = "round_trip")]
    Return,
}

impl TripType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TripType::Oneway => "oneway",
            TripType::Return => "return",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CabinClass {
    Economy,
    #[serde(alias = "premium_economy")]
    Premium,
    Business,
    First,
}

impl CabinClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            CabinClass::Economy => "economy",
            CabinClass::Premium => "premium",
            CabinClass::Business => "business",
            CabinClass::First => "first",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    Price,
    Duration,
    DepartureTime,
    Relevance,
}

impl SortKey {
    /// Relevance reads best-first, everything else cheapest/shortest/earliest first.
    pub fn default_order(&self) -> SortOrder {
        match self {
            SortKey::Relevance => SortOrder::Desc,
            _ => SortOrder::Asc,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[serde(alias = "ascending")]
    Asc,
    #[serde(alias = "descending")]
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub key: SortKey,
    pub order: SortOrder,
}

impl Default for SortSpec {
    fn default() -> Self {
        Self {
            key: SortKey::Price,
            order: SortOrder::Asc,
        }
    }
}

/// Inbound flight search, exactly as the caller sent it.
///
/// Every field is optional at this stage so that a missing field surfaces
/// as `CoreError::InvalidRequest` from [`SearchRequest::normalise`] rather
/// than as a body-decoding failure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchRequest {
    pub origin: String,
    pub destination: String,
    #[serde(alias = "departure")]
    pub departure_date: Option<NaiveDate>,
    #[serde(alias = "return")]
    pub return_date: Option<NaiveDate>,
    pub trip_type: Option<TripType>,
    pub passengers: Option<u32>,
    #[serde(alias = "cabin_class")]
    pub cabin: Option<CabinClass>,
    pub currency: Option<String>,
    pub flexible_dates: bool,
    pub flexible_range_days: Option<u8>,
    pub direct_only: bool,
    pub max_stops: Option<u32>,
    pub preferred_airlines: Vec<String>,
    pub excluded_airlines: Vec<String>,
    pub min_duration_hours: Option<u32>,
    pub max_duration_hours: Option<u32>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub sort_by: Option<SortKey>,
    pub sort_order: Option<SortOrder>,
    pub max_results: Option<usize>,
    pub session_id: Option<String>,
    pub user_id: Option<String>,
}

/// Deployment-level bounds applied while normalising.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchLimits {
    pub max_results_default: usize,
    pub max_results_hard_cap: usize,
    pub default_currency: String,
}

impl Default for SearchLimits {
    fn default() -> Self {
        Self {
            max_results_default: 50,
            max_results_hard_cap: 200,
            default_currency: "EUR".to_string(),
        }
    }
}

/// Request-scoped predicates. None of these take part in the fingerprint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferFilters {
    pub direct_only: bool,
    pub max_stops: Option<u32>,
    pub min_duration_minutes: Option<u32>,
    pub max_duration_minutes: Option<u32>,
    pub preferred_airlines: Vec<String>,
    pub excluded_airlines: Vec<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
}

/// A validated request with every default filled in. Frozen once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalisedRequest {
    pub origin: IataCode,
    pub destination: IataCode,
    pub departure_date: NaiveDate,
    pub return_date: Option<NaiveDate>,
    pub trip_type: TripType,
    pub passengers: u8,
    pub cabin: CabinClass,
    pub currency: String,
    pub flexible_dates: bool,
    pub flexible_range_days: u8,
    pub filters: OfferFilters,
    pub sort: SortSpec,
    pub max_results: usize,
    pub session_id: Redacted<String>,
    pub user_id: Option<Redacted<String>>,
}

fn invalid(msg: impl Into<String>) -> CoreError {
    CoreError::InvalidRequest(msg.into())
}

fn required_airport(raw: &str, field: &str) -> CoreResult<IataCode> {
    if raw.trim().is_empty() {
        return Err(invalid(format!("{} is required", field)));
    }
    IataCode::parse(raw)
}

fn normalise_airlines(codes: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(codes.len());
    for code in codes {
        let code = code.trim().to_ascii_uppercase();
        if !code.is_empty() && !out.contains(&code) {
            out.push(code);
        }
    }
    out
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl SearchRequest {
    /// Validate the request and fill in defaults.
    ///
    /// `today` is the caller's notion of the current UTC calendar day;
    /// departures before it are rejected. Normalising the result of
    /// [`SearchRequest::from`] on a normalised request yields the same value.
    pub fn normalise(&self, today: NaiveDate, limits: &SearchLimits) -> CoreResult<NormalisedRequest> {
        let origin = required_airport(&self.origin, "origin")?;
        let destination = required_airport(&self.destination, "destination")?;
        if origin == destination {
            return Err(invalid("origin and destination must differ"));
        }

        let departure_date = self
            .departure_date
            .ok_or_else(|| invalid("departure_date is required"))?;
        if departure_date < today {
            return Err(invalid(format!("departure date {} is in the past", departure_date)));
        }
        if let Some(ret) = self.return_date {
            if ret < departure_date {
                return Err(invalid("return date precedes departure date"));
            }
        }

        let trip_type = match (self.trip_type, self.return_date) {
            (None, Some(_)) => TripType::Return,
            (None, None) => TripType::Oneway,
            (Some(TripType::Return), None) => {
                return Err(invalid("return trips need a return_date"));
            }
            (Some(TripType::Oneway), Some(_)) => {
                return Err(invalid("one-way trips cannot carry a return_date"));
            }
            (Some(t), _) => t,
        };

        let passengers = self.passengers.unwrap_or(1);
        if !(1..=MAX_PASSENGERS).contains(&passengers) {
            return Err(invalid(format!(
                "passenger count must be between 1 and {}",
                MAX_PASSENGERS
            )));
        }

        let currency = non_blank(&self.currency)
            .unwrap_or_else(|| limits.default_currency.clone())
            .to_ascii_uppercase();
        if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(invalid(format!("'{}' is not an ISO currency code", currency)));
        }

        let to_minutes = |hours: Option<u32>| {
            hours
                .map(|h| h.checked_mul(60).ok_or_else(|| invalid("duration window out of range")))
                .transpose()
        };
        let min_duration_minutes = to_minutes(self.min_duration_hours)?;
        let max_duration_minutes = to_minutes(self.max_duration_hours)?;
        if let (Some(min), Some(max)) = (min_duration_minutes, max_duration_minutes) {
            if min > max {
                return Err(invalid("min_duration_hours exceeds max_duration_hours"));
            }
        }

        for price in [self.min_price, self.max_price].into_iter().flatten() {
            if price.is_sign_negative() {
                return Err(invalid("price bounds must not be negative"));
            }
        }
        if let (Some(min), Some(max)) = (self.min_price, self.max_price) {
            if min > max {
                return Err(invalid("min_price exceeds max_price"));
            }
        }

        let key = self.sort_by.unwrap_or(SortKey::Price);
        let sort = SortSpec {
            key,
            order: self.sort_order.unwrap_or_else(|| key.default_order()),
        };

        let max_results = match self.max_results {
            None => limits.max_results_default,
            Some(n) if n > limits.max_results_hard_cap => {
                tracing::debug!(
                    requested = n,
                    cap = limits.max_results_hard_cap,
                    "Clamping max_results to hard cap"
                );
                limits.max_results_hard_cap
            }
            Some(n) => n,
        };

        let flexible_range_days = if self.flexible_dates {
            self.flexible_range_days.unwrap_or(DEFAULT_FLEXIBLE_RANGE_DAYS)
        } else {
            0
        };

        Ok(NormalisedRequest {
            origin,
            destination,
            departure_date,
            return_date: self.return_date,
            trip_type,
            passengers: passengers as u8,
            cabin: self.cabin.unwrap_or(CabinClass::Economy),
            currency,
            flexible_dates: self.flexible_dates,
            flexible_range_days,
            filters: OfferFilters {
                direct_only: self.direct_only,
                max_stops: self.max_stops,
                min_duration_minutes,
                max_duration_minutes,
                preferred_airlines: normalise_airlines(&self.preferred_airlines),
                excluded_airlines: normalise_airlines(&self.excluded_airlines),
                min_price: self.min_price,
                max_price: self.max_price,
            },
            sort,
            max_results,
            session_id: Redacted::new(
                non_blank(&self.session_id).unwrap_or_else(|| ANONYMOUS_SESSION.to_string()),
            ),
            user_id: non_blank(&self.user_id).map(Redacted::new),
        })
    }
}

impl From<&NormalisedRequest> for SearchRequest {
    fn from(req: &NormalisedRequest) -> Self {
        Self {
            origin: req.origin.to_string(),
            destination: req.destination.to_string(),
            departure_date: Some(req.departure_date),
            return_date: req.return_date,
            trip_type: Some(req.trip_type),
            passengers: Some(u32::from(req.passengers)),
            cabin: Some(req.cabin),
            currency: Some(req.currency.clone()),
            flexible_dates: req.flexible_dates,
            flexible_range_days: req.flexible_dates.then_some(req.flexible_range_days),
            direct_only: req.filters.direct_only,
            max_stops: req.filters.max_stops,
            preferred_airlines: req.filters.preferred_airlines.clone(),
            excluded_airlines: req.filters.excluded_airlines.clone(),
            min_duration_hours: req.filters.min_duration_minutes.map(|m| m / 60),
            max_duration_hours: req.filters.max_duration_minutes.map(|m| m / 60),
            min_price: req.filters.min_price,
            max_price: req.filters.max_price,
            sort_by: Some(req.sort.key),
            sort_order: Some(req.sort.order),
            max_results: Some(req.max_results),
            session_id: Some(req.session_id.expose().clone()),
            user_id: req.user_id.as_ref().map(|u| u.expose().clone()),
        }
    }
}
