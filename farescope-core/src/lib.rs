pub mod clock;
pub mod fingerprint;
pub mod iata;
pub mod offer;
pub mod provider;
pub mod repository;
pub mod response;
pub mod search;

pub use clock::{Clock, ManualClock, SystemClock};
pub use fingerprint::Fingerprint;
pub use iata::{Airport, AirportDirectory, IataCode};
pub use offer::{Money, Offer, StopDetail};
pub use provider::{FlightProvider, ProviderError, ProviderErrorKind, ProviderHealth, ProviderOutcome};
pub use response::{CachedSearch, ComposedResponse, DurationRange, PriceRange, ProviderReport, SearchMetadata};
pub use search::{CabinClass, NormalisedRequest, OfferFilters, SearchLimits, SearchRequest, SortKey, SortOrder, SortSpec, TripType};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

pub type CoreResult<T> = Result<T, CoreError>;
