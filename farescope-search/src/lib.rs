pub mod cache;
pub mod error;
pub mod executor;
pub mod health;
pub mod history;
pub mod orchestrator;
pub mod providers;
pub mod registry;
pub mod single_flight;

pub use cache::{Fetched, InMemoryResultStore, Lookup, ResultCache, Source};
pub use error::{RegistryError, SearchError};
pub use executor::{FanOut, FanOutExecutor};
pub use health::ProviderHealthTracker;
pub use history::{spawn_retention, HistorySink, InMemoryHistoryStore};
pub use orchestrator::SearchOrchestrator;
pub use providers::{HttpProvider, InMemoryOfferIndex, IndexProvider};
pub use registry::ProviderRegistry;
