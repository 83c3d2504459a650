mod http;
mod index;

pub use http::HttpProvider;
pub use index::{InMemoryOfferIndex, IndexProvider};
