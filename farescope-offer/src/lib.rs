pub mod filter;
pub mod merge;
pub mod metadata;
pub mod pipeline;
pub mod ranking;

pub use filter::FilterPipeline;
pub use merge::{merge_offers, retain_currency, MergeOutcome, ProviderBatch};
pub use metadata::MetadataAssembler;
pub use pipeline::{select_offers, Selection};
pub use ranking::OfferOrdering;

#[cfg(test)]
pub(crate) mod fixtures;
