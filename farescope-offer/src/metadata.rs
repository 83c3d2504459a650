use farescope_core::{DurationRange, Offer, PriceRange, ProviderReport, SearchMetadata};
use rust_decimal::{Decimal, RoundingStrategy};
use std::time::Duration;

fn price_range(offers: &[Offer]) -> PriceRange {
    let Some(first) = offers.first() else {
        return PriceRange::default();
    };
    let mut min = first.price.amount;
    let mut max = first.price.amount;
    let mut sum = Decimal::ZERO;
    for offer in offers {
        min = min.min(offer.price.amount);
        max = max.max(offer.price.amount);
        sum += offer.price.amount;
    }
    let average = (sum / Decimal::from(offers.len()))
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    PriceRange { min, max, average }
}

fn duration_range(offers: &[Offer]) -> DurationRange {
    if offers.is_empty() {
        return DurationRange::default();
    }
    let min = offers.iter().map(|o| o.duration_minutes).min().unwrap_or(0);
    let max = offers.iter().map(|o| o.duration_minutes).max().unwrap_or(0);
    let sum: u64 = offers.iter().map(|o| u64::from(o.duration_minutes)).sum();
    let count = offers.len() as u64;
    // Integer mean, half rounds up.
    let average = ((sum * 2 + count) / (count * 2)) as u32;
    DurationRange { min, max, average }
}

/// Builds the metadata block of one response.
///
/// `providers` must be in registry order; that order is what ends up in
/// `providers_queried` and `providers_successful`.
#[derive(Debug, Clone)]
pub struct MetadataAssembler<'a> {
    currency: &'a str,
    providers: &'a [ProviderReport],
    from_cache: bool,
    warnings: Vec<String>,
}

impl<'a> MetadataAssembler<'a> {
    pub fn new(currency: &'a str, providers: &'a [ProviderReport]) -> Self {
        Self {
            currency,
            providers,
            from_cache: false,
            warnings: Vec::new(),
        }
    }

    pub fn from_cache(mut self, from_cache: bool) -> Self {
        self.from_cache = from_cache;
        self
    }

    pub fn warnings<I>(mut self, warnings: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        self.warnings.extend(warnings);
        self
    }

    pub fn assemble(self, offers: &[Offer], total_results: usize, search_time: Duration) -> SearchMetadata {
        let mut metadata = SearchMetadata {
            total_results,
            results_returned: offers.len(),
            search_time_ms: search_time.as_millis() as u64,
            cache_hit: self.from_cache,
            from_cache: self.from_cache,
            currency: self.currency.to_string(),
            price_range: price_range(offers),
            duration_range: duration_range(offers),
            warnings: self.warnings,
            ..Default::default()
        };
        for report in self.providers {
            metadata.providers_queried.push(report.name.clone());
            metadata
                .provider_latency_ms
                .insert(report.name.clone(), report.latency_ms);
            match report.error {
                None => metadata.providers_successful.push(report.name.clone()),
                Some(kind) => {
                    metadata.providers_errors.insert(report.name.clone(), kind);
                }
            }
        }
        metadata
    }
}
