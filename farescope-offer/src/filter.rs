use farescope_core::{Offer, OfferFilters};
use rust_decimal::Decimal;

/// A single request-scoped predicate.
#[derive(Debug, Clone, PartialEq)]
enum FilterRule {
    DirectOnly,
    MaxStops(u32),
    MinDuration(u32),
    MaxDuration(u32),
    OnlyAirlines(Vec<String>),
    ExcludeAirlines(Vec<String>),
    MinPrice(Decimal),
    MaxPrice(Decimal),
}

impl FilterRule {
    fn matches(&self, offer: &Offer) -> bool {
        match self {
            FilterRule::DirectOnly => offer.stops == 0,
            FilterRule::MaxStops(max) => offer.stops <= *max,
            FilterRule::MinDuration(min) => offer.duration_minutes >= *min,
            FilterRule::MaxDuration(max) => offer.duration_minutes <= *max,
            FilterRule::OnlyAirlines(codes) => codes.iter().any(|c| c.eq_ignore_ascii_case(&offer.airline_code)),
            FilterRule::ExcludeAirlines(codes) => !codes.iter().any(|c| c.eq_ignore_ascii_case(&offer.airline_code)),
            FilterRule::MinPrice(min) => offer.price.amount >= *min,
            FilterRule::MaxPrice(max) => offer.price.amount <= *max,
        }
    }
}

/// Conjunction of the active filters of one request.
#[derive(Debug, Clone, Default)]
pub struct FilterPipeline {
    rules: Vec<FilterRule>,
}

impl FilterPipeline {
    pub fn from_filters(filters: &OfferFilters) -> Self {
        let mut rules = Vec::new();
        if filters.direct_only {
            rules.push(FilterRule::DirectOnly);
        }
        if let Some(max) = filters.max_stops {
            rules.push(FilterRule::MaxStops(max));
        }
        if let Some(min) = filters.min_duration_minutes {
            rules.push(FilterRule::MinDuration(min));
        }
        if let Some(max) = filters.max_duration_minutes {
            rules.push(FilterRule::MaxDuration(max));
        }
        if !filters.preferred_airlines.is_empty() {
            rules.push(FilterRule::OnlyAirlines(filters.preferred_airlines.clone()));
        }
        if !filters.excluded_airlines.is_empty() {
            rules.push(FilterRule::ExcludeAirlines(filters.excluded_airlines.clone()));
        }
        if let Some(min) = filters.min_price {
            rules.push(FilterRule::MinPrice(min));
        }
        if let Some(max) = filters.max_price {
            rules.push(FilterRule::MaxPrice(max));
        }
        Self { rules }
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn matches(&self, offer: &Offer) -> bool {
        self.rules.iter().all(|rule| rule.matches(offer))
    }

    pub fn apply(&self, mut offers: Vec<Offer>) -> Vec<Offer> {
        if !self.is_empty() {
            offers.retain(|offer| self.matches(offer));
        }
        offers
    }
}
