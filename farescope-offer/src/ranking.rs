use farescope_core::{Offer, SortKey, SortOrder, SortSpec};
use std::cmp::Ordering;

/// Total order over offers for one request.
///
/// The requested key decides first. Ties fall through to duration,
/// departure time, the position of the offer's provider in the registry
/// and finally the offer id, so two runs over the same offers always
/// agree.
#[derive(Debug, Clone)]
pub struct OfferOrdering {
    sort: SortSpec,
    provider_order: Vec<String>,
}

impl OfferOrdering {
    pub fn new(sort: SortSpec, provider_order: &[String]) -> Self {
        Self {
            sort,
            provider_order: provider_order.to_vec(),
        }
    }

    fn provider_rank(&self, provider: &str) -> usize {
        self.provider_order
            .iter()
            .position(|name| name == provider)
            .unwrap_or(usize::MAX)
    }

    fn primary(&self, a: &Offer, b: &Offer) -> Ordering {
        let ord = match self.sort.key {
            SortKey::Price => a.price.amount.cmp(&b.price.amount),
            SortKey::Duration => a.duration_minutes.cmp(&b.duration_minutes),
            SortKey::DepartureTime => a.departure_time.cmp(&b.departure_time),
            SortKey::Relevance => a.relevance_score.total_cmp(&b.relevance_score),
        };
        match self.sort.order {
            SortOrder::Asc => ord,
            SortOrder::Desc => ord.reverse(),
        }
    }

    pub fn compare(&self, a: &Offer, b: &Offer) -> Ordering {
        self.primary(a, b)
            .then_with(|| a.duration_minutes.cmp(&b.duration_minutes))
            .then_with(|| a.departure_time.cmp(&b.departure_time))
            .then_with(|| self.provider_rank(&a.provider).cmp(&self.provider_rank(&b.provider)))
            .then_with(|| a.id.cmp(&b.id))
    }

    pub fn sort(&self, offers: &mut [Offer]) {
        offers.sort_by(|a, b| self.compare(a, b));
    }
}
