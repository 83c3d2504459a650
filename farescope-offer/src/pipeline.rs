use crate::filter::FilterPipeline;
use crate::merge::retain_currency;
use crate::ranking::OfferOrdering;
use farescope_core::{NormalisedRequest, Offer};

/// Offers chosen for one request out of a cached superset.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub offers: Vec<Offer>,
    /// Offers in the request currency, before filters and truncation.
    pub total_results: usize,
    pub warnings: Vec<String>,
}

/// Currency bucket, filters, ordering, then truncation.
pub fn select_offers(superset: &[Offer], request: &NormalisedRequest, provider_order: &[String]) -> Selection {
    let mut offers = superset.to_vec();
    let warnings = retain_currency(&mut offers, &request.currency);
    let total_results = offers.len();

    let mut offers = FilterPipeline::from_filters(&request.filters).apply(offers);
    OfferOrdering::new(request.sort, provider_order).sort(&mut offers);
    offers.truncate(request.max_results);

    Selection {
        offers,
        total_results,
        warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::offer;
    use chrono::NaiveDate;
    use farescope_core::{Money, SearchLimits, SearchRequest};
    use rust_decimal::Decimal;

    fn request(body: SearchRequest) -> NormalisedRequest {
        let today = NaiveDate::from_ymd_opt(2025, 5, 1).unwrap();
        body.normalise(today, &SearchLimits::default()).unwrap()
    }

    fn base() -> SearchRequest {
        SearchRequest {
            origin: "LHR".to_string(),
            destination: "BCN".to_string(),
            departure_date: NaiveDate::from_ymd_opt(2025, 6, 1),
            ..Default::default()
        }
    }

    fn superset() -> Vec<Offer> {
        let mut usd = offer("AA", "100", 95);
        usd.price = Money::new(Decimal::new(95, 0), "USD");
        let mut one_stop = offer("LH", "900", 100);
        one_stop.stops = 1;
        vec![offer("BA", "478", 200), usd, one_stop, offer("VY", "7821", 120)]
    }

    fn registry() -> Vec<String> {
        vec!["amadeus".to_string()]
    }

    #[test]
    fn test_total_counts_before_filters() {
        let req = request(SearchRequest { direct_only: true, ..base() });
        let selection = select_offers(&superset(), &req, &registry());

        assert_eq!(selection.total_results, 3);
        let ids: Vec<_> = selection.offers.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(ids, vec!["VY7821", "BA478"]);
        assert_eq!(selection.warnings.len(), 1);
        assert!(selection.warnings[0].contains("USD"));
    }

    #[test]
    fn test_zero_max_results_keeps_counts() {
        let req = request(SearchRequest { max_results: Some(0), ..base() });
        let selection = select_offers(&superset(), &req, &registry());
        assert!(selection.offers.is_empty());
        assert_eq!(selection.total_results, 3);
    }

    #[test]
    fn test_truncates_after_sorting() {
        let req = request(SearchRequest { max_results: Some(2), ..base() });
        let selection = select_offers(&superset(), &req, &registry());
        let prices: Vec<_> = selection.offers.iter().map(|o| o.price.amount).collect();
        assert_eq!(prices, vec![Decimal::new(100, 0), Decimal::new(120, 0)]);
    }
}
