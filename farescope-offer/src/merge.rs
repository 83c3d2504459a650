use chrono::{DateTime, Utc};
use farescope_core::offer::OfferIdentity;
use farescope_core::Offer;
use std::collections::{BTreeMap, HashMap};
use tracing::warn;

/// Offers returned by one provider, in the order it returned them.
#[derive(Debug, Clone)]
pub struct ProviderBatch {
    pub provider: String,
    pub offers: Vec<Offer>,
}

#[derive(Debug, Clone, Default)]
pub struct MergeOutcome {
    pub offers: Vec<Offer>,
    pub warnings: Vec<String>,
}

/// Bring a provider offer to canonical shape. Returns the reason it
/// must be dropped, if any.
fn normalise_offer(offer: &mut Offer, provider: &str, searched_at: DateTime<Utc>) -> Result<(), &'static str> {
    offer.provider = provider.to_string();
    offer.also_from.clear();
    offer.airline_code = offer.airline_code.trim().to_ascii_uppercase();
    offer.flight_number = offer.flight_number.trim().to_ascii_uppercase();
    offer.origin = offer.origin.trim().to_ascii_uppercase();
    offer.destination = offer.destination.trim().to_ascii_uppercase();
    offer.price.currency = offer.price.currency.trim().to_ascii_uppercase();

    if offer.arrival_time <= offer.departure_time {
        return Err("arrival not after departure");
    }
    if offer.price.amount <= rust_decimal::Decimal::ZERO {
        return Err("non-positive price");
    }
    if offer.valid_until <= searched_at {
        return Err("offer already expired");
    }

    if offer.duration_minutes == 0 {
        offer.duration_minutes = (offer.arrival_time - offer.departure_time).num_minutes() as u32;
    }
    if !offer.stop_details.is_empty() {
        offer.stops = offer.stop_details.len() as u32;
    }
    if offer.id.trim().is_empty() {
        offer.id = offer.derived_id();
    }
    Ok(())
}

/// Concatenate provider batches into one deduplicated list.
///
/// `batches` must be in registry order. On an identity collision the
/// earlier offer wins and the later provider is appended to the
/// winner's `also_from` list.
pub fn merge_offers(batches: Vec<ProviderBatch>, searched_at: DateTime<Utc>) -> MergeOutcome {
    let mut merged: Vec<Offer> = Vec::new();
    let mut seen: HashMap<OfferIdentity, usize> = HashMap::new();
    let mut warnings = Vec::new();

    for batch in batches {
        let mut rejected = 0usize;
        for mut offer in batch.offers {
            if let Err(reason) = normalise_offer(&mut offer, &batch.provider, searched_at) {
                warn!(provider = %batch.provider, offer_id = %offer.id, reason, "Dropping invalid offer");
                rejected += 1;
                continue;
            }

            match seen.get(&offer.identity()) {
                Some(&winner) => {
                    let winner = &mut merged[winner];
                    if winner.provider != batch.provider && !winner.also_from.contains(&batch.provider) {
                        winner.also_from.push(batch.provider.clone());
                    }
                }
                None => {
                    seen.insert(offer.identity(), merged.len());
                    merged.push(offer);
                }
            }
        }
        if rejected > 0 {
            warnings.push(format!("{} dropped {} invalid offer(s)", batch.provider, rejected));
        }
    }

    MergeOutcome { offers: merged, warnings }
}

/// Keep only offers priced in `currency`. Conversion is not attempted;
/// every dropped bucket yields a warning.
pub fn retain_currency(offers: &mut Vec<Offer>, currency: &str) -> Vec<String> {
    let mut dropped: BTreeMap<String, usize> = BTreeMap::new();
    offers.retain(|offer| {
        if offer.price.currency.eq_ignore_ascii_case(currency) {
            true
        } else {
            *dropped.entry(offer.price.currency.clone()).or_default() += 1;
            false
        }
    });

    dropped
        .into_iter()
        .map(|(other, count)| {
            format!("dropped {} offer(s) priced in {} (requested {})", count, other, currency)
        })
        .collect()
}
