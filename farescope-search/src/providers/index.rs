use async_trait::async_trait;
use farescope_core::repository::{OfferIndex, StoreError};
use farescope_core::{Fingerprint, FlightProvider, NormalisedRequest, Offer, ProviderError};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

/// Exposes an [`OfferIndex`] as one provider among others.
pub struct IndexProvider {
    name: String,
    index: Arc<dyn OfferIndex>,
}

impl IndexProvider {
    pub fn new(name: impl Into<String>, index: Arc<dyn OfferIndex>) -> Self {
        Self {
            name: name.into(),
            index,
        }
    }
}

#[async_trait]
impl FlightProvider for IndexProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn search(&self, request: &NormalisedRequest, _deadline: Instant) -> Result<Vec<Offer>, ProviderError> {
        let fingerprint = Fingerprint::of(request);
        Ok(self.index.query_by_fingerprint(&fingerprint, request).await?)
    }
}

/// Offer index held in process memory.
#[derive(Debug, Default)]
pub struct InMemoryOfferIndex {
    offers: RwLock<HashMap<Fingerprint, Vec<Offer>>>,
}

impl InMemoryOfferIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OfferIndex for InMemoryOfferIndex {
    async fn query_by_fingerprint(
        &self,
        fingerprint: &Fingerprint,
        _request: &NormalisedRequest,
    ) -> Result<Vec<Offer>, StoreError> {
        Ok(self.offers.read().get(fingerprint).cloned().unwrap_or_default())
    }

    async fn commit(&self, fingerprint: &Fingerprint, offers: &[Offer]) -> Result<(), StoreError> {
        self.offers.write().insert(fingerprint.clone(), offers.to_vec());
        Ok(())
    }
}
