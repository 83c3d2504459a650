use crate::error::RegistryError;
use farescope_core::FlightProvider;
use std::collections::HashMap;
use std::sync::Arc;

/// Enabled providers in their configured order.
///
/// Read-only once built. The order feeds the deduplication winner and
/// the ordering tie-break, nothing else.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn FlightProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, provider: Arc<dyn FlightProvider>) -> Result<(), RegistryError> {
        if self.providers.iter().any(|p| p.name() == provider.name()) {
            return Err(RegistryError::Duplicate(provider.name().to_string()));
        }
        self.providers.push(provider);
        Ok(())
    }

    pub fn with(mut self, provider: Arc<dyn FlightProvider>) -> Result<Self, RegistryError> {
        self.register(provider)?;
        Ok(self)
    }

    /// Keep only `enabled`, in that order, picking from `available`.
    pub fn from_enabled(
        enabled: &[String],
        mut available: HashMap<String, Arc<dyn FlightProvider>>,
    ) -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        for name in enabled {
            let provider = available
                .remove(name)
                .ok_or_else(|| RegistryError::Unknown(name.clone()))?;
            registry.register(provider)?;
        }
        Ok(registry)
    }

    pub fn providers(&self) -> &[Arc<dyn FlightProvider>] {
        &self.providers
    }

    pub fn names(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.names())
            .finish()
    }
}
