//! Provider registry: provider records and their availability.
//!
//! Lookups return `Option`/`bool` rather than errors. A missing provider is an
//! expected answer in the booking flows, and the state machine decides whether
//! it is worth failing over.

use crate::types::{Capabilities, Provider, ProviderId, ServiceType};

/// Storage for provider records.
///
/// Iteration order is insertion order; [`find_available_for_service`] relies
/// on it to break ties.
///
/// [`find_available_for_service`]: ProviderRegistry::find_available_for_service
pub trait ProviderRegistry: Send {
    /// Add a provider, replacing any existing record with the same id in place
    fn register(&mut self, provider: Provider);

    /// Look up a provider
    fn find_by_id(&self, id: &ProviderId) -> Option<Provider>;

    /// First available provider, in insertion order, whose capabilities admit
    /// `service`
    fn find_available_for_service(&self, service: &ServiceType) -> Option<Provider>;

    /// Flag a provider as free. Returns `false` if the id is unknown.
    fn mark_available(&mut self, id: &ProviderId) -> bool;

    /// Flag a provider as busy. Returns `false` if the id is unknown.
    fn mark_busy(&mut self, id: &ProviderId) -> bool;

    /// All providers in insertion order
    fn list(&self) -> Vec<Provider>;
}

/// `Vec`-backed registry
#[derive(Debug, Clone, Default)]
pub struct InMemoryProviderRegistry {
    providers: Vec<Provider>,
}

impl InMemoryProviderRegistry {
    /// Creates an empty registry
    #[must_use]
    pub const fn new() -> Self {
        Self {
            providers: Vec::new(),
        }
    }

    /// Creates a registry seeded with `providers`
    #[must_use]
    pub fn with_providers(providers: impl IntoIterator<Item = Provider>) -> Self {
        let mut registry = Self::new();
        for provider in providers {
            registry.register(provider);
        }
        registry
    }

    fn set_available(&mut self, id: &ProviderId, available: bool) -> bool {
        match self.providers.iter_mut().find(|p| &p.id == id) {
            Some(provider) => {
                provider.available = available;
                true
            }
            None => false,
        }
    }
}

impl ProviderRegistry for InMemoryProviderRegistry {
    fn register(&mut self, provider: Provider) {
        if let Some(existing) = self.providers.iter_mut().find(|p| p.id == provider.id) {
            *existing = provider;
        } else {
            self.providers.push(provider);
        }
    }

    fn find_by_id(&self, id: &ProviderId) -> Option<Provider> {
        self.providers.iter().find(|p| &p.id == id).cloned()
    }

    fn find_available_for_service(&self, service: &ServiceType) -> Option<Provider> {
        self.providers.iter().find(|p| p.can_take(service)).cloned()
    }

    fn mark_available(&mut self, id: &ProviderId) -> bool {
        self.set_available(id, true)
    }

    fn mark_busy(&mut self, id: &ProviderId) -> bool {
        self.set_available(id, false)
    }

    fn list(&self) -> Vec<Provider> {
        self.providers.clone()
    }
}

/// The roster a fresh deployment starts with.
#[must_use]
pub fn default_roster() -> Vec<Provider> {
    vec![
        Provider::new(
            ProviderId::new("p1"),
            "Ramesh Kumar",
            Capabilities::restricted(["plumbing", "electrical"]),
        )
        .with_phone("+91 98765 43210")
        .with_rating(4.8),
        Provider::new(
            ProviderId::new("p2"),
            "Suresh Patel",
            Capabilities::restricted(["cleaning", "plumbing"]),
        )
        .with_phone("+91 98765 43211")
        .with_rating(4.6),
        Provider::new(
            ProviderId::new("p3"),
            "Amit Sharma",
            Capabilities::restricted(["electrical", "carpentry"]),
        )
        .with_phone("+91 98765 43212")
        .with_rating(4.9),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(name: &str) -> ServiceType {
        ServiceType::new(name)
    }

    #[test]
    fn test_first_available_match_wins() {
        let registry = InMemoryProviderRegistry::with_providers(default_roster());

        let found = registry.find_available_for_service(&service("plumbing"));
        assert_eq!(found.map(|p| p.id), Some(ProviderId::new("p1")));

        let found = registry.find_available_for_service(&service("carpentry"));
        assert_eq!(found.map(|p| p.id), Some(ProviderId::new("p3")));
    }

    #[test]
    fn test_busy_providers_are_skipped() {
        let mut registry = InMemoryProviderRegistry::with_providers(default_roster());
        assert!(registry.mark_busy(&ProviderId::new("p1")));

        let found = registry.find_available_for_service(&service("plumbing"));
        assert_eq!(found.map(|p| p.id), Some(ProviderId::new("p2")));

        assert!(registry.mark_busy(&ProviderId::new("p2")));
        assert!(registry.find_available_for_service(&service("plumbing")).is_none());

        assert!(registry.mark_available(&ProviderId::new("p1")));
        let found = registry.find_available_for_service(&service("plumbing"));
        assert_eq!(found.map(|p| p.id), Some(ProviderId::new("p1")));
    }

    #[test]
    fn test_unrestricted_provider_takes_anything() {
        let registry = InMemoryProviderRegistry::with_providers([Provider::new(
            ProviderId::new("handy"),
            "Handy Person",
            Capabilities::Unrestricted,
        )]);
        assert!(registry.find_available_for_service(&service("roofing")).is_some());
    }

    #[test]
    fn test_unknown_provider_is_a_signal_not_an_error() {
        let mut registry = InMemoryProviderRegistry::new();
        assert!(registry.find_by_id(&ProviderId::new("ghost")).is_none());
        assert!(!registry.mark_busy(&ProviderId::new("ghost")));
        assert!(!registry.mark_available(&ProviderId::new("ghost")));
    }

    #[test]
    fn test_register_replaces_in_place() {
        let mut registry = InMemoryProviderRegistry::with_providers(default_roster());
        registry.register(Provider::new(
            ProviderId::new("p1"),
            "Ramesh K.",
            Capabilities::Unrestricted,
        ));

        let names: Vec<String> = registry.list().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["Ramesh K.", "Suresh Patel", "Amit Sharma"]);
    }
}
