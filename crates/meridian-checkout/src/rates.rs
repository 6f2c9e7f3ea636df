//! # Rate Resolver
//!
//! Fetches the currency catalog, the language list, and shipping/tax rates
//! for a destination. Destination rates are cached per `(country, state)`.
//!
//! ## Lookup Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  resolve(US-CA)                                                         │
//! │     │                                                                   │
//! │     ├── cache hit? ──────────────────────────────► DestinationRates     │
//! │     │                                                                   │
//! │     └── miss: join!(shipping_rates, tax_rate)                           │
//! │              │                                                          │
//! │              ├── both answered → cache + return                         │
//! │              └── transport error → LookupFailed (not cached, so the    │
//! │                                    next resolve retries)                │
//! │                                                                         │
//! │  currency_catalog()                                                     │
//! │     ├── remote OK and non-empty → Remote (cached)                       │
//! │     └── remote failed           → built-in fallback set (not cached)    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use meridian_core::validation::validate_currency_option;
use meridian_core::{
    fallback_currencies, fallback_languages, CurrencyCode, CurrencyOption, Delivery,
    DestinationKey, LanguageOption, ShippingRate, TaxRate,
};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

use crate::backend::CheckoutBackend;
use crate::lock;

// =============================================================================
// Currency Catalog
// =============================================================================

/// Where the currency list came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CatalogSource {
    Remote,
    /// Built-in set; the remote catalog was unreachable or empty.
    Fallback,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CurrencyCatalog {
    options: Vec<CurrencyOption>,
    source: CatalogSource,
}

impl CurrencyCatalog {
    pub fn new(options: Vec<CurrencyOption>, source: CatalogSource) -> Self {
        CurrencyCatalog { options, source }
    }

    pub fn fallback() -> Self {
        Self::new(fallback_currencies(), CatalogSource::Fallback)
    }

    pub fn options(&self) -> &[CurrencyOption] {
        &self.options
    }

    pub fn source(&self) -> CatalogSource {
        self.source
    }

    pub fn find(&self, code: &CurrencyCode) -> Option<&CurrencyOption> {
        self.options.iter().find(|c| &c.code == code)
    }

    /// The option flagged default, else the first one.
    pub fn default_option(&self) -> Option<&CurrencyOption> {
        self.options
            .iter()
            .find(|c| c.is_default)
            .or_else(|| self.options.first())
    }
}

// =============================================================================
// Destination Rates
// =============================================================================

/// Why a destination cannot be priced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum UndeliverableReason {
    NoShippingRate,
    ShippingInactive,
    NoTaxRate,
    /// The rate service could not be reached.
    LookupFailed,
}

impl fmt::Display for UndeliverableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            UndeliverableReason::NoShippingRate => "no shipping rate",
            UndeliverableReason::ShippingInactive => "shipping is not offered",
            UndeliverableReason::NoTaxRate => "no tax rate",
            UndeliverableReason::LookupFailed => "rates could not be loaded",
        })
    }
}

/// Resolved rates for one destination.
#[derive(Debug, Clone, PartialEq)]
pub struct DestinationRates {
    pub shipping: Option<ShippingRate>,
    pub tax: Option<TaxRate>,
    pub lookup_failed: bool,
}

impl DestinationRates {
    fn failed() -> Self {
        DestinationRates {
            shipping: None,
            tax: None,
            lookup_failed: true,
        }
    }

    pub fn delivery(&self) -> Delivery<'_> {
        Delivery::Resolved {
            shipping: self.shipping.as_ref(),
            tax: self.tax.as_ref(),
        }
    }

    pub fn is_deliverable(&self) -> bool {
        self.undeliverable_reason().is_none()
    }

    pub fn undeliverable_reason(&self) -> Option<UndeliverableReason> {
        if self.lookup_failed {
            return Some(UndeliverableReason::LookupFailed);
        }
        match (&self.shipping, &self.tax) {
            (None, _) => Some(UndeliverableReason::NoShippingRate),
            (Some(shipping), _) if !shipping.is_active => Some(UndeliverableReason::ShippingInactive),
            (_, None) => Some(UndeliverableReason::NoTaxRate),
            _ => None,
        }
    }
}

// =============================================================================
// Resolver
// =============================================================================

/// Rate lookups with small keyed caches.
pub struct RateResolver {
    backend: Arc<dyn CheckoutBackend>,
    destinations: Mutex<HashMap<DestinationKey, DestinationRates>>,
    catalog: Mutex<Option<CurrencyCatalog>>,
    languages: Mutex<Option<Vec<LanguageOption>>>,
}

impl RateResolver {
    pub fn new(backend: Arc<dyn CheckoutBackend>) -> Self {
        RateResolver {
            backend,
            destinations: Mutex::new(HashMap::new()),
            catalog: Mutex::new(None),
            languages: Mutex::new(None),
        }
    }

    /// The currency catalog, falling back to the built-in set only when the
    /// remote catalog is unreachable or has no usable entries.
    pub async fn currency_catalog(&self) -> CurrencyCatalog {
        if let Some(catalog) = lock(&self.catalog).clone() {
            return catalog;
        }

        match self.backend.currencies().await {
            Ok(options) => {
                let usable: Vec<CurrencyOption> = options
                    .into_iter()
                    .filter(|option| match validate_currency_option(option) {
                        Ok(()) => true,
                        Err(e) => {
                            warn!(currency = %option.code, error = %e, "Dropping invalid catalog entry");
                            false
                        }
                    })
                    .collect();

                if usable.is_empty() {
                    warn!("Currency catalog is empty, using fallback set");
                    return CurrencyCatalog::fallback();
                }

                info!(count = usable.len(), "Loaded currency catalog");
                let catalog = CurrencyCatalog::new(usable, CatalogSource::Remote);
                *lock(&self.catalog) = Some(catalog.clone());
                catalog
            }
            Err(e) => {
                warn!(error = %e, "Currency catalog unreachable, using fallback set");
                CurrencyCatalog::fallback()
            }
        }
    }

    /// Available UI languages, with the same fallback rule as currencies.
    pub async fn languages(&self) -> Vec<LanguageOption> {
        if let Some(languages) = lock(&self.languages).clone() {
            return languages;
        }

        match self.backend.languages().await {
            Ok(languages) if !languages.is_empty() => {
                *lock(&self.languages) = Some(languages.clone());
                languages
            }
            Ok(_) => fallback_languages(),
            Err(e) => {
                warn!(error = %e, "Language list unreachable, using fallback");
                fallback_languages()
            }
        }
    }

    /// Shipping and tax rates for `destination`, fetched concurrently.
    pub async fn resolve(&self, destination: &DestinationKey) -> DestinationRates {
        if let Some(rates) = lock(&self.destinations).get(destination).cloned() {
            debug!(%destination, "Destination rates cache hit");
            return rates;
        }

        debug!(%destination, "Fetching destination rates");
        let (shipping, tax) = tokio::join!(
            self.backend.shipping_rates(destination),
            self.backend.tax_rate(destination)
        );

        let rates = match (shipping, tax) {
            (Ok(shipping), Ok(tax)) => DestinationRates {
                shipping: shipping.into_iter().next(),
                tax,
                lookup_failed: false,
            },
            (Err(e), _) | (_, Err(e)) => {
                warn!(%destination, error = %e, "Rate lookup failed");
                return DestinationRates::failed();
            }
        };

        if let Some(reason) = rates.undeliverable_reason() {
            info!(%destination, %reason, "Destination is not deliverable");
        }

        lock(&self.destinations).insert(destination.clone(), rates.clone());
        rates
    }

    /// Drops the cached rates for one destination.
    pub fn invalidate(&self, destination: &DestinationKey) {
        lock(&self.destinations).remove(destination);
    }

    /// Drops every cached destination. The currency catalog stays.
    pub fn clear(&self) {
        lock(&self.destinations).clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeBackend;
    use rust_decimal_macros::dec;

    fn us_ca() -> DestinationKey {
        DestinationKey::new("US", Some("CA"))
    }

    #[tokio::test]
    async fn test_resolve_caches_per_key() {
        let backend = Arc::new(FakeBackend::deliverable());
        let resolver = RateResolver::new(backend.clone());

        let first = resolver.resolve(&us_ca()).await;
        let second = resolver.resolve(&us_ca()).await;

        assert!(first.is_deliverable());
        assert_eq!(first, second);
        assert_eq!(backend.calls("shipping-rates"), 1);
        assert_eq!(backend.calls("tax-rate"), 1);

        resolver.invalidate(&us_ca());
        resolver.resolve(&us_ca()).await;
        assert_eq!(backend.calls("shipping-rates"), 2);
    }

    #[tokio::test]
    async fn test_first_shipping_rate_wins() {
        let backend = FakeBackend::deliverable();
        backend.push_shipping_rate(dec!(99), true);
        let resolver = RateResolver::new(Arc::new(backend));

        let rates = resolver.resolve(&us_ca()).await;
        assert_eq!(rates.shipping.unwrap().shipping_cost_base, dec!(5.99));
    }

    #[tokio::test]
    async fn test_missing_tax_is_undeliverable() {
        let backend = FakeBackend::deliverable();
        backend.set_tax_rate(None);
        let resolver = RateResolver::new(Arc::new(backend));

        let rates = resolver.resolve(&us_ca()).await;
        assert_eq!(rates.undeliverable_reason(), Some(UndeliverableReason::NoTaxRate));
        assert!(!rates.delivery().is_deliverable());
    }

    #[tokio::test]
    async fn test_inactive_shipping_is_undeliverable() {
        let backend = FakeBackend::deliverable();
        backend.set_shipping_rates(vec![]);
        backend.push_shipping_rate(dec!(5.99), false);
        let resolver = RateResolver::new(Arc::new(backend));

        let rates = resolver.resolve(&us_ca()).await;
        assert_eq!(
            rates.undeliverable_reason(),
            Some(UndeliverableReason::ShippingInactive)
        );
    }

    #[tokio::test]
    async fn test_lookup_failure_not_cached() {
        let backend = Arc::new(FakeBackend::deliverable());
        backend.fail("tax-rate");
        let resolver = RateResolver::new(backend.clone());

        let rates = resolver.resolve(&us_ca()).await;
        assert_eq!(rates.undeliverable_reason(), Some(UndeliverableReason::LookupFailed));

        backend.recover("tax-rate");
        assert!(resolver.resolve(&us_ca()).await.is_deliverable());
    }

    #[tokio::test]
    async fn test_catalog_fallback_only_on_failure() {
        let backend = Arc::new(FakeBackend::deliverable());
        let resolver = RateResolver::new(backend.clone());

        let catalog = resolver.currency_catalog().await;
        assert_eq!(catalog.source(), CatalogSource::Remote);
        assert_eq!(catalog.options().len(), 2);

        backend.fail("currencies");
        let failing = RateResolver::new(backend.clone());
        let catalog = failing.currency_catalog().await;
        assert_eq!(catalog.source(), CatalogSource::Fallback);
        assert!(catalog.find(&"JPY".into()).is_some());
    }

    #[tokio::test]
    async fn test_invalid_catalog_entries_dropped() {
        let backend = FakeBackend::deliverable();
        let mut broken = fallback_currencies().remove(2);
        broken.rate_to_base = dec!(0);
        backend.push_currency(broken);
        let resolver = RateResolver::new(Arc::new(backend));

        let catalog = resolver.currency_catalog().await;
        assert!(catalog.find(&"GBP".into()).is_none());
        assert_eq!(catalog.default_option().unwrap().code.as_str(), "USD");
    }

    #[tokio::test]
    async fn test_languages_fallback() {
        let backend = Arc::new(FakeBackend::deliverable());
        backend.fail("languages");
        let resolver = RateResolver::new(backend);

        let languages = resolver.languages().await;
        assert_eq!(languages[0].code, "en");
    }
}
