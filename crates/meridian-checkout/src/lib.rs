//! # meridian-checkout: Checkout Orchestration for Meridian
//!
//! Everything between the pure pricing core and the outside world: rate
//! lookups, discount validation, stock checks, payment, and the cart store
//! that keeps the UI's state consistent while those calls are in flight.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Checkout Orchestration                            │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                   CheckoutFlow (the Pay button)                  │  │
//! │  │   empty? → deliverable? → StockGate → PaymentOrchestrator       │  │
//! │  └────────────────────────────┬─────────────────────────────────────┘  │
//! │                               │                                         │
//! │  ┌────────────────────────────▼─────────────────────────────────────┐  │
//! │  │                        CartStore                                 │  │
//! │  │  items • currency • address • discount • rates • language        │  │
//! │  │  epochs discard stale responses, every mutation is persisted     │  │
//! │  └──────────┬───────────────────────┬───────────────────────────────┘  │
//! │             ▼                       ▼                                   │
//! │  ┌────────────────────┐  ┌────────────────────┐                        │
//! │  │   RateResolver     │  │  DiscountEngine    │                        │
//! │  │ catalog + per-key  │  │ authority check,   │                        │
//! │  │ shipping/tax cache │  │ typed rejections   │                        │
//! │  └─────────┬──────────┘  └─────────┬──────────┘                        │
//! │            └───────────┬───────────┘                                    │
//! │                        ▼                                                │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │  CheckoutBackend (trait)  ◄── HttpBackend (reqwest)             │  │
//! │  │  CardNetwork (trait)      ◄── vendor card SDK, outside crate    │  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! ### State and Flow
//! - [`store`] - `CartStore`, the single mutable state container
//! - [`flow`] - `CheckoutFlow`, the pre-payment gate and payment call
//!
//! ### Services
//! - [`rates`] - Currency catalog and destination rate resolution
//! - [`discount`] - Discount code validation
//! - [`stock`] - Pre-payment stock check
//! - [`payment`] - Payment intent and card confirmation state machine
//!
//! ### Plumbing
//! - [`backend`] - Backend and card network traits, wire types
//! - [`http`] - reqwest implementation of the backend
//! - [`persistence`] - Saved cart state
//! - [`config`] - Configuration loading
//! - [`telemetry`] - Tracing setup for binaries
//! - [`error`] - Error types and UI error codes
//!
//! ## Usage
//!
//! ```rust,ignore
//! use meridian_checkout::{CartStore, CheckoutConfig, CheckoutFlow, HttpBackend};
//!
//! let config = CheckoutConfig::load_or_default(None);
//! let backend = Arc::new(HttpBackend::from_config(&config)?);
//! let persistence = config
//!     .state_path()
//!     .map(|path| Arc::new(FileCartPersistence::new(path)) as Arc<dyn CartPersistence>);
//!
//! let store = Arc::new(
//!     CartStore::open(backend.clone(), config.base_currency(), persistence).await?,
//! );
//! store.set_address(Some(address)).await?;
//! println!("{}", store.snapshot()?.formatted.total);
//!
//! let flow = CheckoutFlow::new(store, backend, card_network);
//! let receipt = flow.checkout(request).await?;
//! ```

use std::sync::{Mutex, MutexGuard, PoisonError};

// =============================================================================
// Module Declarations
// =============================================================================

pub mod backend;
pub mod config;
pub mod discount;
pub mod error;
pub mod flow;
pub mod http;
pub mod payment;
pub mod persistence;
pub mod rates;
pub mod stock;
pub mod store;
pub mod telemetry;

#[cfg(test)]
mod testing;

// =============================================================================
// Re-exports
// =============================================================================

pub use backend::{CardHandle, CardNetwork, CheckoutBackend};
pub use config::CheckoutConfig;
pub use discount::DiscountEngine;
pub use error::{
    BackendError, CheckoutError, CheckoutResult, ConfigError, DiscountRejection, ErrorCode,
    ErrorPayload,
};
pub use flow::{CheckoutFlow, CheckoutReceipt, CheckoutRequest};
pub use http::HttpBackend;
pub use payment::{PaymentOrchestrator, PaymentOutcome, PaymentState};
pub use persistence::{CartPersistence, FileCartPersistence, MemoryCartPersistence, PersistedCart};
pub use rates::{CurrencyCatalog, DestinationRates, RateResolver, UndeliverableReason};
pub use stock::{StockGate, StockReport};
pub use store::{CartSnapshot, CartStore};
pub use telemetry::init_tracing;

/// Locks `mutex`, recovering the data if a previous holder panicked.
///
/// Every critical section in this crate leaves its state consistent before
/// any point that can panic, so the data is still usable.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
