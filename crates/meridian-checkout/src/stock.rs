//! # Stock Gate
//!
//! Pre-payment availability check. Runs once per checkout attempt,
//! immediately before the payment intent is created.
//!
//! ## Gate Decision
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  lines                                                                  │
//! │    │                                                                    │
//! │    ├── any line without size/color? → MissingVariant (no request sent) │
//! │    │                                                                    │
//! │    ▼                                                                    │
//! │  POST stock/check { items: [{productId, size, color, quantity}] }       │
//! │    │                                                                    │
//! │    ├── any available=false → InsufficientStock listing EVERY such line │
//! │    │                          (payment never starts)                    │
//! │    └── all available       → StockReport, low-stock lines as warnings   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Nothing is reserved. Stock can still run out between this check and the
//! charge.

use meridian_core::validation::validate_variants;
use meridian_core::CartLineItem;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::backend::{CheckoutBackend, StockCheckItem, StockCheckRequest};
use crate::error::{BackendError, CheckoutError, CheckoutResult, StockShortfall};

/// Verdict for one cart line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockLineReport {
    pub product_id: String,
    pub name: String,
    pub size: String,
    pub color: String,
    pub requested: i64,
    pub available: bool,
    pub current_stock: i64,
    pub is_low_stock: bool,
    pub error: Option<String>,
}

impl StockLineReport {
    fn shortfall(&self) -> StockShortfall {
        StockShortfall {
            product: self.name.clone(),
            size: self.size.clone(),
            color: self.color.clone(),
            requested: self.requested,
            current_stock: self.current_stock,
            message: self.error.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockReport {
    pub all_available: bool,
    pub lines: Vec<StockLineReport>,
    /// Non-blocking low-stock notices.
    pub warnings: Vec<String>,
}

impl StockReport {
    pub fn shortfalls(&self) -> Vec<StockShortfall> {
        self.lines
            .iter()
            .filter(|line| !line.available)
            .map(StockLineReport::shortfall)
            .collect()
    }
}

pub struct StockGate {
    backend: Arc<dyn CheckoutBackend>,
}

impl StockGate {
    pub fn new(backend: Arc<dyn CheckoutBackend>) -> Self {
        StockGate { backend }
    }

    /// Asks the stock service about every line. Does not block on shortfall.
    pub async fn check(&self, items: &[CartLineItem]) -> CheckoutResult<StockReport> {
        validate_variants(items)?;

        let request = StockCheckRequest {
            items: items
                .iter()
                .map(|item| StockCheckItem {
                    product_id: item.product_id.clone(),
                    size: item.variant.size.clone().unwrap_or_default(),
                    color: item.variant.color.clone().unwrap_or_default(),
                    quantity: item.quantity,
                })
                .collect(),
        };

        debug!(lines = request.items.len(), "Checking stock");
        let response = self.backend.check_stock(&request).await?;

        if response.results.len() != request.items.len() {
            return Err(BackendError::Decode(format!(
                "stock check returned {} results for {} lines",
                response.results.len(),
                request.items.len()
            ))
            .into());
        }

        let lines: Vec<StockLineReport> = items
            .iter()
            .zip(request.items)
            .zip(response.results)
            .map(|((item, sent), result)| StockLineReport {
                product_id: sent.product_id,
                name: item.name.clone(),
                size: sent.size,
                color: sent.color,
                requested: sent.quantity,
                available: result.available,
                current_stock: result.current_stock,
                is_low_stock: result.is_low_stock,
                error: result.error,
            })
            .collect();

        let every_line_available = lines.iter().all(|line| line.available);
        if response.all_available != every_line_available {
            warn!(
                all_available = response.all_available,
                every_line_available, "Stock service summary disagrees with its per-line results"
            );
        }

        let warnings = lines
            .iter()
            .filter(|line| line.available && line.is_low_stock)
            .map(|line| {
                format!(
                    "Only {} left of {} ({}/{})",
                    line.current_stock, line.name, line.size, line.color
                )
            })
            .collect();

        Ok(StockReport {
            all_available: response.all_available && every_line_available,
            lines,
            warnings,
        })
    }

    /// Like [`check`](Self::check), but any shortfall is an error.
    pub async fn ensure_available(&self, items: &[CartLineItem]) -> CheckoutResult<StockReport> {
        let report = self.check(items).await?;

        if !report.all_available {
            let lines = report.shortfalls();
            if lines.is_empty() {
                return Err(BackendError::Decode(
                    "stock service reported a shortfall without naming a line".to_string(),
                )
                .into());
            }
            info!(lines = lines.len(), "Stock gate blocked checkout");
            return Err(CheckoutError::InsufficientStock { lines });
        }

        for warning in &report.warnings {
            info!(%warning, "Low stock");
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::StockCheckResult;
    use crate::testing::{line, FakeBackend};
    use meridian_core::{ValidationError, VariantSelection};
    use rust_decimal_macros::dec;

    fn available(current_stock: i64, is_low_stock: bool) -> StockCheckResult {
        StockCheckResult {
            available: true,
            current_stock,
            is_low_stock,
            error: None,
        }
    }

    fn short(current_stock: i64) -> StockCheckResult {
        StockCheckResult {
            available: false,
            current_stock,
            is_low_stock: true,
            error: None,
        }
    }

    #[tokio::test]
    async fn test_all_available_with_low_stock_warning() {
        let backend = Arc::new(FakeBackend::deliverable());
        backend.set_stock_results(vec![available(50, false), available(2, true)]);
        let gate = StockGate::new(backend.clone());

        let items = vec![line("tee", "Tee", dec!(20), 1), line("cap", "Cap", dec!(10), 1)];
        let report = gate.ensure_available(&items).await.unwrap();

        assert!(report.all_available);
        assert_eq!(report.warnings, vec!["Only 2 left of Cap (M/Black)".to_string()]);
        assert_eq!(backend.calls("stock/check"), 1);
    }

    #[tokio::test]
    async fn test_every_shortfall_listed() {
        let backend = Arc::new(FakeBackend::deliverable());
        backend.set_stock_results(vec![short(1), available(9, false), short(0)]);
        let gate = StockGate::new(backend);

        let items = vec![
            line("tee", "Tee", dec!(20), 3),
            line("cap", "Cap", dec!(10), 1),
            line("sock", "Sock", dec!(5), 2),
        ];
        let err = gate.ensure_available(&items).await.unwrap_err();

        match err {
            CheckoutError::InsufficientStock { lines } => {
                let names: Vec<_> = lines.iter().map(|l| l.product.as_str()).collect();
                assert_eq!(names, vec!["Tee", "Sock"]);
                assert_eq!(lines[0].requested, 3);
                assert_eq!(lines[0].current_stock, 1);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_variant_rejected_before_request() {
        let backend = Arc::new(FakeBackend::deliverable());
        let gate = StockGate::new(backend.clone());

        let mut no_size = line("tee", "Tee", dec!(20), 1);
        no_size.variant = VariantSelection {
            size: None,
            color: Some("Black".to_string()),
        };

        let err = gate.check(&[no_size]).await.unwrap_err();
        assert!(matches!(
            err,
            CheckoutError::Validation(ValidationError::MissingVariant { ref products }) if products == &vec!["Tee".to_string()]
        ));
        assert_eq!(backend.calls("stock/check"), 0);
    }

    #[tokio::test]
    async fn test_result_count_mismatch() {
        let backend = Arc::new(FakeBackend::deliverable());
        backend.set_stock_results(vec![]);
        let gate = StockGate::new(backend);

        let err = gate
            .check(&[line("tee", "Tee", dec!(20), 1)])
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::Backend(BackendError::Decode(_))));
    }
}
