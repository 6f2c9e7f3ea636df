//! # Cart Persistence
//!
//! Client-local state that survives sessions: cart lines, selected currency,
//! selected address and selected language.
//!
//! ```text
//! CartStore mutation ──► PersistedCart ──► CartPersistence::save
//!                                              │
//!                                              ├── FileCartPersistence   (JSON file)
//!                                              └── MemoryCartPersistence (embedders, tests)
//! ```
//!
//! Rates and the applied discount are never stored; they are derived again
//! after a restore.

use meridian_core::{CartLineItem, CurrencyCode, ShippingDestination};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

use crate::error::PersistenceError;
use crate::lock;

pub type PersistenceResult<T> = Result<T, PersistenceError>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedCart {
    #[serde(default)]
    pub items: Vec<CartLineItem>,
    pub currency_code: CurrencyCode,
    #[serde(default)]
    pub address: Option<ShippingDestination>,
    #[serde(default)]
    pub language_code: Option<String>,
}

/// Storage for [`PersistedCart`].
pub trait CartPersistence: Send + Sync {
    /// `Ok(None)` when nothing has been saved yet.
    fn load(&self) -> PersistenceResult<Option<PersistedCart>>;

    fn save(&self, state: &PersistedCart) -> PersistenceResult<()>;
}

// =============================================================================
// File
// =============================================================================

/// JSON file, replaced atomically on every save.
#[derive(Debug, Clone)]
pub struct FileCartPersistence {
    path: PathBuf,
}

impl FileCartPersistence {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileCartPersistence { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CartPersistence for FileCartPersistence {
    fn load(&self) -> PersistenceResult<Option<PersistedCart>> {
        if !self.path.exists() {
            debug!(path = ?self.path, "No saved cart state");
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&self.path)?;
        Ok(Some(serde_json::from_str(&contents)?))
    }

    fn save(&self, state: &PersistedCart) -> PersistenceResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        // Write then rename so a crash never leaves half a file
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(state)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

// =============================================================================
// Memory
// =============================================================================

#[derive(Debug, Default)]
pub struct MemoryCartPersistence {
    state: Mutex<Option<PersistedCart>>,
}

impl MemoryCartPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: PersistedCart) -> Self {
        MemoryCartPersistence {
            state: Mutex::new(Some(state)),
        }
    }
}

impl CartPersistence for MemoryCartPersistence {
    fn load(&self) -> PersistenceResult<Option<PersistedCart>> {
        Ok(lock(&self.state).clone())
    }

    fn save(&self, state: &PersistedCart) -> PersistenceResult<()> {
        *lock(&self.state) = Some(state.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{destination, line};
    use rust_decimal_macros::dec;

    fn state() -> PersistedCart {
        PersistedCart {
            items: vec![line("tee", "Tee", dec!(20), 2)],
            currency_code: "EUR".into(),
            address: Some(destination("US", Some("CA"))),
            language_code: Some("de".to_string()),
        }
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let persistence = FileCartPersistence::new(dir.path().join("state").join("cart.json"));

        assert_eq!(persistence.load().unwrap(), None);

        persistence.save(&state()).unwrap();
        assert_eq!(persistence.load().unwrap(), Some(state()));
        assert!(!persistence.path().with_extension("json.tmp").exists());
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cart.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = FileCartPersistence::new(path).load().unwrap_err();
        assert!(matches!(err, PersistenceError::Json(_)));
    }

    #[test]
    fn test_minimal_document() {
        let parsed: PersistedCart = serde_json::from_str(r#"{"currencyCode": "usd"}"#).unwrap();
        assert!(parsed.items.is_empty());
        assert_eq!(parsed.currency_code.as_str(), "USD");
        assert_eq!(parsed.address, None);
    }

    #[test]
    fn test_memory_persistence() {
        let persistence = MemoryCartPersistence::new();
        assert_eq!(persistence.load().unwrap(), None);
        persistence.save(&state()).unwrap();
        assert_eq!(persistence.load().unwrap().unwrap().language_code.as_deref(), Some("de"));
    }
}
