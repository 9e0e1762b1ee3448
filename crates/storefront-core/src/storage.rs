//! Persistence Layer
//!
//! Per-browser durable storage plus per-tab session storage, keyed by purpose.
//! Pages construct their stores from a fresh read and write through on every
//! mutation; nothing is pushed between tabs.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{Result, StorefrontError};

/// Lifetime of a stored value
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Survives browser restarts
    Durable,
    /// Cleared when the tab goes away
    Session,
}

impl Scope {
    const fn file_name(self) -> &'static str {
        match self {
            Self::Durable => "durable.json",
            Self::Session => "session.json",
        }
    }
}

/// Every slot the storefront persists
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StorageKey {
    Cart,
    DisplayCurrency,
    LoggedIn,
    ShippingProfile,
    SavedCard,
    InstrumentIds,
    CustomerId,
    EligibilityCriteria,
    CheckoutSource,
    HandoffMode,
    SeatHold,
    SeatSelection,
    PaymentInFlight,
}

impl StorageKey {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cart => "cart",
            Self::DisplayCurrency => "display_currency",
            Self::LoggedIn => "logged_in",
            Self::ShippingProfile => "shipping_profile",
            Self::SavedCard => "saved_card",
            Self::InstrumentIds => "instrument_ids",
            Self::CustomerId => "customer_id",
            Self::EligibilityCriteria => "eligibility_criteria",
            Self::CheckoutSource => "checkout_source",
            Self::HandoffMode => "handoff_mode",
            Self::SeatHold => "seat_hold",
            Self::SeatSelection => "seat_selection",
            Self::PaymentInFlight => "payment_in_flight",
        }
    }
}

impl std::fmt::Display for StorageKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw key/value storage
pub trait Storage: Send + Sync {
    fn get(&self, scope: Scope, key: StorageKey) -> Result<Option<String>>;

    fn set(&self, scope: Scope, key: StorageKey, value: String) -> Result<()>;

    fn remove(&self, scope: Scope, key: StorageKey) -> Result<()>;

    /// Drop everything in a scope (e.g. the tab closed)
    fn clear_scope(&self, scope: Scope) -> Result<()>;
}

impl<S: Storage + ?Sized> Storage for std::sync::Arc<S> {
    fn get(&self, scope: Scope, key: StorageKey) -> Result<Option<String>> {
        (**self).get(scope, key)
    }

    fn set(&self, scope: Scope, key: StorageKey, value: String) -> Result<()> {
        (**self).set(scope, key, value)
    }

    fn remove(&self, scope: Scope, key: StorageKey) -> Result<()> {
        (**self).remove(scope, key)
    }

    fn clear_scope(&self, scope: Scope) -> Result<()> {
        (**self).clear_scope(scope)
    }
}

/// Read a JSON value; corrupt or unreadable data reads as absent
pub fn load_json<T: DeserializeOwned>(
    storage: &dyn Storage,
    scope: Scope,
    key: StorageKey,
) -> Option<T> {
    let raw = match storage.get(scope, key) {
        Ok(raw) => raw?,
        Err(e) => {
            tracing::warn!(key = %key, error = %e, "Storage read failed, treating as empty");
            return None;
        }
    };

    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(key = %key, error = %e, "Discarding corrupt stored value");
            None
        }
    }
}

/// Serialize and store a JSON value
pub fn save_json<T: Serialize + ?Sized>(
    storage: &dyn Storage,
    scope: Scope,
    key: StorageKey,
    value: &T,
) -> Result<()> {
    storage.set(scope, key, serde_json::to_string(value)?)
}

type Slots = HashMap<Scope, HashMap<&'static str, String>>;

fn poisoned<T>(_: std::sync::PoisonError<T>) -> StorefrontError {
    StorefrontError::Persistence("storage lock poisoned".into())
}

/// In-memory storage (for development/testing)
#[derive(Default)]
pub struct MemoryStorage {
    slots: RwLock<Slots>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn get(&self, scope: Scope, key: StorageKey) -> Result<Option<String>> {
        let slots = self.slots.read().map_err(poisoned)?;
        Ok(slots.get(&scope).and_then(|s| s.get(key.as_str())).cloned())
    }

    fn set(&self, scope: Scope, key: StorageKey, value: String) -> Result<()> {
        let mut slots = self.slots.write().map_err(poisoned)?;
        slots.entry(scope).or_default().insert(key.as_str(), value);
        Ok(())
    }

    fn remove(&self, scope: Scope, key: StorageKey) -> Result<()> {
        let mut slots = self.slots.write().map_err(poisoned)?;
        if let Some(s) = slots.get_mut(&scope) {
            s.remove(key.as_str());
        }
        Ok(())
    }

    fn clear_scope(&self, scope: Scope) -> Result<()> {
        let mut slots = self.slots.write().map_err(poisoned)?;
        slots.remove(&scope);
        Ok(())
    }
}

/// JSON-file storage: one file per scope inside a directory
///
/// Files are read once when opened and rewritten after every change.
pub struct FileStorage {
    dir: PathBuf,
    slots: RwLock<HashMap<Scope, HashMap<String, String>>>,
}

impl FileStorage {
    /// Open (or create) storage rooted at `dir`
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;

        let mut slots = HashMap::new();
        for scope in [Scope::Durable, Scope::Session] {
            slots.insert(scope, Self::read_scope(&dir, scope));
        }

        Ok(Self {
            dir,
            slots: RwLock::new(slots),
        })
    }

    fn read_scope(dir: &Path, scope: Scope) -> HashMap<String, String> {
        let path = dir.join(scope.file_name());
        let Ok(raw) = std::fs::read_to_string(&path) else {
            return HashMap::new();
        };
        serde_json::from_str(&raw).unwrap_or_else(|e| {
            tracing::warn!(path = %path.display(), error = %e, "Corrupt storage file, starting empty");
            HashMap::new()
        })
    }

    fn flush(&self, scope: Scope, values: &HashMap<String, String>) -> Result<()> {
        let path = self.dir.join(scope.file_name());
        std::fs::write(path, serde_json::to_vec_pretty(values)?)?;
        Ok(())
    }
}

impl Storage for FileStorage {
    fn get(&self, scope: Scope, key: StorageKey) -> Result<Option<String>> {
        let slots = self.slots.read().map_err(poisoned)?;
        Ok(slots.get(&scope).and_then(|s| s.get(key.as_str())).cloned())
    }

    fn set(&self, scope: Scope, key: StorageKey, value: String) -> Result<()> {
        let mut slots = self.slots.write().map_err(poisoned)?;
        let values = slots.entry(scope).or_default();
        values.insert(key.as_str().to_string(), value);
        self.flush(scope, values)
    }

    fn remove(&self, scope: Scope, key: StorageKey) -> Result<()> {
        let mut slots = self.slots.write().map_err(poisoned)?;
        let values = slots.entry(scope).or_default();
        if values.remove(key.as_str()).is_some() {
            self.flush(scope, values)?;
        }
        Ok(())
    }

    fn clear_scope(&self, scope: Scope) -> Result<()> {
        let mut slots = self.slots.write().map_err(poisoned)?;
        let values = slots.entry(scope).or_default();
        values.clear();
        self.flush(scope, values)
    }
}
