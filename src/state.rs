//! Durable checkout progress.
//!
//! The wizard stores only opaque references to remote entities; the server
//! re-validates every one of them, so nothing here is trusted for
//! authorization or business rules.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, warn};

/// Checkout progress persisted between invocations.
///
/// Fields are populated in strict left-to-right order: a field may be set
/// only once everything before it is. That invariant is enforced by the step
/// guards, not by this store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WizardState {
    /// Offer chosen at step 1
    #[serde(default)]
    pub offer_id: Option<i64>,
    /// Counterparty created at step 2
    #[serde(default)]
    pub counterparty_id: Option<i64>,
    /// Contract draft created at step 3 (server-assigned, opaque)
    #[serde(default)]
    pub contract_id: Option<String>,
}

impl WizardState {
    /// Shallow-merge an update over this state. Fields present in the
    /// update overwrite; absent fields are preserved.
    pub fn merged(mut self, update: &WizardStateUpdate) -> Self {
        if let Some(id) = update.offer_id {
            self.offer_id = Some(id);
        }
        if let Some(id) = update.counterparty_id {
            self.counterparty_id = Some(id);
        }
        if let Some(id) = &update.contract_id {
            self.contract_id = Some(id.clone());
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.offer_id.is_none() && self.counterparty_id.is_none() && self.contract_id.is_none()
    }
}

/// Partial update for [`WizardState`]. `None` means "leave unchanged".
#[derive(Debug, Clone, Default)]
pub struct WizardStateUpdate {
    pub offer_id: Option<i64>,
    pub counterparty_id: Option<i64>,
    pub contract_id: Option<String>,
}

impl WizardStateUpdate {
    pub fn offer(id: i64) -> Self {
        Self {
            offer_id: Some(id),
            ..Self::default()
        }
    }

    pub fn counterparty(id: i64) -> Self {
        Self {
            counterparty_id: Some(id),
            ..Self::default()
        }
    }

    pub fn contract(id: impl Into<String>) -> Self {
        Self {
            contract_id: Some(id.into()),
            ..Self::default()
        }
    }
}

/// Durable key-value home for [`WizardState`].
///
/// None of the operations error: missing or corrupt data reads as "no
/// progress yet", and persistence failures are logged and swallowed so the
/// in-memory flow keeps going (progress just won't survive the process).
pub trait StateStore {
    fn load(&self) -> WizardState;
    fn save(&self, update: WizardStateUpdate);
    fn clear(&self);
}

/// Parse a stored payload, degrading anything unreadable to the default.
/// A JSON array, `null`, wrong-typed fields, or plain garbage all count as
/// "start over".
fn parse_state(contents: &str) -> WizardState {
    match serde_json::from_str(contents) {
        Ok(state) => state,
        Err(err) => {
            debug!("discarding unreadable wizard state: {}", err);
            WizardState::default()
        }
    }
}

/// File-backed store, one JSON document per checkout scope
pub struct FileStateStore {
    path: PathBuf,
}

impl FileStateStore {
    /// Store state as `wizard.json` inside the given state directory
    pub fn new(state_dir: impl Into<PathBuf>) -> Self {
        Self {
            path: state_dir.into().join("wizard.json"),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StateStore for FileStateStore {
    fn load(&self) -> WizardState {
        match fs::read_to_string(&self.path) {
            Ok(contents) => parse_state(&contents),
            Err(_) => WizardState::default(),
        }
    }

    fn save(&self, update: WizardStateUpdate) {
        let merged = self.load().merged(&update);

        if let Some(parent) = self.path.parent() {
            if let Err(err) = fs::create_dir_all(parent) {
                warn!("failed to create state directory: {}", err);
                return;
            }
        }

        match serde_json::to_string_pretty(&merged) {
            Ok(contents) => {
                if let Err(err) = fs::write(&self.path, contents) {
                    warn!("failed to persist wizard state: {}", err);
                }
            }
            Err(err) => warn!("failed to serialize wizard state: {}", err),
        }
    }

    fn clear(&self) {
        if let Err(err) = fs::remove_file(&self.path) {
            if err.kind() != std::io::ErrorKind::NotFound {
                warn!("failed to clear wizard state: {}", err);
            }
        }
    }
}

/// In-memory store behind the same interface, for tests.
///
/// Keeps the raw serialized payload so corrupt-data behavior matches the
/// file store exactly.
#[derive(Default)]
pub struct MemoryStateStore {
    contents: Mutex<Option<String>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with a raw payload, bypassing serialization
    pub fn set_raw(&self, raw: impl Into<String>) {
        *self.contents.lock().unwrap_or_else(PoisonError::into_inner) = Some(raw.into());
    }
}

impl StateStore for MemoryStateStore {
    fn load(&self) -> WizardState {
        let contents = self.contents.lock().unwrap_or_else(PoisonError::into_inner);
        match contents.as_deref() {
            Some(raw) => parse_state(raw),
            None => WizardState::default(),
        }
    }

    fn save(&self, update: WizardStateUpdate) {
        let merged = self.load().merged(&update);
        match serde_json::to_string(&merged) {
            Ok(raw) => *self.contents.lock().unwrap_or_else(PoisonError::into_inner) = Some(raw),
            Err(err) => warn!("failed to serialize wizard state: {}", err),
        }
    }

    fn clear(&self) {
        *self.contents.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_save_then_load_folds_updates_in_order() {
        let store = MemoryStateStore::new();
        store.save(WizardStateUpdate::offer(1));
        store.save(WizardStateUpdate::counterparty(2));
        store.save(WizardStateUpdate::contract("c-1"));
        store.save(WizardStateUpdate::offer(9));

        let state = store.load();
        assert_eq!(state.offer_id, Some(9));
        assert_eq!(state.counterparty_id, Some(2));
        assert_eq!(state.contract_id.as_deref(), Some("c-1"));
    }

    #[test]
    fn test_partial_update_preserves_other_fields() {
        let store = MemoryStateStore::new();
        store.save(WizardStateUpdate::offer(1));
        store.save(WizardStateUpdate::counterparty(2));

        let state = store.load();
        assert_eq!(state.offer_id, Some(1));
        assert_eq!(state.counterparty_id, Some(2));
        assert_eq!(state.contract_id, None);
    }

    #[test]
    fn test_load_after_clear_is_default() {
        let store = MemoryStateStore::new();
        store.save(WizardStateUpdate::offer(1));
        store.clear();
        assert_eq!(store.load(), WizardState::default());
        // Clearing again is a no-op
        store.clear();
        assert_eq!(store.load(), WizardState::default());
    }

    #[test]
    fn test_corrupt_payloads_read_as_empty() {
        let store = MemoryStateStore::new();
        for raw in ["not json at all", "[1,2,3]", "null", r#"{"offer_id":"NaN"}"#] {
            store.set_raw(raw);
            assert_eq!(store.load(), WizardState::default(), "payload: {raw}");
        }
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let store = MemoryStateStore::new();
        store.set_raw(r#"{"offer_id":4,"flavor":"strawberry"}"#);
        assert_eq!(store.load().offer_id, Some(4));
    }

    #[test]
    fn test_file_store_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStateStore::new(temp_dir.path());

        store.save(WizardStateUpdate::offer(1));
        store.save(WizardStateUpdate::counterparty(2));

        let state = store.load();
        assert_eq!(state.offer_id, Some(1));
        assert_eq!(state.counterparty_id, Some(2));
        assert_eq!(state.contract_id, None);
        assert!(store.path().exists());

        store.clear();
        assert!(!store.path().exists());
        assert_eq!(store.load(), WizardState::default());
    }

    #[test]
    fn test_file_store_missing_dir_reads_empty() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStateStore::new(temp_dir.path().join("nested").join("deeper"));
        assert_eq!(store.load(), WizardState::default());
        // Save creates the directory on demand
        store.save(WizardStateUpdate::offer(5));
        assert_eq!(store.load().offer_id, Some(5));
    }

    #[test]
    fn test_file_store_corrupt_file_reads_empty() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStateStore::new(temp_dir.path());
        std::fs::write(store.path(), "{{{{").unwrap();
        assert_eq!(store.load(), WizardState::default());
    }
}
