use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use super::controller::{FieldValues, FormController, FormError, FormResult, read_lock, write_lock};

/// Holds unfinished input under a key the caller picks, such as the dialog
/// name. Drafts outlive the controller that saved them, so a view that is
/// built again with a fresh controller can restore them.
pub trait FormDraftStore: Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync + 'static;

    fn save(&self, key: &str, values: &FieldValues) -> Result<(), Self::Error>;
    fn load(&self, key: &str) -> Result<Option<FieldValues>, Self::Error>;
    fn clear(&self, key: &str) -> Result<(), Self::Error>;
}

/// Process-local drafts; gone when the last clone of the store is dropped.
#[derive(Clone, Default)]
pub struct InMemoryDraftStore {
    drafts: Arc<RwLock<BTreeMap<String, FieldValues>>>,
}

impl InMemoryDraftStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn keys(&self) -> FormResult<Vec<String>> {
        Ok(read_lock(&self.drafts, "listing drafts")?
            .keys()
            .cloned()
            .collect())
    }
}

impl FormDraftStore for InMemoryDraftStore {
    type Error = FormError;

    fn save(&self, key: &str, values: &FieldValues) -> FormResult<()> {
        write_lock(&self.drafts, "storing draft")?.insert(key.to_owned(), values.clone());
        Ok(())
    }

    fn load(&self, key: &str) -> FormResult<Option<FieldValues>> {
        Ok(read_lock(&self.drafts, "reading draft")?.get(key).cloned())
    }

    fn clear(&self, key: &str) -> FormResult<()> {
        write_lock(&self.drafts, "removing draft")?.remove(key);
        Ok(())
    }
}

impl FormController {
    pub fn save_draft<S: FormDraftStore>(&self, store: &S, key: &str) -> FormResult<()> {
        let values = self.values()?;
        store
            .save(key, &values)
            .map_err(|error| FormError::DraftSaveFailed(error.to_string()))?;
        log::debug!("saved draft `{key}` with {} field(s)", values.len());
        Ok(())
    }

    /// Swaps the current values for the draft stored under `key`, if any.
    /// Errors, touched flags and pending validations are dropped. The
    /// baseline stays, so a restored draft reads as dirty.
    pub fn load_draft<S: FormDraftStore>(&self, store: &S, key: &str) -> FormResult<bool> {
        let draft = store
            .load(key)
            .map_err(|error| FormError::DraftLoadFailed(error.to_string()))?;
        let Some(draft) = draft else {
            return Ok(false);
        };

        self.reset_values(Some(draft))?;
        log::debug!("restored draft `{key}`");
        self.notify()?;
        Ok(true)
    }

    pub fn clear_draft<S: FormDraftStore>(&self, store: &S, key: &str) -> FormResult<()> {
        store
            .clear(key)
            .map_err(|error| FormError::DraftClearFailed(error.to_string()))
    }
}
