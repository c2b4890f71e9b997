use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::event::{FieldState, InputEvent, SubmitEvent};
use super::model::FormModel;
use super::submit::{SubmitHandler, SubmitHandlerFn, SubmitResult, panic_message};
use super::validation::{AsyncFieldValidatorEntry, ValidationSchema};

static FORM_ID_ALLOCATOR: AtomicU64 = AtomicU64::new(1);

pub(super) const VALIDATION_FAILED: &str = "form has validation errors";

pub type FieldValues = BTreeMap<String, Value>;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct FormId(pub u64);

impl FormId {
    pub fn next() -> Self {
        Self(FORM_ID_ALLOCATOR.fetch_add(1, Ordering::SeqCst))
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct SubscriptionId(pub u64);

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct ValidationTicket(pub u64);

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationMode {
    OnChange,
    OnBlur,
    #[default]
    OnSubmit,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormOptions {
    pub validate_mode: ValidationMode,
    /// Restore the baseline values after a submission that reports success.
    pub reset_on_submit: bool,
    /// Store number and range inputs as JSON numbers instead of text.
    pub coerce_numeric_inputs: bool,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct FieldMeta {
    pub error: Option<String>,
    pub touched: bool,
    pub validating: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FormSnapshot {
    pub values: FieldValues,
    pub errors: BTreeMap<String, String>,
    pub touched: BTreeMap<String, bool>,
    pub is_submitting: bool,
    pub is_dirty: bool,
    pub is_valid: bool,
    pub submit_count: u32,
    pub last_result: Option<SubmitResult>,
}

#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum FormError {
    #[error("form state lock poisoned while {0}")]
    StatePoisoned(&'static str),
    #[error("failed to encode field `{field}`: {message}")]
    FieldEncode { field: String, message: String },
    #[error("failed to decode field `{field}`: {message}")]
    FieldDecode { field: String, message: String },
    #[error("failed to load draft: {0}")]
    DraftLoadFailed(String),
    #[error("failed to save draft: {0}")]
    DraftSaveFailed(String),
    #[error("failed to clear draft: {0}")]
    DraftClearFailed(String),
}

pub type FormResult<T> = Result<T, FormError>;

pub type Listener = Arc<dyn Fn(&FormSnapshot) + Send + Sync>;

#[derive(Default)]
pub(super) struct Listeners {
    next_id: u64,
    entries: BTreeMap<SubscriptionId, Listener>,
}

pub(super) struct FormState {
    pub(super) id: FormId,
    pub(super) initial_values: FieldValues,
    pub(super) values: FieldValues,
    pub(super) field_meta: BTreeMap<String, FieldMeta>,
    pub(super) tickets: BTreeMap<String, ValidationTicket>,
    pub(super) in_flight: u32,
    pub(super) submit_count: u32,
    pub(super) last_result: Option<SubmitResult>,
}

impl FormState {
    pub(super) fn ensure_meta(&mut self, name: &str) -> &mut FieldMeta {
        self.field_meta.entry(name.to_owned()).or_default()
    }

    fn is_dirty(&self) -> bool {
        self.values
            .iter()
            .any(|(name, value)| self.initial_values.get(name) != Some(value))
            || self
                .initial_values
                .keys()
                .any(|name| !self.values.contains_key(name))
    }

    fn is_valid(&self) -> bool {
        self.field_meta.values().all(|meta| meta.error.is_none())
    }

    fn snapshot(&self) -> FormSnapshot {
        FormSnapshot {
            values: self.values.clone(),
            errors: self
                .field_meta
                .iter()
                .filter_map(|(name, meta)| Some((name.clone(), meta.error.clone()?)))
                .collect(),
            touched: self
                .field_meta
                .iter()
                .filter(|(_, meta)| meta.touched)
                .map(|(name, _)| (name.clone(), true))
                .collect(),
            is_submitting: self.in_flight > 0,
            is_dirty: self.is_dirty(),
            is_valid: self.is_valid(),
            submit_count: self.submit_count,
            last_result: self.last_result.clone(),
        }
    }
}

/// Shared handle to the state of one form on screen.
///
/// Cloning is cheap; clones observe and mutate the same form.
#[derive(Clone)]
pub struct FormController {
    pub(super) options: FormOptions,
    pub(super) state: Arc<RwLock<FormState>>,
    pub(super) schema: Arc<RwLock<ValidationSchema>>,
    pub(super) async_field_validators: Arc<RwLock<BTreeMap<String, Vec<AsyncFieldValidatorEntry>>>>,
    pub(super) submit_handler: Arc<RwLock<Option<SubmitHandlerFn>>>,
    pub(super) listeners: Arc<RwLock<Listeners>>,
}

impl FormController {
    pub fn new(initial: FieldValues, options: FormOptions) -> Self {
        Self {
            options,
            state: Arc::new(RwLock::new(FormState {
                id: FormId::next(),
                initial_values: initial.clone(),
                values: initial,
                field_meta: BTreeMap::new(),
                tickets: BTreeMap::new(),
                in_flight: 0,
                submit_count: 0,
                last_result: None,
            })),
            schema: Arc::new(RwLock::new(ValidationSchema::new())),
            async_field_validators: Arc::new(RwLock::new(BTreeMap::new())),
            submit_handler: Arc::new(RwLock::new(None)),
            listeners: Arc::new(RwLock::new(Listeners::default())),
        }
    }

    pub fn from_model<M>(model: &M, options: FormOptions) -> FormResult<Self>
    where
        M: FormModel,
    {
        Ok(Self::new(model.to_values()?, options))
    }

    pub fn form_id(&self) -> FormResult<FormId> {
        Ok(read_lock(&self.state, "reading form id")?.id)
    }

    pub fn options(&self) -> FormOptions {
        self.options
    }

    pub fn register_submit_handler<H>(&self, handler: H) -> FormResult<()>
    where
        H: SubmitHandler,
    {
        let handler: SubmitHandlerFn = Arc::new(handler);
        *write_lock(&self.submit_handler, "registering submit handler")? = Some(handler);
        Ok(())
    }

    pub fn subscribe(
        &self,
        listener: impl Fn(&FormSnapshot) + Send + Sync + 'static,
    ) -> FormResult<SubscriptionId> {
        let mut listeners = write_lock(&self.listeners, "subscribing to form changes")?;
        listeners.next_id += 1;
        let id = SubscriptionId(listeners.next_id);
        listeners.entries.insert(id, Arc::new(listener));
        Ok(id)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> FormResult<bool> {
        let mut listeners = write_lock(&self.listeners, "unsubscribing from form changes")?;
        Ok(listeners.entries.remove(&id).is_some())
    }

    /// Writes one field. An existing error on the field is dropped; in
    /// `OnChange` mode the field's rules then run again.
    pub fn set_value(&self, name: &str, value: impl Into<Value>) -> FormResult<()> {
        {
            let mut state = write_lock(&self.state, "writing field value")?;
            state.values.insert(name.to_owned(), value.into());
            if let Some(meta) = state.field_meta.get_mut(name) {
                meta.error = None;
            }
        }

        if self.options.validate_mode == ValidationMode::OnChange {
            self.validate_field_by_name(name)?;
        }
        self.notify()
    }

    pub fn update_values<I, K, V>(&self, partial: I) -> FormResult<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        {
            let mut state = write_lock(&self.state, "merging field values")?;
            state.values.extend(
                partial
                    .into_iter()
                    .map(|(name, value)| (name.into(), value.into())),
            );
        }
        self.notify()
    }

    pub fn handle_change(&self, event: &InputEvent) -> FormResult<()> {
        let value = event.field_value(self.options.coerce_numeric_inputs);
        self.set_value(&event.name, value)
    }

    pub fn handle_blur(&self, event: &InputEvent) -> FormResult<()> {
        self.touch(&event.name)
    }

    pub fn touch(&self, name: &str) -> FormResult<()> {
        {
            let mut state = write_lock(&self.state, "touching field")?;
            state.ensure_meta(name).touched = true;
        }

        if self.options.validate_mode == ValidationMode::OnBlur {
            self.validate_field_by_name(name)?;
        }
        self.notify()
    }

    pub fn set_field_error(&self, name: &str, message: impl Into<String>) -> FormResult<()> {
        {
            let mut state = write_lock(&self.state, "setting field error")?;
            state.ensure_meta(name).error = Some(message.into());
        }
        self.notify()
    }

    pub fn clear_field_error(&self, name: &str) -> FormResult<()> {
        {
            let mut state = write_lock(&self.state, "clearing field error")?;
            if let Some(meta) = state.field_meta.get_mut(name) {
                meta.error = None;
                meta.validating = false;
            }
        }
        self.notify()
    }

    pub fn clear_errors(&self) -> FormResult<()> {
        {
            let mut state = write_lock(&self.state, "clearing all field errors")?;
            for meta in state.field_meta.values_mut() {
                meta.error = None;
                meta.validating = false;
            }
        }
        self.notify()
    }

    /// Restores `values` (the construction baseline when `None`) and drops
    /// every error, touched flag and pending async validation.
    pub fn reset(&self, values: Option<FieldValues>) -> FormResult<()> {
        self.reset_values(values)?;
        self.notify()
    }

    pub fn reset_field(&self, name: &str) -> FormResult<()> {
        {
            let mut state = write_lock(&self.state, "resetting field")?;
            match state.initial_values.get(name).cloned() {
                Some(initial) => {
                    state.values.insert(name.to_owned(), initial);
                }
                None => {
                    state.values.remove(name);
                }
            }
            state.field_meta.remove(name);
            state.tickets.remove(name);
        }
        self.notify()
    }

    pub fn value(&self, name: &str) -> FormResult<Option<Value>> {
        Ok(read_lock(&self.state, "reading field value")?
            .values
            .get(name)
            .cloned())
    }

    pub fn values(&self) -> FormResult<FieldValues> {
        Ok(read_lock(&self.state, "reading field values")?.values.clone())
    }

    pub fn model<M>(&self) -> FormResult<M>
    where
        M: FormModel,
    {
        M::from_values(&read_lock(&self.state, "decoding form model")?.values)
    }

    pub fn field_state(&self, name: &str) -> FormResult<FieldState> {
        let state = read_lock(&self.state, "reading field state")?;
        let meta = state.field_meta.get(name);
        Ok(FieldState {
            value: state.values.get(name).cloned(),
            error: meta.and_then(|meta| meta.error.clone()),
            touched: meta.is_some_and(|meta| meta.touched),
        })
    }

    pub fn field_meta(&self, name: &str) -> FormResult<Option<FieldMeta>> {
        Ok(read_lock(&self.state, "reading field meta")?
            .field_meta
            .get(name)
            .cloned())
    }

    /// The field's error once the user has left the field or tried to submit.
    pub fn field_error_for_display(&self, name: &str) -> FormResult<Option<String>> {
        let state = read_lock(&self.state, "reading display error message")?;
        let Some(meta) = state.field_meta.get(name) else {
            return Ok(None);
        };
        if !meta.touched && state.submit_count == 0 {
            return Ok(None);
        }
        Ok(meta.error.clone())
    }

    pub fn snapshot(&self) -> FormResult<FormSnapshot> {
        Ok(read_lock(&self.state, "creating form snapshot")?.snapshot())
    }

    pub fn is_dirty(&self) -> FormResult<bool> {
        Ok(read_lock(&self.state, "computing dirty flag")?.is_dirty())
    }

    pub fn is_valid(&self) -> FormResult<bool> {
        Ok(read_lock(&self.state, "computing valid flag")?.is_valid())
    }

    pub fn is_submitting(&self) -> FormResult<bool> {
        Ok(read_lock(&self.state, "reading submit flag")?.in_flight > 0)
    }

    /// Runs the registered submit handler against the current values.
    ///
    /// Never fails: handler errors and panics come back as a failed
    /// [`SubmitResult`]. `is_submitting` is cleared on every path.
    pub async fn handle_submit(&self, event: Option<&mut SubmitEvent>) -> SubmitResult {
        if let Some(event) = event {
            event.prevent_default();
            event.stop_propagation();
        }

        let handler = match read_lock(&self.submit_handler, "reading submit handler") {
            Ok(handler) => handler.clone(),
            Err(error) => {
                log::error!("form submission aborted: {error}");
                return SubmitResult::failure(error.to_string());
            }
        };
        self.submit_with_handler(handler).await
    }

    /// Like [`handle_submit`](Self::handle_submit) with a one-off handler.
    pub async fn submit_with<H>(&self, handler: H) -> SubmitResult
    where
        H: SubmitHandler,
    {
        let handler: SubmitHandlerFn = Arc::new(handler);
        self.submit_with_handler(Some(handler)).await
    }

    async fn submit_with_handler(&self, handler: Option<SubmitHandlerFn>) -> SubmitResult {
        let values = match self.begin_submit() {
            Ok(values) => values,
            Err(error) => {
                log::error!("form submission aborted: {error}");
                return SubmitResult::failure(error.to_string());
            }
        };

        let result = match self.run_submit(handler, values).await {
            Ok(result) => result,
            Err(error) => {
                log::error!("form submission aborted: {error}");
                SubmitResult::failure(error.to_string())
            }
        };

        if let Err(error) = self.finish_submit(&result) {
            log::error!("failed to record submission outcome: {error}");
        }
        result
    }

    fn begin_submit(&self) -> FormResult<FieldValues> {
        let values = {
            let mut state = write_lock(&self.state, "preparing submit")?;
            if state.in_flight > 0 {
                log::warn!(
                    "form {:?} submitted while {} submission(s) in flight",
                    state.id,
                    state.in_flight
                );
            }
            state.in_flight += 1;
            state.submit_count = state.submit_count.saturating_add(1);
            log::debug!("form {:?} submission #{} started", state.id, state.submit_count);
            state.values.clone()
        };
        self.notify()?;
        Ok(values)
    }

    async fn run_submit(
        &self,
        handler: Option<SubmitHandlerFn>,
        values: FieldValues,
    ) -> FormResult<SubmitResult> {
        if self.has_validators()? && !self.validate_form_silently().await? {
            log::debug!("form submission skipped: {VALIDATION_FAILED}");
            return Ok(SubmitResult::failure(VALIDATION_FAILED));
        }

        let Some(handler) = handler else {
            log::debug!("no submit handler registered, nothing to send");
            return Ok(SubmitResult::success(None));
        };

        let outcome = AssertUnwindSafe(async move { handler.submit(values).await })
            .catch_unwind()
            .await;
        let result = match outcome {
            Ok(Ok(result)) => result,
            Ok(Err(error)) => {
                log::error!("form submission failed: {error:#}");
                SubmitResult::failure(error.to_string())
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                log::error!("submit handler panicked: {message}");
                SubmitResult::failure(message)
            }
        };

        if result.success && self.options.reset_on_submit {
            self.reset_values(None)?;
        }
        Ok(result)
    }

    fn finish_submit(&self, result: &SubmitResult) -> FormResult<()> {
        {
            let mut state = write_lock(&self.state, "completing submit")?;
            state.in_flight = state.in_flight.saturating_sub(1);
            state.last_result = Some(result.clone());
            log::debug!(
                "form {:?} submission finished, success = {}",
                state.id,
                result.success
            );
        }
        self.notify()
    }

    pub(super) fn reset_values(&self, values: Option<FieldValues>) -> FormResult<()> {
        let mut state = write_lock(&self.state, "resetting form")?;
        let values = values.unwrap_or_else(|| state.initial_values.clone());
        state.values = values;
        state.field_meta.clear();
        state.tickets.clear();
        Ok(())
    }

    pub(super) fn notify(&self) -> FormResult<()> {
        let listeners = read_lock(&self.listeners, "reading form listeners")?
            .entries
            .values()
            .cloned()
            .collect::<Vec<_>>();
        if listeners.is_empty() {
            return Ok(());
        }
        let snapshot = self.snapshot()?;
        for listener in listeners {
            listener(&snapshot);
        }
        Ok(())
    }
}

pub(super) fn read_lock<'a, T>(
    lock: &'a RwLock<T>,
    context: &'static str,
) -> FormResult<RwLockReadGuard<'a, T>> {
    lock.read().map_err(|_| FormError::StatePoisoned(context))
}

pub(super) fn write_lock<'a, T>(
    lock: &'a RwLock<T>,
    context: &'static str,
) -> FormResult<RwLockWriteGuard<'a, T>> {
    lock.write().map_err(|_| FormError::StatePoisoned(context))
}
