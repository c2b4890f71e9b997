//! Field and form rules. Results reach the form only through the per-field
//! error channel, the same one `set_field_error` writes to.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Debug, Formatter};
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use futures_timer::Delay;
use regex::Regex;
use rust_decimal::Decimal;
use serde_json::Value;

use super::controller::{
    FieldValues, FormController, FormResult, ValidationMode, ValidationTicket, read_lock,
    write_lock,
};

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is a valid regex")
});

pub type FieldCheck = Arc<dyn Fn(&Value, &FieldValues) -> Result<(), String> + Send + Sync>;
pub type FormCheck = Arc<dyn Fn(&FieldValues) -> Vec<(String, String)> + Send + Sync>;
pub type BoxedValidationFuture<'a> = Pin<Box<dyn Future<Output = Result<(), String>> + Send + 'a>>;

pub(super) type AsyncFieldValidatorFn =
    Arc<dyn Fn(Value, FieldValues) -> BoxedValidationFuture<'static> + Send + Sync>;

#[derive(Clone)]
pub(super) struct AsyncFieldValidatorEntry {
    pub(super) debounce: Duration,
    pub(super) validator: AsyncFieldValidatorFn,
}

#[derive(Clone)]
pub enum Rule {
    Required,
    MinLength(usize),
    MaxLength(usize),
    Min(Decimal),
    Max(Decimal),
    Pattern(Regex),
    Email,
    Custom(FieldCheck),
}

impl Debug for Rule {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Rule::Required => f.write_str("Required"),
            Rule::MinLength(min) => f.debug_tuple("MinLength").field(min).finish(),
            Rule::MaxLength(max) => f.debug_tuple("MaxLength").field(max).finish(),
            Rule::Min(min) => f.debug_tuple("Min").field(min).finish(),
            Rule::Max(max) => f.debug_tuple("Max").field(max).finish(),
            Rule::Pattern(pattern) => f.debug_tuple("Pattern").field(&pattern.as_str()).finish(),
            Rule::Email => f.write_str("Email"),
            Rule::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct FieldRule {
    rule: Rule,
    message: Option<String>,
}

impl FieldRule {
    pub fn new(rule: Rule) -> Self {
        Self {
            rule,
            message: None,
        }
    }

    /// Replaces the rule's default message.
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn rule(&self) -> &Rule {
        &self.rule
    }

    pub fn check(&self, value: &Value, values: &FieldValues) -> Result<(), String> {
        self.evaluate(value, values)
            .map_err(|default| self.message.clone().unwrap_or(default))
    }

    fn evaluate(&self, value: &Value, values: &FieldValues) -> Result<(), String> {
        match &self.rule {
            Rule::Required => {
                if is_blank(value) {
                    Err("This field is required".into())
                } else {
                    Ok(())
                }
            }
            Rule::MinLength(min) => match length_of(value) {
                Some((len, unit)) if len < *min => Err(format!("Must be at least {min} {unit}")),
                _ => Ok(()),
            },
            Rule::MaxLength(max) => match length_of(value) {
                Some((len, unit)) if len > *max => Err(format!("Must be at most {max} {unit}")),
                _ => Ok(()),
            },
            Rule::Min(min) => match number_of(value)? {
                Some(number) if number < *min => Err(format!("Must be at least {min}")),
                _ => Ok(()),
            },
            Rule::Max(max) => match number_of(value)? {
                Some(number) if number > *max => Err(format!("Must be at most {max}")),
                _ => Ok(()),
            },
            Rule::Pattern(pattern) => match value {
                Value::String(text) if !text.is_empty() && !pattern.is_match(text) => {
                    Err("Invalid format".into())
                }
                _ => Ok(()),
            },
            Rule::Email => match value {
                Value::String(text) if !text.is_empty() && !EMAIL_PATTERN.is_match(text) => {
                    Err("Invalid email address".into())
                }
                _ => Ok(()),
            },
            Rule::Custom(check) => check(value, values),
        }
    }
}

pub fn required() -> FieldRule {
    FieldRule::new(Rule::Required)
}

pub fn min_length(min: usize) -> FieldRule {
    FieldRule::new(Rule::MinLength(min))
}

pub fn max_length(max: usize) -> FieldRule {
    FieldRule::new(Rule::MaxLength(max))
}

pub fn min(min: impl Into<Decimal>) -> FieldRule {
    FieldRule::new(Rule::Min(min.into()))
}

pub fn max(max: impl Into<Decimal>) -> FieldRule {
    FieldRule::new(Rule::Max(max.into()))
}

pub fn pattern(pattern: Regex) -> FieldRule {
    FieldRule::new(Rule::Pattern(pattern))
}

pub fn email() -> FieldRule {
    FieldRule::new(Rule::Email)
}

pub fn custom(
    check: impl Fn(&Value, &FieldValues) -> Result<(), String> + Send + Sync + 'static,
) -> FieldRule {
    FieldRule::new(Rule::Custom(Arc::new(check)))
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => text.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

fn length_of(value: &Value) -> Option<(usize, &'static str)> {
    match value {
        Value::String(text) if !text.is_empty() => Some((text.chars().count(), "characters")),
        Value::Array(items) if !items.is_empty() => Some((items.len(), "items")),
        _ => None,
    }
}

fn number_of(value: &Value) -> Result<Option<Decimal>, String> {
    let text = match value {
        Value::Number(number) => number.to_string(),
        Value::String(text) if !text.trim().is_empty() => text.trim().to_owned(),
        _ => return Ok(None),
    };
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .map(Some)
        .map_err(|_| "Must be a number".to_owned())
}

/// Ordered rules per field plus cross-field rules.
#[derive(Clone, Default)]
pub struct ValidationSchema {
    fields: BTreeMap<String, Vec<FieldRule>>,
    form_rules: Vec<FormCheck>,
}

impl ValidationSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(
        mut self,
        name: impl Into<String>,
        rules: impl IntoIterator<Item = FieldRule>,
    ) -> Self {
        self.fields.entry(name.into()).or_default().extend(rules);
        self
    }

    pub fn form_rule(
        mut self,
        check: impl Fn(&FieldValues) -> Vec<(String, String)> + Send + Sync + 'static,
    ) -> Self {
        self.form_rules.push(Arc::new(check));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.fields.values().all(Vec::is_empty) && self.form_rules.is_empty()
    }

    pub fn has_rules_for(&self, name: &str) -> bool {
        self.fields.get(name).is_some_and(|rules| !rules.is_empty())
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn merge(&mut self, other: ValidationSchema) {
        for (name, rules) in other.fields {
            self.fields.entry(name).or_default().extend(rules);
        }
        self.form_rules.extend(other.form_rules);
    }

    /// Messages of every failing rule of `name`, in rule order.
    pub fn validate_field(&self, name: &str, values: &FieldValues) -> Vec<String> {
        let Some(rules) = self.fields.get(name) else {
            return Vec::new();
        };
        let value = values.get(name).unwrap_or(&Value::Null);
        rules
            .iter()
            .filter_map(|rule| rule.check(value, values).err())
            .collect()
    }

    /// Failing messages per field. Fields with rules that all pass map to an
    /// empty list.
    pub fn validate(&self, values: &FieldValues) -> BTreeMap<String, Vec<String>> {
        let mut errors = self
            .fields
            .keys()
            .map(|name| (name.clone(), self.validate_field(name, values)))
            .collect::<BTreeMap<_, _>>();
        for rule in &self.form_rules {
            for (name, message) in rule(values) {
                errors.entry(name).or_default().push(message);
            }
        }
        errors
    }
}

pub trait AsyncFieldValidator: Send + Sync + 'static {
    fn validate(&self, value: Value, values: FieldValues) -> BoxedValidationFuture<'static>;
}

impl<F, Fut> AsyncFieldValidator for F
where
    F: Fn(Value, FieldValues) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), String>> + Send + 'static,
{
    fn validate(&self, value: Value, values: FieldValues) -> BoxedValidationFuture<'static> {
        Box::pin((self)(value, values))
    }
}

impl FormController {
    pub fn register_schema(&self, schema: ValidationSchema) -> FormResult<()> {
        write_lock(&self.schema, "registering validation schema")?.merge(schema);
        Ok(())
    }

    pub fn register_field_rule(&self, name: &str, rule: FieldRule) -> FormResult<()> {
        self.register_schema(ValidationSchema::new().field(name, [rule]))
    }

    pub fn register_form_rule(
        &self,
        check: impl Fn(&FieldValues) -> Vec<(String, String)> + Send + Sync + 'static,
    ) -> FormResult<()> {
        self.register_schema(ValidationSchema::new().form_rule(check))
    }

    pub fn register_async_field_validator<V>(&self, name: &str, validator: V) -> FormResult<()>
    where
        V: AsyncFieldValidator,
    {
        self.register_async_field_validator_with_debounce(name, 0, validator)
    }

    pub fn register_async_field_validator_with_debounce<V>(
        &self,
        name: &str,
        debounce_ms: u64,
        validator: V,
    ) -> FormResult<()>
    where
        V: AsyncFieldValidator,
    {
        let validator = Arc::new(validator);
        let wrapped: AsyncFieldValidatorFn =
            Arc::new(move |value: Value, values: FieldValues| validator.validate(value, values));
        let entry = AsyncFieldValidatorEntry {
            debounce: Duration::from_millis(debounce_ms),
            validator: wrapped,
        };
        let mut validators = write_lock(
            &self.async_field_validators,
            "registering async field validator",
        )?;
        validators.entry(name.to_owned()).or_default().push(entry);
        Ok(())
    }

    pub fn validate_field(&self, name: &str) -> FormResult<bool> {
        let valid = self.validate_field_by_name(name)?;
        self.notify()?;
        Ok(valid)
    }

    /// Runs every sync rule and overwrites every field's error with the outcome.
    pub fn validate_form(&self) -> FormResult<bool> {
        let valid = self.apply_form_validation()?;
        self.notify()?;
        Ok(valid)
    }

    /// Sync rules first; async validators only run for fields that passed them.
    pub async fn validate_field_async(&self, name: &str) -> FormResult<Vec<ValidationTicket>> {
        let tickets = if self.validate_field_by_name(name)? {
            self.validate_field_async_registered(name).await?
        } else {
            Vec::new()
        };
        self.notify()?;
        Ok(tickets)
    }

    pub async fn validate_form_async(&self) -> FormResult<bool> {
        let valid = self.validate_form_silently().await?;
        self.notify()?;
        Ok(valid)
    }

    pub async fn set_value_async(&self, name: &str, value: impl Into<Value>) -> FormResult<()> {
        self.set_value(name, value)?;
        if self.options.validate_mode == ValidationMode::OnChange && self.field_is_clean(name)? {
            self.validate_field_async_registered(name).await?;
            self.notify()?;
        }
        Ok(())
    }

    pub async fn touch_async(&self, name: &str) -> FormResult<()> {
        self.touch(name)?;
        if self.options.validate_mode == ValidationMode::OnBlur && self.field_is_clean(name)? {
            self.validate_field_async_registered(name).await?;
            self.notify()?;
        }
        Ok(())
    }

    pub(super) fn has_validators(&self) -> FormResult<bool> {
        let has_sync = !read_lock(&self.schema, "checking for validators")?.is_empty();
        let has_async = !read_lock(&self.async_field_validators, "checking for async validators")?
            .is_empty();
        Ok(has_sync || has_async)
    }

    pub(super) async fn validate_form_silently(&self) -> FormResult<bool> {
        if !self.apply_form_validation()? {
            return Ok(false);
        }
        let names = read_lock(
            &self.async_field_validators,
            "reading async validator keys for form validation",
        )?
        .keys()
        .cloned()
        .collect::<Vec<_>>();
        for name in names {
            self.validate_field_async_registered(&name).await?;
        }
        Ok(read_lock(&self.state, "reading form validity")?
            .field_meta
            .values()
            .all(|meta| meta.error.is_none()))
    }

    /// Validates one field against its sync rules. Fields without rules are
    /// left alone so errors set from outside survive.
    ///
    /// Rules run under the state write lock, so they see exactly the values
    /// their result is stored against. A rule must not call back into the
    /// form.
    pub(super) fn validate_field_by_name(&self, name: &str) -> FormResult<bool> {
        let schema = read_lock(&self.schema, "reading field rules")?.clone();
        if !schema.has_rules_for(name) {
            return self.field_is_clean(name);
        }
        let mut state = write_lock(&self.state, "validating field")?;
        let first_error = schema
            .validate_field(name, &state.values)
            .into_iter()
            .next();
        let meta = state.ensure_meta(name);
        meta.validating = false;
        meta.error = first_error;
        Ok(meta.error.is_none())
    }

    fn apply_form_validation(&self) -> FormResult<bool> {
        let schema = read_lock(&self.schema, "reading rules for form validation")?.clone();
        let mut state = write_lock(&self.state, "validating form")?;
        let mut field_errors = schema.validate(&state.values);
        let mut names = state.field_meta.keys().cloned().collect::<BTreeSet<_>>();
        names.extend(field_errors.keys().cloned());
        for name in names {
            let first_error = field_errors
                .remove(&name)
                .and_then(|errors| errors.into_iter().next());
            let meta = state.ensure_meta(&name);
            meta.validating = false;
            meta.error = first_error;
        }
        Ok(state.field_meta.values().all(|meta| meta.error.is_none()))
    }

    async fn validate_field_async_registered(&self, name: &str) -> FormResult<Vec<ValidationTicket>> {
        let validators = read_lock(
            &self.async_field_validators,
            "reading registered async validators",
        )?
        .get(name)
        .cloned()
        .unwrap_or_default();

        let mut tickets = Vec::with_capacity(validators.len());
        for entry in validators {
            let ticket = {
                let mut state = write_lock(&self.state, "starting async validation")?;
                let next = ValidationTicket(
                    state
                        .tickets
                        .get(name)
                        .copied()
                        .unwrap_or(ValidationTicket(0))
                        .0
                        + 1,
                );
                state.tickets.insert(name.to_owned(), next);
                state.ensure_meta(name).validating = true;
                next
            };

            if !entry.debounce.is_zero() {
                Delay::new(entry.debounce).await;
                if !self.is_latest_ticket(name, ticket)? {
                    continue;
                }
            }

            let (value, values) = {
                let state = read_lock(&self.state, "reading values for async validation")?;
                let value = state.values.get(name).cloned().unwrap_or(Value::Null);
                (value, state.values.clone())
            };
            let result = (entry.validator)(value, values).await;
            let failed = result.is_err();
            self.finish_async_validation(name, ticket, result)?;
            tickets.push(ticket);
            if failed {
                break;
            }
        }
        Ok(tickets)
    }

    fn is_latest_ticket(&self, name: &str, ticket: ValidationTicket) -> FormResult<bool> {
        Ok(read_lock(&self.state, "checking latest validation ticket")?
            .tickets
            .get(name)
            .copied()
            == Some(ticket))
    }

    fn field_is_clean(&self, name: &str) -> FormResult<bool> {
        Ok(read_lock(&self.state, "reading field error")?
            .field_meta
            .get(name)
            .is_none_or(|meta| meta.error.is_none()))
    }

    fn finish_async_validation(
        &self,
        name: &str,
        ticket: ValidationTicket,
        result: Result<(), String>,
    ) -> FormResult<()> {
        let mut state = write_lock(&self.state, "finishing async validation")?;
        if state.tickets.get(name).copied() != Some(ticket) {
            return Ok(());
        }
        let meta = state.ensure_meta(name);
        meta.validating = false;
        meta.error = result.err();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn values(entries: &[(&str, Value)]) -> FieldValues {
        entries
            .iter()
            .map(|(name, value)| ((*name).to_owned(), value.clone()))
            .collect()
    }

    #[test]
    fn required_rejects_blank_text_and_empty_lists() {
        let rule = required();
        let all = FieldValues::new();
        assert!(rule.check(&json!("   "), &all).is_err());
        assert!(rule.check(&json!([]), &all).is_err());
        assert!(rule.check(&Value::Null, &all).is_err());
        assert!(rule.check(&json!(false), &all).is_ok());
        assert!(rule.check(&json!("Ab"), &all).is_ok());
    }

    #[test]
    fn length_rules_count_chars_and_skip_empty_values() {
        let all = FieldValues::new();
        assert_eq!(
            min_length(3).check(&json!("Ab"), &all),
            Err("Must be at least 3 characters".to_owned())
        );
        assert!(min_length(3).check(&json!(""), &all).is_ok());
        assert!(max_length(2).check(&json!("ÄÖ"), &all).is_ok());
        assert_eq!(
            max_length(1).check(&json!(["a", "b"]), &all),
            Err("Must be at most 1 items".to_owned())
        );
    }

    #[test]
    fn numeric_bounds_accept_numbers_and_numeric_text() {
        let all = FieldValues::new();
        assert!(min(1).check(&json!(0), &all).is_err());
        assert!(min(1).check(&json!("2"), &all).is_ok());
        assert!(max(20).check(&json!(20.5), &all).is_err());
        assert_eq!(
            max(20).check(&json!("lots"), &all),
            Err("Must be a number".to_owned())
        );
    }

    #[test]
    fn custom_message_replaces_default() {
        let rule = required().message("Name your household");
        assert_eq!(
            rule.check(&json!(""), &FieldValues::new()),
            Err("Name your household".to_owned())
        );
    }

    #[test]
    fn email_and_pattern_only_check_non_empty_text() {
        let all = FieldValues::new();
        assert!(email().check(&json!("someone@example.com"), &all).is_ok());
        assert!(email().check(&json!("someone@"), &all).is_err());
        assert!(email().check(&json!(""), &all).is_ok());

        let code = pattern(Regex::new("^[A-Z0-9]{6}$").expect("valid regex"));
        assert!(code.check(&json!("AB12CD"), &all).is_ok());
        assert_eq!(
            code.check(&json!("ab12"), &all),
            Err("Invalid format".to_owned())
        );
    }

    #[test]
    fn schema_reports_rule_order_and_form_rules() {
        let schema = ValidationSchema::new()
            .field("name", [required(), min_length(2)])
            .field("password", [required()])
            .form_rule(|values| {
                if values.get("password") != values.get("confirm_password") {
                    vec![("confirm_password".to_owned(), "Passwords differ".to_owned())]
                } else {
                    Vec::new()
                }
            });
        let input = values(&[
            ("name", json!("")),
            ("password", json!("secret")),
            ("confirm_password", json!("secrets")),
        ]);

        let errors = schema.validate(&input);
        assert_eq!(errors["name"], vec!["This field is required".to_owned()]);
        assert!(errors["password"].is_empty());
        assert_eq!(errors["confirm_password"], vec!["Passwords differ".to_owned()]);
    }
}
