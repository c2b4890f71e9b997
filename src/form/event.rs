use std::fmt::{Debug, Formatter};
use std::str::FromStr;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde_json::{Number, Value};

use super::controller::FormController;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum InputType {
    #[default]
    Text,
    Password,
    Email,
    Number,
    Range,
    Checkbox,
    Radio,
    Select,
    Textarea,
    Date,
}

impl InputType {
    /// Maps a DOM `type` attribute onto an input kind; unknown kinds are text.
    pub fn from_dom(kind: &str) -> Self {
        match kind {
            "password" => Self::Password,
            "email" => Self::Email,
            "number" => Self::Number,
            "range" => Self::Range,
            "checkbox" => Self::Checkbox,
            "radio" => Self::Radio,
            "select-one" | "select" => Self::Select,
            "textarea" => Self::Textarea,
            "date" => Self::Date,
            _ => Self::Text,
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, Self::Number | Self::Range)
    }
}

/// The target of an input change or blur, as a form control reports it.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct InputEvent {
    pub name: String,
    pub value: String,
    pub input_type: InputType,
    pub checked: bool,
}

impl InputEvent {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            ..Self::default()
        }
    }

    pub fn checkbox(name: impl Into<String>, checked: bool) -> Self {
        Self {
            name: name.into(),
            value: "on".into(),
            input_type: InputType::Checkbox,
            checked,
        }
    }

    pub fn input_type(mut self, input_type: InputType) -> Self {
        self.input_type = input_type;
        self
    }

    pub(super) fn field_value(&self, coerce_numeric: bool) -> Value {
        if self.input_type == InputType::Checkbox {
            return Value::Bool(self.checked);
        }
        if coerce_numeric && self.input_type.is_numeric() {
            if let Some(number) = number_from_text(&self.value) {
                return Value::Number(number);
            }
        }
        Value::String(self.value.clone())
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct SubmitEvent {
    default_prevented: bool,
    propagation_stopped: bool,
}

impl SubmitEvent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prevent_default(&mut self) {
        self.default_prevented = true;
    }

    pub fn stop_propagation(&mut self) {
        self.propagation_stopped = true;
    }

    pub fn default_prevented(&self) -> bool {
        self.default_prevented
    }

    pub fn propagation_stopped(&self) -> bool {
        self.propagation_stopped
    }
}

pub type InputHandler = Arc<dyn Fn(&InputEvent) + Send + Sync>;

/// Everything a bindable input needs from the form.
#[derive(Clone)]
pub struct FieldProps {
    pub name: String,
    pub value: Value,
    pub on_change: InputHandler,
    pub on_blur: InputHandler,
}

impl Debug for FieldProps {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldProps")
            .field("name", &self.name)
            .field("value", &self.value)
            .finish_non_exhaustive()
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct FieldState {
    pub value: Option<Value>,
    pub error: Option<String>,
    pub touched: bool,
}

impl FieldState {
    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn is_touched(&self) -> bool {
        self.touched
    }
}

impl FormController {
    pub fn field_props(&self, name: &str) -> super::FormResult<FieldProps> {
        let value = self.value(name)?.unwrap_or_else(|| Value::String(String::new()));
        let on_change = {
            let controller = self.clone();
            Arc::new(move |event: &InputEvent| {
                if let Err(error) = controller.handle_change(event) {
                    log::warn!("dropping change of field `{}`: {error}", event.name);
                }
            }) as InputHandler
        };
        let on_blur = {
            let controller = self.clone();
            Arc::new(move |event: &InputEvent| {
                if let Err(error) = controller.handle_blur(event) {
                    log::warn!("dropping blur of field `{}`: {error}", event.name);
                }
            }) as InputHandler
        };
        Ok(FieldProps {
            name: name.to_owned(),
            value,
            on_change,
            on_blur,
        })
    }
}

pub(super) fn number_from_text(text: &str) -> Option<Number> {
    let decimal = Decimal::from_str(text.trim()).ok()?;
    Number::from_str(&decimal.normalize().to_string()).ok()
}
