use serde_json::Value;

use super::controller::{FormController, FormResult};

/// Largest length `swap` and `replace` will pad an array to.
pub const MAX_PADDED_LEN: usize = 1 << 16;

/// Sequence operations over one array-valued field of a form.
///
/// Holds no items itself: every operation reads the field, builds a new
/// array and writes it back through [`FormController::set_value`].
///
/// Indices are not bounds-checked. `remove` past the end leaves the array
/// as it is, `insert` and `move_item` clamp the target to the end, and
/// `swap`, `replace` and an out-of-range `move_item` source pad or fill
/// with `null`. Padding stops at [`MAX_PADDED_LEN`]: a `swap` or `replace`
/// that would grow the array past it leaves the array unchanged.
#[derive(Clone)]
pub struct FieldArray {
    form: FormController,
    name: String,
}

impl FieldArray {
    pub fn new(form: FormController, name: impl Into<String>) -> Self {
        Self {
            form,
            name: name.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current items; empty when the field is absent or not an array.
    pub fn items(&self) -> FormResult<Vec<Value>> {
        Ok(match self.form.value(&self.name)? {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        })
    }

    pub fn len(&self) -> FormResult<usize> {
        Ok(self.items()?.len())
    }

    pub fn is_empty(&self) -> FormResult<bool> {
        Ok(self.items()?.is_empty())
    }

    pub fn append(&self, value: impl Into<Value>) -> FormResult<()> {
        let value = value.into();
        self.update(|items| {
            let mut next = items.to_vec();
            next.push(value);
            next
        })
    }

    pub fn prepend(&self, value: impl Into<Value>) -> FormResult<()> {
        let value = value.into();
        self.update(|items| {
            let mut next = Vec::with_capacity(items.len() + 1);
            next.push(value);
            next.extend_from_slice(items);
            next
        })
    }

    pub fn remove(&self, index: usize) -> FormResult<()> {
        self.update(|items| {
            items
                .iter()
                .enumerate()
                .filter(|(position, _)| *position != index)
                .map(|(_, item)| item.clone())
                .collect()
        })
    }

    pub fn insert(&self, index: usize, value: impl Into<Value>) -> FormResult<()> {
        let value = value.into();
        self.update(|items| {
            let mut next = items.to_vec();
            next.insert(index.min(next.len()), value);
            next
        })
    }

    pub fn move_item(&self, from: usize, to: usize) -> FormResult<()> {
        self.update(|items| {
            let mut next = items.to_vec();
            let item = if from < next.len() {
                next.remove(from)
            } else {
                Value::Null
            };
            next.insert(to.min(next.len()), item);
            next
        })
    }

    pub fn swap(&self, first: usize, second: usize) -> FormResult<()> {
        let Some(mut next) = self.padded(first.max(second))? else {
            return Ok(());
        };
        next.swap(first, second);
        self.form.set_value(&self.name, Value::Array(next))
    }

    pub fn replace(&self, index: usize, value: impl Into<Value>) -> FormResult<()> {
        let Some(mut next) = self.padded(index)? else {
            return Ok(());
        };
        next[index] = value.into();
        self.form.set_value(&self.name, Value::Array(next))
    }

    pub fn clear(&self) -> FormResult<()> {
        self.update(|_| Vec::new())
    }

    fn update(&self, change: impl FnOnce(&[Value]) -> Vec<Value>) -> FormResult<()> {
        let current = self.items()?;
        let next = change(&current);
        self.form.set_value(&self.name, Value::Array(next))
    }

    /// Current items grown with `null` until `index` exists, or `None` when
    /// that needs more than [`MAX_PADDED_LEN`] slots.
    fn padded(&self, index: usize) -> FormResult<Option<Vec<Value>>> {
        let mut items = self.items()?;
        if index < items.len() {
            return Ok(Some(items));
        }
        match index.checked_add(1).filter(|len| *len <= MAX_PADDED_LEN) {
            Some(len) => {
                items.resize(len, Value::Null);
                Ok(Some(items))
            }
            None => {
                log::warn!(
                    "ignoring write to `{}[{index}]`: arrays are padded to at most {MAX_PADDED_LEN} items",
                    self.name
                );
                Ok(None)
            }
        }
    }
}

impl FormController {
    pub fn field_array(&self, name: impl Into<String>) -> FieldArray {
        FieldArray::new(self.clone(), name)
    }
}
