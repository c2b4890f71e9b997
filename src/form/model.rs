use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::controller::{FieldValues, FormError, FormResult};

/// A typed form whose fields map one-to-one onto entries of [`FieldValues`].
///
/// Usually implemented through `#[derive(FormModel)]`.
pub trait FormModel: Sized {
    type Fields;

    fn fields() -> Self::Fields;
    fn field_names() -> &'static [&'static str];
    fn to_values(&self) -> FormResult<FieldValues>;
    fn from_values(values: &FieldValues) -> FormResult<Self>;
}

pub fn encode_field<V>(field: &str, value: &V) -> FormResult<Value>
where
    V: Serialize + ?Sized,
{
    serde_json::to_value(value).map_err(|error| FormError::FieldEncode {
        field: field.to_owned(),
        message: error.to_string(),
    })
}

/// Missing keys decode from `null`, so optional fields may be left out.
pub fn decode_field<V>(values: &FieldValues, field: &str) -> FormResult<V>
where
    V: DeserializeOwned,
{
    let value = values.get(field).cloned().unwrap_or(Value::Null);
    serde_json::from_value(value).map_err(|error| FormError::FieldDecode {
        field: field.to_owned(),
        message: error.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_key_decodes_as_none() {
        let values = FieldValues::new();
        let decoded: Option<String> = decode_field(&values, "nickname").expect("decode");
        assert_eq!(decoded, None);
    }

    #[test]
    fn type_mismatch_reports_field_name() {
        let mut values = FieldValues::new();
        values.insert("max_members".into(), json!("five"));
        let error = decode_field::<u32>(&values, "max_members").expect_err("must fail");
        assert!(matches!(error, FormError::FieldDecode { ref field, .. } if field == "max_members"));
    }
}
