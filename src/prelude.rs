pub use crate::form::rules::{
    custom, email, max, max_length, min, min_length, pattern, required,
};
pub use crate::form::{
    FieldArray, FieldProps, FieldState, FieldValues, FormController, FormError, FormModel,
    FormOptions, FormResult, FormSnapshot, InputEvent, InputType, SubmitEvent, SubmitResult,
    ValidationMode, ValidationSchema,
};
