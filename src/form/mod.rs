mod controller;
mod draft;
mod event;
mod field_array;
mod model;
mod submit;
mod validation;


pub use controller::{
    FieldMeta, FieldValues, FormController, FormError, FormId, FormOptions, FormResult,
    FormSnapshot, Listener, SubscriptionId, ValidationMode, ValidationTicket,
};
pub use draft::{FormDraftStore, InMemoryDraftStore};
pub use event::{FieldProps, FieldState, InputEvent, InputHandler, InputType, SubmitEvent};
pub use field_array::{FieldArray, MAX_PADDED_LEN};
pub use hearth_forms_derive::FormModel;
pub use model::{FormModel, decode_field, encode_field};
pub use submit::{BoxedSubmitFuture, SubmitHandler, SubmitResult};
pub use validation::{
    AsyncFieldValidator, BoxedValidationFuture, FieldCheck, FieldRule, FormCheck, Rule,
    ValidationSchema,
};

/// Rule constructors for [`ValidationSchema`].
pub mod rules {
    pub use super::validation::{
        custom, email, max, max_length, min, min_length, pattern, required,
    };
}
