//! Headless form state for the household client: field values, errors,
//! touched flags, submission and array-valued fields.

pub mod form;
pub mod household;
pub mod prelude;

#[cfg(test)]
mod test_public_api;
