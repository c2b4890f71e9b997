//! Forms behind the "create household" and "join household" dialogs.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::form::rules::{max, max_length, min, min_length, pattern, required};
use crate::form::{FormController, FormModel, FormOptions, FormResult, ValidationSchema};

pub const MAX_MEMBERS_LIMIT: u32 = 20;
pub const INVITE_CODE_LEN: usize = 8;

static INVITE_CODE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!("^[A-Za-z0-9]{{{INVITE_CODE_LEN}}}$"))
        .expect("invite code pattern is a valid regex")
});

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, FormModel)]
pub struct CreateHouseholdForm {
    pub name: String,
    pub max_members: u32,
}

impl Default for CreateHouseholdForm {
    fn default() -> Self {
        Self {
            name: String::new(),
            max_members: 5,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FormModel)]
pub struct JoinHouseholdForm {
    pub invite_code: String,
}

pub fn create_household_schema() -> ValidationSchema {
    let fields = CreateHouseholdForm::fields();
    ValidationSchema::new()
        .field(
            fields.name(),
            [
                required().message("Household name is required"),
                min_length(2),
                max_length(50),
            ],
        )
        .field(
            fields.max_members(),
            [
                required(),
                min(1),
                max(MAX_MEMBERS_LIMIT).message(format!(
                    "A household can have at most {MAX_MEMBERS_LIMIT} members"
                )),
            ],
        )
}

pub fn join_household_schema() -> ValidationSchema {
    ValidationSchema::new().field(
        JoinHouseholdForm::fields().invite_code(),
        [
            required().message("Enter the invite code you received"),
            pattern(INVITE_CODE_PATTERN.clone())
                .message(format!("Invite codes are {INVITE_CODE_LEN} letters or digits")),
        ],
    )
}

/// A create-household form with its rules registered. Number inputs are
/// stored as numbers so `max_members` decodes straight into the model.
pub fn create_household_form(options: FormOptions) -> FormResult<FormController> {
    let controller = FormController::from_model(
        &CreateHouseholdForm::default(),
        FormOptions {
            coerce_numeric_inputs: true,
            ..options
        },
    )?;
    controller.register_schema(create_household_schema())?;
    Ok(controller)
}

pub fn join_household_form(options: FormOptions) -> FormResult<FormController> {
    let controller = FormController::from_model(&JoinHouseholdForm::default(), options)?;
    controller.register_schema(join_household_schema())?;
    Ok(controller)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::{InputEvent, InputType};
    use serde_json::json;

    #[test]
    fn create_form_starts_from_defaults() {
        let form = create_household_form(FormOptions::default()).expect("create form");
        let values = form.values().expect("values");
        assert_eq!(values["name"], json!(""));
        assert_eq!(values["max_members"], json!(5));
        assert!(!form.is_dirty().expect("dirty flag"));
    }

    #[test]
    fn create_form_rejects_empty_name_and_too_many_members() {
        let form = create_household_form(FormOptions::default()).expect("create form");
        form.handle_change(&InputEvent::new("max_members", "25").input_type(InputType::Number))
            .expect("change members");

        assert!(!form.validate_form().expect("validate"));
        let snapshot = form.snapshot().expect("snapshot");
        assert_eq!(snapshot.errors["name"], "Household name is required");
        assert_eq!(
            snapshot.errors["max_members"],
            "A household can have at most 20 members"
        );
    }

    #[test]
    fn valid_create_form_decodes_into_model() {
        let form = create_household_form(FormOptions::default()).expect("create form");
        form.handle_change(&InputEvent::new("name", "Maple Street"))
            .expect("change name");
        form.handle_change(&InputEvent::new("max_members", "4").input_type(InputType::Number))
            .expect("change members");

        assert!(form.validate_form().expect("validate"));
        let model = form.model::<CreateHouseholdForm>().expect("decode model");
        assert_eq!(
            model,
            CreateHouseholdForm {
                name: "Maple Street".into(),
                max_members: 4,
            }
        );
    }

    #[test]
    fn join_form_checks_invite_code_shape() {
        let form = join_household_form(FormOptions::default()).expect("join form");
        form.set_value("invite_code", "abc").expect("set code");
        assert!(!form.validate_form().expect("validate"));
        assert_eq!(
            form.field_state("invite_code").expect("state").error.as_deref(),
            Some("Invite codes are 8 letters or digits")
        );

        form.set_value("invite_code", "AB12CD34").expect("set code");
        assert!(form.validate_form().expect("validate"));
    }

    #[test]
    fn join_schema_always_carries_the_code_shape_rule() {
        let values = JoinHouseholdForm {
            invite_code: "AB12CD3!".into(),
        }
        .to_values()
        .expect("encode");
        assert_eq!(
            join_household_schema().validate_field("invite_code", &values),
            vec!["Invite codes are 8 letters or digits".to_owned()]
        );
    }
}
