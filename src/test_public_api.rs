use crate::form::FormModel as _;
use futures::executor::block_on;
use serde_json::json;

#[derive(Clone, serde::Serialize, serde::Deserialize, crate::form::FormModel)]
struct ApiSmokeForm {
    title: String,
    enabled: bool,
    tags: Vec<String>,
}

#[test]
fn prelude_exports_core_types() {
    use crate::prelude::*;

    let _ = FormOptions::default();
    let _ = ValidationMode::OnSubmit;
    let _ = InputType::from_dom("checkbox");
    let _ = SubmitEvent::new();
    let _ = ValidationSchema::new().field("title", [required(), max_length(80)]);
}

#[test]
fn form_public_api_smoke_compiles() {
    let controller = crate::form::FormController::from_model(
        &ApiSmokeForm {
            title: "draft".into(),
            enabled: false,
            tags: Vec::new(),
        },
        crate::form::FormOptions::default(),
    )
    .expect("from model");
    let fields = ApiSmokeForm::fields();

    controller
        .register_field_rule(fields.title(), crate::form::rules::required())
        .expect("register rule");
    controller
        .register_form_rule(|_values| Vec::new())
        .expect("register form rule");
    controller.set_value(fields.title(), "").expect("set value");
    controller.touch(fields.title()).expect("touch field");
    controller.validate_form().expect("validate form");
    let _ = controller
        .field_error_for_display(fields.title())
        .expect("display error");
    let _ = controller.field_props(fields.enabled()).expect("props");
    let _ = controller.field_state(fields.enabled()).expect("state");
    controller
        .field_array(fields.tags())
        .append(json!("chores"))
        .expect("append tag");
    let _ = block_on(controller.handle_submit(None));

    let store = crate::form::InMemoryDraftStore::new();
    controller.save_draft(&store, "smoke").expect("save draft");
    controller.reset(None).expect("reset");
    let _ = controller.load_draft(&store, "smoke").expect("load draft");
    controller.clear_draft(&store, "smoke").expect("clear draft");
}
