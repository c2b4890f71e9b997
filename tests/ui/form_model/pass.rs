use hearth_forms::form::{FieldValues, FormModel};

#[derive(Clone, serde::Serialize, serde::Deserialize, hearth_forms::form::FormModel)]
struct InviteForm {
    email: String,
    note: Option<String>,
}

fn main() {
    let fields = InviteForm::fields();
    let model = InviteForm {
        email: "a@hearth.app".to_string(),
        note: None,
    };
    let values: FieldValues = model.to_values().unwrap();
    assert_eq!(fields.email(), "email");
    assert_eq!(InviteForm::field_names(), &["email", "note"]);
    let decoded = InviteForm::from_values(&values).unwrap();
    assert_eq!(decoded.email, "a@hearth.app");
    assert!(decoded.note.is_none());
}
