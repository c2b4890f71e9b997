use hearth_forms::form::FormModel;

#[derive(FormModel)]
struct InviteCode(String);

fn main() {}
