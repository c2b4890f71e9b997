use hearth_forms::form::FormModel;

#[derive(FormModel)]
enum MemberRole {
    Owner,
    Member,
}

fn main() {}
