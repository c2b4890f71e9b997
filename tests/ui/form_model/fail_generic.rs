use hearth_forms::form::FormModel;

#[derive(FormModel)]
struct ChoreDraft<T> {
    assignee: T,
}

fn main() {}
