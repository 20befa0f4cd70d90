use crow_iml::{Capability, Runtime, TypeDescriptor, Value, ValueKind};

use crate::runtime::UiRuntime;

pub(crate) fn descriptors() -> Vec<TypeDescriptor> {
    vec![
        TypeDescriptor::new("TextBox", Capability::Leaf)
            .base("Widget")
            .doc("Single-line editable text.")
            .property("Text", ValueKind::Str, "Current contents.")
            .property("Placeholder", ValueKind::Str, "Shown while `Text` is empty.")
            .property("IsReadOnly", ValueKind::Bool, "Rejects edits.")
            .event("TextChanged", "EventHandler", "Raised after an edit.")
            .method("Clear", "Empties `Text`."),
    ]
}

pub(crate) fn install(rt: &UiRuntime) {
    rt.register_method("TextBox", "Clear", |rt, target, _| {
        if rt.value(target, "IsReadOnly") == Value::Bool(true) {
            return;
        }
        rt.set_member_value(&target, "Text", Value::Str(String::new()));
        rt.raise(target, "TextChanged");
    });
}
