use crow_iml::{Capability, TypeDescriptor, ValueKind};

use crate::runtime::UiRuntime;
use crate::widgets::flip;

pub(crate) fn descriptors() -> Vec<TypeDescriptor> {
    vec![
        TypeDescriptor::new("Checkbox", Capability::Leaf)
            .base("Widget")
            .doc("A box with an optional label, checked or not.")
            .content("Text")
            .property("Text", ValueKind::Str, "Label next to the box.")
            .property("IsChecked", ValueKind::Bool, "Current state.")
            .event("Toggled", "EventHandler", "Raised after `IsChecked` changes through `Toggle()`.")
            .method("Toggle", "Flips `IsChecked` and raises `Toggled`."),
        TypeDescriptor::new("Toggle", Capability::Leaf)
            .base("Checkbox")
            .doc("A switch; same state model as `Checkbox`."),
    ]
}

pub(crate) fn install(rt: &UiRuntime) {
    rt.register_method("Checkbox", "Toggle", |rt, target, _| {
        flip(rt, target, "IsChecked");
        rt.raise(target, "Toggled");
    });
}
