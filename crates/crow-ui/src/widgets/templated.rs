use crow_iml::{Capability, TypeDescriptor, Value, ValueKind};

use crate::runtime::UiRuntime;
use crate::widgets::flip;

pub(crate) fn descriptors() -> Vec<TypeDescriptor> {
    vec![
        TypeDescriptor::new("Expander", Capability::TemplatedContainer)
            .base("Widget")
            .doc("A captioned section whose content can be collapsed. The template draws the header.")
            .property("Caption", ValueKind::Str, "Header text.")
            .property_default("IsExpanded", ValueKind::Bool, Value::Bool(true), "Whether the content is shown.")
            .event("Expanded", "EventHandler", "Raised after `Toggle()`.")
            .method("Toggle", "Flips `IsExpanded` and raises `Expanded`."),
        TypeDescriptor::new("ListBox", Capability::TemplatedGroup)
            .base("Widget")
            .doc("A list of rows built from item templates, one per data item.")
            .property_default("SelectedIndex", ValueKind::Int, Value::Int(-1), "Selected row; -1 for none.")
            .event("SelectionChanged", "EventHandler", "Raised when `SelectedIndex` changes."),
    ]
}

pub(crate) fn install(rt: &UiRuntime) {
    rt.register_method("Expander", "Toggle", |rt, target, _| {
        flip(rt, target, "IsExpanded");
        rt.raise(target, "Expanded");
    });
}
