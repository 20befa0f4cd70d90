use crow_iml::{Capability, TypeDescriptor, Value, ValueKind};

pub(crate) fn descriptors() -> Vec<TypeDescriptor> {
    vec![
        TypeDescriptor::new("Label", Capability::Leaf)
            .base("Widget")
            .doc("A run of text.")
            .content("Text")
            .property("Text", ValueKind::Str, "Displayed text.")
            .property_default("FontSize", ValueKind::Float, Value::Float(14.0), "Size in points.")
            .property("Wrap", ValueKind::Bool, "Break lines at the available width."),
    ]
}
