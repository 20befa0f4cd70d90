use crow_iml::{Capability, TypeDescriptor, ValueKind};

pub(crate) fn descriptors() -> Vec<TypeDescriptor> {
    vec![
        TypeDescriptor::new("Button", Capability::Leaf)
            .base("Widget")
            .doc("A clickable widget.")
            .content("Text")
            .property("Text", ValueKind::Str, "Caption.")
            .property("CornerRadius", ValueKind::Float, "Rounding of the background.")
            .property("HoverBackground", ValueKind::Color, "Background while hovered.")
            .property("PressBackground", ValueKind::Color, "Background while pressed.")
            .event("Clicked", "EventHandler", "Raised when the button is pressed and released."),
    ]
}
