use crow_iml::{Capability, TypeDescriptor, ValueKind};

pub(crate) fn descriptors() -> Vec<TypeDescriptor> {
    let group = |name: &str, doc: &str| {
        TypeDescriptor::new(name, Capability::Group)
            .base("Widget")
            .doc(doc)
            .property("Spacing", ValueKind::Float, "Gap between children.")
            .property("Padding", ValueKind::Float, "Uniform inner spacing.")
    };
    vec![
        group("Container", "Children in declaration order."),
        group("Column", "Children stacked vertically."),
        group("Row", "Children laid out horizontally."),
        group("Stack", "Children layered on top of each other."),
        TypeDescriptor::new("Border", Capability::Container)
            .base("Widget")
            .doc("A single child with a frame around it.")
            .property("BorderWidth", ValueKind::Float, "Stroke width.")
            .property("BorderColor", ValueKind::Color, "Stroke color.")
            .property("CornerRadius", ValueKind::Float, "Rounding of the frame.")
            .property("Padding", ValueKind::Float, "Uniform inner spacing."),
        TypeDescriptor::new("ScrollView", Capability::Container)
            .base("Widget")
            .doc("A single child clipped to a vertically scrollable viewport.")
            .property("ScrollY", ValueKind::Float, "Vertical offset of the content."),
    ]
}
