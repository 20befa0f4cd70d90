use crow_iml::{Capability, MemberDescriptor, TypeCatalog, TypeDescriptor, Value, ValueKind};

use crate::runtime::UiRuntime;
use crate::widgets::flip;

pub(crate) fn descriptors() -> Vec<TypeDescriptor> {
    let alignment = ValueKind::enumeration(["Stretch", "Start", "Center", "End"]);
    vec![
        TypeDescriptor::new("Widget", Capability::Leaf)
            .doc("Base of every widget.")
            .property("Name", ValueKind::Str, "Identifier used by `/Name.Member` bindings.")
            .property_default("IsVisible", ValueKind::Bool, Value::Bool(true), "Whether the widget is shown.")
            .property_default("IsEnabled", ValueKind::Bool, Value::Bool(true), "Whether the widget reacts to input.")
            .property("Width", ValueKind::Float, "Requested width in logical pixels; 0 means auto.")
            .property("Height", ValueKind::Float, "Requested height in logical pixels; 0 means auto.")
            .property("Margin", ValueKind::Float, "Uniform outer spacing.")
            .property("Background", ValueKind::Color, "Fill color.")
            .property("Foreground", ValueKind::Color, "Text and glyph color.")
            .property("HorizontalAlignment", alignment.clone(), "Placement inside the parent's slot.")
            .property("VerticalAlignment", alignment, "Placement inside the parent's slot.")
            .property("Tooltip", ValueKind::Str, "Hover text.")
            .property("Tag", ValueKind::Any, "Free-form value for application use.")
            .property("DataSource", ValueKind::Object, "Object bound to the widget by the application."),
    ]
}

pub(crate) fn extensions(catalog: &mut TypeCatalog) {
    catalog.register_extension(
        "Widget",
        MemberDescriptor::method("ToggleVisibility", "Flips `IsVisible`."),
    );
}

pub(crate) fn install(rt: &UiRuntime) {
    rt.register_method("Widget", "ToggleVisibility", |rt, target, _| flip(rt, target, "IsVisible"));
}
