//! What the server knows about elements and members: the standard widget
//! catalog, plus the markup's own structural elements and attributes.

use std::sync::Arc;

use crow_iml::{MemberDescriptor, MemberKind, TypeCatalog, TypeDescriptor, TypeRef};
use once_cell::sync::Lazy;

static CATALOG: Lazy<Arc<TypeCatalog>> = Lazy::new(|| Arc::new(crow_ui::widgets::standard_catalog()));

pub fn catalog() -> Arc<TypeCatalog> {
    Arc::clone(&CATALOG)
}

// ── Structural elements ───────────────────────────────────────────────────

pub struct Structural {
    pub name: &'static str,
    pub doc: &'static str,
}

pub static STRUCTURAL: &[Structural] = &[
    Structural {
        name: "Template",
        doc: "Inline template of a templated control. Holds exactly one element, which becomes the control's template root.",
    },
    Structural {
        name: "ItemTemplate",
        doc: "Row template of a templated list, compiled as its own document. `DataType` selects the data items it applies to; `Path` loads the row from another file instead.",
    },
];

pub fn structural(name: &str) -> Option<&'static Structural> {
    STRUCTURAL.iter().find(|s| s.name == name)
}

/// Attributes handled by the compiler rather than by a member.
pub fn pseudo_attributes(element: &str) -> Vec<(&'static str, &'static str)> {
    if element == "ItemTemplate" {
        return vec![
            ("DataType", "Data item type this template renders; `default` matches any."),
            ("Path", "External `.iml` document holding the row. The element must then be empty."),
        ];
    }
    let Some(ty) = type_by_name(element) else { return Vec::new() };
    let mut attributes = Vec::new();
    if ty.capability.is_templated() {
        attributes.push(("Template", "Path of an external `.iml` document used as this control's template."));
    }
    if ty.capability.accepts_item_templates() {
        attributes.push(("ItemTemplate", "Path of an external `.iml` row used for every item, unless <ItemTemplate> elements are declared."));
    }
    attributes
}

// ── Catalog queries ───────────────────────────────────────────────────────

pub fn type_by_name(name: &str) -> Option<TypeRef> {
    CATALOG.resolve(name)
}

pub fn member_in_type(ty: &str, member: &str) -> Option<Arc<MemberDescriptor>> {
    CATALOG.member(ty, member)
}

/// Members settable from markup: properties and events, own and extension.
pub fn attributes_of(ty: &TypeDescriptor) -> Vec<Arc<MemberDescriptor>> {
    CATALOG
        .members_of(ty)
        .into_iter()
        .chain(CATALOG.extensions_of(ty))
        .filter(|m| !m.is_method())
        .collect()
}

pub fn type_doc(ty: &TypeDescriptor) -> String {
    let mut md = format!("**{}**", ty.name);
    if let Some(base) = &ty.base {
        md.push_str(&format!(" : {base}"));
    }
    md.push_str(&format!(" · {:?}", ty.capability));
    if !ty.doc.is_empty() {
        md.push_str("\n\n");
        md.push_str(&ty.doc);
    }
    if let Some(content) = &ty.content_property {
        md.push_str(&format!("\n\nText content sets `{content}`."));
    }
    md
}

pub fn member_doc(m: &MemberDescriptor) -> String {
    let kind = match &m.kind {
        MemberKind::Property { kind, .. } => kind.label(),
        MemberKind::Event { handler_type } => format!("event ({handler_type})"),
        MemberKind::Method => "method".to_string(),
    };
    format!("**{}** · {kind}\n\n{}", m.name, m.doc)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn templated_controls_offer_template() {
        assert_eq!(pseudo_attributes("Expander")[0].0, "Template");
        assert!(pseudo_attributes("Label").is_empty());
        assert_eq!(pseudo_attributes("ItemTemplate")[0].0, "DataType");
        let list: Vec<&str> = pseudo_attributes("ListBox").into_iter().map(|(n, _)| n).collect();
        assert_eq!(list, ["Template", "ItemTemplate"]);
    }

    #[test]
    fn methods_are_not_attributes() {
        let button = type_by_name("Button").unwrap();
        let names: Vec<String> = attributes_of(&button).iter().map(|m| m.name.clone()).collect();
        assert!(names.contains(&"Clicked".to_string()));
        assert!(names.contains(&"IsVisible".to_string()));
        assert!(!names.contains(&"ToggleVisibility".to_string()));
    }
}
