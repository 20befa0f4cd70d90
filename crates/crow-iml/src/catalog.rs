//! Type metadata consumed by the compiler.
//!
//! A [`TypeCatalog`] maps element names to [`TypeDescriptor`]s, walks base
//! types for member lookup, and holds extension members that attach behavior
//! to a type from outside. It is passed explicitly to every compilation, so
//! two compilations can use different catalogs side by side.
//!
//! | Capability | ordinary child | `<Template>` child |
//! |------------|----------------|--------------------|
//! | `Leaf` | rejected | rejected |
//! | `Group` | `AppendChild` | rejected |
//! | `Container` | `SetSingleChild` | rejected |
//! | `TemplatedContainer` | `SetSingleChild` | `SetTemplateRoot` |
//! | `TemplatedGroup` | `AppendTemplatedItem` | `SetTemplateRoot` |

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;

use crate::value::{Value, ValueKind};

// ── Capabilities ──────────────────────────────────────────────────────────

/// How a type accepts children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Leaf,
    Group,
    Container,
    TemplatedContainer,
    TemplatedGroup,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttachKind {
    AppendChild,
    SetSingleChild,
    SetTemplateRoot,
    AppendTemplatedItem,
}

impl Capability {
    /// Templated controls are the boundary a template-root hop ascends to.
    pub fn is_templated(self) -> bool {
        matches!(self, Capability::TemplatedContainer | Capability::TemplatedGroup)
    }

    pub fn child_attachment(self) -> Option<AttachKind> {
        match self {
            Capability::Leaf => None,
            Capability::Group => Some(AttachKind::AppendChild),
            Capability::Container | Capability::TemplatedContainer => Some(AttachKind::SetSingleChild),
            Capability::TemplatedGroup => Some(AttachKind::AppendTemplatedItem),
        }
    }

    pub fn template_attachment(self) -> Option<AttachKind> {
        self.is_templated().then_some(AttachKind::SetTemplateRoot)
    }

    pub fn accepts_item_templates(self) -> bool {
        self == Capability::TemplatedGroup
    }
}

impl AttachKind {
    /// Whether a child attached this way takes up a sibling index.
    pub fn is_list(self) -> bool {
        matches!(self, AttachKind::AppendChild | AttachKind::AppendTemplatedItem)
    }
}

// ── Members ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Public,
    NonPublic,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberOrigin {
    /// Declared by the named type.
    Declared(String),
    /// Registered from outside the type's declaration.
    Extension,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MemberKind {
    Property { kind: ValueKind, default: Option<Value> },
    Event { handler_type: String },
    Method,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MemberDescriptor {
    pub name: String,
    pub kind: MemberKind,
    pub visibility: Visibility,
    pub origin: MemberOrigin,
    pub doc: String,
}

impl MemberDescriptor {
    fn new(name: impl Into<String>, kind: MemberKind, doc: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            visibility: Visibility::Public,
            origin: MemberOrigin::Extension,
            doc: doc.into(),
        }
    }

    pub fn property(name: impl Into<String>, kind: ValueKind, doc: impl Into<String>) -> Self {
        Self::new(name, MemberKind::Property { kind, default: None }, doc)
    }

    pub fn event(name: impl Into<String>, handler_type: impl Into<String>, doc: impl Into<String>) -> Self {
        Self::new(name, MemberKind::Event { handler_type: handler_type.into() }, doc)
    }

    pub fn method(name: impl Into<String>, doc: impl Into<String>) -> Self {
        Self::new(name, MemberKind::Method, doc)
    }

    pub fn with_default(mut self, value: Value) -> Self {
        if let MemberKind::Property { default, .. } = &mut self.kind {
            *default = Some(value);
        }
        self
    }

    pub fn non_public(mut self) -> Self {
        self.visibility = Visibility::NonPublic;
        self
    }

    pub fn value_kind(&self) -> Option<&ValueKind> {
        match &self.kind {
            MemberKind::Property { kind, .. } => Some(kind),
            _ => None,
        }
    }

    /// The value a fresh instance starts with, for properties.
    pub fn initial_value(&self) -> Option<Value> {
        match &self.kind {
            MemberKind::Property { default: Some(v), .. } => Some(v.clone()),
            MemberKind::Property { kind, .. } => Some(kind.default_value()),
            _ => None,
        }
    }

    pub fn handler_type(&self) -> Option<&str> {
        match &self.kind {
            MemberKind::Event { handler_type } => Some(handler_type),
            _ => None,
        }
    }

    pub fn is_method(&self) -> bool {
        self.kind == MemberKind::Method
    }

    pub fn kind_label(&self) -> &'static str {
        match self.kind {
            MemberKind::Property { .. } => "property",
            MemberKind::Event { .. } => "event",
            MemberKind::Method => "method",
        }
    }
}

// ── Types ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct TypeDescriptor {
    pub name: String,
    pub base: Option<String>,
    pub capability: Capability,
    /// Property that receives an element's text content: `<Label>hi</Label>`.
    pub content_property: Option<String>,
    pub doc: String,
    members: Vec<Arc<MemberDescriptor>>,
}

pub type TypeRef = Arc<TypeDescriptor>;

impl TypeDescriptor {
    pub fn new(name: impl Into<String>, capability: Capability) -> Self {
        Self {
            name: name.into(),
            base: None,
            capability,
            content_property: None,
            doc: String::new(),
            members: Vec::new(),
        }
    }

    pub fn base(mut self, base: impl Into<String>) -> Self {
        self.base = Some(base.into());
        self
    }

    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = doc.into();
        self
    }

    pub fn content(mut self, property: impl Into<String>) -> Self {
        self.content_property = Some(property.into());
        self
    }

    pub fn member(mut self, mut member: MemberDescriptor) -> Self {
        member.origin = MemberOrigin::Declared(self.name.clone());
        self.members.retain(|m| m.name != member.name);
        self.members.push(Arc::new(member));
        self
    }

    pub fn property(self, name: &str, kind: ValueKind, doc: &str) -> Self {
        self.member(MemberDescriptor::property(name, kind, doc))
    }

    pub fn property_default(self, name: &str, kind: ValueKind, default: Value, doc: &str) -> Self {
        self.member(MemberDescriptor::property(name, kind, doc).with_default(default))
    }

    pub fn event(self, name: &str, handler_type: &str, doc: &str) -> Self {
        self.member(MemberDescriptor::event(name, handler_type, doc))
    }

    pub fn method(self, name: &str, doc: &str) -> Self {
        self.member(MemberDescriptor::method(name, doc))
    }

    /// Members declared directly on this type, in declaration order.
    pub fn declared_members(&self) -> &[Arc<MemberDescriptor>] {
        &self.members
    }
}

// ── Catalog ───────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct TypeCatalog {
    types: IndexMap<String, TypeRef>,
    /// (extended type name, member)
    extensions: Vec<(String, Arc<MemberDescriptor>)>,
    memo: RwLock<HashMap<(String, String), Option<Arc<MemberDescriptor>>>>,
}

impl TypeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_type(mut self, ty: TypeDescriptor) -> Self {
        self.register(ty);
        self
    }

    pub fn with_extension(mut self, target: &str, member: MemberDescriptor) -> Self {
        self.register_extension(target, member);
        self
    }

    /// Adds or replaces a type.
    pub fn register(&mut self, ty: TypeDescriptor) {
        self.types.insert(ty.name.clone(), Arc::new(ty));
        self.memo.get_mut().clear();
    }

    /// Attaches `member` to `target` and every type derived from it.
    pub fn register_extension(&mut self, target: &str, mut member: MemberDescriptor) {
        member.origin = MemberOrigin::Extension;
        self.extensions.push((target.to_string(), Arc::new(member)));
        self.memo.get_mut().clear();
    }

    pub fn resolve(&self, name: &str) -> Option<TypeRef> {
        self.types.get(name).cloned()
    }

    pub fn types(&self) -> impl Iterator<Item = &TypeRef> {
        self.types.values()
    }

    pub fn capability_of(&self, name: &str) -> Option<Capability> {
        self.types.get(name).map(|t| t.capability)
    }

    pub fn is_templated(&self, name: &str) -> bool {
        self.capability_of(name).is_some_and(Capability::is_templated)
    }

    /// `ty` followed by its base types, most derived first.
    pub fn lineage<'a>(&'a self, ty: &'a TypeDescriptor) -> Vec<&'a TypeDescriptor> {
        let mut chain = vec![ty];
        let mut next = ty.base.as_deref();
        while let Some(name) = next {
            // a malformed catalog can declare a cycle; stop at the first repeat
            let Some(base) = self.types.get(name) else { break };
            if chain.iter().any(|t| t.name == base.name) {
                break;
            }
            chain.push(base);
            next = base.base.as_deref();
        }
        chain
    }

    pub fn is_subtype(&self, ty: &TypeDescriptor, base: &str) -> bool {
        self.lineage(ty).iter().any(|t| t.name == base)
    }

    /// Instance members of `ty` including inherited ones; a derived
    /// declaration hides a base member of the same name.
    pub fn members_of(&self, ty: &TypeDescriptor) -> Vec<Arc<MemberDescriptor>> {
        let mut out: Vec<Arc<MemberDescriptor>> = Vec::new();
        for t in self.lineage(ty) {
            for m in &t.members {
                if !out.iter().any(|o| o.name == m.name) {
                    out.push(Arc::clone(m));
                }
            }
        }
        out
    }

    /// Extension members applicable to `ty`.
    pub fn extensions_of(&self, ty: &TypeDescriptor) -> Vec<Arc<MemberDescriptor>> {
        let lineage = self.lineage(ty);
        self.extensions
            .iter()
            .filter(|(target, _)| lineage.iter().any(|t| t.name == *target))
            .map(|(_, m)| Arc::clone(m))
            .collect()
    }

    /// Looks `name` up on `ty` and its bases (public and non-public), then
    /// among extensions. Results are memoized per (type, member).
    pub fn find_member(&self, ty: &TypeDescriptor, name: &str) -> Option<Arc<MemberDescriptor>> {
        let key = (ty.name.clone(), name.to_string());
        if let Some(hit) = self.memo.read().get(&key) {
            return hit.clone();
        }
        let found = self
            .lineage(ty)
            .into_iter()
            .find_map(|t| t.members.iter().find(|m| m.name == name).cloned())
            .or_else(|| self.extensions_of(ty).into_iter().find(|m| m.name == name));
        // insert-if-absent: a racing lookup computed the same answer
        self.memo.write().entry(key).or_insert(found).clone()
    }

    /// [`find_member`](Self::find_member) by type name.
    pub fn member(&self, type_name: &str, name: &str) -> Option<Arc<MemberDescriptor>> {
        let ty = self.types.get(type_name)?;
        self.find_member(ty, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> TypeCatalog {
        TypeCatalog::new()
            .with_type(
                TypeDescriptor::new("Widget", Capability::Leaf)
                    .property("Name", ValueKind::Str, "")
                    .property("Width", ValueKind::Float, "")
                    .member(MemberDescriptor::property("Secret", ValueKind::Int, "").non_public()),
            )
            .with_type(
                TypeDescriptor::new("Label", Capability::Leaf)
                    .base("Widget")
                    .property("Text", ValueKind::Str, "")
                    .property("Width", ValueKind::Int, "narrower"),
            )
            .with_type(TypeDescriptor::new("Column", Capability::Group).base("Widget"))
            .with_extension("Widget", MemberDescriptor::method("Flash", ""))
    }

    #[test]
    fn inherited_members_resolve() {
        let c = catalog();
        let label = c.resolve("Label").unwrap();
        assert!(c.find_member(&label, "Name").is_some());
        assert_eq!(c.find_member(&label, "Secret").unwrap().visibility, Visibility::NonPublic);
    }

    #[test]
    fn derived_member_hides_base() {
        let c = catalog();
        let label = c.resolve("Label").unwrap();
        let width = c.find_member(&label, "Width").unwrap();
        assert_eq!(width.value_kind(), Some(&ValueKind::Int));
        assert_eq!(width.origin, MemberOrigin::Declared("Label".into()));
        assert_eq!(c.members_of(&label).iter().filter(|m| m.name == "Width").count(), 1);
    }

    #[test]
    fn extension_fallback() {
        let c = catalog();
        let m = c.member("Column", "Flash").unwrap();
        assert_eq!(m.origin, MemberOrigin::Extension);
        assert!(c.member("Column", "Nope").is_none());
    }

    #[test]
    fn base_cycle_terminates() {
        let c = TypeCatalog::new()
            .with_type(TypeDescriptor::new("A", Capability::Leaf).base("B"))
            .with_type(TypeDescriptor::new("B", Capability::Leaf).base("A"));
        let a = c.resolve("A").unwrap();
        assert_eq!(c.lineage(&a).len(), 2);
        assert!(c.find_member(&a, "x").is_none());
    }

    #[test]
    fn concurrent_lookups_agree() {
        let c = Arc::new(catalog());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let c = Arc::clone(&c);
                std::thread::spawn(move || c.member("Label", "Text").map(|m| m.name.clone()))
            })
            .collect();
        for h in handles {
            assert_eq!(h.join().unwrap().as_deref(), Some("Text"));
        }
    }

    #[test]
    fn attachment_table() {
        assert_eq!(Capability::Leaf.child_attachment(), None);
        assert_eq!(Capability::Group.child_attachment(), Some(AttachKind::AppendChild));
        assert_eq!(Capability::Container.template_attachment(), None);
        assert_eq!(Capability::TemplatedGroup.child_attachment(), Some(AttachKind::AppendTemplatedItem));
        assert_eq!(Capability::TemplatedContainer.template_attachment(), Some(AttachKind::SetTemplateRoot));
    }
}
