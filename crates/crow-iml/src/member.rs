use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::address::NodeAddress;
use crate::catalog::{MemberDescriptor, TypeCatalog};
use crate::error::{ImlError, Position, Result};

/// A member of the node at `address`, resolved against the catalog on first
/// use. Identity is (address, name).
#[derive(Debug, Clone)]
pub struct MemberAddress {
    address: NodeAddress,
    name: String,
    member: OnceCell<Option<Arc<MemberDescriptor>>>,
}

impl MemberAddress {
    pub fn new(address: NodeAddress, name: impl Into<String>) -> Self {
        Self { address, name: name.into(), member: OnceCell::new() }
    }

    pub fn address(&self) -> &NodeAddress {
        &self.address
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The member lives on the enclosing template root, found at runtime.
    pub fn is_template_binding(&self) -> bool {
        self.address.is_empty()
    }

    /// Member descriptor with extension fallback. Always `None` for a template
    /// binding, whose type is unknown until runtime.
    pub fn resolve(&self, catalog: &TypeCatalog) -> Option<&Arc<MemberDescriptor>> {
        self.member
            .get_or_init(|| {
                let ty = self.address.node_type()?;
                catalog.find_member(ty, &self.name)
            })
            .as_ref()
    }

    /// Like [`resolve`](Self::resolve) but fails with `MemberNotFound` for a
    /// static address whose type lacks the member.
    pub fn require(&self, catalog: &TypeCatalog, at: Position) -> Result<Option<&Arc<MemberDescriptor>>> {
        if self.is_template_binding() {
            return Ok(None);
        }
        match self.resolve(catalog) {
            Some(m) => Ok(Some(m)),
            None => Err(ImlError::MemberNotFound {
                ty: self.address.node_type().map(|t| t.name.clone()).unwrap_or_default(),
                member: self.name.clone(),
                expected: "member",
                at,
            }),
        }
    }
}

impl PartialEq for MemberAddress {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address && self.name == other.name
    }
}

impl Eq for MemberAddress {}

impl Hash for MemberAddress {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.address.hash(state);
        self.name.hash(state);
    }
}

impl fmt::Display for MemberAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.address, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::Node;
    use crate::catalog::{Capability, TypeDescriptor};
    use crate::value::ValueKind;

    fn catalog() -> TypeCatalog {
        TypeCatalog::new()
            .with_type(TypeDescriptor::new("Label", Capability::Leaf).property("Text", ValueKind::Str, ""))
            .with_extension("Label", MemberDescriptor::method("Blink", ""))
    }

    fn label_address(c: &TypeCatalog) -> NodeAddress {
        NodeAddress::new(vec![Node::new(c.resolve("Label").unwrap(), 0)])
    }

    #[test]
    fn resolves_declared_and_extension_members() {
        let c = catalog();
        assert!(MemberAddress::new(label_address(&c), "Text").resolve(&c).is_some());
        assert!(MemberAddress::new(label_address(&c), "Blink").resolve(&c).unwrap().is_method());
    }

    #[test]
    fn missing_member_is_an_error() {
        let c = catalog();
        let e = MemberAddress::new(label_address(&c), "Nope")
            .require(&c, Position::default())
            .unwrap_err();
        assert!(matches!(e, ImlError::MemberNotFound { ref member, .. } if member == "Nope"));
    }

    #[test]
    fn template_binding_skips_static_check() {
        let c = catalog();
        let m = MemberAddress::new(NodeAddress::empty(), "Anything");
        assert!(m.is_template_binding());
        assert!(m.require(&c, Position::default()).unwrap().is_none());
    }

    #[test]
    fn identity_ignores_resolution_state() {
        let c = catalog();
        let a = MemberAddress::new(label_address(&c), "Text");
        let b = MemberAddress::new(label_address(&c), "Text");
        a.resolve(&c);
        assert_eq!(a, b);
    }
}
