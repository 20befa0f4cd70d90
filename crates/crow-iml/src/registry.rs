//! Compile-time symbol table.
//!
//! Names and binding definitions are collected while the document is read;
//! definitions that refer to a name are queued and resolved once the whole
//! document is known, so a binding may refer to an element declared after it.

use indexmap::IndexMap;
use log::{debug, warn};

use crate::address::{NamedNodeAddress, NodeAddress};
use crate::catalog::TypeCatalog;
use crate::error::{ImlError, Position, Result};
use crate::member::MemberAddress;

/// What to do with a binding whose target name cannot be resolved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NameResolution {
    /// Abort the compilation with `UnresolvedName`.
    #[default]
    Strict,
    /// Log a warning and drop the binding.
    Lenient,
}

// ── Definitions ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingDefinition {
    pub source: NodeAddress,
    pub source_member: String,
    /// `None` binds to the data source. The empty address binds to the
    /// enclosing template root. While `target_name` is pending this holds the
    /// scope the name is searched in.
    pub target: Option<NodeAddress>,
    /// Interior segments followed by the terminal member.
    pub target_members: Vec<String>,
    pub target_name: Option<String>,
    pub two_way: bool,
    pub at: Position,
}

impl BindingDefinition {
    pub fn is_data_source_binding(&self) -> bool {
        self.target.is_none()
    }

    pub fn is_template_binding(&self) -> bool {
        self.target.as_ref().is_some_and(NodeAddress::is_empty)
    }

    pub fn has_unresolved_target_name(&self) -> bool {
        self.target_name.is_some()
    }

    pub fn target_member(&self) -> &str {
        self.target_members.last().map(String::as_str).unwrap_or_default()
    }
}

/// An event handler whose method is reached through a definition's target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventBinding {
    /// `source_member` is the event, `target_members` ends with the method.
    pub definition: BindingDefinition,
    pub handler_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingTarget {
    Property(BindingDefinition),
    Event(EventBinding),
}

impl PendingTarget {
    fn definition(&self) -> &BindingDefinition {
        match self {
            PendingTarget::Property(d) => d,
            PendingTarget::Event(e) => &e.definition,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BindingTarget {
    pub member: MemberAddress,
    /// Copy the origin's value into the target when wiring. Set on the
    /// declared direction only; the reverse half of a two-way binding just
    /// listens.
    pub initialize: bool,
}

// ── Registry ──────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct Registry {
    names: IndexMap<String, Vec<NodeAddress>>,
    /// origin address → origin member → members that follow it
    bindings: IndexMap<NodeAddress, IndexMap<String, Vec<BindingTarget>>>,
    /// Definitions wired by navigation at runtime from a static anchor.
    paths: Vec<BindingDefinition>,
    handlers: Vec<EventBinding>,
    unresolved: Vec<PendingTarget>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// `target` follows `origin.origin_member`.
    pub fn store_binding(
        &mut self,
        origin: &NodeAddress,
        origin_member: &str,
        target: MemberAddress,
        initialize: bool,
    ) {
        let targets = self
            .bindings
            .entry(origin.clone())
            .or_default()
            .entry(origin_member.to_string())
            .or_default();
        if !targets.iter().any(|t| t.member == target) {
            targets.push(BindingTarget { member: target, initialize });
        }
    }

    /// Stores `target → source` (and `source → target` for two-way bindings),
    /// or queues the definition while its target name is pending.
    pub fn store_definition(&mut self, def: BindingDefinition, catalog: &TypeCatalog) -> Result<()> {
        if def.has_unresolved_target_name() {
            self.unresolved.push(PendingTarget::Property(def));
            return Ok(());
        }
        self.place(def, catalog)
    }

    pub fn store_event(&mut self, event: EventBinding, catalog: &TypeCatalog) -> Result<()> {
        if event.definition.has_unresolved_target_name() {
            self.unresolved.push(PendingTarget::Event(event));
            return Ok(());
        }
        self.place_event(event, catalog)
    }

    /// Registers `address` under `name`; duplicates become extra candidates.
    pub fn store_name(&mut self, name: &str, address: NodeAddress) {
        let candidates = self.names.entry(name.to_string()).or_default();
        if !candidates.contains(&address) {
            candidates.push(address);
        }
    }

    /// Picks the address `name` refers to from a reference made by `source`
    /// and searched under `scope`.
    ///
    /// Candidates must lie under the scope and not behind a template nested
    /// below it. Several candidates are narrowed to the one sharing the
    /// longest prefix with `source`; a tie is ambiguous.
    pub fn resolve_name(
        &self,
        name: &str,
        scope: &NodeAddress,
        source: &NodeAddress,
    ) -> std::result::Result<NamedNodeAddress, String> {
        let candidates = self
            .names
            .get(name)
            .ok_or_else(|| "no element declares this name".to_string())?;
        let scoped: Vec<&NodeAddress> = candidates
            .iter()
            .filter(|a| a.starts_with(scope) && !a.crosses_template_below(scope.len()))
            .collect();
        let nearest = match scoped.iter().map(|a| a.common_prefix_len(source)).max() {
            None => return Err(format!("no element with this name under `{scope}`")),
            Some(best) => scoped
                .into_iter()
                .filter(|a| a.common_prefix_len(source) == best)
                .collect::<Vec<_>>(),
        };
        match nearest.as_slice() {
            [only] => Ok(NamedNodeAddress::new(name, (*only).clone())),
            many => Err(format!(
                "ambiguous: declared at {}",
                many.iter().map(|a| a.to_string()).collect::<Vec<_>>().join(", ")
            )),
        }
    }

    /// Second pass: resolves every queued definition.
    pub fn resolve_named_targets(&mut self, catalog: &TypeCatalog, mode: NameResolution) -> Result<()> {
        let pending = std::mem::take(&mut self.unresolved);
        debug!("resolving {} named binding target(s)", pending.len());
        for mut target in pending {
            let def = target.definition();
            let name = def.target_name.clone().unwrap_or_default();
            let scope = def.target.clone().unwrap_or_default();
            match self.resolve_name(&name, &scope, &def.source) {
                Ok(named) => {
                    debug!("{} -> {named}", def.source);
                    let address = named.address;
                    let def = match &mut target {
                        PendingTarget::Property(d) => d,
                        PendingTarget::Event(e) => &mut e.definition,
                    };
                    def.target = Some(address);
                    def.target_name = None;
                    match target {
                        PendingTarget::Property(d) => self.place(d, catalog)?,
                        PendingTarget::Event(e) => self.place_event(e, catalog)?,
                    }
                }
                Err(reason) => match mode {
                    NameResolution::Strict => {
                        return Err(ImlError::UnresolvedName { name, reason, at: def.at });
                    }
                    NameResolution::Lenient => {
                        warn!(
                            "{}: dropping binding of {}.{}: cannot resolve `{}`: {}",
                            def.at, def.source, def.source_member, name, reason
                        );
                    }
                },
            }
        }
        Ok(())
    }

    fn place(&mut self, def: BindingDefinition, catalog: &TypeCatalog) -> Result<()> {
        let Some(target) = def.target.clone() else {
            self.paths.push(def);
            return Ok(());
        };
        let Some(first) = def.target_members.first() else {
            return Err(ImlError::InvalidBinding {
                expression: def.source_member.clone(),
                reason: "binding does not name a member".into(),
                at: def.at,
            });
        };
        if def.target_members.len() > 1 {
            MemberAddress::new(target, first.as_str()).require(catalog, def.at)?;
            self.paths.push(def);
            return Ok(());
        }

        let origin = MemberAddress::new(target.clone(), first.as_str());
        if let Some(m) = origin.require(catalog, def.at)? {
            if m.value_kind().is_none() {
                return Err(ImlError::MemberNotFound {
                    ty: target.node_type().map(|t| t.name.clone()).unwrap_or_default(),
                    member: first.clone(),
                    expected: "property",
                    at: def.at,
                });
            }
        }
        let source = MemberAddress::new(def.source.clone(), def.source_member.as_str());
        self.store_binding(&target, first, source, true);
        if def.two_way {
            self.store_binding(&def.source, &def.source_member, origin, false);
        }
        Ok(())
    }

    fn place_event(&mut self, event: EventBinding, catalog: &TypeCatalog) -> Result<()> {
        let def = &event.definition;
        if let (Some(target), [method]) = (&def.target, def.target_members.as_slice()) {
            let address = MemberAddress::new(target.clone(), method.as_str());
            if let Some(m) = address.require(catalog, def.at)? {
                if !m.is_method() {
                    return Err(ImlError::MemberNotFound {
                        ty: target.node_type().map(|t| t.name.clone()).unwrap_or_default(),
                        member: method.clone(),
                        expected: "method",
                        at: def.at,
                    });
                }
            }
        }
        self.handlers.push(event);
        Ok(())
    }

    // ── Accessors ─────────────────────────────────────────────────────────

    pub fn names(&self) -> impl Iterator<Item = (&str, &[NodeAddress])> {
        self.names.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// (origin address, origin member, followers) in insertion order.
    pub fn bindings(&self) -> impl Iterator<Item = (&NodeAddress, &str, &[BindingTarget])> {
        self.bindings
            .iter()
            .flat_map(|(a, members)| members.iter().map(move |(m, t)| (a, m.as_str(), t.as_slice())))
    }

    pub fn targets_of(&self, origin: &NodeAddress, member: &str) -> &[BindingTarget] {
        self.bindings
            .get(origin)
            .and_then(|m| m.get(member))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn paths(&self) -> &[BindingDefinition] {
        &self.paths
    }

    pub fn handlers(&self) -> &[EventBinding] {
        &self.handlers
    }

    pub fn pending(&self) -> usize {
        self.unresolved.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::NodeStack;
    use crate::catalog::{Capability, TypeDescriptor};
    use crate::value::ValueKind;

    fn catalog() -> TypeCatalog {
        TypeCatalog::new()
            .with_type(
                TypeDescriptor::new("Widget", Capability::Leaf)
                    .property("IsVisible", ValueKind::Bool, "")
                    .property("IsEnabled", ValueKind::Bool, "")
                    .method("Hide", ""),
            )
            .with_type(TypeDescriptor::new("Column", Capability::Group).base("Widget"))
            .with_type(TypeDescriptor::new("Label", Capability::Leaf).base("Widget"))
            .with_type(TypeDescriptor::new("Expander", Capability::TemplatedContainer).base("Widget"))
    }

    /// `[Column.0, Label.0]` and `[Column.0, Label.1]`
    fn two_labels(c: &TypeCatalog) -> (NodeAddress, NodeAddress, NodeAddress) {
        let mut s = NodeStack::new();
        s.push(c.resolve("Column").unwrap());
        let root = s.current_address();
        s.push(c.resolve("Label").unwrap());
        let a = s.current_address();
        s.pop();
        s.increment_index();
        s.push(c.resolve("Label").unwrap());
        (root, a, s.current_address())
    }

    fn def(source: &NodeAddress, target: Option<NodeAddress>, name: Option<&str>, two_way: bool) -> BindingDefinition {
        BindingDefinition {
            source: source.clone(),
            source_member: "IsEnabled".into(),
            target,
            target_members: vec!["IsVisible".into()],
            target_name: name.map(str::to_string),
            two_way,
            at: Position::default(),
        }
    }

    #[test]
    fn one_way_stores_forward_entry_only() {
        let c = catalog();
        let (_, a, b) = two_labels(&c);
        let mut r = Registry::new();
        r.store_definition(def(&b, Some(a.clone()), None, false), &c).unwrap();
        assert_eq!(r.targets_of(&a, "IsVisible").len(), 1);
        assert!(r.targets_of(&b, "IsEnabled").is_empty());
    }

    #[test]
    fn two_way_stores_both_directions() {
        let c = catalog();
        let (_, a, b) = two_labels(&c);
        let mut r = Registry::new();
        r.store_definition(def(&b, Some(a.clone()), None, true), &c).unwrap();
        let forward = r.targets_of(&a, "IsVisible");
        assert_eq!(forward[0].member, MemberAddress::new(b.clone(), "IsEnabled"));
        assert!(forward[0].initialize);
        let back = r.targets_of(&b, "IsEnabled");
        assert_eq!(back[0].member, MemberAddress::new(a.clone(), "IsVisible"));
        assert!(!back[0].initialize);
    }

    #[test]
    fn forward_and_backward_name_references_agree() {
        let c = catalog();
        let (root, a, b) = two_labels(&c);

        // declared before use
        let mut r = Registry::new();
        r.store_name("L", a.clone());
        r.store_definition(def(&b, Some(root.clone()), Some("L"), false), &c).unwrap();
        r.resolve_named_targets(&c, NameResolution::Strict).unwrap();
        assert_eq!(r.targets_of(&a, "IsVisible").len(), 1);

        // declared after use
        let mut r = Registry::new();
        r.store_definition(def(&b, Some(root.clone()), Some("L"), false), &c).unwrap();
        assert_eq!(r.pending(), 1);
        r.store_name("L", a.clone());
        r.resolve_named_targets(&c, NameResolution::Strict).unwrap();
        assert_eq!(r.targets_of(&a, "IsVisible").len(), 1);
        assert_eq!(r.pending(), 0);
    }

    #[test]
    fn unresolved_name_strict_and_lenient() {
        let c = catalog();
        let (root, _, b) = two_labels(&c);
        let mut r = Registry::new();
        r.store_definition(def(&b, Some(root.clone()), Some("Ghost"), false), &c).unwrap();
        let e = r.resolve_named_targets(&c, NameResolution::Strict).unwrap_err();
        assert!(matches!(e, ImlError::UnresolvedName { ref name, .. } if name == "Ghost"));

        let mut r = Registry::new();
        r.store_definition(def(&b, Some(root), Some("Ghost"), false), &c).unwrap();
        r.resolve_named_targets(&c, NameResolution::Lenient).unwrap();
        assert_eq!(r.bindings().count(), 0);
    }

    #[test]
    fn nearest_candidate_wins_and_ties_are_ambiguous() {
        let c = catalog();
        let (root, a, b) = two_labels(&c);
        let mut r = Registry::new();
        r.store_name("X", a.clone());
        r.store_name("X", b.clone());
        // from `a` itself, `a` shares the longest prefix
        assert_eq!(r.resolve_name("X", &root, &a).unwrap(), NamedNodeAddress::new("X", a.clone()));
        // from the root both are equally near
        assert!(r.resolve_name("X", &root, &root).unwrap_err().starts_with("ambiguous"));
    }

    #[test]
    fn names_behind_nested_templates_are_hidden() {
        let c = catalog();
        let mut s = NodeStack::new();
        s.push(c.resolve("Column").unwrap());
        let root = s.current_address();
        s.push(c.resolve("Expander").unwrap());
        let expander = s.current_address();
        s.push_template(c.resolve("Column").unwrap());
        s.push(c.resolve("Label").unwrap());
        let inner = s.current_address();

        let mut r = Registry::new();
        r.store_name("Inner", inner.clone());
        assert!(r.resolve_name("Inner", &root, &root).is_err());
        let named = r.resolve_name("Inner", &expander, &inner).unwrap();
        assert_eq!(named.address, inner);
        assert_eq!(named.to_string(), format!("Inner@{inner}"));
    }

    #[test]
    fn binding_to_a_method_is_rejected() {
        let c = catalog();
        let (_, a, b) = two_labels(&c);
        let mut r = Registry::new();
        let mut d = def(&b, Some(a), None, false);
        d.target_members = vec!["Hide".into()];
        let e = r.store_definition(d, &c).unwrap_err();
        assert!(matches!(e, ImlError::MemberNotFound { expected: "property", .. }));
    }
}
