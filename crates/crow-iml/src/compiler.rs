//! Markup → [`Instantiator`].
//!
//! The compiler makes a single pass over the reader's events. Each element
//! gets a slot and a [`NodeAddress`]; literal attributes become `SetLiteral`
//! ops on the spot, while bindings and handlers that refer to named elements
//! go through the [`Registry`] and are turned into wiring ops once the whole
//! document has been read.

use std::io::Read;
use std::sync::Arc;

use indexmap::IndexMap;
use log::debug;

use crate::address::{NodeAddress, NodeStack};
use crate::catalog::{AttachKind, MemberKind, TypeCatalog, TypeDescriptor, TypeRef};
use crate::error::{ImlError, Position, Result};
use crate::expr::{self, AssignValue, BindingPath, Expression, Hops};
use crate::instantiator::{Endpoint, Follower, Instantiator, Op, Origin, Route, Setter, SetterValue, Slot};
use crate::member::MemberAddress;
use crate::reader::{Attribute, Event, Reader};
use crate::registry::{BindingDefinition, EventBinding, NameResolution, Registry};
use crate::value::ValueKind;

/// Data type of item templates that do not declare one.
pub const DEFAULT_DATA_TYPE: &str = "default";

// ── Options ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    pub name_resolution: NameResolution,
    /// Reported in logs and kept on the instantiator.
    pub source_path: Option<String>,
}

impl CompileOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name_resolution(mut self, mode: NameResolution) -> Self {
        self.name_resolution = mode;
        self
    }

    pub fn source_path(mut self, path: impl Into<String>) -> Self {
        self.source_path = Some(path.into());
        self
    }
}

// ── Compiler ──────────────────────────────────────────────────────────────

pub struct Compiler {
    catalog: Arc<TypeCatalog>,
    options: CompileOptions,
}

impl Compiler {
    pub fn new(catalog: Arc<TypeCatalog>) -> Self {
        Self { catalog, options: CompileOptions::default() }
    }

    pub fn with_options(mut self, options: CompileOptions) -> Self {
        self.options = options;
        self
    }

    pub fn catalog(&self) -> &Arc<TypeCatalog> {
        &self.catalog
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    pub fn compile_str(&self, src: &str) -> Result<Instantiator> {
        debug!(
            "compiling {}",
            self.options.source_path.as_deref().unwrap_or("<inline markup>")
        );
        self.compile_at(src, Position::default())
    }

    pub fn compile_reader<T: Read>(&self, mut input: T) -> Result<Instantiator> {
        let mut src = String::new();
        input
            .read_to_string(&mut src)
            .map_err(|e| ImlError::lexical(format!("cannot read markup: {e}"), Position::default()))?;
        self.compile_str(&src)
    }

    fn compile_at(&self, src: &str, origin: Position) -> Result<Instantiator> {
        let mut reader = Reader::with_origin(src, origin);
        let (name, attributes, at) = loop {
            match reader.next_event()? {
                Event::Start { name, attributes, at, .. } => break (name, attributes, at),
                Event::Eof => {
                    return Err(ImlError::lexical("document has no root element", reader.position()));
                }
                Event::Text { at, .. } | Event::End { at, .. } => {
                    return Err(ImlError::lexical("expected a root element", at));
                }
            }
        };

        let mut session = Session {
            compiler: self,
            reader,
            stack: NodeStack::new(),
            registry: Registry::new(),
            ops: Vec::new(),
            slots: IndexMap::new(),
            root_type: None,
        };
        session.element(&name, attributes, at, Placement::Root)?;
        if let Event::Start { at, .. } | Event::Text { at, .. } | Event::End { at, .. } = session.reader.next_event()? {
            return Err(ImlError::lexical("unexpected content after the root element", at));
        }
        session.finish()
    }
}

// ── Session ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placement {
    Root,
    Child,
    TemplateRoot,
}

struct Session<'c, 's> {
    compiler: &'c Compiler,
    reader: Reader<'s>,
    stack: NodeStack,
    registry: Registry,
    ops: Vec<Op>,
    slots: IndexMap<NodeAddress, Slot>,
    root_type: Option<TypeRef>,
}

impl Session<'_, '_> {
    fn catalog(&self) -> &TypeCatalog {
        &self.compiler.catalog
    }

    fn element(&mut self, name: &str, attributes: Vec<Attribute>, at: Position, placement: Placement) -> Result<Slot> {
        let ty = self
            .catalog()
            .resolve(name)
            .ok_or_else(|| ImlError::UnknownType { name: name.to_string(), at })?;

        match placement {
            Placement::TemplateRoot => self.stack.push_template(Arc::clone(&ty)),
            Placement::Root | Placement::Child => self.stack.push(Arc::clone(&ty)),
        }
        let address = self.stack.current_address();
        let slot = self.slots.len();
        self.slots.insert(address.clone(), slot);
        if placement == Placement::Root {
            self.root_type = Some(Arc::clone(&ty));
        } else {
            self.ops.push(Op::New { slot, ty: Arc::clone(&ty) });
        }

        let mut item_template_path = None;
        for attribute in attributes {
            if attribute.name == "ItemTemplate" && ty.capability.accepts_item_templates() {
                item_template_path = Some(attribute.value);
                continue;
            }
            self.attribute(&ty, &address, slot, attribute)?;
        }

        let mut has_single_child = false;
        let mut has_item_templates = false;
        loop {
            match self.reader.next_event()? {
                Event::Start { name: child, attributes, at, .. } => match child.as_str() {
                    "Template" => self.inline_template(&ty, slot, attributes, at)?,
                    "ItemTemplate" => {
                        has_item_templates = true;
                        self.item_template(&ty, slot, attributes, at)?;
                    }
                    _ => {
                        let kind = ty
                            .capability
                            .child_attachment()
                            .ok_or_else(|| unsupported(&ty, &child, "it does not accept children", at))?;
                        if kind == AttachKind::SetSingleChild {
                            if has_single_child {
                                return Err(unsupported(&ty, &child, "it accepts a single child", at));
                            }
                            has_single_child = true;
                        }
                        let child_slot = self.element(&child, attributes, at, Placement::Child)?;
                        self.ops.push(Op::Attach { parent: slot, child: child_slot, kind });
                        if kind.is_list() {
                            self.stack.increment_index();
                        }
                    }
                },
                Event::Text { text, at } => self.text(&ty, slot, &text, at)?,
                Event::End { .. } => break,
                Event::Eof => return Err(ImlError::lexical("unexpected end of document", self.reader.position())),
            }
        }

        // declared item templates take precedence over the attribute
        if let Some(path) = item_template_path.filter(|_| !has_item_templates) {
            self.ops.push(Op::LoadItemTemplate { slot, data_type: DEFAULT_DATA_TYPE.to_string(), path });
        }

        self.stack.pop();
        Ok(slot)
    }

    fn inline_template(&mut self, ty: &TypeRef, slot: Slot, attributes: Vec<Attribute>, at: Position) -> Result<()> {
        let kind = ty
            .capability
            .template_attachment()
            .ok_or_else(|| unsupported(ty, "Template", "it is not a templated control", at))?;
        if let Some(a) = attributes.first() {
            return Err(ImlError::lexical(format!("unexpected attribute `{}` on <Template>", a.name), a.at));
        }
        let mut has_root = false;
        loop {
            match self.reader.next_event()? {
                Event::Start { name, attributes, at, .. } => {
                    if has_root {
                        return Err(unsupported(ty, &name, "a template has a single root element", at));
                    }
                    has_root = true;
                    let root = self.element(&name, attributes, at, Placement::TemplateRoot)?;
                    self.ops.push(Op::Attach { parent: slot, child: root, kind });
                }
                Event::Text { at, .. } => return Err(ImlError::lexical("unexpected text inside <Template>", at)),
                Event::End { .. } => return Ok(()),
                Event::Eof => return Err(ImlError::lexical("unexpected end of document", self.reader.position())),
            }
        }
    }

    fn item_template(&mut self, ty: &TypeRef, slot: Slot, attributes: Vec<Attribute>, at: Position) -> Result<()> {
        if !ty.capability.accepts_item_templates() {
            return Err(unsupported(ty, "ItemTemplate", "it does not display items", at));
        }
        let mut data_type = DEFAULT_DATA_TYPE.to_string();
        let mut path = None;
        for a in attributes {
            match a.name.as_str() {
                "DataType" => data_type = a.value,
                "Path" => path = Some(a.value),
                other => {
                    return Err(ImlError::MemberNotFound {
                        ty: "ItemTemplate".into(),
                        member: other.to_string(),
                        expected: "attribute",
                        at: a.at,
                    });
                }
            }
        }
        let (markup, origin) = self.reader.read_inner_markup()?;

        if let Some(path) = path {
            if !markup.trim().is_empty() {
                return Err(ImlError::lexical("an <ItemTemplate> with a `Path` takes no content", origin));
            }
            debug!("item template `{data_type}` for <{}> from {path}", ty.name);
            self.ops.push(Op::LoadItemTemplate { slot, data_type, path });
            return Ok(());
        }

        let template = self.compiler.compile_at(&markup, origin)?;
        debug!("item template `{data_type}` for <{}>: <{}>", ty.name, template.root_type().name);
        self.ops.push(Op::AddItemTemplate { slot, data_type, template: Arc::new(template) });
        Ok(())
    }

    fn text(&mut self, ty: &TypeRef, slot: Slot, text: &str, at: Position) -> Result<()> {
        let Some(property) = ty.content_property.clone() else {
            return Err(ImlError::lexical(format!("<{}> does not take text content", ty.name), at));
        };
        let kind = self
            .catalog()
            .find_member(ty, &property)
            .and_then(|m| m.value_kind().cloned())
            .unwrap_or(ValueKind::Str);
        self.set_literal(slot, &property, &kind, text, at)
    }

    // ── Attributes ────────────────────────────────────────────────────────

    fn attribute(&mut self, ty: &TypeRef, address: &NodeAddress, slot: Slot, attribute: Attribute) -> Result<()> {
        let Attribute { name, value, at } = attribute;
        if name == "Template" && ty.capability.is_templated() {
            self.ops.push(Op::LoadTemplate { slot, path: value });
            return Ok(());
        }
        let member = self.catalog().find_member(ty, &name).ok_or_else(|| ImlError::MemberNotFound {
            ty: ty.name.clone(),
            member: name.clone(),
            expected: "member",
            at,
        })?;
        match &member.kind {
            MemberKind::Event { handler_type } => self.handlers(address, slot, &name, handler_type, &value, at),
            MemberKind::Method => Err(ImlError::MemberNotFound {
                ty: ty.name.clone(),
                member: name,
                expected: "property or event",
                at,
            }),
            MemberKind::Property { kind, .. } => {
                if let Some(inner) = expr::braced(&value) {
                    return self.binding(address, slot, &name, kind, inner, at);
                }
                if name == "Name" {
                    self.registry.store_name(&value, address.clone());
                }
                self.set_literal(slot, &name, kind, &value, at)
            }
        }
    }

    fn set_literal(&mut self, slot: Slot, member: &str, kind: &ValueKind, text: &str, at: Position) -> Result<()> {
        let value = kind.parse_literal(text).ok_or_else(|| ImlError::InvalidLiteral {
            member: member.to_string(),
            value: text.to_string(),
            expected: kind.label(),
            at,
        })?;
        self.ops.push(Op::SetLiteral { slot, member: member.to_string(), value });
        Ok(())
    }

    fn binding(
        &mut self,
        address: &NodeAddress,
        slot: Slot,
        member: &str,
        kind: &ValueKind,
        inner: &str,
        at: Position,
    ) -> Result<()> {
        let invalid = |reason: String| ImlError::InvalidBinding { expression: inner.to_string(), reason, at };
        let parsed = expr::parse_binding(inner).map_err(invalid)?;
        let path = match parsed.expression {
            Expression::Constant(text) => return self.set_literal(slot, member, kind, &text, at),
            Expression::Path(path) => path,
        };
        if path.members.is_empty() {
            return Err(invalid("binding does not name a member".into()));
        }

        let definition = |target: Option<NodeAddress>, name: Option<String>| BindingDefinition {
            source: address.clone(),
            source_member: member.to_string(),
            target,
            target_members: path.members.clone(),
            target_name: name,
            two_way: parsed.two_way,
            at,
        };
        let route_op = |origin: Origin| Op::BindRoute {
            slot,
            member: member.to_string(),
            kind: kind.clone(),
            route: Route { origin, name: path.name.clone(), members: path.members.clone() },
            two_way: parsed.two_way,
        };

        match (path.hops, &path.name) {
            (Hops::DataSource, _) => self.ops.push(route_op(Origin::DataSource)),
            (hops, Some(name)) => match destination(address, hops) {
                Some(scope) => {
                    let def = definition(Some(scope), Some(name.clone()));
                    self.registry.store_definition(def, &self.compiler.catalog)?;
                }
                None => self.ops.push(route_op(Origin::Sender(hops))),
            },
            (Hops::TemplateRoot, None) => match address.enclosing_templated_control() {
                Some(control) => {
                    self.registry.store_definition(definition(Some(control), None), &self.compiler.catalog)?;
                }
                None if path.members.len() == 1 => {
                    let def = definition(Some(NodeAddress::empty()), None);
                    self.registry.store_definition(def, &self.compiler.catalog)?;
                }
                None => self.ops.push(route_op(Origin::Sender(Hops::TemplateRoot))),
            },
            (hops @ Hops::Up(_), None) => self.ops.push(route_op(Origin::Sender(hops))),
        }
        Ok(())
    }

    fn handlers(
        &mut self,
        address: &NodeAddress,
        slot: Slot,
        event: &str,
        handler_type: &str,
        value: &str,
        at: Position,
    ) -> Result<()> {
        for part in split_handlers(value) {
            let invalid = |reason: String| ImlError::InvalidBinding { expression: part.to_string(), reason, at };

            if let Some(inner) = expr::braced(part) {
                let setters: Vec<Setter> = expr::parse_assignments(inner)
                    .map_err(invalid)?
                    .into_iter()
                    .map(|a| Setter {
                        target: sender_route(&a.target),
                        value: match a.value {
                            AssignValue::Constant(text) => SetterValue::Text(text),
                            AssignValue::Literal(text) => SetterValue::Literal(text),
                            AssignValue::Read(path) => SetterValue::Read(sender_route(&path)),
                        },
                    })
                    .collect();
                self.ops.push(Op::AddSetters {
                    source: slot,
                    event: event.to_string(),
                    handler_type: handler_type.to_string(),
                    setters: setters.into(),
                });
                continue;
            }

            let path = expr::parse_path(part).map_err(invalid)?;
            if path.members.is_empty() {
                return Err(invalid("handler does not name a method".into()));
            }
            let handler_op = |origin: Origin| Op::AddHandler {
                source: slot,
                event: event.to_string(),
                handler_type: handler_type.to_string(),
                target: Route { origin, name: path.name.clone(), members: path.members.clone() },
            };
            let event_binding = |target: NodeAddress, name: Option<String>| EventBinding {
                definition: BindingDefinition {
                    source: address.clone(),
                    source_member: event.to_string(),
                    target: Some(target),
                    target_members: path.members.clone(),
                    target_name: name,
                    two_way: false,
                    at,
                },
                handler_type: handler_type.to_string(),
            };

            match (path.hops, &path.name) {
                (Hops::DataSource, _) => self.ops.push(handler_op(Origin::DataSource)),
                (hops, Some(name)) => match destination(address, hops) {
                    Some(scope) => {
                        let binding = event_binding(scope, Some(name.clone()));
                        self.registry.store_event(binding, &self.compiler.catalog)?;
                    }
                    None => self.ops.push(handler_op(Origin::Sender(hops))),
                },
                (Hops::TemplateRoot, None) => match address.enclosing_templated_control() {
                    Some(control) => {
                        self.registry.store_event(event_binding(control, None), &self.compiler.catalog)?;
                    }
                    None => self.ops.push(handler_op(Origin::Sender(Hops::TemplateRoot))),
                },
                (hops @ Hops::Up(_), None) => self.ops.push(handler_op(Origin::Sender(hops))),
            }
        }
        Ok(())
    }

    // ── Finalization ──────────────────────────────────────────────────────

    fn finish(mut self) -> Result<Instantiator> {
        let catalog = Arc::clone(&self.compiler.catalog);
        let mut registry = std::mem::take(&mut self.registry);
        registry.resolve_named_targets(&catalog, self.compiler.options.name_resolution)?;

        for (origin, member, targets) in registry.bindings() {
            let follower = |t: &MemberAddress, endpoint: Endpoint, initialize: bool| Follower {
                endpoint,
                member: t.name().to_string(),
                kind: member_kind(&catalog, t),
                initialize,
            };
            if origin.is_empty() {
                // the origin is whatever template root sits above each follower
                for t in targets {
                    let Some(&slot) = self.slots.get(t.member.address()) else { continue };
                    self.ops.push(Op::Bind {
                        origin: Endpoint::TemplateRootOf(slot),
                        member: member.to_string(),
                        followers: vec![follower(&t.member, Endpoint::Slot(slot), t.initialize)],
                    });
                }
                continue;
            }
            let Some(&origin_slot) = self.slots.get(origin) else { continue };
            let followers: Vec<Follower> = targets
                .iter()
                .filter_map(|t| {
                    let endpoint = if t.member.is_template_binding() {
                        Endpoint::TemplateRootOf(origin_slot)
                    } else {
                        Endpoint::Slot(*self.slots.get(t.member.address())?)
                    };
                    Some(follower(&t.member, endpoint, t.initialize))
                })
                .collect();
            self.ops.push(Op::Bind { origin: Endpoint::Slot(origin_slot), member: member.to_string(), followers });
        }

        for def in registry.paths() {
            let Some(&slot) = self.slots.get(&def.source) else { continue };
            let Some(origin) = self.origin_of(def) else { continue };
            let kind = member_kind(&catalog, &MemberAddress::new(def.source.clone(), def.source_member.as_str()));
            self.ops.push(Op::BindRoute {
                slot,
                member: def.source_member.clone(),
                kind,
                route: Route { origin, name: None, members: def.target_members.clone() },
                two_way: def.two_way,
            });
        }

        for handler in registry.handlers() {
            let def = &handler.definition;
            let Some(&source) = self.slots.get(&def.source) else { continue };
            let Some(origin) = self.origin_of(def) else { continue };
            self.ops.push(Op::AddHandler {
                source,
                event: def.source_member.clone(),
                handler_type: handler.handler_type.clone(),
                target: Route { origin, name: None, members: def.target_members.clone() },
            });
        }

        let root_type = self
            .root_type
            .ok_or_else(|| ImlError::lexical("document has no root element", Position::default()))?;
        let instantiator = Instantiator::new(
            root_type,
            self.ops,
            self.slots.len(),
            catalog,
            self.compiler.options.source_path.clone(),
        );
        debug!(
            "compiled <{}>: {} slot(s), {} op(s)",
            instantiator.root_type().name,
            instantiator.slot_count(),
            instantiator.ops().len()
        );
        Ok(instantiator)
    }

    fn origin_of(&self, def: &BindingDefinition) -> Option<Origin> {
        match &def.target {
            None => Some(Origin::DataSource),
            Some(t) if t.is_empty() => Some(Origin::Sender(Hops::TemplateRoot)),
            Some(t) => self.slots.get(t).map(|&s| Origin::Slot(s)),
        }
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────

/// Static scope a hop from `address` lands on, when it stays inside the
/// document. A template-root hop with no templated control above falls back to
/// the document root.
fn destination(address: &NodeAddress, hops: Hops) -> Option<NodeAddress> {
    match hops {
        Hops::Up(n) => address.ascend(n),
        Hops::TemplateRoot => address.enclosing_templated_control().or_else(|| Some(address.prefix(1))),
        Hops::DataSource => None,
    }
}

fn sender_route(path: &BindingPath) -> Route {
    let origin = match path.hops {
        Hops::DataSource => Origin::DataSource,
        hops => Origin::Sender(hops),
    };
    Route { origin, name: path.name.clone(), members: path.members.clone() }
}

fn member_kind(catalog: &TypeCatalog, member: &MemberAddress) -> ValueKind {
    member
        .resolve(catalog)
        .and_then(|m| m.value_kind().cloned())
        .unwrap_or(ValueKind::Any)
}

fn unsupported(parent: &TypeDescriptor, child: &str, reason: &str, at: Position) -> ImlError {
    ImlError::UnsupportedAttachment {
        parent: parent.name.clone(),
        child: child.to_string(),
        reason: reason.to_string(),
        at,
    }
}

/// Splits an event attribute on `;`, leaving `{...}` groups and quoted text
/// intact.
fn split_handlers(value: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let (mut depth, mut quoted, mut start) = (0usize, false, 0usize);
    for (i, c) in value.char_indices() {
        match c {
            '\'' => quoted = !quoted,
            '{' if !quoted => depth += 1,
            '}' if !quoted => depth = depth.saturating_sub(1),
            ';' if !quoted && depth == 0 => {
                parts.push(&value[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&value[start..]);
    parts.into_iter().map(str::trim).filter(|p| !p.is_empty()).collect()
}
