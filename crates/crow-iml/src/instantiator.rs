//! Compiled documents and the interpreter that runs them.
//!
//! An [`Instantiator`] is a flat list of [`Op`]s over numbered slots. Slot 0
//! is the root; every other element gets the next slot in document order.
//! Construction ops come first, wiring ops after them, so every binding and
//! handler sees the complete tree of its own invocation. Wiring ops run in
//! the document order of the elements that declared them.
//!
//! The plan is immutable. All per-invocation state lives in a slot table
//! local to [`Instantiator::instantiate`], so one instantiator can build any
//! number of independent trees, from several threads at once.

use std::fmt;
use std::sync::Arc;

use log::{debug, trace, warn};

use crate::catalog::{AttachKind, TypeCatalog, TypeRef};
use crate::expr::Hops;
use crate::runtime::{ChangeHandler, HandlerFn, Runtime};
use crate::value::{Value, ValueKind};

pub type Slot = usize;

// ── Plan ──────────────────────────────────────────────────────────────────

/// Where runtime navigation starts.
#[derive(Debug, Clone, PartialEq)]
pub enum Origin {
    /// Relative to the object the op is anchored on.
    Sender(Hops),
    DataSource,
    /// A statically known element of this invocation.
    Slot(Slot),
}

/// Navigation to a member: start, optional descendant by name, then member
/// segments. The last segment is the member that is read, set or called.
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    pub origin: Origin,
    pub name: Option<String>,
    pub members: Vec<String>,
}

/// One end of a statically resolved binding.
#[derive(Debug, Clone, PartialEq)]
pub enum Endpoint {
    Slot(Slot),
    /// Enclosing template root of the slot's object, found by ascent.
    TemplateRootOf(Slot),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Follower {
    pub endpoint: Endpoint,
    pub member: String,
    pub kind: ValueKind,
    pub initialize: bool,
}

/// One `target = value` of an assignment handler.
#[derive(Debug, Clone, PartialEq)]
pub struct Setter {
    pub target: Route,
    pub value: SetterValue,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SetterValue {
    Text(String),
    /// Parsed against the target member's kind when the handler runs.
    Literal(String),
    Read(Route),
}

#[derive(Debug, Clone)]
pub enum Op {
    New { slot: Slot, ty: TypeRef },
    SetLiteral { slot: Slot, member: String, value: Value },
    Attach { parent: Slot, child: Slot, kind: AttachKind },
    LoadTemplate { slot: Slot, path: String },
    AddItemTemplate { slot: Slot, data_type: String, template: Arc<Instantiator> },
    /// Item template resolved by path through the context's [`TemplateSource`].
    LoadItemTemplate { slot: Slot, data_type: String, path: String },
    /// Initializes the followers from `origin.member` and keeps them in sync.
    Bind { origin: Endpoint, member: String, followers: Vec<Follower> },
    /// Binds `slot.member` to whatever `route` reaches at runtime.
    BindRoute { slot: Slot, member: String, kind: ValueKind, route: Route, two_way: bool },
    AddHandler { source: Slot, event: String, handler_type: String, target: Route },
    AddSetters { source: Slot, event: String, handler_type: String, setters: Arc<[Setter]> },
}

impl Op {
    fn is_wiring(&self) -> bool {
        matches!(
            self,
            Op::Bind { .. } | Op::BindRoute { .. } | Op::AddHandler { .. } | Op::AddSetters { .. }
        )
    }

    /// Slot of the element whose attribute produced a wiring op. A `Bind`
    /// shared by several followers counts as declared by the earliest one.
    fn declared_by(&self) -> Slot {
        match self {
            Op::BindRoute { slot, .. } => *slot,
            Op::AddHandler { source, .. } | Op::AddSetters { source, .. } => *source,
            Op::Bind { origin, followers, .. } => followers
                .iter()
                .map(|f| if f.initialize { f.endpoint.slot() } else { origin.slot() })
                .min()
                .unwrap_or_else(|| origin.slot()),
            _ => 0,
        }
    }
}

impl Endpoint {
    fn slot(&self) -> Slot {
        match self {
            Endpoint::Slot(s) | Endpoint::TemplateRootOf(s) => *s,
        }
    }
}

// ── Context ───────────────────────────────────────────────────────────────

/// Resolves `Template="path"` and item template paths at invocation time.
pub trait TemplateSource: Send + Sync {
    fn template(&self, path: &str) -> Option<Arc<Instantiator>>;
}

/// Per-invocation inputs.
pub struct InstantiationContext<'a, R: Runtime> {
    /// Target of bindings without a hop prefix.
    pub data_source: Option<R::Object>,
    pub templates: Option<&'a dyn TemplateSource>,
}

impl<'a, R: Runtime> InstantiationContext<'a, R> {
    pub fn new() -> Self {
        Self { data_source: None, templates: None }
    }

    pub fn with_data_source(mut self, data_source: R::Object) -> Self {
        self.data_source = Some(data_source);
        self
    }

    pub fn with_templates(mut self, templates: &'a dyn TemplateSource) -> Self {
        self.templates = Some(templates);
        self
    }
}

impl<R: Runtime> Default for InstantiationContext<'_, R> {
    fn default() -> Self {
        Self::new()
    }
}

/// Host object the new root is attached to before wiring.
pub struct Owner<'a, O> {
    pub object: &'a O,
    pub kind: AttachKind,
}

/// A template loaded by path whose wiring waits for the host tree.
struct Deferred<O> {
    plan: Arc<Instantiator>,
    slots: Vec<Option<O>>,
}

/// What a route sees when it starts walking.
struct Scope<'a, O> {
    sender: &'a O,
    data_source: Option<&'a O>,
    slots: &'a [Option<O>],
}

// ── Instantiator ──────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct Instantiator {
    root_type: TypeRef,
    ops: Vec<Op>,
    wiring_start: usize,
    slots: usize,
    catalog: Arc<TypeCatalog>,
    source: Option<String>,
}

impl Instantiator {
    pub(crate) fn new(
        root_type: TypeRef,
        mut ops: Vec<Op>,
        slots: usize,
        catalog: Arc<TypeCatalog>,
        source: Option<String>,
    ) -> Self {
        // stable: construction keeps document order, wiring follows the
        // declaring elements in document order
        ops.sort_by_key(|op| (op.is_wiring(), op.declared_by()));
        let wiring_start = ops.iter().position(Op::is_wiring).unwrap_or(ops.len());
        Self { root_type, ops, wiring_start, slots, catalog, source }
    }

    pub fn root_type(&self) -> &TypeRef {
        &self.root_type
    }

    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    pub fn slot_count(&self) -> usize {
        self.slots
    }

    pub fn catalog(&self) -> &Arc<TypeCatalog> {
        &self.catalog
    }

    /// Path the document was compiled from, if it came from a file.
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    /// Builds a fresh object tree with default context and no owner.
    pub fn create<R: Runtime>(&self, rt: &R) -> R::Object {
        self.instantiate(rt, &InstantiationContext::new(), None)
    }

    /// Builds a fresh object tree and returns its root.
    ///
    /// Templates loaded by path are built along with the tree but wired only
    /// once the whole tree, owner included, is in place.
    pub fn instantiate<R: Runtime>(
        &self,
        rt: &R,
        ctx: &InstantiationContext<'_, R>,
        owner: Option<Owner<'_, R::Object>>,
    ) -> R::Object {
        let mut deferred = Vec::new();
        let (root, slots) = self.build_tree(rt, ctx, &mut deferred);
        if let Some(owner) = owner {
            rt.attach(owner.object, &root, owner.kind);
        }
        self.wire_tree(rt, ctx, &slots);
        for template in &deferred {
            template.plan.wire_tree(rt, ctx, &template.slots);
        }
        trace!(
            "instantiated <{}> ({} ops, {} external template(s))",
            self.root_type.name,
            self.ops.len(),
            deferred.len()
        );
        root
    }

    fn build_tree<R: Runtime>(
        &self,
        rt: &R,
        ctx: &InstantiationContext<'_, R>,
        deferred: &mut Vec<Deferred<R::Object>>,
    ) -> (R::Object, Vec<Option<R::Object>>) {
        let root = rt.create_instance(&self.root_type);
        let mut slots: Vec<Option<R::Object>> = vec![None; self.slots.max(1)];
        slots[0] = Some(root.clone());
        for op in &self.ops[..self.wiring_start] {
            self.build(rt, ctx, &mut slots, deferred, op);
        }
        (root, slots)
    }

    fn wire_tree<R: Runtime>(&self, rt: &R, ctx: &InstantiationContext<'_, R>, slots: &[Option<R::Object>]) {
        for op in &self.ops[self.wiring_start..] {
            self.wire(rt, ctx, slots, op);
        }
    }

    fn build<R: Runtime>(
        &self,
        rt: &R,
        ctx: &InstantiationContext<'_, R>,
        slots: &mut [Option<R::Object>],
        deferred: &mut Vec<Deferred<R::Object>>,
        op: &Op,
    ) {
        match op {
            Op::New { slot, ty } => {
                if let Some(s) = slots.get_mut(*slot) {
                    *s = Some(rt.create_instance(ty));
                }
            }
            Op::SetLiteral { slot, member, value } => {
                if let Some(obj) = get(slots, *slot) {
                    rt.set_member_value(obj, member, value.clone());
                }
            }
            Op::Attach { parent, child, kind } => {
                if let (Some(p), Some(c)) = (get(slots, *parent), get(slots, *child)) {
                    rt.attach(p, c, *kind);
                }
            }
            Op::LoadTemplate { slot, path } => {
                let Some(control) = get(slots, *slot) else { return };
                let Some(template) = ctx.templates.and_then(|t| t.template(path)) else {
                    warn!("template `{path}` not found, <{}> left without one", rt.type_name(control));
                    return;
                };
                // reserve the entry first so nested templates wire after this one
                let index = deferred.len();
                deferred.push(Deferred { plan: Arc::clone(&template), slots: Vec::new() });
                let (root, template_slots) = template.build_tree(rt, ctx, deferred);
                rt.attach(control, &root, AttachKind::SetTemplateRoot);
                deferred[index].slots = template_slots;
            }
            Op::AddItemTemplate { slot, data_type, template } => {
                if let Some(control) = get(slots, *slot) {
                    rt.add_item_template(control, data_type, Arc::clone(template));
                }
            }
            Op::LoadItemTemplate { slot, data_type, path } => {
                let Some(control) = get(slots, *slot) else { return };
                match ctx.templates.and_then(|t| t.template(path)) {
                    Some(template) => rt.add_item_template(control, data_type, template),
                    None => warn!(
                        "item template `{path}` not found, <{}> has no `{data_type}` rows",
                        rt.type_name(control)
                    ),
                }
            }
            _ => {}
        }
    }

    fn wire<R: Runtime>(&self, rt: &R, ctx: &InstantiationContext<'_, R>, slots: &[Option<R::Object>], op: &Op) {
        match op {
            Op::Bind { origin, member, followers } => self.bind(rt, slots, origin, member, followers),
            Op::BindRoute { slot, member, kind, route, two_way } => {
                let Some(sender) = get(slots, *slot) else { return };
                let scope = Scope { sender, data_source: ctx.data_source.as_ref(), slots };
                let Some((dest, terminal)) = route.locate(rt, &self.catalog, &scope) else {
                    trace!("binding of `{member}` not reachable, skipped");
                    return;
                };
                self.bind_route(rt, sender, member, kind, dest, terminal, *two_way);
            }
            Op::AddHandler { source, event, handler_type, target } => {
                let Some(sender) = get(slots, *source) else { return };
                let scope = Scope { sender, data_source: ctx.data_source.as_ref(), slots };
                let Some((target, method)) = target.locate(rt, &self.catalog, &scope) else {
                    trace!("handler target for `{event}` not reachable, skipped");
                    return;
                };
                match rt.create_delegate(handler_type, &target, method) {
                    Some(delegate) => rt.add_event_handler(sender, event, delegate),
                    None => debug!("`{}` has no method `{method}`, `{event}` left unwired", rt.type_name(&target)),
                }
            }
            Op::AddSetters { source, event, handler_type, setters } => {
                let Some(sender) = get(slots, *source) else { return };
                let catalog = Arc::clone(&self.catalog);
                let setters = Arc::clone(setters);
                let handler: HandlerFn<R> = Arc::new(move |rt: &R, sender: &R::Object| {
                    for setter in setters.iter() {
                        setter.apply(rt, &catalog, sender);
                    }
                });
                let delegate = rt.closure_delegate(handler_type, handler);
                rt.add_event_handler(sender, event, delegate);
            }
            _ => {}
        }
    }

    fn bind<R: Runtime>(
        &self,
        rt: &R,
        slots: &[Option<R::Object>],
        origin: &Endpoint,
        member: &str,
        followers: &[Follower],
    ) {
        let Some(source) = self.endpoint(rt, slots, origin) else {
            trace!("binding origin for `{member}` not reachable, skipped");
            return;
        };
        let resolved: Vec<(R::Object, &Follower)> = followers
            .iter()
            .filter_map(|f| self.endpoint(rt, slots, &f.endpoint).map(|o| (o, f)))
            .collect();
        if resolved.is_empty() {
            return;
        }

        if let Some(current) = rt.get_member_value(&source, member) {
            for (obj, f) in resolved.iter().filter(|(_, f)| f.initialize) {
                if let Some(v) = current.coerce(&f.kind) {
                    rt.set_member_value(obj, &f.member, v);
                }
            }
        }

        let targets: Vec<(R::Object, String, ValueKind)> = resolved
            .into_iter()
            .map(|(o, f)| (o, f.member.clone(), f.kind.clone()))
            .collect();
        let handler: ChangeHandler<R> = Arc::new(move |rt: &R, value: &Value| {
            for (obj, member, kind) in &targets {
                if let Some(v) = value.coerce(kind) {
                    rt.set_member_value(obj, member, v);
                }
            }
        });
        rt.watch(&source, member, handler);
    }

    #[allow(clippy::too_many_arguments)]
    fn bind_route<R: Runtime>(
        &self,
        rt: &R,
        sender: &R::Object,
        member: &str,
        kind: &ValueKind,
        dest: R::Object,
        terminal: &str,
        two_way: bool,
    ) {
        if let Some(v) = rt.get_member_value(&dest, terminal).and_then(|v| v.coerce(kind)) {
            rt.set_member_value(sender, member, v);
        }

        let (obj, m, k) = (sender.clone(), member.to_string(), kind.clone());
        let forward: ChangeHandler<R> = Arc::new(move |rt: &R, value: &Value| {
            if let Some(v) = value.coerce(&k) {
                rt.set_member_value(&obj, &m, v);
            }
        });
        rt.watch(&dest, terminal, forward);

        if two_way {
            let back_kind = member_kind(rt, &self.catalog, &dest, terminal);
            let (obj, m) = (dest, terminal.to_string());
            let back: ChangeHandler<R> = Arc::new(move |rt: &R, value: &Value| {
                if let Some(v) = value.coerce(&back_kind) {
                    rt.set_member_value(&obj, &m, v);
                }
            });
            rt.watch(sender, member, back);
        }
    }

    fn endpoint<R: Runtime>(&self, rt: &R, slots: &[Option<R::Object>], endpoint: &Endpoint) -> Option<R::Object> {
        match endpoint {
            Endpoint::Slot(s) => get(slots, *s).cloned(),
            Endpoint::TemplateRootOf(s) => ascend_to_template_root(rt, &self.catalog, get(slots, *s)?),
        }
    }
}

fn get<O>(slots: &[Option<O>], slot: Slot) -> Option<&O> {
    slots.get(slot)?.as_ref()
}

/// First logical ancestor whose type is a templated control.
fn ascend_to_template_root<R: Runtime>(rt: &R, catalog: &TypeCatalog, start: &R::Object) -> Option<R::Object> {
    let mut current = rt.logical_parent(start)?;
    loop {
        if catalog.is_templated(&rt.type_name(&current)) {
            return Some(current);
        }
        current = rt.logical_parent(&current)?;
    }
}

fn member_kind<R: Runtime>(rt: &R, catalog: &TypeCatalog, obj: &R::Object, member: &str) -> ValueKind {
    catalog
        .member(&rt.type_name(obj), member)
        .and_then(|m| m.value_kind().cloned())
        .unwrap_or(ValueKind::Any)
}

impl Route {
    /// Walks to the member this route names. Any missing hop ends the walk
    /// with `None`.
    fn locate<'r, R: Runtime>(
        &'r self,
        rt: &R,
        catalog: &TypeCatalog,
        scope: &Scope<'_, R::Object>,
    ) -> Option<(R::Object, &'r str)> {
        let mut current = match &self.origin {
            Origin::Sender(Hops::Up(n)) => {
                let mut obj = scope.sender.clone();
                for _ in 0..*n {
                    obj = rt.logical_parent(&obj)?;
                }
                obj
            }
            Origin::Sender(Hops::TemplateRoot) => ascend_to_template_root(rt, catalog, scope.sender)?,
            Origin::Sender(Hops::DataSource) | Origin::DataSource => scope.data_source?.clone(),
            Origin::Slot(s) => get(scope.slots, *s)?.clone(),
        };
        if let Some(name) = &self.name {
            current = rt.find_descendant_by_name(&current, name)?;
        }
        let (terminal, interior) = self.members.split_last()?;
        for segment in interior {
            current = rt.get_member_object(&current, segment)?;
        }
        Some((current, terminal.as_str()))
    }
}

impl Setter {
    fn apply<R: Runtime>(&self, rt: &R, catalog: &TypeCatalog, sender: &R::Object) {
        let scope = Scope { sender, data_source: None, slots: &[] };
        let Some((obj, member)) = self.target.locate(rt, catalog, &scope) else { return };
        let kind = member_kind(rt, catalog, &obj, member);
        let value = match &self.value {
            SetterValue::Text(text) => Value::Str(text.clone()).coerce(&kind),
            SetterValue::Literal(text) => kind.parse_literal(text),
            SetterValue::Read(route) => route
                .locate(rt, catalog, &scope)
                .and_then(|(src, m)| rt.get_member_value(&src, m))
                .and_then(|v| v.coerce(&kind)),
        };
        match value {
            Some(v) => rt.set_member_value(&obj, member, v),
            None => trace!("assignment to `{member}` skipped: no usable value"),
        }
    }
}

// ── Display ───────────────────────────────────────────────────────────────

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.origin {
            Origin::Sender(Hops::Up(n)) => write!(f, "up({n})")?,
            Origin::Sender(Hops::TemplateRoot) => f.write_str("template-root")?,
            Origin::Sender(Hops::DataSource) | Origin::DataSource => f.write_str("data-source")?,
            Origin::Slot(s) => write!(f, "#{s}")?,
        }
        if let Some(name) = &self.name {
            write!(f, " [{name}]")?;
        }
        for m in &self.members {
            write!(f, ".{m}")?;
        }
        Ok(())
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Slot(s) => write!(f, "#{s}"),
            Endpoint::TemplateRootOf(s) => write!(f, "template-root(#{s})"),
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Op::New { slot, ty } => write!(f, "new      #{slot} {}", ty.name),
            Op::SetLiteral { slot, member, value } => write!(f, "set      #{slot}.{member} = {value:?}"),
            Op::Attach { parent, child, kind } => write!(f, "attach   #{child} -> #{parent} ({kind:?})"),
            Op::LoadTemplate { slot, path } => write!(f, "template #{slot} <- {path:?}"),
            Op::AddItemTemplate { slot, data_type, template } => write!(
                f,
                "items    #{slot} [{data_type}] <{}> ({} ops)",
                template.root_type.name,
                template.ops.len()
            ),
            Op::LoadItemTemplate { slot, data_type, path } => write!(f, "items    #{slot} [{data_type}] <- {path:?}"),
            Op::Bind { origin, member, followers } => {
                write!(f, "bind     {origin}.{member} =>")?;
                for t in followers {
                    write!(f, " {}.{}{}", t.endpoint, t.member, if t.initialize { "" } else { " (listen)" })?;
                }
                Ok(())
            }
            Op::BindRoute { slot, member, route, two_way, .. } => {
                let arrow = if *two_way { "<=>" } else { "<=" };
                write!(f, "bind     #{slot}.{member} {arrow} {route}")
            }
            Op::AddHandler { source, event, target, .. } => write!(f, "handler  #{source}.{event} -> {target}"),
            Op::AddSetters { source, event, setters, .. } => {
                write!(f, "handler  #{source}.{event} -> {} assignment(s)", setters.len())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::compiler::Compiler;
    use crate::testing::{MockRuntime, Obj, catalog};

    fn setup(src: &str) -> (MockRuntime, Instantiator) {
        let catalog = Arc::new(catalog());
        let inst = Compiler::new(Arc::clone(&catalog)).compile_str(src).unwrap();
        (MockRuntime::new(catalog), inst)
    }

    /// (type, children) shape of a tree
    fn shape(rt: &MockRuntime, obj: &Obj) -> String {
        let kids: Vec<String> = rt.children(obj).iter().map(|c| shape(rt, c)).collect();
        format!("{}[{}]", rt.type_name(obj), kids.join(","))
    }

    #[test]
    fn each_invocation_builds_a_distinct_tree() {
        let (rt, inst) = setup(r#"<Column><Label Text="a"/><Row><Label/></Row></Column>"#);
        let a = inst.create(&rt);
        let b = inst.create(&rt);
        assert_ne!(a, b);
        assert_eq!(shape(&rt, &a), "Column[Label[],Row[Label[]]]");
        assert_eq!(shape(&rt, &a), shape(&rt, &b));
        assert_ne!(rt.children(&a)[0], rt.children(&b)[0]);
    }

    fn text_after_hops(hops: &str) -> (Value, usize) {
        let src = format!(
            r#"<Column Tag="top"><Row Tag="middle"><Label Tag="self" Text="{{{hops}Tag}}"/></Row></Column>"#
        );
        let (rt, inst) = setup(&src);
        let root = inst.create(&rt);
        let label = rt.children(&rt.children(&root)[0])[0].clone();
        (rt.value(&label, "Text"), rt.parent_lookups())
    }

    #[test]
    fn relative_hops_walk_exactly_n_parents() {
        assert_eq!(text_after_hops("."), (Value::Str("self".into()), 0));
        assert_eq!(text_after_hops("../"), (Value::Str("middle".into()), 1));
        assert_eq!(text_after_hops("../../"), (Value::Str("top".into()), 2));
        // the third hop finds nothing: no wiring, no panic
        assert_eq!(text_after_hops("../../../"), (Value::Str(String::new()), 3));
    }

    #[test]
    fn bindings_follow_changes() {
        let (rt, inst) = setup(r#"<Column><Label Name="L"/><Button IsEnabled="{/L.IsVisible}"/></Column>"#);
        let root = inst.create(&rt);
        let kids = rt.children(&root);
        assert_eq!(rt.value(&kids[1], "IsEnabled"), Value::Bool(true));
        rt.set_member_value(&kids[0], "IsVisible", Value::Bool(false));
        assert_eq!(rt.value(&kids[1], "IsEnabled"), Value::Bool(false));
    }

    #[test]
    fn two_way_bindings_settle() {
        let (rt, inst) = setup(r#"<Column><Slider Name="S" Value="1"/><Slider Value="{²/S.Value}"/></Column>"#);
        let root = inst.create(&rt);
        let kids = rt.children(&root);
        assert_eq!(rt.value(&kids[1], "Value"), Value::Float(1.0));
        rt.set_member_value(&kids[1], "Value", Value::Float(5.0));
        assert_eq!(rt.value(&kids[0], "Value"), Value::Float(5.0));
        rt.set_member_value(&kids[0], "Value", Value::Int(7));
        assert_eq!(rt.value(&kids[1], "Value"), Value::Float(7.0));
    }

    #[test]
    fn owner_is_attached_before_wiring() {
        let (rt, inst) = setup(r#"<Label Text="{/Caption}"/>"#);
        let host = rt.make("Expander");
        rt.set_member_value(&host, "Caption", Value::Str("hello".into()));
        let owner = Owner { object: &host, kind: AttachKind::SetTemplateRoot };
        let label = inst.instantiate(&rt, &InstantiationContext::new(), Some(owner));
        assert_eq!(rt.children(&host), [label.clone()]);
        assert_eq!(rt.value(&label, "Text"), Value::Str("hello".into()));
        rt.set_member_value(&host, "Caption", Value::Str("bye".into()));
        assert_eq!(rt.value(&label, "Text"), Value::Str("bye".into()));
    }

    struct Templates(HashMap<String, Arc<Instantiator>>);

    impl TemplateSource for Templates {
        fn template(&self, path: &str) -> Option<Arc<Instantiator>> {
            self.0.get(path).cloned()
        }
    }

    #[test]
    fn external_templates_load_through_the_context() {
        let (rt, inst) = setup(r#"<Expander Caption="hi" Template="expander.iml"/>"#);
        let (_, template) = setup(r#"<Label Text="{/Caption}"/>"#);
        let source = Templates(HashMap::from([("expander.iml".to_string(), Arc::new(template))]));
        let root = inst.instantiate(&rt, &InstantiationContext::new().with_templates(&source), None);
        let label = rt.children(&root)[0].clone();
        assert_eq!(rt.value(&label, "Text"), Value::Str("hi".into()));

        // a missing source leaves the control without a template
        let bare = inst.create(&rt);
        assert!(rt.children(&bare).is_empty());
    }

    #[test]
    fn external_templates_are_wired_after_the_host_tree() {
        let (rt, inst) = setup(r#"<Column Tag="outer"><Expander Template="e.iml"/></Column>"#);
        let (_, template) = setup(r#"<Row><Label Text="{../../../Tag}"/></Row>"#);
        let source = Templates(HashMap::from([("e.iml".to_string(), Arc::new(template))]));
        let root = inst.instantiate(&rt, &InstantiationContext::new().with_templates(&source), None);
        let expander = rt.children(&root)[0].clone();
        let label = rt.children(&rt.children(&expander)[0])[0].clone();
        assert_eq!(rt.value(&label, "Text"), Value::Str("outer".into()));
    }

    #[test]
    fn item_templates_resolve_by_path() {
        let (rt, inst) = setup(r#"<ListBox ItemTemplate="row.iml"/>"#);
        let (_, row) = setup(r#"<Label Text="{Title}"/>"#);
        let row = Arc::new(row);
        let source = Templates(HashMap::from([("row.iml".to_string(), Arc::clone(&row))]));
        inst.instantiate(&rt, &InstantiationContext::new().with_templates(&source), None);
        inst.create(&rt);
        let registered = rt.item_templates.lock();
        assert_eq!(registered.len(), 1);
        assert_eq!(registered[0].1, "default");
        assert!(Arc::ptr_eq(&registered[0].2, &row));
    }

    #[test]
    fn data_source_bindings_and_handlers() {
        let (rt, inst) = setup(r#"<Button Text="{Title}" Clicked="onClick"/>"#);
        let controller = rt.make("Controller");
        rt.set_member_value(&controller, "Title", Value::Str("Save".into()));
        let ctx = InstantiationContext::new().with_data_source(controller.clone());
        let button = inst.instantiate(&rt, &ctx, None);
        assert_eq!(rt.value(&button, "Text"), Value::Str("Save".into()));
        rt.raise(&button, "Clicked");
        assert_eq!(*rt.calls.lock(), [format!("onClick@{}", controller.0)]);

        // without a data source nothing is wired
        let plain = inst.create(&rt);
        assert_eq!(rt.value(&plain, "Text"), Value::Str(String::new()));
        rt.raise(&plain, "Clicked");
        assert_eq!(rt.calls.lock().len(), 1);
    }

    #[test]
    fn assignment_handlers_run_on_the_sender() {
        let (rt, inst) = setup(
            r#"<Column Tag="x"><Button Clicked="{../IsVisible='false'; Text=../Tag; Width=40}"/></Column>"#,
        );
        let root = inst.create(&rt);
        let button = rt.children(&root)[0].clone();
        rt.raise(&button, "Clicked");
        assert_eq!(rt.value(&root, "IsVisible"), Value::Bool(false));
        assert_eq!(rt.value(&button, "Text"), Value::Str("x".into()));
        assert_eq!(rt.value(&button, "Width"), Value::Float(40.0));
    }

    #[test]
    fn item_templates_are_registered_per_invocation() {
        let (rt, inst) = setup(r#"<ListBox><ItemTemplate DataType="Controller"><Label Text="{Title}"/></ItemTemplate></ListBox>"#);
        inst.create(&rt);
        inst.create(&rt);
        let registered = rt.item_templates.lock();
        assert_eq!(registered.len(), 2);
        assert!(Arc::ptr_eq(&registered[0].2, &registered[1].2));
        assert_eq!(registered[0].1, "Controller");
    }

    #[test]
    fn instantiators_are_shareable_across_threads() {
        let (rt, inst) = setup(r#"<Column><Label Name="L"/><Button IsEnabled="{/L.IsVisible}"/></Column>"#);
        let (rt, inst) = (Arc::new(rt), Arc::new(inst));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let (rt, inst) = (Arc::clone(&rt), Arc::clone(&inst));
                std::thread::spawn(move || {
                    let root = inst.create(&*rt);
                    rt.children(&root).len()
                })
            })
            .collect();
        for h in handles {
            assert_eq!(h.join().unwrap(), 2);
        }
    }
}
