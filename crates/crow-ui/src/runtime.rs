//! The reference widget tree behind compiled instantiators.
//!
//! [`UiRuntime`] owns every widget in an arena and implements
//! [`crow_iml::Runtime`], so any instantiator compiled against its catalog
//! can build trees in it. Bindings are plain value watches; events are lists
//! of [`Delegate`]s invoked by [`UiRuntime::raise`].
//!
//! Locks are never held while user code runs: watchers, native methods and
//! assignment closures all see a runtime they can freely read and write.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crow_iml::{
    AttachKind, ChangeHandler, DEFAULT_DATA_TYPE, HandlerFn, InstantiationContext, Instantiator, Owner, Runtime,
    TypeCatalog, TypeDescriptor, Value,
};
use indexmap::IndexMap;
use log::{debug, trace, warn};
use parking_lot::RwLock;

use crate::element::{Element, WidgetData};
use crate::event::{Delegate, EventResult, MethodFn};
use crate::widgets;

// ── Stats ─────────────────────────────────────────────────────────────────

/// Counters over the runtime's lifetime.
#[derive(Debug, Default)]
pub struct RuntimeStats {
    instances: AtomicUsize,
    parent_lookups: AtomicUsize,
    method_calls: AtomicUsize,
}

impl RuntimeStats {
    pub fn instances(&self) -> usize {
        self.instances.load(Ordering::Relaxed)
    }

    /// Logical-parent steps taken by binding navigation.
    pub fn parent_lookups(&self) -> usize {
        self.parent_lookups.load(Ordering::Relaxed)
    }

    pub fn method_calls(&self) -> usize {
        self.method_calls.load(Ordering::Relaxed)
    }
}

// ── UiRuntime ─────────────────────────────────────────────────────────────

pub struct UiRuntime {
    catalog: Arc<TypeCatalog>,
    widgets: RwLock<Vec<WidgetData>>,
    watchers: RwLock<HashMap<(Element, String), Vec<ChangeHandler<UiRuntime>>>>,
    /// Native method implementations keyed by (declaring type, method).
    methods: RwLock<HashMap<(String, String), MethodFn>>,
    item_templates: RwLock<HashMap<Element, IndexMap<String, Arc<Instantiator>>>>,
    stats: RuntimeStats,
}

impl UiRuntime {
    /// A runtime with the standard widget methods installed.
    pub fn new(catalog: Arc<TypeCatalog>) -> Self {
        let rt = Self {
            catalog,
            widgets: RwLock::new(Vec::new()),
            watchers: RwLock::new(HashMap::new()),
            methods: RwLock::new(HashMap::new()),
            item_templates: RwLock::new(HashMap::new()),
            stats: RuntimeStats::default(),
        };
        widgets::install_methods(&rt);
        rt
    }

    /// Registers a native implementation for `type_name.method`; derived
    /// types inherit it.
    pub fn with_method(
        self,
        type_name: &str,
        method: &str,
        f: impl Fn(&UiRuntime, Element, Element) + Send + Sync + 'static,
    ) -> Self {
        self.register_method(type_name, method, f);
        self
    }

    pub fn register_method(
        &self,
        type_name: &str,
        method: &str,
        f: impl Fn(&UiRuntime, Element, Element) + Send + Sync + 'static,
    ) {
        self.methods.write().insert((type_name.to_string(), method.to_string()), Arc::new(f));
    }

    pub fn catalog(&self) -> &Arc<TypeCatalog> {
        &self.catalog
    }

    pub fn stats(&self) -> &RuntimeStats {
        &self.stats
    }

    /// Number of widgets created so far.
    pub fn len(&self) -> usize {
        self.widgets.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Creates a detached widget of a catalog type, e.g. a data item.
    pub fn make(&self, type_name: &str) -> Option<Element> {
        let ty = self.catalog.resolve(type_name)?;
        Some(self.create_instance(&ty))
    }

    // ── Tree queries ──────────────────────────────────────────────────────

    fn read<T>(&self, e: Element, f: impl FnOnce(&WidgetData) -> T) -> Option<T> {
        self.widgets.read().get(e.index()).map(f)
    }

    pub fn parent(&self, e: Element) -> Option<Element> {
        self.read(e, |w| w.parent).flatten()
    }

    pub fn children(&self, e: Element) -> Vec<Element> {
        self.read(e, |w| w.children.iter().map(|(_, c)| *c).collect()).unwrap_or_default()
    }

    pub fn attached(&self, e: Element) -> Vec<(AttachKind, Element)> {
        self.read(e, |w| w.children.clone()).unwrap_or_default()
    }

    pub fn content(&self, e: Element) -> Option<Element> {
        self.read(e, |w| w.single(AttachKind::SetSingleChild)).flatten()
    }

    pub fn template_root(&self, e: Element) -> Option<Element> {
        self.read(e, |w| w.single(AttachKind::SetTemplateRoot)).flatten()
    }

    /// Children of a templated group, static ones and populated rows alike.
    pub fn items(&self, e: Element) -> Vec<Element> {
        self.read(e, |w| {
            w.children
                .iter()
                .filter(|(k, _)| *k == AttachKind::AppendTemplatedItem)
                .map(|(_, c)| *c)
                .collect()
        })
        .unwrap_or_default()
    }

    /// Current value of `member`, `Null` when the widget has none.
    pub fn value(&self, e: Element, member: &str) -> Value {
        self.get_member_value(&e, member).unwrap_or(Value::Null)
    }

    /// Members whose value differs from the type's initial value.
    pub fn changed_values(&self, e: Element) -> Vec<(String, Value)> {
        let Some((ty, values)) = self.read(e, |w| (Arc::clone(&w.ty), w.values.clone())) else {
            return Vec::new();
        };
        values
            .into_iter()
            .filter(|(name, v)| {
                self.catalog.find_member(&ty, name).and_then(|m| m.initial_value()).as_ref() != Some(v)
            })
            .collect()
    }

    /// Stores an object-valued member, reachable as an interior path segment.
    pub fn set_object(&self, e: Element, member: &str, object: Element) {
        if let Some(w) = self.widgets.write().get_mut(e.index()) {
            w.objects.insert(member.to_string(), object);
        }
    }

    pub fn handlers(&self, e: Element, event: &str) -> Vec<Delegate> {
        self.read(e, |w| w.handlers.iter().filter(|(n, _)| n == event).map(|(_, d)| d.clone()).collect())
            .unwrap_or_default()
    }

    /// Event name of every attached handler, in attach order.
    pub fn event_names(&self, e: Element) -> Vec<String> {
        self.read(e, |w| w.handlers.iter().map(|(n, _)| n.clone()).collect()).unwrap_or_default()
    }

    // ── Events ────────────────────────────────────────────────────────────

    /// Fires `event` on `sender`, running its handlers in attach order.
    pub fn raise(&self, sender: Element, event: &str) -> EventResult {
        let delegates = self.handlers(sender, event);
        if delegates.is_empty() {
            return EventResult::Ignored;
        }
        trace!("{sender}.{event}: {} handler(s)", delegates.len());
        for delegate in delegates {
            match delegate {
                Delegate::Method { target, method, .. } => self.invoke(target, &method, sender),
                Delegate::Closure { f, .. } => f(self, &sender),
            }
        }
        EventResult::Consumed
    }

    /// Calls the native implementation of `method` on `target`.
    pub fn invoke(&self, target: Element, method: &str, sender: Element) {
        let type_name = self.type_name(&target);
        match self.find_method(&type_name, method) {
            Some(f) => {
                self.stats.method_calls.fetch_add(1, Ordering::Relaxed);
                f(self, target, sender);
            }
            None => debug!("`{type_name}.{method}` has no implementation"),
        }
    }

    fn find_method(&self, type_name: &str, method: &str) -> Option<MethodFn> {
        let methods = self.methods.read();
        let lookup = |t: &str| methods.get(&(t.to_string(), method.to_string())).cloned();
        match self.catalog.resolve(type_name) {
            Some(ty) => self.catalog.lineage(&ty).into_iter().find_map(|t| lookup(&t.name)),
            None => lookup(type_name),
        }
    }

    // ── Item templates ────────────────────────────────────────────────────

    pub fn item_template(&self, list: Element, data_type: &str) -> Option<Arc<Instantiator>> {
        self.item_templates.read().get(&list)?.get(data_type).cloned()
    }

    /// Template for a data item: the most derived registered type in the
    /// item's lineage, then the default template.
    fn template_for(&self, list: Element, item: Element) -> Option<Arc<Instantiator>> {
        let templates = self.item_templates.read();
        let registered = templates.get(&list)?;
        let type_name = self.type_name(&item);
        let lineage: Vec<String> = match self.catalog.resolve(&type_name) {
            Some(ty) => self.catalog.lineage(&ty).iter().map(|t| t.name.clone()).collect(),
            None => vec![type_name],
        };
        lineage
            .iter()
            .find_map(|t| registered.get(t))
            .or_else(|| registered.get(DEFAULT_DATA_TYPE))
            .cloned()
    }

    /// Instantiates one row per data item under `list` and returns the rows.
    /// Items without a matching template are skipped.
    pub fn populate(&self, list: Element, items: &[Element]) -> Vec<Element> {
        let mut rows = Vec::with_capacity(items.len());
        for &item in items {
            let Some(template) = self.template_for(list, item) else {
                warn!("{list}: no item template for <{}>", self.type_name(&item));
                continue;
            };
            let ctx = InstantiationContext::new().with_data_source(item);
            let owner = Owner { object: &list, kind: AttachKind::AppendTemplatedItem };
            rows.push(template.instantiate(self, &ctx, Some(owner)));
        }
        debug!("{list}: populated {} of {} item(s)", rows.len(), items.len());
        rows
    }

    /// Detaches every item of a templated group.
    pub fn clear_items(&self, list: Element) {
        let mut widgets = self.widgets.write();
        let Some(w) = widgets.get_mut(list.index()) else { return };
        let (items, rest): (Vec<_>, Vec<_>) =
            w.children.drain(..).partition(|(k, _)| *k == AttachKind::AppendTemplatedItem);
        w.children = rest;
        for (_, item) in items {
            if let Some(child) = widgets.get_mut(item.index()) {
                child.parent = None;
            }
        }
    }
}

// ── Runtime surface ───────────────────────────────────────────────────────

impl Runtime for UiRuntime {
    type Object = Element;
    type Delegate = Delegate;

    fn create_instance(&self, ty: &TypeDescriptor) -> Element {
        let values: IndexMap<String, Value> = self
            .catalog
            .members_of(ty)
            .iter()
            .filter_map(|m| Some((m.name.clone(), m.initial_value()?)))
            .collect();
        // an unregistered descriptor still gets its own declared defaults
        let ty = self.catalog.resolve(&ty.name).unwrap_or_else(|| Arc::new(ty.clone()));
        let mut widgets = self.widgets.write();
        widgets.push(WidgetData::new(ty, values));
        self.stats.instances.fetch_add(1, Ordering::Relaxed);
        Element((widgets.len() - 1) as u32)
    }

    fn type_name(&self, e: &Element) -> String {
        self.read(*e, |w| w.ty.name.clone()).unwrap_or_default()
    }

    fn attach(&self, parent: &Element, child: &Element, kind: AttachKind) {
        let (parent, child) = (*parent, *child);
        let mut widgets = self.widgets.write();
        if widgets.get(parent.index()).is_none() || widgets.get(child.index()).is_none() {
            return;
        }
        if let Some(old) = widgets[child.index()].parent {
            widgets[old.index()].children.retain(|(_, c)| *c != child);
        }
        if !kind.is_list() {
            let replaced = widgets[parent.index()].single(kind);
            if let Some(prev) = replaced {
                widgets[parent.index()].children.retain(|(_, c)| *c != prev);
                widgets[prev.index()].parent = None;
            }
        }
        widgets[parent.index()].children.push((kind, child));
        widgets[child.index()].parent = Some(parent);
    }

    fn find_descendant_by_name(&self, root: &Element, name: &str) -> Option<Element> {
        let widgets = self.widgets.read();
        let mut queue: VecDeque<Element> = widgets.get(root.index())?.children.iter().map(|(_, c)| *c).collect();
        while let Some(e) = queue.pop_front() {
            let w = widgets.get(e.index())?;
            if w.values.get("Name").and_then(Value::as_str) == Some(name) {
                return Some(e);
            }
            queue.extend(w.children.iter().map(|(_, c)| *c));
        }
        None
    }

    fn logical_parent(&self, e: &Element) -> Option<Element> {
        self.stats.parent_lookups.fetch_add(1, Ordering::Relaxed);
        self.parent(*e)
    }

    fn get_member_value(&self, e: &Element, member: &str) -> Option<Value> {
        self.read(*e, |w| w.values.get(member).cloned()).flatten()
    }

    fn set_member_value(&self, e: &Element, member: &str, value: Value) {
        {
            let mut widgets = self.widgets.write();
            let Some(w) = widgets.get_mut(e.index()) else { return };
            if w.values.get(member) == Some(&value) {
                return;
            }
            w.values.insert(member.to_string(), value.clone());
        }
        let watchers = self.watchers.read().get(&(*e, member.to_string())).cloned().unwrap_or_default();
        for watcher in watchers {
            watcher(self, &value);
        }
    }

    fn get_member_object(&self, e: &Element, member: &str) -> Option<Element> {
        self.read(*e, |w| w.objects.get(member).copied()).flatten()
    }

    fn watch(&self, e: &Element, member: &str, handler: ChangeHandler<Self>) {
        self.watchers.write().entry((*e, member.to_string())).or_default().push(handler);
    }

    fn create_delegate(&self, handler_type: &str, target: &Element, method: &str) -> Option<Delegate> {
        let type_name = self.type_name(target);
        let declared = self.catalog.member(&type_name, method).is_some_and(|m| m.is_method());
        if !declared && self.find_method(&type_name, method).is_none() {
            return None;
        }
        Some(Delegate::Method { handler_type: handler_type.to_string(), target: *target, method: method.to_string() })
    }

    fn closure_delegate(&self, handler_type: &str, handler: HandlerFn<Self>) -> Delegate {
        Delegate::Closure { handler_type: handler_type.to_string(), f: handler }
    }

    fn add_event_handler(&self, source: &Element, event: &str, delegate: Delegate) {
        if let Some(w) = self.widgets.write().get_mut(source.index()) {
            w.handlers.push((event.to_string(), delegate));
        }
    }

    fn add_item_template(&self, control: &Element, data_type: &str, template: Arc<Instantiator>) {
        self.item_templates.write().entry(*control).or_default().insert(data_type.to_string(), template);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::widgets::standard_catalog;

    fn runtime() -> UiRuntime {
        UiRuntime::new(Arc::new(standard_catalog()))
    }

    #[test]
    fn instances_start_from_catalog_defaults() {
        let rt = runtime();
        let slider = rt.make("Slider").unwrap();
        assert_eq!(rt.value(slider, "IsVisible"), Value::Bool(true));
        assert_eq!(rt.value(slider, "Maximum"), Value::Float(100.0));
        assert!(rt.changed_values(slider).is_empty());
        assert!(rt.make("Nope").is_none());
    }

    #[test]
    fn single_child_attachment_replaces() {
        let rt = runtime();
        let border = rt.make("Border").unwrap();
        let (a, b) = (rt.make("Label").unwrap(), rt.make("Label").unwrap());
        rt.attach(&border, &a, AttachKind::SetSingleChild);
        rt.attach(&border, &b, AttachKind::SetSingleChild);
        assert_eq!(rt.content(border), Some(b));
        assert_eq!(rt.parent(a), None);
        assert_eq!(rt.children(border), [b]);
    }

    #[test]
    fn reattaching_moves_the_child() {
        let rt = runtime();
        let (c1, c2) = (rt.make("Column").unwrap(), rt.make("Column").unwrap());
        let label = rt.make("Label").unwrap();
        rt.attach(&c1, &label, AttachKind::AppendChild);
        rt.attach(&c2, &label, AttachKind::AppendChild);
        assert!(rt.children(c1).is_empty());
        assert_eq!(rt.parent(label), Some(c2));
    }

    #[test]
    fn equal_values_do_not_notify() {
        let rt = runtime();
        let label = rt.make("Label").unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        rt.watch(&label, "Text", Arc::new(move |_: &UiRuntime, _: &Value| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        rt.set_member_value(&label, "Text", Value::Str("a".into()));
        rt.set_member_value(&label, "Text", Value::Str("a".into()));
        rt.set_member_value(&label, "Text", Value::Str("b".into()));
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn named_lookup_is_breadth_first() {
        let rt = runtime();
        let root = rt.make("Column").unwrap();
        let row = rt.make("Row").unwrap();
        let deep = rt.make("Label").unwrap();
        let shallow = rt.make("Label").unwrap();
        rt.set_member_value(&deep, "Name", Value::Str("L".into()));
        rt.set_member_value(&shallow, "Name", Value::Str("L".into()));
        rt.attach(&root, &row, AttachKind::AppendChild);
        rt.attach(&row, &deep, AttachKind::AppendChild);
        rt.attach(&root, &shallow, AttachKind::AppendChild);
        assert_eq!(rt.find_descendant_by_name(&root, "L"), Some(shallow));
        assert_eq!(rt.find_descendant_by_name(&root, "M"), None);
    }

    #[test]
    fn inherited_methods_dispatch() {
        let rt = runtime();
        let button = rt.make("Button").unwrap();
        let delegate = rt.create_delegate("EventHandler", &button, "ToggleVisibility").unwrap();
        rt.add_event_handler(&button, "Clicked", delegate);
        assert!(rt.create_delegate("EventHandler", &button, "Explode").is_none());

        assert!(rt.raise(button, "Clicked").is_consumed());
        assert_eq!(rt.value(button, "IsVisible"), Value::Bool(false));
        assert_eq!(rt.raise(button, "Hovered"), EventResult::Ignored);
        assert_eq!(rt.stats().method_calls(), 1);
    }

    #[test]
    fn clear_items_detaches_rows() {
        let rt = runtime();
        let list = rt.make("ListBox").unwrap();
        let row = rt.make("Label").unwrap();
        let header = rt.make("Label").unwrap();
        rt.attach(&list, &header, AttachKind::SetTemplateRoot);
        rt.attach(&list, &row, AttachKind::AppendTemplatedItem);
        rt.clear_items(list);
        assert!(rt.items(list).is_empty());
        assert_eq!(rt.template_root(list), Some(header));
        assert_eq!(rt.parent(row), None);
    }
}
