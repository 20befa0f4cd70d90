//! Test fixtures: a small catalog and a recording runtime.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

use crate::catalog::{AttachKind, Capability, TypeCatalog, TypeDescriptor};
use crate::instantiator::Instantiator;
use crate::runtime::{ChangeHandler, HandlerFn, Runtime};
use crate::value::{Value, ValueKind};

pub fn catalog() -> TypeCatalog {
    TypeCatalog::new()
        .with_type(
            TypeDescriptor::new("Widget", Capability::Leaf)
                .property("Name", ValueKind::Str, "")
                .property_default("IsVisible", ValueKind::Bool, Value::Bool(true), "")
                .property_default("IsEnabled", ValueKind::Bool, Value::Bool(true), "")
                .property("Tag", ValueKind::Any, "")
                .property("Width", ValueKind::Float, "")
                .property("Background", ValueKind::Color, "")
                .method("Hide", ""),
        )
        .with_type(
            TypeDescriptor::new("Label", Capability::Leaf)
                .base("Widget")
                .content("Text")
                .property("Text", ValueKind::Str, ""),
        )
        .with_type(
            TypeDescriptor::new("Button", Capability::Leaf)
                .base("Widget")
                .property("Text", ValueKind::Str, "")
                .event("Clicked", "EventHandler", ""),
        )
        .with_type(TypeDescriptor::new("Slider", Capability::Leaf).base("Widget").property("Value", ValueKind::Float, ""))
        .with_type(TypeDescriptor::new("Column", Capability::Group).base("Widget"))
        .with_type(TypeDescriptor::new("Row", Capability::Group).base("Widget"))
        .with_type(TypeDescriptor::new("Border", Capability::Container).base("Widget"))
        .with_type(
            TypeDescriptor::new("Expander", Capability::TemplatedContainer)
                .base("Widget")
                .property("Caption", ValueKind::Str, ""),
        )
        .with_type(TypeDescriptor::new("ListBox", Capability::TemplatedGroup).base("Widget"))
        .with_type(
            TypeDescriptor::new("Controller", Capability::Leaf)
                .property("Title", ValueKind::Str, "")
                .method("onClick", ""),
        )
}

// ── Recording runtime ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Obj(pub usize);

#[derive(Clone)]
pub enum MockDelegate {
    Method { target: usize, method: String },
    Closure(HandlerFn<MockRuntime>),
}

#[derive(Default)]
struct Entry {
    ty: String,
    parent: Option<usize>,
    children: Vec<usize>,
    props: HashMap<String, Value>,
    handlers: Vec<(String, MockDelegate)>,
}

pub struct MockRuntime {
    catalog: Arc<TypeCatalog>,
    objects: Mutex<Vec<Entry>>,
    watchers: Mutex<Vec<(usize, String, ChangeHandler<MockRuntime>)>>,
    pub parent_lookups: AtomicUsize,
    /// Method delegates invoked so far, as `method@id`.
    pub calls: Mutex<Vec<String>>,
    pub item_templates: Mutex<Vec<(usize, String, Arc<Instantiator>)>>,
}

impl MockRuntime {
    pub fn new(catalog: Arc<TypeCatalog>) -> Self {
        Self {
            catalog,
            objects: Mutex::new(Vec::new()),
            watchers: Mutex::new(Vec::new()),
            parent_lookups: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
            item_templates: Mutex::new(Vec::new()),
        }
    }

    pub fn make(&self, type_name: &str) -> Obj {
        let ty = self.catalog.resolve(type_name).unwrap();
        self.create_instance(&ty)
    }

    pub fn children(&self, obj: &Obj) -> Vec<Obj> {
        self.objects.lock()[obj.0].children.iter().map(|&c| Obj(c)).collect()
    }

    pub fn value(&self, obj: &Obj, member: &str) -> Value {
        self.get_member_value(obj, member).unwrap_or(Value::Null)
    }

    pub fn parent_lookups(&self) -> usize {
        self.parent_lookups.load(Ordering::SeqCst)
    }

    pub fn raise(&self, obj: &Obj, event: &str) {
        let delegates: Vec<MockDelegate> = self.objects.lock()[obj.0]
            .handlers
            .iter()
            .filter(|(e, _)| e == event)
            .map(|(_, d)| d.clone())
            .collect();
        for d in delegates {
            match d {
                MockDelegate::Method { target, method } => self.calls.lock().push(format!("{method}@{target}")),
                MockDelegate::Closure(f) => f(self, obj),
            }
        }
    }
}

impl Runtime for MockRuntime {
    type Object = Obj;
    type Delegate = MockDelegate;

    fn create_instance(&self, ty: &TypeDescriptor) -> Obj {
        let props = self
            .catalog
            .members_of(ty)
            .iter()
            .filter_map(|m| Some((m.name.clone(), m.initial_value()?)))
            .collect();
        let mut objects = self.objects.lock();
        objects.push(Entry { ty: ty.name.clone(), props, ..Entry::default() });
        Obj(objects.len() - 1)
    }

    fn type_name(&self, obj: &Obj) -> String {
        self.objects.lock()[obj.0].ty.clone()
    }

    fn attach(&self, parent: &Obj, child: &Obj, _kind: AttachKind) {
        let mut objects = self.objects.lock();
        objects[parent.0].children.push(child.0);
        objects[child.0].parent = Some(parent.0);
    }

    fn find_descendant_by_name(&self, root: &Obj, name: &str) -> Option<Obj> {
        let objects = self.objects.lock();
        let mut stack = objects[root.0].children.clone();
        while let Some(id) = stack.pop() {
            if objects[id].props.get("Name").and_then(Value::as_str) == Some(name) {
                return Some(Obj(id));
            }
            stack.extend(objects[id].children.iter().copied());
        }
        None
    }

    fn logical_parent(&self, obj: &Obj) -> Option<Obj> {
        self.parent_lookups.fetch_add(1, Ordering::SeqCst);
        self.objects.lock()[obj.0].parent.map(Obj)
    }

    fn get_member_value(&self, obj: &Obj, member: &str) -> Option<Value> {
        self.objects.lock()[obj.0].props.get(member).cloned()
    }

    fn set_member_value(&self, obj: &Obj, member: &str, value: Value) {
        {
            let mut objects = self.objects.lock();
            let props = &mut objects[obj.0].props;
            if props.get(member) == Some(&value) {
                return;
            }
            props.insert(member.to_string(), value.clone());
        }
        let watchers: Vec<ChangeHandler<MockRuntime>> = self
            .watchers
            .lock()
            .iter()
            .filter(|(id, m, _)| *id == obj.0 && m == member)
            .map(|(_, _, h)| Arc::clone(h))
            .collect();
        for w in watchers {
            w(self, &value);
        }
    }

    fn get_member_object(&self, _obj: &Obj, _member: &str) -> Option<Obj> {
        None
    }

    fn watch(&self, obj: &Obj, member: &str, handler: ChangeHandler<Self>) {
        self.watchers.lock().push((obj.0, member.to_string(), handler));
    }

    fn create_delegate(&self, _handler_type: &str, target: &Obj, method: &str) -> Option<MockDelegate> {
        let ty = self.type_name(target);
        self.catalog
            .member(&ty, method)
            .filter(|m| m.is_method())
            .map(|_| MockDelegate::Method { target: target.0, method: method.to_string() })
    }

    fn closure_delegate(&self, _handler_type: &str, handler: HandlerFn<Self>) -> MockDelegate {
        MockDelegate::Closure(handler)
    }

    fn add_event_handler(&self, source: &Obj, event: &str, delegate: MockDelegate) {
        self.objects.lock()[source.0].handlers.push((event.to_string(), delegate));
    }

    fn add_item_template(&self, control: &Obj, data_type: &str, template: Arc<Instantiator>) {
        self.item_templates.lock().push((control.0, data_type.to_string(), template));
    }
}
