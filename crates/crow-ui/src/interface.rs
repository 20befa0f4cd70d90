//! Loads, compiles and caches `.iml` documents.
//!
//! An [`Interface`] maps document paths to compiled [`Instantiator`]s. Each
//! path is compiled at most once per cache entry; concurrent first loads may
//! both compile, but only the first result is kept and every caller gets
//! that same `Arc`. It is also the [`TemplateSource`] handed to
//! instantiations, so `Template="path"` attributes resolve through the same
//! cache.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use crow_iml::{CompileOptions, Compiler, ImlError, InstantiationContext, Instantiator, Runtime, TemplateSource, TypeCatalog};
use log::{debug, warn};
use parking_lot::RwLock;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InterfaceError {
    #[error("cannot read `{path}`: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{path}: {source}")]
    Compile {
        path: String,
        #[source]
        source: ImlError,
    },
}

pub struct Interface {
    catalog: Arc<TypeCatalog>,
    options: CompileOptions,
    /// Directory relative paths are read from.
    root: Option<PathBuf>,
    cache: RwLock<HashMap<String, Arc<Instantiator>>>,
}

impl Interface {
    pub fn new(catalog: Arc<TypeCatalog>) -> Self {
        Self { catalog, options: CompileOptions::default(), root: None, cache: RwLock::new(HashMap::new()) }
    }

    pub fn with_options(mut self, options: CompileOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    pub fn catalog(&self) -> &Arc<TypeCatalog> {
        &self.catalog
    }

    /// Number of cached documents.
    pub fn len(&self) -> usize {
        self.cache.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, path: &str) -> bool {
        self.cache.read().contains_key(path)
    }

    /// Drops every cached instantiator. Trees already built are unaffected.
    pub fn clear(&self) {
        self.cache.write().clear();
    }

    /// Compiled document at `path`, reading and compiling it on first use.
    pub fn load(&self, path: &str) -> Result<Arc<Instantiator>, InterfaceError> {
        if let Some(hit) = self.cache.read().get(path) {
            return Ok(Arc::clone(hit));
        }
        let file = match &self.root {
            Some(root) => root.join(path),
            None => PathBuf::from(path),
        };
        let src = std::fs::read_to_string(&file)
            .map_err(|source| InterfaceError::Io { path: file.display().to_string(), source })?;
        self.insert(path, &src)
    }

    /// Compiles `src` and caches it under `path`, unless `path` is cached
    /// already. Lets documents be served from memory.
    pub fn load_str(&self, path: &str, src: &str) -> Result<Arc<Instantiator>, InterfaceError> {
        if let Some(hit) = self.cache.read().get(path) {
            return Ok(Arc::clone(hit));
        }
        self.insert(path, src)
    }

    fn insert(&self, path: &str, src: &str) -> Result<Arc<Instantiator>, InterfaceError> {
        let options = self.options.clone().source_path(path);
        let compiled = Compiler::new(Arc::clone(&self.catalog))
            .with_options(options)
            .compile_str(src)
            .map_err(|source| InterfaceError::Compile { path: path.to_string(), source })?;
        debug!("compiled `{path}` ({} ops)", compiled.ops().len());
        let mut cache = self.cache.write();
        Ok(Arc::clone(cache.entry(path.to_string()).or_insert_with(|| Arc::new(compiled))))
    }

    /// Builds a fresh tree from `path` with no data source.
    pub fn create<R: Runtime>(&self, rt: &R, path: &str) -> Result<R::Object, InterfaceError> {
        self.create_with(rt, path, None)
    }

    /// Builds a fresh tree from `path`; templates resolve through this cache.
    pub fn create_with<R: Runtime>(
        &self,
        rt: &R,
        path: &str,
        data_source: Option<R::Object>,
    ) -> Result<R::Object, InterfaceError> {
        let inst = self.load(path)?;
        let mut ctx = InstantiationContext::new().with_templates(self);
        ctx.data_source = data_source;
        Ok(inst.instantiate(rt, &ctx, None))
    }
}

impl TemplateSource for Interface {
    fn template(&self, path: &str) -> Option<Arc<Instantiator>> {
        match self.load(path) {
            Ok(inst) => Some(inst),
            Err(e) => {
                warn!("{e}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crow_iml::{Capability, NameResolution, TypeDescriptor, Value, ValueKind};
    use parking_lot::Mutex;

    use super::*;
    use crate::element::Element;
    use crate::runtime::UiRuntime;
    use crate::widgets::standard_catalog;

    fn catalog() -> Arc<TypeCatalog> {
        let mut c = standard_catalog();
        c.register(TypeDescriptor::new("Person", Capability::Leaf).property("FullName", ValueKind::Str, ""));
        c.register(TypeDescriptor::new("Controller", Capability::Leaf).method("onClick", ""));
        Arc::new(c)
    }

    fn setup() -> (Interface, UiRuntime) {
        let catalog = catalog();
        (Interface::new(Arc::clone(&catalog)), UiRuntime::new(catalog))
    }

    #[test]
    fn container_with_bound_button() {
        let (ui, rt) = setup();
        let calls: Arc<Mutex<Vec<(Element, Element)>>> = Arc::default();
        let log = Arc::clone(&calls);
        let rt = rt.with_method("Controller", "onClick", move |_, target, sender| log.lock().push((target, sender)));
        ui.load_str(
            "main.iml",
            r#"<Container><Label Name="L" Text="hello"/><Button Clicked="onClick" IsEnabled="{/L.IsVisible}"/></Container>"#,
        )
        .unwrap();

        let controller = rt.make("Controller").unwrap();
        let root = ui.create_with(&rt, "main.iml", Some(controller)).unwrap();
        assert_eq!(rt.type_name(&root), "Container");
        let [label, button] = rt.children(root)[..] else { panic!("expected two children") };
        assert_eq!(rt.type_name(&label), "Label");
        assert_eq!(rt.value(label, "Text"), Value::Str("hello".into()));
        assert_eq!(rt.value(button, "IsEnabled"), Value::Bool(true));

        rt.set_member_value(&label, "IsVisible", Value::Bool(false));
        assert_eq!(rt.value(button, "IsEnabled"), Value::Bool(false));

        rt.raise(button, "Clicked");
        assert_eq!(*calls.lock(), [(controller, button)]);
    }

    #[test]
    fn item_templates_build_independent_rows() {
        let (ui, rt) = setup();
        ui.load_str(
            "people.iml",
            r#"<ListBox>
                 <ItemTemplate DataType="Person">
                   <Row><Label Text="{FullName}"/><Button Clicked="{../Tag='picked'}"/></Row>
                 </ItemTemplate>
               </ListBox>"#,
        )
        .unwrap();
        let list = ui.create(&rt, "people.iml").unwrap();

        let people: Vec<Element> = ["Ada", "Grace", "Edsger"]
            .iter()
            .map(|name| {
                let p = rt.make("Person").unwrap();
                rt.set_member_value(&p, "FullName", Value::Str(name.to_string()));
                p
            })
            .collect();
        let rows = rt.populate(list, &people);
        assert_eq!(rows.len(), 3);
        assert_eq!(rt.items(list), rows);

        let label_of = |row: Element| rt.children(row)[0];
        assert_eq!(rt.value(label_of(rows[1]), "Text"), Value::Str("Grace".into()));

        rt.set_member_value(&people[1], "FullName", Value::Str("Hopper".into()));
        assert_eq!(rt.value(label_of(rows[1]), "Text"), Value::Str("Hopper".into()));
        assert_eq!(rt.value(label_of(rows[0]), "Text"), Value::Str("Ada".into()));

        rt.raise(rt.children(rows[2])[1], "Clicked");
        assert_eq!(rt.value(rows[2], "Tag"), Value::Str("picked".into()));
        assert_eq!(rt.value(rows[0], "Tag"), Value::Null);
    }

    #[test]
    fn items_without_a_template_are_skipped() {
        let (ui, rt) = setup();
        ui.load_str("l.iml", r#"<ListBox><ItemTemplate DataType="Person"><Label/></ItemTemplate></ListBox>"#)
            .unwrap();
        let list = ui.create(&rt, "l.iml").unwrap();
        let stranger = rt.make("Controller").unwrap();
        assert!(rt.populate(list, &[stranger]).is_empty());
    }

    #[test]
    fn external_templates_resolve_through_the_cache() {
        let (ui, rt) = setup();
        ui.load_str(
            "expander.iml",
            r#"<Row><Label Text="{/Caption}"/><Button Clicked="../../Toggle"/></Row>"#,
        )
        .unwrap();
        ui.load_str("main.iml", r#"<Expander Caption="Details" Template="expander.iml"/>"#).unwrap();

        let expander = ui.create(&rt, "main.iml").unwrap();
        let header = rt.template_root(expander).unwrap();
        let [caption, toggle] = rt.children(header)[..] else { panic!("expected two children") };
        assert_eq!(rt.value(caption, "Text"), Value::Str("Details".into()));

        rt.raise(toggle, "Clicked");
        assert_eq!(rt.value(expander, "IsExpanded"), Value::Bool(false));
        rt.set_member_value(&expander, "Caption", Value::Str("More".into()));
        assert_eq!(rt.value(caption, "Text"), Value::Str("More".into()));
    }

    #[test]
    fn external_templates_reach_past_their_control() {
        let (ui, rt) = setup();
        ui.load_str("e.iml", r#"<Row><Label Text="{../../../Tag}"/></Row>"#).unwrap();
        ui.load_str("outer.iml", r#"<Column Tag="outer"><Expander Template="e.iml"/></Column>"#).unwrap();

        let column = ui.create(&rt, "outer.iml").unwrap();
        let expander = rt.children(column)[0];
        let label = rt.children(rt.template_root(expander).unwrap())[0];
        assert_eq!(rt.value(label, "Text"), Value::Str("outer".into()));

        rt.set_member_value(&column, "Tag", Value::Str("changed".into()));
        assert_eq!(rt.value(label, "Text"), Value::Str("changed".into()));
    }

    #[test]
    fn item_templates_load_by_path() {
        let (ui, rt) = setup();
        ui.load_str("person.iml", r#"<Label Text="{FullName}"/>"#).unwrap();
        ui.load_str("declared.iml", r#"<ListBox><ItemTemplate DataType="Person" Path="person.iml"/></ListBox>"#)
            .unwrap();
        ui.load_str("attribute.iml", r#"<ListBox ItemTemplate="person.iml"/>"#).unwrap();

        let ada = rt.make("Person").unwrap();
        rt.set_member_value(&ada, "FullName", Value::Str("Ada".into()));
        for doc in ["declared.iml", "attribute.iml"] {
            let list = ui.create(&rt, doc).unwrap();
            let rows = rt.populate(list, &[ada]);
            assert_eq!(rows.len(), 1, "{doc}");
            assert_eq!(rt.value(rows[0], "Text"), Value::Str("Ada".into()), "{doc}");
        }

        ui.load_str("broken.iml", r#"<ListBox ItemTemplate="nowhere.iml"/>"#).unwrap();
        let list = ui.create(&rt, "broken.iml").unwrap();
        assert!(rt.populate(list, &[ada]).is_empty());
    }

    #[test]
    fn missing_templates_leave_the_control_bare() {
        let (ui, rt) = setup();
        ui.load_str("main.iml", r#"<Expander Template="nowhere.iml"/>"#).unwrap();
        let expander = ui.create(&rt, "main.iml").unwrap();
        assert_eq!(rt.template_root(expander), None);
    }

    #[test]
    fn repeated_loads_share_one_instantiator() {
        let (ui, _) = setup();
        let a = ui.load_str("a.iml", "<Label/>").unwrap();
        let b = ui.load_str("a.iml", "<Column/>").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.source(), Some("a.iml"));
        assert_eq!(ui.len(), 1);
        ui.clear();
        assert!(!ui.contains("a.iml"));
    }

    #[test]
    fn files_are_read_relative_to_the_root() {
        let dir = std::env::temp_dir().join(format!("crow-ui-interface-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("hello.iml"), r#"<Label Text="hi"/>"#).unwrap();

        let ui = Interface::new(catalog()).with_root(&dir);
        let first = ui.load("hello.iml").unwrap();
        assert!(Arc::ptr_eq(&first, &ui.load("hello.iml").unwrap()));
        assert!(matches!(ui.load("absent.iml"), Err(InterfaceError::Io { .. })));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn strict_and_lenient_name_resolution() {
        let src = r#"<Column><Label Text="{/Missing.Text}"/></Column>"#;
        let strict = Interface::new(catalog());
        assert!(matches!(
            strict.load_str("m.iml", src),
            Err(InterfaceError::Compile { source: ImlError::UnresolvedName { .. }, .. })
        ));

        let lenient = Interface::new(catalog())
            .with_options(CompileOptions::new().name_resolution(NameResolution::Lenient));
        lenient.load_str("m.iml", src).unwrap();
        let rt = UiRuntime::new(catalog());
        let root = lenient.create(&rt, "m.iml").unwrap();
        assert_eq!(rt.value(rt.children(root)[0], "Text"), Value::Str(String::new()));
    }

    #[test]
    fn native_methods_drive_bindings() {
        let (ui, rt) = setup();
        ui.load_str(
            "progress.iml",
            r#"<Column><Slider Name="S" Value="10"/><ProgressBar Value="{/S.Value}"/><Button Clicked="/S.Increment"/></Column>"#,
        )
        .unwrap();
        let root = ui.create(&rt, "progress.iml").unwrap();
        let [_, bar, button] = rt.children(root)[..] else { panic!("expected three children") };
        assert_eq!(rt.value(bar, "Value"), Value::Float(10.0));
        rt.raise(button, "Clicked");
        assert_eq!(rt.value(bar, "Value"), Value::Float(11.0));
    }

    #[test]
    fn every_create_builds_a_new_tree() {
        let (ui, rt) = setup();
        ui.load_str("c.iml", r#"<Column><Label/><Label/></Column>"#).unwrap();
        let a = ui.create(&rt, "c.iml").unwrap();
        let b = ui.create(&rt, "c.iml").unwrap();
        assert_ne!(a, b);
        assert_eq!(rt.len(), 6);
        assert_eq!(rt.stats().instances(), 6);
    }
}
