//! Crow UI: reference retained widget tree for compiled `.iml` documents.
//!
//! # Quick start
//!
//! ```rust
//! use std::sync::Arc;
//! use crow_ui::prelude::*;
//!
//! let catalog = Arc::new(standard_catalog());
//! let ui = Interface::new(Arc::clone(&catalog));
//! let rt = UiRuntime::new(catalog);
//!
//! ui.load_str("main.iml", r#"<Column><Label Name="L" Text="hi"/><Label Text="{/L.Text}"/></Column>"#)
//!     .unwrap();
//! let root = ui.create(&rt, "main.iml").unwrap();
//! println!("{}", dump(&rt, root));
//! ```
//!
//! # Adding application types
//!
//! Data sources are ordinary catalog types. Register them before sharing the
//! catalog, and give their methods a native implementation on the runtime:
//!
//! ```rust
//! use std::sync::Arc;
//! use crow_ui::prelude::*;
//!
//! let mut catalog = standard_catalog();
//! catalog.register(
//!     TypeDescriptor::new("Document", Capability::Leaf)
//!         .property("Title", ValueKind::Str, "")
//!         .method("save", ""),
//! );
//! let rt = UiRuntime::new(Arc::new(catalog))
//!     .with_method("Document", "save", |_rt, doc, _sender| println!("saving {doc}"));
//! # let _ = rt;
//! ```

pub mod dump;
pub mod element;
pub mod event;
pub mod interface;
pub mod logging;
pub mod runtime;
pub mod widgets;

pub use element::Element;
pub use interface::{Interface, InterfaceError};
pub use runtime::UiRuntime;

/// Everything needed to load documents and drive the trees they build.
pub mod prelude {
    pub use crate::dump::dump;
    pub use crate::element::Element;
    pub use crate::event::{Delegate, EventResult, MethodFn};
    pub use crate::interface::{Interface, InterfaceError};
    pub use crate::logging::{LoggingConfig, init_logging};
    pub use crate::runtime::{RuntimeStats, UiRuntime};
    pub use crate::widgets::standard_catalog;

    pub use crow_iml::{
        Capability, CompileOptions, InstantiationContext, Instantiator, NameResolution, Runtime, TypeCatalog,
        TypeDescriptor, Value, ValueKind,
    };
}
