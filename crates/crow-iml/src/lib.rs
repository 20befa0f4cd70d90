//! Compiler for **Crow markup** (`.iml`).
//!
//! A document is compiled once into an [`Instantiator`]: an immutable plan
//! that builds a fresh object tree, with its bindings and event handlers
//! wired, every time it is invoked. The compiler knows nothing about any
//! concrete widget tree; types come from a [`TypeCatalog`] and objects are
//! created through a [`Runtime`] implementation.
//!
//! # Structure
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`reader`] | `Reader`, `Event`: pull reader over the markup |
//! | [`catalog`] | `TypeCatalog`, `TypeDescriptor`, `MemberDescriptor`, `Capability` |
//! | [`address`] | `Node`, `NodeAddress`, `NamedNodeAddress`, `NodeStack` |
//! | [`member`] | `MemberAddress` |
//! | [`expr`] | binding expression parser |
//! | [`registry`] | binding registry and name resolver |
//! | [`compiler`] | `Compiler`, `CompileOptions` |
//! | [`instantiator`] | `Instantiator`, `Op`, `InstantiationContext` |
//! | [`runtime`] | the `Runtime` trait |
//! | [`value`] | `Value`, `ValueKind` |
//! | [`error`] | `ImlError`, `Position` |
//!
//! # Quick start
//!
//! ```rust
//! use std::sync::Arc;
//! use crow_iml::{Capability, Compiler, TypeCatalog, TypeDescriptor, ValueKind};
//!
//! let catalog = TypeCatalog::new()
//!     .with_type(TypeDescriptor::new("Column", Capability::Group))
//!     .with_type(TypeDescriptor::new("Label", Capability::Leaf).property("Text", ValueKind::Str, ""));
//!
//! let inst = Compiler::new(Arc::new(catalog))
//!     .compile_str(r#"<Column><Label Text="hello"/></Column>"#)
//!     .unwrap();
//! assert_eq!(inst.root_type().name, "Column");
//! ```

pub mod address;
pub mod catalog;
pub mod compiler;
pub mod error;
pub mod expr;
pub mod instantiator;
pub mod member;
pub mod reader;
pub mod registry;
pub mod runtime;
pub mod value;

#[cfg(test)]
mod testing;

use std::sync::Arc;

pub use address::{NamedNodeAddress, Node, NodeAddress, NodeStack};
pub use catalog::{
    AttachKind, Capability, MemberDescriptor, MemberKind, MemberOrigin, TypeCatalog, TypeDescriptor, TypeRef,
    Visibility,
};
pub use compiler::{CompileOptions, Compiler, DEFAULT_DATA_TYPE};
pub use error::{ImlError, Position, Result};
pub use instantiator::{InstantiationContext, Instantiator, Op, Owner, TemplateSource};
pub use member::MemberAddress;
pub use registry::NameResolution;
pub use runtime::{ChangeHandler, HandlerFn, Runtime};
pub use value::{Value, ValueKind};

/// Compiles `src` against `catalog` with default options.
pub fn compile_str(catalog: Arc<TypeCatalog>, src: &str) -> Result<Instantiator> {
    Compiler::new(catalog).compile_str(src)
}
