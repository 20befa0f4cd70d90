use std::fmt;

use crow_iml::{AttachKind, TypeRef, Value};
use indexmap::IndexMap;

use crate::event::Delegate;

// ── Element ───────────────────────────────────────────────────────────────

/// Handle to a widget living in a [`UiRuntime`](crate::runtime::UiRuntime).
///
/// Handles are plain indices: copying one never copies the widget, and a
/// handle is only meaningful for the runtime that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Element(pub(crate) u32);

impl Element {
    pub fn id(self) -> u32 {
        self.0
    }

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ── Widget storage ────────────────────────────────────────────────────────

/// Per-widget state held by the runtime.
pub(crate) struct WidgetData {
    pub ty: TypeRef,
    pub parent: Option<Element>,
    /// Attached children, in attach order, with how each was attached.
    pub children: Vec<(AttachKind, Element)>,
    pub values: IndexMap<String, Value>,
    /// Object-valued members (interior path segments).
    pub objects: IndexMap<String, Element>,
    pub handlers: Vec<(String, Delegate)>,
}

impl WidgetData {
    pub fn new(ty: TypeRef, values: IndexMap<String, Value>) -> Self {
        Self { ty, parent: None, children: Vec::new(), values, objects: IndexMap::new(), handlers: Vec::new() }
    }

    /// Child currently attached as `kind`, for single-slot kinds.
    pub fn single(&self, kind: AttachKind) -> Option<Element> {
        self.children.iter().find(|(k, _)| *k == kind).map(|(_, e)| *e)
    }
}
