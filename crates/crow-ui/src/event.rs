use std::fmt;
use std::sync::Arc;

use crow_iml::HandlerFn;

use crate::element::Element;
use crate::runtime::UiRuntime;

/// Native implementation of a catalog method: `(runtime, target, sender)`.
pub type MethodFn = Arc<dyn Fn(&UiRuntime, Element, Element) + Send + Sync>;

/// An event handler attached to a widget.
#[derive(Clone)]
pub enum Delegate {
    /// Calls `method` on `target` with the event sender.
    Method { handler_type: String, target: Element, method: String },
    /// Closure built by a compiled instantiator (assignment handlers).
    Closure { handler_type: String, f: HandlerFn<UiRuntime> },
}

impl Delegate {
    pub fn handler_type(&self) -> &str {
        match self {
            Delegate::Method { handler_type, .. } | Delegate::Closure { handler_type, .. } => handler_type,
        }
    }
}

impl fmt::Debug for Delegate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Delegate::Method { target, method, .. } => write!(f, "{target}.{method}()"),
            Delegate::Closure { .. } => f.write_str("<assignments>"),
        }
    }
}

/// Result returned by [`UiRuntime::raise`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventResult {
    /// At least one handler ran.
    Consumed,
    /// No handler is attached for the event.
    Ignored,
}

impl EventResult {
    #[inline]
    pub fn is_consumed(self) -> bool {
        self == EventResult::Consumed
    }
}
