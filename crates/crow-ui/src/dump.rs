//! Text rendering of a live widget tree.
//!
//! ```text
//! Container #0
//!   Label #1 Name="L" Text="hello"
//!   Button #2 Clicked(1)
//! ```
//!
//! Only members that differ from the type's initial value are listed.
//! Template roots are prefixed with `template:`, templated items with `item:`.

use std::fmt::Write;

use crow_iml::{AttachKind, Runtime, Value};

use crate::element::Element;
use crate::runtime::UiRuntime;

pub fn dump(rt: &UiRuntime, root: Element) -> String {
    let mut out = String::new();
    node(rt, root, None, 0, &mut out);
    out
}

fn node(rt: &UiRuntime, e: Element, kind: Option<AttachKind>, depth: usize, out: &mut String) {
    let prefix = match kind {
        Some(AttachKind::SetTemplateRoot) => "template: ",
        Some(AttachKind::AppendTemplatedItem) => "item: ",
        _ => "",
    };
    let _ = write!(out, "{:indent$}{prefix}{} {e}", "", rt.type_name(&e), indent = depth * 2);
    for (name, value) in rt.changed_values(e) {
        match value {
            Value::Str(s) => {
                let _ = write!(out, " {name}={s:?}");
            }
            v => {
                let _ = write!(out, " {name}={v}");
            }
        }
    }
    let mut events: Vec<(String, usize)> = Vec::new();
    for event in rt.event_names(e) {
        match events.iter_mut().find(|(n, _)| *n == event) {
            Some((_, count)) => *count += 1,
            None => events.push((event, 1)),
        }
    }
    for (event, count) in events {
        let _ = write!(out, " {event}({count})");
    }
    out.push('\n');
    for (kind, child) in rt.attached(e) {
        node(rt, child, Some(kind), depth + 1, out);
    }
}
