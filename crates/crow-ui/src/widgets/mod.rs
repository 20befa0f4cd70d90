//! The standard widget catalog.
//!
//! | Element | Capability | Notable members |
//! |---------|------------|-----------------|
//! | `Widget` | base of all | `Name`, `IsVisible`, `IsEnabled`, `Width`, `Height`, `Tag`, `ToggleVisibility()` |
//! | `Label` | leaf | `Text` (content) |
//! | `Button` | leaf | `Text` (content), `Clicked` |
//! | `Checkbox`, `Toggle` | leaf | `IsChecked`, `Toggled`, `Toggle()` |
//! | `Slider` | leaf | `Value`, `Minimum`, `Maximum`, `Step`, `Increment()`, `Reset()` |
//! | `ProgressBar` | leaf | `Value`, `Maximum` |
//! | `TextBox` | leaf | `Text`, `Placeholder`, `TextChanged`, `Clear()` |
//! | `Container`, `Column`, `Row`, `Stack` | group | `Spacing` |
//! | `Border`, `ScrollView` | single child | `BorderWidth`, `ScrollY` |
//! | `Expander` | templated, single child | `Caption`, `IsExpanded`, `Toggle()` |
//! | `ListBox` | templated, items | `SelectedIndex`, `SelectionChanged` |
//!
//! Applications add their own data types to the returned catalog before
//! wrapping it in an `Arc`.

pub mod base;
pub mod button;
pub mod checkbox;
pub mod layout;
pub mod slider;
pub mod templated;
pub mod text;
pub mod textbox;

use crow_iml::{Runtime, TypeCatalog, TypeDescriptor, Value};

use crate::element::Element;
use crate::runtime::UiRuntime;

pub fn standard_catalog() -> TypeCatalog {
    let mut catalog = TypeCatalog::new();
    let groups: [Vec<TypeDescriptor>; 8] = [
        base::descriptors(),
        text::descriptors(),
        button::descriptors(),
        checkbox::descriptors(),
        slider::descriptors(),
        textbox::descriptors(),
        layout::descriptors(),
        templated::descriptors(),
    ];
    for ty in groups.into_iter().flatten() {
        catalog.register(ty);
    }
    base::extensions(&mut catalog);
    catalog
}

/// Installs the native implementations of the standard methods.
pub(crate) fn install_methods(rt: &UiRuntime) {
    base::install(rt);
    checkbox::install(rt);
    slider::install(rt);
    textbox::install(rt);
    templated::install(rt);
}

pub(crate) fn flip(rt: &UiRuntime, e: Element, member: &str) {
    let current = rt.value(e, member).as_bool().unwrap_or(false);
    rt.set_member_value(&e, member, Value::Bool(!current));
}
