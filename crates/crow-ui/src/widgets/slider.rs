use crow_iml::{Capability, Runtime, TypeDescriptor, Value, ValueKind};

use crate::element::Element;
use crate::runtime::UiRuntime;

pub(crate) fn descriptors() -> Vec<TypeDescriptor> {
    vec![
        TypeDescriptor::new("Slider", Capability::Leaf)
            .base("Widget")
            .doc("A horizontal slider for selecting a value in a range.")
            .property("Value", ValueKind::Float, "Current value.")
            .property("Minimum", ValueKind::Float, "Lower bound.")
            .property_default("Maximum", ValueKind::Float, Value::Float(100.0), "Upper bound.")
            .property_default("Step", ValueKind::Float, Value::Float(1.0), "Amount added by `Increment()`.")
            .event("ValueChanged", "EventHandler", "Raised after `Increment()` or `Reset()`.")
            .method("Increment", "Adds `Step`, clamped to `Maximum`.")
            .method("Reset", "Sets `Value` to `Minimum`."),
        TypeDescriptor::new("ProgressBar", Capability::Leaf)
            .base("Widget")
            .doc("A horizontal bar filled to `Value / Maximum`.")
            .property("Value", ValueKind::Float, "Current progress.")
            .property_default("Maximum", ValueKind::Float, Value::Float(100.0), "Value of a full bar."),
    ]
}

fn number(rt: &UiRuntime, e: Element, member: &str) -> f64 {
    rt.value(e, member).as_f64().unwrap_or(0.0)
}

pub(crate) fn install(rt: &UiRuntime) {
    rt.register_method("Slider", "Increment", |rt, target, _| {
        let (min, max) = (number(rt, target, "Minimum"), number(rt, target, "Maximum"));
        let next = (number(rt, target, "Value") + number(rt, target, "Step")).clamp(min, max.max(min));
        rt.set_member_value(&target, "Value", Value::Float(next));
        rt.raise(target, "ValueChanged");
    });
    rt.register_method("Slider", "Reset", |rt, target, _| {
        let min = number(rt, target, "Minimum");
        rt.set_member_value(&target, "Value", Value::Float(min));
        rt.raise(target, "ValueChanged");
    });
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::widgets::standard_catalog;

    #[test]
    fn increment_clamps_to_maximum() {
        let rt = UiRuntime::new(Arc::new(standard_catalog()));
        let s = rt.make("Slider").unwrap();
        rt.set_member_value(&s, "Value", Value::Float(99.5));
        rt.invoke(s, "Increment", s);
        assert_eq!(rt.value(s, "Value"), Value::Float(100.0));
        rt.invoke(s, "Reset", s);
        assert_eq!(rt.value(s, "Value"), Value::Float(0.0));
    }
}
