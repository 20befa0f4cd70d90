//! The surface an object tree offers to compiled instantiators.
//!
//! The compiler never creates or touches objects itself; everything an
//! instantiator does at invocation time goes through a [`Runtime`].

use std::sync::Arc;

use crate::catalog::{AttachKind, TypeDescriptor};
use crate::instantiator::Instantiator;
use crate::value::Value;

/// Called with the new value after a watched member changed.
pub type ChangeHandler<R> = Arc<dyn Fn(&R, &Value) + Send + Sync>;

/// Called with the event sender when an event fires.
pub type HandlerFn<R> = Arc<dyn Fn(&R, &<R as Runtime>::Object) + Send + Sync>;

pub trait Runtime: Sized + Send + Sync + 'static {
    /// Handle to a live object. Cloning clones the handle, not the object.
    type Object: Clone + Send + Sync + 'static;
    /// A callable event handler.
    type Delegate: Clone + Send + Sync + 'static;

    fn create_instance(&self, ty: &TypeDescriptor) -> Self::Object;

    /// Concrete type name of `object`, as known to the catalog.
    fn type_name(&self, object: &Self::Object) -> String;

    /// Attaches `child` under `parent` and makes `parent` its logical parent.
    fn attach(&self, parent: &Self::Object, child: &Self::Object, kind: AttachKind);

    fn find_descendant_by_name(&self, root: &Self::Object, name: &str) -> Option<Self::Object>;

    fn logical_parent(&self, object: &Self::Object) -> Option<Self::Object>;

    fn get_member_value(&self, object: &Self::Object, member: &str) -> Option<Value>;

    /// Stores `value`. Watchers are notified only when the stored value
    /// actually changes.
    fn set_member_value(&self, object: &Self::Object, member: &str, value: Value);

    /// Object-valued member, used for interior path segments.
    fn get_member_object(&self, object: &Self::Object, member: &str) -> Option<Self::Object>;

    fn watch(&self, object: &Self::Object, member: &str, handler: ChangeHandler<Self>);

    /// Builds a handler calling `method` on `target`; `None` if the method has
    /// no implementation for the target's type.
    fn create_delegate(&self, handler_type: &str, target: &Self::Object, method: &str) -> Option<Self::Delegate>;

    fn closure_delegate(&self, handler_type: &str, handler: HandlerFn<Self>) -> Self::Delegate;

    fn add_event_handler(&self, source: &Self::Object, event: &str, delegate: Self::Delegate);

    fn add_item_template(&self, control: &Self::Object, data_type: &str, template: Arc<Instantiator>);
}
