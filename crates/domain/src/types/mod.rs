//! Domain types and models
//!
//! Objects are handled in unstructured form: the work-loop never interprets
//! an object's payload, it only routes it by key to a handler.

pub mod event;
pub mod key;
pub mod object;

pub use event::Event;
pub use key::ObjectKey;
pub use object::{DynamicObject, ObjectMeta};
