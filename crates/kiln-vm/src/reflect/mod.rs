//! Reflection bridge
//!
//! Field reads and writes with widening, reflective method and constructor
//! invocation with virtual dispatch and result boxing, and the member objects
//! handed out by class introspection.

mod field;
mod invoke;
mod members;
mod widen;
mod wrapper;

pub use field::{check_receiver, get_field, get_primitive_field, set_field, set_primitive_field};
pub use invoke::{construct, invoke_method, lookup_virtual};
pub use members::{class_array, declared_members, object_array, MemberKind};
pub use widen::{widen, widens_to};
pub use wrapper::{box_value, unbox, unwrap_and_widen};
