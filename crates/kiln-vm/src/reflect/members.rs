//! Reflection member objects
//!
//! `Field`, `Method` and `Constructor` instances are thin handles: the
//! declaring class mirror, the member name and the member's slot. Everything
//! else is looked up through the slot when the member is used.

use std::sync::Arc;

use crate::class::{AccessFlags, Class};
use crate::error::{Failure, NativeResult};
use crate::object::{ArrayData, ObjectRef};
use crate::value::Value;
use crate::vm::Vm;

/// Which declared members to reflect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    /// `java/lang/reflect/Field`
    Field,
    /// `java/lang/reflect/Method` (initialisers excluded)
    Method,
    /// `java/lang/reflect/Constructor`
    Constructor,
}

impl MemberKind {
    fn class_name(self) -> &'static str {
        match self {
            MemberKind::Field => "java/lang/reflect/Field",
            MemberKind::Method => "java/lang/reflect/Method",
            MemberKind::Constructor => "java/lang/reflect/Constructor",
        }
    }
}

/// Array of reflection objects for the members of `class`
///
/// With `public_only`, non-public members are left out.
pub fn declared_members(vm: &Vm, class: &Arc<Class>, kind: MemberKind, public_only: bool) -> NativeResult<ObjectRef> {
    let visible = |flags: AccessFlags| !public_only || flags.contains(AccessFlags::PUBLIC);
    let members: Vec<(usize, &str)> = match kind {
        MemberKind::Field => class
            .fields()
            .iter()
            .enumerate()
            .filter(|(_, f)| visible(f.access_flags()))
            .map(|(slot, f)| (slot, f.name()))
            .collect(),
        MemberKind::Method => class
            .methods()
            .iter()
            .filter(|m| !m.is_initializer() && visible(m.access_flags()))
            .map(|m| (m.slot(), m.name()))
            .collect(),
        MemberKind::Constructor => class
            .methods()
            .iter()
            .filter(|m| m.name() == "<init>" && visible(m.access_flags()))
            .map(|m| (m.slot(), m.name()))
            .collect(),
    };

    let member_class = vm.bootstrap_class(kind.class_name())?;
    let declaring = offset_of(&member_class, "declaringClass")?;
    let name_at = offset_of(&member_class, "name")?;
    let slot_at = offset_of(&member_class, "slot")?;
    let mirror = vm.mirror(class)?;

    let mut elements = Vec::with_capacity(members.len());
    for (slot, name) in members {
        let obj = vm.heap().alloc_object(&member_class)?;
        obj.write_field(declaring, &Value::object(Arc::clone(&mirror)));
        obj.write_field(name_at, &Value::object(vm.intern_str(name)?));
        obj.write_field(slot_at, &Value::Int(slot as i32));
        elements.push(Some(obj));
    }
    object_array(vm, &member_class, elements)
}

/// Array of the mirrors of `classes`, typed `Class[]`
pub fn class_array(vm: &Vm, classes: &[Arc<Class>]) -> NativeResult<ObjectRef> {
    let mirrors = classes
        .iter()
        .map(|c| vm.mirror(c).map(Some))
        .collect::<NativeResult<Vec<_>>>()?;
    let class_class = vm.bootstrap_class("java/lang/Class")?;
    object_array(vm, &class_class, mirrors)
}

/// Reference array with component `component` holding `elements`
pub fn object_array(vm: &Vm, component: &Arc<Class>, elements: Vec<Option<ObjectRef>>) -> NativeResult<ObjectRef> {
    let array_class = vm.classes().array_of(component);
    vm.heap().alloc_array_with(&array_class, ArrayData::Ref(elements))
}

fn offset_of(class: &Class, field: &str) -> NativeResult<usize> {
    class
        .declared_field(field)
        .map(|f| f.offset())
        .ok_or_else(|| Failure::Internal(format!("{} has no field {}", class.name(), field)))
}
