//! Reflective field access
//!
//! A field is addressed by its declaring class and slot. Static fields first
//! initialise the declaring class; instance fields first validate the
//! receiver. Only then is the value read, converted or written.

use std::sync::Arc;

use crate::class::{Class, Field};
use crate::error::{Failure, NativeResult};
use crate::object::ObjectRef;
use crate::thread::ExecEnv;
use crate::value::{PrimitiveType, Value};
use crate::vm::Vm;

use super::widen::widen;
use super::wrapper::{box_value, unwrap_and_widen};

const FIELD_TYPE_MISMATCH: &str = "field type mismatch";

/// Where a resolved field's storage lives
enum Storage {
    Static(Arc<Class>),
    Instance(ObjectRef),
}

struct Resolved<'c> {
    field: &'c Field,
    storage: Storage,
}

impl Resolved<'_> {
    fn read(&self) -> NativeResult<Value> {
        let ty = self.field.ty().primitive();
        let value = match &self.storage {
            Storage::Static(class) => class.read_static(self.field.offset(), ty),
            Storage::Instance(obj) => obj.read_field(self.field.offset(), ty),
        };
        value.ok_or_else(|| Failure::Internal(format!("unreadable field {}", self.field.name())))
    }

    fn write(&self, value: &Value) -> NativeResult<()> {
        let written = match &self.storage {
            Storage::Static(class) => class.write_static(self.field.offset(), value),
            Storage::Instance(obj) => obj.write_field(self.field.offset(), value),
        };
        if written {
            Ok(())
        } else {
            Err(Failure::Internal(format!("unwritable field {}", self.field.name())))
        }
    }
}

/// Reject a null receiver or one that is not an instance of `class`
pub fn check_receiver(class: &Class, receiver: Option<&ObjectRef>) -> NativeResult<ObjectRef> {
    let obj = receiver.ok_or(Failure::NullReference)?;
    if !class.is_instance(obj) {
        return Err(Failure::illegal_argument(
            "object is not an instance of declaring class",
        ));
    }
    Ok(Arc::clone(obj))
}

fn resolve<'c>(
    vm: &Arc<Vm>,
    env: &mut ExecEnv,
    class: &'c Arc<Class>,
    slot: usize,
    receiver: Option<&ObjectRef>,
) -> NativeResult<Resolved<'c>> {
    let field = class
        .field(slot)
        .ok_or_else(|| Failure::Internal(format!("{} has no field slot {}", class.name(), slot)))?;
    let storage = if field.is_static() {
        vm.initialize_class(env, class)?;
        Storage::Static(Arc::clone(class))
    } else {
        Storage::Instance(check_receiver(class, receiver)?)
    };
    Ok(Resolved { field, storage })
}

/// Read a field, boxing primitives
pub fn get_field(
    vm: &Arc<Vm>,
    env: &mut ExecEnv,
    class: &Arc<Class>,
    slot: usize,
    receiver: Option<&ObjectRef>,
) -> NativeResult<Option<ObjectRef>> {
    let value = resolve(vm, env, class, slot, receiver)?.read()?;
    box_value(vm, value)
}

/// Read a primitive field as `want`, widening if needed
///
/// # Errors
///
/// `IllegalArgument("field type mismatch")` if the field is a reference or its
/// type does not widen to `want`.
pub fn get_primitive_field(
    vm: &Arc<Vm>,
    env: &mut ExecEnv,
    class: &Arc<Class>,
    slot: usize,
    receiver: Option<&ObjectRef>,
    want: PrimitiveType,
) -> NativeResult<Value> {
    let resolved = resolve(vm, env, class, slot, receiver)?;
    if resolved.field.ty().is_reference() {
        return Err(Failure::illegal_argument(FIELD_TYPE_MISMATCH));
    }
    let value = resolved.read()?;
    widen(&value, want).ok_or_else(|| Failure::illegal_argument(FIELD_TYPE_MISMATCH))
}

/// Write a field from an object, unboxing and widening for primitive fields
///
/// `field_type` is the field's type class when the caller has it.
pub fn set_field(
    vm: &Arc<Vm>,
    env: &mut ExecEnv,
    class: &Arc<Class>,
    slot: usize,
    receiver: Option<&ObjectRef>,
    field_type: Option<&Class>,
    value: Option<&ObjectRef>,
) -> NativeResult<()> {
    let resolved = resolve(vm, env, class, slot, receiver)?;
    let converted = unwrap_and_widen(
        vm,
        value,
        resolved.field.ty(),
        field_type,
        class.loader(),
        FIELD_TYPE_MISMATCH,
    )?;
    resolved.write(&converted)
}

/// Write a primitive field from a primitive value, widening if needed
pub fn set_primitive_field(
    vm: &Arc<Vm>,
    env: &mut ExecEnv,
    class: &Arc<Class>,
    slot: usize,
    receiver: Option<&ObjectRef>,
    value: Value,
) -> NativeResult<()> {
    let resolved = resolve(vm, env, class, slot, receiver)?;
    let converted = resolved
        .field
        .ty()
        .primitive()
        .and_then(|ty| widen(&value, ty))
        .ok_or_else(|| Failure::illegal_argument(FIELD_TYPE_MISMATCH))?;
    resolved.write(&converted)
}
