//! Boxing and unboxing through the primitive wrapper classes

use std::sync::Arc;

use crate::class::Class;
use crate::descriptor::FieldType;
use crate::error::{Failure, NativeResult};
use crate::object::ObjectRef;
use crate::value::{PrimitiveType, Value};
use crate::vm::Vm;

use super::widen::widen;

const VALUE_FIELD: &str = "value";

/// Box a primitive into its wrapper object; references pass through
pub fn box_value(vm: &Vm, value: Value) -> NativeResult<Option<ObjectRef>> {
    let Some(ty) = value.primitive_type() else {
        return Ok(value.into_object());
    };
    let class = vm.bootstrap_class(ty.wrapper_class())?;
    let offset = value_offset(&class)?;
    let obj = vm.heap().alloc_object(&class)?;
    if !obj.write_field(offset, &value) {
        return Err(Failure::Internal(format!("{}.value not writable", class.name())));
    }
    Ok(Some(obj))
}

/// Primitive held by a wrapper object (`None` if `obj` is not a wrapper)
pub fn unbox(obj: &ObjectRef) -> Option<Value> {
    let class = obj.class();
    let ty = wrapped_type(class)?;
    let field = class.declared_field(VALUE_FIELD)?;
    obj.read_field(field.offset(), Some(ty))
}

/// Convert a reflective argument to a value of type `target`
///
/// Primitive targets require a wrapper whose value widens to the target.
/// Reference targets accept null or an instance of the target class. The
/// class is `declared` when the caller supplies it; otherwise it is looked up
/// from `loader`, and a type defined further up the delegation path is
/// matched by name through the argument's own hierarchy.
///
/// # Errors
///
/// `IllegalArgument(mismatch)` when the argument does not fit.
pub fn unwrap_and_widen(
    vm: &Vm,
    arg: Option<&ObjectRef>,
    target: &FieldType,
    declared: Option<&Class>,
    loader: Option<&ObjectRef>,
    mismatch: &str,
) -> NativeResult<Value> {
    match target.primitive() {
        Some(ty) => arg
            .and_then(unbox)
            .and_then(|v| widen(&v, ty))
            .ok_or_else(|| Failure::illegal_argument(mismatch)),
        None => {
            let Some(obj) = arg else {
                return Ok(Value::null());
            };
            if conforms(vm, obj, target.class_name(), declared, loader) {
                Ok(Value::object(Arc::clone(obj)))
            } else {
                Err(Failure::illegal_argument(mismatch))
            }
        }
    }
}

fn conforms(vm: &Vm, obj: &ObjectRef, name: &str, declared: Option<&Class>, loader: Option<&ObjectRef>) -> bool {
    if let Some(class) = declared.filter(|class| class.name() == name) {
        return class.is_instance(obj);
    }
    let classes = vm.classes();
    let registered = if name.starts_with('[') {
        classes.array_class(name, loader)
    } else {
        classes
            .find_loaded(name, loader)
            .or_else(|| classes.find_bootstrap(name))
    };
    registered.is_some_and(|class| class.is_instance(obj)) || obj.class().is_subtype_named(name)
}

fn wrapped_type(class: &Class) -> Option<PrimitiveType> {
    if class.loader().is_some() {
        return None;
    }
    PrimitiveType::ALL
        .iter()
        .copied()
        .filter(|ty| *ty != PrimitiveType::Void)
        .find(|ty| ty.wrapper_class() == class.name())
}

fn value_offset(class: &Class) -> NativeResult<usize> {
    class
        .declared_field(VALUE_FIELD)
        .map(|f| f.offset())
        .ok_or_else(|| Failure::Internal(format!("{} has no value field", class.name())))
}
