//! Reflective method and constructor invocation

use std::sync::Arc;

use crate::class::{AccessFlags, Class, Method};
use crate::error::{Failure, NativeResult};
use crate::object::ObjectRef;
use crate::thread::ExecEnv;
use crate::value::Value;
use crate::vm::Vm;

use super::field::check_receiver;
use super::wrapper::{box_value, unwrap_and_widen};

/// Method that a virtual call of `method` on a `receiver` instance runs
///
/// Private, static and initialiser methods are never overridden.
pub fn lookup_virtual(receiver: &Class, method: &Arc<Method>) -> NativeResult<Arc<Method>> {
    if method.is_static()
        || method.is_initializer()
        || method.access_flags().contains(AccessFlags::PRIVATE)
    {
        return Ok(Arc::clone(method));
    }
    match receiver.lookup_method(method.name(), method.descriptor()) {
        Some(target) if !target.is_abstract() => Ok(target),
        _ => Err(Failure::AbstractMethod(format!(
            "{}.{}{}",
            receiver.name(),
            method.name(),
            method.descriptor()
        ))),
    }
}

/// Convert the reflective argument array to `method`'s parameter values
fn unwrap_args(vm: &Vm, method: &Method, loader: Option<&ObjectRef>, args: Option<&ObjectRef>) -> NativeResult<Vec<Value>> {
    let elements = match args {
        Some(array) => array
            .array()
            .and_then(|data| data.refs().map(<[_]>::to_vec))
            .ok_or_else(|| Failure::illegal_argument("argument array is not an Object[]"))?,
        None => Vec::new(),
    };
    let params = &method.signature().params;
    if elements.len() != params.len() {
        return Err(Failure::illegal_argument("wrong number of arguments"));
    }
    elements
        .iter()
        .zip(params)
        .map(|(arg, ty)| unwrap_and_widen(vm, arg.as_ref(), ty, None, loader, "argument type mismatch"))
        .collect()
}

fn declared(class: &Class, slot: usize) -> NativeResult<&Arc<Method>> {
    class
        .method(slot)
        .ok_or_else(|| Failure::Internal(format!("{} has no method slot {}", class.name(), slot)))
}

/// Invoke method `slot` of `class`, boxing the result
///
/// Static methods initialise their class first. Instance methods validate the
/// receiver and dispatch on its runtime class. A failure raised by the target
/// comes back as `InvocationTarget`; a void method yields null.
pub fn invoke_method(
    vm: &Arc<Vm>,
    env: &mut ExecEnv,
    class: &Arc<Class>,
    slot: usize,
    receiver: Option<&ObjectRef>,
    args: Option<&ObjectRef>,
) -> NativeResult<Option<ObjectRef>> {
    let method = declared(class, slot)?;
    let (target, this) = if method.is_static() {
        vm.initialize_class(env, class)?;
        (Arc::clone(method), None)
    } else {
        let obj = check_receiver(class, receiver)?;
        (lookup_virtual(obj.class(), method)?, Some(obj))
    };

    let mut values = Vec::with_capacity(target.signature().params.len() + 1);
    values.extend(this.map(Value::object));
    values.extend(unwrap_args(vm, &target, class.loader(), args)?);

    tracing::trace!(method = ?target, "reflective invoke");
    let result = vm
        .call_method(env, &target, &values)
        .map_err(|cause| Failure::InvocationTarget(Box::new(cause)))?;
    match result {
        Some(value) => box_value(vm, value),
        None => Ok(None),
    }
}

/// Allocate an instance of `class` and run constructor `slot` on it
///
/// Allocation failures propagate as the allocator reported them.
pub fn construct(
    vm: &Arc<Vm>,
    env: &mut ExecEnv,
    class: &Arc<Class>,
    slot: usize,
    args: Option<&ObjectRef>,
) -> NativeResult<ObjectRef> {
    let init = declared(class, slot)?;
    if class.is_interface() || class.access_flags().contains(AccessFlags::ABSTRACT) {
        return Err(Failure::Instantiation(class.dotted_name()));
    }
    let params = unwrap_args(vm, init, class.loader(), args)?;
    vm.initialize_class(env, class)?;

    let obj = vm.heap().alloc_object(class)?;
    let mut values = Vec::with_capacity(params.len() + 1);
    values.push(Value::object(Arc::clone(&obj)));
    values.extend(params);

    tracing::trace!(constructor = ?init, "reflective construct");
    vm.call_method(env, init, &values)
        .map_err(|cause| Failure::InvocationTarget(Box::new(cause)))?;
    Ok(obj)
}
