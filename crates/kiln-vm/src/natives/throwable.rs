//! `java/lang/VMThrowable`: backtrace capture and conversion
//!
//! A capture is the list of methods on the stack when the throwable was
//! filled in, newest first. Line numbers are not tracked, so elements report
//! `-1` (or `-2` for native methods, matching `StackTraceElement`'s marker).

use std::sync::Arc;

use crate::class::{Class, Method};
use crate::error::{Failure, NativeResult};
use crate::object::ObjectRef;
use crate::reflect::object_array;
use crate::value::Value;
use crate::vm::{set_instance_field, Vm};

use super::{NativeCall, NativeMethod, StackTop};

pub(super) const NATIVES: &[NativeMethod] = &[
    NativeMethod::new("fillInStackTrace", fill_in_stack_trace),
    NativeMethod::new("getStackTrace", get_stack_trace),
];

/// Line number reported for frames without line information
const UNKNOWN_LINE: i32 = -1;
/// Line number reported for native frames
const NATIVE_LINE: i32 = -2;

/// Drop the frames that belong to building `throwable` itself
///
/// `methods` starts below the capturing native. Leading `fillInStackTrace`
/// and constructor frames of the throwable's own class or its superclasses
/// are skipped.
pub(crate) fn trim_construction_frames(methods: &[Arc<Method>], throwable: &Class) -> usize {
    methods
        .iter()
        .take_while(|m| {
            (m.name() == "fillInStackTrace" || m.name() == "<init>")
                && m.class().is_some_and(|c| throwable.is_assignable_to(&c))
        })
        .count()
}

fn fill_in_stack_trace(call: &mut NativeCall<'_>) -> NativeResult<StackTop> {
    let throwable = call.object(0)?;
    let vm = call.vm();
    let methods = vm.walker().real_methods(call.env().frames().top());
    // Entry 0 is this native's own frame
    let below = methods.get(1..).unwrap_or_default();
    let skip = trim_construction_frames(below, throwable.class());
    let frames = below[skip..].to_vec();

    tracing::trace!(frames = frames.len(), class = throwable.class().name(), "backtrace captured");
    let state_class = vm.bootstrap_class("java/lang/VMThrowable")?;
    let state = vm.heap().alloc_backtrace(&state_class, frames)?;
    call.ret_ref(Some(state))
}

fn stack_trace_element(vm: &Vm, element_class: &Arc<Class>, method: &Method) -> NativeResult<ObjectRef> {
    let element = vm.heap().alloc_object(element_class)?;
    let line = if method.is_native() { NATIVE_LINE } else { UNKNOWN_LINE };
    let declaring = vm.new_string(&method.class_name().replace('/', "."))?;
    let name = vm.new_string(method.name())?;
    set_instance_field(&element, "declaringClass", Value::object(declaring))?;
    set_instance_field(&element, "methodName", Value::object(name))?;
    set_instance_field(&element, "lineNumber", Value::Int(line))?;
    set_instance_field(&element, "isNative", Value::Boolean(method.is_native()))?;
    Ok(element)
}

fn get_stack_trace(call: &mut NativeCall<'_>) -> NativeResult<StackTop> {
    let state = call.object(0)?;
    let frames = state
        .backtrace()
        .ok_or_else(|| Failure::Internal(format!("{:?} carries no backtrace", state)))?;

    let vm = call.vm();
    let element_class = vm.bootstrap_class("java/lang/StackTraceElement")?;
    let elements = frames
        .iter()
        .map(|m| stack_trace_element(vm, &element_class, m).map(Some))
        .collect::<NativeResult<Vec<_>>>()?;
    let array = object_array(vm, &element_class, elements)?;
    call.ret_ref(Some(array))
}
