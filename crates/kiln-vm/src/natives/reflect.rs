//! `java/lang/reflect` natives
//!
//! Member objects pass their declaring class and slot explicitly. The typed
//! field accessors share one implementation per family: the primitive type
//! comes from the bound method's own signature.

use crate::error::{Failure, NativeResult};
use crate::reflect::{construct, get_field, get_primitive_field, invoke_method, set_field, set_primitive_field};

use crate::vm::Vm;

use super::{NativeCall, NativeMethod, StackTop};

pub(super) const FIELD_NATIVES: &[NativeMethod] = &[
    NativeMethod::new("getFieldModifiers", field_modifiers),
    NativeMethod::new("getField", field_get),
    NativeMethod::new("setField", field_set),
    NativeMethod::new("getZField", field_get_primitive),
    NativeMethod::new("getBField", field_get_primitive),
    NativeMethod::new("getCField", field_get_primitive),
    NativeMethod::new("getSField", field_get_primitive),
    NativeMethod::new("getIField", field_get_primitive),
    NativeMethod::new("getFField", field_get_primitive),
    NativeMethod::new("getJField", field_get_primitive),
    NativeMethod::new("getDField", field_get_primitive),
    NativeMethod::new("setZField", field_set_primitive),
    NativeMethod::new("setBField", field_set_primitive),
    NativeMethod::new("setCField", field_set_primitive),
    NativeMethod::new("setSField", field_set_primitive),
    NativeMethod::new("setIField", field_set_primitive),
    NativeMethod::new("setFField", field_set_primitive),
    NativeMethod::new("setJField", field_set_primitive),
    NativeMethod::new("setDField", field_set_primitive),
];

pub(super) const METHOD_NATIVES: &[NativeMethod] = &[
    NativeMethod::new("invokeNative", method_invoke),
    NativeMethod::new("getMethodModifiers", method_modifiers),
];

pub(super) const CONSTRUCTOR_NATIVES: &[NativeMethod] = &[
    NativeMethod::new("constructNative", constructor_new),
    NativeMethod::new("getConstructorModifiers", method_modifiers),
];

// Field accessors: (this, receiver, declaringClass, type, slot[, value])
const RECEIVER: usize = 1;
const DECLARING: usize = 2;
const TYPE: usize = 3;
const SLOT: usize = 4;
const VALUE: usize = 5;

fn field_modifiers(call: &mut NativeCall<'_>) -> NativeResult<StackTop> {
    let class = call.class_arg(1)?;
    let slot = call.slot(2)?;
    let field = class
        .field(slot)
        .ok_or_else(|| Failure::Internal(format!("{} has no field slot {}", class.name(), slot)))?;
    call.ret_int(i32::from(field.access_flags().bits()))
}

fn field_get(call: &mut NativeCall<'_>) -> NativeResult<StackTop> {
    let receiver = call.reference(RECEIVER)?;
    let class = call.class_arg(DECLARING)?;
    let slot = call.slot(SLOT)?;
    let boxed = get_field(call.vm(), call.env_mut(), &class, slot, receiver.as_ref())?;
    call.ret_ref(boxed)
}

fn field_set(call: &mut NativeCall<'_>) -> NativeResult<StackTop> {
    let receiver = call.reference(RECEIVER)?;
    let class = call.class_arg(DECLARING)?;
    let slot = call.slot(SLOT)?;
    let field_type = call.reference(TYPE)?.map(|mirror| Vm::class_of_mirror(&mirror)).transpose()?;
    let value = call.reference(VALUE)?;
    set_field(
        call.vm(),
        call.env_mut(),
        &class,
        slot,
        receiver.as_ref(),
        field_type.as_deref(),
        value.as_ref(),
    )?;
    call.ret_void()
}

fn field_get_primitive(call: &mut NativeCall<'_>) -> NativeResult<StackTop> {
    let want = call
        .return_primitive()
        .ok_or_else(|| Failure::Internal(format!("{:?} does not return a primitive", call.method())))?;
    let receiver = call.reference(RECEIVER)?;
    let class = call.class_arg(DECLARING)?;
    let slot = call.slot(SLOT)?;
    let value = get_primitive_field(call.vm(), call.env_mut(), &class, slot, receiver.as_ref(), want)?;
    call.ret_value(Some(value))
}

fn field_set_primitive(call: &mut NativeCall<'_>) -> NativeResult<StackTop> {
    let receiver = call.reference(RECEIVER)?;
    let class = call.class_arg(DECLARING)?;
    let slot = call.slot(SLOT)?;
    let value = call.arg(VALUE)?;
    set_primitive_field(call.vm(), call.env_mut(), &class, slot, receiver.as_ref(), value)?;
    call.ret_void()
}

/// `getMethodModifiers` / `getConstructorModifiers`: (this, declaringClass, slot)
fn method_modifiers(call: &mut NativeCall<'_>) -> NativeResult<StackTop> {
    let class = call.class_arg(1)?;
    let slot = call.slot(2)?;
    let method = class
        .method(slot)
        .ok_or_else(|| Failure::Internal(format!("{} has no method slot {}", class.name(), slot)))?;
    call.ret_int(i32::from(method.access_flags().bits()))
}

/// `invokeNative`: (this, receiver, args, declaringClass, slot)
fn method_invoke(call: &mut NativeCall<'_>) -> NativeResult<StackTop> {
    let receiver = call.reference(1)?;
    let args = call.reference(2)?;
    let class = call.class_arg(3)?;
    let slot = call.slot(4)?;
    let result = invoke_method(call.vm(), call.env_mut(), &class, slot, receiver.as_ref(), args.as_ref())?;
    call.ret_ref(result)
}

/// `constructNative`: (this, args, declaringClass, slot)
fn constructor_new(call: &mut NativeCall<'_>) -> NativeResult<StackTop> {
    let args = call.reference(1)?;
    let class = call.class_arg(2)?;
    let slot = call.slot(3)?;
    let obj = construct(call.vm(), call.env_mut(), &class, slot, args.as_ref())?;
    call.ret_ref(Some(obj))
}
