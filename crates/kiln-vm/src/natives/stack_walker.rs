//! `gnu/classpath/VMStackWalker` and `java/security/VMAccessController`
//!
//! Caller-sensitive queries. Each runs in its own native frame, so the frame
//! at the top of the chain is the native itself.

use crate::error::NativeResult;
use crate::reflect::{class_array, object_array};

use super::{NativeCall, NativeMethod, StackTop};

pub(super) const NATIVES: &[NativeMethod] = &[
    NativeMethod::new("getClassContext", get_class_context),
    NativeMethod::new("getCallingClass", get_calling_class),
    NativeMethod::new("getCallingClassLoader", get_calling_class_loader),
];

pub(super) const ACCESS_CONTROLLER_NATIVES: &[NativeMethod] =
    &[NativeMethod::new("getStack", get_stack)];

fn get_class_context(call: &mut NativeCall<'_>) -> NativeResult<StackTop> {
    let vm = call.vm();
    let classes = vm.walker().class_context(call.env().frames().top());
    let array = class_array(vm, &classes)?;
    call.ret_ref(Some(array))
}

fn get_calling_class(call: &mut NativeCall<'_>) -> NativeResult<StackTop> {
    let vm = call.vm();
    let mirror = vm
        .walker()
        .calling_class(call.env().frames().top())
        .map(|class| vm.mirror(&class))
        .transpose()?;
    call.ret_ref(mirror)
}

fn get_calling_class_loader(call: &mut NativeCall<'_>) -> NativeResult<StackTop> {
    let vm = call.vm();
    let loader = vm
        .walker()
        .calling_class(call.env().frames().top())
        .and_then(|class| class.loader().cloned());
    call.ret_ref(loader)
}

/// `Object[][2]`: the classes and method names of every real frame, newest
/// first
fn get_stack(call: &mut NativeCall<'_>) -> NativeResult<StackTop> {
    let vm = call.vm();
    let snapshot = vm.walker().snapshot(call.env().frames().top());

    let classes = class_array(vm, &snapshot.classes)?;
    let names = snapshot
        .names
        .iter()
        .map(|name| vm.intern_str(name).map(Some))
        .collect::<NativeResult<Vec<_>>>()?;
    let string_class = vm.bootstrap_class("java/lang/String")?;
    let names = object_array(vm, &string_class, names)?;

    let object_class = vm.bootstrap_class("java/lang/Object")?;
    let object_array_class = vm.classes().array_of(&object_class);
    let pair = object_array(vm, &object_array_class, vec![Some(classes), Some(names)])?;
    call.ret_ref(Some(pair))
}
