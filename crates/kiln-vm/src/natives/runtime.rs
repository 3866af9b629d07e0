//! `java/lang/VMRuntime`: heap figures, collection hints, exit and library
//! loading

use crate::error::NativeResult;
use crate::host::map_library_name;

use super::{NativeCall, NativeMethod, StackTop};

pub(super) const NATIVES: &[NativeMethod] = &[
    NativeMethod::new("freeMemory", free_memory),
    NativeMethod::new("totalMemory", total_memory),
    NativeMethod::new("maxMemory", max_memory),
    NativeMethod::new("gc", gc),
    NativeMethod::new("runFinalization", run_finalization),
    NativeMethod::new("exit", exit),
    NativeMethod::new("nativeLoad", native_load),
    NativeMethod::new("mapLibraryName", map_name),
];

fn free_memory(call: &mut NativeCall<'_>) -> NativeResult<StackTop> {
    let free = call.vm().heap().free_memory();
    call.ret_long(free)
}

fn total_memory(call: &mut NativeCall<'_>) -> NativeResult<StackTop> {
    let total = call.vm().heap().total_memory();
    call.ret_long(total)
}

fn max_memory(call: &mut NativeCall<'_>) -> NativeResult<StackTop> {
    let max = call.vm().heap().max_memory();
    call.ret_long(max)
}

fn gc(call: &mut NativeCall<'_>) -> NativeResult<StackTop> {
    call.vm().heap().collect();
    call.ret_void()
}

fn run_finalization(call: &mut NativeCall<'_>) -> NativeResult<StackTop> {
    call.vm().heap().run_finalization();
    call.ret_void()
}

fn exit(call: &mut NativeCall<'_>) -> NativeResult<StackTop> {
    let status = call.int(0)?;
    call.vm().host().exit(status);
    call.ret_void()
}

fn native_load(call: &mut NativeCall<'_>) -> NativeResult<StackTop> {
    let path = call.string(0)?;
    let loaded = call.vm().host().load_library(&path);
    call.ret_int(i32::from(loaded))
}

fn map_name(call: &mut NativeCall<'_>) -> NativeResult<StackTop> {
    let name = call.string(0)?;
    let mapped = call.vm().new_string(&map_library_name(&name))?;
    call.ret_ref(Some(mapped))
}
