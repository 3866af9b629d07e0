//! `java/lang/VMObject`: class query, cloning and monitor waiting

use std::sync::Arc;
use std::time::Duration;

use crate::error::{Failure, NativeResult};
use crate::monitor::Monitor;

use super::{NativeCall, NativeMethod, StackTop};

pub(super) const NATIVES: &[NativeMethod] = &[
    NativeMethod::new("getClass", get_class),
    NativeMethod::new("clone", clone),
    NativeMethod::new("wait", wait),
    NativeMethod::new("notify", notify),
    NativeMethod::new("notifyAll", notify_all),
];

fn get_class(call: &mut NativeCall<'_>) -> NativeResult<StackTop> {
    let obj = call.object(0)?;
    let mirror = call.vm().mirror(obj.class())?;
    call.ret_ref(Some(mirror))
}

fn clone(call: &mut NativeCall<'_>) -> NativeResult<StackTop> {
    let obj = call.object(0)?;
    let copy = call.vm().heap().clone_object(&obj)?;
    call.ret_ref(Some(copy))
}

/// Wait duration from milliseconds and extra nanoseconds; 0/0 waits forever
pub(crate) fn timeout(millis: i64, nanos: i32) -> NativeResult<Option<Duration>> {
    if millis < 0 || !(0..1_000_000).contains(&nanos) {
        return Err(Failure::illegal_argument("timeout value is negative or out of range"));
    }
    if millis == 0 && nanos == 0 {
        return Ok(None);
    }
    Ok(Some(Duration::from_millis(millis as u64) + Duration::from_nanos(nanos as u64)))
}

fn wait(call: &mut NativeCall<'_>) -> NativeResult<StackTop> {
    let obj = call.object(0)?;
    let limit = timeout(call.long(1)?, call.int(2)?)?;
    let thread = Arc::clone(call.env().thread());
    Monitor::wait(&obj, &thread, limit)?;
    call.ret_void()
}

fn notify(call: &mut NativeCall<'_>) -> NativeResult<StackTop> {
    let obj = call.object(0)?;
    obj.monitor().notify(call.env().thread().id())?;
    call.ret_void()
}

fn notify_all(call: &mut NativeCall<'_>) -> NativeResult<StackTop> {
    let obj = call.object(0)?;
    obj.monitor().notify_all(call.env().thread().id())?;
    call.ret_void()
}
