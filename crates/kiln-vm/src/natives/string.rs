//! `java/lang/VMString`

use crate::error::NativeResult;

use super::{NativeCall, NativeMethod, StackTop};

pub(super) const NATIVES: &[NativeMethod] = &[NativeMethod::new("intern", intern)];

fn intern(call: &mut NativeCall<'_>) -> NativeResult<StackTop> {
    let s = call.object(0)?;
    let canonical = call.vm().intern(&s)?;
    call.ret_ref(Some(canonical))
}
