//! `java/lang/VMSystem`

use crate::arraycopy::array_copy;
use crate::error::NativeResult;

use super::{NativeCall, NativeMethod, StackTop};

pub(super) const NATIVES: &[NativeMethod] = &[
    NativeMethod::new("arraycopy", arraycopy),
    NativeMethod::new("identityHashCode", identity_hash_code),
];

fn arraycopy(call: &mut NativeCall<'_>) -> NativeResult<StackTop> {
    let src = call.reference(0)?;
    let dest = call.reference(2)?;
    array_copy(src.as_ref(), call.int(1)?, dest.as_ref(), call.int(3)?, call.int(4)?)?;
    call.ret_void()
}

fn identity_hash_code(call: &mut NativeCall<'_>) -> NativeResult<StackTop> {
    let hash = call.reference(0)?.map_or(0, |obj| obj.identity_hash());
    call.ret_int(hash)
}
