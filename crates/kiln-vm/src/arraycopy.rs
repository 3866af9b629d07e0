//! Array copy engine (`System.arraycopy`)
//!
//! Validation order:
//!
//! 1. either array null → `NullReference`
//! 2. either argument not an array → `ArrayStore`
//! 3. negative index/length or range past either end → `ArrayIndexOutOfBounds`
//! 4. destination type can hold every source element → bulk copy
//! 5. both reference arrays, source dimensions ≤ destination dimensions →
//!    element-wise copy with a store check per element
//! 6. anything else → `ArrayStore`
//!
//! The bulk path behaves as if copying through a temporary buffer, so
//! overlapping ranges within one array are handled. The element-wise path
//! stops at the first element that fails the store check and leaves every
//! element copied before it in place.

use std::sync::Arc;

use parking_lot::MutexGuard;

use crate::error::{Failure, NativeResult};
use crate::object::{ArrayData, ObjectRef};

/// Copy `length` elements from `src[src_pos..]` to `dest[dest_pos..]`
pub fn array_copy(
    src: Option<&ObjectRef>,
    src_pos: i32,
    dest: Option<&ObjectRef>,
    dest_pos: i32,
    length: i32,
) -> NativeResult<()> {
    let (Some(src), Some(dest)) = (src, dest) else {
        return Err(Failure::NullReference);
    };

    let src_class = src.class();
    let dest_class = dest.class();
    if !src_class.is_array() || !dest_class.is_array() {
        return Err(Failure::ArrayStore);
    }

    let (Some(src_len), Some(dest_len)) = (src.array_len(), dest.array_len()) else {
        return Err(Failure::ArrayStore);
    };
    if src_pos < 0
        || dest_pos < 0
        || length < 0
        || src_pos as i64 + length as i64 > src_len as i64
        || dest_pos as i64 + length as i64 > dest_len as i64
    {
        return Err(Failure::ArrayIndexOutOfBounds);
    }
    let (src_pos, dest_pos, length) = (src_pos as usize, dest_pos as usize, length as usize);

    if src_class.is_assignable_to(dest_class) {
        return bulk_copy(src, src_pos, dest, dest_pos, length);
    }

    if !src_class.has_reference_elements()
        || !dest_class.has_reference_elements()
        || src_class.dimensions() > dest_class.dimensions()
    {
        return Err(Failure::ArrayStore);
    }
    checked_copy(src, src_pos, dest, dest_pos, length)
}

fn bulk_copy(src: &ObjectRef, src_pos: usize, dest: &ObjectRef, dest_pos: usize, length: usize) -> NativeResult<()> {
    if length == 0 {
        return Ok(());
    }
    if Arc::ptr_eq(src, dest) {
        let Some(mut data) = src.array() else {
            return Err(Failure::ArrayStore);
        };
        data.copy_within(src_pos, dest_pos, length);
        return Ok(());
    }

    let (src_data, mut dest_data) = lock_pair(src, dest)?;
    tracing::trace!(
        bytes = length * src_data.element_width(),
        "arraycopy bulk"
    );
    if dest_data.copy_from(dest_pos, &src_data, src_pos, length) {
        Ok(())
    } else {
        Err(Failure::ArrayStore)
    }
}

fn checked_copy(src: &ObjectRef, src_pos: usize, dest: &ObjectRef, dest_pos: usize, length: usize) -> NativeResult<()> {
    let Some(component) = dest.class().component_type().cloned() else {
        return Err(Failure::ArrayStore);
    };
    let (src_data, mut dest_data) = lock_pair(src, dest)?;
    let (Some(from), Some(to)) = (src_data.refs(), dest_data.refs_mut()) else {
        return Err(Failure::ArrayStore);
    };

    for i in 0..length {
        let element = &from[src_pos + i];
        if let Some(obj) = element {
            if !obj.class().is_assignable_to(&component) {
                tracing::trace!(copied = i, "arraycopy store check failed");
                return Err(Failure::ArrayStore);
            }
        }
        to[dest_pos + i] = element.clone();
    }
    Ok(())
}

/// Lock two distinct arrays in address order
fn lock_pair<'a>(
    src: &'a ObjectRef,
    dest: &'a ObjectRef,
) -> NativeResult<(MutexGuard<'a, ArrayData>, MutexGuard<'a, ArrayData>)> {
    let (Some(src_cell), Some(dest_cell)) = (src.array_cell(), dest.array_cell()) else {
        return Err(Failure::ArrayStore);
    };
    if Arc::as_ptr(src) < Arc::as_ptr(dest) {
        let s = src_cell.lock();
        let d = dest_cell.lock();
        Ok((s, d))
    } else {
        let d = dest_cell.lock();
        let s = src_cell.lock();
        Ok((s, d))
    }
}
