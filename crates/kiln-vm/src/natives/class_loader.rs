//! `java/lang/VMClassLoader`: bootstrap loading, class definition and boot
//! class path resources

use crate::error::{Failure, NativeResult};
use crate::object::{ArrayData, ObjectRef};
use crate::value::{PrimitiveType, Value};

use super::class::class_for_name;
use super::{NativeCall, NativeMethod, StackTop};

pub(super) const NATIVES: &[NativeMethod] = &[
    NativeMethod::new("loadClass", load_class),
    NativeMethod::new("getPrimitiveClass", get_primitive_class),
    NativeMethod::new("defineClass", define_class),
    NativeMethod::new("findLoadedClass", find_loaded_class),
    NativeMethod::new("resolveClass", resolve_class),
    NativeMethod::new("getBootClassPathSize", boot_class_path_size),
    NativeMethod::new("getBootClassPathResource", boot_class_path_resource),
];

fn load_class(call: &mut NativeCall<'_>) -> NativeResult<StackTop> {
    let name = call.string(0)?;
    let resolve = call.boolean(1)?;
    let mirror = class_for_name(call, &name, resolve, None)?;
    call.ret_ref(Some(mirror))
}

fn get_primitive_class(call: &mut NativeCall<'_>) -> NativeResult<StackTop> {
    let code = call.char(0)?;
    let vm = call.vm();
    let mirror = match char::from_u32(u32::from(code)).and_then(PrimitiveType::from_descriptor) {
        Some(ty) => Some(vm.mirror(&vm.classes().primitive_class(ty))?),
        None => None,
    };
    call.ret_ref(mirror)
}

/// `len` bytes of a `byte[]` starting at `offset`
///
/// # Errors
///
/// `NullReference` for a null array, `ArrayIndexOutOfBounds` when the range
/// does not fit.
pub(crate) fn byte_range(array: Option<&ObjectRef>, offset: i32, len: i32) -> NativeResult<Vec<u8>> {
    let array = array.ok_or(Failure::NullReference)?;
    let data = array
        .array()
        .ok_or_else(|| Failure::Internal(format!("{:?} is not an array", array)))?;
    let ArrayData::Byte(bytes) = &*data else {
        return Err(Failure::Internal(format!("{:?} is not a byte array", array)));
    };
    if offset < 0 || len < 0 || i64::from(offset) + i64::from(len) > bytes.len() as i64 {
        return Err(Failure::ArrayIndexOutOfBounds);
    }
    let start = offset as usize;
    Ok(bytes[start..start + len as usize].iter().map(|&b| b as u8).collect())
}

fn define_class(call: &mut NativeCall<'_>) -> NativeResult<StackTop> {
    let loader = call.reference(0)?;
    let name = call
        .reference(1)?
        .and_then(|s| s.as_str().map(|n| n.replace('.', "/")));
    let array = call.reference(2)?;
    let bytes = byte_range(array.as_ref(), call.int(3)?, call.int(4)?)?;
    let pd = call.reference(5)?;

    let vm = call.vm();
    let def = vm.parse_class(name.as_deref(), &bytes)?;
    if let Some(expected) = &name {
        if *expected != def.name {
            return Err(Failure::NoClassDefFound {
                name: format!("{} (wrong name: {})", expected, def.name),
                cause: None,
            });
        }
    }
    let class = vm.define_class(def, loader.as_ref())?;
    let mirror = vm.mirror(&class)?;
    mirror.write_field(vm.pd_offset(), &Value::Ref(pd));
    tracing::debug!(class = class.name(), "class defined");
    call.ret_ref(Some(mirror))
}

fn find_loaded_class(call: &mut NativeCall<'_>) -> NativeResult<StackTop> {
    let loader = call.reference(0)?;
    let name = call.string(1)?.replace('.', "/");
    let vm = call.vm();
    let mirror = vm
        .classes()
        .find_loaded(&name, loader.as_ref())
        .map(|class| vm.mirror(&class))
        .transpose()?;
    call.ret_ref(mirror)
}

fn resolve_class(call: &mut NativeCall<'_>) -> NativeResult<StackTop> {
    let class = call.class_arg(0)?;
    call.vm().initialize_class(call.env_mut(), &class)?;
    call.ret_void()
}

fn boot_class_path_size(call: &mut NativeCall<'_>) -> NativeResult<StackTop> {
    let size = call.vm().options().boot_class_path.len();
    call.ret_int(i32::try_from(size).unwrap_or(i32::MAX))
}

fn boot_class_path_resource(call: &mut NativeCall<'_>) -> NativeResult<StackTop> {
    let name = call.string(0)?;
    let index = call.int(1)?;
    let vm = call.vm();
    let entry = usize::try_from(index)
        .ok()
        .and_then(|i| vm.options().boot_class_path.get(i));
    let url = match entry.map(|dir| dir.join(&name)) {
        Some(path) if path.exists() => Some(vm.new_string(&format!("file://{}", path.display()))?),
        _ => None,
    };
    call.ret_ref(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_range_null_array() {
        assert!(matches!(byte_range(None, 0, 0), Err(Failure::NullReference)));
    }
}
