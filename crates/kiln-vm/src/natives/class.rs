//! `java/lang/VMClass`: class introspection and `Class.forName`

use crate::class::{AccessFlags, Class};
use crate::descriptor::FieldType;
use crate::error::{Failure, NativeResult};
use crate::object::ObjectRef;
use crate::reflect::{class_array, declared_members, MemberKind};

use super::{NativeCall, NativeMethod, StackTop};

pub(super) const NATIVES: &[NativeMethod] = &[
    NativeMethod::new("isInstance", is_instance),
    NativeMethod::new("isAssignableFrom", is_assignable_from),
    NativeMethod::new("isInterface", is_interface),
    NativeMethod::new("isPrimitive", is_primitive),
    NativeMethod::new("isArray", is_array),
    NativeMethod::new("isSynthetic", is_synthetic),
    NativeMethod::new("isAnnotation", is_annotation),
    NativeMethod::new("isEnum", is_enum),
    NativeMethod::new("getSuperclass", get_superclass),
    NativeMethod::new("getComponentType", get_component_type),
    NativeMethod::new("getName", get_name),
    NativeMethod::new("getDeclaredClasses", get_declared_classes),
    NativeMethod::new("getDeclaringClass", get_declaring_class),
    NativeMethod::new("getDeclaredConstructors", get_declared_constructors),
    NativeMethod::new("getDeclaredMethods", get_declared_methods),
    NativeMethod::new("getDeclaredFields", get_declared_fields),
    NativeMethod::new("getInterfaces", get_interfaces),
    NativeMethod::new("getClassLoader", get_class_loader),
    NativeMethod::new("getModifiers", get_modifiers),
    NativeMethod::new("forName", for_name),
    NativeMethod::new("throwException", throw_exception),
    NativeMethod::new("hasClassInitializer", has_class_initializer),
];

fn is_instance(call: &mut NativeCall<'_>) -> NativeResult<StackTop> {
    let class = call.class_arg(0)?;
    let result = call.reference(1)?.is_some_and(|obj| class.is_instance(&obj));
    call.ret_bool(result)
}

fn is_assignable_from(call: &mut NativeCall<'_>) -> NativeResult<StackTop> {
    let class = call.class_arg(0)?;
    let other = call.class_arg(1)?;
    call.ret_bool(other.is_assignable_to(&class))
}

fn flag_query(call: &mut NativeCall<'_>, test: impl FnOnce(&Class) -> bool) -> NativeResult<StackTop> {
    let class = call.class_arg(0)?;
    call.ret_bool(test(&class))
}

fn is_interface(call: &mut NativeCall<'_>) -> NativeResult<StackTop> {
    flag_query(call, Class::is_interface)
}

fn is_primitive(call: &mut NativeCall<'_>) -> NativeResult<StackTop> {
    flag_query(call, Class::is_primitive)
}

fn is_array(call: &mut NativeCall<'_>) -> NativeResult<StackTop> {
    flag_query(call, Class::is_array)
}

fn is_synthetic(call: &mut NativeCall<'_>) -> NativeResult<StackTop> {
    flag_query(call, |c| c.access_flags().contains(AccessFlags::SYNTHETIC))
}

fn is_annotation(call: &mut NativeCall<'_>) -> NativeResult<StackTop> {
    flag_query(call, |c| c.access_flags().contains(AccessFlags::ANNOTATION))
}

fn is_enum(call: &mut NativeCall<'_>) -> NativeResult<StackTop> {
    flag_query(call, |c| c.access_flags().contains(AccessFlags::ENUM))
}

fn get_superclass(call: &mut NativeCall<'_>) -> NativeResult<StackTop> {
    let class = call.class_arg(0)?;
    let mirror = match class.super_class() {
        Some(sup) if !class.is_primitive() && !class.is_interface() => Some(call.vm().mirror(sup)?),
        _ => None,
    };
    call.ret_ref(mirror)
}

fn get_component_type(call: &mut NativeCall<'_>) -> NativeResult<StackTop> {
    let class = call.class_arg(0)?;
    let mirror = class.component_type().map(|c| call.vm().mirror(c)).transpose()?;
    call.ret_ref(mirror)
}

fn get_name(call: &mut NativeCall<'_>) -> NativeResult<StackTop> {
    let class = call.class_arg(0)?;
    let name = call.vm().new_string(&class.dotted_name())?;
    call.ret_ref(Some(name))
}

fn get_declared_classes(call: &mut NativeCall<'_>) -> NativeResult<StackTop> {
    let class = call.class_arg(0)?;
    let public_only = call.boolean(1)?;
    let vm = call.vm();
    let mut inner = Vec::with_capacity(class.inner_class_names().len());
    for name in class.inner_class_names() {
        let member = vm.find_class(call.env_mut(), name, class.loader())?;
        if member.declaring_class_name() != Some(class.name()) {
            continue;
        }
        if !public_only || member.modifiers(false).contains(AccessFlags::PUBLIC) {
            inner.push(member);
        }
    }
    let array = class_array(vm, &inner)?;
    call.ret_ref(Some(array))
}

fn get_declaring_class(call: &mut NativeCall<'_>) -> NativeResult<StackTop> {
    let class = call.class_arg(0)?;
    let vm = call.vm();
    let mirror = match class.declaring_class_name() {
        Some(outer) => {
            let outer = vm.find_class(call.env_mut(), outer, class.loader())?;
            Some(vm.mirror(&outer)?)
        }
        None => None,
    };
    call.ret_ref(mirror)
}

fn members(call: &mut NativeCall<'_>, kind: MemberKind) -> NativeResult<StackTop> {
    let class = call.class_arg(0)?;
    let public_only = call.boolean(1)?;
    let array = declared_members(call.vm(), &class, kind, public_only)?;
    call.ret_ref(Some(array))
}

fn get_declared_constructors(call: &mut NativeCall<'_>) -> NativeResult<StackTop> {
    members(call, MemberKind::Constructor)
}

fn get_declared_methods(call: &mut NativeCall<'_>) -> NativeResult<StackTop> {
    members(call, MemberKind::Method)
}

fn get_declared_fields(call: &mut NativeCall<'_>) -> NativeResult<StackTop> {
    members(call, MemberKind::Field)
}

fn get_interfaces(call: &mut NativeCall<'_>) -> NativeResult<StackTop> {
    let class = call.class_arg(0)?;
    let array = class_array(call.vm(), class.interfaces())?;
    call.ret_ref(Some(array))
}

fn get_class_loader(call: &mut NativeCall<'_>) -> NativeResult<StackTop> {
    let class = call.class_arg(0)?;
    call.ret_ref(class.loader().cloned())
}

fn get_modifiers(call: &mut NativeCall<'_>) -> NativeResult<StackTop> {
    let class = call.class_arg(0)?;
    let ignore_inner = call.boolean(1)?;
    call.ret_int(i32::from(class.modifiers(ignore_inner).bits()))
}

/// Internal form of a `Class.forName` argument, or `None` if it cannot name
/// a class
pub(crate) fn internal_class_name(dotted: &str) -> Option<String> {
    if dotted.is_empty() || dotted.contains('/') {
        return None;
    }
    let name = dotted.replace('.', "/");
    if name.starts_with('[') {
        // Array names must be complete descriptors
        match FieldType::parse(&name) {
            Ok(FieldType::Array(_)) => {}
            _ => return None,
        }
    }
    Some(name)
}

/// Mirror of the class named `dotted` as seen by `loader`, initialised on
/// request
///
/// Any failure while resolving is reported as `ClassNotFound` carrying it as
/// the cause.
pub(super) fn class_for_name(
    call: &mut NativeCall<'_>,
    dotted: &str,
    initialize: bool,
    loader: Option<&ObjectRef>,
) -> NativeResult<ObjectRef> {
    let vm = call.vm();
    let name = internal_class_name(dotted).ok_or_else(|| Failure::ClassNotFound {
        name: dotted.to_string(),
        cause: None,
    })?;
    let class = match vm.find_class(call.env_mut(), &name, loader) {
        Ok(class) => class,
        Err(failure @ Failure::ClassNotFound { .. }) => return Err(failure),
        Err(cause) => {
            return Err(Failure::ClassNotFound {
                name,
                cause: Some(Box::new(cause)),
            })
        }
    };
    if initialize {
        vm.initialize_class(call.env_mut(), &class)?;
    }
    vm.mirror(&class)
}

fn for_name(call: &mut NativeCall<'_>) -> NativeResult<StackTop> {
    let dotted = call.string(0)?;
    let initialize = call.boolean(1)?;
    let loader = call.reference(2)?;
    let mirror = class_for_name(call, &dotted, initialize, loader.as_ref())?;
    call.ret_ref(Some(mirror))
}

fn throw_exception(call: &mut NativeCall<'_>) -> NativeResult<StackTop> {
    let throwable = call.object(0)?;
    Err(Failure::Thrown(throwable))
}

fn has_class_initializer(call: &mut NativeCall<'_>) -> NativeResult<StackTop> {
    flag_query(call, |c| c.class_initializer().is_some())
}
