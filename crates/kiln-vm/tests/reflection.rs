//! Integration tests for the reflection natives
//!
//! Tests cover:
//! - Typed field reads and writes with primitive widening
//! - Receiver validation and static field class initialisation
//! - Reflective invocation with boxing and wrapped target failures
//! - Reflective construction and member enumeration

mod common;

use std::sync::Arc;

use common::{attach, boot_with, boxed_int, mirror, obj};
use kiln_vm::class::{AccessFlags, Class, ClassDef};
use kiln_vm::object::{ArrayData, ObjectRef};
use kiln_vm::reflect::unbox;
use kiln_vm::{ExecEnv, Failure, NativeResult, ScriptedInterpreter, Value, Vm};

const POINT: &str = "test/Point";
const FIELD: &str = "java/lang/reflect/Field";
const GET_PREFIX: &str = "(Ljava/lang/Object;Ljava/lang/Class;Ljava/lang/Class;I)";

fn point_class() -> ClassDef {
    ClassDef::new(POINT)
        .field("x", "I")
        .field("label", "Ljava/lang/String;")
        .field_with("hidden", "B", AccessFlags::PRIVATE)
        .static_field("COUNT", "J")
        .static_method("<clinit>", "()V", vec![0])
        .method("<init>", "(I)V", vec![0])
        .method("sum", "(II)I", vec![0])
        .method("fail", "()V", vec![0])
        .static_method("twice", "(J)J", vec![0])
        .static_method("seven", "()I", vec![0])
}

/// Subclass overriding `sum(II)I`
fn offset_class() -> ClassDef {
    ClassDef::new("test/Offset")
        .extends(POINT)
        .method("sum", "(II)I", vec![0])
}

fn abstract_class() -> ClassDef {
    ClassDef::new("test/Shape")
        .flags(AccessFlags::PUBLIC | AccessFlags::ABSTRACT)
        .method("<init>", "()V", vec![0])
}

fn write_int(obj: &ObjectRef, name: &str, value: i32) {
    let offset = obj.class().declared_field(name).unwrap().offset();
    assert!(obj.write_field(offset, &Value::Int(value)));
}

fn read_int(obj: &ObjectRef, name: &str) -> i32 {
    let offset = obj.class().declared_field(name).unwrap().offset();
    obj.read_field(offset, Some(kiln_vm::PrimitiveType::Int))
        .and_then(|v| v.as_int())
        .unwrap()
}

fn interpreter() -> ScriptedInterpreter {
    ScriptedInterpreter::new()
        .with(POINT, "<clinit>", "()V", |vm, _env, _args| {
            let class = vm.classes().find_bootstrap(POINT).unwrap();
            let offset = class.declared_field("COUNT").unwrap().offset();
            class.write_static(offset, &Value::Long(42));
            Ok(None)
        })
        .with(POINT, "<init>", "(I)V", |_vm, _env, args| {
            write_int(args[0].as_object().unwrap(), "x", args[1].as_int().unwrap());
            Ok(None)
        })
        .with(POINT, "sum", "(II)I", |_vm, _env, args| {
            let this = args[0].as_object().unwrap();
            let total = read_int(this, "x") + args[1].as_int().unwrap() + args[2].as_int().unwrap();
            Ok(Some(Value::Int(total)))
        })
        .with(POINT, "fail", "()V", |_vm, _env, _args| Err(Failure::IllegalMonitorState))
        .with(POINT, "twice", "(J)J", |_vm, _env, args| {
            Ok(Some(Value::Long(args[0].as_long().unwrap() * 2)))
        })
        .with(POINT, "seven", "()I", |_vm, _env, _args| Ok(Some(Value::Int(7))))
        .with("test/Offset", "sum", "(II)I", |_vm, _env, args| {
            Ok(Some(Value::Int(-(args[1].as_int().unwrap() + args[2].as_int().unwrap()))))
        })
}

fn boot() -> Arc<Vm> {
    boot_with(interpreter(), vec![point_class(), abstract_class(), offset_class()])
}

fn class(vm: &Vm, name: &str) -> Arc<Class> {
    vm.classes().find_bootstrap(name).unwrap()
}

fn field_slot(class: &Class, name: &str) -> i32 {
    class.fields().iter().position(|f| f.name() == name).unwrap() as i32
}

fn method_slot(class: &Class, name: &str, descriptor: &str) -> i32 {
    class.declared_method(name, descriptor).unwrap().slot() as i32
}

fn new_point(vm: &Vm, x: i32) -> ObjectRef {
    let point = common::new_object(vm, POINT);
    write_int(&point, "x", x);
    point
}

/// Run `Field.<name>` on field `field` of `test/Point`
fn field_native(
    vm: &Arc<Vm>,
    env: &mut ExecEnv,
    name: &str,
    descriptor: &str,
    receiver: Option<&ObjectRef>,
    field: &str,
    extra: Option<Value>,
) -> NativeResult<Option<Value>> {
    let handle = common::new_object(vm, FIELD);
    let point = class(vm, POINT);
    let mut args = vec![
        obj(&handle),
        Value::Ref(receiver.cloned()),
        obj(&mirror(vm, POINT)),
        Value::null(),
        Value::Int(field_slot(&point, field)),
    ];
    args.extend(extra);
    common::call(vm, env, FIELD, name, descriptor, &args)
}

fn get(vm: &Arc<Vm>, env: &mut ExecEnv, ty: char, receiver: Option<&ObjectRef>, field: &str) -> NativeResult<Option<Value>> {
    let descriptor = format!("{}{}", GET_PREFIX, ty);
    field_native(vm, env, &format!("get{}Field", ty), &descriptor, receiver, field, None)
}

fn set(vm: &Arc<Vm>, env: &mut ExecEnv, ty: char, receiver: Option<&ObjectRef>, field: &str, value: Value) -> NativeResult<Option<Value>> {
    let descriptor = format!("(Ljava/lang/Object;Ljava/lang/Class;Ljava/lang/Class;I{})V", ty);
    field_native(vm, env, &format!("set{}Field", ty), &descriptor, receiver, field, Some(value))
}

fn object_args(vm: &Vm, elements: Vec<Option<ObjectRef>>) -> ObjectRef {
    let class = vm.classes().find_bootstrap("[Ljava/lang/Object;").unwrap();
    vm.heap().alloc_array_with(&class, ArrayData::Ref(elements)).unwrap()
}

fn is_field_type_mismatch(failure: &Failure) -> bool {
    matches!(failure, Failure::IllegalArgument(msg) if msg == "field type mismatch")
}

#[test]
fn test_get_int_field() {
    let vm = boot();
    let mut env = attach(&vm);
    let point = new_point(&vm, 5);
    let value = get(&vm, &mut env, 'I', Some(&point), "x").unwrap();
    assert_eq!(value, Some(Value::Int(5)));
}

#[test]
fn test_get_widens_int_to_long_and_double() {
    let vm = boot();
    let mut env = attach(&vm);
    let point = new_point(&vm, -3);
    assert_eq!(get(&vm, &mut env, 'J', Some(&point), "x").unwrap(), Some(Value::Long(-3)));
    assert_eq!(get(&vm, &mut env, 'D', Some(&point), "x").unwrap(), Some(Value::Double(-3.0)));
}

#[test]
fn test_get_rejects_narrowing() {
    let vm = boot();
    let mut env = attach(&vm);
    let point = new_point(&vm, 1);
    for ty in ['B', 'S', 'C', 'Z'] {
        let err = get(&vm, &mut env, ty, Some(&point), "x").unwrap_err();
        assert!(is_field_type_mismatch(&err), "{}: {:?}", ty, err);
    }
}

#[test]
fn test_typed_get_of_reference_field_is_mismatch() {
    let vm = boot();
    let mut env = attach(&vm);
    let point = new_point(&vm, 1);
    let err = get(&vm, &mut env, 'I', Some(&point), "label").unwrap_err();
    assert!(is_field_type_mismatch(&err));
}

#[test]
fn test_instance_field_receiver_checks() {
    let vm = boot();
    let mut env = attach(&vm);
    let err = get(&vm, &mut env, 'I', None, "x").unwrap_err();
    assert!(matches!(err, Failure::NullReference));

    let stranger = common::new_object(&vm, "java/lang/Object");
    let err = get(&vm, &mut env, 'I', Some(&stranger), "x").unwrap_err();
    assert!(matches!(err, Failure::IllegalArgument(_)));
}

#[test]
fn test_set_widens_byte_into_int_field() {
    let vm = boot();
    let mut env = attach(&vm);
    let point = new_point(&vm, 0);
    set(&vm, &mut env, 'B', Some(&point), "x", Value::Byte(-7)).unwrap();
    assert_eq!(read_int(&point, "x"), -7);
}

#[test]
fn test_set_rejects_narrowing() {
    let vm = boot();
    let mut env = attach(&vm);
    let point = new_point(&vm, 9);
    let err = set(&vm, &mut env, 'J', Some(&point), "x", Value::Long(1)).unwrap_err();
    assert!(is_field_type_mismatch(&err));
    assert_eq!(read_int(&point, "x"), 9);
}

#[test]
fn test_static_field_runs_class_initialiser() {
    let vm = boot();
    let mut env = attach(&vm);
    assert!(!class(&vm, POINT).is_initialized());
    let value = get(&vm, &mut env, 'J', None, "COUNT").unwrap();
    assert_eq!(value, Some(Value::Long(42)));
    assert!(class(&vm, POINT).is_initialized());
}

#[test]
fn test_get_field_boxes_primitives() {
    let vm = boot();
    let mut env = attach(&vm);
    let point = new_point(&vm, 11);
    let descriptor = format!("{}Ljava/lang/Object;", GET_PREFIX);
    let boxed = field_native(&vm, &mut env, "getField", &descriptor, Some(&point), "x", None)
        .unwrap()
        .and_then(Value::into_object)
        .unwrap();
    assert_eq!(boxed.class().name(), "java/lang/Integer");
    assert_eq!(unbox(&boxed), Some(Value::Int(11)));
}

#[test]
fn test_set_field_unboxes_and_checks_references() {
    let vm = boot();
    let mut env = attach(&vm);
    let point = new_point(&vm, 0);
    let descriptor = "(Ljava/lang/Object;Ljava/lang/Class;Ljava/lang/Class;ILjava/lang/Object;)V";

    let boxed = boxed_int(&vm, 64);
    field_native(&vm, &mut env, "setField", descriptor, Some(&point), "x", Some(obj(&boxed))).unwrap();
    assert_eq!(read_int(&point, "x"), 64);

    let err = field_native(&vm, &mut env, "setField", descriptor, Some(&point), "label", Some(obj(&boxed)))
        .unwrap_err();
    assert!(is_field_type_mismatch(&err));

    let text = vm.new_string("north").unwrap();
    field_native(&vm, &mut env, "setField", descriptor, Some(&point), "label", Some(obj(&text))).unwrap();
}

#[test]
fn test_field_modifiers() {
    let vm = boot();
    let mut env = attach(&vm);
    let handle = common::new_object(&vm, FIELD);
    let point = class(&vm, POINT);
    let flags = common::call(
        &vm,
        &mut env,
        FIELD,
        "getFieldModifiers",
        "(Ljava/lang/Class;I)I",
        &[obj(&handle), obj(&mirror(&vm, POINT)), Value::Int(field_slot(&point, "hidden"))],
    )
    .unwrap();
    assert_eq!(flags, Some(Value::Int(i32::from(AccessFlags::PRIVATE.bits()))));
}

fn invoke(
    vm: &Arc<Vm>,
    env: &mut ExecEnv,
    receiver: Option<&ObjectRef>,
    args: ObjectRef,
    name: &str,
    descriptor: &str,
) -> NativeResult<Option<Value>> {
    let handle = common::new_object(vm, "java/lang/reflect/Method");
    let point = class(vm, POINT);
    common::call(
        vm,
        env,
        "java/lang/reflect/Method",
        "invokeNative",
        "(Ljava/lang/Object;[Ljava/lang/Object;Ljava/lang/Class;I)Ljava/lang/Object;",
        &[
            obj(&handle),
            Value::Ref(receiver.cloned()),
            obj(&args),
            obj(&mirror(vm, POINT)),
            Value::Int(method_slot(&point, name, descriptor)),
        ],
    )
}

#[test]
fn test_invoke_boxes_result() {
    let vm = boot();
    let mut env = attach(&vm);
    let point = new_point(&vm, 100);
    let args = object_args(&vm, vec![Some(boxed_int(&vm, 20)), Some(boxed_int(&vm, 3))]);
    let result = invoke(&vm, &mut env, Some(&point), args, "sum", "(II)I")
        .unwrap()
        .and_then(Value::into_object)
        .unwrap();
    assert_eq!(unbox(&result), Some(Value::Int(123)));
}

#[test]
fn test_invoke_static_widens_arguments() {
    let vm = boot();
    let mut env = attach(&vm);
    let args = object_args(&vm, vec![Some(boxed_int(&vm, 21))]);
    let result = invoke(&vm, &mut env, None, args, "twice", "(J)J")
        .unwrap()
        .and_then(Value::into_object)
        .unwrap();
    assert_eq!(unbox(&result), Some(Value::Long(42)));
}

#[test]
fn test_invoke_static_without_arguments_boxes_int() {
    let vm = boot();
    let mut env = attach(&vm);
    let result = invoke(&vm, &mut env, None, object_args(&vm, Vec::new()), "seven", "()I")
        .unwrap()
        .and_then(Value::into_object)
        .unwrap();
    assert_eq!(result.class().name(), "java/lang/Integer");
    assert_eq!(unbox(&result), Some(Value::Int(7)));
}

#[test]
fn test_invoke_dispatches_on_receiver_class() {
    let vm = boot();
    let mut env = attach(&vm);
    let offset = common::new_object(&vm, "test/Offset");
    let args = object_args(&vm, vec![Some(boxed_int(&vm, 3)), Some(boxed_int(&vm, 4))]);
    let result = invoke(&vm, &mut env, Some(&offset), args, "sum", "(II)I")
        .unwrap()
        .and_then(Value::into_object)
        .unwrap();
    assert_eq!(unbox(&result), Some(Value::Int(-7)));
}

#[test]
fn test_invoke_void_returns_null_and_wraps_failures() {
    let vm = boot();
    let mut env = attach(&vm);
    let point = new_point(&vm, 0);
    let err = invoke(&vm, &mut env, Some(&point), object_args(&vm, Vec::new()), "fail", "()V").unwrap_err();
    match err {
        Failure::InvocationTarget(cause) => assert!(matches!(*cause, Failure::IllegalMonitorState)),
        other => panic!("expected InvocationTarget, got {:?}", other),
    }
}

#[test]
fn test_invoke_argument_count_and_type() {
    let vm = boot();
    let mut env = attach(&vm);
    let point = new_point(&vm, 0);
    let err = invoke(&vm, &mut env, Some(&point), object_args(&vm, vec![Some(boxed_int(&vm, 1))]), "sum", "(II)I")
        .unwrap_err();
    assert!(matches!(err, Failure::IllegalArgument(_)));

    let text = vm.new_string("1").unwrap();
    let err = invoke(&vm, &mut env, Some(&point), object_args(&vm, vec![Some(text), Some(boxed_int(&vm, 1))]), "sum", "(II)I")
        .unwrap_err();
    assert!(matches!(err, Failure::IllegalArgument(_)));
}

fn construct(vm: &Arc<Vm>, env: &mut ExecEnv, class_name: &str, descriptor: &str, args: ObjectRef) -> NativeResult<Option<Value>> {
    let handle = common::new_object(vm, "java/lang/reflect/Constructor");
    let target = class(vm, class_name);
    common::call(
        vm,
        env,
        "java/lang/reflect/Constructor",
        "constructNative",
        "([Ljava/lang/Object;Ljava/lang/Class;I)Ljava/lang/Object;",
        &[
            obj(&handle),
            obj(&args),
            obj(&mirror(vm, class_name)),
            Value::Int(method_slot(&target, "<init>", descriptor)),
        ],
    )
}

#[test]
fn test_construct_runs_initialisers() {
    let vm = boot();
    let mut env = attach(&vm);
    let args = object_args(&vm, vec![Some(boxed_int(&vm, 8))]);
    let point = construct(&vm, &mut env, POINT, "(I)V", args)
        .unwrap()
        .and_then(Value::into_object)
        .unwrap();
    assert_eq!(point.class().name(), POINT);
    assert_eq!(read_int(&point, "x"), 8);
    assert!(class(&vm, POINT).is_initialized());
}

#[test]
fn test_construct_abstract_class_fails() {
    let vm = boot();
    let mut env = attach(&vm);
    let err = construct(&vm, &mut env, "test/Shape", "()V", object_args(&vm, Vec::new())).unwrap_err();
    assert!(matches!(err, Failure::Instantiation(_)));
}

#[test]
fn test_declared_fields_public_only() {
    let vm = boot();
    let mut env = attach(&vm);
    let count = |public_only: bool, env: &mut ExecEnv| {
        common::call(
            &vm,
            env,
            "java/lang/VMClass",
            "getDeclaredFields",
            "(Ljava/lang/Class;Z)[Ljava/lang/reflect/Field;",
            &[obj(&mirror(&vm, POINT)), Value::Boolean(public_only)],
        )
        .unwrap()
        .and_then(Value::into_object)
        .and_then(|array| array.array_len())
        .unwrap()
    };
    assert_eq!(count(false, &mut env), 4);
    assert_eq!(count(true, &mut env), 3);
}

/// `test/Param` defined by a parent loader, `test/User` by a child loader
fn split_loaders(vm: &Arc<Vm>) -> (Arc<Class>, Arc<Class>) {
    let parent = common::new_object(vm, "java/lang/ClassLoader");
    let child = common::new_object(vm, "java/lang/ClassLoader");
    let param = vm.define_class(ClassDef::new("test/Param"), Some(&parent)).unwrap();
    let user = vm
        .define_class(
            ClassDef::new("test/User")
                .field("p", "Ltest/Param;")
                .method("take", "(Ltest/Param;)V", vec![0]),
            Some(&child),
        )
        .unwrap();
    (param, user)
}

#[test]
fn test_set_field_of_type_from_parent_loader() {
    let vm = boot();
    let mut env = attach(&vm);
    let (param, user_class) = split_loaders(&vm);
    let user = vm.heap().alloc_object(&user_class).unwrap();
    let value = vm.heap().alloc_object(&param).unwrap();
    let slot = field_slot(&user_class, "p") as usize;

    kiln_vm::reflect::set_field(&vm, &mut env, &user_class, slot, Some(&user), None, Some(&value)).unwrap();
    let stored = common::field(&user, "p", "Ltest/Param;").into_object().unwrap();
    assert!(Arc::ptr_eq(&stored, &value));

    kiln_vm::reflect::set_field(&vm, &mut env, &user_class, slot, Some(&user), Some(param.as_ref()), Some(&value)).unwrap();

    let text = vm.new_string("not a param").unwrap();
    let err = kiln_vm::reflect::set_field(&vm, &mut env, &user_class, slot, Some(&user), None, Some(&text))
        .unwrap_err();
    assert!(is_field_type_mismatch(&err));
}

#[test]
fn test_invoke_argument_of_type_from_parent_loader() {
    let vm = boot_with(
        interpreter().with("test/User", "take", "(Ltest/Param;)V", |_vm, _env, _args| Ok(None)),
        vec![point_class(), abstract_class(), offset_class()],
    );
    let mut env = attach(&vm);
    let (param, user_class) = split_loaders(&vm);
    let user = vm.heap().alloc_object(&user_class).unwrap();
    let value = vm.heap().alloc_object(&param).unwrap();
    let slot = method_slot(&user_class, "take", "(Ltest/Param;)V") as usize;

    let args = object_args(&vm, vec![Some(value)]);
    let result = kiln_vm::reflect::invoke_method(&vm, &mut env, &user_class, slot, Some(&user), Some(&args)).unwrap();
    assert!(result.is_none());
}
