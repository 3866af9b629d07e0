//! Integration tests for the caller-sensitive natives
//!
//! Tests cover:
//! - `getCallingClass` seen through a reflective trampoline
//! - `getClassContext` ordering
//! - `VMAccessController.getStack` class and name arrays

mod common;

use std::sync::Arc;

use common::{attach, boot_with, obj};
use kiln_vm::class::ClassDef;
use kiln_vm::object::ObjectRef;
use kiln_vm::{ExecEnv, NativeResult, ScriptedInterpreter, Value, Vm};

const CALLER: &str = "test/Caller";
const TARGET: &str = "test/Target";
const QUERY: &str = "()Ljava/lang/Object;";

fn classes() -> Vec<ClassDef> {
    vec![
        ClassDef::new(CALLER)
            .static_method("viaReflection", "(I)Ljava/lang/Object;", vec![0])
            .static_method("direct", "()Ljava/lang/Object;", vec![0]),
        ClassDef::new(TARGET)
            .static_method("callingClass", QUERY, vec![0])
            .static_method("context", QUERY, vec![0])
            .static_method("stack", QUERY, vec![0]),
    ]
}

fn walker_native(vm: &Arc<Vm>, env: &mut ExecEnv, class: &str, name: &str, descriptor: &str) -> NativeResult<Option<Value>> {
    common::call(vm, env, class, name, descriptor, &[])
}

fn interpreter() -> ScriptedInterpreter {
    ScriptedInterpreter::new()
        .with(CALLER, "viaReflection", "(I)Ljava/lang/Object;", |vm, env, args| {
            let handle = common::new_object(vm, "java/lang/reflect/Method");
            let empty = common::new_array(vm, "[Ljava/lang/Object;", 0);
            common::call(
                vm,
                env,
                "java/lang/reflect/Method",
                "invokeNative",
                "(Ljava/lang/Object;[Ljava/lang/Object;Ljava/lang/Class;I)Ljava/lang/Object;",
                &[
                    obj(&handle),
                    Value::null(),
                    obj(&empty),
                    obj(&common::mirror(vm, TARGET)),
                    args[0].clone(),
                ],
            )
        })
        .with(CALLER, "direct", "()Ljava/lang/Object;", |vm, env, _args| {
            common::call(vm, env, TARGET, "callingClass", QUERY, &[])
        })
        .with(TARGET, "callingClass", QUERY, |vm, env, _args| {
            walker_native(vm, env, "gnu/classpath/VMStackWalker", "getCallingClass", "()Ljava/lang/Class;")
        })
        .with(TARGET, "context", QUERY, |vm, env, _args| {
            walker_native(vm, env, "gnu/classpath/VMStackWalker", "getClassContext", "()[Ljava/lang/Class;")
        })
        .with(TARGET, "stack", QUERY, |vm, env, _args| {
            walker_native(vm, env, "java/security/VMAccessController", "getStack", "()[[Ljava/lang/Object;")
        })
}

fn reflect_into(vm: &Arc<Vm>, env: &mut ExecEnv, target: &str) -> ObjectRef {
    let class = vm.classes().find_bootstrap(TARGET).unwrap();
    let slot = class.declared_method(target, QUERY).unwrap().slot() as i32;
    common::call(vm, env, CALLER, "viaReflection", "(I)Ljava/lang/Object;", &[Value::Int(slot)])
        .unwrap()
        .and_then(Value::into_object)
        .unwrap()
}

fn class_names(array: &ObjectRef) -> Vec<String> {
    let data = array.array().unwrap();
    data.refs()
        .unwrap()
        .iter()
        .map(|mirror| {
            Vm::class_of_mirror(mirror.as_ref().unwrap())
                .unwrap()
                .name()
                .to_string()
        })
        .collect()
}

#[test]
fn test_calling_class_skips_reflection() {
    let vm = boot_with(interpreter(), classes());
    let mut env = attach(&vm);
    let mirror = reflect_into(&vm, &mut env, "callingClass");
    assert_eq!(Vm::class_of_mirror(&mirror).unwrap().name(), CALLER);
}

#[test]
fn test_calling_class_of_direct_call() {
    let vm = boot_with(interpreter(), classes());
    let mut env = attach(&vm);
    let mirror = common::call(&vm, &mut env, CALLER, "direct", QUERY, &[])
        .unwrap()
        .and_then(Value::into_object)
        .unwrap();
    assert_eq!(Vm::class_of_mirror(&mirror).unwrap().name(), CALLER);
}

#[test]
fn test_calling_class_with_no_caller() {
    let vm = boot_with(interpreter(), classes());
    let mut env = attach(&vm);
    let result = common::call(&vm, &mut env, TARGET, "callingClass", QUERY, &[]).unwrap();
    assert_eq!(result, Some(Value::null()));
}

#[test]
fn test_calling_class_loader_of_bootstrap_caller() {
    let vm = boot_with(interpreter(), classes());
    let mut env = attach(&vm);
    let result = walker_native(
        &vm,
        &mut env,
        "gnu/classpath/VMStackWalker",
        "getCallingClassLoader",
        "()Ljava/lang/ClassLoader;",
    )
    .unwrap();
    assert_eq!(result, Some(Value::null()));
}

#[test]
fn test_class_context_order() {
    let vm = boot_with(interpreter(), classes());
    let mut env = attach(&vm);
    let context = reflect_into(&vm, &mut env, "context");
    assert_eq!(class_names(&context), vec![TARGET, "java/lang/reflect/Method", CALLER]);
}

#[test]
fn test_get_stack_pairs_classes_with_names() {
    let vm = boot_with(interpreter(), classes());
    let mut env = attach(&vm);
    let pair = reflect_into(&vm, &mut env, "stack");
    assert_eq!(pair.class().name(), "[[Ljava/lang/Object;");

    let halves: Vec<ObjectRef> = pair
        .array()
        .unwrap()
        .refs()
        .unwrap()
        .iter()
        .map(|half| half.clone().unwrap())
        .collect();
    assert_eq!(halves.len(), 2);

    assert_eq!(
        class_names(&halves[0]),
        vec![
            "java/security/VMAccessController",
            TARGET,
            "java/lang/reflect/Method",
            CALLER,
        ]
    );
    let names: Vec<ObjectRef> = halves[1]
        .array()
        .unwrap()
        .refs()
        .unwrap()
        .iter()
        .map(|name| name.clone().unwrap())
        .collect();
    let text: Vec<&str> = names.iter().map(|name| name.as_str().unwrap()).collect();
    assert_eq!(text, vec!["getStack", "stack", "invokeNative", "viaReflection"]);

    let interned = vm.intern_str("stack").unwrap();
    assert!(Arc::ptr_eq(&interned, &names[1]));
}
