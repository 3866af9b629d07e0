//! Shared fixtures for the integration tests

#![allow(dead_code)]

use std::sync::Arc;

use kiln_vm::class::ClassDef;
use kiln_vm::object::{ArrayData, ObjectRef};
use kiln_vm::{ExecEnv, NativeResult, ScriptedInterpreter, Value, Vm, VmOptions};

/// Boot with the built-in classes and no interpreted bodies
pub fn boot() -> Arc<Vm> {
    boot_with(ScriptedInterpreter::new(), Vec::new())
}

/// Boot with `interpreter` and extra bootstrap-loader classes
pub fn boot_with(interpreter: ScriptedInterpreter, classes: Vec<ClassDef>) -> Arc<Vm> {
    let mut builder = Vm::builder(VmOptions::default()).interpreter(Arc::new(interpreter));
    for def in classes {
        builder = builder.class(def);
    }
    builder.boot().unwrap()
}

/// Attach the test thread
pub fn attach(vm: &Arc<Vm>) -> ExecEnv {
    vm.attach_current_thread("main").unwrap()
}

/// Call `class.name descriptor` with `args` through the VM
pub fn call(
    vm: &Arc<Vm>,
    env: &mut ExecEnv,
    class: &str,
    name: &str,
    descriptor: &str,
    args: &[Value],
) -> NativeResult<Option<Value>> {
    let class = vm.classes().find_bootstrap(class).unwrap();
    let method = Arc::clone(class.declared_method(name, descriptor).unwrap());
    vm.call_method(env, &method, args)
}

/// Zero-filled array of the named array class
pub fn new_array(vm: &Vm, class: &str, len: i32) -> ObjectRef {
    let class = vm.classes().find_bootstrap(class).unwrap();
    vm.heap().alloc_array(&class, len).unwrap()
}

/// `int[]` holding `values`
pub fn int_array(vm: &Vm, values: &[i32]) -> ObjectRef {
    let class = vm.classes().find_bootstrap("[I").unwrap();
    vm.heap()
        .alloc_array_with(&class, ArrayData::Int(values.to_vec()))
        .unwrap()
}

/// Elements of an `int[]`
pub fn ints(array: &ObjectRef) -> Vec<i32> {
    match &*array.array().unwrap() {
        ArrayData::Int(values) => values.clone(),
        other => panic!("not an int array: {:?}", other.element_type()),
    }
}

/// Instance of a bootstrap class
pub fn new_object(vm: &Vm, class: &str) -> ObjectRef {
    let class = vm.classes().find_bootstrap(class).unwrap();
    vm.heap().alloc_object(&class).unwrap()
}

/// Boxed `int`
pub fn boxed_int(vm: &Vm, v: i32) -> ObjectRef {
    kiln_vm::reflect::box_value(vm, Value::Int(v)).unwrap().unwrap()
}

/// Mirror of a bootstrap class
pub fn mirror(vm: &Vm, class: &str) -> ObjectRef {
    let class = vm.classes().find_bootstrap(class).unwrap();
    vm.mirror(&class).unwrap()
}

/// Reference value
pub fn obj(o: &ObjectRef) -> Value {
    Value::object(Arc::clone(o))
}

/// Read field `name` of `obj`, searching superclasses
pub fn field(obj: &ObjectRef, name: &str, descriptor: &str) -> Value {
    let (class, slot) = obj.class().lookup_field(name, descriptor).unwrap();
    let field = class.field(slot).unwrap();
    obj.read_field(field.offset(), field.ty().primitive()).unwrap()
}
