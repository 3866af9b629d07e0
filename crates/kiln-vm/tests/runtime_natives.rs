//! Integration tests for boot checks and the runtime support natives
//!
//! Tests cover:
//! - Boot failures for unbound, ambiguous and missing bootstrap pieces
//! - System property initialisation order
//! - Heap, exit and library natives against an embedding host
//! - String interning, object cloning and identity hashes

mod common;

use std::sync::Arc;

use common::{attach, boot, int_array, ints, obj};
use kiln_vm::class::ClassDef;
use kiln_vm::error::BootError;
use kiln_vm::{Host, NativeCall, NativeResult, ScriptedInterpreter, StackTop, Value, Vm, VmOptions};
use parking_lot::Mutex;

fn noop(call: &mut NativeCall<'_>) -> NativeResult<StackTop> {
    call.ret_void()
}

fn boot_error(result: Result<Arc<Vm>, BootError>) -> BootError {
    match result {
        Ok(_) => panic!("boot unexpectedly succeeded"),
        Err(err) => err,
    }
}

#[test]
fn test_boot_rejects_unbound_bootstrap_native() {
    let string = ClassDef::new("java/lang/VMString")
        .static_native("intern", "(Ljava/lang/String;)Ljava/lang/String;")
        .static_native("compact", "()V");
    let err = boot_error(Vm::builder(VmOptions::default()).class(string).boot());
    match err {
        BootError::MissingNative { class, name, .. } => {
            assert_eq!(class, "java/lang/VMString");
            assert_eq!(name, "compact");
        }
        other => panic!("expected MissingNative, got {}", other),
    }
}

#[test]
fn test_boot_accepts_embedder_native_for_bootstrap_class() {
    let string = ClassDef::new("java/lang/VMString")
        .static_native("intern", "(Ljava/lang/String;)Ljava/lang/String;")
        .static_native("compact", "()V");
    let vm = Vm::builder(VmOptions::default())
        .native("java/lang/VMString", "compact", noop)
        .class(string)
        .boot()
        .unwrap();
    let mut env = attach(&vm);
    common::call(&vm, &mut env, "java/lang/VMString", "compact", "()V", &[]).unwrap();
}

#[test]
fn test_boot_rejects_ambiguous_native() {
    let err = boot_error(
        Vm::builder(VmOptions::default())
            .native("java/lang/VMRuntime", "gc", noop)
            .boot(),
    );
    assert!(matches!(err, BootError::AmbiguousNative { candidates: 2, .. }), "{}", err);
}

#[test]
fn test_descriptor_registration_wins_over_name_only() {
    let vm = Vm::builder(VmOptions::default())
        .native_with_descriptor("java/lang/VMRuntime", "gc", "()V", noop)
        .boot();
    assert!(vm.is_ok());
}

#[test]
fn test_boot_requires_protection_domain_field() {
    let class = ClassDef::new("java/lang/Class").implements("java/io/Serializable");
    let err = boot_error(Vm::builder(VmOptions::default()).class(class).boot());
    match err {
        BootError::MissingField { class, name, .. } => {
            assert_eq!(class, "java/lang/Class");
            assert_eq!(name, "pd");
        }
        other => panic!("expected MissingField, got {}", other),
    }
}

type Recorded = Arc<Mutex<Vec<(String, String)>>>;

fn recording_properties() -> (ScriptedInterpreter, Recorded) {
    let recorded: Recorded = Arc::default();
    let sink = Arc::clone(&recorded);
    let interpreter = ScriptedInterpreter::new().with(
        "java/util/Properties",
        "setProperty",
        "(Ljava/lang/String;Ljava/lang/String;)Ljava/lang/Object;",
        move |_vm, _env, args| {
            let text = |v: &Value| v.as_object().and_then(|s| s.as_str()).unwrap_or_default().to_string();
            sink.lock().push((text(&args[1]), text(&args[2])));
            Ok(Some(Value::null()))
        },
    );
    (interpreter, recorded)
}

fn init_properties(vm: &Arc<Vm>, phase: &str) {
    let mut env = attach(vm);
    let props = common::new_object(vm, "java/util/Properties");
    common::call(
        vm,
        &mut env,
        "gnu/classpath/VMSystemProperties",
        phase,
        "(Ljava/util/Properties;)V",
        &[obj(&props)],
    )
    .unwrap();
}

#[test]
fn test_pre_init_defines_vm_properties() {
    let (interpreter, recorded) = recording_properties();
    let vm = Vm::builder(VmOptions {
        class_path: vec!["/opt/app".into(), "/opt/lib".into()],
        ..VmOptions::default()
    })
    .interpreter(Arc::new(interpreter))
    .boot()
    .unwrap();
    init_properties(&vm, "preInit");

    let recorded = recorded.lock();
    let lookup = |key: &str| {
        recorded
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
            .unwrap_or_else(|| panic!("{} not set", key))
    };
    assert_eq!(lookup("java.vm.name"), "kiln");
    assert_eq!(lookup("os.name"), std::env::consts::OS);
    let separator = lookup("path.separator");
    assert_eq!(lookup("java.class.path"), format!("/opt/app{}/opt/lib", separator));
}

#[test]
fn test_post_init_applies_command_line_properties() {
    let (interpreter, recorded) = recording_properties();
    let vm = Vm::builder(VmOptions {
        properties: vec![("app.mode".to_string(), "batch".to_string())],
        ..VmOptions::default()
    })
    .interpreter(Arc::new(interpreter))
    .boot()
    .unwrap();
    init_properties(&vm, "postInit");
    assert_eq!(*recorded.lock(), vec![("app.mode".to_string(), "batch".to_string())]);
}

#[derive(Default)]
struct RecordingHost {
    exits: Mutex<Vec<i32>>,
    libraries: Mutex<Vec<String>>,
}

impl Host for RecordingHost {
    fn exit(&self, status: i32) {
        self.exits.lock().push(status);
    }

    fn load_library(&self, path: &str) -> bool {
        self.libraries.lock().push(path.to_string());
        path.ends_with(std::env::consts::DLL_SUFFIX)
    }
}

#[test]
fn test_exit_and_library_loading_go_through_host() {
    let host = Arc::new(RecordingHost::default());
    let vm = Vm::builder(VmOptions::default()).host(host.clone()).boot().unwrap();
    let mut env = attach(&vm);

    common::call(&vm, &mut env, "java/lang/VMRuntime", "exit", "(I)V", &[Value::Int(3)]).unwrap();
    assert_eq!(*host.exits.lock(), vec![3]);

    let mapped = common::call(
        &vm,
        &mut env,
        "java/lang/VMRuntime",
        "mapLibraryName",
        "(Ljava/lang/String;)Ljava/lang/String;",
        &[obj(&vm.new_string("zip").unwrap())],
    )
    .unwrap()
    .and_then(Value::into_object)
    .unwrap();
    let expected = format!("{}zip{}", std::env::consts::DLL_PREFIX, std::env::consts::DLL_SUFFIX);
    assert_eq!(mapped.as_str(), Some(expected.as_str()));

    let load = |env: &mut kiln_vm::ExecEnv, path: &str| {
        common::call(
            &vm,
            env,
            "java/lang/VMRuntime",
            "nativeLoad",
            "(Ljava/lang/String;)I",
            &[obj(&vm.new_string(path).unwrap())],
        )
        .unwrap()
    };
    assert_eq!(load(&mut env, &format!("/lib/{}", expected)), Some(Value::Int(1)));
    assert_eq!(load(&mut env, "/lib/missing"), Some(Value::Int(0)));
    assert_eq!(host.libraries.lock().len(), 2);
}

#[test]
fn test_memory_queries() {
    let vm = Vm::builder(VmOptions {
        max_heap_bytes: 64 * 1024 * 1024,
        ..VmOptions::default()
    })
    .boot()
    .unwrap();
    let mut env = attach(&vm);
    let query = |env: &mut kiln_vm::ExecEnv, name: &str| {
        common::call(&vm, env, "java/lang/VMRuntime", name, "()J", &[])
            .unwrap()
            .and_then(|v| v.as_long())
            .unwrap()
    };
    let free = query(&mut env, "freeMemory");
    let total = query(&mut env, "totalMemory");
    let max = query(&mut env, "maxMemory");
    assert!(0 <= free && free <= total);
    assert!(total <= max);
    assert_eq!(max, 64 * 1024 * 1024);
    common::call(&vm, &mut env, "java/lang/VMRuntime", "gc", "()V", &[]).unwrap();
}

#[test]
fn test_intern_returns_canonical_string() {
    let vm = boot();
    let mut env = attach(&vm);
    let intern = |env: &mut kiln_vm::ExecEnv, s: &str| {
        common::call(
            &vm,
            env,
            "java/lang/VMString",
            "intern",
            "(Ljava/lang/String;)Ljava/lang/String;",
            &[obj(&vm.new_string(s).unwrap())],
        )
        .unwrap()
        .and_then(Value::into_object)
        .unwrap()
    };
    let first = intern(&mut env, "kiln");
    let second = intern(&mut env, "kiln");
    assert!(Arc::ptr_eq(&first, &second));
    assert!(Arc::ptr_eq(&first, &vm.intern_str("kiln").unwrap()));
    assert!(!Arc::ptr_eq(&first, &intern(&mut env, "other")));
}

#[test]
fn test_clone_copies_array_contents() {
    let vm = boot();
    let mut env = attach(&vm);
    let original = int_array(&vm, &[1, 2, 3]);
    let copy = common::call(
        &vm,
        &mut env,
        "java/lang/VMObject",
        "clone",
        "(Ljava/lang/Cloneable;)Ljava/lang/Object;",
        &[obj(&original)],
    )
    .unwrap()
    .and_then(Value::into_object)
    .unwrap();
    assert!(!Arc::ptr_eq(&original, &copy));
    assert_eq!(ints(&copy), vec![1, 2, 3]);
    original.array().unwrap().set(0, Value::Int(9));
    assert_eq!(ints(&copy), vec![1, 2, 3]);
}

#[test]
fn test_identity_hash_and_get_class() {
    let vm = boot();
    let mut env = attach(&vm);
    let target = common::new_object(&vm, "java/lang/Object");
    let hash = |env: &mut kiln_vm::ExecEnv, v: Value| {
        common::call(&vm, env, "java/lang/VMSystem", "identityHashCode", "(Ljava/lang/Object;)I", &[v]).unwrap()
    };
    assert_eq!(hash(&mut env, Value::null()), Some(Value::Int(0)));
    let first = hash(&mut env, obj(&target));
    assert_eq!(first, hash(&mut env, obj(&target)));

    let class = common::call(
        &vm,
        &mut env,
        "java/lang/VMObject",
        "getClass",
        "(Ljava/lang/Object;)Ljava/lang/Class;",
        &[obj(&target)],
    )
    .unwrap();
    assert_eq!(class, Some(obj(&common::mirror(&vm, "java/lang/Object"))));
}
