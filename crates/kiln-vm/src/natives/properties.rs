//! `gnu/classpath/VMSystemProperties`
//!
//! `preInit` fills in what the VM knows about itself and the host;
//! `postInit` applies the properties given on the command line, so those
//! override the defaults.

use std::path::PathBuf;
use std::sync::Arc;

use crate::error::NativeResult;
use crate::object::ObjectRef;
use crate::thread::ExecEnv;
use crate::value::Value;
use crate::vm::Vm;

use super::{NativeCall, NativeMethod, StackTop};

pub(super) const NATIVES: &[NativeMethod] = &[
    NativeMethod::new("preInit", pre_init),
    NativeMethod::new("postInit", post_init),
];

const SET_PROPERTY: &str = "(Ljava/lang/String;Ljava/lang/String;)Ljava/lang/Object;";

fn join_paths(paths: &[PathBuf]) -> String {
    std::env::join_paths(paths)
        .map(|joined| joined.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Properties the VM defines before command-line ones are applied
pub(crate) fn default_properties(vm: &Vm) -> Vec<(&'static str, String)> {
    let options = vm.options();
    let home = std::env::var("HOME").unwrap_or_default();
    let user = std::env::var("USER").unwrap_or_default();
    let cwd = std::env::current_dir()
        .map(|p| p.display().to_string())
        .unwrap_or_default();
    let path_separator = if cfg!(windows) { ";" } else { ":" };
    let line_separator = if cfg!(windows) { "\r\n" } else { "\n" };

    vec![
        ("java.vm.name", "kiln".to_string()),
        ("java.vm.version", env!("CARGO_PKG_VERSION").to_string()),
        ("java.vm.vendor", "kiln".to_string()),
        ("java.vm.specification.version", "1.0".to_string()),
        ("java.class.path", join_paths(&options.class_path)),
        ("java.boot.class.path", join_paths(&options.boot_class_path)),
        ("java.library.path", join_paths(&options.library_path)),
        ("os.name", std::env::consts::OS.to_string()),
        ("os.arch", std::env::consts::ARCH.to_string()),
        ("file.separator", std::path::MAIN_SEPARATOR.to_string()),
        ("path.separator", path_separator.to_string()),
        ("line.separator", line_separator.to_string()),
        ("user.name", user),
        ("user.home", home),
        ("user.dir", cwd),
    ]
}

fn set_property(vm: &Arc<Vm>, env: &mut ExecEnv, props: &ObjectRef, key: &str, value: &str) -> NativeResult<()> {
    let key = vm.new_string(key)?;
    let value = vm.new_string(value)?;
    vm.call_virtual(env, props, "setProperty", SET_PROPERTY, &[Value::object(key), Value::object(value)])?;
    Ok(())
}

fn pre_init(call: &mut NativeCall<'_>) -> NativeResult<StackTop> {
    let props = call.object(0)?;
    let vm = call.vm();
    for (key, value) in default_properties(vm) {
        set_property(vm, call.env_mut(), &props, key, &value)?;
    }
    call.ret_void()
}

fn post_init(call: &mut NativeCall<'_>) -> NativeResult<StackTop> {
    let props = call.object(0)?;
    let vm = call.vm();
    for (key, value) in &vm.options().properties {
        set_property(vm, call.env_mut(), &props, key, value)?;
    }
    call.ret_void()
}
