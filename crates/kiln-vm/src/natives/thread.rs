//! `java/lang/VMThread`: thread creation, sleeping and interruption
//!
//! Each managed thread runs on its own OS thread with its own [`ExecEnv`].
//!
//! ```text
//! create(thread) ──► VMThread object ──► ThreadTable
//!        │
//!        └─ spawn ──► thread.run()V ──► mark terminated
//!                                       ├─ Thread.vmThread = null
//!                                       ├─ notifyAll on the Thread (join)
//!                                       └─ remove from ThreadTable
//! ```

use std::sync::Arc;
use std::time::Duration;

use crate::error::{Failure, NativeResult};
use crate::object::ObjectRef;
use crate::thread::{ExecEnv, VmThread};
use crate::value::Value;
use crate::vm::{get_instance_field, set_instance_field, Vm};

use super::object::timeout;
use super::{NativeCall, NativeMethod, StackTop};

pub(super) const NATIVES: &[NativeMethod] = &[
    NativeMethod::new("currentThread", current_thread),
    NativeMethod::new("create", create),
    NativeMethod::new("sleep", sleep),
    NativeMethod::new("yield", yield_now),
    NativeMethod::new("interrupted", interrupted),
    NativeMethod::new("holdsLock", holds_lock),
    NativeMethod::new("interrupt", interrupt),
    NativeMethod::new("isAlive", is_alive),
    NativeMethod::new("isInterrupted", is_interrupted),
    NativeMethod::new("nativeSetPriority", set_priority),
];

fn current_thread(call: &mut NativeCall<'_>) -> NativeResult<StackTop> {
    let thread = call.env().thread().java_thread().cloned();
    call.ret_ref(thread)
}

fn create(call: &mut NativeCall<'_>) -> NativeResult<StackTop> {
    let thread_obj = call.object(0)?;
    let vm = Arc::clone(call.vm());

    let vm_thread_class = vm.bootstrap_class("java/lang/VMThread")?;
    let vm_thread_obj = vm.heap().alloc_object(&vm_thread_class)?;
    set_instance_field(&vm_thread_obj, "thread", Value::object(Arc::clone(&thread_obj)))?;
    set_instance_field(&thread_obj, "vmThread", Value::object(Arc::clone(&vm_thread_obj)))?;

    let name = get_instance_field(&thread_obj, "name", None)
        .ok()
        .and_then(Value::into_object)
        .and_then(|s| s.as_str().map(str::to_string))
        .unwrap_or_else(|| format!("Thread-{}", vm.threads().len()));

    let record = VmThread::new(name.clone());
    record.set_java_thread(Arc::clone(&thread_obj));
    vm.threads().register(&vm_thread_obj, Arc::clone(&record));

    let env = vm.new_env(record);
    let key = Arc::clone(&vm_thread_obj);
    let spawned = std::thread::Builder::new()
        .name(name)
        .spawn(move || run_thread(vm, env, thread_obj, vm_thread_obj));
    if let Err(err) = spawned {
        call.vm().threads().remove(&key);
        tracing::warn!(%err, "thread spawn failed");
        return Err(Failure::OutOfMemory("unable to create native thread".to_string()));
    }
    call.ret_void()
}

fn run_thread(vm: Arc<Vm>, mut env: ExecEnv, thread_obj: ObjectRef, vm_thread_obj: ObjectRef) {
    let record = Arc::clone(env.thread());
    tracing::debug!(thread = record.name(), "thread started");
    if let Err(failure) = vm.call_virtual(&mut env, &thread_obj, "run", "()V", &[]) {
        tracing::debug!(thread = record.name(), %failure, "uncaught failure ended thread");
    }

    record.mark_terminated();
    let tid = record.id();
    let monitor = thread_obj.monitor();
    monitor.enter(tid);
    if let Err(failure) = set_instance_field(&thread_obj, "vmThread", Value::null()) {
        tracing::warn!(%failure, "could not detach thread object");
    }
    // Wakes joiners waiting on the Thread object
    if let Err(failure) = monitor.notify_all(tid) {
        tracing::warn!(%failure, "could not wake joiners");
    }
    if let Err(failure) = monitor.exit(tid) {
        tracing::warn!(%failure, "could not release thread object");
    }
    vm.threads().remove(&vm_thread_obj);
    tracing::debug!(thread = record.name(), "thread terminated");
}

fn sleep(call: &mut NativeCall<'_>) -> NativeResult<StackTop> {
    let duration = timeout(call.long(0)?, call.int(1)?)?.unwrap_or(Duration::ZERO);
    call.env().thread().sleep(duration)?;
    call.ret_void()
}

fn yield_now(call: &mut NativeCall<'_>) -> NativeResult<StackTop> {
    std::thread::yield_now();
    call.ret_void()
}

fn interrupted(call: &mut NativeCall<'_>) -> NativeResult<StackTop> {
    let was = call.env().thread().take_interrupt();
    call.ret_bool(was)
}

fn holds_lock(call: &mut NativeCall<'_>) -> NativeResult<StackTop> {
    let obj = call.object(0)?;
    let held = obj.monitor().is_owned_by(call.env().thread().id());
    call.ret_bool(held)
}

/// Record behind the `java/lang/VMThread` receiver, if still running
fn receiver_record(call: &NativeCall<'_>) -> NativeResult<Option<Arc<VmThread>>> {
    let this = call.object(0)?;
    Ok(call.vm().threads().get(&this))
}

fn interrupt(call: &mut NativeCall<'_>) -> NativeResult<StackTop> {
    if let Some(record) = receiver_record(call)? {
        record.interrupt();
    }
    call.ret_void()
}

fn is_alive(call: &mut NativeCall<'_>) -> NativeResult<StackTop> {
    let alive = receiver_record(call)?.is_some_and(|r| r.is_alive());
    call.ret_bool(alive)
}

fn is_interrupted(call: &mut NativeCall<'_>) -> NativeResult<StackTop> {
    let interrupted = receiver_record(call)?.is_some_and(|r| r.is_interrupted());
    call.ret_bool(interrupted)
}

fn set_priority(call: &mut NativeCall<'_>) -> NativeResult<StackTop> {
    // OS priorities are left alone
    let _priority = call.int(1)?;
    call.ret_void()
}
