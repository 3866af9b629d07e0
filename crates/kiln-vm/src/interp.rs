//! Execution collaborator and native dispatch
//!
//! Bytecode execution is delegated to an [`Interpreter`]. Whenever a method's
//! code is native, [`invoke_native`] runs it under the operand-stack
//! convention:
//!
//! ```text
//! interpreter pushes args ──► invoke_native ──► push frame ──► NativeFn
//!                                   │                             │
//!                                   │◄──── Ok(StackTop) ──────────┤
//!                                   │◄──── Err(Failure) ──────────┘
//!                                   ▼
//!                      pop frame; on Err: truncate to base and
//!                      record the failure as pending on the thread
//! ```

use std::sync::Arc;

use dashmap::DashMap;

use crate::class::{LinkedNative, Method};
use crate::error::{Failure, NativeResult};
use crate::natives::{NativeCall, StackTop};
use crate::thread::ExecEnv;
use crate::value::Value;
use crate::vm::Vm;

/// Executes non-native method bodies
pub trait Interpreter: Send + Sync {
    /// Run `method` with `args` (receiver first for instance methods)
    ///
    /// The VM has already pushed the method's frame; the interpreter may call
    /// [`invoke_native`] or [`Vm::call_method`] for nested calls.
    fn execute(
        &self,
        vm: &Arc<Vm>,
        env: &mut ExecEnv,
        method: &Arc<Method>,
        args: &[Value],
    ) -> NativeResult<Option<Value>>;
}

/// Host-defined method body
pub type MethodBody =
    Arc<dyn Fn(&Arc<Vm>, &mut ExecEnv, &[Value]) -> NativeResult<Option<Value>> + Send + Sync>;

/// Interpreter running Rust closures registered per method
///
/// Stands in for a bytecode engine when embedding or testing; a method with
/// no registered body fails with `Internal`.
#[derive(Default)]
pub struct ScriptedInterpreter {
    bodies: DashMap<(String, String, String), MethodBody>,
}

impl ScriptedInterpreter {
    /// Create an interpreter with no bodies
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the body of `class.name descriptor`
    pub fn define<F>(&self, class: &str, name: &str, descriptor: &str, body: F)
    where
        F: Fn(&Arc<Vm>, &mut ExecEnv, &[Value]) -> NativeResult<Option<Value>> + Send + Sync + 'static,
    {
        self.bodies.insert(
            (class.to_string(), name.to_string(), descriptor.to_string()),
            Arc::new(body),
        );
    }

    /// Builder form of [`ScriptedInterpreter::define`]
    pub fn with<F>(self, class: &str, name: &str, descriptor: &str, body: F) -> Self
    where
        F: Fn(&Arc<Vm>, &mut ExecEnv, &[Value]) -> NativeResult<Option<Value>> + Send + Sync + 'static,
    {
        self.define(class, name, descriptor, body);
        self
    }

    /// Number of registered bodies
    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    /// Check if no body is registered
    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }
}

impl Interpreter for ScriptedInterpreter {
    fn execute(
        &self,
        vm: &Arc<Vm>,
        env: &mut ExecEnv,
        method: &Arc<Method>,
        args: &[Value],
    ) -> NativeResult<Option<Value>> {
        let key = (
            method.class_name().to_string(),
            method.name().to_string(),
            method.descriptor().to_string(),
        );
        // Clone out so the map shard is not locked while the body runs
        let body = self
            .bodies
            .get(&key)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| Failure::Internal(format!("no code for {:?}", method)))?;
        body(vm, env, args)
    }
}

/// Run native `method` on the arguments at the top of `env`'s operand stack
///
/// On success the arguments have been replaced by the result slots and the
/// returned [`StackTop`] is the new stack height. On failure the arguments
/// are dropped, nothing is pushed, and the failure is both returned and left
/// pending on `env` for an interpreter loop to poll.
pub fn invoke_native(vm: &Arc<Vm>, env: &mut ExecEnv, method: &Arc<Method>) -> NativeResult<StackTop> {
    let outcome = dispatch(vm, env, method);
    if let Err(failure) = &outcome {
        env.set_pending(failure.clone());
    }
    outcome
}

fn dispatch(vm: &Arc<Vm>, env: &mut ExecEnv, method: &Arc<Method>) -> NativeResult<StackTop> {
    let base = env
        .stack()
        .len()
        .checked_sub(method.arg_layout().arg_slots())
        .ok_or_else(|| Failure::Internal(format!("operand stack underflow calling {:?}", method)))?;
    let linked: &LinkedNative = match vm.link_native(method) {
        Ok(linked) => linked,
        Err(failure) => {
            env.stack_mut().truncate(base);
            return Err(failure);
        }
    };
    let layout = &linked.layout;
    let class = match method.class() {
        Some(class) => class,
        None => {
            env.stack_mut().truncate(base);
            return Err(Failure::Internal(format!("{:?} outlived its class", method)));
        }
    };

    env.frames_mut().push_real(Arc::clone(method));
    let result = {
        let mut call = NativeCall::new(vm, env, &class, method, layout, base);
        (linked.func)(&mut call)
    };
    env.frames_mut().pop();

    let expected = StackTop(base + layout.result_slots());
    match result {
        Ok(top) if top == expected && env.stack().len() == top.0 => Ok(top),
        Ok(top) => {
            env.stack_mut().truncate(base);
            Err(Failure::Internal(format!(
                "{:?} returned stack top {} instead of {}",
                method, top.0, expected.0
            )))
        }
        Err(failure) => {
            env.stack_mut().truncate(base);
            Err(failure)
        }
    }
}
