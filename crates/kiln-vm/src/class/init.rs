//! Class initialisation
//!
//! ```text
//! Uninitialized ──begin──► InProgress(thread) ──ok──► Initialized
//!                                 │
//!                                 └──err──► Failed(failure)
//! ```
//!
//! Exactly one thread runs a class's initialiser. Other threads block on the
//! condition variable until the state leaves `InProgress`; the initialising
//! thread itself re-entering sees the class as available. A failure is kept
//! and re-signalled to every later caller.

use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use super::Class;
use crate::error::{Failure, NativeResult};
use crate::thread::{ExecEnv, ThreadId};
use crate::vm::Vm;

#[derive(Debug, Clone)]
enum InitPhase {
    Uninitialized,
    InProgress(ThreadId),
    Initialized,
    Failed(Failure),
}

enum InitStep {
    Proceed,
    Done,
    Failed(Failure),
}

/// Initialisation state of one class
#[derive(Debug)]
pub struct InitState {
    phase: Mutex<InitPhase>,
    done: Condvar,
}

impl InitState {
    pub(crate) fn new() -> Self {
        Self {
            phase: Mutex::new(InitPhase::Uninitialized),
            done: Condvar::new(),
        }
    }

    pub(crate) fn initialized() -> Self {
        Self {
            phase: Mutex::new(InitPhase::Initialized),
            done: Condvar::new(),
        }
    }

    /// Check if initialisation completed successfully
    pub fn is_initialized(&self) -> bool {
        matches!(*self.phase.lock(), InitPhase::Initialized)
    }

    /// Failure recorded by a failed initialisation
    pub fn failure(&self) -> Option<Failure> {
        match &*self.phase.lock() {
            InitPhase::Failed(f) => Some(f.clone()),
            _ => None,
        }
    }

    fn begin(&self, me: ThreadId) -> InitStep {
        let mut phase = self.phase.lock();
        loop {
            match &*phase {
                InitPhase::Initialized => return InitStep::Done,
                InitPhase::Failed(f) => return InitStep::Failed(f.clone()),
                InitPhase::InProgress(owner) if *owner == me => return InitStep::Done,
                InitPhase::InProgress(_) => {}
                InitPhase::Uninitialized => break,
            }
            self.done.wait(&mut phase);
        }
        *phase = InitPhase::InProgress(me);
        InitStep::Proceed
    }

    fn finish(&self, result: &NativeResult<()>) {
        let mut phase = self.phase.lock();
        *phase = match result {
            Ok(()) => InitPhase::Initialized,
            Err(f) => InitPhase::Failed(f.clone()),
        };
        self.done.notify_all();
    }
}

impl Default for InitState {
    fn default() -> Self {
        Self::new()
    }
}

/// Initialise `class` (superclasses first) if it has not been already
pub fn initialize(vm: &Arc<Vm>, env: &mut ExecEnv, class: &Arc<Class>) -> NativeResult<()> {
    match class.init.begin(env.thread().id()) {
        InitStep::Done => return Ok(()),
        InitStep::Failed(recorded) => {
            return Err(Failure::NoClassDefFound {
                name: class.name().to_string(),
                cause: Some(Box::new(recorded)),
            })
        }
        InitStep::Proceed => {}
    }

    tracing::debug!(class = class.name(), "initialising");
    let result = run_initializer(vm, env, class);
    class.init.finish(&result);
    match &result {
        Ok(()) => tracing::debug!(class = class.name(), "initialised"),
        Err(failure) => tracing::warn!(class = class.name(), %failure, "initialisation failed"),
    }
    result
}

fn run_initializer(vm: &Arc<Vm>, env: &mut ExecEnv, class: &Arc<Class>) -> NativeResult<()> {
    if let Some(sup) = class.super_class() {
        initialize(vm, env, sup)?;
    }
    let Some(clinit) = class.class_initializer() else {
        return Ok(());
    };
    match vm.call_method(env, clinit, &[]) {
        Ok(_) => Ok(()),
        Err(cause) if is_error(&cause) => Err(cause),
        Err(cause) => Err(Failure::ExceptionInInitializer {
            class: class.name().to_string(),
            cause: Box::new(cause),
        }),
    }
}

/// Errors propagate out of an initialiser unwrapped; exceptions are wrapped
fn is_error(failure: &Failure) -> bool {
    match failure {
        Failure::Thrown(obj) => {
            let mut current = Some(obj.class());
            while let Some(class) = current {
                if class.name() == "java/lang/Error" {
                    return true;
                }
                current = class.super_class();
            }
            false
        }
        other => other.class_name().ends_with("Error"),
    }
}
