//! Native methods and the operand-stack calling convention
//!
//! A native receives its arguments already pushed on the caller's operand
//! stack, in declared order, starting at `base`:
//!
//! ```text
//!            base                                     top (on entry)
//!             │                                         │
//!   ... │ this │ arg1 │ arg2(J) │ WideTail │ arg3 │ ────┘
//!
//!   on return:
//!   ... │ result (0, 1 or 2 slots) │ ◄── StackTop = base + result slots
//! ```
//!
//! Argument positions come from the method's [`ArgLayout`], fixed when the
//! native was bound. A native consumes its arguments by returning through one
//! of the `ret_*` helpers, which truncate the stack to `base` and push the
//! result; on failure the dispatcher truncates to `base` instead, so the
//! interpreter never sees stale argument slots either way.

mod class;
mod class_loader;
mod object;
mod properties;
mod reflect;
mod registry;
mod runtime;
mod stack_walker;
mod string;
mod system;
mod thread;
mod throwable;

pub use registry::{NativeLookup, NativeRegistry};

use std::sync::Arc;

use crate::class::{Class, Method};
use crate::descriptor::ArgLayout;
use crate::error::{Failure, NativeResult};
use crate::object::ObjectRef;
use crate::thread::ExecEnv;
use crate::value::{PrimitiveType, Slot, Value};
use crate::vm::Vm;

/// Native implementation
pub type NativeFn = fn(&mut NativeCall<'_>) -> NativeResult<StackTop>;

/// Operand-stack height after a native returned
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct StackTop(pub usize);

/// Static table entry: method name, optional descriptor, implementation
#[derive(Clone, Copy)]
pub struct NativeMethod {
    /// Method name
    pub name: &'static str,
    /// Full descriptor, when the entry must match it exactly
    pub descriptor: Option<&'static str>,
    /// Implementation
    pub func: NativeFn,
}

impl NativeMethod {
    /// Entry matched by name alone
    pub const fn new(name: &'static str, func: NativeFn) -> Self {
        Self {
            name,
            descriptor: None,
            func,
        }
    }

    /// Entry matched by name and descriptor
    pub const fn with_descriptor(name: &'static str, descriptor: &'static str, func: NativeFn) -> Self {
        Self {
            name,
            descriptor: Some(descriptor),
            func,
        }
    }
}

impl std::fmt::Debug for NativeMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeMethod")
            .field("name", &self.name)
            .field("descriptor", &self.descriptor)
            .finish()
    }
}

/// Native groups installed at boot, keyed by owning class
pub(crate) fn bootstrap_groups() -> [(&'static str, &'static [NativeMethod]); 14] {
    [
        ("java/lang/VMObject", object::NATIVES),
        ("java/lang/VMSystem", system::NATIVES),
        ("java/lang/VMRuntime", runtime::NATIVES),
        ("java/lang/VMClass", class::NATIVES),
        ("java/lang/VMString", string::NATIVES),
        ("java/lang/VMThread", thread::NATIVES),
        ("java/lang/VMThrowable", throwable::NATIVES),
        ("java/lang/VMClassLoader", class_loader::NATIVES),
        ("java/lang/reflect/Field", reflect::FIELD_NATIVES),
        ("java/lang/reflect/Method", reflect::METHOD_NATIVES),
        ("java/lang/reflect/Constructor", reflect::CONSTRUCTOR_NATIVES),
        ("gnu/classpath/VMSystemProperties", properties::NATIVES),
        ("gnu/classpath/VMStackWalker", stack_walker::NATIVES),
        ("java/security/VMAccessController", stack_walker::ACCESS_CONTROLLER_NATIVES),
    ]
}

/// One activation of a native method
pub struct NativeCall<'a> {
    vm: &'a Arc<Vm>,
    env: &'a mut ExecEnv,
    class: &'a Arc<Class>,
    method: &'a Arc<Method>,
    layout: &'a ArgLayout,
    base: usize,
}

impl<'a> NativeCall<'a> {
    pub(crate) fn new(
        vm: &'a Arc<Vm>,
        env: &'a mut ExecEnv,
        class: &'a Arc<Class>,
        method: &'a Arc<Method>,
        layout: &'a ArgLayout,
        base: usize,
    ) -> Self {
        Self {
            vm,
            env,
            class,
            method,
            layout,
            base,
        }
    }

    /// The VM
    #[inline]
    pub fn vm(&self) -> &'a Arc<Vm> {
        self.vm
    }

    /// Executing thread's environment
    #[inline]
    pub fn env(&self) -> &ExecEnv {
        &*self.env
    }

    /// Executing thread's environment, mutably
    #[inline]
    pub fn env_mut(&mut self) -> &mut ExecEnv {
        &mut *self.env
    }

    /// Class declaring the native
    #[inline]
    pub fn class(&self) -> &'a Arc<Class> {
        self.class
    }

    /// The native method being run
    #[inline]
    pub fn method(&self) -> &'a Arc<Method> {
        self.method
    }

    /// Argument layout
    #[inline]
    pub fn layout(&self) -> &'a ArgLayout {
        self.layout
    }

    /// Stack position of the first argument
    #[inline]
    pub fn base(&self) -> usize {
        self.base
    }

    // ========================================================================
    // Arguments
    // ========================================================================

    /// Argument `index` (`this` is index 0 for instance natives)
    pub fn arg(&self, index: usize) -> NativeResult<Value> {
        let param = self.layout.param(index).ok_or_else(|| {
            Failure::Internal(format!("{:?} has no argument {}", self.method, index))
        })?;
        let slots = self.env.stack().slots_from(self.base + param.offset);
        Value::read_slots(slots, param.ty).ok_or_else(|| {
            Failure::Internal(format!(
                "{:?}: argument {} is {}",
                self.method,
                index,
                slots.first().map_or("missing", Slot::tag_name)
            ))
        })
    }

    /// Int-like argument (boolean, byte, char, short or int)
    pub fn int(&self, index: usize) -> NativeResult<i32> {
        match self.arg(index)? {
            Value::Int(v) => Ok(v),
            Value::Short(v) => Ok(v as i32),
            Value::Byte(v) => Ok(v as i32),
            Value::Char(v) => Ok(v as i32),
            Value::Boolean(v) => Ok(v as i32),
            other => Err(self.mismatch(index, "int", &other)),
        }
    }

    /// Member slot argument of a reflection native
    pub fn slot(&self, index: usize) -> NativeResult<usize> {
        let raw = self.int(index)?;
        usize::try_from(raw).map_err(|_| Failure::Internal(format!("{:?}: bad member slot {}", self.method, raw)))
    }

    /// Boolean argument
    pub fn boolean(&self, index: usize) -> NativeResult<bool> {
        Ok(self.int(index)? != 0)
    }

    /// Char argument
    pub fn char(&self, index: usize) -> NativeResult<u16> {
        Ok(self.int(index)? as u16)
    }

    /// Long argument
    pub fn long(&self, index: usize) -> NativeResult<i64> {
        match self.arg(index)? {
            Value::Long(v) => Ok(v),
            other => Err(self.mismatch(index, "long", &other)),
        }
    }

    /// Reference argument (may be null)
    pub fn reference(&self, index: usize) -> NativeResult<Option<ObjectRef>> {
        match self.arg(index)? {
            Value::Ref(obj) => Ok(obj),
            other => Err(self.mismatch(index, "reference", &other)),
        }
    }

    /// Non-null reference argument
    ///
    /// # Errors
    ///
    /// `NullReference` when the argument is null.
    pub fn object(&self, index: usize) -> NativeResult<ObjectRef> {
        self.reference(index)?.ok_or(Failure::NullReference)
    }

    /// Class mirrored by the non-null `java/lang/Class` argument `index`
    pub fn class_arg(&self, index: usize) -> NativeResult<Arc<Class>> {
        let mirror = self.object(index)?;
        Vm::class_of_mirror(&mirror)
    }

    /// Contents of the non-null string argument `index`
    pub fn string(&self, index: usize) -> NativeResult<String> {
        let obj = self.object(index)?;
        obj.as_str()
            .map(str::to_string)
            .ok_or_else(|| Failure::Internal(format!("{:?} is not a string", obj)))
    }

    fn mismatch(&self, index: usize, expected: &str, found: &Value) -> Failure {
        Failure::Internal(format!(
            "{:?}: argument {} expected {}, found {:?}",
            self.method, index, expected, found
        ))
    }

    // ========================================================================
    // Results
    // ========================================================================

    fn finish(&mut self, result: Option<&Value>) -> NativeResult<StackTop> {
        let stack = self.env.stack_mut();
        stack.truncate(self.base);
        if let Some(value) = result {
            let mut slots = Vec::with_capacity(2);
            value.push_slots(&mut slots);
            for slot in slots {
                stack.push(slot)?;
            }
        }
        Ok(StackTop(stack.len()))
    }

    /// Consume the arguments, push nothing
    pub fn ret_void(&mut self) -> NativeResult<StackTop> {
        self.finish(None)
    }

    /// Consume the arguments, push an int
    pub fn ret_int(&mut self, v: i32) -> NativeResult<StackTop> {
        self.finish(Some(&Value::Int(v)))
    }

    /// Consume the arguments, push a boolean
    pub fn ret_bool(&mut self, v: bool) -> NativeResult<StackTop> {
        self.finish(Some(&Value::Boolean(v)))
    }

    /// Consume the arguments, push a long (two slots)
    pub fn ret_long(&mut self, v: i64) -> NativeResult<StackTop> {
        self.finish(Some(&Value::Long(v)))
    }

    /// Consume the arguments, push a reference
    pub fn ret_ref(&mut self, obj: Option<ObjectRef>) -> NativeResult<StackTop> {
        self.finish(Some(&Value::Ref(obj)))
    }

    /// Consume the arguments, push `value` (nothing for `None`)
    pub fn ret_value(&mut self, value: Option<Value>) -> NativeResult<StackTop> {
        self.finish(value.as_ref())
    }

    /// Primitive type of the declared return value
    pub fn return_primitive(&self) -> Option<PrimitiveType> {
        self.method.signature().ret.as_ref().and_then(|ty| ty.primitive())
    }
}
