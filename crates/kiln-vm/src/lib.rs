//! Kiln VM native layer
//!
//! This crate provides the VM-side services managed code calls into:
//! - Operand-stack native calling convention and the native registry
//! - Array copy with covariance and element checks
//! - Reflection bridge (field access with widening, invocation, boxing)
//! - Stack walking for caller-sensitive queries
//! - Class, thread, monitor and heap metadata behind the core natives

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod arraycopy;
pub mod class;
pub mod descriptor;
pub mod error;
pub mod heap;
pub mod host;
pub mod interp;
pub mod monitor;
pub mod natives;
pub mod object;
pub mod reflect;
pub mod stack;
pub mod thread;
pub mod value;
pub mod vm;
pub mod walker;

pub use arraycopy::array_copy;
pub use class::{AccessFlags, Class, ClassDef, ClassFileParser, ClassRegistry, Method};
pub use descriptor::{ArgLayout, FieldType, MethodSignature};
pub use error::{BootError, Failure, NativeResult};
pub use heap::Heap;
pub use host::{Host, ProcessHost};
pub use interp::{invoke_native, Interpreter, ScriptedInterpreter};
pub use natives::{NativeCall, NativeFn, NativeRegistry, StackTop};
pub use object::{ArrayData, Object, ObjectRef};
pub use stack::{Frame, FrameChain, OperandStack};
pub use thread::{ExecEnv, VmThread};
pub use value::{PrimitiveType, Slot, Value};
pub use vm::{Vm, VmBuilder, VmOptions};
pub use walker::StackWalker;
