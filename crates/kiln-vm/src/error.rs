//! Failure kinds signalled by VM operations
//!
//! Every fallible operation returns [`NativeResult`]. A [`Failure`] is the
//! managed exception that would be raised on the executing thread; it maps
//! onto a managed class name via [`Failure::class_name`]. Fatal start-up
//! problems are reported separately through [`BootError`].

use std::fmt;

use crate::object::ObjectRef;

/// Result of every fallible VM operation
pub type NativeResult<T> = Result<T, Failure>;

/// A signalled VM failure
#[derive(Debug, Clone, thiserror::Error)]
pub enum Failure {
    /// A null reference was used where an object is required
    #[error("NullPointerException")]
    NullReference,

    /// Array index or range outside the array bounds
    #[error("ArrayIndexOutOfBoundsException")]
    ArrayIndexOutOfBounds,

    /// Value not storable into an array (or argument is not an array)
    #[error("ArrayStoreException")]
    ArrayStore,

    /// Negative array length
    #[error("NegativeArraySizeException: {0}")]
    NegativeArraySize(i32),

    /// Invalid argument to a reflective operation
    #[error("IllegalArgumentException: {0}")]
    IllegalArgument(String),

    /// Monitor operation by a thread that does not own the monitor
    #[error("IllegalMonitorStateException")]
    IllegalMonitorState,

    /// Blocking operation interrupted
    #[error("InterruptedException")]
    Interrupted,

    /// Heap limit reached
    #[error("OutOfMemoryError: {0}")]
    OutOfMemory(String),

    /// Class lookup by name failed
    #[error("ClassNotFoundException: {name}")]
    ClassNotFound {
        /// Internal (slash) name that was requested
        name: String,
        /// Failure pending when the lookup gave up
        #[source]
        cause: Option<Box<Failure>>,
    },

    /// Class previously failed to load or initialise
    #[error("NoClassDefFoundError: {name}")]
    NoClassDefFound {
        /// Internal name of the class
        name: String,
        /// Original failure
        #[source]
        cause: Option<Box<Failure>>,
    },

    /// Static initialiser raised a failure
    #[error("ExceptionInInitializerError: {class}")]
    ExceptionInInitializer {
        /// Internal name of the class being initialised
        class: String,
        /// Failure raised by the initialiser
        #[source]
        cause: Box<Failure>,
    },

    /// Reflectively invoked method raised a failure
    #[error("InvocationTargetException")]
    InvocationTarget(#[source] Box<Failure>),

    /// Native method without a bound implementation
    #[error("UnsatisfiedLinkError: {0}")]
    UnsatisfiedLink(String),

    /// Conflicting class definitions
    #[error("LinkageError: {0}")]
    Linkage(String),

    /// Class definition rejected
    #[error("ClassFormatError: {0}")]
    ClassFormat(String),

    /// Abstract class or interface instantiated
    #[error("InstantiationException: {0}")]
    Instantiation(String),

    /// Virtual dispatch reached an abstract method
    #[error("AbstractMethodError: {0}")]
    AbstractMethod(String),

    /// Method required by the VM is missing
    #[error("NoSuchMethodError: {0}")]
    NoSuchMethod(String),

    /// Broken VM invariant (malformed operand stack, missing bootstrap piece)
    #[error("InternalError: {0}")]
    Internal(String),

    /// Managed throwable raised by code
    #[error("thrown {}", ThrownClass(.0))]
    Thrown(ObjectRef),
}

impl Failure {
    /// Managed exception class this failure corresponds to
    pub fn class_name(&self) -> &str {
        match self {
            Failure::NullReference => "java/lang/NullPointerException",
            Failure::ArrayIndexOutOfBounds => "java/lang/ArrayIndexOutOfBoundsException",
            Failure::ArrayStore => "java/lang/ArrayStoreException",
            Failure::NegativeArraySize(_) => "java/lang/NegativeArraySizeException",
            Failure::IllegalArgument(_) => "java/lang/IllegalArgumentException",
            Failure::IllegalMonitorState => "java/lang/IllegalMonitorStateException",
            Failure::Interrupted => "java/lang/InterruptedException",
            Failure::OutOfMemory(_) => "java/lang/OutOfMemoryError",
            Failure::ClassNotFound { .. } => "java/lang/ClassNotFoundException",
            Failure::NoClassDefFound { .. } => "java/lang/NoClassDefFoundError",
            Failure::ExceptionInInitializer { .. } => "java/lang/ExceptionInInitializerError",
            Failure::InvocationTarget(_) => "java/lang/reflect/InvocationTargetException",
            Failure::UnsatisfiedLink(_) => "java/lang/UnsatisfiedLinkError",
            Failure::Linkage(_) => "java/lang/LinkageError",
            Failure::ClassFormat(_) => "java/lang/ClassFormatError",
            Failure::Instantiation(_) => "java/lang/InstantiationException",
            Failure::AbstractMethod(_) => "java/lang/AbstractMethodError",
            Failure::NoSuchMethod(_) => "java/lang/NoSuchMethodError",
            Failure::Internal(_) => "java/lang/InternalError",
            Failure::Thrown(obj) => obj.class().name(),
        }
    }

    /// Shorthand for `IllegalArgument`
    pub fn illegal_argument(msg: impl Into<String>) -> Self {
        Failure::IllegalArgument(msg.into())
    }

    /// Chained cause, if this kind carries one
    pub fn cause(&self) -> Option<&Failure> {
        match self {
            Failure::ClassNotFound { cause, .. } | Failure::NoClassDefFound { cause, .. } => {
                cause.as_deref()
            }
            Failure::ExceptionInInitializer { cause, .. } => Some(cause),
            Failure::InvocationTarget(cause) => Some(cause),
            _ => None,
        }
    }

    /// Check if this failure (not its causes) is of the given managed class
    pub fn is(&self, class_name: &str) -> bool {
        self.class_name() == class_name
    }
}

struct ThrownClass<'a>(&'a ObjectRef);

impl fmt::Display for ThrownClass<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.class().name())
    }
}

/// Fatal VM start-up error
///
/// Without the bootstrap pieces the VM cannot verify its own invariants, so
/// these never surface as managed failures.
#[derive(Debug, thiserror::Error)]
pub enum BootError {
    /// A bootstrap class could not be defined
    #[error("bootstrap class {name} could not be defined: {cause}")]
    Class {
        /// Internal class name
        name: String,
        /// Definition failure
        #[source]
        cause: Failure,
    },

    /// Required bootstrap class is absent
    #[error("missing bootstrap class {0}")]
    MissingClass(String),

    /// Required bootstrap field is absent
    #[error("missing bootstrap field {class}.{name} {descriptor}")]
    MissingField {
        /// Declaring class
        class: String,
        /// Field name
        name: String,
        /// Expected descriptor
        descriptor: String,
    },

    /// A bootstrap class declares a native with no registered implementation
    #[error("no native implementation for {class}.{name}{descriptor}")]
    MissingNative {
        /// Owning class
        class: String,
        /// Method name
        name: String,
        /// Method descriptor
        descriptor: String,
    },

    /// Several registry entries match a bootstrap native by name
    #[error("ambiguous native {class}.{name}: {candidates} candidates")]
    AmbiguousNative {
        /// Owning class
        class: String,
        /// Method name
        name: String,
        /// Number of name-only matches
        candidates: usize,
    },
}
