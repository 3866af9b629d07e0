//! VM context
//!
//! A [`Vm`] owns every shared component: loaded classes, the native registry,
//! the heap, the intern table and the live-thread table, plus the external
//! collaborators (interpreter, host, class-file parser). Per-thread state is
//! kept out of it in [`ExecEnv`].
//!
//! # Boot
//!
//! ```text
//! VmBuilder::boot
//!   ├─ define bootstrap classes (superclasses first)
//!   ├─ bind every bootstrap native  ── miss / ambiguity ──► BootError
//!   ├─ locate java/lang/Class.pd    ── missing ───────────► BootError
//!   └─ define embedder classes (natives bound leniently)
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;

use crate::class::{self, bootstrap_classes, Class, ClassDef, ClassFileParser, ClassRegistry, LinkedNative, Method};
use crate::error::{BootError, Failure, NativeResult};
use crate::heap::Heap;
use crate::host::{Host, ProcessHost};
use crate::interp::{invoke_native, Interpreter, ScriptedInterpreter};
use crate::natives::{NativeFn, NativeLookup, NativeRegistry};
use crate::object::ObjectRef;
use crate::stack::DEFAULT_MAX_STACK_SLOTS;
use crate::thread::{ExecEnv, ThreadTable, VmThread};
use crate::value::{PrimitiveType, Slot, Value};
use crate::walker::StackWalker;

/// Heap size reported before usage grows past it
pub const DEFAULT_INITIAL_HEAP_BYTES: usize = 16 * 1024 * 1024;

/// Classes whose frames caller queries skip
pub const DEFAULT_TRAMPOLINE_CLASSES: [&str; 2] =
    ["java/lang/reflect/Method", "java/lang/reflect/Constructor"];

/// Priority given to attached threads
pub const NORM_PRIORITY: i32 = 5;

const PD_FIELD: &str = "pd";
const PD_DESCRIPTOR: &str = "Ljava/security/ProtectionDomain;";

const REQUIRED_CLASSES: [&str; 12] = [
    "java/lang/Object",
    "java/lang/Class",
    "java/lang/String",
    "java/lang/Thread",
    "java/lang/VMThread",
    "java/lang/VMThrowable",
    "java/lang/StackTraceElement",
    "java/lang/reflect/Field",
    "java/lang/reflect/Method",
    "java/lang/reflect/Constructor",
    "java/lang/Cloneable",
    "java/io/Serializable",
];

/// VM configuration
#[derive(Debug, Clone)]
pub struct VmOptions {
    /// Heap limit in bytes (0 = unlimited)
    pub max_heap_bytes: usize,

    /// Heap size reported while usage stays below it
    pub initial_heap_bytes: usize,

    /// Operand stack capacity per thread, in slots
    pub operand_stack_slots: usize,

    /// Directories searched by the bootstrap loader
    pub boot_class_path: Vec<PathBuf>,

    /// Application class path (reported as `java.class.path`)
    pub class_path: Vec<PathBuf>,

    /// Native library search path (reported as `java.library.path`)
    pub library_path: Vec<PathBuf>,

    /// Command-line system properties, applied after the defaults
    pub properties: Vec<(String, String)>,

    /// Classes whose frames caller-sensitive queries skip
    pub trampoline_classes: Vec<String>,
}

impl Default for VmOptions {
    fn default() -> Self {
        Self {
            max_heap_bytes: 0,
            initial_heap_bytes: DEFAULT_INITIAL_HEAP_BYTES,
            operand_stack_slots: DEFAULT_MAX_STACK_SLOTS,
            boot_class_path: Vec::new(),
            class_path: Vec::new(),
            library_path: Vec::new(),
            properties: Vec::new(),
            trampoline_classes: DEFAULT_TRAMPOLINE_CLASSES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Assembles a [`Vm`] from options and collaborators
pub struct VmBuilder {
    options: VmOptions,
    interpreter: Option<Arc<dyn Interpreter>>,
    host: Option<Arc<dyn Host>>,
    parser: Option<Arc<dyn ClassFileParser>>,
    classes: Vec<ClassDef>,
    natives: NativeRegistry,
}

impl VmBuilder {
    /// Builder with the given options and the VM's own natives
    pub fn new(options: VmOptions) -> Self {
        Self {
            options,
            interpreter: None,
            host: None,
            parser: None,
            classes: Vec::new(),
            natives: NativeRegistry::bootstrap(),
        }
    }

    /// Interpreter for non-native code (default: [`ScriptedInterpreter`])
    pub fn interpreter(mut self, interpreter: Arc<dyn Interpreter>) -> Self {
        self.interpreter = Some(interpreter);
        self
    }

    /// Host services (default: [`ProcessHost`])
    pub fn host(mut self, host: Arc<dyn Host>) -> Self {
        self.host = Some(host);
        self
    }

    /// Class-file parser used by `defineClass` and the boot class path
    pub fn parser(mut self, parser: Arc<dyn ClassFileParser>) -> Self {
        self.parser = Some(parser);
        self
    }

    /// Add a class defined by the bootstrap loader at boot
    ///
    /// A definition named like a built-in bootstrap class replaces it.
    pub fn class(mut self, def: ClassDef) -> Self {
        self.classes.push(def);
        self
    }

    /// Register a native implementation matched by name
    pub fn native(mut self, class: &str, name: &str, func: NativeFn) -> Self {
        self.natives.register(class, name, None, func);
        self
    }

    /// Register a native implementation matched by name and descriptor
    pub fn native_with_descriptor(mut self, class: &str, name: &str, descriptor: &str, func: NativeFn) -> Self {
        self.natives.register(class, name, Some(descriptor), func);
        self
    }

    /// Define the bootstrap classes, bind their natives and check the
    /// bootstrap invariants
    pub fn boot(self) -> Result<Arc<Vm>, BootError> {
        let VmBuilder {
            options,
            interpreter,
            host,
            parser,
            classes: mut extra,
            natives,
        } = self;

        let registry = ClassRegistry::new();
        let mut core = bootstrap_classes();
        for def in core.iter_mut() {
            if let Some(pos) = extra.iter().position(|d| d.name == def.name) {
                *def = extra.remove(pos);
            }
        }

        for def in core {
            let name = def.name.clone();
            let class = registry
                .define(def, None)
                .map_err(|cause| BootError::Class { name, cause })?;
            bind_strict(&natives, &class)?;
        }

        for name in REQUIRED_CLASSES {
            if registry.find_bootstrap(name).is_none() {
                return Err(BootError::MissingClass(name.to_string()));
            }
        }
        let pd_offset = registry
            .find_bootstrap("java/lang/Class")
            .and_then(|c| {
                c.declared_field(PD_FIELD)
                    .filter(|f| f.descriptor() == PD_DESCRIPTOR && !f.is_static())
                    .map(|f| f.offset())
            })
            .ok_or_else(|| BootError::MissingField {
                class: "java/lang/Class".to_string(),
                name: PD_FIELD.to_string(),
                descriptor: PD_DESCRIPTOR.to_string(),
            })?;

        let vm = Arc::new(Vm {
            heap: Heap::new(options.max_heap_bytes, options.initial_heap_bytes),
            walker: StackWalker::new(options.trampoline_classes.iter().cloned()),
            options,
            classes: registry,
            natives,
            strings: DashMap::new(),
            threads: ThreadTable::new(),
            interpreter: interpreter.unwrap_or_else(|| Arc::new(ScriptedInterpreter::new())),
            host: host.unwrap_or_else(|| Arc::new(ProcessHost::new())),
            parser,
            pd_offset,
        });

        for def in extra {
            let name = def.name.clone();
            vm.define_class(def, None)
                .map_err(|cause| BootError::Class { name, cause })?;
        }

        tracing::info!(
            classes = vm.classes.len(),
            natives = vm.natives.len(),
            "vm booted"
        );
        Ok(vm)
    }
}

fn bind_strict(natives: &NativeRegistry, class: &Class) -> Result<(), BootError> {
    for method in class.methods().iter().filter(|m| m.is_native()) {
        match natives.lookup(class.name(), method.name(), method.descriptor()) {
            NativeLookup::Found(func) => {
                method.bind_native(func);
            }
            NativeLookup::Missing => {
                return Err(BootError::MissingNative {
                    class: class.name().to_string(),
                    name: method.name().to_string(),
                    descriptor: method.descriptor().to_string(),
                })
            }
            NativeLookup::Ambiguous(candidates) => {
                return Err(BootError::AmbiguousNative {
                    class: class.name().to_string(),
                    name: method.name().to_string(),
                    candidates,
                })
            }
        }
    }
    Ok(())
}

/// Virtual machine
pub struct Vm {
    options: VmOptions,
    classes: ClassRegistry,
    natives: NativeRegistry,
    heap: Heap,
    strings: DashMap<Box<str>, ObjectRef>,
    threads: ThreadTable,
    interpreter: Arc<dyn Interpreter>,
    host: Arc<dyn Host>,
    parser: Option<Arc<dyn ClassFileParser>>,
    walker: StackWalker,
    pd_offset: usize,
}

impl Vm {
    /// Boot a VM with default collaborators
    pub fn boot(options: VmOptions) -> Result<Arc<Vm>, BootError> {
        VmBuilder::new(options).boot()
    }

    /// Start assembling a VM
    pub fn builder(options: VmOptions) -> VmBuilder {
        VmBuilder::new(options)
    }

    /// Boot, terminating the process with status 1 on failure
    pub fn boot_or_exit(options: VmOptions) -> Arc<Vm> {
        match Self::boot(options) {
            Ok(vm) => vm,
            Err(err) => {
                tracing::error!(%err, "vm boot failed");
                std::process::exit(1);
            }
        }
    }

    // ========================================================================
    // Components
    // ========================================================================

    /// Configuration
    pub fn options(&self) -> &VmOptions {
        &self.options
    }

    /// Loaded classes
    pub fn classes(&self) -> &ClassRegistry {
        &self.classes
    }

    /// Native registry
    pub fn natives(&self) -> &NativeRegistry {
        &self.natives
    }

    /// Heap
    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    /// Live managed threads
    pub fn threads(&self) -> &ThreadTable {
        &self.threads
    }

    /// Stack walker
    pub fn walker(&self) -> &StackWalker {
        &self.walker
    }

    /// Host services
    pub fn host(&self) -> &dyn Host {
        self.host.as_ref()
    }

    /// Offset of the protection-domain field in class mirrors
    pub fn pd_offset(&self) -> usize {
        self.pd_offset
    }

    // ========================================================================
    // Classes and mirrors
    // ========================================================================

    /// Bootstrap class the VM depends on
    pub fn bootstrap_class(&self, name: &str) -> NativeResult<Arc<Class>> {
        self.classes
            .find_bootstrap(name)
            .ok_or_else(|| Failure::Internal(format!("bootstrap class {} missing", name)))
    }

    /// The `java/lang/Class` instance for `class`, created on first use
    pub fn mirror(&self, class: &Arc<Class>) -> NativeResult<ObjectRef> {
        class
            .mirror_cell()
            .get_or_try_init(|| {
                let class_class = self.bootstrap_class("java/lang/Class")?;
                self.heap.alloc_mirror(&class_class, class)
            })
            .cloned()
    }

    /// Class behind a `java/lang/Class` instance
    pub fn class_of_mirror(mirror: &ObjectRef) -> NativeResult<Arc<Class>> {
        mirror
            .mirrored_class()
            .ok_or_else(|| Failure::Internal(format!("{:?} does not mirror a class", mirror)))
    }

    /// Define `def` for `loader`, binding whatever natives the registry has
    ///
    /// Natives left unbound fail with `UnsatisfiedLink` when first called.
    pub fn define_class(&self, def: ClassDef, loader: Option<&ObjectRef>) -> NativeResult<Arc<Class>> {
        let class = self.classes.define(def, loader)?;
        for method in class.methods().iter().filter(|m| m.is_native()) {
            match self.natives.lookup(class.name(), method.name(), method.descriptor()) {
                NativeLookup::Found(func) => {
                    method.bind_native(func);
                }
                NativeLookup::Missing => {
                    tracing::debug!(method = ?method, "native left unbound");
                }
                NativeLookup::Ambiguous(candidates) => {
                    tracing::warn!(method = ?method, candidates, "ambiguous native left unbound");
                }
            }
        }
        Ok(class)
    }

    /// Bound native implementation of `method`, binding it on first use
    pub fn link_native<'m>(&self, method: &'m Method) -> NativeResult<&'m LinkedNative> {
        if let Some(linked) = method.linked_native() {
            return Ok(linked);
        }
        match self
            .natives
            .lookup(method.class_name(), method.name(), method.descriptor())
        {
            NativeLookup::Found(func) => {
                tracing::debug!(method = ?method, "native bound");
                Ok(method.bind_native(func))
            }
            NativeLookup::Missing => Err(Failure::UnsatisfiedLink(format!("{:?}", method))),
            NativeLookup::Ambiguous(n) => Err(Failure::UnsatisfiedLink(format!(
                "{:?} ({} candidate implementations)",
                method, n
            ))),
        }
    }

    /// Parse class-file bytes with the installed parser
    pub fn parse_class(&self, name: Option<&str>, bytes: &[u8]) -> NativeResult<ClassDef> {
        match &self.parser {
            Some(parser) => parser.parse(name, bytes),
            None => Err(Failure::ClassFormat("no class file parser installed".to_string())),
        }
    }

    /// Resolve `name` (internal form) as seen by `loader`
    ///
    /// Classes the loader has not recorded are requested through its
    /// `loadClass` method; the bootstrap loader searches the boot class path.
    pub fn find_class(self: &Arc<Self>, env: &mut ExecEnv, name: &str, loader: Option<&ObjectRef>) -> NativeResult<Arc<Class>> {
        let not_found = |cause: Option<Failure>| Failure::ClassNotFound {
            name: name.to_string(),
            cause: cause.map(Box::new),
        };

        let dims = name.bytes().take_while(|&b| b == b'[').count();
        if dims > 0 {
            let elem = &name[dims..];
            if let Some(elem_name) = elem.strip_prefix('L').and_then(|e| e.strip_suffix(';')) {
                if elem_name.is_empty() || elem_name.starts_with('[') {
                    return Err(not_found(None));
                }
                self.find_class(env, elem_name, loader)?;
            }
            return self.classes.array_class(name, loader).ok_or_else(|| not_found(None));
        }

        if let Some(class) = self.classes.find_loaded(name, loader) {
            return Ok(class);
        }
        let Some(loader_obj) = loader else {
            return self.load_boot_class(name)?.ok_or_else(|| not_found(None));
        };

        let dotted = self.new_string(&name.replace('/', "."))?;
        let result = self
            .call_virtual(
                env,
                loader_obj,
                "loadClass",
                "(Ljava/lang/String;)Ljava/lang/Class;",
                &[Value::object(dotted)],
            )
            .map_err(|cause| not_found(Some(cause)))?;
        match result.and_then(Value::into_object) {
            Some(mirror) => Self::class_of_mirror(&mirror),
            None => Err(not_found(None)),
        }
    }

    /// Bootstrap class `name`, defined from the boot class path if needed
    pub fn load_boot_class(&self, name: &str) -> NativeResult<Option<Arc<Class>>> {
        if let Some(class) = self.classes.find_bootstrap(name) {
            return Ok(Some(class));
        }
        if self.parser.is_none() {
            return Ok(None);
        }
        let file = format!("{}.class", name);
        for dir in &self.options.boot_class_path {
            let path = dir.join(&file);
            let Ok(bytes) = std::fs::read(&path) else {
                continue;
            };
            tracing::debug!(class = name, path = %path.display(), "loading from boot class path");
            let def = self.parse_class(Some(name), &bytes)?;
            return self.define_class(def, None).map(Some);
        }
        Ok(None)
    }

    /// Initialise `class` if needed
    pub fn initialize_class(self: &Arc<Self>, env: &mut ExecEnv, class: &Arc<Class>) -> NativeResult<()> {
        if class.is_initialized() {
            return Ok(());
        }
        class::initialize(self, env, class)
    }

    // ========================================================================
    // Strings
    // ========================================================================

    /// Allocate a string
    pub fn new_string(&self, value: &str) -> NativeResult<ObjectRef> {
        let string_class = self.bootstrap_class("java/lang/String")?;
        self.heap.alloc_string(&string_class, value)
    }

    /// Canonical instance of the string `obj`
    pub fn intern(&self, obj: &ObjectRef) -> NativeResult<ObjectRef> {
        let contents = obj
            .as_str()
            .ok_or_else(|| Failure::Internal(format!("{:?} is not a string", obj)))?;
        if let Some(existing) = self.strings.get(contents) {
            return Ok(Arc::clone(existing.value()));
        }
        Ok(Arc::clone(
            self.strings
                .entry(contents.into())
                .or_insert_with(|| Arc::clone(obj))
                .value(),
        ))
    }

    /// Canonical string with contents `value`
    pub fn intern_str(&self, value: &str) -> NativeResult<ObjectRef> {
        if let Some(existing) = self.strings.get(value) {
            return Ok(Arc::clone(existing.value()));
        }
        let obj = self.new_string(value)?;
        self.intern(&obj)
    }

    // ========================================================================
    // Invocation
    // ========================================================================

    /// Call `method` from VM code with `args` (receiver first)
    ///
    /// A boundary frame marks the transition. Native methods run under the
    /// operand-stack convention; everything else goes to the interpreter.
    pub fn call_method(self: &Arc<Self>, env: &mut ExecEnv, method: &Arc<Method>, args: &[Value]) -> NativeResult<Option<Value>> {
        if method.is_abstract() {
            return Err(Failure::AbstractMethod(format!("{:?}", method)));
        }
        let expected = method.signature().params.len() + usize::from(!method.is_static());
        if args.len() != expected {
            return Err(Failure::Internal(format!(
                "{:?} called with {} arguments",
                method,
                args.len()
            )));
        }

        env.frames_mut().push_boundary();
        let result = if method.is_native() {
            self.call_native(env, method, args)
        } else {
            env.frames_mut().push_real(Arc::clone(method));
            let result = self.interpreter.execute(self, env, method, args);
            env.frames_mut().pop();
            result
        };
        env.frames_mut().pop();
        result
    }

    /// Call the override of `name descriptor` selected by `receiver`'s class
    pub fn call_virtual(
        self: &Arc<Self>,
        env: &mut ExecEnv,
        receiver: &ObjectRef,
        name: &str,
        descriptor: &str,
        args: &[Value],
    ) -> NativeResult<Option<Value>> {
        let method = receiver
            .class()
            .lookup_method(name, descriptor)
            .ok_or_else(|| Failure::NoSuchMethod(format!("{}.{}{}", receiver.class().name(), name, descriptor)))?;
        let mut values = Vec::with_capacity(args.len() + 1);
        values.push(Value::object(Arc::clone(receiver)));
        values.extend_from_slice(args);
        self.call_method(env, &method, &values)
    }

    fn call_native(self: &Arc<Self>, env: &mut ExecEnv, method: &Arc<Method>, args: &[Value]) -> NativeResult<Option<Value>> {
        let layout = method.arg_layout();
        let base = env.stack().len();
        let mut slots: Vec<Slot> = Vec::with_capacity(layout.arg_slots());
        for arg in args {
            arg.push_slots(&mut slots);
        }
        if slots.len() != layout.arg_slots() {
            return Err(Failure::Internal(format!(
                "{:?} called with {} argument slots",
                method,
                slots.len()
            )));
        }
        env.stack().ensure(slots.len())?;
        for slot in slots {
            if let Err(failure) = env.stack_mut().push(slot) {
                env.stack_mut().truncate(base);
                return Err(failure);
            }
        }

        match invoke_native(self, env, method) {
            Ok(_) => {
                let ret = method.signature().ret.as_ref();
                let value = match ret {
                    None => None,
                    Some(ty) => Some(
                        Value::read_slots(env.stack().slots_from(base), ty.primitive()).ok_or_else(|| {
                            Failure::Internal(format!("{:?} left no result", method))
                        })?,
                    ),
                };
                env.stack_mut().truncate(base);
                Ok(value)
            }
            Err(failure) => {
                // Propagated through the Result; nothing is left to poll
                env.take_pending();
                env.stack_mut().truncate(base);
                Err(failure)
            }
        }
    }

    // ========================================================================
    // Threads
    // ========================================================================

    /// Execution environment for `thread`
    pub fn new_env(&self, thread: Arc<VmThread>) -> ExecEnv {
        ExecEnv::new(thread, self.options.operand_stack_slots)
    }

    /// Attach the calling OS thread as a managed thread named `name`
    ///
    /// Creates its `java/lang/Thread` and `java/lang/VMThread` objects and
    /// registers it in the thread table.
    pub fn attach_current_thread(&self, name: &str) -> NativeResult<ExecEnv> {
        let thread_class = self.bootstrap_class("java/lang/Thread")?;
        let vm_thread_class = self.bootstrap_class("java/lang/VMThread")?;
        let thread_obj = self.heap.alloc_object(&thread_class)?;
        let vm_thread_obj = self.heap.alloc_object(&vm_thread_class)?;

        let name_obj = self.new_string(name)?;
        set_instance_field(&thread_obj, "vmThread", Value::object(Arc::clone(&vm_thread_obj)))?;
        set_instance_field(&thread_obj, "name", Value::object(name_obj))?;
        set_instance_field(&thread_obj, "priority", Value::Int(NORM_PRIORITY))?;
        set_instance_field(&vm_thread_obj, "thread", Value::object(Arc::clone(&thread_obj)))?;

        let thread = VmThread::new(name);
        thread.set_java_thread(thread_obj);
        self.threads.register(&vm_thread_obj, Arc::clone(&thread));
        tracing::debug!(thread = name, id = thread.id().as_u64(), "thread attached");
        Ok(self.new_env(thread))
    }
}

/// Offset of instance field `name` in `class` or a superclass
pub(crate) fn field_offset(class: &Class, name: &str) -> NativeResult<usize> {
    let mut current = Some(class);
    while let Some(c) = current {
        if let Some(field) = c.declared_field(name).filter(|f| !f.is_static()) {
            return Ok(field.offset());
        }
        current = c.super_class().map(|s| s.as_ref());
    }
    Err(Failure::Internal(format!("{} has no field {}", class.name(), name)))
}

/// Read instance field `name` of `obj`
pub(crate) fn get_instance_field(obj: &ObjectRef, name: &str, ty: Option<PrimitiveType>) -> NativeResult<Value> {
    let offset = field_offset(obj.class(), name)?;
    obj.read_field(offset, ty)
        .ok_or_else(|| Failure::Internal(format!("unreadable field {}.{}", obj.class().name(), name)))
}

/// Write instance field `name` of `obj`
pub(crate) fn set_instance_field(obj: &ObjectRef, name: &str, value: Value) -> NativeResult<()> {
    let offset = field_offset(obj.class(), name)?;
    if obj.write_field(offset, &value) {
        Ok(())
    } else {
        Err(Failure::Internal(format!("unwritable field {}.{}", obj.class().name(), name)))
    }
}
