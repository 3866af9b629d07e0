//! Class model
//!
//! A [`Class`] is immutable once defined except for its static storage, its
//! initialisation state and its lazily created mirror. Methods and fields are
//! addressed by their declaration index ("slot"), which is what reflection
//! objects carry.

mod bootstrap;
mod def;
mod init;
mod registry;

pub use bootstrap::bootstrap_classes;
pub use def::{ClassDef, ClassFileParser, FieldDef, MethodDef};
pub use init::{initialize, InitState};
pub use registry::ClassRegistry;

use std::fmt;
use std::sync::{Arc, Weak};

use once_cell::sync::OnceCell;
use parking_lot::Mutex;

use crate::descriptor::{ArgLayout, FieldType, MethodSignature};
use crate::natives::NativeFn;
use crate::object::ObjectRef;
use crate::value::{PrimitiveType, Slot, Value};

/// Access and property flags of classes and members
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct AccessFlags(u16);

impl AccessFlags {
    /// public
    pub const PUBLIC: Self = Self(0x0001);
    /// private
    pub const PRIVATE: Self = Self(0x0002);
    /// protected
    pub const PROTECTED: Self = Self(0x0004);
    /// static
    pub const STATIC: Self = Self(0x0008);
    /// final
    pub const FINAL: Self = Self(0x0010);
    /// synchronized
    pub const SYNCHRONIZED: Self = Self(0x0020);
    /// volatile
    pub const VOLATILE: Self = Self(0x0040);
    /// transient
    pub const TRANSIENT: Self = Self(0x0080);
    /// native
    pub const NATIVE: Self = Self(0x0100);
    /// interface
    pub const INTERFACE: Self = Self(0x0200);
    /// abstract
    pub const ABSTRACT: Self = Self(0x0400);
    /// synthetic
    pub const SYNTHETIC: Self = Self(0x1000);
    /// annotation type
    pub const ANNOTATION: Self = Self(0x2000);
    /// enum type or constant
    pub const ENUM: Self = Self(0x4000);

    /// No flags
    pub const fn empty() -> Self {
        Self(0)
    }

    /// From raw bits
    pub const fn from_bits(bits: u16) -> Self {
        Self(bits)
    }

    /// Raw bits
    pub const fn bits(self) -> u16 {
        self.0
    }

    /// Check if all flags in `other` are set
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Union of both flag sets
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

impl std::ops::BitOr for AccessFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

/// What kind of type a class describes
#[derive(Debug)]
pub enum ClassKind {
    /// Ordinary class or interface
    Instance,
    /// Primitive type (`int.class`)
    Primitive(PrimitiveType),
    /// Array type
    Array {
        /// Component type (one dimension less)
        component: Arc<Class>,
        /// Number of dimensions
        dimensions: u8,
    },
}

/// Declared field
#[derive(Debug, Clone)]
pub struct Field {
    name: String,
    descriptor: String,
    ty: FieldType,
    access_flags: AccessFlags,
    offset: usize,
}

impl Field {
    /// Field name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Field descriptor
    pub fn descriptor(&self) -> &str {
        &self.descriptor
    }

    /// Declared type
    pub fn ty(&self) -> &FieldType {
        &self.ty
    }

    /// Access flags
    pub fn access_flags(&self) -> AccessFlags {
        self.access_flags
    }

    /// Check if the field is static
    pub fn is_static(&self) -> bool {
        self.access_flags.contains(AccessFlags::STATIC)
    }

    /// Slot offset in the instance (or in static storage for static fields)
    pub fn offset(&self) -> usize {
        self.offset
    }
}

/// A native implementation bound to a method at link time
#[derive(Debug)]
pub struct LinkedNative {
    /// Implementation
    pub func: NativeFn,
    /// Argument layout derived from the method descriptor
    pub layout: ArgLayout,
}

/// Declared method
pub struct Method {
    name: String,
    descriptor: String,
    signature: MethodSignature,
    access_flags: AccessFlags,
    class: Weak<Class>,
    class_name: String,
    slot: usize,
    code: Arc<[u8]>,
    native: OnceCell<LinkedNative>,
}

impl Method {
    /// Method name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Method descriptor
    pub fn descriptor(&self) -> &str {
        &self.descriptor
    }

    /// Parsed descriptor
    pub fn signature(&self) -> &MethodSignature {
        &self.signature
    }

    /// Access flags
    pub fn access_flags(&self) -> AccessFlags {
        self.access_flags
    }

    /// Declaring class (`None` once the class has been unloaded)
    pub fn class(&self) -> Option<Arc<Class>> {
        self.class.upgrade()
    }

    /// Internal name of the declaring class
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// Index in the declaring class's method table
    pub fn slot(&self) -> usize {
        self.slot
    }

    /// Opaque code handed to the interpreter
    pub fn code(&self) -> &Arc<[u8]> {
        &self.code
    }

    /// Check if the method is static
    pub fn is_static(&self) -> bool {
        self.access_flags.contains(AccessFlags::STATIC)
    }

    /// Check if the method is native
    pub fn is_native(&self) -> bool {
        self.access_flags.contains(AccessFlags::NATIVE)
    }

    /// Check if the method is abstract
    pub fn is_abstract(&self) -> bool {
        self.access_flags.contains(AccessFlags::ABSTRACT)
    }

    /// Check if this is an instance or class initialiser
    pub fn is_initializer(&self) -> bool {
        self.name == "<init>" || self.name == "<clinit>"
    }

    /// Bound native implementation, if linked
    pub fn linked_native(&self) -> Option<&LinkedNative> {
        self.native.get()
    }

    /// Bind a native implementation; the first binding wins
    pub(crate) fn bind_native(&self, func: NativeFn) -> &LinkedNative {
        self.native.get_or_init(|| LinkedNative {
            func,
            layout: ArgLayout::new(&self.signature, self.is_static()),
        })
    }

    /// Argument layout for this method's operand-stack arguments
    pub fn arg_layout(&self) -> ArgLayout {
        match self.native.get() {
            Some(linked) => linked.layout.clone(),
            None => ArgLayout::new(&self.signature, self.is_static()),
        }
    }
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}{}", self.class_name, self.name, self.descriptor)
    }
}

/// A loaded class, interface, array type or primitive type
pub struct Class {
    name: String,
    kind: ClassKind,
    super_class: Option<Arc<Class>>,
    interfaces: Vec<Arc<Class>>,
    access_flags: AccessFlags,
    inner_access_flags: Option<AccessFlags>,
    declaring_class: Option<String>,
    inner_classes: Vec<String>,
    loader: Option<ObjectRef>,
    fields: Vec<Field>,
    methods: Vec<Arc<Method>>,
    instance_template: Vec<Slot>,
    statics: Mutex<Vec<Slot>>,
    init: InitState,
    mirror: OnceCell<ObjectRef>,
}

impl Class {
    /// Internal (slash separated) name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Dotted name as reported by `Class.getName`
    pub fn dotted_name(&self) -> String {
        self.name.replace('/', ".")
    }

    /// Kind of type
    pub fn kind(&self) -> &ClassKind {
        &self.kind
    }

    /// Check if this is an array class
    pub fn is_array(&self) -> bool {
        matches!(self.kind, ClassKind::Array { .. })
    }

    /// Check if this is a primitive class
    pub fn is_primitive(&self) -> bool {
        matches!(self.kind, ClassKind::Primitive(_))
    }

    /// Check if this is an interface
    pub fn is_interface(&self) -> bool {
        self.access_flags.contains(AccessFlags::INTERFACE)
    }

    /// Primitive type of a primitive class
    pub fn primitive_type(&self) -> Option<PrimitiveType> {
        match self.kind {
            ClassKind::Primitive(ty) => Some(ty),
            _ => None,
        }
    }

    /// Component type of an array class
    pub fn component_type(&self) -> Option<&Arc<Class>> {
        match &self.kind {
            ClassKind::Array { component, .. } => Some(component),
            _ => None,
        }
    }

    /// Array dimensions (0 for non-arrays)
    pub fn dimensions(&self) -> u8 {
        match self.kind {
            ClassKind::Array { dimensions, .. } => dimensions,
            _ => 0,
        }
    }

    /// Check if array elements are references
    pub fn has_reference_elements(&self) -> bool {
        self.component_type().is_some_and(|c| !c.is_primitive())
    }

    /// Direct superclass
    pub fn super_class(&self) -> Option<&Arc<Class>> {
        self.super_class.as_ref()
    }

    /// Directly implemented interfaces
    pub fn interfaces(&self) -> &[Arc<Class>] {
        &self.interfaces
    }

    /// Class access flags
    pub fn access_flags(&self) -> AccessFlags {
        self.access_flags
    }

    /// Modifiers as reported by `Class.getModifiers`
    ///
    /// Member classes report the flags recorded for them as inner classes
    /// unless `ignore_inner` is set.
    pub fn modifiers(&self, ignore_inner: bool) -> AccessFlags {
        match self.inner_access_flags {
            Some(flags) if !ignore_inner => flags,
            _ => self.access_flags,
        }
    }

    /// Internal name of the enclosing class of a member class
    pub fn declaring_class_name(&self) -> Option<&str> {
        self.declaring_class.as_deref()
    }

    /// Internal names of declared member classes
    pub fn inner_class_names(&self) -> &[String] {
        &self.inner_classes
    }

    /// Defining loader (`None` for the bootstrap loader)
    pub fn loader(&self) -> Option<&ObjectRef> {
        self.loader.as_ref()
    }

    /// Declared fields, in declaration order
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Declared methods, in declaration order
    pub fn methods(&self) -> &[Arc<Method>] {
        &self.methods
    }

    /// Declared field by slot
    pub fn field(&self, slot: usize) -> Option<&Field> {
        self.fields.get(slot)
    }

    /// Declared method by slot
    pub fn method(&self, slot: usize) -> Option<&Arc<Method>> {
        self.methods.get(slot)
    }

    /// Declared field by name
    pub fn declared_field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Declared method by name and descriptor
    pub fn declared_method(&self, name: &str, descriptor: &str) -> Option<&Arc<Method>> {
        self.methods
            .iter()
            .find(|m| m.name == name && m.descriptor == descriptor)
    }

    /// Field by name and descriptor, searching superclasses; returns the
    /// declaring class and the field's slot
    pub fn lookup_field(self: &Arc<Self>, name: &str, descriptor: &str) -> Option<(Arc<Class>, usize)> {
        let mut current = Some(self);
        while let Some(class) = current {
            if let Some(slot) = class
                .fields
                .iter()
                .position(|f| f.name == name && f.descriptor == descriptor)
            {
                return Some((Arc::clone(class), slot));
            }
            current = class.super_class.as_ref();
        }
        None
    }

    /// Method by name and descriptor, searching superclasses then interfaces
    pub fn lookup_method(&self, name: &str, descriptor: &str) -> Option<Arc<Method>> {
        let mut current = Some(self);
        while let Some(class) = current {
            if let Some(method) = class.declared_method(name, descriptor) {
                return Some(Arc::clone(method));
            }
            current = class.super_class.as_deref();
        }
        let mut current = Some(self);
        while let Some(class) = current {
            for iface in &class.interfaces {
                if let Some(method) = iface.lookup_method(name, descriptor) {
                    return Some(method);
                }
            }
            current = class.super_class.as_deref();
        }
        None
    }

    /// The static initialiser, if declared
    pub fn class_initializer(&self) -> Option<&Arc<Method>> {
        self.declared_method("<clinit>", "()V")
    }

    /// Check if a value of this class can be stored where `target` is expected
    pub fn is_assignable_to(&self, target: &Class) -> bool {
        if std::ptr::eq(self, target) {
            return true;
        }
        match (&self.kind, &target.kind) {
            (ClassKind::Primitive(_), _) | (_, ClassKind::Primitive(_)) => false,
            (ClassKind::Array { component: from, .. }, ClassKind::Array { component: to, .. }) => {
                !from.is_primitive() && !to.is_primitive() && from.is_assignable_to(to)
            }
            (ClassKind::Array { .. }, ClassKind::Instance) => {
                if target.is_interface() {
                    self.implements(target)
                } else {
                    target.super_class.is_none()
                }
            }
            (ClassKind::Instance, ClassKind::Array { .. }) => false,
            (ClassKind::Instance, ClassKind::Instance) => {
                if target.is_interface() {
                    self.implements(target)
                } else {
                    let mut current = self.super_class.as_deref();
                    while let Some(class) = current {
                        if std::ptr::eq(class, target) {
                            return true;
                        }
                        current = class.super_class.as_deref();
                    }
                    false
                }
            }
        }
    }

    /// Check if this class, a superclass or an implemented interface is named
    /// `name`, matching array element types the same way
    ///
    /// Matches by name only, so it also sees types defined by other loaders
    /// on the delegation path.
    pub fn is_subtype_named(&self, name: &str) -> bool {
        if self.name == name {
            return true;
        }
        if let (Some(component), Some(target)) = (self.component_type(), name.strip_prefix('[')) {
            if !component.is_primitive() {
                let element = target.strip_prefix('L').and_then(|t| t.strip_suffix(';'));
                let matched = match element {
                    Some(element) => component.is_subtype_named(element),
                    None => target.starts_with('[') && component.is_subtype_named(target),
                };
                if matched {
                    return true;
                }
            }
        }
        self.super_class.as_deref().is_some_and(|s| s.is_subtype_named(name))
            || self.interfaces.iter().any(|i| i.is_subtype_named(name))
    }

    /// Check if `obj` is an instance of this class
    pub fn is_instance(&self, obj: &ObjectRef) -> bool {
        obj.class().is_assignable_to(self)
    }

    fn implements(&self, iface: &Class) -> bool {
        let mut current = Some(self);
        while let Some(class) = current {
            for direct in &class.interfaces {
                if std::ptr::eq(direct.as_ref(), iface) || direct.implements(iface) {
                    return true;
                }
            }
            current = class.super_class.as_deref();
        }
        false
    }

    /// Zero-initialised instance field slots, inherited fields first
    pub fn instance_template(&self) -> &[Slot] {
        &self.instance_template
    }

    /// Read static storage at `offset`
    pub fn read_static(&self, offset: usize, ty: Option<PrimitiveType>) -> Option<Value> {
        let statics = self.statics.lock();
        Value::read_slots(statics.get(offset..)?, ty)
    }

    /// Write static storage at `offset`
    pub fn write_static(&self, offset: usize, value: &Value) -> bool {
        let mut statics = self.statics.lock();
        match statics.get_mut(offset..) {
            Some(slots) => value.write_slots(slots).is_some(),
            None => false,
        }
    }

    /// Initialisation state
    pub fn init_state(&self) -> &InitState {
        &self.init
    }

    /// Check if the class has completed initialisation
    pub fn is_initialized(&self) -> bool {
        self.init.is_initialized()
    }

    pub(crate) fn mirror_cell(&self) -> &OnceCell<ObjectRef> {
        &self.mirror
    }
}

impl fmt::Debug for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Class")
            .field("name", &self.name)
            .field("loader", &self.loader.as_ref().map(Arc::as_ptr))
            .finish()
    }
}

/// Internal name of the array class whose components are `component`
pub(crate) fn array_class_name(component: &Class) -> String {
    match component.kind {
        ClassKind::Primitive(ty) => format!("[{}", ty.descriptor()),
        ClassKind::Array { .. } => format!("[{}", component.name),
        ClassKind::Instance => format!("[L{};", component.name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_with_hierarchy() -> ClassRegistry {
        let registry = ClassRegistry::new();
        registry.define(ClassDef::new("java/lang/Object").root(), None).unwrap();
        registry
            .define(ClassDef::interface("java/lang/Cloneable"), None)
            .unwrap();
        registry
            .define(ClassDef::interface("java/io/Serializable"), None)
            .unwrap();
        registry.define(ClassDef::interface("test/Shape"), None).unwrap();
        registry
            .define(ClassDef::new("test/Base").implements("test/Shape"), None)
            .unwrap();
        registry
            .define(ClassDef::new("test/Derived").extends("test/Base"), None)
            .unwrap();
        registry
    }

    #[test]
    fn test_flags() {
        let flags = AccessFlags::PUBLIC | AccessFlags::STATIC;
        assert!(flags.contains(AccessFlags::STATIC));
        assert!(!flags.contains(AccessFlags::FINAL));
        assert_eq!(flags.bits(), 0x0009);
    }

    #[test]
    fn test_subclass_assignability() {
        let registry = registry_with_hierarchy();
        let object = registry.find_bootstrap("java/lang/Object").unwrap();
        let base = registry.find_bootstrap("test/Base").unwrap();
        let derived = registry.find_bootstrap("test/Derived").unwrap();
        let shape = registry.find_bootstrap("test/Shape").unwrap();

        assert!(derived.is_assignable_to(&base));
        assert!(derived.is_assignable_to(&object));
        assert!(derived.is_assignable_to(&shape));
        assert!(!base.is_assignable_to(&derived));
    }

    #[test]
    fn test_array_covariance() {
        let registry = registry_with_hierarchy();
        let derived_arr = registry.find_bootstrap("[Ltest/Derived;").unwrap();
        let base_arr = registry.find_bootstrap("[Ltest/Base;").unwrap();
        let object = registry.find_bootstrap("java/lang/Object").unwrap();
        let cloneable = registry.find_bootstrap("java/lang/Cloneable").unwrap();
        let int_arr = registry.find_bootstrap("[I").unwrap();
        let long_arr = registry.find_bootstrap("[J").unwrap();
        let obj_arr = registry.find_bootstrap("[Ljava/lang/Object;").unwrap();

        assert!(derived_arr.is_assignable_to(&base_arr));
        assert!(!base_arr.is_assignable_to(&derived_arr));
        assert!(derived_arr.is_assignable_to(&object));
        assert!(int_arr.is_assignable_to(&cloneable));
        assert!(!int_arr.is_assignable_to(&long_arr));
        assert!(!int_arr.is_assignable_to(&obj_arr));
    }

    #[test]
    fn test_array_names_and_dimensions() {
        let registry = registry_with_hierarchy();
        let arr = registry.find_bootstrap("[[Ltest/Base;").unwrap();
        assert_eq!(arr.dimensions(), 2);
        assert_eq!(arr.component_type().unwrap().name(), "[Ltest/Base;");
        assert!(arr.has_reference_elements());
        assert_eq!(arr.dotted_name(), "[[Ltest.Base;");
    }

    #[test]
    fn test_lookup_method_walks_supers() {
        let registry = ClassRegistry::new();
        registry
            .define(
                ClassDef::new("test/A").root().method("run", "()I", Vec::new()),
                None,
            )
            .unwrap();
        let b = registry
            .define(ClassDef::new("test/B").extends("test/A"), None)
            .unwrap();
        let run = b.lookup_method("run", "()I").unwrap();
        assert_eq!(run.class_name(), "test/A");
        assert_eq!(run.class().unwrap().name(), "test/A");
        assert!(b.declared_method("run", "()I").is_none());
    }

    #[test]
    fn test_inner_modifiers() {
        let registry = ClassRegistry::new();
        let class = registry
            .define(
                ClassDef::new("test/Outer$Inner")
                    .root()
                    .flags(AccessFlags::PUBLIC)
                    .declared_in("test/Outer", AccessFlags::PRIVATE | AccessFlags::STATIC),
                None,
            )
            .unwrap();
        assert_eq!(class.modifiers(true), AccessFlags::PUBLIC);
        assert_eq!(
            class.modifiers(false),
            AccessFlags::PRIVATE | AccessFlags::STATIC
        );
        assert_eq!(class.declaring_class_name(), Some("test/Outer"));
    }
}
