//! Class definitions handed to the registry
//!
//! A [`ClassDef`] is what a class-file parser produces: names, flags and
//! member declarations, nothing resolved yet.

use super::AccessFlags;
use crate::error::NativeResult;

/// Field declaration
#[derive(Debug, Clone)]
pub struct FieldDef {
    /// Field name
    pub name: String,
    /// Field descriptor
    pub descriptor: String,
    /// Access flags
    pub access_flags: AccessFlags,
}

/// Method declaration
#[derive(Debug, Clone)]
pub struct MethodDef {
    /// Method name
    pub name: String,
    /// Method descriptor
    pub descriptor: String,
    /// Access flags
    pub access_flags: AccessFlags,
    /// Opaque code for the interpreter (empty for native/abstract methods)
    pub code: Vec<u8>,
}

/// Unresolved class definition
#[derive(Debug, Clone)]
pub struct ClassDef {
    /// Internal name
    pub name: String,
    /// Superclass internal name (`None` only for the root class)
    pub super_name: Option<String>,
    /// Directly implemented interfaces
    pub interfaces: Vec<String>,
    /// Class access flags
    pub access_flags: AccessFlags,
    /// Declared fields
    pub fields: Vec<FieldDef>,
    /// Declared methods
    pub methods: Vec<MethodDef>,
    /// Enclosing class of a member class
    pub declaring_class: Option<String>,
    /// Flags recorded for this class as a member class
    pub inner_access_flags: Option<AccessFlags>,
    /// Declared member classes
    pub inner_classes: Vec<String>,
}

impl ClassDef {
    /// Public class extending `java/lang/Object`
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            super_name: Some("java/lang/Object".to_string()),
            interfaces: Vec::new(),
            access_flags: AccessFlags::PUBLIC,
            fields: Vec::new(),
            methods: Vec::new(),
            declaring_class: None,
            inner_access_flags: None,
            inner_classes: Vec::new(),
        }
    }

    /// Public interface
    pub fn interface(name: impl Into<String>) -> Self {
        Self::new(name).flags(AccessFlags::PUBLIC | AccessFlags::INTERFACE | AccessFlags::ABSTRACT)
    }

    /// Class without a superclass
    pub fn root(mut self) -> Self {
        self.super_name = None;
        self
    }

    /// Set the superclass
    pub fn extends(mut self, super_name: impl Into<String>) -> Self {
        self.super_name = Some(super_name.into());
        self
    }

    /// Add a directly implemented interface
    pub fn implements(mut self, iface: impl Into<String>) -> Self {
        self.interfaces.push(iface.into());
        self
    }

    /// Replace the class access flags
    pub fn flags(mut self, flags: AccessFlags) -> Self {
        self.access_flags = flags;
        self
    }

    /// Mark as a member class of `outer`
    pub fn declared_in(mut self, outer: impl Into<String>, flags: AccessFlags) -> Self {
        self.declaring_class = Some(outer.into());
        self.inner_access_flags = Some(flags);
        self
    }

    /// Declare a member class
    pub fn inner_class(mut self, name: impl Into<String>) -> Self {
        self.inner_classes.push(name.into());
        self
    }

    /// Add a field with explicit flags
    pub fn field_with(mut self, name: impl Into<String>, descriptor: impl Into<String>, access_flags: AccessFlags) -> Self {
        self.fields.push(FieldDef {
            name: name.into(),
            descriptor: descriptor.into(),
            access_flags,
        });
        self
    }

    /// Add a public instance field
    pub fn field(self, name: impl Into<String>, descriptor: impl Into<String>) -> Self {
        self.field_with(name, descriptor, AccessFlags::PUBLIC)
    }

    /// Add a public static field
    pub fn static_field(self, name: impl Into<String>, descriptor: impl Into<String>) -> Self {
        self.field_with(name, descriptor, AccessFlags::PUBLIC | AccessFlags::STATIC)
    }

    /// Add a method with explicit flags
    pub fn method_with(
        mut self,
        name: impl Into<String>,
        descriptor: impl Into<String>,
        access_flags: AccessFlags,
        code: Vec<u8>,
    ) -> Self {
        self.methods.push(MethodDef {
            name: name.into(),
            descriptor: descriptor.into(),
            access_flags,
            code,
        });
        self
    }

    /// Add a public instance method
    pub fn method(self, name: impl Into<String>, descriptor: impl Into<String>, code: Vec<u8>) -> Self {
        self.method_with(name, descriptor, AccessFlags::PUBLIC, code)
    }

    /// Add a public static method
    pub fn static_method(self, name: impl Into<String>, descriptor: impl Into<String>, code: Vec<u8>) -> Self {
        self.method_with(name, descriptor, AccessFlags::PUBLIC | AccessFlags::STATIC, code)
    }

    /// Add a public native instance method
    pub fn native_method(self, name: impl Into<String>, descriptor: impl Into<String>) -> Self {
        self.method_with(name, descriptor, AccessFlags::PUBLIC | AccessFlags::NATIVE, Vec::new())
    }

    /// Add a public native static method
    pub fn static_native(self, name: impl Into<String>, descriptor: impl Into<String>) -> Self {
        self.method_with(
            name,
            descriptor,
            AccessFlags::PUBLIC | AccessFlags::STATIC | AccessFlags::NATIVE,
            Vec::new(),
        )
    }

    /// Add a public abstract method
    pub fn abstract_method(self, name: impl Into<String>, descriptor: impl Into<String>) -> Self {
        self.method_with(name, descriptor, AccessFlags::PUBLIC | AccessFlags::ABSTRACT, Vec::new())
    }
}

/// Turns class-file bytes into a [`ClassDef`]
pub trait ClassFileParser: Send + Sync {
    /// Parse `bytes`; `name` is the internal name the caller expects, if any
    ///
    /// # Errors
    ///
    /// `ClassFormat` for malformed input, `NoClassDefFound` when the bytes
    /// define a class other than `name`.
    fn parse(&self, name: Option<&str>, bytes: &[u8]) -> NativeResult<ClassDef>;
}
