//! Loaded-class table
//!
//! Classes are keyed by (internal name, defining loader). Array classes are
//! synthesised on demand and recorded under their element type's loader;
//! primitive classes exist from construction.

use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;

use super::def::ClassDef;
use super::init::InitState;
use super::{array_class_name, AccessFlags, Class, ClassKind, Field, Method};
use crate::descriptor::{FieldType, MethodSignature};
use crate::error::{Failure, NativeResult};
use crate::object::ObjectRef;
use crate::value::{PrimitiveType, Slot};

const ROOT_CLASS: &str = "java/lang/Object";
const ARRAY_INTERFACES: [&str; 2] = ["java/lang/Cloneable", "java/io/Serializable"];

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ClassKey {
    name: String,
    loader: usize,
}

fn loader_key(loader: Option<&ObjectRef>) -> usize {
    loader.map_or(0, |l| Arc::as_ptr(l) as usize)
}

/// Registry of loaded classes
pub struct ClassRegistry {
    classes: RwLock<FxHashMap<ClassKey, Arc<Class>>>,
    primitives: Vec<Arc<Class>>,
}

impl ClassRegistry {
    /// Create a registry holding only the primitive classes
    pub fn new() -> Self {
        let primitives = PrimitiveType::ALL
            .iter()
            .map(|&ty| {
                Arc::new(Class {
                    name: ty.name().to_string(),
                    kind: ClassKind::Primitive(ty),
                    super_class: None,
                    interfaces: Vec::new(),
                    access_flags: AccessFlags::PUBLIC | AccessFlags::FINAL | AccessFlags::ABSTRACT,
                    inner_access_flags: None,
                    declaring_class: None,
                    inner_classes: Vec::new(),
                    loader: None,
                    fields: Vec::new(),
                    methods: Vec::new(),
                    instance_template: Vec::new(),
                    statics: Mutex::new(Vec::new()),
                    init: InitState::initialized(),
                    mirror: OnceCell::new(),
                })
            })
            .collect();
        Self {
            classes: RwLock::new(FxHashMap::default()),
            primitives,
        }
    }

    /// The primitive class for `ty`
    pub fn primitive_class(&self, ty: PrimitiveType) -> Arc<Class> {
        Arc::clone(&self.primitives[ty as usize])
    }

    /// Number of loaded (non-primitive) classes
    pub fn len(&self) -> usize {
        self.classes.read().len()
    }

    /// Check if no class has been loaded
    pub fn is_empty(&self) -> bool {
        self.classes.read().is_empty()
    }

    /// Snapshot of every loaded class
    pub fn classes(&self) -> Vec<Arc<Class>> {
        self.classes.read().values().cloned().collect()
    }

    /// Class already defined (or recorded) by `loader` under `name`
    pub fn find_loaded(&self, name: &str, loader: Option<&ObjectRef>) -> Option<Arc<Class>> {
        let key = ClassKey {
            name: name.to_string(),
            loader: loader_key(loader),
        };
        self.classes.read().get(&key).cloned()
    }

    /// Class visible to the bootstrap loader, synthesising array classes
    pub fn find_bootstrap(&self, name: &str) -> Option<Arc<Class>> {
        if name.starts_with('[') {
            self.array_class(name, None)
        } else {
            self.find_loaded(name, None)
        }
    }

    /// Resolve an array class by descriptor name, with element classes looked
    /// up in `loader` then the bootstrap loader
    pub fn array_class(&self, name: &str, loader: Option<&ObjectRef>) -> Option<Arc<Class>> {
        let dims = name.bytes().take_while(|&b| b == b'[').count();
        if dims == 0 || dims > 255 {
            return None;
        }
        let elem = &name[dims..];
        let element = if let Some(class_name) = elem.strip_prefix('L').and_then(|e| e.strip_suffix(';')) {
            if class_name.is_empty() {
                return None;
            }
            self.find_loaded(class_name, loader)
                .or_else(|| self.find_loaded(class_name, None))?
        } else {
            let mut chars = elem.chars();
            let ty = PrimitiveType::from_descriptor(chars.next()?)?;
            if chars.next().is_some() || ty == PrimitiveType::Void {
                return None;
            }
            self.primitive_class(ty)
        };
        let mut class = element;
        for _ in 0..dims {
            class = self.array_of(&class);
        }
        Some(class)
    }

    /// Array class whose components are `component`
    pub fn array_of(&self, component: &Arc<Class>) -> Arc<Class> {
        let key = ClassKey {
            name: array_class_name(component),
            loader: loader_key(component.loader()),
        };
        if let Some(existing) = self.classes.read().get(&key) {
            return Arc::clone(existing);
        }

        let mut classes = self.classes.write();
        if let Some(existing) = classes.get(&key) {
            return Arc::clone(existing);
        }
        let root = classes
            .get(&ClassKey {
                name: ROOT_CLASS.to_string(),
                loader: 0,
            })
            .cloned();
        let interfaces = ARRAY_INTERFACES
            .iter()
            .filter_map(|name| {
                classes
                    .get(&ClassKey {
                        name: (*name).to_string(),
                        loader: 0,
                    })
                    .cloned()
            })
            .collect();
        let visibility = component.access_flags.bits() & AccessFlags::PUBLIC.bits();
        let class = Arc::new(Class {
            name: key.name.clone(),
            kind: ClassKind::Array {
                component: Arc::clone(component),
                dimensions: component.dimensions().saturating_add(1),
            },
            super_class: root,
            interfaces,
            access_flags: AccessFlags::from_bits(visibility) | AccessFlags::FINAL | AccessFlags::ABSTRACT,
            inner_access_flags: None,
            declaring_class: None,
            inner_classes: Vec::new(),
            loader: component.loader().cloned(),
            fields: Vec::new(),
            methods: Vec::new(),
            instance_template: Vec::new(),
            statics: Mutex::new(Vec::new()),
            init: InitState::initialized(),
            mirror: OnceCell::new(),
        });
        classes.insert(key, Arc::clone(&class));
        class
    }

    /// Define a class for `loader`
    ///
    /// The superclass and interfaces must already be loaded, by the same
    /// loader or the bootstrap loader.
    pub fn define(&self, def: ClassDef, loader: Option<&ObjectRef>) -> NativeResult<Arc<Class>> {
        if def.name.is_empty() || def.name.starts_with('[') {
            return Err(Failure::ClassFormat(format!("illegal class name {:?}", def.name)));
        }
        let key = ClassKey {
            name: def.name.clone(),
            loader: loader_key(loader),
        };
        if self.classes.read().contains_key(&key) {
            return Err(Failure::Linkage(format!("duplicate class definition for {}", def.name)));
        }

        let super_class = match &def.super_name {
            Some(name) => Some(self.resolve_for(name, loader)?),
            None => None,
        };
        if let Some(sup) = &super_class {
            if sup.is_interface() || sup.is_array() {
                return Err(Failure::ClassFormat(format!(
                    "{} cannot extend {}",
                    def.name,
                    sup.name()
                )));
            }
        }
        let interfaces = def
            .interfaces
            .iter()
            .map(|name| self.resolve_for(name, loader))
            .collect::<NativeResult<Vec<_>>>()?;

        let mut instance_template = super_class
            .as_ref()
            .map(|s| s.instance_template.clone())
            .unwrap_or_default();
        let mut statics = Vec::new();
        let mut fields = Vec::with_capacity(def.fields.len());
        for fd in &def.fields {
            let ty = FieldType::parse(&fd.descriptor)
                .map_err(|e| Failure::ClassFormat(format!("{}.{}: {}", def.name, fd.name, e)))?;
            let storage = if fd.access_flags.contains(AccessFlags::STATIC) {
                &mut statics
            } else {
                &mut instance_template
            };
            let offset = storage.len();
            Slot::push_zeroed(ty.primitive(), storage);
            fields.push(Field {
                name: fd.name.clone(),
                descriptor: fd.descriptor.clone(),
                ty,
                access_flags: fd.access_flags,
                offset,
            });
        }

        let mut signatures = Vec::with_capacity(def.methods.len());
        for md in &def.methods {
            let sig = MethodSignature::parse(&md.descriptor)
                .map_err(|e| Failure::ClassFormat(format!("{}.{}: {}", def.name, md.name, e)))?;
            signatures.push(sig);
        }

        let ClassDef {
            name,
            access_flags,
            methods: method_defs,
            declaring_class,
            inner_access_flags,
            inner_classes,
            ..
        } = def;
        let class = Arc::new_cyclic(|weak| Class {
            methods: method_defs
                .into_iter()
                .zip(signatures)
                .enumerate()
                .map(|(slot, (md, signature))| {
                    Arc::new(Method {
                        name: md.name,
                        descriptor: md.descriptor,
                        signature,
                        access_flags: md.access_flags,
                        class: weak.clone(),
                        class_name: name.clone(),
                        slot,
                        code: md.code.into(),
                        native: OnceCell::new(),
                    })
                })
                .collect(),
            name,
            kind: ClassKind::Instance,
            super_class,
            interfaces,
            access_flags,
            inner_access_flags,
            declaring_class,
            inner_classes,
            loader: loader.cloned(),
            fields,
            instance_template,
            statics: Mutex::new(statics),
            init: InitState::new(),
            mirror: OnceCell::new(),
        });

        let mut classes = self.classes.write();
        if classes.contains_key(&key) {
            return Err(Failure::Linkage(format!("duplicate class definition for {}", key.name)));
        }
        classes.insert(key, Arc::clone(&class));
        tracing::trace!(class = class.name(), "defined");
        Ok(class)
    }

    fn resolve_for(&self, name: &str, loader: Option<&ObjectRef>) -> NativeResult<Arc<Class>> {
        self.find_loaded(name, loader)
            .or_else(|| self.find_bootstrap(name))
            .ok_or_else(|| Failure::NoClassDefFound {
                name: name.to_string(),
                cause: None,
            })
    }
}

impl Default for ClassRegistry {
    fn default() -> Self {
        Self::new()
    }
}
