//! Native method registry
//!
//! Entries are grouped by owning class (internal name). An entry may carry a
//! full descriptor; lookup prefers an entry whose descriptor matches and
//! otherwise falls back to a unique name-only entry. Two name-only entries
//! for the same name make the lookup ambiguous rather than picking one.

use rustc_hash::FxHashMap;

use super::{bootstrap_groups, NativeFn, NativeMethod};

#[derive(Clone)]
struct Entry {
    name: String,
    descriptor: Option<String>,
    func: NativeFn,
}

/// Outcome of a registry lookup
#[derive(Clone, Copy)]
pub enum NativeLookup {
    /// Exactly one implementation applies
    Found(NativeFn),
    /// No implementation registered
    Missing,
    /// Several name-only entries match
    Ambiguous(usize),
}

impl NativeLookup {
    /// The implementation, if found
    pub fn found(self) -> Option<NativeFn> {
        match self {
            NativeLookup::Found(func) => Some(func),
            _ => None,
        }
    }
}

impl std::fmt::Debug for NativeLookup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NativeLookup::Found(_) => f.write_str("Found"),
            NativeLookup::Missing => f.write_str("Missing"),
            NativeLookup::Ambiguous(n) => write!(f, "Ambiguous({})", n),
        }
    }
}

/// Table from owning class to its native implementations
///
/// Built before boot and owned by the VM; never mutated afterwards.
#[derive(Default, Clone)]
pub struct NativeRegistry {
    classes: FxHashMap<String, Vec<Entry>>,
}

impl NativeRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every VM-provided native group
    pub fn bootstrap() -> Self {
        let mut registry = Self::new();
        for (class, methods) in bootstrap_groups() {
            registry.register_group(class, methods);
        }
        registry
    }

    /// Add a static group of natives for `class`
    pub fn register_group(&mut self, class: &str, methods: &[NativeMethod]) {
        for m in methods {
            self.register(class, m.name, m.descriptor, m.func);
        }
    }

    /// Add one native for `class`
    pub fn register(&mut self, class: &str, name: &str, descriptor: Option<&str>, func: NativeFn) {
        self.classes.entry(class.to_string()).or_default().push(Entry {
            name: name.to_string(),
            descriptor: descriptor.map(str::to_string),
            func,
        });
    }

    /// Resolve the implementation of `class.name descriptor`
    pub fn lookup(&self, class: &str, name: &str, descriptor: &str) -> NativeLookup {
        let Some(entries) = self.classes.get(class) else {
            return NativeLookup::Missing;
        };

        if let Some(exact) = entries
            .iter()
            .find(|e| e.name == name && e.descriptor.as_deref() == Some(descriptor))
        {
            return NativeLookup::Found(exact.func);
        }

        let mut candidates = entries
            .iter()
            .filter(|e| e.name == name && e.descriptor.is_none());
        match (candidates.next(), candidates.count()) {
            (None, _) => NativeLookup::Missing,
            (Some(entry), 0) => NativeLookup::Found(entry.func),
            (Some(_), rest) => NativeLookup::Ambiguous(rest + 1),
        }
    }

    /// Check if any native is registered for `class`
    pub fn has_class(&self, class: &str) -> bool {
        self.classes.contains_key(class)
    }

    /// Total number of entries
    pub fn len(&self) -> usize {
        self.classes.values().map(Vec::len).sum()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

impl std::fmt::Debug for NativeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeRegistry")
            .field("classes", &self.classes.len())
            .field("entries", &self.len())
            .finish()
    }
}
