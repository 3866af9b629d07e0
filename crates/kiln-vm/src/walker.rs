//! Stack walking for caller-sensitive queries
//!
//! Reflection machinery shows up on the stack as extra frames: a boundary
//! marker pushed by the VM when it calls back into executed code, plus the
//! frames of the trampoline classes (`Method.invoke`, `Constructor.newInstance`).
//! Caller queries skip both so the answer names the code that really asked.

use std::sync::Arc;

use crate::class::{Class, Method};
use crate::stack::Frame;

/// Result of a full-stack snapshot: owning class and method name per real
/// frame, newest first
#[derive(Debug, Default)]
pub struct StackSnapshot {
    /// Declaring class of each frame's method
    pub classes: Vec<Arc<Class>>,
    /// Name of each frame's method
    pub names: Vec<String>,
}

/// Frame classifier configured with the trampoline classes
#[derive(Debug, Clone)]
pub struct StackWalker {
    trampolines: Vec<String>,
}

impl StackWalker {
    /// Walker skipping frames of the given classes
    pub fn new<I, S>(trampolines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            trampolines: trampolines.into_iter().map(Into::into).collect(),
        }
    }

    /// Check if `method` belongs to a reflective-invocation trampoline
    pub fn is_trampoline(&self, method: &Method) -> bool {
        self.trampolines.iter().any(|t| t == method.class_name())
    }

    /// First real, non-trampoline frame strictly below `current`
    ///
    /// Boundary markers and trampoline frames are skipped however deeply
    /// they nest; `None` means the root was reached.
    pub fn skip_to_real_caller<'a>(&self, current: &'a Arc<Frame>) -> Option<&'a Arc<Method>> {
        self.real_caller_frame(current)?.method()
    }

    fn real_caller_frame<'a>(&self, current: &'a Arc<Frame>) -> Option<&'a Arc<Frame>> {
        let mut frame = current.prev()?;
        loop {
            match &**frame {
                Frame::Root => return None,
                Frame::Boundary(prev) => frame = prev,
                Frame::Real(method, prev) if self.is_trampoline(method) => frame = prev,
                Frame::Real(..) => return Some(frame),
            }
        }
    }

    /// Frame of the method that invoked the native running at `top`
    ///
    /// `top` is the native's own frame; the method asking the question is the
    /// next real frame, possibly behind one boundary.
    fn asking_frame<'a>(top: &'a Arc<Frame>) -> Option<&'a Arc<Frame>> {
        let mut frame = top.prev()?;
        if let Frame::Boundary(prev) = &**frame {
            frame = prev;
        }
        match &**frame {
            Frame::Real(..) => Some(frame),
            _ => None,
        }
    }

    /// Class of the caller of the method that invoked the native at `top`
    pub fn calling_class(&self, top: &Arc<Frame>) -> Option<Arc<Class>> {
        let asking = Self::asking_frame(top)?;
        self.skip_to_real_caller(asking)?.class()
    }

    /// Classes of every real frame from the real caller of the native at
    /// `top` down to the root, newest first
    pub fn class_context(&self, top: &Arc<Frame>) -> Vec<Arc<Class>> {
        let Some(caller) = self.real_caller_frame(top) else {
            return Vec::new();
        };
        let depth = frames_from(caller)
            .filter(|f| matches!(&***f, Frame::Real(..)))
            .count();
        let mut classes = Vec::with_capacity(depth);
        classes.extend(
            frames_from(caller)
                .filter_map(|f| f.method())
                .filter_map(|m| m.class()),
        );
        classes
    }

    /// Class and method name of every real frame from `top` to the root
    ///
    /// Counts first, then fills sequences of exactly that length.
    pub fn snapshot(&self, top: &Arc<Frame>) -> StackSnapshot {
        let depth = frames_from(top)
            .filter(|f| matches!(&***f, Frame::Real(..)))
            .count();

        let mut snapshot = StackSnapshot {
            classes: Vec::with_capacity(depth),
            names: Vec::with_capacity(depth),
        };
        for frame in frames_from(top) {
            if let Frame::Real(method, _) = &**frame {
                if let Some(class) = method.class() {
                    snapshot.classes.push(class);
                    snapshot.names.push(method.name().to_string());
                }
            }
        }
        snapshot
    }

    /// Methods of every real frame from `top` to the root, newest first
    pub fn real_methods(&self, top: &Arc<Frame>) -> Vec<Arc<Method>> {
        frames_from(top)
            .filter_map(|f| f.method().cloned())
            .collect()
    }
}

fn frames_from(top: &Arc<Frame>) -> impl Iterator<Item = &Arc<Frame>> {
    std::iter::successors(Some(top), |f| f.prev())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::{ClassDef, ClassRegistry};
    use crate::stack::FrameChain;

    struct Fixture {
        _registry: ClassRegistry,
        run: Arc<Method>,
        invoke: Arc<Method>,
        work: Arc<Method>,
        query: Arc<Method>,
    }

    fn fixture() -> Fixture {
        let registry = ClassRegistry::new();
        registry.define(ClassDef::new("java/lang/Object").root(), None).unwrap();
        let caller = registry
            .define(ClassDef::new("test/Caller").method("run", "()V", Vec::new()), None)
            .unwrap();
        let reflect = registry
            .define(
                ClassDef::new("java/lang/reflect/Method").native_method(
                    "invoke",
                    "(Ljava/lang/Object;[Ljava/lang/Object;)Ljava/lang/Object;",
                ),
                None,
            )
            .unwrap();
        let target = registry
            .define(
                ClassDef::new("test/Target")
                    .method("work", "()V", Vec::new())
                    .static_native("query", "()Ljava/lang/Class;"),
                None,
            )
            .unwrap();
        Fixture {
            run: Arc::clone(&caller.methods()[0]),
            invoke: Arc::clone(&reflect.methods()[0]),
            work: Arc::clone(&target.methods()[0]),
            query: Arc::clone(&target.methods()[1]),
            _registry: registry,
        }
    }

    fn walker() -> StackWalker {
        StackWalker::new(["java/lang/reflect/Method", "java/lang/reflect/Constructor"])
    }

    /// Caller.run ─► Method.invoke ─► Target.work ─► Target.query (native)
    fn reflective_chain(f: &Fixture) -> FrameChain {
        let mut chain = FrameChain::new();
        chain.push_real(Arc::clone(&f.run));
        chain.push_boundary();
        chain.push_real(Arc::clone(&f.invoke));
        chain.push_boundary();
        chain.push_real(Arc::clone(&f.work));
        chain.push_real(Arc::clone(&f.query));
        chain
    }

    #[test]
    fn test_calling_class_skips_trampolines() {
        let f = fixture();
        let chain = reflective_chain(&f);
        let class = walker().calling_class(chain.top()).unwrap();
        assert_eq!(class.name(), "test/Caller");
    }

    #[test]
    fn test_calling_class_direct_call() {
        let f = fixture();
        let mut chain = FrameChain::new();
        chain.push_real(Arc::clone(&f.run));
        chain.push_real(Arc::clone(&f.work));
        chain.push_real(Arc::clone(&f.query));
        let class = walker().calling_class(chain.top()).unwrap();
        assert_eq!(class.name(), "test/Caller");
    }

    #[test]
    fn test_calling_class_at_root() {
        let f = fixture();
        let mut chain = FrameChain::new();
        chain.push_boundary();
        chain.push_real(Arc::clone(&f.work));
        chain.push_real(Arc::clone(&f.query));
        assert!(walker().calling_class(chain.top()).is_none());
    }

    #[test]
    fn test_nested_trampolines() {
        let f = fixture();
        let mut chain = FrameChain::new();
        chain.push_real(Arc::clone(&f.run));
        for _ in 0..3 {
            chain.push_boundary();
            chain.push_real(Arc::clone(&f.invoke));
        }
        chain.push_boundary();
        chain.push_real(Arc::clone(&f.work));
        chain.push_real(Arc::clone(&f.query));
        let class = walker().calling_class(chain.top()).unwrap();
        assert_eq!(class.name(), "test/Caller");
    }

    #[test]
    fn test_class_context() {
        let f = fixture();
        let chain = reflective_chain(&f);
        let names: Vec<String> = walker()
            .class_context(chain.top())
            .iter()
            .map(|c| c.name().to_string())
            .collect();
        assert_eq!(
            names,
            vec!["test/Target", "java/lang/reflect/Method", "test/Caller"]
        );
    }

    #[test]
    fn test_snapshot_includes_native_frame() {
        let f = fixture();
        let chain = reflective_chain(&f);
        let snapshot = walker().snapshot(chain.top());
        assert_eq!(snapshot.names, vec!["query", "work", "invoke", "run"]);
        assert_eq!(snapshot.classes.len(), 4);
        assert_eq!(snapshot.classes[2].name(), "java/lang/reflect/Method");
    }

    #[test]
    fn test_empty_chain() {
        let chain = FrameChain::new();
        let w = walker();
        assert!(w.class_context(chain.top()).is_empty());
        assert!(w.snapshot(chain.top()).names.is_empty());
        assert!(w.skip_to_real_caller(chain.top()).is_none());
    }
}
