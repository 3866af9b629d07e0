//! Heap allocation and accounting
//!
//! Objects are reference counted, so memory is reclaimed as soon as the last
//! reference drops. The heap only accounts for live bytes, enforces the
//! configured limit and reports the figures exposed through `VMRuntime`.

use std::mem::size_of;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::class::{Class, Method};
use crate::error::{Failure, NativeResult};
use crate::object::{ArrayData, Object, ObjectRef, Payload};
use crate::value::Slot;

/// Live allocation counters, shared with every allocation
#[derive(Debug, Default)]
pub struct HeapStats {
    live_bytes: AtomicUsize,
    live_objects: AtomicUsize,
    peak_bytes: AtomicUsize,
    collections: AtomicU64,
}

impl HeapStats {
    /// Bytes held by live objects
    pub fn live_bytes(&self) -> usize {
        self.live_bytes.load(Ordering::Relaxed)
    }

    /// Number of live objects
    pub fn live_objects(&self) -> usize {
        self.live_objects.load(Ordering::Relaxed)
    }

    /// Highest `live_bytes` observed
    pub fn peak_bytes(&self) -> usize {
        self.peak_bytes.load(Ordering::Relaxed)
    }

    /// Explicit collection requests served
    pub fn collections(&self) -> u64 {
        self.collections.load(Ordering::Relaxed)
    }
}

/// Accounting token owned by an object; releases its bytes on drop
pub struct Allocation {
    stats: Arc<HeapStats>,
    bytes: usize,
}

impl Drop for Allocation {
    fn drop(&mut self) {
        self.stats.live_bytes.fetch_sub(self.bytes, Ordering::Relaxed);
        self.stats.live_objects.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Object allocator
pub struct Heap {
    stats: Arc<HeapStats>,

    /// Maximum live bytes (0 = unlimited)
    max_bytes: usize,

    /// Reported heap size while usage stays below it
    initial_bytes: usize,
}

impl Heap {
    /// Create a heap with the given limits (0 = unlimited)
    pub fn new(max_bytes: usize, initial_bytes: usize) -> Self {
        Self {
            stats: Arc::new(HeapStats::default()),
            max_bytes,
            initial_bytes,
        }
    }

    /// Allocation counters
    pub fn stats(&self) -> &HeapStats {
        &self.stats
    }

    fn reserve(&self, bytes: usize) -> NativeResult<Allocation> {
        let live = &self.stats.live_bytes;
        let mut current = live.load(Ordering::Relaxed);
        loop {
            let next = current.saturating_add(bytes);
            if self.max_bytes > 0 && next > self.max_bytes {
                tracing::debug!(requested = bytes, live = current, "heap limit reached");
                return Err(Failure::OutOfMemory(format!(
                    "requested {} bytes with {} of {} in use",
                    bytes, current, self.max_bytes
                )));
            }
            match live.compare_exchange_weak(current, next, Ordering::Relaxed, Ordering::Relaxed) {
                Ok(_) => {
                    self.stats.peak_bytes.fetch_max(next, Ordering::Relaxed);
                    self.stats.live_objects.fetch_add(1, Ordering::Relaxed);
                    return Ok(Allocation {
                        stats: Arc::clone(&self.stats),
                        bytes,
                    });
                }
                Err(actual) => current = actual,
            }
        }
    }

    fn object_bytes(field_slots: usize, payload_bytes: usize) -> usize {
        size_of::<Object>() + field_slots * size_of::<Slot>() + payload_bytes
    }

    /// Allocate a zero-initialised instance of `class`
    pub fn alloc_object(&self, class: &Arc<Class>) -> NativeResult<ObjectRef> {
        if class.is_array() || class.is_primitive() {
            return Err(Failure::Internal(format!(
                "{} is not an instance class",
                class.name()
            )));
        }
        let fields = class.instance_template().to_vec();
        let allocation = self.reserve(Self::object_bytes(fields.len(), 0))?;
        Ok(Arc::new(Object::new(
            Arc::clone(class),
            fields,
            Payload::Plain,
            allocation,
        )))
    }

    /// Allocate a zero-filled array of `array_class` with `len` elements
    pub fn alloc_array(&self, array_class: &Arc<Class>, len: i32) -> NativeResult<ObjectRef> {
        if len < 0 {
            return Err(Failure::NegativeArraySize(len));
        }
        let component = array_class.component_type().ok_or_else(|| {
            Failure::Internal(format!("{} is not an array class", array_class.name()))
        })?;
        let data = ArrayData::new(component.primitive_type(), len as usize);
        let bytes = data.len().saturating_mul(data.element_width());
        self.alloc_array_data(array_class, data, bytes)
    }

    /// Allocate an array of `array_class` holding `data`
    pub fn alloc_array_with(&self, array_class: &Arc<Class>, data: ArrayData) -> NativeResult<ObjectRef> {
        let bytes = data.len().saturating_mul(data.element_width());
        self.alloc_array_data(array_class, data, bytes)
    }

    fn alloc_array_data(&self, array_class: &Arc<Class>, data: ArrayData, bytes: usize) -> NativeResult<ObjectRef> {
        let allocation = self.reserve(Self::object_bytes(0, bytes))?;
        Ok(Arc::new(Object::new(
            Arc::clone(array_class),
            Vec::new(),
            Payload::Array(parking_lot::Mutex::new(data)),
            allocation,
        )))
    }

    /// Allocate a string object
    pub fn alloc_string(&self, string_class: &Arc<Class>, value: &str) -> NativeResult<ObjectRef> {
        let fields = string_class.instance_template().to_vec();
        let allocation = self.reserve(Self::object_bytes(fields.len(), value.len()))?;
        Ok(Arc::new(Object::new(
            Arc::clone(string_class),
            fields,
            Payload::Str(value.into()),
            allocation,
        )))
    }

    /// Allocate the `java/lang/Class` instance mirroring `target`
    pub fn alloc_mirror(&self, class_class: &Arc<Class>, target: &Arc<Class>) -> NativeResult<ObjectRef> {
        let fields = class_class.instance_template().to_vec();
        let allocation = self.reserve(Self::object_bytes(fields.len(), 0))?;
        Ok(Arc::new(Object::new(
            Arc::clone(class_class),
            fields,
            Payload::Mirror(Arc::downgrade(target)),
            allocation,
        )))
    }

    /// Allocate an instance of `class` carrying a captured backtrace
    pub fn alloc_backtrace(&self, class: &Arc<Class>, frames: Vec<Arc<Method>>) -> NativeResult<ObjectRef> {
        let fields = class.instance_template().to_vec();
        let payload_bytes = frames.len() * size_of::<Arc<Method>>();
        let allocation = self.reserve(Self::object_bytes(fields.len(), payload_bytes))?;
        Ok(Arc::new(Object::new(
            Arc::clone(class),
            fields,
            Payload::Backtrace(frames),
            allocation,
        )))
    }

    /// Shallow copy of `obj`: fields and array elements are copied, referenced
    /// objects are shared
    pub fn clone_object(&self, obj: &ObjectRef) -> NativeResult<ObjectRef> {
        let fields = obj.field_slots();
        let (payload, payload_bytes) = match obj.payload() {
            Payload::Plain => (Payload::Plain, 0),
            Payload::Array(data) => {
                let data = data.lock().clone();
                let bytes = data.len().saturating_mul(data.element_width());
                (Payload::Array(parking_lot::Mutex::new(data)), bytes)
            }
            Payload::Str(s) => (Payload::Str(s.clone()), s.len()),
            Payload::Mirror(class) => (Payload::Mirror(class.clone()), 0),
            Payload::Backtrace(frames) => (
                Payload::Backtrace(frames.clone()),
                frames.len() * size_of::<Arc<Method>>(),
            ),
        };
        let allocation = self.reserve(Self::object_bytes(fields.len(), payload_bytes))?;
        Ok(Arc::new(Object::new(
            Arc::clone(obj.class()),
            fields,
            payload,
            allocation,
        )))
    }

    /// Current heap size as reported to managed code
    pub fn total_memory(&self) -> i64 {
        let size = self.initial_bytes.max(self.stats.peak_bytes());
        let size = if self.max_bytes > 0 { size.min(self.max_bytes) } else { size };
        clamp_i64(size)
    }

    /// Unused part of the current heap size
    pub fn free_memory(&self) -> i64 {
        (self.total_memory() - clamp_i64(self.stats.live_bytes())).max(0)
    }

    /// Heap limit (`i64::MAX` when unlimited)
    pub fn max_memory(&self) -> i64 {
        if self.max_bytes == 0 {
            i64::MAX
        } else {
            clamp_i64(self.max_bytes)
        }
    }

    /// Serve an explicit collection request
    ///
    /// This is a hint and reclaims nothing: unreachable objects are already
    /// freed when their last reference drops. Only the request count and a
    /// log line are produced.
    pub fn collect(&self) {
        let n = self.stats.collections.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::debug!(
            collection = n,
            live_bytes = self.stats.live_bytes(),
            live_objects = self.stats.live_objects(),
            "gc requested"
        );
    }

    /// Serve a finalization request (objects carry no finalizers)
    pub fn run_finalization(&self) {
        tracing::trace!("finalization requested");
    }
}

fn clamp_i64(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}
