//! Object model
//!
//! Heap objects are reference counted ([`ObjectRef`]) so an object's address
//! is stable for as long as any reference to it is held. Instance fields live
//! in a slot vector indexed by the field offset assigned at class definition
//! time; arrays, strings, class mirrors and captured backtraces carry their
//! data in the object's [`Payload`].

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, MutexGuard};

use crate::class::{Class, Method};
use crate::heap::Allocation;
use crate::monitor::Monitor;
use crate::value::{PrimitiveType, Slot, Value};

/// Shared reference to a heap object
pub type ObjectRef = Arc<Object>;

/// Heap object
pub struct Object {
    class: Arc<Class>,
    fields: Mutex<Vec<Slot>>,
    payload: Payload,
    monitor: Monitor,
    _allocation: Allocation,
}

/// Per-kind object data
pub enum Payload {
    /// Ordinary instance
    Plain,
    /// Array elements
    Array(Mutex<ArrayData>),
    /// Immutable string contents
    Str(Box<str>),
    /// `java/lang/Class` instance mirroring a class
    Mirror(Weak<Class>),
    /// Frames captured by `fillInStackTrace`, newest first
    Backtrace(Vec<Arc<Method>>),
}

impl Object {
    pub(crate) fn new(
        class: Arc<Class>,
        fields: Vec<Slot>,
        payload: Payload,
        allocation: Allocation,
    ) -> Self {
        Self {
            class,
            fields: Mutex::new(fields),
            payload,
            monitor: Monitor::new(),
            _allocation: allocation,
        }
    }

    /// Runtime class
    #[inline]
    pub fn class(&self) -> &Arc<Class> {
        &self.class
    }

    /// Object payload
    #[inline]
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Monitor guarding this object
    #[inline]
    pub fn monitor(&self) -> &Monitor {
        &self.monitor
    }

    /// Read the instance field at `offset`
    pub fn read_field(&self, offset: usize, ty: Option<PrimitiveType>) -> Option<Value> {
        let fields = self.fields.lock();
        Value::read_slots(fields.get(offset..)?, ty)
    }

    /// Write the instance field at `offset`
    ///
    /// Returns `false` if the offset lies outside the object.
    pub fn write_field(&self, offset: usize, value: &Value) -> bool {
        let mut fields = self.fields.lock();
        match fields.get_mut(offset..) {
            Some(slots) => value.write_slots(slots).is_some(),
            None => false,
        }
    }

    /// Copy of the raw field slots
    pub(crate) fn field_slots(&self) -> Vec<Slot> {
        self.fields.lock().clone()
    }

    /// Array elements, if this is an array
    pub fn array(&self) -> Option<MutexGuard<'_, ArrayData>> {
        match &self.payload {
            Payload::Array(data) => Some(data.lock()),
            _ => None,
        }
    }

    pub(crate) fn array_cell(&self) -> Option<&Mutex<ArrayData>> {
        match &self.payload {
            Payload::Array(data) => Some(data),
            _ => None,
        }
    }

    /// Array length, if this is an array
    pub fn array_len(&self) -> Option<usize> {
        self.array().map(|data| data.len())
    }

    /// String contents, if this is a string
    pub fn as_str(&self) -> Option<&str> {
        match &self.payload {
            Payload::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Class mirrored by this `java/lang/Class` instance
    pub fn mirrored_class(&self) -> Option<Arc<Class>> {
        match &self.payload {
            Payload::Mirror(class) => class.upgrade(),
            _ => None,
        }
    }

    /// Captured backtrace, if this object holds one
    pub fn backtrace(&self) -> Option<&[Arc<Method>]> {
        match &self.payload {
            Payload::Backtrace(frames) => Some(frames),
            _ => None,
        }
    }

    /// Identity hash, stable for the object's lifetime
    pub fn identity_hash(&self) -> i32 {
        let addr = self as *const Object as usize as u64;
        ((addr >> 3) ^ (addr >> 35)) as u32 as i32
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match &self.payload {
            Payload::Plain => "plain",
            Payload::Array(_) => "array",
            Payload::Str(_) => "string",
            Payload::Mirror(_) => "mirror",
            Payload::Backtrace(_) => "backtrace",
        };
        f.debug_struct("Object")
            .field("class", &self.class.name())
            .field("kind", &kind)
            .field("addr", &(self as *const Object))
            .finish()
    }
}

/// Array elements, one typed vector per element kind
#[derive(Debug, Clone)]
pub enum ArrayData {
    /// boolean[] (0 or 1 per element)
    Boolean(Vec<u8>),
    /// byte[]
    Byte(Vec<i8>),
    /// char[]
    Char(Vec<u16>),
    /// short[]
    Short(Vec<i16>),
    /// int[]
    Int(Vec<i32>),
    /// float[]
    Float(Vec<f32>),
    /// long[]
    Long(Vec<i64>),
    /// double[]
    Double(Vec<f64>),
    /// Reference arrays of any element class
    Ref(Vec<Option<ObjectRef>>),
}

macro_rules! each_kind {
    ($data:expr, $v:ident => $body:expr) => {
        match $data {
            ArrayData::Boolean($v) => $body,
            ArrayData::Byte($v) => $body,
            ArrayData::Char($v) => $body,
            ArrayData::Short($v) => $body,
            ArrayData::Int($v) => $body,
            ArrayData::Float($v) => $body,
            ArrayData::Long($v) => $body,
            ArrayData::Double($v) => $body,
            ArrayData::Ref($v) => $body,
        }
    };
}

impl ArrayData {
    /// Zero-filled elements of the given kind (`None` = references)
    pub fn new(elem: Option<PrimitiveType>, len: usize) -> Self {
        match elem {
            None | Some(PrimitiveType::Void) => ArrayData::Ref(vec![None; len]),
            Some(PrimitiveType::Boolean) => ArrayData::Boolean(vec![0; len]),
            Some(PrimitiveType::Byte) => ArrayData::Byte(vec![0; len]),
            Some(PrimitiveType::Char) => ArrayData::Char(vec![0; len]),
            Some(PrimitiveType::Short) => ArrayData::Short(vec![0; len]),
            Some(PrimitiveType::Int) => ArrayData::Int(vec![0; len]),
            Some(PrimitiveType::Float) => ArrayData::Float(vec![0.0; len]),
            Some(PrimitiveType::Long) => ArrayData::Long(vec![0; len]),
            Some(PrimitiveType::Double) => ArrayData::Double(vec![0.0; len]),
        }
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        each_kind!(self, v => v.len())
    }

    /// Check if the array has no elements
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element kind (`None` = references)
    pub fn element_type(&self) -> Option<PrimitiveType> {
        Some(match self {
            ArrayData::Boolean(_) => PrimitiveType::Boolean,
            ArrayData::Byte(_) => PrimitiveType::Byte,
            ArrayData::Char(_) => PrimitiveType::Char,
            ArrayData::Short(_) => PrimitiveType::Short,
            ArrayData::Int(_) => PrimitiveType::Int,
            ArrayData::Float(_) => PrimitiveType::Float,
            ArrayData::Long(_) => PrimitiveType::Long,
            ArrayData::Double(_) => PrimitiveType::Double,
            ArrayData::Ref(_) => return None,
        })
    }

    /// Width of one element in bytes
    pub fn element_width(&self) -> usize {
        match self.element_type() {
            Some(ty) => ty.element_width(),
            None => std::mem::size_of::<usize>(),
        }
    }

    /// Element at `index`
    pub fn get(&self, index: usize) -> Option<Value> {
        Some(match self {
            ArrayData::Boolean(v) => Value::Boolean(*v.get(index)? != 0),
            ArrayData::Byte(v) => Value::Byte(*v.get(index)?),
            ArrayData::Char(v) => Value::Char(*v.get(index)?),
            ArrayData::Short(v) => Value::Short(*v.get(index)?),
            ArrayData::Int(v) => Value::Int(*v.get(index)?),
            ArrayData::Float(v) => Value::Float(*v.get(index)?),
            ArrayData::Long(v) => Value::Long(*v.get(index)?),
            ArrayData::Double(v) => Value::Double(*v.get(index)?),
            ArrayData::Ref(v) => Value::Ref(v.get(index)?.clone()),
        })
    }

    /// Store `value` at `index`
    ///
    /// Returns `false` if the index is out of range or the value kind does
    /// not match the element kind. No store check is applied to references.
    pub fn set(&mut self, index: usize, value: Value) -> bool {
        match (self, value) {
            (ArrayData::Boolean(v), Value::Boolean(x)) => put(v, index, x as u8),
            (ArrayData::Byte(v), Value::Byte(x)) => put(v, index, x),
            (ArrayData::Char(v), Value::Char(x)) => put(v, index, x),
            (ArrayData::Short(v), Value::Short(x)) => put(v, index, x),
            (ArrayData::Int(v), Value::Int(x)) => put(v, index, x),
            (ArrayData::Float(v), Value::Float(x)) => put(v, index, x),
            (ArrayData::Long(v), Value::Long(x)) => put(v, index, x),
            (ArrayData::Double(v), Value::Double(x)) => put(v, index, x),
            (ArrayData::Ref(v), Value::Ref(x)) => put(v, index, x),
            _ => false,
        }
    }

    /// Reference elements, if this is a reference array
    pub fn refs(&self) -> Option<&[Option<ObjectRef>]> {
        match self {
            ArrayData::Ref(v) => Some(v),
            _ => None,
        }
    }

    /// Mutable reference elements, if this is a reference array
    pub fn refs_mut(&mut self) -> Option<&mut [Option<ObjectRef>]> {
        match self {
            ArrayData::Ref(v) => Some(v),
            _ => None,
        }
    }

    /// Move `len` elements from `src` to `dst` within this array; ranges may overlap
    ///
    /// Caller checks bounds.
    pub(crate) fn copy_within(&mut self, src: usize, dst: usize, len: usize) {
        match self {
            // Option<Arc> is not Copy; overlapping ranges go through a buffer
            ArrayData::Ref(v) => {
                let tmp: Vec<_> = v[src..src + len].to_vec();
                v[dst..dst + len].clone_from_slice(&tmp);
            }
            ArrayData::Boolean(v) => v.copy_within(src..src + len, dst),
            ArrayData::Byte(v) => v.copy_within(src..src + len, dst),
            ArrayData::Char(v) => v.copy_within(src..src + len, dst),
            ArrayData::Short(v) => v.copy_within(src..src + len, dst),
            ArrayData::Int(v) => v.copy_within(src..src + len, dst),
            ArrayData::Float(v) => v.copy_within(src..src + len, dst),
            ArrayData::Long(v) => v.copy_within(src..src + len, dst),
            ArrayData::Double(v) => v.copy_within(src..src + len, dst),
        }
    }

    /// Copy `len` elements from `other[src..]` into `self[dst..]`
    ///
    /// Returns `false` without copying if the element kinds differ. Caller
    /// checks bounds.
    pub(crate) fn copy_from(&mut self, dst: usize, other: &ArrayData, src: usize, len: usize) -> bool {
        match (self, other) {
            (ArrayData::Boolean(d), ArrayData::Boolean(s)) => d[dst..dst + len].copy_from_slice(&s[src..src + len]),
            (ArrayData::Byte(d), ArrayData::Byte(s)) => d[dst..dst + len].copy_from_slice(&s[src..src + len]),
            (ArrayData::Char(d), ArrayData::Char(s)) => d[dst..dst + len].copy_from_slice(&s[src..src + len]),
            (ArrayData::Short(d), ArrayData::Short(s)) => d[dst..dst + len].copy_from_slice(&s[src..src + len]),
            (ArrayData::Int(d), ArrayData::Int(s)) => d[dst..dst + len].copy_from_slice(&s[src..src + len]),
            (ArrayData::Float(d), ArrayData::Float(s)) => d[dst..dst + len].copy_from_slice(&s[src..src + len]),
            (ArrayData::Long(d), ArrayData::Long(s)) => d[dst..dst + len].copy_from_slice(&s[src..src + len]),
            (ArrayData::Double(d), ArrayData::Double(s)) => d[dst..dst + len].copy_from_slice(&s[src..src + len]),
            (ArrayData::Ref(d), ArrayData::Ref(s)) => d[dst..dst + len].clone_from_slice(&s[src..src + len]),
            _ => return false,
        }
        true
    }
}

fn put<T>(v: &mut [T], index: usize, x: T) -> bool {
    match v.get_mut(index) {
        Some(slot) => {
            *slot = x;
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_array_data_zeroed() {
        let data = ArrayData::new(Some(PrimitiveType::Int), 4);
        assert_eq!(data.len(), 4);
        assert_eq!(data.get(3), Some(Value::Int(0)));
        assert_eq!(data.get(4), None);

        let refs = ArrayData::new(None, 2);
        assert_eq!(refs.get(0), Some(Value::null()));
        assert_eq!(refs.element_type(), None);
    }

    #[test]
    fn test_array_set_kind_mismatch() {
        let mut data = ArrayData::new(Some(PrimitiveType::Short), 2);
        assert!(data.set(1, Value::Short(-3)));
        assert!(!data.set(1, Value::Int(7)));
        assert!(!data.set(2, Value::Short(1)));
        assert_eq!(data.get(1), Some(Value::Short(-3)));
    }

    #[test]
    fn test_copy_within_overlap() {
        let mut data = ArrayData::Int(vec![0, 1, 2, 3, 4, 5]);
        data.copy_within(0, 2, 4);
        assert!(matches!(&data, ArrayData::Int(v) if v == &[0, 1, 0, 1, 2, 3]));

        let mut data = ArrayData::Int(vec![0, 1, 2, 3, 4, 5]);
        data.copy_within(2, 0, 4);
        assert!(matches!(&data, ArrayData::Int(v) if v == &[2, 3, 4, 5, 4, 5]));
    }

    #[test]
    fn test_copy_from_rejects_kind_mismatch() {
        let mut dst = ArrayData::new(Some(PrimitiveType::Long), 3);
        let src = ArrayData::Int(vec![1, 2, 3]);
        assert!(!dst.copy_from(0, &src, 0, 3));
        assert_eq!(dst.get(0), Some(Value::Long(0)));

        let src = ArrayData::Long(vec![7, 8, 9]);
        assert!(dst.copy_from(1, &src, 0, 2));
        assert_eq!(dst.get(2), Some(Value::Long(8)));
    }

    #[test]
    fn test_element_widths() {
        assert_eq!(ArrayData::new(Some(PrimitiveType::Boolean), 0).element_width(), 1);
        assert_eq!(ArrayData::new(Some(PrimitiveType::Char), 0).element_width(), 2);
        assert_eq!(ArrayData::new(Some(PrimitiveType::Float), 0).element_width(), 4);
        assert_eq!(ArrayData::new(Some(PrimitiveType::Double), 0).element_width(), 8);
        assert_eq!(
            ArrayData::new(None, 0).element_width(),
            std::mem::size_of::<usize>()
        );
    }
}
