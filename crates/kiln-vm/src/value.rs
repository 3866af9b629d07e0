//! Value and operand-stack slot representation
//!
//! Two representations live side by side:
//!
//! - [`Value`]: a fully typed value, used by the reflection bridge, the
//!   invocation dispatcher and the heap accessors.
//! - [`Slot`]: one operand-stack word as seen by native functions.
//!
//! # Slot Encoding
//!
//! ```text
//! boolean/byte/char/short/int/float  →  Int(bits)            (1 slot)
//! long/double                        →  Wide(bits), WideTail (2 slots)
//! reference                          →  Ref(Option<ObjectRef>) (1 slot)
//! ```
//!
//! The tag never drives dispatch: native functions read their arguments
//! through an `ArgLayout` fixed when the native is bound, so the tag only
//! serves as a consistency check.

use std::fmt;
use std::sync::Arc;

use crate::object::ObjectRef;

/// Primitive types of the managed language (plus `void` for return types)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    /// `boolean` (Z)
    Boolean,
    /// `byte` (B)
    Byte,
    /// `char` (C)
    Char,
    /// `short` (S)
    Short,
    /// `int` (I)
    Int,
    /// `float` (F)
    Float,
    /// `long` (J)
    Long,
    /// `double` (D)
    Double,
    /// `void` (V), return types only
    Void,
}

impl PrimitiveType {
    /// All primitive types, in descriptor order
    pub const ALL: [PrimitiveType; 9] = [
        PrimitiveType::Boolean,
        PrimitiveType::Byte,
        PrimitiveType::Char,
        PrimitiveType::Short,
        PrimitiveType::Int,
        PrimitiveType::Float,
        PrimitiveType::Long,
        PrimitiveType::Double,
        PrimitiveType::Void,
    ];

    /// Parse a descriptor character
    pub const fn from_descriptor(c: char) -> Option<Self> {
        match c {
            'Z' => Some(Self::Boolean),
            'B' => Some(Self::Byte),
            'C' => Some(Self::Char),
            'S' => Some(Self::Short),
            'I' => Some(Self::Int),
            'F' => Some(Self::Float),
            'J' => Some(Self::Long),
            'D' => Some(Self::Double),
            'V' => Some(Self::Void),
            _ => None,
        }
    }

    /// Descriptor character
    pub const fn descriptor(self) -> char {
        match self {
            Self::Boolean => 'Z',
            Self::Byte => 'B',
            Self::Char => 'C',
            Self::Short => 'S',
            Self::Int => 'I',
            Self::Float => 'F',
            Self::Long => 'J',
            Self::Double => 'D',
            Self::Void => 'V',
        }
    }

    /// Source-level name (`"int"`), also the name of the primitive class
    pub const fn name(self) -> &'static str {
        match self {
            Self::Boolean => "boolean",
            Self::Byte => "byte",
            Self::Char => "char",
            Self::Short => "short",
            Self::Int => "int",
            Self::Float => "float",
            Self::Long => "long",
            Self::Double => "double",
            Self::Void => "void",
        }
    }

    /// Number of operand-stack slots a value of this type occupies
    pub const fn slot_count(self) -> usize {
        match self {
            Self::Void => 0,
            Self::Long | Self::Double => 2,
            _ => 1,
        }
    }

    /// Width in bytes of one array element of this type
    pub const fn element_width(self) -> usize {
        match self {
            Self::Boolean | Self::Byte => 1,
            Self::Char | Self::Short => 2,
            Self::Int | Self::Float => 4,
            Self::Long | Self::Double => 8,
            Self::Void => 0,
        }
    }

    /// Internal name of the wrapper class boxing this type
    pub const fn wrapper_class(self) -> &'static str {
        match self {
            Self::Boolean => "java/lang/Boolean",
            Self::Byte => "java/lang/Byte",
            Self::Char => "java/lang/Character",
            Self::Short => "java/lang/Short",
            Self::Int => "java/lang/Integer",
            Self::Float => "java/lang/Float",
            Self::Long => "java/lang/Long",
            Self::Double => "java/lang/Double",
            Self::Void => "java/lang/Void",
        }
    }

    /// Zero value of this type (`None` for void)
    pub fn zero(self) -> Option<Value> {
        Some(match self {
            Self::Boolean => Value::Boolean(false),
            Self::Byte => Value::Byte(0),
            Self::Char => Value::Char(0),
            Self::Short => Value::Short(0),
            Self::Int => Value::Int(0),
            Self::Float => Value::Float(0.0),
            Self::Long => Value::Long(0),
            Self::Double => Value::Double(0.0),
            Self::Void => return None,
        })
    }
}

impl fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Typed value
#[derive(Clone)]
pub enum Value {
    /// boolean
    Boolean(bool),
    /// byte
    Byte(i8),
    /// char (UTF-16 code unit)
    Char(u16),
    /// short
    Short(i16),
    /// int
    Int(i32),
    /// float
    Float(f32),
    /// long
    Long(i64),
    /// double
    Double(f64),
    /// reference (None = null)
    Ref(Option<ObjectRef>),
}

impl Value {
    /// The null reference
    #[inline]
    pub const fn null() -> Self {
        Value::Ref(None)
    }

    /// Wrap an object reference
    #[inline]
    pub fn object(obj: ObjectRef) -> Self {
        Value::Ref(Some(obj))
    }

    /// Primitive type of this value (`None` for references)
    pub fn primitive_type(&self) -> Option<PrimitiveType> {
        Some(match self {
            Value::Boolean(_) => PrimitiveType::Boolean,
            Value::Byte(_) => PrimitiveType::Byte,
            Value::Char(_) => PrimitiveType::Char,
            Value::Short(_) => PrimitiveType::Short,
            Value::Int(_) => PrimitiveType::Int,
            Value::Float(_) => PrimitiveType::Float,
            Value::Long(_) => PrimitiveType::Long,
            Value::Double(_) => PrimitiveType::Double,
            Value::Ref(_) => return None,
        })
    }

    /// Check if this value is the null reference
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Ref(None))
    }

    /// Number of stack slots this value occupies
    pub fn slot_count(&self) -> usize {
        match self.primitive_type() {
            Some(ty) => ty.slot_count(),
            None => 1,
        }
    }

    /// Extract an int
    pub fn as_int(&self) -> Option<i32> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Extract a long
    pub fn as_long(&self) -> Option<i64> {
        match self {
            Value::Long(v) => Some(*v),
            _ => None,
        }
    }

    /// Extract a boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    /// Extract a double
    pub fn as_double(&self) -> Option<f64> {
        match self {
            Value::Double(v) => Some(*v),
            _ => None,
        }
    }

    /// Borrow the referenced object, if this is a non-null reference
    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Ref(Some(obj)) => Some(obj),
            _ => None,
        }
    }

    /// Consume into a reference (`None` for null or for primitives)
    pub fn into_object(self) -> Option<ObjectRef> {
        match self {
            Value::Ref(obj) => obj,
            _ => None,
        }
    }

    /// Write this value into `slots` (one or two slots)
    ///
    /// Returns the number of slots written, or `None` if `slots` is too short.
    pub fn write_slots(&self, slots: &mut [Slot]) -> Option<usize> {
        let count = self.slot_count();
        if slots.len() < count {
            return None;
        }
        match self {
            Value::Long(v) => {
                slots[0] = Slot::Wide(*v as u64);
                slots[1] = Slot::WideTail;
            }
            Value::Double(v) => {
                slots[0] = Slot::Wide(v.to_bits());
                slots[1] = Slot::WideTail;
            }
            Value::Ref(r) => slots[0] = Slot::Ref(r.clone()),
            other => slots[0] = Slot::Int(other.narrow_bits()),
        }
        Some(count)
    }

    /// Append this value's slots to `out`
    pub fn push_slots(&self, out: &mut Vec<Slot>) {
        match self {
            Value::Long(v) => {
                out.push(Slot::Wide(*v as u64));
                out.push(Slot::WideTail);
            }
            Value::Double(v) => {
                out.push(Slot::Wide(v.to_bits()));
                out.push(Slot::WideTail);
            }
            Value::Ref(r) => out.push(Slot::Ref(r.clone())),
            other => out.push(Slot::Int(other.narrow_bits())),
        }
    }

    /// Read a value of type `ty` (`None` = reference) from `slots`
    ///
    /// Returns `None` if the slots do not carry a value of that shape.
    pub fn read_slots(slots: &[Slot], ty: Option<PrimitiveType>) -> Option<Value> {
        let Some(ty) = ty else {
            return match slots.first()? {
                Slot::Ref(r) => Some(Value::Ref(r.clone())),
                _ => None,
            };
        };
        match ty {
            PrimitiveType::Long | PrimitiveType::Double => {
                let (Slot::Wide(bits), Slot::WideTail) = (slots.first()?, slots.get(1)?) else {
                    return None;
                };
                Some(if ty == PrimitiveType::Long {
                    Value::Long(*bits as i64)
                } else {
                    Value::Double(f64::from_bits(*bits))
                })
            }
            PrimitiveType::Void => None,
            _ => match slots.first()? {
                Slot::Int(bits) => Some(Value::from_narrow_bits(*bits, ty)),
                _ => None,
            },
        }
    }

    /// 32-bit encoding of a narrow primitive (sign/zero extended as the
    /// interpreter would hold it in an int slot)
    fn narrow_bits(&self) -> u32 {
        match self {
            Value::Boolean(b) => *b as u32,
            Value::Byte(v) => *v as i32 as u32,
            Value::Char(v) => *v as u32,
            Value::Short(v) => *v as i32 as u32,
            Value::Int(v) => *v as u32,
            Value::Float(v) => v.to_bits(),
            _ => 0,
        }
    }

    fn from_narrow_bits(bits: u32, ty: PrimitiveType) -> Value {
        match ty {
            PrimitiveType::Boolean => Value::Boolean(bits & 1 != 0),
            PrimitiveType::Byte => Value::Byte(bits as i8),
            PrimitiveType::Char => Value::Char(bits as u16),
            PrimitiveType::Short => Value::Short(bits as i16),
            PrimitiveType::Float => Value::Float(f32::from_bits(bits)),
            _ => Value::Int(bits as i32),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Byte(a), Value::Byte(b)) => a == b,
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::Short(a), Value::Short(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Long(a), Value::Long(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => a.to_bits() == b.to_bits(),
            (Value::Ref(a), Value::Ref(b)) => match (a, b) {
                (None, None) => true,
                (Some(a), Some(b)) => Arc::ptr_eq(a, b),
                _ => false,
            },
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Boolean(v) => write!(f, "boolean({})", v),
            Value::Byte(v) => write!(f, "byte({})", v),
            Value::Char(v) => write!(f, "char({:#x})", v),
            Value::Short(v) => write!(f, "short({})", v),
            Value::Int(v) => write!(f, "int({})", v),
            Value::Float(v) => write!(f, "float({})", v),
            Value::Long(v) => write!(f, "long({})", v),
            Value::Double(v) => write!(f, "double({})", v),
            Value::Ref(None) => write!(f, "null"),
            Value::Ref(Some(obj)) => write!(f, "ref({}@{:p})", obj.class().name(), Arc::as_ptr(obj)),
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::null()
    }
}

/// One operand-stack word
#[derive(Clone, Default)]
pub enum Slot {
    /// 32-bit primitive bits
    Int(u32),
    /// First half of a 64-bit primitive; the 64 bits live here
    Wide(u64),
    /// Second half of a 64-bit primitive
    WideTail,
    /// Reference (None = null)
    Ref(Option<ObjectRef>),
    /// Never written
    #[default]
    Empty,
}

impl Slot {
    /// Append zero-initialised slots for a value of type `ty` (`None` = reference)
    pub fn push_zeroed(ty: Option<PrimitiveType>, out: &mut Vec<Slot>) {
        match ty {
            None => out.push(Slot::Ref(None)),
            Some(PrimitiveType::Long | PrimitiveType::Double) => {
                out.push(Slot::Wide(0));
                out.push(Slot::WideTail);
            }
            Some(PrimitiveType::Void) => {}
            Some(_) => out.push(Slot::Int(0)),
        }
    }

    /// Short tag name, for diagnostics
    pub const fn tag_name(&self) -> &'static str {
        match self {
            Slot::Int(_) => "int",
            Slot::Wide(_) => "wide",
            Slot::WideTail => "wide-tail",
            Slot::Ref(_) => "ref",
            Slot::Empty => "empty",
        }
    }
}

impl fmt::Debug for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Slot::Int(bits) => write!(f, "Int({:#x})", bits),
            Slot::Wide(bits) => write!(f, "Wide({:#x})", bits),
            Slot::WideTail => write!(f, "WideTail"),
            Slot::Ref(None) => write!(f, "Ref(null)"),
            Slot::Ref(Some(obj)) => write!(f, "Ref({:p})", Arc::as_ptr(obj)),
            Slot::Empty => write!(f, "Empty"),
        }
    }
}
