//! Field and method descriptors
//!
//! Parses the descriptor grammar (`I`, `[J`, `Ljava/lang/String;`,
//! `(ILjava/lang/Object;)V`) and derives the fixed [`ArgLayout`] a native
//! function uses to read its operand-stack arguments.

use std::fmt;

use crate::value::PrimitiveType;

/// Descriptor parse error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed descriptor {0:?}")]
pub struct DescriptorError(pub String);

/// Declared type of a field, parameter or (non-void) return value
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldType {
    /// Primitive type (never `Void`)
    Primitive(PrimitiveType),
    /// Class or interface, by internal name
    Object(String),
    /// Array type, by its full descriptor (`[I`, `[[Ljava/lang/String;`)
    Array(String),
}

impl FieldType {
    /// Parse a complete field descriptor
    pub fn parse(desc: &str) -> Result<Self, DescriptorError> {
        match parse_one(desc.as_bytes(), 0) {
            Some((ty, end)) if end == desc.len() => Ok(ty),
            _ => Err(DescriptorError(desc.to_string())),
        }
    }

    /// Primitive type, or `None` for references
    pub fn primitive(&self) -> Option<PrimitiveType> {
        match self {
            FieldType::Primitive(p) => Some(*p),
            _ => None,
        }
    }

    /// Check if this is a reference type
    pub fn is_reference(&self) -> bool {
        !matches!(self, FieldType::Primitive(_))
    }

    /// Operand-stack slots a value of this type occupies
    pub fn slot_count(&self) -> usize {
        match self {
            FieldType::Primitive(p) => p.slot_count(),
            _ => 1,
        }
    }

    /// Name of the class this type denotes (`int`, `java/lang/String`, `[I`)
    pub fn class_name(&self) -> &str {
        match self {
            FieldType::Primitive(p) => p.name(),
            FieldType::Object(name) | FieldType::Array(name) => name,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Primitive(p) => write!(f, "{}", p.descriptor()),
            FieldType::Object(name) => write!(f, "L{};", name),
            FieldType::Array(desc) => f.write_str(desc),
        }
    }
}

fn parse_one(bytes: &[u8], start: usize) -> Option<(FieldType, usize)> {
    let mut pos = start;
    while bytes.get(pos) == Some(&b'[') {
        pos += 1;
    }
    let dims = pos - start;
    if dims > 255 {
        return None;
    }
    let elem_end = match *bytes.get(pos)? {
        b'L' => {
            let semi = bytes[pos..].iter().position(|&b| b == b';')? + pos;
            if semi == pos + 1 {
                return None;
            }
            semi + 1
        }
        c => {
            let prim = PrimitiveType::from_descriptor(c as char)?;
            if prim == PrimitiveType::Void {
                return None;
            }
            pos + 1
        }
    };
    let text = std::str::from_utf8(&bytes[start..elem_end]).ok()?;
    let ty = if dims > 0 {
        FieldType::Array(text.to_string())
    } else if let Some(name) = text.strip_prefix('L').and_then(|t| t.strip_suffix(';')) {
        FieldType::Object(name.to_string())
    } else {
        FieldType::Primitive(PrimitiveType::from_descriptor(bytes[start] as char)?)
    };
    Some((ty, elem_end))
}

/// Parsed method descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodSignature {
    /// Declared parameter types (without `this`)
    pub params: Vec<FieldType>,
    /// Return type (`None` = void)
    pub ret: Option<FieldType>,
}

impl MethodSignature {
    /// Parse a method descriptor
    pub fn parse(desc: &str) -> Result<Self, DescriptorError> {
        let err = || DescriptorError(desc.to_string());
        let bytes = desc.as_bytes();
        if bytes.first() != Some(&b'(') {
            return Err(err());
        }
        let mut pos = 1;
        let mut params = Vec::new();
        loop {
            match bytes.get(pos) {
                Some(b')') => {
                    pos += 1;
                    break;
                }
                Some(_) => {
                    let (ty, end) = parse_one(bytes, pos).ok_or_else(err)?;
                    params.push(ty);
                    pos = end;
                }
                None => return Err(err()),
            }
        }
        let ret = match &desc[pos..] {
            "V" => None,
            rest => Some(FieldType::parse(rest).map_err(|_| err())?),
        };
        Ok(Self { params, ret })
    }

    /// Result classification of the return type
    pub fn result(&self) -> ResultKind {
        match &self.ret {
            None => ResultKind::Void,
            Some(FieldType::Primitive(p)) => ResultKind::Primitive(*p),
            Some(_) => ResultKind::Reference,
        }
    }
}

/// How a method returns its result on the operand stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultKind {
    /// Nothing pushed
    Void,
    /// Primitive pushed in 1 or 2 slots
    Primitive(PrimitiveType),
    /// One reference slot
    Reference,
}

impl ResultKind {
    /// Slots the result occupies
    pub fn slot_count(self) -> usize {
        match self {
            ResultKind::Void => 0,
            ResultKind::Primitive(p) => p.slot_count(),
            ResultKind::Reference => 1,
        }
    }
}

/// Position of one argument on the operand stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamSlot {
    /// Slot offset from the argument base
    pub offset: usize,
    /// Primitive type, `None` for references
    pub ty: Option<PrimitiveType>,
}

/// Argument layout of a method, fixed when a native is bound
///
/// Parameter 0 of an instance method is `this`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgLayout {
    params: Vec<ParamSlot>,
    arg_slots: usize,
    result: ResultKind,
}

impl ArgLayout {
    /// Compute the layout for `sig`
    pub fn new(sig: &MethodSignature, is_static: bool) -> Self {
        let mut params = Vec::with_capacity(sig.params.len() + 1);
        let mut offset = 0;
        if !is_static {
            params.push(ParamSlot { offset, ty: None });
            offset += 1;
        }
        for ty in &sig.params {
            params.push(ParamSlot {
                offset,
                ty: ty.primitive(),
            });
            offset += ty.slot_count();
        }
        Self {
            params,
            arg_slots: offset,
            result: sig.result(),
        }
    }

    /// Parameter `index` (counting `this` for instance methods)
    #[inline]
    pub fn param(&self, index: usize) -> Option<&ParamSlot> {
        self.params.get(index)
    }

    /// All parameters in order
    pub fn params(&self) -> &[ParamSlot] {
        &self.params
    }

    /// Total argument slots consumed
    #[inline]
    pub fn arg_slots(&self) -> usize {
        self.arg_slots
    }

    /// Result classification
    #[inline]
    pub fn result(&self) -> ResultKind {
        self.result
    }

    /// Slots written for the result
    #[inline]
    pub fn result_slots(&self) -> usize {
        self.result.slot_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_field_types() {
        assert_eq!(
            FieldType::parse("I").unwrap(),
            FieldType::Primitive(PrimitiveType::Int)
        );
        assert_eq!(
            FieldType::parse("Ljava/lang/String;").unwrap(),
            FieldType::Object("java/lang/String".into())
        );
        assert_eq!(
            FieldType::parse("[[J").unwrap(),
            FieldType::Array("[[J".into())
        );
        assert_eq!(
            FieldType::parse("[Ljava/lang/Object;").unwrap().class_name(),
            "[Ljava/lang/Object;"
        );
    }

    #[test]
    fn test_reject_malformed() {
        assert!(FieldType::parse("").is_err());
        assert!(FieldType::parse("V").is_err());
        assert!(FieldType::parse("L;").is_err());
        assert!(FieldType::parse("Ljava/lang/String").is_err());
        assert!(FieldType::parse("II").is_err());
        assert!(MethodSignature::parse("I)V").is_err());
        assert!(MethodSignature::parse("(I").is_err());
        assert!(MethodSignature::parse("(I)").is_err());
    }

    #[test]
    fn test_parse_method() {
        let sig = MethodSignature::parse("(Ljava/lang/Object;ILjava/lang/Object;II)V").unwrap();
        assert_eq!(sig.params.len(), 5);
        assert_eq!(sig.ret, None);
        assert_eq!(sig.result(), ResultKind::Void);

        let sig = MethodSignature::parse("()J").unwrap();
        assert!(sig.params.is_empty());
        assert_eq!(sig.result(), ResultKind::Primitive(PrimitiveType::Long));
    }

    #[test]
    fn test_layout_static_wide_args() {
        let sig = MethodSignature::parse("(JILjava/lang/Object;D)I").unwrap();
        let layout = ArgLayout::new(&sig, true);
        let offsets: Vec<usize> = layout.params().iter().map(|p| p.offset).collect();
        assert_eq!(offsets, vec![0, 2, 3, 4]);
        assert_eq!(layout.arg_slots(), 6);
        assert_eq!(layout.result_slots(), 1);
        assert_eq!(layout.param(2).unwrap().ty, None);
    }

    #[test]
    fn test_layout_instance_has_this() {
        let sig = MethodSignature::parse("(J)D").unwrap();
        let layout = ArgLayout::new(&sig, false);
        assert_eq!(layout.param(0).unwrap().ty, None);
        assert_eq!(layout.param(1).unwrap().offset, 1);
        assert_eq!(layout.arg_slots(), 3);
        assert_eq!(layout.result_slots(), 2);
    }

    #[test]
    fn test_display_roundtrip() {
        for desc in ["I", "[Z", "Ljava/lang/Class;", "[[Ljava/lang/Object;"] {
            assert_eq!(FieldType::parse(desc).unwrap().to_string(), desc);
        }
    }
}
