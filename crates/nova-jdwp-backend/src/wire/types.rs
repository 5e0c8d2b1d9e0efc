use std::fmt;

use crate::error::ErrorCode;

/// Opaque 64-bit wire identifier.
///
/// `Id::NULL` is the null reference; every other value was issued by the
/// identifier registry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Id(u64);

impl Id {
    pub const NULL: Id = Id(0);

    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn as_u64(self) -> u64 {
        self.0
    }

    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// All identifiers travel as 8 bytes.
pub const ID_SIZE: usize = 8;

/// What a registry entry stands for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Object,
    ReferenceType,
    Thread,
    ThreadGroup,
    ClassLoader,
    String,
    Array,
    ClassObject,
    Field,
    Method,
    Frame,
}

impl EntityKind {
    /// Whether this kind travels as an object id.
    pub fn is_object(self) -> bool {
        matches!(
            self,
            EntityKind::Object
                | EntityKind::Thread
                | EntityKind::ThreadGroup
                | EntityKind::ClassLoader
                | EntityKind::String
                | EntityKind::Array
                | EntityKind::ClassObject
        )
    }

    /// Whether an entry registered as `actual` satisfies a lookup expecting
    /// `self`. Any object-like entry satisfies a plain object lookup.
    pub fn accepts(self, actual: EntityKind) -> bool {
        match self {
            EntityKind::Object => actual.is_object(),
            expected => expected == actual,
        }
    }

    /// Reply code for a stale or unknown identifier of this kind.
    pub fn invalid_id_error(self) -> ErrorCode {
        match self {
            EntityKind::Object | EntityKind::ClassObject => ErrorCode::InvalidObject,
            EntityKind::ReferenceType => ErrorCode::InvalidClass,
            EntityKind::Thread => ErrorCode::InvalidThread,
            EntityKind::ThreadGroup => ErrorCode::InvalidThreadGroup,
            EntityKind::ClassLoader => ErrorCode::InvalidClassLoader,
            EntityKind::String => ErrorCode::InvalidString,
            EntityKind::Array => ErrorCode::InvalidArray,
            EntityKind::Field => ErrorCode::InvalidFieldId,
            EntityKind::Method => ErrorCode::InvalidMethodId,
            EntityKind::Frame => ErrorCode::InvalidFrameId,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Object => "object",
            EntityKind::ReferenceType => "reference type",
            EntityKind::Thread => "thread",
            EntityKind::ThreadGroup => "thread group",
            EntityKind::ClassLoader => "class loader",
            EntityKind::String => "string",
            EntityKind::Array => "array",
            EntityKind::ClassObject => "class object",
            EntityKind::Field => "field",
            EntityKind::Method => "method",
            EntityKind::Frame => "frame",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `TypeTag` constants from the protocol.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TypeTag {
    Class = 1,
    Interface = 2,
    Array = 3,
}

impl TypeTag {
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(TypeTag::Class),
            2 => Some(TypeTag::Interface),
            3 => Some(TypeTag::Array),
            _ => None,
        }
    }

    pub fn from_facts(is_array: bool, is_interface: bool) -> Self {
        if is_array {
            TypeTag::Array
        } else if is_interface {
            TypeTag::Interface
        } else {
            TypeTag::Class
        }
    }
}

/// A reference type identifier together with its fixed type tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ReferenceTypeId {
    pub tag: TypeTag,
    pub id: Id,
}

/// An executable position: declaring type, method and code index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Location {
    pub type_tag: TypeTag,
    pub class_id: Id,
    pub method_id: Id,
    pub index: u64,
}

impl Location {
    pub fn reference_type(&self) -> ReferenceTypeId {
        ReferenceTypeId {
            tag: self.type_tag,
            id: self.class_id,
        }
    }
}

/// Convert a type signature (`Ljava/lang/String;`) into the dotted name used
/// by class patterns (`java.lang.String`). Array and primitive signatures are
/// rendered Java-style (`int[]`).
pub fn signature_to_class_name(signature: &str) -> String {
    let dims = signature.bytes().take_while(|b| *b == b'[').count();
    let element = &signature[dims..];
    let base = match element.as_bytes().first() {
        Some(b'L') => element
            .strip_prefix('L')
            .and_then(|s| s.strip_suffix(';'))
            .unwrap_or(element)
            .replace('/', "."),
        Some(b'Z') => "boolean".to_owned(),
        Some(b'B') => "byte".to_owned(),
        Some(b'C') => "char".to_owned(),
        Some(b'S') => "short".to_owned(),
        Some(b'I') => "int".to_owned(),
        Some(b'J') => "long".to_owned(),
        Some(b'F') => "float".to_owned(),
        Some(b'D') => "double".to_owned(),
        Some(b'V') => "void".to_owned(),
        _ => element.to_owned(),
    };
    let mut name = base;
    for _ in 0..dims {
        name.push_str("[]");
    }
    name
}

/// Convert a dotted class name (`com.example.Foo`) into a JDWP signature.
///
/// Names that already look like signatures are returned unchanged.
pub fn class_name_to_signature(class: &str) -> String {
    if class.starts_with('L') && class.ends_with(';') {
        return class.to_string();
    }
    let internal = class.replace('.', "/");
    format!("L{internal};")
}
