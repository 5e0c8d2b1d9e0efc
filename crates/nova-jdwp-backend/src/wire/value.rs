//! Tagged values: a one-byte JDWP tag followed by a fixed-width payload.

use crate::error::DecodeError;

use super::{
    codec::{DecodeResult, JdwpReader, JdwpWriter},
    types::{EntityKind, Id},
};

/// JDWP value tags.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Tag {
    Array = b'[',
    Byte = b'B',
    Char = b'C',
    Object = b'L',
    Float = b'F',
    Double = b'D',
    Int = b'I',
    Long = b'J',
    Short = b'S',
    Void = b'V',
    Boolean = b'Z',
    String = b's',
    Thread = b't',
    ThreadGroup = b'g',
    ClassLoader = b'l',
    ClassObject = b'c',
}

impl Tag {
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(raw: u8) -> Option<Self> {
        let tag = match raw {
            b'[' => Tag::Array,
            b'B' => Tag::Byte,
            b'C' => Tag::Char,
            b'L' => Tag::Object,
            b'F' => Tag::Float,
            b'D' => Tag::Double,
            b'I' => Tag::Int,
            b'J' => Tag::Long,
            b'S' => Tag::Short,
            b'V' => Tag::Void,
            b'Z' => Tag::Boolean,
            b's' => Tag::String,
            b't' => Tag::Thread,
            b'g' => Tag::ThreadGroup,
            b'l' => Tag::ClassLoader,
            b'c' => Tag::ClassObject,
            _ => return None,
        };
        Some(tag)
    }

    /// The tag a declared type signature implies before the runtime type is
    /// known (`Ljava/lang/String;` is still `L` here).
    pub fn from_signature(signature: &str) -> Option<Self> {
        Self::from_u8(*signature.as_bytes().first()?)
    }

    /// Registry kind for object-like tags.
    pub fn entity_kind(self) -> Option<EntityKind> {
        match self {
            Tag::Object => Some(EntityKind::Object),
            Tag::Array => Some(EntityKind::Array),
            Tag::String => Some(EntityKind::String),
            Tag::Thread => Some(EntityKind::Thread),
            Tag::ThreadGroup => Some(EntityKind::ThreadGroup),
            Tag::ClassLoader => Some(EntityKind::ClassLoader),
            Tag::ClassObject => Some(EntityKind::ClassObject),
            _ => None,
        }
    }

    pub fn for_entity(kind: EntityKind) -> Option<Self> {
        match kind {
            EntityKind::Object => Some(Tag::Object),
            EntityKind::Array => Some(Tag::Array),
            EntityKind::String => Some(Tag::String),
            EntityKind::Thread => Some(Tag::Thread),
            EntityKind::ThreadGroup => Some(Tag::ThreadGroup),
            EntityKind::ClassLoader => Some(Tag::ClassLoader),
            EntityKind::ClassObject => Some(Tag::ClassObject),
            _ => None,
        }
    }

    pub fn is_primitive(self) -> bool {
        self.entity_kind().is_none()
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Value {
    Byte(i8),
    Char(u16),
    Float(f32),
    Double(f64),
    Int(i32),
    Long(i64),
    Short(i16),
    Boolean(bool),
    Void,
    Object(Id),
    String(Id),
    Thread(Id),
    ThreadGroup(Id),
    ClassLoader(Id),
    ClassObject(Id),
    Array(Id),
}

impl Value {
    pub fn tag(&self) -> Tag {
        match self {
            Value::Byte(_) => Tag::Byte,
            Value::Char(_) => Tag::Char,
            Value::Float(_) => Tag::Float,
            Value::Double(_) => Tag::Double,
            Value::Int(_) => Tag::Int,
            Value::Long(_) => Tag::Long,
            Value::Short(_) => Tag::Short,
            Value::Boolean(_) => Tag::Boolean,
            Value::Void => Tag::Void,
            Value::Object(_) => Tag::Object,
            Value::String(_) => Tag::String,
            Value::Thread(_) => Tag::Thread,
            Value::ThreadGroup(_) => Tag::ThreadGroup,
            Value::ClassLoader(_) => Tag::ClassLoader,
            Value::ClassObject(_) => Tag::ClassObject,
            Value::Array(_) => Tag::Array,
        }
    }

    pub fn object_id(&self) -> Option<Id> {
        match *self {
            Value::Object(id)
            | Value::String(id)
            | Value::Thread(id)
            | Value::ThreadGroup(id)
            | Value::ClassLoader(id)
            | Value::ClassObject(id)
            | Value::Array(id) => Some(id),
            _ => None,
        }
    }

    /// Build the object-like variant for `tag`. Primitive tags yield `None`.
    pub fn reference(tag: Tag, id: Id) -> Option<Self> {
        let value = match tag {
            Tag::Object => Value::Object(id),
            Tag::String => Value::String(id),
            Tag::Thread => Value::Thread(id),
            Tag::ThreadGroup => Value::ThreadGroup(id),
            Tag::ClassLoader => Value::ClassLoader(id),
            Tag::ClassObject => Value::ClassObject(id),
            Tag::Array => Value::Array(id),
            _ => return None,
        };
        Some(value)
    }

    pub fn write_tagged(&self, w: &mut JdwpWriter) {
        w.write_u8(self.tag().as_u8());
        self.write_untagged(w);
    }

    pub fn write_untagged(&self, w: &mut JdwpWriter) {
        match *self {
            Value::Byte(v) => w.write_u8(v as u8),
            Value::Char(v) => w.write_u16(v),
            Value::Float(v) => w.write_f32(v),
            Value::Double(v) => w.write_f64(v),
            Value::Int(v) => w.write_i32(v),
            Value::Long(v) => w.write_i64(v),
            Value::Short(v) => w.write_i16(v),
            Value::Boolean(v) => w.write_bool(v),
            Value::Void => {}
            Value::Object(id)
            | Value::String(id)
            | Value::Thread(id)
            | Value::ThreadGroup(id)
            | Value::ClassLoader(id)
            | Value::ClassObject(id)
            | Value::Array(id) => w.write_id(id),
        }
    }

    pub fn read_tagged(r: &mut JdwpReader<'_>) -> DecodeResult<Self> {
        let raw = r.read_u8()?;
        let tag = Tag::from_u8(raw).ok_or(DecodeError::UnknownTag(raw))?;
        Self::read_untagged(tag, r)
    }

    pub fn read_untagged(tag: Tag, r: &mut JdwpReader<'_>) -> DecodeResult<Self> {
        let value = match tag {
            Tag::Byte => Value::Byte(r.read_u8()? as i8),
            Tag::Char => Value::Char(r.read_u16()?),
            Tag::Float => Value::Float(r.read_f32()?),
            Tag::Double => Value::Double(r.read_f64()?),
            Tag::Int => Value::Int(r.read_i32()?),
            Tag::Long => Value::Long(r.read_i64()?),
            Tag::Short => Value::Short(r.read_i16()?),
            Tag::Boolean => Value::Boolean(r.read_bool()?),
            Tag::Void => Value::Void,
            Tag::Object => Value::Object(r.read_id()?),
            Tag::String => Value::String(r.read_id()?),
            Tag::Thread => Value::Thread(r.read_id()?),
            Tag::ThreadGroup => Value::ThreadGroup(r.read_id()?),
            Tag::ClassLoader => Value::ClassLoader(r.read_id()?),
            Tag::ClassObject => Value::ClassObject(r.read_id()?),
            Tag::Array => Value::Array(r.read_id()?),
        };
        Ok(value)
    }
}
