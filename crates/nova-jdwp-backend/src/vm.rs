//! The target VM as seen by the back-end.
//!
//! The back-end never owns target entities. The collaborator mints a
//! [`TargetHandle`] for every class, object, thread, field, method and frame
//! it hands out, and the identifier registry maps those handles to wire ids.

use std::fmt;

use crate::{
    error::VmResult,
    wire::{
        types::{signature_to_class_name, EntityKind, TypeTag},
        value::Tag,
    },
};

/// Opaque key for a target-side entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetHandle(pub u64);

impl fmt::Display for TargetHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// `VirtualMachine.Version` reply contents.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VmDescription {
    pub description: String,
    pub jdwp_major: i32,
    pub jdwp_minor: i32,
    pub vm_version: String,
    pub vm_name: String,
}

/// `ClassStatus` bits.
pub mod class_status {
    pub const VERIFIED: i32 = 1;
    pub const PREPARED: i32 = 2;
    pub const INITIALIZED: i32 = 4;
    pub const ERROR: i32 = 8;
}

/// `ThreadStatus` constants.
pub mod thread_status {
    pub const ZOMBIE: i32 = 0;
    pub const RUNNING: i32 = 1;
    pub const SLEEPING: i32 = 2;
    pub const MONITOR: i32 = 3;
    pub const WAIT: i32 = 4;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeFacts {
    pub signature: String,
    pub is_array: bool,
    pub is_interface: bool,
    pub modifiers: i32,
    pub status: i32,
    pub source_file: Option<String>,
    pub superclass: Option<TargetHandle>,
    pub interfaces: Vec<TargetHandle>,
    pub class_loader: Option<TargetHandle>,
}

impl TypeFacts {
    pub fn type_tag(&self) -> TypeTag {
        TypeTag::from_facts(self.is_array, self.is_interface)
    }

    pub fn class_name(&self) -> String {
        signature_to_class_name(&self.signature)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldFacts {
    pub name: String,
    pub signature: String,
    pub modifiers: i32,
    pub declaring_type: TargetHandle,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MethodFacts {
    pub name: String,
    pub signature: String,
    pub modifiers: i32,
    pub declaring_type: TargetHandle,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LineTable {
    pub start: i64,
    pub end: i64,
    /// `(code index, line number)` pairs.
    pub lines: Vec<(u64, i32)>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VariableSlot {
    pub code_index: u64,
    pub name: String,
    pub signature: String,
    pub length: u32,
    pub slot: i32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VariableTable {
    pub arg_count: i32,
    pub slots: Vec<VariableSlot>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ThreadFacts {
    pub name: String,
    pub group: TargetHandle,
    pub status: i32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ThreadGroupFacts {
    pub name: String,
    pub parent: Option<TargetHandle>,
}

/// One activation on a suspended thread's stack, innermost first.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameFacts {
    pub frame: TargetHandle,
    pub method: TargetHandle,
    pub index: u64,
}

/// A value on the target side. References carry the collaborator handle and
/// the runtime kind of the referenced entity; `handle: None` is null.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TargetValue {
    Byte(i8),
    Char(u16),
    Float(f32),
    Double(f64),
    Int(i32),
    Long(i64),
    Short(i16),
    Boolean(bool),
    Void,
    Reference {
        kind: EntityKind,
        handle: Option<TargetHandle>,
    },
}

impl TargetValue {
    pub fn null() -> Self {
        TargetValue::Reference {
            kind: EntityKind::Object,
            handle: None,
        }
    }

    pub fn object(kind: EntityKind, handle: TargetHandle) -> Self {
        TargetValue::Reference {
            kind,
            handle: Some(handle),
        }
    }

    /// Zero value for a primitive tag, or null for reference tags.
    pub fn default_for(tag: Tag) -> Self {
        match tag {
            Tag::Byte => TargetValue::Byte(0),
            Tag::Char => TargetValue::Char(0),
            Tag::Float => TargetValue::Float(0.0),
            Tag::Double => TargetValue::Double(0.0),
            Tag::Int => TargetValue::Int(0),
            Tag::Long => TargetValue::Long(0),
            Tag::Short => TargetValue::Short(0),
            Tag::Boolean => TargetValue::Boolean(false),
            Tag::Void => TargetValue::Void,
            other => TargetValue::Reference {
                kind: other.entity_kind().unwrap_or(EntityKind::Object),
                handle: None,
            },
        }
    }
}

/// Introspection and control surface of the debugged process.
///
/// Every method may fail with [`crate::VmError::Reported`] for states the
/// protocol has a code for (dead VM, missing debug info, stale handle) or with
/// [`crate::VmError::Broken`] when the collaborator itself misbehaves.
pub trait TargetVm: Send + Sync {
    fn description(&self) -> VmDescription;

    fn is_alive(&self) -> bool;

    /// `CapabilitiesNew` flags in protocol order.
    fn capabilities(&self) -> Vec<bool> {
        vec![false; 32]
    }

    fn all_classes(&self) -> VmResult<Vec<TargetHandle>>;

    fn type_facts(&self, ty: TargetHandle) -> VmResult<TypeFacts>;

    fn fields(&self, ty: TargetHandle) -> VmResult<Vec<TargetHandle>>;

    fn field_facts(&self, field: TargetHandle) -> VmResult<FieldFacts>;

    fn methods(&self, ty: TargetHandle) -> VmResult<Vec<TargetHandle>>;

    fn method_facts(&self, method: TargetHandle) -> VmResult<MethodFacts>;

    fn line_table(&self, method: TargetHandle) -> VmResult<LineTable>;

    fn variable_table(&self, method: TargetHandle) -> VmResult<VariableTable>;

    fn all_threads(&self) -> VmResult<Vec<TargetHandle>>;

    fn thread_facts(&self, thread: TargetHandle) -> VmResult<ThreadFacts>;

    fn top_level_thread_groups(&self) -> VmResult<Vec<TargetHandle>>;

    fn thread_group_facts(&self, group: TargetHandle) -> VmResult<ThreadGroupFacts>;

    fn frames(&self, thread: TargetHandle) -> VmResult<Vec<FrameFacts>>;

    fn frame_value(&self, frame: TargetHandle, slot: i32, tag: Tag) -> VmResult<TargetValue>;

    fn this_object(&self, frame: TargetHandle) -> VmResult<Option<TargetHandle>>;

    /// Runtime type of an object.
    fn object_type(&self, object: TargetHandle) -> VmResult<TargetHandle>;

    /// Runtime kind of an object: plain, string, thread, array and so on.
    fn object_kind(&self, object: TargetHandle) -> VmResult<EntityKind>;

    fn field_value(&self, object: TargetHandle, field: TargetHandle) -> VmResult<TargetValue>;

    fn string_value(&self, string: TargetHandle) -> VmResult<String>;

    fn create_string(&self, value: &str) -> VmResult<TargetHandle>;

    fn array_length(&self, array: TargetHandle) -> VmResult<usize>;

    fn array_values(
        &self,
        array: TargetHandle,
        first: usize,
        length: usize,
    ) -> VmResult<Vec<TargetValue>>;

    fn reflected_type(&self, class_object: TargetHandle) -> VmResult<TargetHandle>;
}
