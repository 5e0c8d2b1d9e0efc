//! Event request modifiers and the facts they are evaluated against.

use crate::{
    error::{CommandError, DecodeError},
    registry::IdRegistry,
    vm::TargetHandle,
    wire::{codec::JdwpReader, location, types::EntityKind},
};

use super::EventKind;

pub const MOD_COUNT: u8 = 1;
pub const MOD_CONDITIONAL: u8 = 2;
pub const MOD_THREAD_ONLY: u8 = 3;
pub const MOD_CLASS_ONLY: u8 = 4;
pub const MOD_CLASS_MATCH: u8 = 5;
pub const MOD_CLASS_EXCLUDE: u8 = 6;
pub const MOD_LOCATION_ONLY: u8 = 7;
pub const MOD_EXCEPTION_ONLY: u8 = 8;
pub const MOD_FIELD_ONLY: u8 = 9;
pub const MOD_STEP: u8 = 10;
pub const MOD_INSTANCE_ONLY: u8 = 11;
pub const MOD_SOURCE_NAME_MATCH: u8 = 12;

/// A class-name pattern. `*` is only special as the first or last
/// character; anywhere else it is literal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClassPattern {
    Any,
    Prefix(String),
    Suffix(String),
    Exact(String),
}

impl ClassPattern {
    pub fn parse(pattern: &str) -> Self {
        if pattern == "*" {
            ClassPattern::Any
        } else if let Some(prefix) = pattern.strip_suffix('*') {
            ClassPattern::Prefix(prefix.to_owned())
        } else if let Some(suffix) = pattern.strip_prefix('*') {
            ClassPattern::Suffix(suffix.to_owned())
        } else {
            ClassPattern::Exact(pattern.to_owned())
        }
    }

    pub fn matches(&self, name: &str) -> bool {
        match self {
            ClassPattern::Any => true,
            ClassPattern::Prefix(prefix) => name.starts_with(prefix.as_str()),
            ClassPattern::Suffix(suffix) => name.ends_with(suffix.as_str()),
            ClassPattern::Exact(exact) => name == exact,
        }
    }
}

/// Code position reported with an event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SiteFacts {
    pub declaring_type: TargetHandle,
    pub method: TargetHandle,
    pub index: u64,
}

/// Everything a modifier may look at. Built once per target event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventFacts {
    /// Distinguishes one target event from the next; re-evaluating the same
    /// serial must not consume a count.
    pub serial: u64,
    pub kind: EventKind,
    pub thread: Option<TargetHandle>,
    pub location: Option<SiteFacts>,
    /// The event's type followed by its supertypes.
    pub type_chain: Vec<TargetHandle>,
    pub class_name: Option<String>,
    pub source_name: Option<String>,
    /// Thrown type followed by its supertypes.
    pub exception_chain: Vec<TargetHandle>,
    pub caught: Option<bool>,
    pub field: Option<TargetHandle>,
    pub instance: Option<TargetHandle>,
    pub step: Option<(i32, i32)>,
}

impl EventFacts {
    pub fn new(serial: u64, kind: EventKind) -> Self {
        Self {
            serial,
            kind,
            thread: None,
            location: None,
            type_chain: Vec::new(),
            class_name: None,
            source_name: None,
            exception_chain: Vec::new(),
            caught: None,
            field: None,
            instance: None,
            step: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Modifier {
    Count {
        remaining: u32,
    },
    /// Reserved by the protocol; accepts everything.
    Conditional {
        expr_id: i32,
    },
    ThreadOnly(TargetHandle),
    ClassOnly(TargetHandle),
    ClassMatch(ClassPattern),
    ClassExclude(ClassPattern),
    LocationOnly(SiteFacts),
    ExceptionOnly {
        exception: Option<TargetHandle>,
        caught: bool,
        uncaught: bool,
    },
    FieldOnly {
        declaring_type: TargetHandle,
        field: TargetHandle,
    },
    Step {
        thread: TargetHandle,
        size: i32,
        depth: i32,
    },
    InstanceOnly(Option<TargetHandle>),
    SourceNameMatch(ClassPattern),
}

impl Modifier {
    /// Decode one modifier of an `EventRequest.Set` command, resolving the
    /// ids it names.
    pub fn read(r: &mut JdwpReader<'_>, registry: &IdRegistry) -> Result<Self, CommandError> {
        let kind = r.read_u8()?;
        let modifier = match kind {
            MOD_COUNT => {
                let count = r.read_i32()?;
                let remaining = u32::try_from(count)
                    .ok()
                    .filter(|n| *n > 0)
                    .ok_or(DecodeError::InvalidCount(count))?;
                Modifier::Count { remaining }
            }
            MOD_CONDITIONAL => Modifier::Conditional {
                expr_id: r.read_i32()?,
            },
            MOD_THREAD_ONLY => Modifier::ThreadOnly(registry.resolve(r.read_id()?, EntityKind::Thread)?),
            MOD_CLASS_ONLY => {
                let (ty, _) = registry.resolve_type(r.read_id()?)?;
                Modifier::ClassOnly(ty)
            }
            MOD_CLASS_MATCH => Modifier::ClassMatch(ClassPattern::parse(&r.read_string()?)),
            MOD_CLASS_EXCLUDE => Modifier::ClassExclude(ClassPattern::parse(&r.read_string()?)),
            MOD_LOCATION_ONLY => {
                let loc = location::decode(r, registry)?;
                Modifier::LocationOnly(SiteFacts {
                    declaring_type: loc.declaring_type,
                    method: loc.method,
                    index: loc.wire.index,
                })
            }
            MOD_EXCEPTION_ONLY => {
                let id = r.read_id()?;
                let exception = if id.is_null() {
                    None
                } else {
                    Some(registry.resolve_type(id)?.0)
                };
                Modifier::ExceptionOnly {
                    exception,
                    caught: r.read_bool()?,
                    uncaught: r.read_bool()?,
                }
            }
            MOD_FIELD_ONLY => {
                let (declaring_type, _) = registry.resolve_type(r.read_id()?)?;
                let field = registry.resolve(r.read_id()?, EntityKind::Field)?;
                Modifier::FieldOnly {
                    declaring_type,
                    field,
                }
            }
            MOD_STEP => Modifier::Step {
                thread: registry.resolve(r.read_id()?, EntityKind::Thread)?,
                size: r.read_i32()?,
                depth: r.read_i32()?,
            },
            MOD_INSTANCE_ONLY => {
                Modifier::InstanceOnly(registry.resolve_optional(r.read_id()?, EntityKind::Object)?)
            }
            MOD_SOURCE_NAME_MATCH => {
                Modifier::SourceNameMatch(ClassPattern::parse(&r.read_string()?))
            }
            other => return Err(DecodeError::UnknownModifier(other).into()),
        };
        Ok(modifier)
    }

    /// Whether this modifier lets `facts` through. Only `Count` mutates.
    pub fn accepts(&mut self, facts: &EventFacts) -> bool {
        match self {
            Modifier::Count { remaining } => {
                if *remaining == 0 {
                    return false;
                }
                *remaining -= 1;
                true
            }
            Modifier::Conditional { .. } => true,
            Modifier::ThreadOnly(thread) => facts.thread == Some(*thread),
            Modifier::ClassOnly(ty) => facts.type_chain.contains(ty),
            Modifier::ClassMatch(pattern) => facts
                .class_name
                .as_deref()
                .is_some_and(|name| pattern.matches(name)),
            Modifier::ClassExclude(pattern) => !facts
                .class_name
                .as_deref()
                .is_some_and(|name| pattern.matches(name)),
            Modifier::LocationOnly(site) => facts.location.as_ref() == Some(site),
            Modifier::ExceptionOnly {
                exception,
                caught,
                uncaught,
            } => {
                let type_ok = exception.map_or(true, |ty| facts.exception_chain.contains(&ty));
                let catch_ok = match facts.caught {
                    Some(true) => *caught,
                    Some(false) => *uncaught,
                    None => false,
                };
                type_ok && catch_ok
            }
            // Field handles are unique across types.
            Modifier::FieldOnly { field, .. } => facts.field == Some(*field),
            Modifier::Step {
                thread,
                size,
                depth,
            } => {
                facts.thread == Some(*thread)
                    && facts.step.map_or(true, |step| step == (*size, *depth))
            }
            Modifier::InstanceOnly(instance) => facts.instance == *instance,
            Modifier::SourceNameMatch(pattern) => facts
                .source_name
                .as_deref()
                .is_some_and(|name| pattern.matches(name)),
        }
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self, Modifier::Count { remaining: 0 })
    }
}
