//! Command handlers, one module per command set.

mod array_reference;
mod event_request;
mod method;
mod object_reference;
mod reference_type;
mod stack_frame;
mod thread_reference;
mod virtual_machine;

use crate::{
    backend::Backend,
    dispatch::Dispatcher,
    error::CommandError,
    vm::TargetHandle,
    wire::{codec::JdwpReader, types::EntityKind},
};

pub const VIRTUAL_MACHINE: u8 = 1;
pub const REFERENCE_TYPE: u8 = 2;
pub const CLASS_TYPE: u8 = 3;
pub const METHOD: u8 = 6;
pub const OBJECT_REFERENCE: u8 = 9;
pub const STRING_REFERENCE: u8 = 10;
pub const THREAD_REFERENCE: u8 = 11;
pub const THREAD_GROUP_REFERENCE: u8 = 12;
pub const ARRAY_REFERENCE: u8 = 13;
pub const EVENT_REQUEST: u8 = 15;
pub const STACK_FRAME: u8 = 16;
pub const CLASS_OBJECT_REFERENCE: u8 = 17;

pub fn register_all(dispatcher: &mut Dispatcher) {
    virtual_machine::register(dispatcher);
    reference_type::register(dispatcher);
    method::register(dispatcher);
    object_reference::register(dispatcher);
    thread_reference::register(dispatcher);
    array_reference::register(dispatcher);
    event_request::register(dispatcher);
    stack_frame::register(dispatcher);
}

/// Read an id and resolve it as `kind`.
fn read_entity(
    backend: &Backend,
    r: &mut JdwpReader<'_>,
    kind: EntityKind,
) -> Result<TargetHandle, CommandError> {
    let id = r.read_id()?;
    backend.registry().resolve(id, kind)
}

/// Read a reference type id and resolve it.
fn read_type(backend: &Backend, r: &mut JdwpReader<'_>) -> Result<TargetHandle, CommandError> {
    let id = r.read_id()?;
    Ok(backend.registry().resolve_type(id)?.0)
}
