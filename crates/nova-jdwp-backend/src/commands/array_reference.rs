//! `ArrayReference` (13).

use crate::{
    backend::Backend,
    dispatch::Dispatcher,
    error::{CommandError, ErrorCode},
    wire::{
        codec::{JdwpReader, JdwpWriter},
        types::EntityKind,
        value::Tag,
    },
};

use super::{read_entity, ARRAY_REFERENCE};

pub(super) fn register(d: &mut Dispatcher) {
    d.register(ARRAY_REFERENCE, 1, length);
    d.register(ARRAY_REFERENCE, 2, get_values);
}

fn length(b: &Backend, r: &mut JdwpReader<'_>, w: &mut JdwpWriter) -> Result<(), CommandError> {
    let array = read_entity(b, r, EntityKind::Array)?;
    w.write_count(b.vm().array_length(array)?);
    Ok(())
}

/// Replies with an array region: the component tag, then the values.
/// Primitive components are written untagged, references tagged.
fn get_values(b: &Backend, r: &mut JdwpReader<'_>, w: &mut JdwpWriter) -> Result<(), CommandError> {
    let array = read_entity(b, r, EntityKind::Array)?;
    let first = r.read_i32()?;
    let length = r.read_i32()?;

    let vm = b.vm();
    let len = vm.array_length(array)?;
    let first = usize::try_from(first)
        .ok()
        .filter(|first| *first <= len)
        .ok_or(CommandError::Vm(ErrorCode::InvalidIndex))?;
    let length = usize::try_from(length)
        .ok()
        .filter(|length| first.checked_add(*length).is_some_and(|end| end <= len))
        .ok_or(CommandError::Vm(ErrorCode::InvalidLength))?;

    let signature = vm.type_facts(vm.object_type(array)?)?.signature;
    let component = signature
        .strip_prefix('[')
        .and_then(Tag::from_signature)
        .ok_or_else(|| CommandError::Internal(format!("array type {signature} has no component")))?;

    let values = vm.array_values(array, first, length)?;
    w.write_u8(component.as_u8());
    w.write_count(values.len());
    let registry = b.registry();
    for value in &values {
        if component.is_primitive() {
            registry.write_untagged(value, w);
        } else {
            registry.write_tagged(value, w);
        }
    }
    Ok(())
}
