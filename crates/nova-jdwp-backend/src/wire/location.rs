//! `Location` encoding: type tag, declaring type id, method id, code index.

use crate::{
    error::CommandError,
    registry::IdRegistry,
    vm::{TargetHandle, TargetVm},
    wire::{
        codec::{JdwpReader, JdwpWriter},
        types::{EntityKind, Id, Location, TypeTag},
    },
};

/// A decoded location with its ids resolved to collaborator handles.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResolvedLocation {
    pub wire: Location,
    pub declaring_type: TargetHandle,
    pub method: TargetHandle,
}

/// Wire form of `method` at code `index`, registering the declaring type and
/// the method as needed.
pub fn to_wire(
    registry: &IdRegistry,
    vm: &dyn TargetVm,
    method: TargetHandle,
    index: u64,
) -> Result<Location, CommandError> {
    let declaring = vm.method_facts(method)?.declaring_type;
    let ty = registry.register_type(vm, declaring)?;
    let method_id = registry.register(method, EntityKind::Method);
    Ok(Location {
        type_tag: ty.tag,
        class_id: ty.id,
        method_id,
        index,
    })
}

pub fn encode(
    registry: &IdRegistry,
    vm: &dyn TargetVm,
    method: TargetHandle,
    index: u64,
    w: &mut JdwpWriter,
) -> Result<(), CommandError> {
    let location = to_wire(registry, vm, method, index)?;
    w.write_location(&location);
    Ok(())
}

/// Inverse of [`encode`]. An unknown type tag, an unresolved type id or a tag
/// that disagrees with the registered one all fail as an invalid reference
/// type; an unresolved method fails as an invalid method id.
pub fn decode(r: &mut JdwpReader<'_>, registry: &IdRegistry) -> Result<ResolvedLocation, CommandError> {
    let raw_tag = r.read_u8()?;
    let class_id = r.read_id()?;
    let method_id = r.read_id()?;
    let index = r.read_u64()?;

    let invalid_type = || CommandError::invalid(EntityKind::ReferenceType, class_id);
    let type_tag = TypeTag::from_u8(raw_tag).ok_or_else(invalid_type)?;
    let (declaring_type, registered_tag) = registry.resolve_type(class_id)?;
    if registered_tag != type_tag {
        return Err(invalid_type());
    }
    let method = registry.resolve(method_id, EntityKind::Method)?;

    Ok(ResolvedLocation {
        wire: Location {
            type_tag,
            class_id,
            method_id,
            index,
        },
        declaring_type,
        method,
    })
}

/// Location slot for "no location", e.g. the catch site of an uncaught
/// exception.
pub fn write_absent(w: &mut JdwpWriter) {
    w.write_u8(0);
    w.write_id(Id::NULL);
    w.write_id(Id::NULL);
    w.write_u64(0);
}
