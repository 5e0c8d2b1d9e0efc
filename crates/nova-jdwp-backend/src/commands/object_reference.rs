//! `ObjectReference` (9), `StringReference` (10) and
//! `ClassObjectReference` (17).

use crate::{
    backend::Backend,
    dispatch::Dispatcher,
    error::CommandError,
    wire::{
        codec::{JdwpReader, JdwpWriter},
        types::EntityKind,
    },
};

use super::{read_entity, CLASS_OBJECT_REFERENCE, OBJECT_REFERENCE, STRING_REFERENCE};

pub(super) fn register(d: &mut Dispatcher) {
    d.register(OBJECT_REFERENCE, 1, reference_type);
    d.register(OBJECT_REFERENCE, 2, get_values);
    d.register(OBJECT_REFERENCE, 7, disable_collection);
    d.register(OBJECT_REFERENCE, 8, enable_collection);
    d.register(OBJECT_REFERENCE, 9, is_collected);
    d.register(STRING_REFERENCE, 1, string_value);
    d.register(CLASS_OBJECT_REFERENCE, 1, reflected_type);
}

fn reference_type(b: &Backend, r: &mut JdwpReader<'_>, w: &mut JdwpWriter) -> Result<(), CommandError> {
    let object = read_entity(b, r, EntityKind::Object)?;
    let vm = b.vm();
    let ty = vm.object_type(object)?;
    w.write_reference_type(b.registry().register_type(vm, ty)?);
    Ok(())
}

fn get_values(b: &Backend, r: &mut JdwpReader<'_>, w: &mut JdwpWriter) -> Result<(), CommandError> {
    let object = read_entity(b, r, EntityKind::Object)?;
    let count = r.read_count()?;
    // Resolve every field before touching the target so a bad id leaves no
    // partial reply behind.
    let mut fields = Vec::with_capacity(count.min(r.remaining()));
    for _ in 0..count {
        fields.push(read_entity(b, r, EntityKind::Field)?);
    }
    w.write_count(fields.len());
    for field in fields {
        let value = b.vm().field_value(object, field)?;
        b.registry().write_tagged(&value, w);
    }
    Ok(())
}

fn disable_collection(b: &Backend, r: &mut JdwpReader<'_>, _: &mut JdwpWriter) -> Result<(), CommandError> {
    let id = r.read_id()?;
    b.registry().disable_collection(id)
}

fn enable_collection(b: &Backend, r: &mut JdwpReader<'_>, _: &mut JdwpWriter) -> Result<(), CommandError> {
    let id = r.read_id()?;
    b.registry().enable_collection(id)
}

fn is_collected(b: &Backend, r: &mut JdwpReader<'_>, w: &mut JdwpWriter) -> Result<(), CommandError> {
    let id = r.read_id()?;
    w.write_bool(b.registry().is_collected(id)?);
    Ok(())
}

fn string_value(b: &Backend, r: &mut JdwpReader<'_>, w: &mut JdwpWriter) -> Result<(), CommandError> {
    let string = read_entity(b, r, EntityKind::String)?;
    w.write_string(&b.vm().string_value(string)?);
    Ok(())
}

fn reflected_type(b: &Backend, r: &mut JdwpReader<'_>, w: &mut JdwpWriter) -> Result<(), CommandError> {
    let class_object = read_entity(b, r, EntityKind::ClassObject)?;
    let vm = b.vm();
    let ty = vm.reflected_type(class_object)?;
    w.write_reference_type(b.registry().register_type(vm, ty)?);
    Ok(())
}
