//! `ReferenceType` (2) and `ClassType` (3).

use crate::{
    backend::Backend,
    dispatch::Dispatcher,
    error::{CommandError, ErrorCode},
    wire::{
        codec::{JdwpReader, JdwpWriter},
        types::{EntityKind, Id, TypeTag},
    },
};

use super::{read_type, CLASS_TYPE, REFERENCE_TYPE};

pub(super) fn register(d: &mut Dispatcher) {
    d.register(REFERENCE_TYPE, 1, signature);
    d.register(REFERENCE_TYPE, 2, class_loader);
    d.register(REFERENCE_TYPE, 3, modifiers);
    d.register(REFERENCE_TYPE, 4, fields);
    d.register(REFERENCE_TYPE, 5, methods);
    d.register(REFERENCE_TYPE, 7, source_file);
    d.register(REFERENCE_TYPE, 9, status);
    d.register(CLASS_TYPE, 1, superclass);
}

fn signature(b: &Backend, r: &mut JdwpReader<'_>, w: &mut JdwpWriter) -> Result<(), CommandError> {
    let ty = read_type(b, r)?;
    w.write_string(&b.vm().type_facts(ty)?.signature);
    Ok(())
}

fn class_loader(b: &Backend, r: &mut JdwpReader<'_>, w: &mut JdwpWriter) -> Result<(), CommandError> {
    let ty = read_type(b, r)?;
    let loader = b.vm().type_facts(ty)?.class_loader;
    w.write_id(b.registry().register_optional(loader, EntityKind::ClassLoader));
    Ok(())
}

fn modifiers(b: &Backend, r: &mut JdwpReader<'_>, w: &mut JdwpWriter) -> Result<(), CommandError> {
    let ty = read_type(b, r)?;
    w.write_i32(b.vm().type_facts(ty)?.modifiers);
    Ok(())
}

fn fields(b: &Backend, r: &mut JdwpReader<'_>, w: &mut JdwpWriter) -> Result<(), CommandError> {
    let ty = read_type(b, r)?;
    let vm = b.vm();
    let fields = vm.fields(ty)?;
    w.write_count(fields.len());
    for field in fields {
        let facts = vm.field_facts(field)?;
        w.write_id(b.registry().register(field, EntityKind::Field));
        w.write_string(&facts.name);
        w.write_string(&facts.signature);
        w.write_i32(facts.modifiers);
    }
    Ok(())
}

fn methods(b: &Backend, r: &mut JdwpReader<'_>, w: &mut JdwpWriter) -> Result<(), CommandError> {
    let ty = read_type(b, r)?;
    let vm = b.vm();
    let methods = vm.methods(ty)?;
    w.write_count(methods.len());
    for method in methods {
        let facts = vm.method_facts(method)?;
        w.write_id(b.registry().register(method, EntityKind::Method));
        w.write_string(&facts.name);
        w.write_string(&facts.signature);
        w.write_i32(facts.modifiers);
    }
    Ok(())
}

fn source_file(b: &Backend, r: &mut JdwpReader<'_>, w: &mut JdwpWriter) -> Result<(), CommandError> {
    let ty = read_type(b, r)?;
    let source = b
        .vm()
        .type_facts(ty)?
        .source_file
        .ok_or(CommandError::Vm(ErrorCode::AbsentInformation))?;
    w.write_string(&source);
    Ok(())
}

fn status(b: &Backend, r: &mut JdwpReader<'_>, w: &mut JdwpWriter) -> Result<(), CommandError> {
    let ty = read_type(b, r)?;
    w.write_i32(b.vm().type_facts(ty)?.status);
    Ok(())
}

/// Interfaces and arrays are not classes here; `java.lang.Object` answers
/// the null id.
fn superclass(b: &Backend, r: &mut JdwpReader<'_>, w: &mut JdwpWriter) -> Result<(), CommandError> {
    let id = r.read_id()?;
    let (ty, tag) = b.registry().resolve_type(id)?;
    if tag != TypeTag::Class {
        return Err(CommandError::invalid(EntityKind::ReferenceType, id));
    }
    let vm = b.vm();
    let superclass = match vm.type_facts(ty)?.superclass {
        Some(parent) => b.registry().register_type(vm, parent)?.id,
        None => Id::NULL,
    };
    w.write_id(superclass);
    Ok(())
}
