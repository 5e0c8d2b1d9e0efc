//! `Method` (6).

use crate::{
    backend::Backend,
    dispatch::Dispatcher,
    error::CommandError,
    vm::TargetHandle,
    wire::{
        codec::{JdwpReader, JdwpWriter},
        types::EntityKind,
    },
};

use super::{read_type, METHOD};

pub(super) fn register(d: &mut Dispatcher) {
    d.register(METHOD, 1, line_table);
    d.register(METHOD, 2, variable_table);
}

/// Both commands name the method together with its declaring type; a
/// method of some other type is an invalid method id.
fn read_method(b: &Backend, r: &mut JdwpReader<'_>) -> Result<TargetHandle, CommandError> {
    let ty = read_type(b, r)?;
    let id = r.read_id()?;
    let method = b.registry().resolve(id, EntityKind::Method)?;
    if b.vm().method_facts(method)?.declaring_type != ty {
        return Err(CommandError::invalid(EntityKind::Method, id));
    }
    Ok(method)
}

fn line_table(b: &Backend, r: &mut JdwpReader<'_>, w: &mut JdwpWriter) -> Result<(), CommandError> {
    let method = read_method(b, r)?;
    let table = b.vm().line_table(method)?;
    w.write_i64(table.start);
    w.write_i64(table.end);
    w.write_count(table.lines.len());
    for (index, line) in table.lines {
        w.write_u64(index);
        w.write_i32(line);
    }
    Ok(())
}

fn variable_table(b: &Backend, r: &mut JdwpReader<'_>, w: &mut JdwpWriter) -> Result<(), CommandError> {
    let method = read_method(b, r)?;
    let table = b.vm().variable_table(method)?;
    w.write_i32(table.arg_count);
    w.write_count(table.slots.len());
    for slot in table.slots {
        w.write_u64(slot.code_index);
        w.write_string(&slot.name);
        w.write_string(&slot.signature);
        w.write_u32(slot.length);
        w.write_i32(slot.slot);
    }
    Ok(())
}
