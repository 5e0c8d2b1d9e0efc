//! `EventRequest` (15).

use crate::{
    backend::Backend,
    dispatch::Dispatcher,
    error::{CommandError, DecodeError},
    events::{filter::Modifier, EventKind, SuspendPolicy},
    wire::codec::{JdwpReader, JdwpWriter},
};

use super::EVENT_REQUEST;

pub(super) fn register(d: &mut Dispatcher) {
    d.register(EVENT_REQUEST, 1, set);
    d.register(EVENT_REQUEST, 2, clear);
    d.register(EVENT_REQUEST, 3, clear_all_breakpoints);
}

fn read_kind(r: &mut JdwpReader<'_>) -> Result<EventKind, CommandError> {
    let raw = r.read_u8()?;
    Ok(EventKind::from_u8(raw).ok_or(DecodeError::UnknownEventKind(raw))?)
}

/// The whole modifier list is decoded before the request is installed, so
/// a bad modifier installs nothing.
fn set(b: &Backend, r: &mut JdwpReader<'_>, w: &mut JdwpWriter) -> Result<(), CommandError> {
    let kind = read_kind(r)?;
    let suspend_policy = SuspendPolicy::from_u8(r.read_u8()?)?;
    let count = r.read_count()?;
    let mut modifiers = Vec::with_capacity(count.min(r.remaining()));
    for _ in 0..count {
        modifiers.push(Modifier::read(r, b.registry())?);
    }
    let id = b.events().set(kind, suspend_policy, modifiers);
    w.write_i32(id);
    Ok(())
}

fn clear(b: &Backend, r: &mut JdwpReader<'_>, _: &mut JdwpWriter) -> Result<(), CommandError> {
    let kind = read_kind(r)?;
    let id = r.read_i32()?;
    b.events().clear(kind, id);
    Ok(())
}

fn clear_all_breakpoints(b: &Backend, _: &mut JdwpReader<'_>, _: &mut JdwpWriter) -> Result<(), CommandError> {
    b.events().clear_all_breakpoints();
    Ok(())
}
