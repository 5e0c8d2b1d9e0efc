//! `ThreadReference` (11) and `ThreadGroupReference` (12).

use crate::{
    backend::Backend,
    dispatch::Dispatcher,
    error::{CommandError, ErrorCode},
    vm::{FrameFacts, TargetHandle},
    wire::{
        codec::{JdwpReader, JdwpWriter},
        location,
        types::EntityKind,
    },
};

use super::{read_entity, THREAD_GROUP_REFERENCE, THREAD_REFERENCE};

pub(super) fn register(d: &mut Dispatcher) {
    d.register(THREAD_REFERENCE, 1, name);
    d.register(THREAD_REFERENCE, 2, suspend);
    d.register(THREAD_REFERENCE, 3, resume);
    d.register(THREAD_REFERENCE, 4, status);
    d.register(THREAD_REFERENCE, 5, thread_group);
    d.register(THREAD_REFERENCE, 6, frames);
    d.register(THREAD_REFERENCE, 7, frame_count);
    d.register(THREAD_REFERENCE, 12, suspend_count);
    d.register(THREAD_GROUP_REFERENCE, 1, group_name);
    d.register(THREAD_GROUP_REFERENCE, 2, group_parent);
}

const SUSPEND_STATUS_SUSPENDED: i32 = 1;

/// Stack inspection needs the thread parked.
pub(super) fn suspended_frames(b: &Backend, thread: TargetHandle) -> Result<Vec<FrameFacts>, CommandError> {
    if !b.gate().is_suspended(thread) {
        return Err(CommandError::Vm(ErrorCode::ThreadNotSuspended));
    }
    Ok(b.vm().frames(thread)?)
}

fn name(b: &Backend, r: &mut JdwpReader<'_>, w: &mut JdwpWriter) -> Result<(), CommandError> {
    let thread = read_entity(b, r, EntityKind::Thread)?;
    w.write_string(&b.vm().thread_facts(thread)?.name);
    Ok(())
}

fn suspend(b: &Backend, r: &mut JdwpReader<'_>, _: &mut JdwpWriter) -> Result<(), CommandError> {
    let thread = read_entity(b, r, EntityKind::Thread)?;
    b.gate().suspend_thread(thread);
    Ok(())
}

fn resume(b: &Backend, r: &mut JdwpReader<'_>, _: &mut JdwpWriter) -> Result<(), CommandError> {
    let thread = read_entity(b, r, EntityKind::Thread)?;
    b.gate().resume_thread(thread);
    if !b.gate().is_suspended(thread) {
        b.registry().invalidate_frames();
    }
    Ok(())
}

fn status(b: &Backend, r: &mut JdwpReader<'_>, w: &mut JdwpWriter) -> Result<(), CommandError> {
    let thread = read_entity(b, r, EntityKind::Thread)?;
    w.write_i32(b.vm().thread_facts(thread)?.status);
    w.write_i32(if b.gate().is_suspended(thread) {
        SUSPEND_STATUS_SUSPENDED
    } else {
        0
    });
    Ok(())
}

fn thread_group(b: &Backend, r: &mut JdwpReader<'_>, w: &mut JdwpWriter) -> Result<(), CommandError> {
    let thread = read_entity(b, r, EntityKind::Thread)?;
    let group = b.vm().thread_facts(thread)?.group;
    w.write_id(b.registry().register(group, EntityKind::ThreadGroup));
    Ok(())
}

/// `length` of -1 asks for every frame from `start` on.
fn frames(b: &Backend, r: &mut JdwpReader<'_>, w: &mut JdwpWriter) -> Result<(), CommandError> {
    let thread = read_entity(b, r, EntityKind::Thread)?;
    let start = r.read_i32()?;
    let length = r.read_i32()?;
    let frames = suspended_frames(b, thread)?;

    let start = usize::try_from(start)
        .ok()
        .filter(|start| *start <= frames.len())
        .ok_or(CommandError::Vm(ErrorCode::InvalidIndex))?;
    let end = if length == -1 {
        frames.len()
    } else {
        usize::try_from(length)
            .ok()
            .and_then(|length| start.checked_add(length))
            .filter(|end| *end <= frames.len())
            .ok_or(CommandError::Vm(ErrorCode::InvalidLength))?
    };

    let selected = &frames[start..end];
    let registry = b.registry();
    w.write_count(selected.len());
    for frame in selected {
        w.write_id(registry.register(frame.frame, EntityKind::Frame));
        location::encode(registry, b.vm(), frame.method, frame.index, w)?;
    }
    Ok(())
}

fn frame_count(b: &Backend, r: &mut JdwpReader<'_>, w: &mut JdwpWriter) -> Result<(), CommandError> {
    let thread = read_entity(b, r, EntityKind::Thread)?;
    w.write_count(suspended_frames(b, thread)?.len());
    Ok(())
}

fn suspend_count(b: &Backend, r: &mut JdwpReader<'_>, w: &mut JdwpWriter) -> Result<(), CommandError> {
    let thread = read_entity(b, r, EntityKind::Thread)?;
    w.write_i32(b.gate().suspend_count(thread) as i32);
    Ok(())
}

fn group_name(b: &Backend, r: &mut JdwpReader<'_>, w: &mut JdwpWriter) -> Result<(), CommandError> {
    let group = read_entity(b, r, EntityKind::ThreadGroup)?;
    w.write_string(&b.vm().thread_group_facts(group)?.name);
    Ok(())
}

fn group_parent(b: &Backend, r: &mut JdwpReader<'_>, w: &mut JdwpWriter) -> Result<(), CommandError> {
    let group = read_entity(b, r, EntityKind::ThreadGroup)?;
    let parent = b.vm().thread_group_facts(group)?.parent;
    w.write_id(b.registry().register_optional(parent, EntityKind::ThreadGroup));
    Ok(())
}
