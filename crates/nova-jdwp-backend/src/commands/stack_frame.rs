//! `StackFrame` (16).

use crate::{
    backend::Backend,
    dispatch::Dispatcher,
    error::{CommandError, DecodeError},
    vm::{TargetHandle, TargetValue},
    wire::{
        codec::{JdwpReader, JdwpWriter},
        types::EntityKind,
        value::Tag,
    },
};

use super::{read_entity, thread_reference::suspended_frames, STACK_FRAME};

pub(super) fn register(d: &mut Dispatcher) {
    d.register(STACK_FRAME, 1, get_values);
    d.register(STACK_FRAME, 3, this_object);
}

/// Read the `(thread, frame)` pair and check the frame is on that thread's
/// current stack.
fn read_frame(b: &Backend, r: &mut JdwpReader<'_>) -> Result<TargetHandle, CommandError> {
    let thread = read_entity(b, r, EntityKind::Thread)?;
    let id = r.read_id()?;
    let frame = b.registry().resolve(id, EntityKind::Frame)?;
    if !suspended_frames(b, thread)?.iter().any(|f| f.frame == frame) {
        return Err(CommandError::invalid(EntityKind::Frame, id));
    }
    Ok(frame)
}

fn get_values(b: &Backend, r: &mut JdwpReader<'_>, w: &mut JdwpWriter) -> Result<(), CommandError> {
    let frame = read_frame(b, r)?;
    let count = r.read_count()?;
    let mut slots = Vec::with_capacity(count.min(r.remaining()));
    for _ in 0..count {
        let slot = r.read_i32()?;
        let raw = r.read_u8()?;
        let tag = Tag::from_u8(raw).ok_or(DecodeError::UnknownTag(raw))?;
        slots.push((slot, tag));
    }

    w.write_count(slots.len());
    for (slot, tag) in slots {
        let value = b.vm().frame_value(frame, slot, tag)?;
        b.registry().write_tagged(&value, w);
    }
    Ok(())
}

/// Tagged with the receiver's runtime kind. Static and native frames answer
/// a null object.
fn this_object(b: &Backend, r: &mut JdwpReader<'_>, w: &mut JdwpWriter) -> Result<(), CommandError> {
    let frame = read_frame(b, r)?;
    let value = match b.vm().this_object(frame)? {
        Some(this) => TargetValue::object(b.vm().object_kind(this)?, this),
        None => TargetValue::null(),
    };
    b.registry().write_tagged(&value, w);
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use nova_config::JdwpBackendConfig;

    use crate::{
        backend::Backend,
        dispatch::Dispatcher,
        error::ErrorCode,
        mock::MockVm,
        vm::TargetValue,
        wire::{
            codec::{JdwpReader, JdwpWriter},
            types::{EntityKind, Id},
            value::{Tag, Value},
        },
    };

    fn frame_payload(thread: Id, frame: Id) -> JdwpWriter {
        let mut w = JdwpWriter::new();
        w.write_id(thread);
        w.write_id(frame);
        w
    }

    #[test]
    fn reads_locals_and_this_from_a_suspended_frame() {
        let vm = Arc::new(MockVm::new());
        let backend = Backend::new(JdwpBackendConfig::default(), vm.clone()).unwrap();
        let d = Dispatcher::with_default_commands();
        let group = vm.add_thread_group("main", None);
        let thread = vm.add_thread("main", group);
        let ty = vm.add_class("LFoo;");
        let method = vm.add_method(ty, "run", "(I)V");
        let frame = vm.push_frame(thread, method, 3);
        let receiver = vm.add_object(ty);
        vm.set_local(frame, 1, TargetValue::Int(42));
        vm.set_this(frame, receiver);

        let registry = backend.registry();
        let thread_id = registry.register(thread, EntityKind::Thread);
        let frame_id = registry.register(frame, EntityKind::Frame);
        backend.gate().suspend_thread(thread);

        let mut w = frame_payload(thread_id, frame_id);
        w.write_i32(1);
        w.write_i32(1);
        w.write_u8(Tag::Int.as_u8());
        let reply = d.execute(&backend, 16, 1, w.as_slice()).unwrap();
        let mut r = JdwpReader::new(&reply.payload);
        assert_eq!(r.read_i32().unwrap(), 1);
        assert_eq!(Value::read_tagged(&mut r).unwrap(), Value::Int(42));

        let reply = d
            .execute(&backend, 16, 3, frame_payload(thread_id, frame_id).as_slice())
            .unwrap();
        let Value::Object(id) = Value::read_tagged(&mut JdwpReader::new(&reply.payload)).unwrap() else {
            panic!("expected an object");
        };
        assert_eq!(registry.resolve(id, EntityKind::Object).unwrap(), receiver);

        let mut w = frame_payload(thread_id, frame_id);
        w.write_i32(1);
        w.write_i32(7);
        w.write_u8(Tag::Int.as_u8());
        let reply = d.execute(&backend, 16, 1, w.as_slice()).unwrap();
        assert_eq!(reply.error, ErrorCode::InvalidSlot);
    }

    #[test]
    fn this_object_carries_the_runtime_tag() {
        let vm = Arc::new(MockVm::new());
        let backend = Backend::new(JdwpBackendConfig::default(), vm.clone()).unwrap();
        let d = Dispatcher::with_default_commands();
        let group = vm.add_thread_group("main", None);
        let thread = vm.add_thread("main", group);
        let string_type = vm.add_class("Ljava/lang/String;");
        let method = vm.add_method(string_type, "length", "()I");
        let frame = vm.push_frame(thread, method, 0);
        let receiver = vm.add_string("hello");
        vm.set_this(frame, receiver);
        let static_frame = vm.push_frame(thread, method, 0);

        let registry = backend.registry();
        let thread_id = registry.register(thread, EntityKind::Thread);
        let frame_id = registry.register(frame, EntityKind::Frame);
        let static_id = registry.register(static_frame, EntityKind::Frame);
        backend.gate().suspend_thread(thread);

        let reply = d
            .execute(&backend, 16, 3, frame_payload(thread_id, frame_id).as_slice())
            .unwrap();
        let payload = reply.payload;
        let mut r = JdwpReader::new(&payload);
        let Value::String(id) = Value::read_tagged(&mut r).unwrap() else {
            panic!("expected a string receiver");
        };
        assert_eq!(registry.resolve(id, EntityKind::String).unwrap(), receiver);

        let reply = d
            .execute(&backend, 16, 3, frame_payload(thread_id, static_id).as_slice())
            .unwrap();
        let payload = reply.payload;
        let mut r = JdwpReader::new(&payload);
        assert_eq!(Value::read_tagged(&mut r).unwrap(), Value::Object(Id::NULL));
    }

    #[test]
    fn frame_of_another_thread_is_invalid() {
        let vm = Arc::new(MockVm::new());
        let backend = Backend::new(JdwpBackendConfig::default(), vm.clone()).unwrap();
        let d = Dispatcher::with_default_commands();
        let group = vm.add_thread_group("main", None);
        let t1 = vm.add_thread("a", group);
        let t2 = vm.add_thread("b", group);
        let ty = vm.add_class("LFoo;");
        let method = vm.add_method(ty, "run", "()V");
        let frame = vm.push_frame(t1, method, 0);
        vm.push_frame(t2, method, 0);
        backend.gate().suspend_all();

        let registry = backend.registry();
        let t2_id = registry.register(t2, EntityKind::Thread);
        let frame_id = registry.register(frame, EntityKind::Frame);
        let reply = d
            .execute(&backend, 16, 3, frame_payload(t2_id, frame_id).as_slice())
            .unwrap();
        assert_eq!(reply.error, ErrorCode::InvalidFrameId);
    }
}
