use nova_jdwp_backend::{
    wire::codec::JdwpReader, EntityKind, ErrorCode, Id,
};

use crate::harness::Session;

#[tokio::test]
async fn unknown_command_replies_not_implemented_and_keeps_the_connection() {
    let mut s = Session::start();

    let reply = s.client.command(99, 1, &[]).await;
    assert_eq!(reply.code(), Some(ErrorCode::NotImplemented));
    assert!(reply.payload.is_empty());

    let reply = s.client.command(1, 7, &[]).await;
    assert_eq!(reply.ok().len(), 20);

    s.shutdown.cancel();
    s.finish().await.unwrap();
}

#[tokio::test]
async fn stale_ids_fail_with_the_code_of_the_expected_kind() {
    let mut s = Session::start();
    let ty = s.vm.add_class("Lcom/example/Point;");
    let x = s.vm.add_field(ty, "x", "I");
    let point = s.vm.add_object(ty);
    let registry = s.backend.registry();
    let point_id = registry.register(point, EntityKind::Object);
    let field_id = registry.register(x, EntityKind::Field);
    registry.dispose(field_id);

    // ObjectReference.GetValues with the disposed field.
    let reply = s
        .client
        .command_with(9, 2, |w| {
            w.write_id(point_id);
            w.write_i32(1);
            w.write_id(field_id);
        })
        .await;
    assert_eq!(reply.code(), Some(ErrorCode::InvalidFieldId));

    // The same raw value read as an object id.
    let reply = s.client.command_with(9, 1, |w| w.write_id(field_id)).await;
    assert_eq!(reply.code(), Some(ErrorCode::InvalidObject));

    // Never issued at all.
    let reply = s
        .client
        .command_with(11, 1, |w| w.write_id(Id::from_raw(999_999)))
        .await;
    assert_eq!(reply.code(), Some(ErrorCode::InvalidThread));

    s.shutdown.cancel();
    s.finish().await.unwrap();
}

#[tokio::test]
async fn truncated_and_malformed_payloads_are_error_replies() {
    let mut s = Session::start();

    // ReferenceType.Signature with half an id.
    let reply = s.client.command(2, 1, &[0, 0, 0, 1]).await;
    assert_eq!(reply.code(), Some(ErrorCode::IllegalArgument));

    // StackFrame.GetValues with an unknown tag byte once the frame checks out.
    let group = s.vm.add_thread_group("main", None);
    let thread = s.vm.add_thread("main", group);
    let ty = s.vm.add_class("LFoo;");
    let method = s.vm.add_method(ty, "run", "()V");
    let frame = s.vm.push_frame(thread, method, 0);
    let thread_id = s.backend.registry().register(thread, EntityKind::Thread);
    let frame_id = s.backend.registry().register(frame, EntityKind::Frame);
    s.backend.gate().suspend_thread(thread);

    let reply = s
        .client
        .command_with(16, 1, |w| {
            w.write_id(thread_id);
            w.write_id(frame_id);
            w.write_i32(1);
            w.write_i32(0);
            w.write_u8(b'X');
        })
        .await;
    assert_eq!(reply.code(), Some(ErrorCode::InvalidTag));

    // The connection is still usable.
    let reply = s.client.command(1, 1, &[]).await;
    let payload = reply.ok();
    let mut r = JdwpReader::new(&payload);
    assert_eq!(r.read_string().unwrap(), "Nova mock VM");

    s.shutdown.cancel();
    s.finish().await.unwrap();
}

#[tokio::test]
async fn dead_vm_answers_vm_dead() {
    let mut s = Session::start();
    s.vm.kill();

    let reply = s.client.command(1, 3, &[]).await;
    assert_eq!(reply.code(), Some(ErrorCode::VmDead));
    let reply = s.client.command(11, 1, &[0; 8]).await;
    assert_eq!(reply.code(), Some(ErrorCode::VmDead));

    assert!(s.client.command(1, 1, &[]).await.code() == Some(ErrorCode::None));
    assert!(s.client.command(1, 7, &[]).await.code() == Some(ErrorCode::None));

    // Dispose still works and ends the session.
    assert_eq!(s.client.command(1, 6, &[]).await.code(), Some(ErrorCode::None));
    assert!(s.client.is_closed().await);
    s.finish().await.unwrap();
}

#[tokio::test]
async fn all_classes_and_threads_describe_the_target() {
    let mut s = Session::start();
    let object = s.vm.add_class("Ljava/lang/Object;");
    let group = s.vm.add_thread_group("system", None);
    let main = s.vm.add_thread("main", group);

    let payload = s.client.command(1, 3, &[]).await.ok();
    let mut r = JdwpReader::new(&payload);
    let classes = r.read_i32().unwrap();
    // Object plus the Thread class created for the thread.
    assert_eq!(classes, 2);
    let mut signatures = Vec::new();
    for _ in 0..classes {
        let _tag = r.read_type_tag().unwrap();
        let id = r.read_id().unwrap();
        signatures.push(r.read_string().unwrap());
        let _status = r.read_i32().unwrap();
        if signatures.last().map(String::as_str) == Some("Ljava/lang/Object;") {
            assert_eq!(s.backend.registry().resolve_type(id).unwrap().0, object);
        }
    }
    assert!(signatures.contains(&"Ljava/lang/Thread;".to_owned()));

    let payload = s.client.command(1, 4, &[]).await.ok();
    let mut r = JdwpReader::new(&payload);
    assert_eq!(r.read_i32().unwrap(), 1);
    let thread_id = r.read_id().unwrap();
    assert_eq!(
        s.backend.registry().resolve(thread_id, EntityKind::Thread).unwrap(),
        main
    );

    let payload = s.client.command(1, 5, &[]).await.ok();
    let mut r = JdwpReader::new(&payload);
    assert_eq!(r.read_i32().unwrap(), 1);

    s.shutdown.cancel();
    s.finish().await.unwrap();
}
