use std::sync::Arc;

use nova_config::JdwpBackendConfig;
use nova_jdwp_backend::{
    mock::MockVm, wire::codec::JdwpReader, Backend, EntityKind, ErrorCode, EventKind, EventSite,
    ServeError, SuspendPolicy, TargetEvent,
};
use tokio_util::sync::CancellationToken;

use crate::harness::{Client, Session};

#[tokio::test]
async fn shutdown_ends_the_loop_cleanly() {
    let mut s = Session::start();
    assert_eq!(s.client.command(1, 7, &[]).await.error, 0);
    s.shutdown.cancel();
    s.finish().await.unwrap();
}

#[tokio::test]
async fn client_disconnect_ends_the_loop_cleanly() {
    let s = Session::start();
    let Session { client, server, .. } = s;
    drop(client);
    server.await.unwrap().unwrap();
}

#[tokio::test]
async fn short_length_field_is_a_protocol_error() {
    let mut s = Session::start();
    let mut bytes = 5u32.to_be_bytes().to_vec();
    bytes.extend_from_slice(&[0, 0, 0, 1, 0, 1, 1]);
    s.client.send_raw(&bytes).await;

    let err = s.finish().await.unwrap_err();
    assert!(matches!(err, ServeError::Protocol(_)), "{err}");
}

#[tokio::test]
async fn collaborator_failure_terminates_the_loop() {
    let mut s = Session::start();
    s.vm.break_next_call("heap walk failed");
    s.client
        .send_raw(&[0, 0, 0, 11, 0, 0, 0, 1, 0, 1, 3])
        .await;

    assert!(s.client.is_closed().await);
    let err = s.finish().await.unwrap_err();
    assert!(matches!(err, ServeError::Internal(_)), "{err}");
}

#[tokio::test]
async fn only_one_connection_is_served_at_a_time() {
    let mut s = Session::start();
    // Make sure the first loop owns the event stream.
    assert_eq!(s.client.command(1, 7, &[]).await.error, 0);

    let (_other, server_side) = tokio::io::duplex(1024);
    let err = nova_jdwp_backend::serve(server_side, s.backend.clone(), CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ServeError::Internal(_)), "{err}");

    s.shutdown.cancel();
    s.finish().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn dispose_releases_suspended_threads_and_closes() {
    let mut s = Session::start();
    let ty = s.vm.add_class("Lcom/example/Main;");
    let method = s.vm.add_method(ty, "main", "()V");
    let group = s.vm.add_thread_group("main", None);
    let thread = s.vm.add_thread("main", group);

    let reply = s
        .client
        .command_with(15, 1, |w| {
            w.write_u8(EventKind::Breakpoint.as_u8());
            w.write_u8(SuspendPolicy::All.as_u8());
            w.write_i32(0);
        })
        .await;
    assert_eq!(reply.error, 0);

    let notifier = s.backend.notifier();
    let parked = tokio::task::spawn_blocking(move || {
        notifier.notify(TargetEvent::Breakpoint {
            site: EventSite::new(thread, method, 0),
        })
    });
    let (_, payload) = s.client.next_event().await;
    let mut r = JdwpReader::new(&payload);
    r.read_bytes(1 + 4 + 1 + 4).unwrap();
    let thread_id = r.read_id().unwrap();

    assert_eq!(s.client.command(1, 6, &[]).await.error, 0);
    assert!(parked.await.unwrap().unwrap());
    assert!(s.client.is_closed().await);

    let backend = s.backend.clone();
    s.finish().await.unwrap();
    assert!(backend.is_disposed());
    assert!(backend.events().is_empty());
    assert!(backend.registry().resolve(thread_id, EntityKind::Thread).is_err());
    assert!(!backend.gate().is_vm_suspended());
}

#[tokio::test]
async fn a_new_connection_after_dispose_starts_fresh() {
    let mut s = Session::start();
    let group = s.vm.add_thread_group("main", None);
    let thread = s.vm.add_thread("main", group);
    let old_id = s.backend.registry().register(thread, EntityKind::Thread);

    assert_eq!(s.client.command(1, 6, &[]).await.error, 0);
    let backend = s.backend.clone();
    s.finish().await.unwrap();

    let (client, server_side) = tokio::io::duplex(64 * 1024);
    let shutdown = CancellationToken::new();
    let server = tokio::spawn(nova_jdwp_backend::serve(
        server_side,
        backend.clone(),
        shutdown.clone(),
    ));
    let mut client = Client::new(client);

    let reply = client.command_with(11, 1, |w| w.write_id(old_id)).await;
    assert_eq!(reply.code(), Some(ErrorCode::InvalidThread));
    assert!(!backend.is_disposed());

    // Ids issued for the new session never reuse the old one.
    let new_id = backend.registry().register(thread, EntityKind::Thread);
    assert!(new_id.as_u64() > old_id.as_u64());
    let payload = client.command_with(11, 1, |w| w.write_id(new_id)).await.ok();
    assert_eq!(JdwpReader::new(&payload).read_string().unwrap(), "main");

    shutdown.cancel();
    server.await.unwrap().unwrap();
}

#[tokio::test]
async fn events_raised_before_the_first_connection_are_delivered() {
    let vm = Arc::new(MockVm::new());
    let backend = Arc::new(Backend::new(JdwpBackendConfig::default(), vm.clone()).unwrap());
    let group = vm.add_thread_group("main", None);
    let thread = vm.add_thread("main", group);

    let notifier = backend.notifier();
    let queued = tokio::task::spawn_blocking(move || notifier.notify(TargetEvent::VmStart { thread }))
        .await
        .unwrap()
        .unwrap();
    assert!(queued);

    let (client, server_side) = tokio::io::duplex(64 * 1024);
    let shutdown = CancellationToken::new();
    let server = tokio::spawn(nova_jdwp_backend::serve(
        server_side,
        backend.clone(),
        shutdown.clone(),
    ));
    let mut client = Client::new(client);

    let (packet_id, payload) = client.next_event().await;
    assert_eq!(packet_id, 1);
    assert_eq!(payload[5], EventKind::VmStart.as_u8());

    shutdown.cancel();
    server.await.unwrap().unwrap();
}
