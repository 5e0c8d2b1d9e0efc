use std::time::Duration;

use nova_jdwp_backend::{
    events::filter::{MOD_CLASS_MATCH, MOD_COUNT, MOD_EXCEPTION_ONLY},
    vm::TargetHandle,
    wire::codec::{JdwpReader, JdwpWriter},
    EntityKind, EventKind, EventSite, Id, SuspendPolicy, TargetEvent, TargetValue, Value,
};

use crate::harness::Session;

struct Target {
    thread: TargetHandle,
    class: TargetHandle,
    method: TargetHandle,
}

fn target(s: &Session, signature: &str) -> Target {
    let class = s.vm.add_class(signature);
    let method = s.vm.add_method(class, "main", "([Ljava/lang/String;)V");
    let group = s.vm.add_thread_group("main", None);
    let thread = s.vm.add_thread("main", group);
    Target {
        thread,
        class,
        method,
    }
}

async fn set_request(
    s: &mut Session,
    kind: EventKind,
    policy: SuspendPolicy,
    modifiers: impl FnOnce(&mut JdwpWriter) -> i32,
) -> i32 {
    let mut mods = JdwpWriter::new();
    let count = modifiers(&mut mods);
    let payload = s
        .client
        .command_with(15, 1, |w| {
            w.write_u8(kind.as_u8());
            w.write_u8(policy.as_u8());
            w.write_i32(count);
            w.write_bytes(mods.as_slice());
        })
        .await
        .ok();
    JdwpReader::new(&payload).read_i32().unwrap()
}

async fn notify(s: &Session, event: TargetEvent) -> bool {
    let notifier = s.backend.notifier();
    tokio::task::spawn_blocking(move || notifier.notify(event))
        .await
        .unwrap()
        .unwrap()
}

#[tokio::test]
async fn breakpoint_event_packet_bytes() {
    let mut s = Session::start();
    let t = target(&s, "Lcom/example/Main;");
    let request = set_request(&mut s, EventKind::Breakpoint, SuspendPolicy::None, |_| 0).await;
    assert_eq!(request, 1);

    assert!(notify(&s, TargetEvent::Breakpoint {
        site: EventSite::new(t.thread, t.method, 5),
    })
    .await);

    let (id, payload) = s.client.next_event().await;
    assert_eq!(id, 1);
    let expected: Vec<u8> = [
        &[0u8][..],                   // suspend policy
        &1i32.to_be_bytes(),          // events
        &[2],                         // breakpoint
        &1i32.to_be_bytes(),          // request id
        &1001u64.to_be_bytes(),       // thread
        &[1],                         // class tag
        &1002u64.to_be_bytes(),       // declaring type
        &1003u64.to_be_bytes(),       // method
        &5u64.to_be_bytes(),          // code index
    ]
    .concat();
    assert_eq!(payload, expected);

    let registry = s.backend.registry();
    assert_eq!(registry.resolve(Id::from_raw(1001), EntityKind::Thread).unwrap(), t.thread);
    assert_eq!(registry.resolve_type(Id::from_raw(1002)).unwrap().0, t.class);

    s.shutdown.cancel();
    s.finish().await.unwrap();
}

#[tokio::test]
async fn count_modifier_limits_deliveries() {
    let mut s = Session::start();
    let t = target(&s, "Lcom/example/Main;");
    let request = set_request(&mut s, EventKind::Breakpoint, SuspendPolicy::None, |w| {
        w.write_u8(MOD_COUNT);
        w.write_i32(2);
        1
    })
    .await;

    let site = EventSite::new(t.thread, t.method, 0);
    assert!(notify(&s, TargetEvent::Breakpoint { site }).await);
    assert!(notify(&s, TargetEvent::Breakpoint { site }).await);
    assert!(!notify(&s, TargetEvent::Breakpoint { site }).await);
    assert_eq!(s.backend.events().is_enabled(request), Some(false));

    for _ in 0..2 {
        let (_, payload) = s.client.next_event().await;
        let mut r = JdwpReader::new(&payload);
        r.read_u8().unwrap();
        r.read_i32().unwrap();
        assert_eq!(r.read_u8().unwrap(), EventKind::Breakpoint.as_u8());
        assert_eq!(r.read_i32().unwrap(), request);
    }

    s.shutdown.cancel();
    s.finish().await.unwrap();
}

#[tokio::test]
async fn collaborator_failure_does_not_consume_a_count() {
    let mut s = Session::start();
    let t = target(&s, "Lcom/example/Main;");
    let field = s.vm.add_field(t.class, "total", "I");
    let request = set_request(&mut s, EventKind::FieldAccess, SuspendPolicy::None, |w| {
        w.write_u8(MOD_COUNT);
        w.write_i32(1);
        1
    })
    .await;

    let site = EventSite::new(t.thread, t.method, 2);
    let notifier = s.backend.notifier();
    let failed = tokio::task::spawn_blocking(move || {
        notifier.notify(TargetEvent::FieldAccess {
            site,
            field: TargetHandle(9_999),
            object: None,
        })
    })
    .await
    .unwrap();
    assert!(failed.is_err());
    assert_eq!(s.backend.events().is_enabled(request), Some(true));

    assert!(notify(&s, TargetEvent::FieldAccess {
        site,
        field,
        object: None,
    })
    .await);
    let (_, payload) = s.client.next_event().await;
    let mut r = JdwpReader::new(&payload);
    r.read_u8().unwrap();
    assert_eq!(r.read_i32().unwrap(), 1);
    assert_eq!(r.read_u8().unwrap(), EventKind::FieldAccess.as_u8());
    assert_eq!(r.read_i32().unwrap(), request);
    assert_eq!(s.backend.events().is_enabled(request), Some(false));

    s.shutdown.cancel();
    s.finish().await.unwrap();
}

#[tokio::test]
async fn class_match_filters_by_declaring_type() {
    let mut s = Session::start();
    let inside = target(&s, "Lcom/example/Main;");
    let outside_class = s.vm.add_class("Lorg/other/Tool;");
    let outside = s.vm.add_method(outside_class, "run", "()V");
    set_request(&mut s, EventKind::MethodEntry, SuspendPolicy::None, |w| {
        w.write_u8(MOD_CLASS_MATCH);
        w.write_string("com.example.*");
        1
    })
    .await;

    assert!(!notify(&s, TargetEvent::MethodEntry {
        site: EventSite::new(inside.thread, outside, 0),
    })
    .await);
    assert!(notify(&s, TargetEvent::MethodEntry {
        site: EventSite::new(inside.thread, inside.method, 0),
    })
    .await);

    let (_, payload) = s.client.next_event().await;
    assert_eq!(payload[5], EventKind::MethodEntry.as_u8());

    s.shutdown.cancel();
    s.finish().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn suspend_all_parks_the_event_thread_until_resume() {
    let mut s = Session::start();
    let t = target(&s, "Lcom/example/Main;");
    set_request(&mut s, EventKind::Breakpoint, SuspendPolicy::All, |_| 0).await;

    let notifier = s.backend.notifier();
    let site = EventSite::new(t.thread, t.method, 3);
    let parked = tokio::task::spawn_blocking(move || notifier.notify(TargetEvent::Breakpoint { site }));

    let (_, payload) = s.client.next_event().await;
    assert_eq!(payload[0], SuspendPolicy::All.as_u8());
    assert!(s.backend.gate().is_vm_suspended());
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!parked.is_finished());

    assert_eq!(s.client.command(1, 9, &[]).await.error, 0);
    assert!(parked.await.unwrap().unwrap());

    s.shutdown.cancel();
    s.finish().await.unwrap();
}

#[tokio::test]
async fn vm_start_is_delivered_without_a_request() {
    let mut s = Session::start();
    let t = target(&s, "Lcom/example/Main;");
    assert!(notify(&s, TargetEvent::VmStart { thread: t.thread }).await);

    let (_, payload) = s.client.next_event().await;
    let mut r = JdwpReader::new(&payload);
    assert_eq!(r.read_u8().unwrap(), SuspendPolicy::None.as_u8());
    assert_eq!(r.read_i32().unwrap(), 1);
    assert_eq!(r.read_u8().unwrap(), EventKind::VmStart.as_u8());
    assert_eq!(r.read_i32().unwrap(), 0);
    let thread = r.read_id().unwrap();
    assert_eq!(
        s.backend.registry().resolve(thread, EntityKind::Thread).unwrap(),
        t.thread
    );
    assert_eq!(r.remaining(), 0);

    s.shutdown.cancel();
    s.finish().await.unwrap();
}

#[tokio::test]
async fn method_exit_serves_both_exit_kinds_in_one_packet() {
    let mut s = Session::start();
    let t = target(&s, "Lcom/example/Main;");
    let plain = set_request(&mut s, EventKind::MethodExit, SuspendPolicy::None, |_| 0).await;
    let with_value =
        set_request(&mut s, EventKind::MethodExitWithReturnValue, SuspendPolicy::EventThread, |_| 0)
            .await;

    let notifier = s.backend.notifier();
    let site = EventSite::new(t.thread, t.method, 9);
    let parked = tokio::task::spawn_blocking(move || {
        notifier.notify(TargetEvent::MethodExit {
            site,
            return_value: TargetValue::Int(7),
        })
    });

    let (_, payload) = s.client.next_event().await;
    let mut r = JdwpReader::new(&payload);
    assert_eq!(r.read_u8().unwrap(), SuspendPolicy::EventThread.as_u8());
    assert_eq!(r.read_i32().unwrap(), 2);

    assert_eq!(r.read_u8().unwrap(), EventKind::MethodExit.as_u8());
    assert_eq!(r.read_i32().unwrap(), plain);
    let thread_id = r.read_id().unwrap();
    let location = r.read_location().unwrap();
    assert_eq!(location.index, 9);

    assert_eq!(r.read_u8().unwrap(), EventKind::MethodExitWithReturnValue.as_u8());
    assert_eq!(r.read_i32().unwrap(), with_value);
    assert_eq!(r.read_id().unwrap(), thread_id);
    assert_eq!(r.read_location().unwrap(), location);
    assert_eq!(Value::read_tagged(&mut r).unwrap(), Value::Int(7));
    assert_eq!(r.remaining(), 0);

    // Only the event thread was suspended.
    assert!(s.backend.gate().is_suspended(t.thread));
    assert!(!s.backend.gate().is_vm_suspended());
    assert_eq!(
        s.client
            .command_with(11, 3, |w| w.write_id(thread_id))
            .await
            .error,
        0
    );
    assert!(parked.await.unwrap().unwrap());

    s.shutdown.cancel();
    s.finish().await.unwrap();
}

#[tokio::test]
async fn uncaught_exception_has_an_absent_catch_location() {
    let mut s = Session::start();
    let t = target(&s, "Lcom/example/Main;");
    let throwable = s.vm.add_class("Ljava/lang/Throwable;");
    let runtime = s.vm.add_class("Ljava/lang/RuntimeException;");
    s.vm.set_superclass(runtime, Some(throwable));
    let exception = s.vm.add_object(runtime);
    let throwable_id = s.backend.registry().register_type(&*s.vm, throwable).unwrap().id;

    // Uncaught throwables only.
    set_request(&mut s, EventKind::Exception, SuspendPolicy::None, |w| {
        w.write_u8(MOD_EXCEPTION_ONLY);
        w.write_id(throwable_id);
        w.write_bool(false);
        w.write_bool(true);
        1
    })
    .await;

    let site = EventSite::new(t.thread, t.method, 4);
    assert!(!notify(&s, TargetEvent::Exception {
        site,
        exception,
        catch: Some((t.method, 8)),
    })
    .await);
    assert!(notify(&s, TargetEvent::Exception {
        site,
        exception,
        catch: None,
    })
    .await);

    let (_, payload) = s.client.next_event().await;
    let mut r = JdwpReader::new(&payload);
    r.read_bytes(1 + 4 + 1 + 4).unwrap();
    r.read_id().unwrap();
    r.read_location().unwrap();
    let Value::Object(id) = Value::read_tagged(&mut r).unwrap() else {
        panic!("exception is an object");
    };
    assert_eq!(
        s.backend.registry().resolve(id, EntityKind::Object).unwrap(),
        exception
    );
    assert_eq!(r.read_bytes(25).unwrap(), &[0u8; 25][..]);
    assert_eq!(r.remaining(), 0);

    s.shutdown.cancel();
    s.finish().await.unwrap();
}
