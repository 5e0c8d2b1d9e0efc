use std::{collections::HashSet, sync::Arc, thread};

use nova_config::JdwpBackendConfig;
use nova_jdwp_backend::{mock::MockVm, EntityKind, ErrorCode, IdRegistry, TargetHandle};

use crate::harness::Session;

#[test]
fn concurrent_registration_agrees_on_one_id_per_entity() {
    let registry = Arc::new(IdRegistry::new(1, 64));
    let handles: Vec<TargetHandle> = (1..=200).map(TargetHandle).collect();

    let results: Vec<Vec<u64>> = thread::scope(|scope| {
        let workers: Vec<_> = (0..8)
            .map(|worker| {
                let registry = &registry;
                let handles = &handles;
                scope.spawn(move || {
                    // Walk the handles in a different order per worker.
                    let mut order: Vec<usize> = (0..handles.len()).collect();
                    order.rotate_left(worker * 25);
                    let mut ids = vec![0; handles.len()];
                    for i in order {
                        ids[i] = registry.register(handles[i], EntityKind::Object).as_u64();
                    }
                    ids
                })
            })
            .collect();
        workers.into_iter().map(|w| w.join().unwrap()).collect()
    });

    for ids in &results[1..] {
        assert_eq!(ids, &results[0]);
    }
    let distinct: HashSet<u64> = results[0].iter().copied().collect();
    assert_eq!(distinct.len(), handles.len());
    assert_eq!(registry.live_count(), handles.len());
}

#[test]
fn freed_ids_are_never_reissued() {
    let registry = IdRegistry::new(1, 4);
    let mut seen = HashSet::new();

    for round in 0..50u64 {
        let handle = TargetHandle(round % 3);
        let id = registry.register(handle, EntityKind::Object);
        assert!(seen.insert(id), "id {id:?} issued twice");
        registry.entity_freed(handle);
        assert!(registry.resolve(id, EntityKind::Object).is_err());
    }
    registry.sweep();
    let fresh = registry.register(TargetHandle(0), EntityKind::Object);
    assert!(!seen.contains(&fresh));
}

#[test]
fn churn_does_not_grow_the_table() {
    let registry = IdRegistry::with_config(&JdwpBackendConfig {
        sweep_threshold: 16,
        ..JdwpBackendConfig::default()
    });

    for i in 0..10_000u64 {
        let handle = TargetHandle(i);
        registry.register(handle, EntityKind::Object);
        registry.entity_freed(handle);
    }
    assert_eq!(registry.live_count(), 0);
    assert!(registry.tracked_count() <= 16, "{} entries tracked", registry.tracked_count());

    registry.sweep();
    assert_eq!(registry.tracked_count(), 0);
}

#[tokio::test]
async fn collected_objects_report_through_the_wire() {
    let mut s = Session::start();
    let ty = s.vm.add_class("Lcom/example/Box;");
    let pinned = s.vm.add_object(ty);
    let loose = s.vm.add_object(ty);
    let registry = s.backend.registry();
    let pinned_id = registry.register(pinned, EntityKind::Object);
    let loose_id = registry.register(loose, EntityKind::Object);

    assert_eq!(
        s.client.command_with(9, 7, |w| w.write_id(pinned_id)).await.error,
        0
    );
    for handle in [pinned, loose] {
        s.vm.collect(handle);
        s.backend.registry().entity_freed(handle);
    }

    // The pinned object survives its collection notice.
    let payload = s.client.command_with(9, 9, |w| w.write_id(pinned_id)).await.ok();
    assert_eq!(payload, [0u8]);
    let payload = s.client.command_with(9, 9, |w| w.write_id(loose_id)).await.ok();
    assert_eq!(payload, [1u8]);
    let reply = s.client.command_with(9, 1, |w| w.write_id(loose_id)).await;
    assert_eq!(reply.code(), Some(ErrorCode::InvalidObject));

    // Unpinning releases it.
    assert_eq!(
        s.client.command_with(9, 8, |w| w.write_id(pinned_id)).await.error,
        0
    );
    let payload = s.client.command_with(9, 9, |w| w.write_id(pinned_id)).await.ok();
    assert_eq!(payload, [1u8]);

    s.shutdown.cancel();
    s.finish().await.unwrap();
}

#[tokio::test]
async fn dispose_objects_drops_references_until_none_remain() {
    let mut s = Session::start();
    let ty = s.vm.add_class("Lcom/example/Box;");
    let object = s.vm.add_object(ty);
    let registry = s.backend.registry();
    let id = registry.register(object, EntityKind::Object);
    assert_eq!(registry.register(object, EntityKind::Object), id);

    let dispose = |count: i32| {
        move |w: &mut nova_jdwp_backend::wire::codec::JdwpWriter| {
            w.write_i32(1);
            w.write_id(id);
            w.write_i32(count);
        }
    };
    assert_eq!(s.client.command_with(1, 14, dispose(1)).await.error, 0);
    assert_eq!(s.backend.registry().resolve(id, EntityKind::Object).unwrap(), object);
    assert_eq!(s.client.command_with(1, 14, dispose(1)).await.error, 0);
    assert!(s.backend.registry().resolve(id, EntityKind::Object).is_err());

    s.shutdown.cancel();
    s.finish().await.unwrap();
}

#[test]
fn mock_strings_get_string_ids() {
    let vm = MockVm::new();
    let registry = IdRegistry::default();
    let hello = vm.add_string("hello");
    let id = registry.register(hello, vm.kind_of(hello));
    assert_eq!(registry.kind_of(id), Some(EntityKind::String));
    assert!(registry.resolve(id, EntityKind::Object).is_ok());
    assert!(registry.resolve(id, EntityKind::Thread).is_err());
}
