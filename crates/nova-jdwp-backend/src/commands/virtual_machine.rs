use crate::{
    backend::Backend,
    dispatch::Dispatcher,
    error::CommandError,
    wire::{
        codec::{JdwpReader, JdwpWriter},
        types::{EntityKind, ID_SIZE},
    },
};

use super::VIRTUAL_MACHINE;

pub(super) fn register(d: &mut Dispatcher) {
    d.register(VIRTUAL_MACHINE, 1, version);
    d.register(VIRTUAL_MACHINE, 2, classes_by_signature);
    d.register(VIRTUAL_MACHINE, 3, all_classes);
    d.register(VIRTUAL_MACHINE, 4, all_threads);
    d.register(VIRTUAL_MACHINE, 5, top_level_thread_groups);
    d.register(VIRTUAL_MACHINE, 6, dispose);
    d.register(VIRTUAL_MACHINE, 7, id_sizes);
    d.register(VIRTUAL_MACHINE, 8, suspend);
    d.register(VIRTUAL_MACHINE, 9, resume);
    d.register(VIRTUAL_MACHINE, 11, create_string);
    d.register(VIRTUAL_MACHINE, 12, capabilities);
    d.register(VIRTUAL_MACHINE, 14, dispose_objects);
    d.register(VIRTUAL_MACHINE, 17, capabilities_new);
}

fn version(b: &Backend, _: &mut JdwpReader<'_>, w: &mut JdwpWriter) -> Result<(), CommandError> {
    let description = b.vm().description();
    w.write_string(&description.description);
    w.write_i32(description.jdwp_major);
    w.write_i32(description.jdwp_minor);
    w.write_string(&description.vm_version);
    w.write_string(&description.vm_name);
    Ok(())
}

fn classes_by_signature(
    b: &Backend,
    r: &mut JdwpReader<'_>,
    w: &mut JdwpWriter,
) -> Result<(), CommandError> {
    let signature = r.read_string()?;
    let vm = b.vm();
    let mut matches = Vec::new();
    for ty in vm.all_classes()? {
        let facts = vm.type_facts(ty)?;
        if facts.signature == signature {
            matches.push((ty, facts));
        }
    }
    w.write_count(matches.len());
    for (ty, facts) in matches {
        w.write_reference_type(b.registry().register_type_with_tag(ty, facts.type_tag()));
        w.write_i32(facts.status);
    }
    Ok(())
}

fn all_classes(b: &Backend, _: &mut JdwpReader<'_>, w: &mut JdwpWriter) -> Result<(), CommandError> {
    let vm = b.vm();
    let classes = vm.all_classes()?;
    w.write_count(classes.len());
    for ty in classes {
        let facts = vm.type_facts(ty)?;
        w.write_reference_type(b.registry().register_type_with_tag(ty, facts.type_tag()));
        w.write_string(&facts.signature);
        w.write_i32(facts.status);
    }
    Ok(())
}

fn all_threads(b: &Backend, _: &mut JdwpReader<'_>, w: &mut JdwpWriter) -> Result<(), CommandError> {
    let threads = b.vm().all_threads()?;
    w.write_count(threads.len());
    for thread in threads {
        w.write_id(b.registry().register(thread, EntityKind::Thread));
    }
    Ok(())
}

fn top_level_thread_groups(
    b: &Backend,
    _: &mut JdwpReader<'_>,
    w: &mut JdwpWriter,
) -> Result<(), CommandError> {
    let groups = b.vm().top_level_thread_groups()?;
    w.write_count(groups.len());
    for group in groups {
        w.write_id(b.registry().register(group, EntityKind::ThreadGroup));
    }
    Ok(())
}

fn dispose(b: &Backend, _: &mut JdwpReader<'_>, _: &mut JdwpWriter) -> Result<(), CommandError> {
    b.dispose();
    Ok(())
}

fn id_sizes(_: &Backend, _: &mut JdwpReader<'_>, w: &mut JdwpWriter) -> Result<(), CommandError> {
    // field, method, object, reference type, frame
    for _ in 0..5 {
        w.write_i32(ID_SIZE as i32);
    }
    Ok(())
}

fn suspend(b: &Backend, _: &mut JdwpReader<'_>, _: &mut JdwpWriter) -> Result<(), CommandError> {
    b.gate().suspend_all();
    Ok(())
}

fn resume(b: &Backend, _: &mut JdwpReader<'_>, _: &mut JdwpWriter) -> Result<(), CommandError> {
    b.registry().invalidate_frames();
    b.gate().resume_all();
    Ok(())
}

fn create_string(b: &Backend, r: &mut JdwpReader<'_>, w: &mut JdwpWriter) -> Result<(), CommandError> {
    let value = r.read_string()?;
    let string = b.vm().create_string(&value)?;
    w.write_id(b.registry().register(string, EntityKind::String));
    Ok(())
}

fn capabilities(b: &Backend, _: &mut JdwpReader<'_>, w: &mut JdwpWriter) -> Result<(), CommandError> {
    // The legacy reply carries the first seven flags.
    let caps = b.vm().capabilities();
    for idx in 0..7 {
        w.write_bool(caps.get(idx).copied().unwrap_or(false));
    }
    Ok(())
}

fn dispose_objects(b: &Backend, r: &mut JdwpReader<'_>, _: &mut JdwpWriter) -> Result<(), CommandError> {
    let count = r.read_count()?;
    for _ in 0..count {
        let id = r.read_id()?;
        let ref_count = r.read_i32()?;
        b.registry().dispose_objects(id, ref_count.max(0) as u32);
    }
    Ok(())
}

fn capabilities_new(b: &Backend, _: &mut JdwpReader<'_>, w: &mut JdwpWriter) -> Result<(), CommandError> {
    let caps = b.vm().capabilities();
    for idx in 0..32 {
        w.write_bool(caps.get(idx).copied().unwrap_or(false));
    }
    Ok(())
}
