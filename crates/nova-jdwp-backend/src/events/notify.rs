//! Turning target VM occurrences into `Event.Composite` packets.

use std::sync::Arc;

use crate::{
    backend::Backend,
    error::CommandError,
    registry::IdRegistry,
    vm::{TargetHandle, TargetValue, TypeFacts},
    wire::{
        codec::JdwpWriter,
        location,
        packet::{encode_command, EVENT_COMMAND_SET, EVENT_COMPOSITE},
        types::{signature_to_class_name, EntityKind, Location, TypeTag},
    },
};

use super::{
    filter::{EventFacts, SiteFacts},
    EventKind, Matched, SuspendPolicy,
};

/// Where in the target an event happened.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EventSite {
    pub thread: TargetHandle,
    pub method: TargetHandle,
    pub index: u64,
    /// `this` of the reporting frame; `None` in static code.
    pub this: Option<TargetHandle>,
}

impl EventSite {
    pub fn new(thread: TargetHandle, method: TargetHandle, index: u64) -> Self {
        Self {
            thread,
            method,
            index,
            this: None,
        }
    }

    pub fn with_this(mut self, this: TargetHandle) -> Self {
        self.this = Some(this);
        self
    }
}

/// Occurrences reported by the target VM collaborator.
#[derive(Clone, Debug, PartialEq)]
pub enum TargetEvent {
    VmStart {
        thread: TargetHandle,
    },
    VmDeath,
    ThreadStart {
        thread: TargetHandle,
    },
    ThreadDeath {
        thread: TargetHandle,
    },
    ClassPrepare {
        thread: TargetHandle,
        ty: TargetHandle,
    },
    ClassUnload {
        signature: String,
    },
    Breakpoint {
        site: EventSite,
    },
    SingleStep {
        site: EventSite,
        size: i32,
        depth: i32,
    },
    MethodEntry {
        site: EventSite,
    },
    /// Reported once; serves both `METHOD_EXIT` and
    /// `METHOD_EXIT_WITH_RETURN_VALUE` requests.
    MethodExit {
        site: EventSite,
        return_value: TargetValue,
    },
    Exception {
        site: EventSite,
        exception: TargetHandle,
        /// `(method, index)` of the handler, `None` when uncaught.
        catch: Option<(TargetHandle, u64)>,
    },
    FieldAccess {
        site: EventSite,
        field: TargetHandle,
        object: Option<TargetHandle>,
    },
    FieldModification {
        site: EventSite,
        field: TargetHandle,
        object: Option<TargetHandle>,
        value: TargetValue,
    },
}

impl TargetEvent {
    /// Request kinds this occurrence is offered to.
    pub fn kinds(&self) -> &'static [EventKind] {
        match self {
            TargetEvent::VmStart { .. } => &[EventKind::VmStart],
            TargetEvent::VmDeath => &[EventKind::VmDeath],
            TargetEvent::ThreadStart { .. } => &[EventKind::ThreadStart],
            TargetEvent::ThreadDeath { .. } => &[EventKind::ThreadDeath],
            TargetEvent::ClassPrepare { .. } => &[EventKind::ClassPrepare],
            TargetEvent::ClassUnload { .. } => &[EventKind::ClassUnload],
            TargetEvent::Breakpoint { .. } => &[EventKind::Breakpoint],
            TargetEvent::SingleStep { .. } => &[EventKind::SingleStep],
            TargetEvent::MethodEntry { .. } => &[EventKind::MethodEntry],
            TargetEvent::MethodExit { .. } => {
                &[EventKind::MethodExit, EventKind::MethodExitWithReturnValue]
            }
            TargetEvent::Exception { .. } => &[EventKind::Exception],
            TargetEvent::FieldAccess { .. } => &[EventKind::FieldAccess],
            TargetEvent::FieldModification { .. } => &[EventKind::FieldModification],
        }
    }

    pub fn thread(&self) -> Option<TargetHandle> {
        match self {
            TargetEvent::VmStart { thread }
            | TargetEvent::ThreadStart { thread }
            | TargetEvent::ThreadDeath { thread }
            | TargetEvent::ClassPrepare { thread, .. } => Some(*thread),
            TargetEvent::VmDeath | TargetEvent::ClassUnload { .. } => None,
            TargetEvent::Breakpoint { site }
            | TargetEvent::SingleStep { site, .. }
            | TargetEvent::MethodEntry { site }
            | TargetEvent::MethodExit { site, .. }
            | TargetEvent::Exception { site, .. }
            | TargetEvent::FieldAccess { site, .. }
            | TargetEvent::FieldModification { site, .. } => Some(site.thread),
        }
    }

    fn site(&self) -> Option<&EventSite> {
        match self {
            TargetEvent::Breakpoint { site }
            | TargetEvent::SingleStep { site, .. }
            | TargetEvent::MethodEntry { site }
            | TargetEvent::MethodExit { site, .. }
            | TargetEvent::Exception { site, .. }
            | TargetEvent::FieldAccess { site, .. }
            | TargetEvent::FieldModification { site, .. } => Some(site),
            _ => None,
        }
    }

    /// Events the protocol delivers even when nobody asked.
    fn is_unsolicited(kind: EventKind) -> bool {
        matches!(kind, EventKind::VmStart | EventKind::VmDeath)
    }
}

/// A code position with its declaring type already looked up.
#[derive(Clone, Copy, Debug)]
struct PreparedLocation {
    declaring_type: TargetHandle,
    tag: TypeTag,
    method: TargetHandle,
    index: u64,
}

impl PreparedLocation {
    fn write(&self, registry: &IdRegistry, w: &mut JdwpWriter) {
        let ty = registry.register_type_with_tag(self.declaring_type, self.tag);
        w.write_location(&Location {
            type_tag: ty.tag,
            class_id: ty.id,
            method_id: registry.register(self.method, EntityKind::Method),
            index: self.index,
        });
    }
}

/// Everything an event packet needs from the collaborator. Fetched before
/// any request is matched, so a failing collaborator never consumes a count.
#[derive(Debug)]
struct Prepared {
    facts: EventFacts,
    site: Option<PreparedLocation>,
    catch: Option<PreparedLocation>,
    prepared_type: Option<TypeFacts>,
    field_type: Option<(TargetHandle, TypeTag)>,
}

/// Entry point for the target's notification path.
///
/// `notify` may block the calling thread: after delivering an event it
/// applies the strongest matched suspend policy and parks the reporting
/// thread until the debugger resumes it.
#[derive(Clone)]
pub struct EventNotifier {
    backend: Arc<Backend>,
}

impl EventNotifier {
    pub fn new(backend: Arc<Backend>) -> Self {
        Self { backend }
    }

    /// Deliver `event` to every matching request. Returns whether a packet
    /// was queued.
    pub fn notify(&self, event: TargetEvent) -> Result<bool, CommandError> {
        let backend = &self.backend;
        if backend.is_disposed() {
            return Ok(false);
        }
        let Some(&first) = event.kinds().first() else {
            return Ok(false);
        };
        let serial = backend.events().next_serial();
        let mut prepared = self.prepare(&event, first, serial)?;

        let mut matched: Vec<Matched> = Vec::new();
        for kind in event.kinds() {
            prepared.facts.kind = *kind;
            let hits = backend.events().matching(&prepared.facts);
            if hits.is_empty() && TargetEvent::is_unsolicited(*kind) {
                matched.push(Matched {
                    request_id: 0,
                    kind: *kind,
                    suspend_policy: SuspendPolicy::None,
                });
            }
            matched.extend(hits);
        }

        let thread = event.thread();
        let delivered = !matched.is_empty();
        if delivered {
            let policy = matched
                .iter()
                .map(|m| m.suspend_policy)
                .max()
                .unwrap_or_default();
            let packet = self.composite_packet(&event, &prepared, &matched, policy);
            tracing::trace!(
                target: "nova.jdwp",
                events = matched.len(),
                suspend_policy = ?policy,
                "sending composite event"
            );
            // Suspend before the debugger can see the event, so a resume that
            // races the packet is not lost.
            backend.gate().apply_policy(policy, thread);
            backend.send_event(packet);
        }

        if thread.is_some() {
            backend.gate().wait_if_suspended(thread);
        }
        Ok(delivered)
    }

    fn prepare(&self, event: &TargetEvent, kind: EventKind, serial: u64) -> Result<Prepared, CommandError> {
        let vm = self.backend.vm();
        let mut facts = EventFacts::new(serial, kind);
        facts.thread = event.thread();
        let mut prepared_type = None;
        let mut field_type = None;
        let mut catch = None;

        let mut declaring = None;
        if let Some(site) = event.site() {
            let ty = vm.method_facts(site.method)?.declaring_type;
            facts.location = Some(SiteFacts {
                declaring_type: ty,
                method: site.method,
                index: site.index,
            });
            facts.instance = site.this;
            declaring = Some(ty);
        }

        match event {
            TargetEvent::ClassPrepare { ty, .. } => declaring = Some(*ty),
            TargetEvent::ClassUnload { signature } => {
                facts.class_name = Some(signature_to_class_name(signature));
            }
            TargetEvent::SingleStep { size, depth, .. } => facts.step = Some((*size, *depth)),
            TargetEvent::Exception {
                exception,
                catch: handler,
                ..
            } => {
                let thrown = vm.object_type(*exception)?;
                facts.exception_chain = self.type_chain(thrown)?;
                facts.caught = Some(handler.is_some());
                if let Some((method, index)) = handler {
                    catch = Some(self.locate(*method, *index)?);
                }
            }
            TargetEvent::FieldAccess { field, object, .. }
            | TargetEvent::FieldModification { field, object, .. } => {
                facts.field = Some(*field);
                facts.instance = *object;
                let ty = vm.field_facts(*field)?.declaring_type;
                field_type = Some((ty, vm.type_facts(ty)?.type_tag()));
            }
            _ => {}
        }

        let mut site = None;
        if let Some(ty) = declaring {
            let type_facts = vm.type_facts(ty)?;
            facts.class_name = Some(type_facts.class_name());
            facts.source_name = type_facts.source_file.clone();
            facts.type_chain = self.type_chain(ty)?;
            if let Some(at) = event.site() {
                site = Some(PreparedLocation {
                    declaring_type: ty,
                    tag: type_facts.type_tag(),
                    method: at.method,
                    index: at.index,
                });
            }
            if matches!(event, TargetEvent::ClassPrepare { .. }) {
                prepared_type = Some(type_facts);
            }
        }
        Ok(Prepared {
            facts,
            site,
            catch,
            prepared_type,
            field_type,
        })
    }

    fn locate(&self, method: TargetHandle, index: u64) -> Result<PreparedLocation, CommandError> {
        let vm = self.backend.vm();
        let declaring_type = vm.method_facts(method)?.declaring_type;
        Ok(PreparedLocation {
            declaring_type,
            tag: vm.type_facts(declaring_type)?.type_tag(),
            method,
            index,
        })
    }

    /// `ty` followed by its superclasses and interfaces, breadth first.
    fn type_chain(&self, ty: TargetHandle) -> Result<Vec<TargetHandle>, CommandError> {
        let vm = self.backend.vm();
        let mut chain = vec![ty];
        let mut cursor = 0;
        while cursor < chain.len() {
            let facts = vm.type_facts(chain[cursor])?;
            for parent in facts.superclass.into_iter().chain(facts.interfaces) {
                if !chain.contains(&parent) {
                    chain.push(parent);
                }
            }
            cursor += 1;
        }
        Ok(chain)
    }

    fn composite_packet(
        &self,
        event: &TargetEvent,
        prepared: &Prepared,
        matched: &[Matched],
        policy: SuspendPolicy,
    ) -> Vec<u8> {
        let mut w = JdwpWriter::new();
        w.write_u8(policy.as_u8());
        w.write_count(matched.len());
        for m in matched {
            w.write_u8(m.kind.as_u8());
            w.write_i32(m.request_id);
            self.write_event_body(event, prepared, m.kind, &mut w);
        }
        let id = self.backend.next_packet_id();
        encode_command(id, EVENT_COMMAND_SET, EVENT_COMPOSITE, w.as_slice())
    }

    fn write_event_body(&self, event: &TargetEvent, prepared: &Prepared, kind: EventKind, w: &mut JdwpWriter) {
        let registry = self.backend.registry();

        if let Some(thread) = event.thread() {
            w.write_id(registry.register(thread, EntityKind::Thread));
        }
        if let Some(site) = &prepared.site {
            site.write(registry, w);
        }

        match event {
            TargetEvent::ClassPrepare { ty, .. } => {
                if let Some(facts) = &prepared.prepared_type {
                    w.write_reference_type(registry.register_type_with_tag(*ty, facts.type_tag()));
                    w.write_string(&facts.signature);
                    w.write_i32(facts.status);
                }
            }
            TargetEvent::ClassUnload { signature } => w.write_string(signature),
            TargetEvent::MethodExit { return_value, .. } => {
                if kind == EventKind::MethodExitWithReturnValue {
                    registry.write_tagged(return_value, w);
                }
            }
            TargetEvent::Exception { exception, .. } => {
                registry.write_tagged(&TargetValue::object(EntityKind::Object, *exception), w);
                match &prepared.catch {
                    Some(catch) => catch.write(registry, w),
                    None => location::write_absent(w),
                }
            }
            TargetEvent::FieldAccess { field, object, .. }
            | TargetEvent::FieldModification { field, object, .. } => {
                if let Some((declaring, tag)) = prepared.field_type {
                    w.write_reference_type(registry.register_type_with_tag(declaring, tag));
                }
                w.write_id(registry.register(*field, EntityKind::Field));
                registry.write_tagged(
                    &TargetValue::Reference {
                        kind: EntityKind::Object,
                        handle: *object,
                    },
                    w,
                );
                if let TargetEvent::FieldModification { value, .. } = event {
                    registry.write_tagged(value, w);
                }
            }
            _ => {}
        }
    }
}
