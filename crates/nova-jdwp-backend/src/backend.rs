use std::sync::{
    atomic::{AtomicBool, AtomicU32, Ordering},
    Arc,
};

use nova_config::{ConfigError, JdwpBackendConfig};
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::{
    events::{notify::EventNotifier, EventRequestManager},
    registry::IdRegistry,
    suspend::SuspendGate,
    vm::TargetVm,
};

pub type EventStream = mpsc::UnboundedReceiver<Vec<u8>>;

/// Shared state of one debuggee.
///
/// Built once at startup and handed by reference to the command dispatcher
/// and, through [`EventNotifier`], to the target's notification path.
pub struct Backend {
    config: JdwpBackendConfig,
    vm: Arc<dyn TargetVm>,
    registry: IdRegistry,
    events: EventRequestManager,
    gate: SuspendGate,
    disposed: AtomicBool,
    next_packet_id: AtomicU32,
    event_tx: mpsc::UnboundedSender<Vec<u8>>,
    event_rx: Mutex<Option<EventStream>>,
}

impl std::fmt::Debug for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backend")
            .field("config", &self.config)
            .field("live_ids", &self.registry.live_count())
            .field("requests", &self.events.len())
            .field("disposed", &self.is_disposed())
            .finish_non_exhaustive()
    }
}

impl Backend {
    /// Fails on configuration the back-end cannot honour, such as a
    /// non-UTF-8 string encoding.
    pub fn new(config: JdwpBackendConfig, vm: Arc<dyn TargetVm>) -> Result<Self, ConfigError> {
        config.validate()?;
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        Ok(Self {
            registry: IdRegistry::with_config(&config),
            config,
            vm,
            events: EventRequestManager::new(),
            gate: SuspendGate::new(),
            disposed: AtomicBool::new(false),
            next_packet_id: AtomicU32::new(1),
            event_tx,
            event_rx: Mutex::new(Some(event_rx)),
        })
    }

    pub fn config(&self) -> &JdwpBackendConfig {
        &self.config
    }

    pub fn vm(&self) -> &dyn TargetVm {
        self.vm.as_ref()
    }

    pub fn registry(&self) -> &IdRegistry {
        &self.registry
    }

    pub fn events(&self) -> &EventRequestManager {
        &self.events
    }

    pub fn gate(&self) -> &SuspendGate {
        &self.gate
    }

    pub fn notifier(self: &Arc<Self>) -> EventNotifier {
        EventNotifier::new(Arc::clone(self))
    }

    /// Outgoing event packets. Only one consumer may hold it at a time.
    pub fn take_event_stream(&self) -> Option<EventStream> {
        self.event_rx.lock().take()
    }

    pub fn restore_event_stream(&self, stream: EventStream) {
        *self.event_rx.lock() = Some(stream);
    }

    pub(crate) fn send_event(&self, packet: Vec<u8>) {
        if self.event_tx.send(packet).is_err() {
            tracing::debug!(target: "nova.jdwp", "event stream closed; dropping event");
        }
    }

    pub(crate) fn next_packet_id(&self) -> u32 {
        self.next_packet_id.fetch_add(1, Ordering::Relaxed)
    }

    /// `VirtualMachine.Dispose`: forget every id and request and let the
    /// target run freely.
    pub fn dispose(&self) {
        self.disposed.store(true, Ordering::SeqCst);
        self.events.clear_all();
        self.registry.dispose_all();
        self.gate.release_all();
        tracing::debug!(target: "nova.jdwp", "debugger session disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// Prepare for a new debugger connection after a dispose.
    pub fn reset(&self) {
        self.disposed.store(false, Ordering::SeqCst);
    }
}
