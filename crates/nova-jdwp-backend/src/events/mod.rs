//! Event requests installed by the debugger and their filter chains.

pub mod filter;
pub mod notify;

use std::{
    collections::BTreeMap,
    sync::atomic::{AtomicU64, Ordering},
};

use parking_lot::Mutex;

use crate::error::DecodeError;

use filter::{EventFacts, Modifier};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum EventKind {
    SingleStep = 1,
    Breakpoint = 2,
    FramePop = 3,
    Exception = 4,
    UserDefined = 5,
    ThreadStart = 6,
    ThreadDeath = 7,
    ClassPrepare = 8,
    ClassUnload = 9,
    ClassLoad = 10,
    FieldAccess = 20,
    FieldModification = 21,
    ExceptionCatch = 30,
    MethodEntry = 40,
    MethodExit = 41,
    MethodExitWithReturnValue = 42,
    VmStart = 90,
    VmDeath = 99,
}

impl EventKind {
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(raw: u8) -> Option<Self> {
        let kind = match raw {
            1 => EventKind::SingleStep,
            2 => EventKind::Breakpoint,
            3 => EventKind::FramePop,
            4 => EventKind::Exception,
            5 => EventKind::UserDefined,
            6 => EventKind::ThreadStart,
            7 => EventKind::ThreadDeath,
            8 => EventKind::ClassPrepare,
            9 => EventKind::ClassUnload,
            10 => EventKind::ClassLoad,
            20 => EventKind::FieldAccess,
            21 => EventKind::FieldModification,
            30 => EventKind::ExceptionCatch,
            40 => EventKind::MethodEntry,
            41 => EventKind::MethodExit,
            42 => EventKind::MethodExitWithReturnValue,
            90 => EventKind::VmStart,
            99 => EventKind::VmDeath,
            _ => return None,
        };
        Some(kind)
    }
}

/// Ordered from weakest to strongest.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum SuspendPolicy {
    #[default]
    None = 0,
    EventThread = 1,
    All = 2,
}

impl SuspendPolicy {
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(raw: u8) -> Result<Self, DecodeError> {
        match raw {
            0 => Ok(SuspendPolicy::None),
            1 => Ok(SuspendPolicy::EventThread),
            2 => Ok(SuspendPolicy::All),
            other => Err(DecodeError::UnknownSuspendPolicy(other)),
        }
    }
}

#[derive(Debug)]
pub struct EventRequest {
    pub id: i32,
    pub kind: EventKind,
    pub suspend_policy: SuspendPolicy,
    modifiers: Vec<Modifier>,
    enabled: bool,
    /// Outcome for the most recent event serial.
    last: Option<(u64, bool)>,
}

impl EventRequest {
    pub fn new(id: i32, kind: EventKind, suspend_policy: SuspendPolicy, modifiers: Vec<Modifier>) -> Self {
        Self {
            id,
            kind,
            suspend_policy,
            modifiers,
            enabled: true,
            last: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn modifiers(&self) -> &[Modifier] {
        &self.modifiers
    }

    /// Every modifier must accept, in order. A repeated evaluation of the
    /// same event serial returns the first answer without touching counts.
    /// A request whose count runs out is disabled after the event that
    /// exhausted it.
    pub fn accepts(&mut self, facts: &EventFacts) -> bool {
        if let Some((serial, outcome)) = self.last {
            if serial == facts.serial {
                return outcome;
            }
        }
        if !self.enabled || facts.kind != self.kind {
            return false;
        }
        let outcome = self.modifiers.iter_mut().all(|m| m.accepts(facts));
        self.last = Some((facts.serial, outcome));
        if self.modifiers.iter().any(Modifier::is_exhausted) {
            self.enabled = false;
            tracing::debug!(target: "nova.jdwp", request_id = self.id, "event request count exhausted; disabled");
        }
        outcome
    }
}

#[derive(Debug)]
struct Requests {
    next_id: i32,
    by_id: BTreeMap<i32, EventRequest>,
}

/// All requests installed through `EventRequest.Set`.
#[derive(Debug)]
pub struct EventRequestManager {
    inner: Mutex<Requests>,
    serial: AtomicU64,
}

impl Default for EventRequestManager {
    fn default() -> Self {
        Self::new()
    }
}

/// A request that matched an event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Matched {
    pub request_id: i32,
    pub kind: EventKind,
    pub suspend_policy: SuspendPolicy,
}

impl EventRequestManager {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Requests {
                next_id: 1,
                by_id: BTreeMap::new(),
            }),
            serial: AtomicU64::new(1),
        }
    }

    /// Fresh serial for a target event.
    pub fn next_serial(&self) -> u64 {
        self.serial.fetch_add(1, Ordering::Relaxed)
    }

    pub fn set(&self, kind: EventKind, suspend_policy: SuspendPolicy, modifiers: Vec<Modifier>) -> i32 {
        let mut inner = self.inner.lock();
        let id = inner.next_id;
        inner.next_id = inner.next_id.wrapping_add(1).max(1);
        tracing::debug!(
            target: "nova.jdwp",
            request_id = id,
            kind = ?kind,
            suspend_policy = ?suspend_policy,
            modifiers = modifiers.len(),
            "event request set"
        );
        inner
            .by_id
            .insert(id, EventRequest::new(id, kind, suspend_policy, modifiers));
        id
    }

    /// Clearing an unknown request, or one of another kind, is a no-op.
    pub fn clear(&self, kind: EventKind, id: i32) -> bool {
        let mut inner = self.inner.lock();
        let matches = inner.by_id.get(&id).is_some_and(|r| r.kind == kind);
        if matches {
            inner.by_id.remove(&id);
            tracing::debug!(target: "nova.jdwp", request_id = id, kind = ?kind, "event request cleared");
        }
        matches
    }

    pub fn clear_all_breakpoints(&self) -> usize {
        let mut inner = self.inner.lock();
        let before = inner.by_id.len();
        inner.by_id.retain(|_, r| r.kind != EventKind::Breakpoint);
        let removed = before - inner.by_id.len();
        tracing::debug!(target: "nova.jdwp", removed, "cleared all breakpoint requests");
        removed
    }

    pub fn clear_all(&self) {
        self.inner.lock().by_id.clear();
    }

    /// Requests of `facts.kind` that accept the event, in request-id order.
    pub fn matching(&self, facts: &EventFacts) -> Vec<Matched> {
        let mut inner = self.inner.lock();
        inner
            .by_id
            .values_mut()
            .filter(|r| r.kind == facts.kind)
            .filter_map(|r| {
                r.accepts(facts).then_some(Matched {
                    request_id: r.id,
                    kind: r.kind,
                    suspend_policy: r.suspend_policy,
                })
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_enabled(&self, id: i32) -> Option<bool> {
        self.inner.lock().by_id.get(&id).map(EventRequest::is_enabled)
    }
}
