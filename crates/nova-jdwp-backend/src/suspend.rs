//! Cooperative suspension.
//!
//! Suspending does not stop any OS thread. It bumps a count; the target's
//! notification path parks in [`SuspendGate::wait_if_suspended`] until the
//! matching resume brings the count back to zero.

use std::collections::HashMap;

use parking_lot::{Condvar, Mutex};

use crate::{events::SuspendPolicy, vm::TargetHandle};

#[derive(Debug, Default)]
struct GateState {
    vm: u32,
    threads: HashMap<TargetHandle, u32>,
}

impl GateState {
    fn count(&self, thread: Option<TargetHandle>) -> u32 {
        let own = thread
            .and_then(|t| self.threads.get(&t).copied())
            .unwrap_or(0);
        self.vm.saturating_add(own)
    }
}

#[derive(Debug, Default)]
pub struct SuspendGate {
    state: Mutex<GateState>,
    wake: Condvar,
}

impl SuspendGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn suspend_all(&self) {
        let mut state = self.state.lock();
        state.vm = state.vm.saturating_add(1);
    }

    /// `VirtualMachine.Resume`: undo one VM-wide suspension and one
    /// suspension of every individually suspended thread.
    pub fn resume_all(&self) {
        let mut state = self.state.lock();
        state.vm = state.vm.saturating_sub(1);
        state.threads.retain(|_, count| {
            *count = count.saturating_sub(1);
            *count > 0
        });
        self.wake.notify_all();
    }

    pub fn suspend_thread(&self, thread: TargetHandle) {
        let mut state = self.state.lock();
        let count = state.threads.entry(thread).or_insert(0);
        *count = count.saturating_add(1);
    }

    /// Resuming a thread that is not suspended is a no-op.
    pub fn resume_thread(&self, thread: TargetHandle) {
        let mut state = self.state.lock();
        if let Some(count) = state.threads.get_mut(&thread) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                state.threads.remove(&thread);
            }
        }
        self.wake.notify_all();
    }

    pub fn suspend_count(&self, thread: TargetHandle) -> u32 {
        self.state.lock().count(Some(thread))
    }

    pub fn is_suspended(&self, thread: TargetHandle) -> bool {
        self.suspend_count(thread) > 0
    }

    pub fn is_vm_suspended(&self) -> bool {
        self.state.lock().vm > 0
    }

    /// Block the calling (target) thread while the VM or `thread` is
    /// suspended.
    pub fn wait_if_suspended(&self, thread: Option<TargetHandle>) {
        let mut state = self.state.lock();
        while state.count(thread) > 0 {
            self.wake.wait(&mut state);
        }
    }

    /// Drop every suspension and wake all parked threads. Used when the
    /// debugger goes away.
    pub fn release_all(&self) {
        let mut state = self.state.lock();
        state.vm = 0;
        state.threads.clear();
        self.wake.notify_all();
    }

    pub fn apply_policy(&self, policy: SuspendPolicy, thread: Option<TargetHandle>) {
        match policy {
            SuspendPolicy::None => {}
            SuspendPolicy::EventThread => {
                if let Some(thread) = thread {
                    self.suspend_thread(thread);
                }
            }
            SuspendPolicy::All => self.suspend_all(),
        }
    }
}
