//! Target-side Java Debug Wire Protocol back-end for Nova.
//!
//! The back-end sits between a debugger front end and a target VM
//! collaborator ([`TargetVm`]). It issues stable wire identifiers for target
//! entities ([`IdRegistry`]), encodes values and locations, runs the
//! one-packet-at-a-time command loop ([`serve`]) over a [`Dispatcher`], and
//! turns target occurrences into composite event packets filtered by the
//! debugger's event requests ([`EventNotifier`]).
//!
//! All shared state lives in one [`Backend`] context built at startup.

mod backend;
mod commands;
pub mod dispatch;
pub mod error;
pub mod events;
#[cfg(any(test, feature = "test-support"))]
pub mod mock;
pub mod registry;
mod server;
pub mod suspend;
pub mod vm;
pub mod wire;

pub use backend::{Backend, EventStream};
pub use dispatch::{Dispatcher, Handler, Reply};
pub use error::{CommandError, DecodeError, ErrorCode, InternalError, ServeError, VmError, VmResult};
pub use events::{
    notify::{EventNotifier, EventSite, TargetEvent},
    EventKind, SuspendPolicy,
};
pub use registry::IdRegistry;
pub use server::{serve, serve_with};
pub use suspend::SuspendGate;
pub use vm::{TargetHandle, TargetValue, TargetVm};
pub use wire::types::{EntityKind, Id, Location, ReferenceTypeId, TypeTag};
pub use wire::value::{Tag, Value};
