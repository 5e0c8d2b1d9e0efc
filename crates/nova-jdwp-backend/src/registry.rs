//! Wire identifier registry.
//!
//! Maps collaborator [`TargetHandle`]s to 64-bit wire ids and back. Entries
//! live in a slot arena; each slot carries a generation stamp so a recycled
//! slot can never be reached through an id issued for its previous occupant.
//! Ids themselves come from a monotonic counter and are never reused.
//!
//! The registry does not keep target entities alive. The collaborator reports
//! collection through [`IdRegistry::entity_freed`], which marks the entry dead;
//! dead entries are swept lazily once enough of them accumulate.

use std::collections::HashMap;

use nova_config::JdwpBackendConfig;
use parking_lot::Mutex;

use crate::{
    error::{CommandError, VmResult},
    vm::{TargetHandle, TargetValue, TargetVm},
    wire::{
        codec::{JdwpReader, JdwpWriter},
        types::{EntityKind, Id, ReferenceTypeId, TypeTag},
        value::{Tag, Value},
    },
};

/// Entities sharing a namespace share one id per handle. Object-like kinds
/// form a single namespace so a string seen first as a plain object keeps its
/// id once its runtime kind is known.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
enum Namespace {
    Object,
    ReferenceType,
    Field,
    Method,
    Frame,
}

impl Namespace {
    const ALL: [Namespace; 5] = [
        Namespace::Object,
        Namespace::ReferenceType,
        Namespace::Field,
        Namespace::Method,
        Namespace::Frame,
    ];

    fn of(kind: EntityKind) -> Self {
        match kind {
            EntityKind::ReferenceType => Namespace::ReferenceType,
            EntityKind::Field => Namespace::Field,
            EntityKind::Method => Namespace::Method,
            EntityKind::Frame => Namespace::Frame,
            _ => Namespace::Object,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct SlotKey {
    index: usize,
    generation: u32,
}

#[derive(Debug)]
struct Entry {
    id: Id,
    handle: TargetHandle,
    kind: EntityKind,
    type_tag: Option<TypeTag>,
    /// Times the id was handed to the debugger (`DisposeObjects` bookkeeping).
    ref_count: u32,
    /// `DisableCollection` pins.
    pins: u32,
    /// Freed by the collaborator while pinned.
    freed: bool,
    dead: bool,
}

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    entry: Option<Entry>,
}

#[derive(Debug)]
struct Inner {
    first_id: u64,
    next_id: u64,
    sweep_threshold: usize,
    slots: Vec<Slot>,
    free: Vec<usize>,
    by_id: HashMap<Id, SlotKey>,
    by_handle: HashMap<(Namespace, TargetHandle), SlotKey>,
    /// Released ids that never named an object.
    retired: RetiredIds,
    dead: usize,
}

/// Sorted, merged half-open runs of released non-object ids. Ids of one
/// kind tend to be released in consecutive batches, so the runs stay few.
#[derive(Debug, Default)]
struct RetiredIds {
    runs: Vec<(u64, u64)>,
}

impl RetiredIds {
    fn insert(&mut self, id: u64) {
        let at = self.runs.partition_point(|&(_, end)| end < id);
        let Some(&(start, end)) = self.runs.get(at) else {
            self.runs.push((id, id + 1));
            return;
        };
        if start <= id && id < end {
            return;
        }
        if end == id {
            match self.runs.get(at + 1) {
                Some(&(next_start, next_end)) if next_start == id + 1 => {
                    self.runs[at].1 = next_end;
                    self.runs.remove(at + 1);
                }
                _ => self.runs[at].1 = id + 1,
            }
        } else if start == id + 1 {
            self.runs[at].0 = id;
        } else {
            self.runs.insert(at, (id, id + 1));
        }
    }

    fn contains(&self, id: u64) -> bool {
        let at = self.runs.partition_point(|&(_, end)| end <= id);
        self.runs.get(at).is_some_and(|&(start, _)| start <= id)
    }
}

impl Inner {
    fn entry(&self, key: SlotKey) -> Option<&Entry> {
        let slot = self.slots.get(key.index)?;
        if slot.generation != key.generation {
            return None;
        }
        slot.entry.as_ref()
    }

    fn entry_mut(&mut self, key: SlotKey) -> Option<&mut Entry> {
        let slot = self.slots.get_mut(key.index)?;
        if slot.generation != key.generation {
            return None;
        }
        slot.entry.as_mut()
    }

    fn live_key(&self, id: Id) -> Option<SlotKey> {
        let key = *self.by_id.get(&id)?;
        let entry = self.entry(key)?;
        (!entry.dead).then_some(key)
    }

    fn insert(&mut self, handle: TargetHandle, kind: EntityKind, type_tag: Option<TypeTag>) -> Id {
        let id = Id::from_raw(self.next_id);
        self.next_id += 1;

        let entry = Entry {
            id,
            handle,
            kind,
            type_tag,
            ref_count: 1,
            pins: 0,
            freed: false,
            dead: false,
        };
        let key = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index];
                slot.entry = Some(entry);
                SlotKey {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    entry: Some(entry),
                });
                SlotKey {
                    index: self.slots.len() - 1,
                    generation: 0,
                }
            }
        };
        self.by_id.insert(id, key);
        self.by_handle.insert((Namespace::of(kind), handle), key);
        id
    }

    /// Empty the slot and bump its generation. Returns whether it held a
    /// dead entry.
    fn release(&mut self, key: SlotKey) -> bool {
        let Some(slot) = self.slots.get_mut(key.index) else {
            return false;
        };
        if slot.generation != key.generation {
            return false;
        }
        let Some(entry) = slot.entry.take() else {
            return false;
        };
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(key.index);
        self.by_id.remove(&entry.id);
        if !entry.kind.is_object() {
            self.retired.insert(entry.id.as_u64());
        }
        let handle_key = (Namespace::of(entry.kind), entry.handle);
        if self.by_handle.get(&handle_key) == Some(&key) {
            self.by_handle.remove(&handle_key);
        }
        entry.dead
    }

    fn mark_dead(&mut self, key: SlotKey) {
        let Some(entry) = self.entry_mut(key) else {
            return;
        };
        if entry.dead {
            return;
        }
        entry.dead = true;
        let handle_key = (Namespace::of(entry.kind), entry.handle);
        self.dead += 1;
        if self.by_handle.get(&handle_key) == Some(&key) {
            self.by_handle.remove(&handle_key);
        }
    }

    fn sweep(&mut self) -> usize {
        let dead: Vec<SlotKey> = self
            .by_id
            .values()
            .copied()
            .filter(|key| self.entry(*key).is_some_and(|e| e.dead))
            .collect();
        let swept = dead.len();
        for key in dead {
            self.release(key);
        }
        self.dead = 0;
        swept
    }

    fn maybe_sweep(&mut self) {
        if self.dead >= self.sweep_threshold {
            let swept = self.sweep();
            tracing::debug!(target: "nova.jdwp", swept, "lazily swept dead identifiers");
        }
    }
}

/// Thread-safe id registry shared by the command loop and the event path.
#[derive(Debug)]
pub struct IdRegistry {
    inner: Mutex<Inner>,
}

impl Default for IdRegistry {
    fn default() -> Self {
        Self::with_config(&JdwpBackendConfig::default())
    }
}

impl IdRegistry {
    pub fn new(first_id: u64, sweep_threshold: usize) -> Self {
        let first_id = first_id.max(1);
        Self {
            inner: Mutex::new(Inner {
                first_id,
                next_id: first_id,
                sweep_threshold: sweep_threshold.max(1),
                slots: Vec::new(),
                free: Vec::new(),
                by_id: HashMap::new(),
                by_handle: HashMap::new(),
                retired: RetiredIds::default(),
                dead: 0,
            }),
        }
    }

    pub fn with_config(config: &JdwpBackendConfig) -> Self {
        Self::new(config.first_id, config.sweep_threshold)
    }

    /// Id for a live entity, allocating one on first sight.
    ///
    /// Lookup and allocation happen under one lock, so concurrent callers
    /// registering the same handle always agree on the id. A reference type
    /// registered here has no type tag until [`Self::register_type`] or
    /// [`Self::register_type_with_tag`] supplies one.
    pub fn register(&self, handle: TargetHandle, kind: EntityKind) -> Id {
        let mut inner = self.inner.lock();
        let namespace = Namespace::of(kind);
        if let Some(key) = inner.by_handle.get(&(namespace, handle)).copied() {
            if let Some(entry) = inner.entry_mut(key) {
                if !entry.dead {
                    entry.ref_count = entry.ref_count.saturating_add(1);
                    // Refine a plain object to its runtime kind once known.
                    if entry.kind == EntityKind::Object && kind != EntityKind::Object {
                        entry.kind = kind;
                    }
                    return entry.id;
                }
            }
        }
        inner.maybe_sweep();
        inner.insert(handle, kind, None)
    }

    /// `None` is the null reference and maps to [`Id::NULL`].
    pub fn register_optional(&self, handle: Option<TargetHandle>, kind: EntityKind) -> Id {
        match handle {
            Some(handle) => self.register(handle, kind),
            None => Id::NULL,
        }
    }

    /// Id for a reference type. The type tag is computed from the
    /// collaborator's facts on first registration and fixed afterwards.
    pub fn register_type(&self, vm: &dyn TargetVm, handle: TargetHandle) -> VmResult<ReferenceTypeId> {
        if let Some(existing) = self.known_type(handle) {
            return Ok(existing);
        }
        let tag = vm.type_facts(handle)?.type_tag();
        Ok(self.register_type_with_tag(handle, tag))
    }

    pub fn register_type_with_tag(&self, handle: TargetHandle, tag: TypeTag) -> ReferenceTypeId {
        let mut inner = self.inner.lock();
        let key = (Namespace::ReferenceType, handle);
        if let Some(slot_key) = inner.by_handle.get(&key).copied() {
            if let Some(entry) = inner.entry_mut(slot_key) {
                if !entry.dead {
                    entry.ref_count = entry.ref_count.saturating_add(1);
                    let tag = *entry.type_tag.get_or_insert(tag);
                    return ReferenceTypeId { tag, id: entry.id };
                }
            }
        }
        inner.maybe_sweep();
        let id = inner.insert(handle, EntityKind::ReferenceType, Some(tag));
        ReferenceTypeId { tag, id }
    }

    fn known_type(&self, handle: TargetHandle) -> Option<ReferenceTypeId> {
        let mut inner = self.inner.lock();
        let key = *inner.by_handle.get(&(Namespace::ReferenceType, handle))?;
        let entry = inner.entry_mut(key)?;
        if entry.dead {
            return None;
        }
        entry.ref_count = entry.ref_count.saturating_add(1);
        Some(ReferenceTypeId {
            tag: entry.type_tag?,
            id: entry.id,
        })
    }

    /// Resolve an id expected to name an entity of `expected` kind.
    ///
    /// Never-issued, disposed, collected and wrong-kind ids all fail with the
    /// invalid-id error of `expected`. The null id names no entity and fails
    /// the same way; use [`IdRegistry::resolve_optional`] where null is legal.
    pub fn resolve(&self, id: Id, expected: EntityKind) -> Result<TargetHandle, CommandError> {
        let inner = self.inner.lock();
        inner
            .live_key(id)
            .and_then(|key| inner.entry(key))
            .filter(|entry| expected.accepts(entry.kind))
            .map(|entry| entry.handle)
            .ok_or_else(|| CommandError::invalid(expected, id))
    }

    pub fn resolve_optional(
        &self,
        id: Id,
        expected: EntityKind,
    ) -> Result<Option<TargetHandle>, CommandError> {
        if id.is_null() {
            return Ok(None);
        }
        self.resolve(id, expected).map(Some)
    }

    pub fn resolve_type(&self, id: Id) -> Result<(TargetHandle, TypeTag), CommandError> {
        let inner = self.inner.lock();
        inner
            .live_key(id)
            .and_then(|key| inner.entry(key))
            .filter(|entry| entry.kind == EntityKind::ReferenceType)
            .and_then(|entry| Some((entry.handle, entry.type_tag?)))
            .ok_or_else(|| CommandError::invalid(EntityKind::ReferenceType, id))
    }

    /// Runtime kind recorded for a live id.
    pub fn kind_of(&self, id: Id) -> Option<EntityKind> {
        let inner = self.inner.lock();
        inner.live_key(id).and_then(|key| inner.entry(key)).map(|e| e.kind)
    }

    /// Release an id early. Pins are ignored. Unknown, null and already
    /// disposed ids are a no-op.
    pub fn dispose(&self, id: Id) {
        if id.is_null() {
            return;
        }
        let mut inner = self.inner.lock();
        if let Some(key) = inner.by_id.get(&id).copied() {
            if inner.release(key) {
                inner.dead = inner.dead.saturating_sub(1);
            }
        }
    }

    /// `VirtualMachine.DisposeObjects`: drop `count` references to `id`;
    /// the id is released once none remain.
    pub fn dispose_objects(&self, id: Id, count: u32) {
        if id.is_null() {
            return;
        }
        let mut inner = self.inner.lock();
        let Some(key) = inner.by_id.get(&id).copied() else {
            return;
        };
        let Some(entry) = inner.entry_mut(key) else {
            return;
        };
        if !entry.kind.is_object() {
            return;
        }
        entry.ref_count = entry.ref_count.saturating_sub(count);
        if entry.ref_count == 0 && entry.pins == 0 && inner.release(key) {
            inner.dead = inner.dead.saturating_sub(1);
        }
    }

    /// Collaborator notification that `handle` no longer exists. Pinned
    /// objects stay resolvable until their last pin is removed.
    pub fn entity_freed(&self, handle: TargetHandle) {
        let mut inner = self.inner.lock();
        for namespace in Namespace::ALL {
            let Some(key) = inner.by_handle.get(&(namespace, handle)).copied() else {
                continue;
            };
            let pinned = match inner.entry_mut(key) {
                Some(entry) if entry.pins > 0 => {
                    entry.freed = true;
                    true
                }
                Some(_) => false,
                None => continue,
            };
            if !pinned {
                inner.mark_dead(key);
            }
        }
        inner.maybe_sweep();
    }

    /// Remove every dead entry. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        let swept = self.inner.lock().sweep();
        if swept > 0 {
            tracing::debug!(target: "nova.jdwp", swept, "swept dead identifiers");
        }
        swept
    }

    /// `ObjectReference.DisableCollection`.
    pub fn disable_collection(&self, id: Id) -> Result<(), CommandError> {
        let mut inner = self.inner.lock();
        let key = inner
            .live_key(id)
            .filter(|key| inner.entry(*key).is_some_and(|e| e.kind.is_object()))
            .ok_or_else(|| CommandError::invalid(EntityKind::Object, id))?;
        if let Some(entry) = inner.entry_mut(key) {
            entry.pins = entry.pins.saturating_add(1);
        }
        Ok(())
    }

    /// `ObjectReference.EnableCollection`. Ids that are already gone are
    /// ignored, as the protocol allows.
    pub fn enable_collection(&self, id: Id) -> Result<(), CommandError> {
        let mut inner = self.inner.lock();
        let Some(key) = inner.live_key(id) else {
            return Ok(());
        };
        let freed = match inner.entry_mut(key) {
            Some(entry) if entry.kind.is_object() => {
                entry.pins = entry.pins.saturating_sub(1);
                entry.pins == 0 && entry.freed
            }
            _ => return Err(CommandError::invalid(EntityKind::Object, id)),
        };
        if freed {
            inner.mark_dead(key);
            inner.maybe_sweep();
        }
        Ok(())
    }

    /// `ObjectReference.IsCollected`. Ids never issued by this registry, or
    /// issued for something other than an object, are invalid rather than
    /// collected.
    pub fn is_collected(&self, id: Id) -> Result<bool, CommandError> {
        let inner = self.inner.lock();
        let raw = id.as_u64();
        if id.is_null() || raw < inner.first_id || raw >= inner.next_id || inner.retired.contains(raw) {
            return Err(CommandError::invalid(EntityKind::Object, id));
        }
        match inner.by_id.get(&id).and_then(|key| inner.entry(*key)) {
            Some(entry) if !entry.kind.is_object() => {
                Err(CommandError::invalid(EntityKind::Object, id))
            }
            Some(entry) => Ok(entry.dead),
            None => Ok(true),
        }
    }

    /// Drop every frame id. Frame ids are only valid while their thread
    /// stays suspended.
    pub fn invalidate_frames(&self) {
        let mut inner = self.inner.lock();
        let frames: Vec<SlotKey> = inner
            .by_id
            .values()
            .copied()
            .filter(|key| inner.entry(*key).is_some_and(|e| e.kind == EntityKind::Frame))
            .collect();
        for key in frames {
            if inner.release(key) {
                inner.dead = inner.dead.saturating_sub(1);
            }
        }
    }

    /// Forget every entity (`VirtualMachine.Dispose`). The id counter keeps
    /// counting so old ids stay invalid.
    pub fn dispose_all(&self) {
        let mut inner = self.inner.lock();
        let keys: Vec<SlotKey> = inner.by_id.values().copied().collect();
        for key in keys {
            inner.release(key);
        }
        inner.dead = 0;
    }

    /// Entries that still resolve.
    pub fn live_count(&self) -> usize {
        let inner = self.inner.lock();
        inner
            .by_id
            .values()
            .filter(|key| inner.entry(**key).is_some_and(|e| !e.dead))
            .count()
    }

    /// Entries currently occupying a slot, dead or alive.
    pub fn tracked_count(&self) -> usize {
        self.inner.lock().by_id.len()
    }

    /// Wire form of a target value, registering any referenced entity.
    pub fn to_wire(&self, value: &TargetValue) -> Value {
        match *value {
            TargetValue::Byte(v) => Value::Byte(v),
            TargetValue::Char(v) => Value::Char(v),
            TargetValue::Float(v) => Value::Float(v),
            TargetValue::Double(v) => Value::Double(v),
            TargetValue::Int(v) => Value::Int(v),
            TargetValue::Long(v) => Value::Long(v),
            TargetValue::Short(v) => Value::Short(v),
            TargetValue::Boolean(v) => Value::Boolean(v),
            TargetValue::Void => Value::Void,
            TargetValue::Reference { kind, handle } => {
                let id = self.register_optional(handle, kind);
                let tag = Tag::for_entity(kind).unwrap_or(Tag::Object);
                Value::reference(tag, id).unwrap_or(Value::Object(id))
            }
        }
    }

    /// Target form of a wire value. Null references decode to no entity.
    pub fn from_wire(&self, value: Value) -> Result<TargetValue, CommandError> {
        let value = match value {
            Value::Byte(v) => TargetValue::Byte(v),
            Value::Char(v) => TargetValue::Char(v),
            Value::Float(v) => TargetValue::Float(v),
            Value::Double(v) => TargetValue::Double(v),
            Value::Int(v) => TargetValue::Int(v),
            Value::Long(v) => TargetValue::Long(v),
            Value::Short(v) => TargetValue::Short(v),
            Value::Boolean(v) => TargetValue::Boolean(v),
            Value::Void => TargetValue::Void,
            reference => {
                let kind = reference
                    .tag()
                    .entity_kind()
                    .unwrap_or(EntityKind::Object);
                let id = reference.object_id().unwrap_or(Id::NULL);
                TargetValue::Reference {
                    kind,
                    handle: self.resolve_optional(id, kind)?,
                }
            }
        };
        Ok(value)
    }

    pub fn write_tagged(&self, value: &TargetValue, w: &mut JdwpWriter) {
        self.to_wire(value).write_tagged(w);
    }

    pub fn write_untagged(&self, value: &TargetValue, w: &mut JdwpWriter) {
        self.to_wire(value).write_untagged(w);
    }

    pub fn read_tagged(&self, r: &mut JdwpReader<'_>) -> Result<TargetValue, CommandError> {
        let value = Value::read_tagged(r)?;
        self.from_wire(value)
    }

    pub fn read_untagged(&self, tag: Tag, r: &mut JdwpReader<'_>) -> Result<TargetValue, CommandError> {
        let value = Value::read_untagged(tag, r)?;
        self.from_wire(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    const O1: TargetHandle = TargetHandle(10);
    const O2: TargetHandle = TargetHandle(11);

    fn code(err: CommandError) -> ErrorCode {
        err.error_code().unwrap()
    }

    #[test]
    fn registration_is_stable_and_monotonic() {
        let registry = IdRegistry::new(1001, 16);
        assert_eq!(registry.register(O1, EntityKind::Object), Id::from_raw(1001));
        assert_eq!(registry.register(O1, EntityKind::Object), Id::from_raw(1001));
        assert_eq!(registry.register(O2, EntityKind::Object), Id::from_raw(1002));
    }

    #[test]
    fn ids_are_not_recycled_after_collection() {
        let registry = IdRegistry::new(1, 1);
        let first = registry.register(O1, EntityKind::Object);
        registry.entity_freed(O1);
        registry.sweep();

        // The collaborator may hand out the same handle again for a new entity.
        let again = registry.register(O1, EntityKind::Object);
        let other = registry.register(O2, EntityKind::Object);
        assert_ne!(again, first);
        assert_ne!(other, first);
        assert!(registry.resolve(first, EntityKind::Object).is_err());
    }

    #[test]
    fn freed_entities_stop_resolving() {
        let registry = IdRegistry::new(1, 100);
        let id = registry.register(O1, EntityKind::Array);
        assert_eq!(registry.resolve(id, EntityKind::Array).unwrap(), O1);

        registry.entity_freed(O1);
        assert_eq!(code(registry.resolve(id, EntityKind::Array).unwrap_err()), ErrorCode::InvalidArray);
        assert_eq!(registry.tracked_count(), 1);
        assert_eq!(registry.sweep(), 1);
        assert_eq!(registry.tracked_count(), 0);
        assert_eq!(code(registry.resolve(id, EntityKind::Array).unwrap_err()), ErrorCode::InvalidArray);
    }

    #[test]
    fn lazy_sweep_bounds_dead_entries() {
        let registry = IdRegistry::new(1, 4);
        for raw in 0..4 {
            registry.register(TargetHandle(raw), EntityKind::Object);
            registry.entity_freed(TargetHandle(raw));
        }
        assert_eq!(registry.tracked_count(), 0);
        assert_eq!(registry.live_count(), 0);
    }

    #[test]
    fn error_kind_follows_expected_kind() {
        let registry = IdRegistry::new(1, 16);
        let id = registry.register(O1, EntityKind::Array);
        assert_eq!(
            code(registry.resolve(id, EntityKind::Field).unwrap_err()),
            ErrorCode::InvalidFieldId
        );
        assert_eq!(registry.resolve(id, EntityKind::Object).unwrap(), O1);
    }

    #[test]
    fn dispose_is_idempotent() {
        let registry = IdRegistry::new(1, 16);
        let id = registry.register(O1, EntityKind::Field);
        registry.dispose(id);
        registry.dispose(id);
        registry.dispose(Id::NULL);
        assert_eq!(
            code(registry.resolve(id, EntityKind::Field).unwrap_err()),
            ErrorCode::InvalidFieldId
        );
    }

    #[test]
    fn null_decodes_to_no_entity() {
        let registry = IdRegistry::new(1, 16);
        assert_eq!(registry.resolve_optional(Id::NULL, EntityKind::Thread).unwrap(), None);
        assert_eq!(
            registry.from_wire(Value::Thread(Id::NULL)).unwrap(),
            TargetValue::Reference {
                kind: EntityKind::Thread,
                handle: None
            }
        );
        assert_eq!(registry.register_optional(None, EntityKind::Thread), Id::NULL);
    }

    #[test]
    fn type_tag_is_fixed_at_first_registration() {
        let registry = IdRegistry::new(1, 16);
        let first = registry.register_type_with_tag(O1, TypeTag::Interface);
        let second = registry.register_type_with_tag(O1, TypeTag::Class);
        assert_eq!(first, second);
        assert_eq!(second.tag, TypeTag::Interface);
        assert_eq!(registry.resolve_type(first.id).unwrap(), (O1, TypeTag::Interface));
    }

    #[test]
    fn plain_registered_type_gains_its_tag_later() {
        let registry = IdRegistry::new(1, 16);
        let id = registry.register(O1, EntityKind::ReferenceType);
        assert_eq!(code(registry.resolve_type(id).unwrap_err()), ErrorCode::InvalidClass);

        let typed = registry.register_type_with_tag(O1, TypeTag::Class);
        assert_eq!(typed.id, id);
        assert_eq!(typed.tag, TypeTag::Class);
        assert_eq!(registry.resolve_type(id).unwrap(), (O1, TypeTag::Class));
    }

    #[test]
    fn pinned_objects_survive_until_unpinned() {
        let registry = IdRegistry::new(1, 16);
        let id = registry.register(O1, EntityKind::Object);
        registry.disable_collection(id).unwrap();
        registry.entity_freed(O1);
        assert_eq!(registry.resolve(id, EntityKind::Object).unwrap(), O1);
        assert!(!registry.is_collected(id).unwrap());

        registry.enable_collection(id).unwrap();
        assert!(registry.is_collected(id).unwrap());
        assert!(registry.resolve(id, EntityKind::Object).is_err());
    }

    #[test]
    fn is_collected_rejects_unissued_ids() {
        let registry = IdRegistry::new(5, 16);
        assert!(registry.is_collected(Id::from_raw(4)).is_err());
        assert!(registry.is_collected(Id::from_raw(5)).is_err());
        let id = registry.register(O1, EntityKind::Object);
        registry.dispose(id);
        assert!(registry.is_collected(id).unwrap());
    }

    #[test]
    fn released_non_object_ids_stay_invalid_for_is_collected() {
        let registry = IdRegistry::new(1, 16);
        let frame = registry.register(O1, EntityKind::Frame);
        let ty = registry.register_type_with_tag(O2, TypeTag::Class).id;
        let object = registry.register(O2, EntityKind::Object);

        registry.invalidate_frames();
        registry.dispose(ty);
        registry.dispose(object);
        assert_eq!(code(registry.is_collected(frame).unwrap_err()), ErrorCode::InvalidObject);
        assert_eq!(code(registry.is_collected(ty).unwrap_err()), ErrorCode::InvalidObject);
        assert!(registry.is_collected(object).unwrap());

        registry.dispose_all();
        assert_eq!(code(registry.is_collected(frame).unwrap_err()), ErrorCode::InvalidObject);
    }

    #[test]
    fn retired_runs_merge_regardless_of_release_order() {
        let mut retired = RetiredIds::default();
        for id in [5, 3, 9, 4, 8, 6] {
            retired.insert(id);
        }
        assert_eq!(retired.runs, vec![(3, 7), (8, 10)]);
        retired.insert(7);
        retired.insert(7);
        assert_eq!(retired.runs, vec![(3, 10)]);
        assert!(retired.contains(3) && retired.contains(9));
        assert!(!retired.contains(2) && !retired.contains(10));
    }

    #[test]
    fn dispose_objects_counts_references() {
        let registry = IdRegistry::new(1, 16);
        let id = registry.register(O1, EntityKind::String);
        registry.register(O1, EntityKind::String);
        registry.dispose_objects(id, 1);
        assert!(registry.resolve(id, EntityKind::String).is_ok());
        registry.dispose_objects(id, 1);
        assert!(registry.resolve(id, EntityKind::String).is_err());
    }

    #[test]
    fn plain_object_refines_to_runtime_kind() {
        let registry = IdRegistry::new(1, 16);
        let id = registry.register(O1, EntityKind::Object);
        assert_eq!(registry.register(O1, EntityKind::String), id);
        assert_eq!(registry.kind_of(id), Some(EntityKind::String));
        assert!(registry.resolve(id, EntityKind::String).is_ok());
    }

    #[test]
    fn frames_are_invalidated_in_bulk() {
        let registry = IdRegistry::new(1, 16);
        let frame = registry.register(TargetHandle(1), EntityKind::Frame);
        let object = registry.register(TargetHandle(2), EntityKind::Object);
        registry.invalidate_frames();
        assert!(registry.resolve(frame, EntityKind::Frame).is_err());
        assert!(registry.resolve(object, EntityKind::Object).is_ok());
    }

    #[test]
    fn concurrent_registration_agrees_on_ids() {
        use std::sync::Arc;

        let registry = Arc::new(IdRegistry::new(1, 16));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    (0..100)
                        .map(|raw| registry.register(TargetHandle(raw), EntityKind::Object))
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        let results: Vec<Vec<Id>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for ids in &results[1..] {
            assert_eq!(ids, &results[0]);
        }
        assert_eq!(registry.live_count(), 100);
    }
}
