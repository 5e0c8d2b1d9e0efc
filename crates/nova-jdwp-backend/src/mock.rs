//! In-memory target VM for tests.
//!
//! Supports just enough of a Java-like object model (types, members, threads,
//! frames, objects, strings, arrays) to drive every implemented command
//! without a real debuggee.

use std::{
    collections::HashMap,
    sync::atomic::{AtomicBool, AtomicU64, Ordering},
};

use parking_lot::Mutex;

use crate::{
    error::{ErrorCode, VmError, VmResult},
    vm::{
        class_status, thread_status, FieldFacts, FrameFacts, LineTable, MethodFacts, TargetHandle,
        TargetValue, TargetVm, ThreadFacts, ThreadGroupFacts, TypeFacts, VariableTable,
        VmDescription,
    },
    wire::{types::EntityKind, value::Tag},
};

const ACC_PUBLIC: i32 = 0x0001;
const ACC_INTERFACE: i32 = 0x0200;

#[derive(Clone, Debug)]
struct MockType {
    facts: TypeFacts,
    fields: Vec<TargetHandle>,
    methods: Vec<TargetHandle>,
}

#[derive(Clone, Debug)]
struct MockMethod {
    facts: MethodFacts,
    lines: Option<LineTable>,
    variables: Option<VariableTable>,
}

#[derive(Clone, Debug)]
struct MockThread {
    facts: ThreadFacts,
    frames: Vec<FrameFacts>,
}

#[derive(Clone, Debug)]
struct MockFrame {
    locals: HashMap<i32, TargetValue>,
    this: Option<TargetHandle>,
}

#[derive(Clone, Debug)]
enum MockObject {
    Plain {
        ty: TargetHandle,
        fields: HashMap<TargetHandle, TargetValue>,
    },
    String {
        ty: TargetHandle,
        value: String,
    },
    Array {
        ty: TargetHandle,
        values: Vec<TargetValue>,
    },
    ClassObject {
        ty: TargetHandle,
        reflected: TargetHandle,
    },
    Thread {
        ty: TargetHandle,
    },
}

impl MockObject {
    fn ty(&self) -> TargetHandle {
        match self {
            MockObject::Plain { ty, .. }
            | MockObject::String { ty, .. }
            | MockObject::Array { ty, .. }
            | MockObject::ClassObject { ty, .. }
            | MockObject::Thread { ty } => *ty,
        }
    }
}

#[derive(Debug, Default)]
struct State {
    types: HashMap<TargetHandle, MockType>,
    load_order: Vec<TargetHandle>,
    fields: HashMap<TargetHandle, FieldFacts>,
    methods: HashMap<TargetHandle, MockMethod>,
    threads: HashMap<TargetHandle, MockThread>,
    thread_order: Vec<TargetHandle>,
    groups: HashMap<TargetHandle, ThreadGroupFacts>,
    group_order: Vec<TargetHandle>,
    frames: HashMap<TargetHandle, MockFrame>,
    objects: HashMap<TargetHandle, MockObject>,
    class_objects: HashMap<TargetHandle, TargetHandle>,
    by_signature: HashMap<String, TargetHandle>,
}

#[derive(Debug)]
pub struct MockVm {
    state: Mutex<State>,
    next_handle: AtomicU64,
    alive: AtomicBool,
    broken: Mutex<Option<String>>,
}

impl Default for MockVm {
    fn default() -> Self {
        Self::new()
    }
}

fn missing<T>(code: ErrorCode) -> VmResult<T> {
    Err(VmError::Reported(code))
}

impl MockVm {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            next_handle: AtomicU64::new(1),
            alive: AtomicBool::new(true),
            broken: Mutex::new(None),
        }
    }

    fn mint(&self) -> TargetHandle {
        TargetHandle(self.next_handle.fetch_add(1, Ordering::Relaxed))
    }

    /// Common failure checks run before every collaborator call.
    fn check(&self) -> VmResult<()> {
        if let Some(message) = self.broken.lock().take() {
            return Err(VmError::Broken(message));
        }
        if !self.alive.load(Ordering::SeqCst) {
            return Err(VmError::Reported(ErrorCode::VmDead));
        }
        Ok(())
    }

    fn add_type(&self, signature: &str, is_array: bool, is_interface: bool) -> TargetHandle {
        let handle = self.mint();
        let mut state = self.state.lock();
        let superclass = if is_interface || signature == "Ljava/lang/Object;" {
            None
        } else {
            state.by_signature.get("Ljava/lang/Object;").copied()
        };
        let mut modifiers = ACC_PUBLIC;
        if is_interface {
            modifiers |= ACC_INTERFACE;
        }
        state.types.insert(
            handle,
            MockType {
                facts: TypeFacts {
                    signature: signature.to_owned(),
                    is_array,
                    is_interface,
                    modifiers,
                    status: class_status::VERIFIED
                        | class_status::PREPARED
                        | class_status::INITIALIZED,
                    source_file: None,
                    superclass,
                    interfaces: Vec::new(),
                    class_loader: None,
                },
                fields: Vec::new(),
                methods: Vec::new(),
            },
        );
        state.load_order.push(handle);
        state.by_signature.insert(signature.to_owned(), handle);
        handle
    }

    fn type_named(&self, signature: &str) -> TargetHandle {
        let existing = self.state.lock().by_signature.get(signature).copied();
        existing.unwrap_or_else(|| self.add_class(signature))
    }

    pub fn add_class(&self, signature: &str) -> TargetHandle {
        self.add_type(signature, false, false)
    }

    pub fn add_interface(&self, signature: &str) -> TargetHandle {
        self.add_type(signature, false, true)
    }

    pub fn add_array_type(&self, signature: &str) -> TargetHandle {
        self.add_type(signature, true, false)
    }

    pub fn set_superclass(&self, ty: TargetHandle, superclass: Option<TargetHandle>) {
        if let Some(t) = self.state.lock().types.get_mut(&ty) {
            t.facts.superclass = superclass;
        }
    }

    pub fn add_interface_to(&self, ty: TargetHandle, interface: TargetHandle) {
        if let Some(t) = self.state.lock().types.get_mut(&ty) {
            t.facts.interfaces.push(interface);
        }
    }

    pub fn set_source_file(&self, ty: TargetHandle, source_file: &str) {
        if let Some(t) = self.state.lock().types.get_mut(&ty) {
            t.facts.source_file = Some(source_file.to_owned());
        }
    }

    pub fn set_class_loader(&self, ty: TargetHandle, loader: TargetHandle) {
        if let Some(t) = self.state.lock().types.get_mut(&ty) {
            t.facts.class_loader = Some(loader);
        }
    }

    pub fn add_field(&self, ty: TargetHandle, name: &str, signature: &str) -> TargetHandle {
        let handle = self.mint();
        let mut state = self.state.lock();
        state.fields.insert(
            handle,
            FieldFacts {
                name: name.to_owned(),
                signature: signature.to_owned(),
                modifiers: ACC_PUBLIC,
                declaring_type: ty,
            },
        );
        if let Some(t) = state.types.get_mut(&ty) {
            t.fields.push(handle);
        }
        handle
    }

    pub fn add_method(&self, ty: TargetHandle, name: &str, signature: &str) -> TargetHandle {
        let handle = self.mint();
        let mut state = self.state.lock();
        state.methods.insert(
            handle,
            MockMethod {
                facts: MethodFacts {
                    name: name.to_owned(),
                    signature: signature.to_owned(),
                    modifiers: ACC_PUBLIC,
                    declaring_type: ty,
                },
                lines: None,
                variables: None,
            },
        );
        if let Some(t) = state.types.get_mut(&ty) {
            t.methods.push(handle);
        }
        handle
    }

    pub fn set_line_table(&self, method: TargetHandle, table: LineTable) {
        if let Some(m) = self.state.lock().methods.get_mut(&method) {
            m.lines = Some(table);
        }
    }

    pub fn set_variable_table(&self, method: TargetHandle, table: VariableTable) {
        if let Some(m) = self.state.lock().methods.get_mut(&method) {
            m.variables = Some(table);
        }
    }

    pub fn add_thread_group(&self, name: &str, parent: Option<TargetHandle>) -> TargetHandle {
        let handle = self.mint();
        let mut state = self.state.lock();
        state.groups.insert(
            handle,
            ThreadGroupFacts {
                name: name.to_owned(),
                parent,
            },
        );
        state.group_order.push(handle);
        handle
    }

    pub fn add_thread(&self, name: &str, group: TargetHandle) -> TargetHandle {
        let ty = self.type_named("Ljava/lang/Thread;");
        let handle = self.mint();
        let mut state = self.state.lock();
        state.threads.insert(
            handle,
            MockThread {
                facts: ThreadFacts {
                    name: name.to_owned(),
                    group,
                    status: thread_status::RUNNING,
                },
                frames: Vec::new(),
            },
        );
        state.thread_order.push(handle);
        state.objects.insert(handle, MockObject::Thread { ty });
        handle
    }

    pub fn set_thread_status(&self, thread: TargetHandle, status: i32) {
        if let Some(t) = self.state.lock().threads.get_mut(&thread) {
            t.facts.status = status;
        }
    }

    /// Push a new innermost frame.
    pub fn push_frame(&self, thread: TargetHandle, method: TargetHandle, index: u64) -> TargetHandle {
        let frame = self.mint();
        let mut state = self.state.lock();
        state.frames.insert(
            frame,
            MockFrame {
                locals: HashMap::new(),
                this: None,
            },
        );
        if let Some(t) = state.threads.get_mut(&thread) {
            t.frames.insert(
                0,
                FrameFacts {
                    frame,
                    method,
                    index,
                },
            );
        }
        frame
    }

    pub fn set_local(&self, frame: TargetHandle, slot: i32, value: TargetValue) {
        if let Some(f) = self.state.lock().frames.get_mut(&frame) {
            f.locals.insert(slot, value);
        }
    }

    pub fn set_this(&self, frame: TargetHandle, object: TargetHandle) {
        if let Some(f) = self.state.lock().frames.get_mut(&frame) {
            f.this = Some(object);
        }
    }

    pub fn add_object(&self, ty: TargetHandle) -> TargetHandle {
        let handle = self.mint();
        self.state.lock().objects.insert(
            handle,
            MockObject::Plain {
                ty,
                fields: HashMap::new(),
            },
        );
        handle
    }

    pub fn set_field_value(&self, object: TargetHandle, field: TargetHandle, value: TargetValue) {
        if let Some(MockObject::Plain { fields, .. }) = self.state.lock().objects.get_mut(&object) {
            fields.insert(field, value);
        }
    }

    pub fn add_string(&self, value: &str) -> TargetHandle {
        let ty = self.type_named("Ljava/lang/String;");
        let handle = self.mint();
        self.state.lock().objects.insert(
            handle,
            MockObject::String {
                ty,
                value: value.to_owned(),
            },
        );
        handle
    }

    pub fn add_array(&self, array_type: TargetHandle, values: Vec<TargetValue>) -> TargetHandle {
        let handle = self.mint();
        self.state.lock().objects.insert(
            handle,
            MockObject::Array {
                ty: array_type,
                values,
            },
        );
        handle
    }

    /// The `java.lang.Class` instance reflecting `ty`.
    pub fn class_object(&self, ty: TargetHandle) -> TargetHandle {
        if let Some(existing) = self.state.lock().class_objects.get(&ty).copied() {
            return existing;
        }
        let class_ty = self.type_named("Ljava/lang/Class;");
        let handle = self.mint();
        let mut state = self.state.lock();
        state.objects.insert(
            handle,
            MockObject::ClassObject {
                ty: class_ty,
                reflected: ty,
            },
        );
        state.class_objects.insert(ty, handle);
        handle
    }

    /// Forget an entity, as the target's collector would.
    pub fn collect(&self, handle: TargetHandle) {
        let mut state = self.state.lock();
        state.objects.remove(&handle);
        state.frames.remove(&handle);
        state.fields.remove(&handle);
        state.methods.remove(&handle);
        if state.types.remove(&handle).is_some() {
            state.load_order.retain(|h| *h != handle);
            state.by_signature.retain(|_, h| *h != handle);
        }
    }

    pub fn kill(&self) {
        self.alive.store(false, Ordering::SeqCst);
    }

    /// Make the next collaborator call fail as broken.
    pub fn break_next_call(&self, message: &str) {
        *self.broken.lock() = Some(message.to_owned());
    }
}

impl TargetVm for MockVm {
    fn description(&self) -> VmDescription {
        VmDescription {
            description: "Nova mock VM".to_owned(),
            jdwp_major: 17,
            jdwp_minor: 0,
            vm_version: "17.0.0".to_owned(),
            vm_name: "Nova Mock".to_owned(),
        }
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    fn all_classes(&self) -> VmResult<Vec<TargetHandle>> {
        self.check()?;
        Ok(self.state.lock().load_order.clone())
    }

    fn type_facts(&self, ty: TargetHandle) -> VmResult<TypeFacts> {
        self.check()?;
        match self.state.lock().types.get(&ty) {
            Some(t) => Ok(t.facts.clone()),
            None => missing(ErrorCode::InvalidClass),
        }
    }

    fn fields(&self, ty: TargetHandle) -> VmResult<Vec<TargetHandle>> {
        self.check()?;
        match self.state.lock().types.get(&ty) {
            Some(t) => Ok(t.fields.clone()),
            None => missing(ErrorCode::InvalidClass),
        }
    }

    fn field_facts(&self, field: TargetHandle) -> VmResult<FieldFacts> {
        self.check()?;
        match self.state.lock().fields.get(&field) {
            Some(f) => Ok(f.clone()),
            None => missing(ErrorCode::InvalidFieldId),
        }
    }

    fn methods(&self, ty: TargetHandle) -> VmResult<Vec<TargetHandle>> {
        self.check()?;
        match self.state.lock().types.get(&ty) {
            Some(t) => Ok(t.methods.clone()),
            None => missing(ErrorCode::InvalidClass),
        }
    }

    fn method_facts(&self, method: TargetHandle) -> VmResult<MethodFacts> {
        self.check()?;
        match self.state.lock().methods.get(&method) {
            Some(m) => Ok(m.facts.clone()),
            None => missing(ErrorCode::InvalidMethodId),
        }
    }

    fn line_table(&self, method: TargetHandle) -> VmResult<LineTable> {
        self.check()?;
        match self.state.lock().methods.get(&method) {
            Some(MockMethod { lines: Some(t), .. }) => Ok(t.clone()),
            Some(_) => missing(ErrorCode::AbsentInformation),
            None => missing(ErrorCode::InvalidMethodId),
        }
    }

    fn variable_table(&self, method: TargetHandle) -> VmResult<VariableTable> {
        self.check()?;
        match self.state.lock().methods.get(&method) {
            Some(MockMethod {
                variables: Some(t), ..
            }) => Ok(t.clone()),
            Some(_) => missing(ErrorCode::AbsentInformation),
            None => missing(ErrorCode::InvalidMethodId),
        }
    }

    fn all_threads(&self) -> VmResult<Vec<TargetHandle>> {
        self.check()?;
        Ok(self.state.lock().thread_order.clone())
    }

    fn thread_facts(&self, thread: TargetHandle) -> VmResult<ThreadFacts> {
        self.check()?;
        match self.state.lock().threads.get(&thread) {
            Some(t) => Ok(t.facts.clone()),
            None => missing(ErrorCode::InvalidThread),
        }
    }

    fn top_level_thread_groups(&self) -> VmResult<Vec<TargetHandle>> {
        self.check()?;
        let state = self.state.lock();
        Ok(state
            .group_order
            .iter()
            .copied()
            .filter(|g| state.groups.get(g).is_some_and(|facts| facts.parent.is_none()))
            .collect())
    }

    fn thread_group_facts(&self, group: TargetHandle) -> VmResult<ThreadGroupFacts> {
        self.check()?;
        match self.state.lock().groups.get(&group) {
            Some(g) => Ok(g.clone()),
            None => missing(ErrorCode::InvalidThreadGroup),
        }
    }

    fn frames(&self, thread: TargetHandle) -> VmResult<Vec<FrameFacts>> {
        self.check()?;
        match self.state.lock().threads.get(&thread) {
            Some(t) => Ok(t.frames.clone()),
            None => missing(ErrorCode::InvalidThread),
        }
    }

    fn frame_value(&self, frame: TargetHandle, slot: i32, tag: Tag) -> VmResult<TargetValue> {
        self.check()?;
        let state = self.state.lock();
        let Some(f) = state.frames.get(&frame) else {
            return missing(ErrorCode::InvalidFrameId);
        };
        let Some(value) = f.locals.get(&slot).copied() else {
            return missing(ErrorCode::InvalidSlot);
        };
        let compatible = match (value, tag.entity_kind()) {
            (TargetValue::Reference { .. }, Some(_)) => true,
            (TargetValue::Reference { .. }, None) => false,
            (_, Some(_)) => false,
            (primitive, None) => {
                std::mem::discriminant(&primitive)
                    == std::mem::discriminant(&TargetValue::default_for(tag))
            }
        };
        if !compatible {
            return missing(ErrorCode::TypeMismatch);
        }
        Ok(value)
    }

    fn this_object(&self, frame: TargetHandle) -> VmResult<Option<TargetHandle>> {
        self.check()?;
        match self.state.lock().frames.get(&frame) {
            Some(f) => Ok(f.this),
            None => missing(ErrorCode::InvalidFrameId),
        }
    }

    fn object_type(&self, object: TargetHandle) -> VmResult<TargetHandle> {
        self.check()?;
        match self.state.lock().objects.get(&object) {
            Some(o) => Ok(o.ty()),
            None => missing(ErrorCode::InvalidObject),
        }
    }

    fn object_kind(&self, object: TargetHandle) -> VmResult<EntityKind> {
        self.check()?;
        if !self.state.lock().objects.contains_key(&object) {
            return missing(ErrorCode::InvalidObject);
        }
        Ok(self.kind_of(object))
    }

    fn field_value(&self, object: TargetHandle, field: TargetHandle) -> VmResult<TargetValue> {
        self.check()?;
        let state = self.state.lock();
        let Some(facts) = state.fields.get(&field) else {
            return missing(ErrorCode::InvalidFieldId);
        };
        match state.objects.get(&object) {
            Some(MockObject::Plain { fields, .. }) => Ok(fields.get(&field).copied().unwrap_or_else(
                || TargetValue::default_for(Tag::from_signature(&facts.signature).unwrap_or(Tag::Object)),
            )),
            Some(_) => missing(ErrorCode::InvalidFieldId),
            None => missing(ErrorCode::InvalidObject),
        }
    }

    fn string_value(&self, string: TargetHandle) -> VmResult<String> {
        self.check()?;
        match self.state.lock().objects.get(&string) {
            Some(MockObject::String { value, .. }) => Ok(value.clone()),
            _ => missing(ErrorCode::InvalidString),
        }
    }

    fn create_string(&self, value: &str) -> VmResult<TargetHandle> {
        self.check()?;
        Ok(self.add_string(value))
    }

    fn array_length(&self, array: TargetHandle) -> VmResult<usize> {
        self.check()?;
        match self.state.lock().objects.get(&array) {
            Some(MockObject::Array { values, .. }) => Ok(values.len()),
            _ => missing(ErrorCode::InvalidArray),
        }
    }

    fn array_values(
        &self,
        array: TargetHandle,
        first: usize,
        length: usize,
    ) -> VmResult<Vec<TargetValue>> {
        self.check()?;
        match self.state.lock().objects.get(&array) {
            Some(MockObject::Array { values, .. }) => {
                let end = first.checked_add(length).filter(|end| *end <= values.len());
                match end {
                    Some(end) => Ok(values[first..end].to_vec()),
                    None => missing(ErrorCode::InvalidLength),
                }
            }
            _ => missing(ErrorCode::InvalidArray),
        }
    }

    fn reflected_type(&self, class_object: TargetHandle) -> VmResult<TargetHandle> {
        self.check()?;
        match self.state.lock().objects.get(&class_object) {
            Some(MockObject::ClassObject { reflected, .. }) => Ok(*reflected),
            _ => missing(ErrorCode::InvalidObject),
        }
    }
}

impl MockVm {
    /// Runtime kind of an object handle, for building [`TargetValue`]s.
    pub fn kind_of(&self, handle: TargetHandle) -> EntityKind {
        match self.state.lock().objects.get(&handle) {
            Some(MockObject::String { .. }) => EntityKind::String,
            Some(MockObject::Array { .. }) => EntityKind::Array,
            Some(MockObject::ClassObject { .. }) => EntityKind::ClassObject,
            Some(MockObject::Thread { .. }) => EntityKind::Thread,
            _ => EntityKind::Object,
        }
    }

    /// Reference value for an existing object handle.
    pub fn value_of(&self, handle: TargetHandle) -> TargetValue {
        TargetValue::object(self.kind_of(handle), handle)
    }
}
