use std::{fmt, io};

use thiserror::Error;

use crate::wire::types::{EntityKind, Id};

/// JDWP error codes (subset used by the back-end).
///
/// Values are fixed by the protocol; debugger front ends match on them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum ErrorCode {
    None = 0,
    InvalidThread = 10,
    InvalidThreadGroup = 11,
    ThreadNotSuspended = 13,
    ThreadSuspended = 14,
    InvalidObject = 20,
    InvalidClass = 21,
    ClassNotPrepared = 22,
    InvalidMethodId = 23,
    InvalidLocation = 24,
    InvalidFieldId = 25,
    InvalidFrameId = 30,
    NoMoreFrames = 31,
    OpaqueFrame = 32,
    TypeMismatch = 34,
    InvalidSlot = 35,
    NotFound = 41,
    NotImplemented = 99,
    NullPointer = 100,
    AbsentInformation = 101,
    InvalidEventType = 102,
    IllegalArgument = 103,
    VmDead = 112,
    Internal = 113,
    InvalidTag = 500,
    InvalidIndex = 503,
    InvalidLength = 504,
    InvalidString = 506,
    InvalidClassLoader = 507,
    InvalidArray = 508,
    InvalidCount = 512,
}

impl ErrorCode {
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    pub fn from_u16(code: u16) -> Option<Self> {
        let code = match code {
            0 => ErrorCode::None,
            10 => ErrorCode::InvalidThread,
            11 => ErrorCode::InvalidThreadGroup,
            13 => ErrorCode::ThreadNotSuspended,
            14 => ErrorCode::ThreadSuspended,
            20 => ErrorCode::InvalidObject,
            21 => ErrorCode::InvalidClass,
            22 => ErrorCode::ClassNotPrepared,
            23 => ErrorCode::InvalidMethodId,
            24 => ErrorCode::InvalidLocation,
            25 => ErrorCode::InvalidFieldId,
            30 => ErrorCode::InvalidFrameId,
            31 => ErrorCode::NoMoreFrames,
            32 => ErrorCode::OpaqueFrame,
            34 => ErrorCode::TypeMismatch,
            35 => ErrorCode::InvalidSlot,
            41 => ErrorCode::NotFound,
            99 => ErrorCode::NotImplemented,
            100 => ErrorCode::NullPointer,
            101 => ErrorCode::AbsentInformation,
            102 => ErrorCode::InvalidEventType,
            103 => ErrorCode::IllegalArgument,
            112 => ErrorCode::VmDead,
            113 => ErrorCode::Internal,
            500 => ErrorCode::InvalidTag,
            503 => ErrorCode::InvalidIndex,
            504 => ErrorCode::InvalidLength,
            506 => ErrorCode::InvalidString,
            507 => ErrorCode::InvalidClassLoader,
            508 => ErrorCode::InvalidArray,
            512 => ErrorCode::InvalidCount,
            _ => return None,
        };
        Some(code)
    }

    pub fn name(self) -> &'static str {
        match self {
            ErrorCode::None => "NONE",
            ErrorCode::InvalidThread => "INVALID_THREAD",
            ErrorCode::InvalidThreadGroup => "INVALID_THREAD_GROUP",
            ErrorCode::ThreadNotSuspended => "THREAD_NOT_SUSPENDED",
            ErrorCode::ThreadSuspended => "THREAD_SUSPENDED",
            ErrorCode::InvalidObject => "INVALID_OBJECT",
            ErrorCode::InvalidClass => "INVALID_CLASS",
            ErrorCode::ClassNotPrepared => "CLASS_NOT_PREPARED",
            ErrorCode::InvalidMethodId => "INVALID_METHODID",
            ErrorCode::InvalidLocation => "INVALID_LOCATION",
            ErrorCode::InvalidFieldId => "INVALID_FIELDID",
            ErrorCode::InvalidFrameId => "INVALID_FRAMEID",
            ErrorCode::NoMoreFrames => "NO_MORE_FRAMES",
            ErrorCode::OpaqueFrame => "OPAQUE_FRAME",
            ErrorCode::TypeMismatch => "TYPE_MISMATCH",
            ErrorCode::InvalidSlot => "INVALID_SLOT",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::NotImplemented => "NOT_IMPLEMENTED",
            ErrorCode::NullPointer => "NULL_POINTER",
            ErrorCode::AbsentInformation => "ABSENT_INFORMATION",
            ErrorCode::InvalidEventType => "INVALID_EVENT_TYPE",
            ErrorCode::IllegalArgument => "ILLEGAL_ARGUMENT",
            ErrorCode::VmDead => "VM_DEAD",
            ErrorCode::Internal => "INTERNAL",
            ErrorCode::InvalidTag => "INVALID_TAG",
            ErrorCode::InvalidIndex => "INVALID_INDEX",
            ErrorCode::InvalidLength => "INVALID_LENGTH",
            ErrorCode::InvalidString => "INVALID_STRING",
            ErrorCode::InvalidClassLoader => "INVALID_CLASS_LOADER",
            ErrorCode::InvalidArray => "INVALID_ARRAY",
            ErrorCode::InvalidCount => "INVALID_COUNT",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.as_u16())
    }
}

/// Malformed command payloads.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("buffer underflow: need {needed} bytes at {pos}, have {len}")]
    Truncated { needed: usize, pos: usize, len: usize },
    #[error("unrecognized value tag {0:#04x}")]
    UnknownTag(u8),
    #[error("unrecognized type tag {0}")]
    UnknownTypeTag(u8),
    #[error("unrecognized event kind {0}")]
    UnknownEventKind(u8),
    #[error("unrecognized event modifier kind {0}")]
    UnknownModifier(u8),
    #[error("unrecognized suspend policy {0}")]
    UnknownSuspendPolicy(u8),
    #[error("invalid utf-8 string: {0}")]
    InvalidString(String),
    #[error("invalid length {0}")]
    InvalidLength(i64),
    #[error("count modifier must be positive, got {0}")]
    InvalidCount(i32),
}

impl DecodeError {
    pub fn error_code(&self) -> ErrorCode {
        match self {
            DecodeError::Truncated { .. } | DecodeError::UnknownModifier(_) => {
                ErrorCode::IllegalArgument
            }
            DecodeError::UnknownTag(_) => ErrorCode::InvalidTag,
            DecodeError::UnknownTypeTag(_) => ErrorCode::InvalidClass,
            DecodeError::UnknownEventKind(_) => ErrorCode::InvalidEventType,
            DecodeError::UnknownSuspendPolicy(_) => ErrorCode::IllegalArgument,
            DecodeError::InvalidString(_) => ErrorCode::InvalidString,
            DecodeError::InvalidLength(_) => ErrorCode::InvalidLength,
            DecodeError::InvalidCount(_) => ErrorCode::InvalidCount,
        }
    }
}

/// Failure reported by the target VM collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VmError {
    /// The target is in a state the protocol has an error code for.
    #[error("target reported {0}")]
    Reported(ErrorCode),
    /// The collaborator itself failed; never surfaced to the debugger as a code.
    #[error("target collaborator failure: {0}")]
    Broken(String),
}

impl From<ErrorCode> for VmError {
    fn from(code: ErrorCode) -> Self {
        VmError::Reported(code)
    }
}

pub type VmResult<T> = Result<T, VmError>;

/// Failure raised while executing a single command.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("invalid {kind} id {id}")]
    InvalidId { kind: EntityKind, id: Id },
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("vm state error: {0}")]
    Vm(ErrorCode),
    #[error("command {command_set}/{command} is not implemented")]
    NotImplemented { command_set: u8, command: u8 },
    #[error("internal back-end failure: {0}")]
    Internal(String),
}

impl CommandError {
    pub fn invalid(kind: EntityKind, id: Id) -> Self {
        CommandError::InvalidId { kind, id }
    }

    /// The reply code for this failure, or `None` when it must not be turned
    /// into a reply.
    pub fn error_code(&self) -> Option<ErrorCode> {
        match self {
            CommandError::InvalidId { kind, .. } => Some(kind.invalid_id_error()),
            CommandError::Decode(err) => Some(err.error_code()),
            CommandError::Vm(code) => Some(*code),
            CommandError::NotImplemented { .. } => Some(ErrorCode::NotImplemented),
            CommandError::Internal(_) => None,
        }
    }
}

impl From<VmError> for CommandError {
    fn from(err: VmError) -> Self {
        match err {
            VmError::Reported(code) => CommandError::Vm(code),
            VmError::Broken(message) => CommandError::Internal(message),
        }
    }
}

/// An unanticipated failure that terminates the command loop.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("internal back-end failure: {0}")]
pub struct InternalError(pub String);

/// Terminal outcome of the command loop.
#[derive(Debug, Error)]
pub enum ServeError {
    #[error("transport failure after {attempts} attempts: {source}")]
    Io {
        attempts: u32,
        #[source]
        source: io::Error,
    },
    #[error("malformed packet framing: {0}")]
    Protocol(String),
    #[error(transparent)]
    Internal(#[from] InternalError),
}
