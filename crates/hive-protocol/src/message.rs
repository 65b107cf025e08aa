//! Message types for the registry protocol
//!
//! High-level messages exchanged between worker processes and the
//! shared-object registry. Messages are serialized into frames using the
//! codec defined in `codec.rs`.
//!
//! # Message Flow
//!
//! 1. Client connects and sends `Hello` with the per-run auth token
//! 2. Server responds with `HelloAck`; a rejected handshake closes the
//!    connection
//! 3. Client invokes operations on shared objects via `Invoke`, addressed
//!    by accessor name; server answers with `Reply` or `Error`
//! 4. `ListAccessors` returns the published accessor table (used by the
//!    launcher to validate worker bindings before spawning)

use serde::{Deserialize, Serialize};
use std::fmt;

/// Message type identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    /// Authentication handshake (client -> server)
    Hello = 0x01,
    /// Handshake acknowledgment
    HelloAck = 0x02,
    /// Operation on a shared object
    Invoke = 0x03,
    /// Request the accessor table
    ListAccessors = 0x04,
    /// Accessor table response
    Accessors = 0x05,
    /// Successful operation result
    Reply = 0x06,
    /// Error response
    Error = 0xFF,
}

impl MessageType {
    /// Convert to u8
    pub fn as_u8(&self) -> u8 {
        *self as u8
    }

    /// Convert from u8
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x01 => Some(Self::Hello),
            0x02 => Some(Self::HelloAck),
            0x03 => Some(Self::Invoke),
            0x04 => Some(Self::ListAccessors),
            0x05 => Some(Self::Accessors),
            0x06 => Some(Self::Reply),
            0xFF => Some(Self::Error),
            _ => None,
        }
    }
}

/// A value stored in a shared queue.
///
/// The coordination protocol only ever moves two shapes of data through
/// the queue: candidate ports (integers) and the public tunnel URL
/// (text).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Value {
    /// Integer value (ports, counts)
    Int(i64),
    /// Text value (URLs)
    Text(String),
}

impl Value {
    /// Interpret the value as an integer, if it is one
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            Value::Text(_) => None,
        }
    }

    /// Interpret the value as text, if it is text
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Int(_) => None,
            Value::Text(s) => Some(s),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{}", n),
            Value::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<u16> for Value {
    fn from(port: u16) -> Self {
        Value::Int(port as i64)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

/// Kind of a shared object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    /// Poll-acquired mutual-exclusion lock
    Lock,
    /// Manual-reset event
    Event,
    /// Counting-barrier queue
    Queue,
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectKind::Lock => write!(f, "lock"),
            ObjectKind::Event => write!(f, "event"),
            ObjectKind::Queue => write!(f, "queue"),
        }
    }
}

/// An operation on a shared object.
///
/// Which operations are valid depends on the object's kind; a mismatch is
/// answered with `ErrorCode::WrongKind`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ObjectOp {
    // Lock
    /// Attempt to take the lock; replies `Bool(acquired)`
    TryAcquire,
    /// Release the lock
    Release,
    /// Whether the lock is currently held
    IsLocked,

    // Event
    /// Set the event flag
    Set,
    /// Clear the event flag
    Clear,
    /// Whether the event flag is set
    IsSet,

    // Queue
    /// Append `value` `times` times, mirroring into the counter
    Put { value: Value, times: u32 },
    /// Pop the front, or return the last-seen value when empty
    Get,
    /// Drain the queue and return the final element
    GetLast,
    /// Number of queued items
    Len,
    /// Start mirroring appends into the counter sub-queue
    AttachCounter,
    /// Stop mirroring and discard the counter
    DetachCounter,
    /// Drain the counter sub-queue
    ResetCounter,
    /// Snapshot of the counter sub-queue, without removal
    CounterItems,
}

impl ObjectOp {
    /// Stable operation name, for error reporting
    pub fn name(&self) -> &'static str {
        match self {
            ObjectOp::TryAcquire => "try_acquire",
            ObjectOp::Release => "release",
            ObjectOp::IsLocked => "is_locked",
            ObjectOp::Set => "set",
            ObjectOp::Clear => "clear",
            ObjectOp::IsSet => "is_set",
            ObjectOp::Put { .. } => "put",
            ObjectOp::Get => "get",
            ObjectOp::GetLast => "get_last",
            ObjectOp::Len => "len",
            ObjectOp::AttachCounter => "attach_counter",
            ObjectOp::DetachCounter => "detach_counter",
            ObjectOp::ResetCounter => "reset_counter",
            ObjectOp::CounterItems => "counter_items",
        }
    }
}

/// Result of a successful object operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Reply {
    /// Operation completed, nothing to return
    Unit,
    /// Boolean result (try-acquire, is-set, ...)
    Bool(bool),
    /// A single optional value (get, get-last)
    Item(Option<Value>),
    /// A sequence of values (counter snapshot)
    Items(Vec<Value>),
    /// A count (queue length)
    Count(u64),
}

/// One published accessor: a named capability for one shared object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessorInfo {
    /// Accessor name workers bind against
    pub name: String,
    /// Kind of the object behind it
    pub kind: ObjectKind,
}

/// Error codes for error messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u16)]
pub enum ErrorCode {
    /// Unknown error
    Unknown = 0,
    /// No accessor published under that name
    UnknownAccessor = 1,
    /// Operation not valid for the object's kind
    WrongKind = 2,
    /// Handshake token did not match
    AuthenticationFailed = 3,
    /// Request received before a successful handshake
    AuthenticationRequired = 4,
    /// Malformed or out-of-sequence message
    InvalidMessage = 5,
}

/// Protocol messages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Message {
    /// Authentication handshake, first frame on every connection
    Hello {
        /// Per-run registry auth token (hex)
        token: String,
    },

    /// Handshake acknowledgment
    HelloAck {
        /// Whether the handshake was accepted
        accepted: bool,
        /// Reason if not accepted
        reason: Option<String>,
    },

    /// Invoke an operation on the object behind an accessor
    Invoke {
        /// Accessor name, as published by the registry
        accessor: String,
        /// Operation to perform
        op: ObjectOp,
    },

    /// Request the published accessor table
    ListAccessors,

    /// The published accessor table, in registration order
    Accessors(Vec<AccessorInfo>),

    /// Successful operation result
    Reply(Reply),

    /// Error response
    Error {
        /// Error code
        code: ErrorCode,
        /// Human-readable message
        message: String,
    },
}

impl Message {
    /// Get the message type for this message
    pub fn message_type(&self) -> MessageType {
        match self {
            Message::Hello { .. } => MessageType::Hello,
            Message::HelloAck { .. } => MessageType::HelloAck,
            Message::Invoke { .. } => MessageType::Invoke,
            Message::ListAccessors => MessageType::ListAccessors,
            Message::Accessors(_) => MessageType::Accessors,
            Message::Reply(_) => MessageType::Reply,
            Message::Error { .. } => MessageType::Error,
        }
    }
}
