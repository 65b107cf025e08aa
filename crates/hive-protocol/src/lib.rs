//! hive-protocol: Wire protocol for the hive shared-object registry
//!
//! This crate defines the binary protocol spoken between the registry
//! server (inside the coordinator process) and the worker processes that
//! hold remote handles to shared objects.

pub mod error;
pub mod frame;
pub mod message;
pub mod codec;
pub mod request;

pub use error::ProtocolError;
pub use frame::{FrameHeader, HEADER_SIZE, MAX_PAYLOAD_SIZE};
pub use message::{AccessorInfo, ErrorCode, Message, MessageType, ObjectKind, ObjectOp, Reply, Value};
pub use codec::{Frame, FrameCodec};
pub use request::RequestId;
