//! portcullis-protocol: Wire protocol for portcullis command sessions
//!
//! This crate defines the JSON message types exchanged over an admitted
//! command connection, and the newline-delimited codec that frames them
//! on the raw byte stream.

pub mod codec;
pub mod error;
pub mod message;

pub use codec::{LineCodec, MAX_LINE_BYTES};
pub use error::ProtocolError;
pub use message::{CommandMessage, ExecutionResult, ResponseMessage};
