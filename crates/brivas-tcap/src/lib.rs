//! # Brivas TCAP Codec
//!
//! Encoder and decoder for TCAP (Transaction Capabilities Application
//! Part) messages as carried over SS7/SIGTRAN:
//!
//! - **Transaction Portion** - Unidirectional, Begin, End, Continue, Abort
//! - **Dialogue Portion** - AARQ, AARE and ABRT dialogue PDUs
//! - **Component Portion** - Invoke, ReturnResult, ReturnError, Reject
//!
//! BER is handled directly by the [`asn1`] module, without an ASN.1
//! compiler. The codec works on byte buffers only; transport belongs to
//! the SCCP layer that feeds it.
//!
//! ## Example
//! ```rust
//! use brivas_tcap::{parse, marshal, MessageType, TcapMessage};
//!
//! let message = TcapMessage::begin_invoke(1, 1, 5, vec![0xAA]);
//! let encoded = marshal(&message)?;
//!
//! let decoded = parse(&encoded)?;
//! assert_eq!(decoded.message_type(), MessageType::Begin);
//! assert_eq!(decoded.otid().unwrap().to_string(), "00000001");
//! # Ok::<(), brivas_tcap::TcapError>(())
//! ```

pub mod asn1;
pub mod codec;
pub mod config;
pub mod errors;
pub mod tcap;

// Re-exports
pub use asn1::{Ie, Marshal, Tag};
pub use codec::TcapCodec;
pub use config::CodecConfig;
pub use errors::{Result, TcapError};
pub use tcap::{
    AbortCause, Component, ComponentType, Components, Dialogue, DialoguePdu, MessageType,
    OpCode, TcapMessage, TcapSummary, Transaction, TransactionId,
};

use bytes::BytesMut;

/// Protocol version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Structured decode with the default configuration
pub fn parse(data: &[u8]) -> Result<TcapMessage> {
    TcapMessage::parse(data)
}

/// Generic decode of every message in `data`
pub fn parse_ber(data: &[u8]) -> Result<Vec<TcapMessage>> {
    TcapMessage::parse_ber(data)
}

/// Encode a message
pub fn marshal(message: &TcapMessage) -> Result<BytesMut> {
    message.marshal()
}
