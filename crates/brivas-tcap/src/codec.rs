//! TCAP codec entry point
//!
//! Wraps both decoders and the encoder with tracing spans and counters.
//! Nothing here prints; events go to whatever subscriber the host installs.

use crate::asn1::Marshal;
use crate::config::CodecConfig;
use crate::errors::{Result, TcapError};
use crate::tcap::TcapMessage;
use bytes::BytesMut;
use tracing::{debug, instrument, trace};

const PATH_STRUCTURED: &str = "structured";
const PATH_GENERIC: &str = "generic";

/// Configured TCAP encoder/decoder
#[derive(Debug, Clone, Default)]
pub struct TcapCodec {
    config: CodecConfig,
}

impl TcapCodec {
    /// Create codec with configuration
    pub fn new(config: CodecConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    /// Decode one message on the structured path
    #[instrument(skip_all, fields(len = data.len()))]
    pub fn decode(&self, data: &[u8]) -> Result<TcapMessage> {
        let result = TcapMessage::parse_with(data, &self.config);
        match &result {
            Ok(message) => {
                record_decoded(PATH_STRUCTURED, 1);
                debug!(summary = ?message.summary(), "Decoded TCAP message");
            }
            Err(e) => record_error(PATH_STRUCTURED, e),
        }
        result
    }

    /// Decode every message in `data` on the generic path
    #[instrument(skip_all, fields(len = data.len()))]
    pub fn decode_ber(&self, data: &[u8]) -> Result<Vec<TcapMessage>> {
        let result = TcapMessage::parse_ber_with(data, &self.config);
        match &result {
            Ok(messages) => {
                record_decoded(PATH_GENERIC, messages.len() as u64);
                for message in messages {
                    trace!(summary = ?message.summary(), "Decoded TCAP message");
                }
                debug!(count = messages.len(), "Decoded BER buffer");
            }
            Err(e) => record_error(PATH_GENERIC, e),
        }
        result
    }

    /// Encode a message into a new buffer
    #[instrument(skip_all, fields(message_type = %message.message_type()))]
    pub fn encode(&self, message: &TcapMessage) -> Result<BytesMut> {
        let buf = message.marshal()?;
        metrics::counter!("tcap_messages_encoded_total").increment(1);
        debug!(len = buf.len(), "Encoded TCAP message");
        Ok(buf)
    }

    /// Encode into a caller buffer, returning the bytes written
    #[instrument(skip_all, fields(message_type = %message.message_type(), capacity = dst.len()))]
    pub fn encode_to(&self, message: &TcapMessage, dst: &mut [u8]) -> Result<usize> {
        let written = message.marshal_to(dst)?;
        metrics::counter!("tcap_messages_encoded_total").increment(1);
        debug!(len = written, "Encoded TCAP message");
        Ok(written)
    }
}

fn record_decoded(path: &'static str, count: u64) {
    metrics::counter!("tcap_messages_decoded_total", "path" => path).increment(count);
}

fn record_error(path: &'static str, error: &TcapError) {
    metrics::counter!("tcap_decode_errors_total", "path" => path, "kind" => error.kind())
        .increment(1);
    debug!(%error, path, "Failed to decode TCAP message");
}
