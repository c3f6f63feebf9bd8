//! TCAP (Transaction Capabilities Application Part)
//!
//! ITU-T Q.771-Q.775 message codec. A [`TcapMessage`] is a Transaction
//! Portion with an optional Dialogue Portion and an optional Component
//! Portion nested in it.
//!
//! Two decoders produce the same tree: [`TcapMessage::parse`] reads fields
//! at the positions each message type fixes, and [`TcapMessage::parse_ber`]
//! parses a generic BER tree and sorts its children by tag.

mod components;
pub mod context;
mod dialogue;
mod transaction;

pub use components::{
    Component, ComponentType, Components, ErrorCode, OpCode, OperationResult, Problem,
    COMPONENT_PORTION_TAG,
};
pub use dialogue::{
    Aare, Aarq, Abrt, AbortSource, ApplicationContextName, AssociateResult, Dialogue,
    DialoguePdu, DialogueType, ProviderDiagnostic, SourceDiagnostic, UserDiagnostic,
    DIALOGUE_PORTION_TAG, PROTOCOL_VERSION_1,
};
pub use transaction::{
    AbortCause, MessageType, Transaction, TransactionId, ABORT_CAUSE_TAG, DTID_TAG, OTID_TAG,
};

use crate::asn1::{tlv_len, write_header, Ie, Marshal};
use crate::config::CodecConfig;
use crate::errors::{Result, TcapError};
use bytes::{BufMut, Bytes, BytesMut};
use serde::Serialize;

const DIALOGUE_PORTION_OCTET: u8 = 0x6B;
const COMPONENT_PORTION_OCTET: u8 = 0x6C;

/// TCAP Message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TcapMessage {
    pub transaction: Transaction,
    pub dialogue: Option<Dialogue>,
    pub components: Option<Components>,
}

/// Projection of a message for logging and comparison
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TcapSummary {
    pub message_type: MessageType,
    pub otid: Option<String>,
    pub dtid: Option<String>,
    pub abort_cause: Option<String>,
    pub application_context: Option<String>,
    pub application_context_oid: Option<String>,
    pub component_types: Vec<ComponentType>,
    pub invoke_ids: Vec<Option<i8>>,
    pub op_codes: Vec<Option<i64>>,
}

impl TcapMessage {
    pub fn new(transaction: Transaction) -> Self {
        Self {
            transaction,
            dialogue: None,
            components: None,
        }
    }

    pub fn with_dialogue(mut self, dialogue: Dialogue) -> Self {
        self.dialogue = Some(dialogue);
        self
    }

    pub fn with_components(mut self, components: Vec<Component>) -> Self {
        self.components = Some(Components::new(components));
        self
    }

    /// Begin carrying a single Invoke
    pub fn begin_invoke(
        otid: u32,
        invoke_id: i8,
        operation_code: impl Into<OpCode>,
        payload: impl Into<Bytes>,
    ) -> Self {
        Self::new(Transaction::new_begin(otid, Bytes::new())).with_components(vec![
            Component::new_invoke(invoke_id, None, operation_code, payload),
        ])
    }

    /// Begin carrying an AARQ and a single Invoke
    ///
    /// ```rust
    /// use brivas_tcap::tcap::context::id;
    /// use brivas_tcap::TcapMessage;
    ///
    /// let message = TcapMessage::begin_invoke_with_dialogue(
    ///     1,
    ///     id::SHORT_MSG_MO_RELAY,
    ///     3,
    ///     1,
    ///     46,
    ///     vec![0x00],
    /// );
    /// assert_eq!(
    ///     message.application_context_name_with_version().as_deref(),
    ///     Some("shortMsgMO-RelayContext-v3")
    /// );
    /// ```
    pub fn begin_invoke_with_dialogue(
        otid: u32,
        context: u8,
        version: u8,
        invoke_id: i8,
        operation_code: impl Into<OpCode>,
        payload: impl Into<Bytes>,
    ) -> Self {
        Self::begin_invoke(otid, invoke_id, operation_code, payload)
            .with_dialogue(request_dialogue(context, version))
    }

    pub fn continue_invoke(
        otid: u32,
        dtid: u32,
        invoke_id: i8,
        operation_code: impl Into<OpCode>,
        payload: impl Into<Bytes>,
    ) -> Self {
        Self::new(Transaction::new_continue(otid, dtid, Bytes::new())).with_components(vec![
            Component::new_invoke(invoke_id, None, operation_code, payload),
        ])
    }

    /// Continue carrying an accepting AARE and a single Invoke
    pub fn continue_invoke_with_dialogue(
        otid: u32,
        dtid: u32,
        context: u8,
        version: u8,
        invoke_id: i8,
        operation_code: impl Into<OpCode>,
        payload: impl Into<Bytes>,
    ) -> Self {
        Self::continue_invoke(otid, dtid, invoke_id, operation_code, payload)
            .with_dialogue(accepted_dialogue(context, version))
    }

    pub fn continue_return_result(
        otid: u32,
        dtid: u32,
        invoke_id: i8,
        operation_code: impl Into<OpCode>,
        payload: impl Into<Bytes>,
    ) -> Self {
        Self::new(Transaction::new_continue(otid, dtid, Bytes::new())).with_components(vec![
            Component::new_return_result(invoke_id, operation_code, true, payload),
        ])
    }

    /// End carrying an accepting AARE and a single Invoke
    pub fn end_invoke_with_dialogue(
        dtid: u32,
        context: u8,
        version: u8,
        invoke_id: i8,
        operation_code: impl Into<OpCode>,
        payload: impl Into<Bytes>,
    ) -> Self {
        Self::new(Transaction::new_end(dtid, Bytes::new()))
            .with_dialogue(accepted_dialogue(context, version))
            .with_components(vec![Component::new_invoke(
                invoke_id,
                None,
                operation_code,
                payload,
            )])
    }

    pub fn end_return_result(
        dtid: u32,
        invoke_id: i8,
        operation_code: impl Into<OpCode>,
        last: bool,
        payload: impl Into<Bytes>,
    ) -> Self {
        Self::new(Transaction::new_end(dtid, Bytes::new())).with_components(vec![
            Component::new_return_result(invoke_id, operation_code, last, payload),
        ])
    }

    pub fn end_return_result_with_dialogue(
        dtid: u32,
        context: u8,
        version: u8,
        invoke_id: i8,
        operation_code: impl Into<OpCode>,
        last: bool,
        payload: impl Into<Bytes>,
    ) -> Self {
        Self::end_return_result(dtid, invoke_id, operation_code, last, payload)
            .with_dialogue(accepted_dialogue(context, version))
    }

    pub fn end_return_error(
        dtid: u32,
        invoke_id: i8,
        error_code: impl Into<ErrorCode>,
        parameter: impl Into<Bytes>,
    ) -> Self {
        Self::new(Transaction::new_end(dtid, Bytes::new())).with_components(vec![
            Component::new_return_error(invoke_id, error_code, parameter),
        ])
    }

    pub fn end_return_error_with_dialogue(
        dtid: u32,
        context: u8,
        version: u8,
        invoke_id: i8,
        error_code: impl Into<ErrorCode>,
        parameter: impl Into<Bytes>,
    ) -> Self {
        Self::end_return_error(dtid, invoke_id, error_code, parameter)
            .with_dialogue(accepted_dialogue(context, version))
    }

    /// Unidirectional message; its dialogue uses the unidialogue syntax
    pub fn unidirectional(context: Option<(u8, u8)>, components: Vec<Component>) -> Self {
        let mut message =
            Self::new(Transaction::new_unidirectional(Bytes::new())).with_components(components);
        if let Some((context, version)) = context {
            message.dialogue = Some(Dialogue::new(
                DialogueType::Unstructured,
                DialoguePdu::Request(Aarq::new(context, version)),
            ));
        }
        message
    }

    /// P-Abort with no dialogue or components
    pub fn abort(dtid: u32, cause: AbortCause) -> Self {
        Self::new(Transaction::new_abort(dtid, cause, Bytes::new()))
    }

    /// U-Abort carrying an ABRT dialogue
    pub fn user_abort(dtid: u32, source: AbortSource) -> Self {
        Self::new(Transaction::new_user_abort(dtid, Bytes::new())).with_dialogue(Dialogue::new(
            DialogueType::Structured,
            DialoguePdu::Abort(Abrt::new(source)),
        ))
    }

    /// Structured parse with the default configuration
    pub fn parse(data: &[u8]) -> Result<Self> {
        Self::parse_with(data, &CodecConfig::default())
    }

    /// Structured parse
    ///
    /// After the Transaction Portion, the first payload octet decides what
    /// follows: `6b` a Dialogue (then Components if anything is left),
    /// `6c` Components only, anything else neither. Unconsumed bytes stay
    /// in the transaction payload.
    pub fn parse_with(data: &[u8], config: &CodecConfig) -> Result<Self> {
        let (mut transaction, used) = Transaction::parse_prefix(data)?;
        if config.strict_length && used != data.len() {
            return Err(TcapError::InconsistentLength {
                declared: used,
                actual: data.len(),
            });
        }

        // Portions sit one level below the transaction
        let depth = config.max_depth.saturating_sub(1);
        let payload = transaction.payload().clone();
        let mut rest: &[u8] = &payload;
        let mut dialogue = None;
        let mut components = None;

        match rest.first() {
            Some(&DIALOGUE_PORTION_OCTET) => {
                let (parsed, used) = Dialogue::parse_prefix(rest, depth)?;
                dialogue = Some(parsed);
                rest = &rest[used..];
                if !rest.is_empty() {
                    let (parsed, used) = Components::parse_prefix(rest, depth)?;
                    components = Some(parsed);
                    rest = &rest[used..];
                }
            }
            Some(&COMPONENT_PORTION_OCTET) => {
                let (parsed, used) = Components::parse_prefix(rest, depth)?;
                components = Some(parsed);
                rest = &rest[used..];
            }
            _ => {}
        }

        transaction.set_payload(payload.slice(payload.len() - rest.len()..));
        Ok(Self {
            transaction,
            dialogue,
            components,
        })
    }

    /// Generic parse of consecutive messages with the default configuration
    pub fn parse_ber(data: &[u8]) -> Result<Vec<Self>> {
        Self::parse_ber_with(data, &CodecConfig::default())
    }

    /// Generic parse of consecutive messages
    pub fn parse_ber_with(data: &[u8], config: &CodecConfig) -> Result<Vec<Self>> {
        Ie::parse_all_with(data, config.max_depth)?
            .iter()
            .map(Self::from_ie)
            .collect()
    }

    /// Rebuild a message from a generic tree
    ///
    /// Children are classified by tag wherever they appear. Elements that
    /// are not transaction fields or portions are re-encoded into the
    /// transaction payload. A repeated field keeps its last occurrence.
    pub fn from_ie(ie: &Ie) -> Result<Self> {
        let message_type = MessageType::try_from(ie.tag)?;
        let mut otid = None;
        let mut dtid = None;
        let mut cause = None;
        let mut dialogue = None;
        let mut components = None;
        let mut residual = BytesMut::new();

        for child in ie.children() {
            if child.tag == OTID_TAG {
                let value = child.primitive_value("originating transaction id")?;
                otid = Some(TransactionId::from_slice(value)?);
            } else if child.tag == DTID_TAG {
                let value = child.primitive_value("destination transaction id")?;
                dtid = Some(TransactionId::from_slice(value)?);
            } else if child.tag == ABORT_CAUSE_TAG {
                cause = Some(transaction::parse_abort_cause(child)?);
            } else if child.tag == DIALOGUE_PORTION_TAG {
                dialogue = Some(Dialogue::from_ie(child)?);
            } else if child.tag == COMPONENT_PORTION_TAG {
                components = Some(Components::from_ie(child)?);
            } else {
                child.write_to(&mut residual)?;
            }
        }

        let transaction =
            Transaction::assemble(message_type, otid, dtid, cause, residual.freeze())?;
        Ok(Self {
            transaction,
            dialogue,
            components,
        })
    }

    /// Get message type
    pub fn message_type(&self) -> MessageType {
        self.transaction.message_type()
    }

    pub fn otid(&self) -> Option<TransactionId> {
        self.transaction.otid()
    }

    pub fn dtid(&self) -> Option<TransactionId> {
        self.transaction.dtid()
    }

    pub fn abort_cause(&self) -> Option<AbortCause> {
        self.transaction.abort_cause()
    }

    fn application_context(&self) -> Option<&ApplicationContextName> {
        self.dialogue
            .as_ref()
            .and_then(|d| d.application_context_name())
    }

    /// Application context name, e.g. `shortMsgGatewayContext`
    pub fn application_context_name(&self) -> Option<String> {
        self.application_context().map(|acn| acn.context())
    }

    /// Application context name with its version, e.g. `shortMsgGatewayContext-v3`
    pub fn application_context_name_with_version(&self) -> Option<String> {
        let acn = self.application_context()?;
        let version = acn.version()?;
        Some(format!("{}-v{}", acn.context(), version))
    }

    /// Application context name in dotted OID form
    pub fn application_context_oid(&self) -> Option<String> {
        self.application_context()
            .and_then(|acn| acn.to_dotted().ok())
    }

    fn component_iter(&self) -> impl Iterator<Item = &Component> {
        self.components.iter().flat_map(|c| c.iter())
    }

    pub fn component_types(&self) -> Vec<ComponentType> {
        self.component_iter().map(Component::component_type).collect()
    }

    /// Invoke ID per component, `None` for a Reject without one
    pub fn invoke_ids(&self) -> Vec<Option<i8>> {
        self.component_iter().map(Component::invoke_id).collect()
    }

    /// Local operation code per component
    pub fn op_codes(&self) -> Vec<Option<i64>> {
        self.component_iter()
            .map(|c| c.operation_code().and_then(OpCode::local))
            .collect()
    }

    /// Parameter contents per component
    pub fn layer_payloads(&self) -> Vec<Option<Bytes>> {
        self.component_iter().map(Component::payload).collect()
    }

    pub fn summary(&self) -> TcapSummary {
        TcapSummary {
            message_type: self.message_type(),
            otid: self.otid().map(|id| id.to_string()),
            dtid: self.dtid().map(|id| id.to_string()),
            abort_cause: self.abort_cause().map(|c| c.to_string()),
            application_context: self.application_context_name_with_version(),
            application_context_oid: self.application_context_oid(),
            component_types: self.component_types(),
            invoke_ids: self.invoke_ids(),
            op_codes: self.op_codes(),
        }
    }

    /// Value of the transaction length header
    pub fn content_len(&self) -> usize {
        self.transaction.fields_len()
            + self.dialogue.as_ref().map_or(0, Marshal::marshal_len)
            + self.components.as_ref().map_or(0, Marshal::marshal_len)
            + self.transaction.payload().len()
    }

    /// Refresh the cached lengths of every element the message holds
    ///
    /// Portion lengths are computed on demand; this only updates the
    /// `length` fields of parameter and user-information elements after
    /// they were edited in place.
    pub fn set_length(&mut self) {
        if let Some(components) = &mut self.components {
            for component in components.components.iter_mut() {
                component.set_length();
            }
        }
        if let Some(dialogue) = &mut self.dialogue {
            dialogue.set_length();
        }
    }
}

impl Marshal for TcapMessage {
    fn marshal_len(&self) -> usize {
        tlv_len(self.message_type().tag(), self.content_len())
    }

    fn write_to<B: BufMut>(&self, buf: &mut B) -> Result<()> {
        write_header(buf, self.message_type().tag(), self.content_len())?;
        self.transaction.write_fields(buf)?;
        if let Some(dialogue) = &self.dialogue {
            dialogue.write_to(buf)?;
        }
        if let Some(components) = &self.components {
            components.write_to(buf)?;
        }
        buf.put_slice(self.transaction.payload());
        Ok(())
    }
}

fn request_dialogue(context: u8, version: u8) -> Dialogue {
    Dialogue::new(
        DialogueType::Structured,
        DialoguePdu::Request(Aarq::new(context, version)),
    )
}

fn accepted_dialogue(context: u8, version: u8) -> Dialogue {
    Dialogue::new(
        DialogueType::Structured,
        DialoguePdu::Response(Aare::accepted(context, version)),
    )
}
