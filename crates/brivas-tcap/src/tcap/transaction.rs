//! TCAP Transaction Portion
//!
//! ```text
//! [type tag][length][otid 48 04 ..][dtid 49 04 ..][cause 4a 01 ..][payload]
//! ```
//! Which identifier fields are present is fixed by the message type, so
//! each type is its own variant. An Abort carries either a P-Abort cause or,
//! for a user abort, a dialogue portion after the DTID.

use crate::asn1::{decode_length, tlv_len, write_header, Ie, Marshal, Tag, TagClass};
use crate::errors::{Result, TcapError};
use bytes::{BufMut, Bytes};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const OTID_TAG: Tag = Tag::application_primitive(8);
pub const DTID_TAG: Tag = Tag::application_primitive(9);
pub const ABORT_CAUSE_TAG: Tag = Tag::application_primitive(10);

/// Encoded size of an OTID/DTID field
pub const TRANSACTION_ID_FIELD_LEN: usize = 6;
/// Encoded size of the P-Abort cause field
pub const ABORT_CAUSE_FIELD_LEN: usize = 3;

/// TCAP message types (application-class constructed tag numbers)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum MessageType {
    Unidirectional = 1,
    Begin = 2,
    End = 4,
    Continue = 5,
    Abort = 7,
}

impl MessageType {
    pub fn tag(self) -> Tag {
        Tag::application_constructed(self as u32)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Unidirectional => "Unidirectional",
            Self::Begin => "Begin",
            Self::End => "End",
            Self::Continue => "Continue",
            Self::Abort => "Abort",
        }
    }

    fn has_otid(self) -> bool {
        matches!(self, Self::Begin | Self::Continue)
    }

    fn has_dtid(self) -> bool {
        matches!(self, Self::End | Self::Continue | Self::Abort)
    }

}

impl TryFrom<Tag> for MessageType {
    type Error = TcapError;

    fn try_from(tag: Tag) -> Result<Self> {
        if tag.class() != TagClass::Application || !tag.is_constructed() {
            return Err(TcapError::UnknownTag(tag));
        }
        match tag.number() {
            1 => Ok(Self::Unidirectional),
            2 => Ok(Self::Begin),
            4 => Ok(Self::End),
            5 => Ok(Self::Continue),
            7 => Ok(Self::Abort),
            _ => Err(TcapError::UnknownTag(tag)),
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Transaction identifier, 4 octets big-endian on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TransactionId(pub u32);

impl TransactionId {
    /// Decode 1 to 4 big-endian octets
    pub fn from_slice(data: &[u8]) -> Result<Self> {
        if data.is_empty() || data.len() > 4 {
            return Err(TcapError::InvalidValue(format!(
                "transaction id of {} octets",
                data.len()
            )));
        }
        Ok(Self(data.iter().fold(0u32, |acc, &b| (acc << 8) | b as u32)))
    }

    fn to_ie(self, tag: Tag) -> Ie {
        Ie::primitive(tag, self.0.to_be_bytes().to_vec())
    }
}

impl From<u32> for TransactionId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08x}", self.0)
    }
}

/// P-Abort cause
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum AbortCause {
    UnrecognizedMessageType = 0,
    UnrecognizedTransactionId = 1,
    BadlyFormattedTransactionPortion = 2,
    IncorrectTransactionPortion = 3,
    ResourceLimitation = 4,
}

impl AbortCause {
    pub fn name(self) -> &'static str {
        match self {
            Self::UnrecognizedMessageType => "UnrecognizedMessageType",
            Self::UnrecognizedTransactionId => "UnrecognizedTransactionID",
            Self::BadlyFormattedTransactionPortion => "BadlyFormattedTransactionPortion",
            Self::IncorrectTransactionPortion => "IncorrectTransactionPortion",
            Self::ResourceLimitation => "ResourceLimitation",
        }
    }
}

impl TryFrom<u8> for AbortCause {
    type Error = TcapError;

    fn try_from(v: u8) -> Result<Self> {
        match v {
            0 => Ok(Self::UnrecognizedMessageType),
            1 => Ok(Self::UnrecognizedTransactionId),
            2 => Ok(Self::BadlyFormattedTransactionPortion),
            3 => Ok(Self::IncorrectTransactionPortion),
            4 => Ok(Self::ResourceLimitation),
            _ => Err(TcapError::InvalidValue(format!("abort cause {}", v))),
        }
    }
}

impl fmt::Display for AbortCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Transaction Portion
///
/// `payload` holds the bytes after the fixed fields that are not
/// otherwise interpreted. When the portion is part of a [`TcapMessage`]
/// the dialogue and components live beside it and only the residue stays
/// here.
///
/// [`TcapMessage`]: super::TcapMessage
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transaction {
    Unidirectional {
        payload: Bytes,
    },
    Begin {
        otid: TransactionId,
        payload: Bytes,
    },
    End {
        dtid: TransactionId,
        payload: Bytes,
    },
    Continue {
        otid: TransactionId,
        dtid: TransactionId,
        payload: Bytes,
    },
    /// P-Abort
    Abort {
        dtid: TransactionId,
        cause: AbortCause,
        payload: Bytes,
    },
    /// U-Abort; the payload usually holds a dialogue portion with an ABRT
    UserAbort {
        dtid: TransactionId,
        payload: Bytes,
    },
}

impl Transaction {
    pub fn new_unidirectional(payload: impl Into<Bytes>) -> Self {
        Self::Unidirectional {
            payload: payload.into(),
        }
    }

    pub fn new_begin(otid: u32, payload: impl Into<Bytes>) -> Self {
        Self::Begin {
            otid: otid.into(),
            payload: payload.into(),
        }
    }

    pub fn new_end(dtid: u32, payload: impl Into<Bytes>) -> Self {
        Self::End {
            dtid: dtid.into(),
            payload: payload.into(),
        }
    }

    pub fn new_continue(otid: u32, dtid: u32, payload: impl Into<Bytes>) -> Self {
        Self::Continue {
            otid: otid.into(),
            dtid: dtid.into(),
            payload: payload.into(),
        }
    }

    pub fn new_abort(dtid: u32, cause: AbortCause, payload: impl Into<Bytes>) -> Self {
        Self::Abort {
            dtid: dtid.into(),
            cause,
            payload: payload.into(),
        }
    }

    pub fn new_user_abort(dtid: u32, payload: impl Into<Bytes>) -> Self {
        Self::UserAbort {
            dtid: dtid.into(),
            payload: payload.into(),
        }
    }

    pub fn message_type(&self) -> MessageType {
        match self {
            Self::Unidirectional { .. } => MessageType::Unidirectional,
            Self::Begin { .. } => MessageType::Begin,
            Self::End { .. } => MessageType::End,
            Self::Continue { .. } => MessageType::Continue,
            Self::Abort { .. } | Self::UserAbort { .. } => MessageType::Abort,
        }
    }

    pub fn otid(&self) -> Option<TransactionId> {
        match self {
            Self::Begin { otid, .. } | Self::Continue { otid, .. } => Some(*otid),
            _ => None,
        }
    }

    pub fn dtid(&self) -> Option<TransactionId> {
        match self {
            Self::End { dtid, .. }
            | Self::Continue { dtid, .. }
            | Self::Abort { dtid, .. }
            | Self::UserAbort { dtid, .. } => Some(*dtid),
            _ => None,
        }
    }

    pub fn abort_cause(&self) -> Option<AbortCause> {
        match self {
            Self::Abort { cause, .. } => Some(*cause),
            _ => None,
        }
    }

    pub fn payload(&self) -> &Bytes {
        match self {
            Self::Unidirectional { payload }
            | Self::Begin { payload, .. }
            | Self::End { payload, .. }
            | Self::Continue { payload, .. }
            | Self::Abort { payload, .. }
            | Self::UserAbort { payload, .. } => payload,
        }
    }

    pub fn set_payload(&mut self, new: Bytes) {
        match self {
            Self::Unidirectional { payload }
            | Self::Begin { payload, .. }
            | Self::End { payload, .. }
            | Self::Continue { payload, .. }
            | Self::Abort { payload, .. }
            | Self::UserAbort { payload, .. } => *payload = new,
        }
    }

    /// Size of the identifier and cause fields present in this portion
    pub fn fields_len(&self) -> usize {
        let mut len = 0;
        if self.otid().is_some() {
            len += TRANSACTION_ID_FIELD_LEN;
        }
        if self.dtid().is_some() {
            len += TRANSACTION_ID_FIELD_LEN;
        }
        if self.abort_cause().is_some() {
            len += ABORT_CAUSE_FIELD_LEN;
        }
        len
    }

    /// Value of the length header: fields plus payload
    pub fn content_len(&self) -> usize {
        self.fields_len() + self.payload().len()
    }

    /// Write the fields in orig, dest, cause order
    pub(crate) fn write_fields<B: BufMut>(&self, buf: &mut B) -> Result<()> {
        if let Some(otid) = self.otid() {
            otid.to_ie(OTID_TAG).write_to(buf)?;
        }
        if let Some(dtid) = self.dtid() {
            dtid.to_ie(DTID_TAG).write_to(buf)?;
        }
        if let Some(cause) = self.abort_cause() {
            Ie::primitive(ABORT_CAUSE_TAG, vec![cause as u8]).write_to(buf)?;
        }
        Ok(())
    }

    /// Structured parse; trailing bytes after the declared length are ignored
    pub fn parse(data: &[u8]) -> Result<Self> {
        Self::parse_prefix(data).map(|(txn, _)| txn)
    }

    /// Structured parse, returning the portion with its encoded size
    ///
    /// Fields are read at the fixed positions their message type dictates.
    /// Every byte after them, up to the declared length, becomes `payload`.
    /// An Abort whose DTID is followed by anything but a cause field is a
    /// user abort.
    pub fn parse_prefix(data: &[u8]) -> Result<(Self, usize)> {
        let (tag, tag_len) = Tag::parse(data)?;
        let mt = MessageType::try_from(tag)?;
        let (length, len_len) = decode_length(&data[tag_len..])?;
        let header = tag_len + len_len;
        let end = header
            .checked_add(length)
            .ok_or(TcapError::LengthOverflow(len_len - 1))?;
        if data.len() < end {
            return Err(TcapError::truncated(end, data.len()));
        }

        let mut fields = FieldReader {
            body: &data[header..end],
            offset: 0,
        };

        let otid = if mt.has_otid() {
            Some(fields.transaction_id(OTID_TAG, "originating transaction id")?)
        } else {
            None
        };
        let dtid = if mt.has_dtid() {
            Some(fields.transaction_id(DTID_TAG, "destination transaction id")?)
        } else {
            None
        };
        let cause = if mt == MessageType::Abort && fields.next_is(ABORT_CAUSE_TAG) {
            Some(fields.abort_cause()?)
        } else {
            None
        };

        let payload = Bytes::copy_from_slice(fields.rest());
        let txn = Self::assemble(mt, otid, dtid, cause, payload)?;
        Ok((txn, end))
    }

    /// Rebuild a portion from fields classified out of a generic tree
    ///
    /// Required fields must be present and fields the type does not carry
    /// must be absent. An Abort without a cause becomes a user abort.
    pub(crate) fn assemble(
        mt: MessageType,
        otid: Option<TransactionId>,
        dtid: Option<TransactionId>,
        cause: Option<AbortCause>,
        payload: Bytes,
    ) -> Result<Self> {
        check_presence(mt, mt.has_otid(), otid.is_some(), "originating transaction id")?;
        check_presence(mt, mt.has_dtid(), dtid.is_some(), "destination transaction id")?;
        if mt != MessageType::Abort {
            check_presence(mt, false, cause.is_some(), "abort cause")?;
        }

        Ok(match (mt, otid, dtid, cause) {
            (MessageType::Begin, Some(otid), _, _) => Self::Begin { otid, payload },
            (MessageType::End, _, Some(dtid), _) => Self::End { dtid, payload },
            (MessageType::Continue, Some(otid), Some(dtid), _) => Self::Continue {
                otid,
                dtid,
                payload,
            },
            (MessageType::Abort, _, Some(dtid), Some(cause)) => Self::Abort {
                dtid,
                cause,
                payload,
            },
            (MessageType::Abort, _, Some(dtid), None) => Self::UserAbort { dtid, payload },
            _ => Self::Unidirectional { payload },
        })
    }
}

fn check_presence(
    mt: MessageType,
    required: bool,
    present: bool,
    what: &'static str,
) -> Result<()> {
    match (required, present) {
        (true, false) => Err(TcapError::MissingElement(what)),
        (false, true) => Err(TcapError::InvalidValue(format!(
            "{} not allowed in {}",
            what, mt
        ))),
        _ => Ok(()),
    }
}

impl Marshal for Transaction {
    fn marshal_len(&self) -> usize {
        tlv_len(self.message_type().tag(), self.content_len())
    }

    fn write_to<B: BufMut>(&self, buf: &mut B) -> Result<()> {
        write_header(buf, self.message_type().tag(), self.content_len())?;
        self.write_fields(buf)?;
        buf.put_slice(self.payload());
        Ok(())
    }
}

/// Sequential reader over the fixed fields of a transaction body
struct FieldReader<'a> {
    body: &'a [u8],
    offset: usize,
}

impl<'a> FieldReader<'a> {
    fn next_ie(&mut self, what: &'static str) -> Result<Ie> {
        let rest = &self.body[self.offset..];
        if rest.is_empty() {
            return Err(TcapError::MissingElement(what));
        }
        let (ie, used) = match Ie::parse_prefix(rest) {
            Err(TcapError::TruncatedInput { needed, .. }) => {
                return Err(TcapError::InconsistentLength {
                    declared: self.body.len(),
                    actual: self.offset + needed,
                })
            }
            other => other?,
        };
        self.offset += used;
        Ok(ie)
    }

    fn field(&mut self, tag: Tag, what: &'static str) -> Result<Ie> {
        let ie = self.next_ie(what)?;
        if ie.tag != tag {
            return Err(TcapError::UnexpectedTag {
                expected: tag,
                found: ie.tag,
            });
        }
        Ok(ie)
    }

    fn transaction_id(&mut self, tag: Tag, what: &'static str) -> Result<TransactionId> {
        let ie = self.field(tag, what)?;
        let value = ie.primitive_value(what)?;
        if value.len() != 4 {
            return Err(TcapError::InvalidValue(format!(
                "{} of {} octets",
                what,
                value.len()
            )));
        }
        TransactionId::from_slice(value)
    }

    fn next_is(&self, tag: Tag) -> bool {
        tag.octet().is_some() && self.rest().first().copied() == tag.octet()
    }

    fn abort_cause(&mut self) -> Result<AbortCause> {
        let ie = self.field(ABORT_CAUSE_TAG, "abort cause")?;
        parse_abort_cause(&ie)
    }

    fn rest(&self) -> &'a [u8] {
        &self.body[self.offset..]
    }
}

pub(crate) fn parse_abort_cause(ie: &Ie) -> Result<AbortCause> {
    match ie.primitive_value("abort cause")?.as_ref() {
        [v] => AbortCause::try_from(*v),
        other => Err(TcapError::InvalidValue(format!(
            "abort cause of {} octets",
            other.len()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_type_from_tag() {
        for (octet, mt) in [
            (0x61, MessageType::Unidirectional),
            (0x62, MessageType::Begin),
            (0x64, MessageType::End),
            (0x65, MessageType::Continue),
            (0x67, MessageType::Abort),
        ] {
            let (tag, _) = Tag::parse(&[octet]).unwrap();
            assert_eq!(MessageType::try_from(tag).unwrap(), mt);
            assert_eq!(mt.tag().octet(), Some(octet));
        }

        let (tag, _) = Tag::parse(&[0x63]).unwrap();
        assert_eq!(MessageType::try_from(tag), Err(TcapError::UnknownTag(tag)));
        // Primitive form of the Begin number
        let (tag, _) = Tag::parse(&[0x42]).unwrap();
        assert!(MessageType::try_from(tag).is_err());
    }

    #[test]
    fn test_presence_table() {
        let cases = [
            (Transaction::new_unidirectional(Bytes::new()), vec![0x61, 0x00]),
            (
                Transaction::new_begin(1, Bytes::new()),
                vec![0x62, 0x06, 0x48, 0x04, 0, 0, 0, 1],
            ),
            (
                Transaction::new_end(2, Bytes::new()),
                vec![0x64, 0x06, 0x49, 0x04, 0, 0, 0, 2],
            ),
            (
                Transaction::new_continue(1, 2, Bytes::new()),
                vec![0x65, 0x0C, 0x48, 0x04, 0, 0, 0, 1, 0x49, 0x04, 0, 0, 0, 2],
            ),
            (
                Transaction::new_abort(2, AbortCause::ResourceLimitation, Bytes::new()),
                vec![0x67, 0x09, 0x49, 0x04, 0, 0, 0, 2, 0x4A, 0x01, 0x04],
            ),
        ];

        for (txn, wire) in cases {
            let encoded = txn.marshal().unwrap();
            assert_eq!(&encoded[..], &wire[..], "{}", txn.message_type());
            assert_eq!(txn.marshal_len(), wire.len());
            assert_eq!(Transaction::parse(&encoded).unwrap(), txn);
        }
    }

    #[test]
    fn test_abort_scenario() {
        let txn = Transaction::new_abort(2, AbortCause::ResourceLimitation, Bytes::new());
        assert_eq!(txn.abort_cause().unwrap().to_string(), "ResourceLimitation");
        assert_eq!(txn.marshal_len(), 2 + 6 + 3);
        assert_eq!(txn.dtid().unwrap().to_string(), "00000002");
        assert!(txn.otid().is_none());
    }

    #[test]
    fn test_user_abort() {
        // DTID alone
        let data = [0x67, 0x06, 0x49, 0x04, 0, 0, 0, 2];
        let txn = Transaction::parse(&data).unwrap();
        assert_eq!(txn, Transaction::new_user_abort(2, Bytes::new()));
        assert_eq!(txn.message_type(), MessageType::Abort);
        assert_eq!(txn.dtid(), Some(TransactionId(2)));
        assert!(txn.abort_cause().is_none());
        assert_eq!(&txn.marshal().unwrap()[..], &data[..]);

        // DTID followed by a dialogue portion
        let data = [
            0x67, 0x0D, 0x49, 0x04, 0, 0, 0, 2, 0x6B, 0x05, 0x64, 0x03, 0x80, 0x01, 0x00,
        ];
        let txn = Transaction::parse(&data).unwrap();
        assert!(matches!(txn, Transaction::UserAbort { .. }));
        assert_eq!(txn.payload()[0], 0x6B);
        assert_eq!(txn.fields_len(), TRANSACTION_ID_FIELD_LEN);
        assert_eq!(&txn.marshal().unwrap()[..], &data[..]);
    }

    #[test]
    fn test_payload_after_fields() {
        let data = [0x62, 0x08, 0x48, 0x04, 0xDE, 0xAD, 0xBE, 0xEF, 0x01, 0x02];
        let txn = Transaction::parse(&data).unwrap();
        assert_eq!(txn.otid(), Some(TransactionId(0xDEADBEEF)));
        assert_eq!(txn.otid().unwrap().to_string(), "deadbeef");
        assert_eq!(txn.payload().as_ref(), &[0x01, 0x02]);
        assert_eq!(&txn.marshal().unwrap()[..], &data[..]);
    }

    #[test]
    fn test_long_form_length() {
        let txn = Transaction::new_begin(7, vec![0x55; 200]);
        let encoded = txn.marshal().unwrap();
        assert_eq!(&encoded[..3], &[0x62, 0x81, 206]);
        assert_eq!(encoded.len(), txn.marshal_len());

        let (parsed, used) = Transaction::parse_prefix(&encoded).unwrap();
        assert_eq!(used, encoded.len());
        assert_eq!(parsed, txn);
    }

    #[test]
    fn test_field_errors() {
        // Begin whose first field is a DTID
        assert!(matches!(
            Transaction::parse(&[0x62, 0x06, 0x49, 0x04, 0, 0, 0, 1]),
            Err(TcapError::UnexpectedTag { .. })
        ));
        // Begin with a 2-octet OTID
        assert!(matches!(
            Transaction::parse(&[0x62, 0x04, 0x48, 0x02, 0, 1]),
            Err(TcapError::InvalidValue(_))
        ));
        // Abort without its DTID
        assert_eq!(
            Transaction::parse(&[0x67, 0x00]),
            Err(TcapError::MissingElement("destination transaction id"))
        );
        // Cause outside the closed set
        assert!(matches!(
            Transaction::parse(&[0x67, 0x09, 0x49, 0x04, 0, 0, 0, 2, 0x4A, 0x01, 0x09]),
            Err(TcapError::InvalidValue(_))
        ));
        // OTID runs past the declared transaction length
        assert!(matches!(
            Transaction::parse(&[0x62, 0x04, 0x48, 0x04, 0, 0, 0, 1]),
            Err(TcapError::InconsistentLength { .. })
        ));
    }

    #[test]
    fn test_truncated_by_one_byte() {
        let encoded = Transaction::new_continue(1, 2, Bytes::new()).marshal().unwrap();
        let short = &encoded[..encoded.len() - 1];
        assert_eq!(
            Transaction::parse(short),
            Err(TcapError::TruncatedInput {
                needed: encoded.len(),
                available: short.len()
            })
        );
    }

    #[test]
    fn test_assemble_presence() {
        assert_eq!(
            Transaction::assemble(MessageType::Begin, None, None, None, Bytes::new()),
            Err(TcapError::MissingElement("originating transaction id"))
        );
        assert!(matches!(
            Transaction::assemble(
                MessageType::Begin,
                Some(TransactionId(1)),
                Some(TransactionId(2)),
                None,
                Bytes::new()
            ),
            Err(TcapError::InvalidValue(_))
        ));
        assert_eq!(
            Transaction::assemble(
                MessageType::Abort,
                None,
                Some(TransactionId(2)),
                None,
                Bytes::new()
            ),
            Ok(Transaction::new_user_abort(2, Bytes::new()))
        );
        assert!(matches!(
            Transaction::assemble(
                MessageType::End,
                None,
                Some(TransactionId(2)),
                Some(AbortCause::ResourceLimitation),
                Bytes::new()
            ),
            Err(TcapError::InvalidValue(_))
        ));
    }
}
