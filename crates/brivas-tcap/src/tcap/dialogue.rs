//! TCAP Dialogue Portion
//!
//! ```text
//! 6b L                                  dialogue portion
//!   28 L                                EXTERNAL
//!     06 07 00 11 86 05 01 <t> 01       dialogue-as-id / unidialogue-as-id
//!     a0 L                              single-ASN1-type
//!       60|61|64 L                      AARQ | AARE | ABRT
//! ```

use super::context;
use crate::asn1::{
    decode_oid, encode_oid, integer_ie, oid_to_string, Ie, Marshal, Tag, EXTERNAL, INTEGER,
    OBJECT_IDENTIFIER,
};
use crate::errors::{Result, TcapError};
use bytes::{BufMut, Bytes};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const DIALOGUE_PORTION_TAG: Tag = Tag::application_constructed(11);
const SINGLE_ASN1_TYPE_TAG: Tag = Tag::context_constructed(0);

pub const AARQ_TAG: Tag = Tag::application_constructed(0);
pub const AARE_TAG: Tag = Tag::application_constructed(1);
pub const ABRT_TAG: Tag = Tag::application_constructed(4);

const PROTOCOL_VERSION_TAG: Tag = Tag::context_primitive(0);
const APPLICATION_CONTEXT_TAG: Tag = Tag::context_constructed(1);
const RESULT_TAG: Tag = Tag::context_constructed(2);
const RESULT_SOURCE_DIAGNOSTIC_TAG: Tag = Tag::context_constructed(3);
const SERVICE_USER_TAG: Tag = Tag::context_constructed(1);
const SERVICE_PROVIDER_TAG: Tag = Tag::context_constructed(2);
const ABORT_SOURCE_TAG: Tag = Tag::context_primitive(0);
pub const USER_INFORMATION_TAG: Tag = Tag::context_constructed(30);

/// Protocol version 1 as BIT STRING contents (7 unused bits)
pub const PROTOCOL_VERSION_1: [u8; 2] = [0x07, 0x80];

/// `{itu-t recommendation q 773 as(1) <t> version1(1)}` without `<t>`
const DIALOGUE_OID_PREFIX: [u8; 5] = [0x00, 0x11, 0x86, 0x05, 0x01];

/// Dialogue abstract syntax
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum DialogueType {
    /// dialogue-as-id, for Begin/Continue/End/Abort
    Structured = 1,
    /// uniDialogue-as-id, for Unidirectional
    Unstructured = 2,
}

impl DialogueType {
    /// Encoded object identifier of the abstract syntax
    pub fn object_identifier(self) -> Bytes {
        let mut oid = DIALOGUE_OID_PREFIX.to_vec();
        oid.push(self as u8);
        oid.push(0x01);
        oid.into()
    }
}

/// Result of an association request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum AssociateResult {
    Accepted = 0,
    RejectPermanent = 1,
}

impl TryFrom<u8> for AssociateResult {
    type Error = TcapError;

    fn try_from(v: u8) -> Result<Self> {
        match v {
            0 => Ok(Self::Accepted),
            1 => Ok(Self::RejectPermanent),
            _ => Err(TcapError::InvalidValue(format!("associate result {}", v))),
        }
    }
}

/// Dialogue service-user diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum UserDiagnostic {
    Null = 0,
    NoReasonGiven = 1,
    ApplicationContextNameNotSupported = 2,
}

impl TryFrom<u8> for UserDiagnostic {
    type Error = TcapError;

    fn try_from(v: u8) -> Result<Self> {
        match v {
            0 => Ok(Self::Null),
            1 => Ok(Self::NoReasonGiven),
            2 => Ok(Self::ApplicationContextNameNotSupported),
            _ => Err(TcapError::InvalidValue(format!("service-user diagnostic {}", v))),
        }
    }
}

/// Dialogue service-provider diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ProviderDiagnostic {
    Null = 0,
    NoReasonGiven = 1,
    NoCommonDialoguePortion = 2,
}

impl TryFrom<u8> for ProviderDiagnostic {
    type Error = TcapError;

    fn try_from(v: u8) -> Result<Self> {
        match v {
            0 => Ok(Self::Null),
            1 => Ok(Self::NoReasonGiven),
            2 => Ok(Self::NoCommonDialoguePortion),
            _ => Err(TcapError::InvalidValue(format!(
                "service-provider diagnostic {}",
                v
            ))),
        }
    }
}

/// Result-source-diagnostic of an AARE
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceDiagnostic {
    ServiceUser(UserDiagnostic),
    ServiceProvider(ProviderDiagnostic),
}

impl SourceDiagnostic {
    fn to_ie(self) -> Ie {
        let (tag, value) = match self {
            Self::ServiceUser(d) => (SERVICE_USER_TAG, d as u8),
            Self::ServiceProvider(d) => (SERVICE_PROVIDER_TAG, d as u8),
        };
        Ie::constructed(
            RESULT_SOURCE_DIAGNOSTIC_TAG,
            vec![Ie::constructed(tag, vec![integer_ie(INTEGER, value as i64)])],
        )
    }

    fn from_ie(ie: &Ie) -> Result<Self> {
        let mut outer = ie.cursor();
        let source = outer
            .next()
            .ok_or(TcapError::MissingElement("result-source-diagnostic"))?;
        outer.finish("result-source-diagnostic")?;

        if source.tag == SERVICE_USER_TAG {
            let value = single_integer(source, "service-user diagnostic")?;
            Ok(Self::ServiceUser(UserDiagnostic::try_from(value)?))
        } else if source.tag == SERVICE_PROVIDER_TAG {
            let value = single_integer(source, "service-provider diagnostic")?;
            Ok(Self::ServiceProvider(ProviderDiagnostic::try_from(value)?))
        } else {
            Err(TcapError::UnexpectedTag {
                expected: SERVICE_USER_TAG,
                found: source.tag,
            })
        }
    }
}

/// Source of a dialogue abort
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum AbortSource {
    DialogueServiceUser = 0,
    DialogueServiceProvider = 1,
}

impl TryFrom<u8> for AbortSource {
    type Error = TcapError;

    fn try_from(v: u8) -> Result<Self> {
        match v {
            0 => Ok(Self::DialogueServiceUser),
            1 => Ok(Self::DialogueServiceProvider),
            _ => Err(TcapError::InvalidValue(format!("abort source {}", v))),
        }
    }
}

/// Application-context name, kept as encoded OID contents
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ApplicationContextName {
    pub oid: Bytes,
}

impl ApplicationContextName {
    /// MAP context `0.4.0.0.1.0.<context>.<version>`
    pub fn new(context: u8, version: u8) -> Self {
        let mut arcs = context::MAP_AC_PREFIX.to_vec();
        arcs.push(context as u32);
        arcs.push(version as u32);
        // MAP prefix arcs are always valid
        let oid = encode_oid(&arcs).unwrap_or_default();
        Self { oid: oid.into() }
    }

    pub fn from_arcs(arcs: &[u32]) -> Result<Self> {
        Ok(Self {
            oid: encode_oid(arcs)?.into(),
        })
    }

    /// Context identifier, the penultimate arc
    pub fn context_id(&self) -> Option<u8> {
        let arcs = decode_oid(&self.oid).ok()?;
        match arcs.as_slice() {
            [_, .., context, _] => u8::try_from(*context).ok(),
            _ => None,
        }
    }

    /// Context version, the last arc
    pub fn version(&self) -> Option<u8> {
        let arcs = decode_oid(&self.oid).ok()?;
        arcs.last().and_then(|v| u8::try_from(*v).ok())
    }

    /// MAP name of the context, or its identifier when unknown
    pub fn context(&self) -> String {
        match self.context_id() {
            Some(id) => context::context_name(id)
                .map(str::to_string)
                .unwrap_or_else(|| id.to_string()),
            None => String::new(),
        }
    }

    /// Dotted OID notation
    pub fn to_dotted(&self) -> Result<String> {
        oid_to_string(&self.oid)
    }

    fn to_ie(&self) -> Ie {
        Ie::constructed(
            APPLICATION_CONTEXT_TAG,
            vec![Ie::primitive(OBJECT_IDENTIFIER, self.oid.clone())],
        )
    }

    fn from_ie(ie: &Ie) -> Result<Self> {
        let mut cursor = ie.cursor();
        let oid = cursor.expect(OBJECT_IDENTIFIER, "application context name")?;
        cursor.finish("application context name")?;
        Ok(Self {
            oid: oid.primitive_value("application context name")?.clone(),
        })
    }
}

impl fmt::Display for ApplicationContextName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_dotted() {
            Ok(dotted) => f.write_str(&dotted),
            Err(_) => write!(f, "{:02x?}", self.oid.as_ref()),
        }
    }
}

/// Dialogue request (AARQ)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aarq {
    pub protocol_version: Option<Bytes>,
    pub application_context_name: ApplicationContextName,
    pub user_information: Option<Ie>,
}

impl Aarq {
    pub fn new(context: u8, version: u8) -> Self {
        Self {
            protocol_version: Some(Bytes::from_static(&PROTOCOL_VERSION_1)),
            application_context_name: ApplicationContextName::new(context, version),
            user_information: None,
        }
    }

    fn to_ie(&self) -> Ie {
        let mut children = Vec::with_capacity(3);
        if let Some(pv) = &self.protocol_version {
            children.push(Ie::primitive(PROTOCOL_VERSION_TAG, pv.clone()));
        }
        children.push(self.application_context_name.to_ie());
        children.extend(self.user_information.clone());
        Ie::constructed(AARQ_TAG, children)
    }

    fn from_ie(ie: &Ie) -> Result<Self> {
        let mut cursor = ie.cursor();
        let protocol_version = protocol_version(cursor.next_if(PROTOCOL_VERSION_TAG))?;
        let acn = cursor.expect(APPLICATION_CONTEXT_TAG, "application context name")?;
        let user_information = cursor.next_if(USER_INFORMATION_TAG).cloned();
        cursor.finish("AARQ")?;

        Ok(Self {
            protocol_version,
            application_context_name: ApplicationContextName::from_ie(acn)?,
            user_information,
        })
    }
}

/// Dialogue response (AARE)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aare {
    pub protocol_version: Option<Bytes>,
    pub application_context_name: ApplicationContextName,
    pub result: AssociateResult,
    pub diagnostic: SourceDiagnostic,
    pub user_information: Option<Ie>,
}

impl Aare {
    pub fn new(
        context: u8,
        version: u8,
        result: AssociateResult,
        diagnostic: SourceDiagnostic,
    ) -> Self {
        Self {
            protocol_version: Some(Bytes::from_static(&PROTOCOL_VERSION_1)),
            application_context_name: ApplicationContextName::new(context, version),
            result,
            diagnostic,
            user_information: None,
        }
    }

    /// Accepted by the service user with a null diagnostic
    pub fn accepted(context: u8, version: u8) -> Self {
        Self::new(
            context,
            version,
            AssociateResult::Accepted,
            SourceDiagnostic::ServiceUser(UserDiagnostic::Null),
        )
    }

    fn to_ie(&self) -> Ie {
        let mut children = Vec::with_capacity(5);
        if let Some(pv) = &self.protocol_version {
            children.push(Ie::primitive(PROTOCOL_VERSION_TAG, pv.clone()));
        }
        children.push(self.application_context_name.to_ie());
        children.push(Ie::constructed(
            RESULT_TAG,
            vec![integer_ie(INTEGER, self.result as i64)],
        ));
        children.push(self.diagnostic.to_ie());
        children.extend(self.user_information.clone());
        Ie::constructed(AARE_TAG, children)
    }

    fn from_ie(ie: &Ie) -> Result<Self> {
        let mut cursor = ie.cursor();
        let protocol_version = protocol_version(cursor.next_if(PROTOCOL_VERSION_TAG))?;
        let acn = cursor.expect(APPLICATION_CONTEXT_TAG, "application context name")?;
        let result = cursor.expect(RESULT_TAG, "associate result")?;
        let diagnostic = cursor.expect(RESULT_SOURCE_DIAGNOSTIC_TAG, "result-source-diagnostic")?;
        let user_information = cursor.next_if(USER_INFORMATION_TAG).cloned();
        cursor.finish("AARE")?;

        Ok(Self {
            protocol_version,
            application_context_name: ApplicationContextName::from_ie(acn)?,
            result: AssociateResult::try_from(single_integer(result, "associate result")?)?,
            diagnostic: SourceDiagnostic::from_ie(diagnostic)?,
            user_information,
        })
    }
}

/// Dialogue abort (ABRT)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Abrt {
    pub source: AbortSource,
    pub user_information: Option<Ie>,
}

impl Abrt {
    pub fn new(source: AbortSource) -> Self {
        Self {
            source,
            user_information: None,
        }
    }

    fn to_ie(&self) -> Ie {
        let mut children = vec![Ie::primitive(ABORT_SOURCE_TAG, vec![self.source as u8])];
        children.extend(self.user_information.clone());
        Ie::constructed(ABRT_TAG, children)
    }

    fn from_ie(ie: &Ie) -> Result<Self> {
        let mut cursor = ie.cursor();
        let source = cursor.expect(ABORT_SOURCE_TAG, "abort source")?;
        let user_information = cursor.next_if(USER_INFORMATION_TAG).cloned();
        cursor.finish("ABRT")?;

        Ok(Self {
            source: AbortSource::try_from(small_integer(source, "abort source")?)?,
            user_information,
        })
    }
}

/// Dialogue PDU carried in the single-ASN1-type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialoguePdu {
    Request(Aarq),
    Response(Aare),
    Abort(Abrt),
}

impl DialoguePdu {
    fn to_ie(&self) -> Ie {
        match self {
            Self::Request(aarq) => aarq.to_ie(),
            Self::Response(aare) => aare.to_ie(),
            Self::Abort(abrt) => abrt.to_ie(),
        }
    }

    fn from_ie(ie: &Ie) -> Result<Self> {
        if ie.tag == AARQ_TAG {
            Aarq::from_ie(ie).map(Self::Request)
        } else if ie.tag == AARE_TAG {
            Aare::from_ie(ie).map(Self::Response)
        } else if ie.tag == ABRT_TAG {
            Abrt::from_ie(ie).map(Self::Abort)
        } else {
            Err(TcapError::UnknownTag(ie.tag))
        }
    }

    pub fn application_context_name(&self) -> Option<&ApplicationContextName> {
        match self {
            Self::Request(aarq) => Some(&aarq.application_context_name),
            Self::Response(aare) => Some(&aare.application_context_name),
            Self::Abort(_) => None,
        }
    }
}

/// Dialogue Portion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dialogue {
    /// Encoded object identifier of the dialogue abstract syntax
    pub object_identifier: Bytes,
    pub pdu: DialoguePdu,
}

impl Dialogue {
    pub fn new(dialogue_type: DialogueType, pdu: DialoguePdu) -> Self {
        Self {
            object_identifier: dialogue_type.object_identifier(),
            pdu,
        }
    }

    /// Abstract syntax, `None` for an unrecognized object identifier
    pub fn dialogue_type(&self) -> Option<DialogueType> {
        [DialogueType::Structured, DialogueType::Unstructured]
            .into_iter()
            .find(|t| t.object_identifier() == self.object_identifier)
    }

    pub fn application_context_name(&self) -> Option<&ApplicationContextName> {
        self.pdu.application_context_name()
    }

    /// MAP context name, e.g. `shortMsgGatewayContext`
    pub fn context(&self) -> Option<String> {
        self.application_context_name().map(|acn| acn.context())
    }

    /// Context version digit
    pub fn context_version(&self) -> Option<u8> {
        self.application_context_name().and_then(|acn| acn.version())
    }

    /// Refresh the cached length of edited user information
    pub(crate) fn set_length(&mut self) {
        let user_information = match &mut self.pdu {
            DialoguePdu::Request(aarq) => aarq.user_information.as_mut(),
            DialoguePdu::Response(aare) => aare.user_information.as_mut(),
            DialoguePdu::Abort(abrt) => abrt.user_information.as_mut(),
        };
        if let Some(ie) = user_information {
            ie.set_length();
        }
    }

    pub fn to_ie(&self) -> Ie {
        let external = Ie::constructed(
            EXTERNAL,
            vec![
                Ie::primitive(OBJECT_IDENTIFIER, self.object_identifier.clone()),
                Ie::constructed(SINGLE_ASN1_TYPE_TAG, vec![self.pdu.to_ie()]),
            ],
        );
        Ie::constructed(DIALOGUE_PORTION_TAG, vec![external])
    }

    /// Decode from a parsed `6b` element
    pub fn from_ie(ie: &Ie) -> Result<Self> {
        if ie.tag != DIALOGUE_PORTION_TAG {
            return Err(TcapError::UnexpectedTag {
                expected: DIALOGUE_PORTION_TAG,
                found: ie.tag,
            });
        }

        let mut portion = ie.cursor();
        let external = portion.expect(EXTERNAL, "external")?;
        portion.finish("dialogue portion")?;

        let mut fields = external.cursor();
        let oid = fields.expect(OBJECT_IDENTIFIER, "dialogue object identifier")?;
        let single = fields.expect(SINGLE_ASN1_TYPE_TAG, "single-ASN1-type")?;
        fields.finish("external")?;

        let mut content = single.cursor();
        let pdu = content.next().ok_or(TcapError::MissingElement("dialogue pdu"))?;
        content.finish("single-ASN1-type")?;

        Ok(Self {
            object_identifier: oid.primitive_value("dialogue object identifier")?.clone(),
            pdu: DialoguePdu::from_ie(pdu)?,
        })
    }

    /// Parse the portion at the front of `data`, returning it with its size
    pub fn parse_prefix(data: &[u8], max_depth: usize) -> Result<(Self, usize)> {
        let (ie, used) = Ie::parse_with(data, max_depth)?;
        Ok((Self::from_ie(&ie)?, used))
    }
}

impl Marshal for Dialogue {
    fn marshal_len(&self) -> usize {
        self.to_ie().marshal_len()
    }

    fn write_to<B: BufMut>(&self, buf: &mut B) -> Result<()> {
        self.to_ie().write_to(buf)
    }
}

fn protocol_version(ie: Option<&Ie>) -> Result<Option<Bytes>> {
    ie.map(|ie| ie.primitive_value("protocol version").cloned())
        .transpose()
}

/// A constructed element wrapping exactly one small INTEGER
fn single_integer(ie: &Ie, what: &'static str) -> Result<u8> {
    let mut cursor = ie.cursor();
    let value = cursor.expect(INTEGER, what)?;
    cursor.finish(what)?;
    small_integer(value, what)
}

fn small_integer(ie: &Ie, what: &'static str) -> Result<u8> {
    let value = ie.integer(what)?;
    u8::try_from(value).map_err(|_| TcapError::InvalidValue(format!("{} {}", what, value)))
}
