//! TCAP Components

use crate::asn1::{
    integer_ie, Ie, Marshal, Tag, TagClass, INTEGER, NULL, OBJECT_IDENTIFIER, OCTET_STRING,
    SEQUENCE,
};
use crate::errors::{Result, TcapError};
use bytes::{BufMut, Bytes};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const COMPONENT_PORTION_TAG: Tag = Tag::application_constructed(12);
const LINKED_ID_TAG: Tag = Tag::context_primitive(0);

/// TCAP Component types (context-class constructed tag numbers)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ComponentType {
    Invoke = 1,
    ReturnResultLast = 2,
    ReturnError = 3,
    Reject = 4,
    ReturnResultNotLast = 7,
}

impl ComponentType {
    pub fn tag(self) -> Tag {
        Tag::context_constructed(self as u32)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Invoke => "Invoke",
            Self::ReturnResultLast => "ReturnResultLast",
            Self::ReturnError => "ReturnError",
            Self::Reject => "Reject",
            Self::ReturnResultNotLast => "ReturnResultNotLast",
        }
    }
}

impl TryFrom<Tag> for ComponentType {
    type Error = TcapError;

    fn try_from(tag: Tag) -> Result<Self> {
        if tag.class() != TagClass::ContextSpecific || !tag.is_constructed() {
            return Err(TcapError::UnknownTag(tag));
        }
        match tag.number() {
            1 => Ok(Self::Invoke),
            2 => Ok(Self::ReturnResultLast),
            3 => Ok(Self::ReturnError),
            4 => Ok(Self::Reject),
            7 => Ok(Self::ReturnResultNotLast),
            _ => Err(TcapError::UnknownTag(tag)),
        }
    }
}

impl fmt::Display for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Operation or error code
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OpCode {
    /// INTEGER
    Local(i64),
    /// OBJECT IDENTIFIER contents
    Global(Bytes),
}

/// Error codes share the operation code encoding
pub type ErrorCode = OpCode;

impl OpCode {
    pub fn is_local(&self) -> bool {
        matches!(self, Self::Local(_))
    }

    pub fn local(&self) -> Option<i64> {
        match self {
            Self::Local(code) => Some(*code),
            Self::Global(_) => None,
        }
    }

    fn to_ie(&self) -> Ie {
        match self {
            Self::Local(code) => integer_ie(INTEGER, *code),
            Self::Global(oid) => Ie::primitive(OBJECT_IDENTIFIER, oid.clone()),
        }
    }

    fn from_ie(ie: &Ie, what: &'static str) -> Result<Self> {
        if ie.tag == INTEGER {
            ie.integer(what).map(Self::Local)
        } else if ie.tag == OBJECT_IDENTIFIER {
            ie.primitive_value(what).cloned().map(Self::Global)
        } else {
            Err(TcapError::UnexpectedTag {
                expected: INTEGER,
                found: ie.tag,
            })
        }
    }
}

impl From<i64> for OpCode {
    fn from(code: i64) -> Self {
        Self::Local(code)
    }
}

impl From<i32> for OpCode {
    fn from(code: i32) -> Self {
        Self::Local(code as i64)
    }
}

/// Result carried by a ReturnResult
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationResult {
    pub operation_code: OpCode,
    pub parameter: Option<Ie>,
}

/// Reject problem, tagged by the kind of component it refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Problem {
    General(u8),
    Invoke(u8),
    ReturnResult(u8),
    ReturnError(u8),
}

impl Problem {
    fn to_ie(self) -> Ie {
        let (number, code) = match self {
            Self::General(c) => (0, c),
            Self::Invoke(c) => (1, c),
            Self::ReturnResult(c) => (2, c),
            Self::ReturnError(c) => (3, c),
        };
        integer_ie(Tag::context_primitive(number), code as i64)
    }

    fn from_ie(ie: &Ie) -> Result<Self> {
        if ie.tag.class() != TagClass::ContextSpecific || ie.tag.is_constructed() {
            return Err(TcapError::UnexpectedTag {
                expected: Tag::context_primitive(0),
                found: ie.tag,
            });
        }
        let value = ie.integer("problem")?;
        let code = u8::try_from(value)
            .map_err(|_| TcapError::InvalidValue(format!("problem code {}", value)))?;
        match ie.tag.number() {
            0 => Ok(Self::General(code)),
            1 => Ok(Self::Invoke(code)),
            2 => Ok(Self::ReturnResult(code)),
            3 => Ok(Self::ReturnError(code)),
            _ => Err(TcapError::UnknownTag(ie.tag)),
        }
    }
}

/// TCAP Component
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Component {
    Invoke {
        invoke_id: i8,
        linked_id: Option<i8>,
        operation_code: OpCode,
        parameter: Option<Ie>,
    },
    ReturnResultLast {
        invoke_id: i8,
        result: Option<OperationResult>,
    },
    ReturnResultNotLast {
        invoke_id: i8,
        result: Option<OperationResult>,
    },
    ReturnError {
        invoke_id: i8,
        error_code: ErrorCode,
        parameter: Option<Ie>,
    },
    Reject {
        /// `None` encodes as NULL when the invoke ID is not derivable
        invoke_id: Option<i8>,
        problem: Problem,
    },
}

/// Wrap opaque bytes as an OCTET STRING parameter; empty means none
fn parameter_from(payload: Bytes) -> Option<Ie> {
    if payload.is_empty() {
        None
    } else {
        Some(Ie::primitive(OCTET_STRING, payload))
    }
}

impl Component {
    pub fn new_invoke(
        invoke_id: i8,
        linked_id: Option<i8>,
        operation_code: impl Into<OpCode>,
        payload: impl Into<Bytes>,
    ) -> Self {
        Self::Invoke {
            invoke_id,
            linked_id,
            operation_code: operation_code.into(),
            parameter: parameter_from(payload.into()),
        }
    }

    pub fn new_return_result(
        invoke_id: i8,
        operation_code: impl Into<OpCode>,
        last: bool,
        payload: impl Into<Bytes>,
    ) -> Self {
        let result = Some(OperationResult {
            operation_code: operation_code.into(),
            parameter: parameter_from(payload.into()),
        });
        if last {
            Self::ReturnResultLast { invoke_id, result }
        } else {
            Self::ReturnResultNotLast { invoke_id, result }
        }
    }

    pub fn new_return_error(
        invoke_id: i8,
        error_code: impl Into<ErrorCode>,
        payload: impl Into<Bytes>,
    ) -> Self {
        Self::ReturnError {
            invoke_id,
            error_code: error_code.into(),
            parameter: parameter_from(payload.into()),
        }
    }

    pub fn new_reject(invoke_id: Option<i8>, problem: Problem) -> Self {
        Self::Reject { invoke_id, problem }
    }

    pub fn component_type(&self) -> ComponentType {
        match self {
            Self::Invoke { .. } => ComponentType::Invoke,
            Self::ReturnResultLast { .. } => ComponentType::ReturnResultLast,
            Self::ReturnResultNotLast { .. } => ComponentType::ReturnResultNotLast,
            Self::ReturnError { .. } => ComponentType::ReturnError,
            Self::Reject { .. } => ComponentType::Reject,
        }
    }

    /// Get invoke ID
    pub fn invoke_id(&self) -> Option<i8> {
        match self {
            Self::Invoke { invoke_id, .. }
            | Self::ReturnResultLast { invoke_id, .. }
            | Self::ReturnResultNotLast { invoke_id, .. }
            | Self::ReturnError { invoke_id, .. } => Some(*invoke_id),
            Self::Reject { invoke_id, .. } => *invoke_id,
        }
    }

    /// Operation code of an Invoke or of a ReturnResult's result
    pub fn operation_code(&self) -> Option<&OpCode> {
        match self {
            Self::Invoke { operation_code, .. } => Some(operation_code),
            Self::ReturnResultLast { result, .. } | Self::ReturnResultNotLast { result, .. } => {
                result.as_ref().map(|r| &r.operation_code)
            }
            _ => None,
        }
    }

    pub fn error_code(&self) -> Option<&ErrorCode> {
        match self {
            Self::ReturnError { error_code, .. } => Some(error_code),
            _ => None,
        }
    }

    pub fn parameter(&self) -> Option<&Ie> {
        match self {
            Self::Invoke { parameter, .. } | Self::ReturnError { parameter, .. } => {
                parameter.as_ref()
            }
            Self::ReturnResultLast { result, .. } | Self::ReturnResultNotLast { result, .. } => {
                result.as_ref().and_then(|r| r.parameter.as_ref())
            }
            Self::Reject { .. } => None,
        }
    }

    /// Contents of the parameter element
    pub fn payload(&self) -> Option<Bytes> {
        self.parameter().and_then(|p| p.content().ok())
    }

    /// Refresh the cached length of an edited parameter
    pub(crate) fn set_length(&mut self) {
        let parameter = match self {
            Self::Invoke { parameter, .. } | Self::ReturnError { parameter, .. } => {
                parameter.as_mut()
            }
            Self::ReturnResultLast { result, .. } | Self::ReturnResultNotLast { result, .. } => {
                result.as_mut().and_then(|r| r.parameter.as_mut())
            }
            Self::Reject { .. } => None,
        };
        if let Some(parameter) = parameter {
            parameter.set_length();
        }
    }

    pub fn to_ie(&self) -> Ie {
        let mut children = Vec::with_capacity(4);

        match self {
            Self::Invoke {
                invoke_id,
                linked_id,
                operation_code,
                parameter,
            } => {
                children.push(integer_ie(INTEGER, *invoke_id as i64));
                if let Some(lid) = linked_id {
                    children.push(integer_ie(LINKED_ID_TAG, *lid as i64));
                }
                children.push(operation_code.to_ie());
                children.extend(parameter.clone());
            }
            Self::ReturnResultLast { invoke_id, result }
            | Self::ReturnResultNotLast { invoke_id, result } => {
                children.push(integer_ie(INTEGER, *invoke_id as i64));
                if let Some(result) = result {
                    let mut sequence = vec![result.operation_code.to_ie()];
                    sequence.extend(result.parameter.clone());
                    children.push(Ie::constructed(SEQUENCE, sequence));
                }
            }
            Self::ReturnError {
                invoke_id,
                error_code,
                parameter,
            } => {
                children.push(integer_ie(INTEGER, *invoke_id as i64));
                children.push(error_code.to_ie());
                children.extend(parameter.clone());
            }
            Self::Reject { invoke_id, problem } => {
                children.push(match invoke_id {
                    Some(iid) => integer_ie(INTEGER, *iid as i64),
                    None => Ie::primitive(NULL, Bytes::new()),
                });
                children.push(problem.to_ie());
            }
        }

        Ie::constructed(self.component_type().tag(), children)
    }

    /// Decode component from a parsed element
    pub fn from_ie(ie: &Ie) -> Result<Self> {
        let component_type = ComponentType::try_from(ie.tag)?;
        let mut cursor = ie.cursor();

        let component = match component_type {
            ComponentType::Invoke => {
                let invoke_id = parse_invoke_id(cursor.expect(INTEGER, "invoke id")?)?;
                let linked_id = cursor.next_if(LINKED_ID_TAG).map(parse_invoke_id).transpose()?;
                let op = cursor.next().ok_or(TcapError::MissingElement("operation code"))?;
                Self::Invoke {
                    invoke_id,
                    linked_id,
                    operation_code: OpCode::from_ie(op, "operation code")?,
                    parameter: cursor.next().cloned(),
                }
            }
            ComponentType::ReturnResultLast | ComponentType::ReturnResultNotLast => {
                let invoke_id = parse_invoke_id(cursor.expect(INTEGER, "invoke id")?)?;
                let result = cursor.next_if(SEQUENCE).map(operation_result).transpose()?;
                if component_type == ComponentType::ReturnResultLast {
                    Self::ReturnResultLast { invoke_id, result }
                } else {
                    Self::ReturnResultNotLast { invoke_id, result }
                }
            }
            ComponentType::ReturnError => {
                let invoke_id = parse_invoke_id(cursor.expect(INTEGER, "invoke id")?)?;
                let err = cursor.next().ok_or(TcapError::MissingElement("error code"))?;
                Self::ReturnError {
                    invoke_id,
                    error_code: OpCode::from_ie(err, "error code")?,
                    parameter: cursor.next().cloned(),
                }
            }
            ComponentType::Reject => {
                let id = cursor.next().ok_or(TcapError::MissingElement("invoke id"))?;
                let invoke_id = if id.tag == NULL {
                    None
                } else if id.tag == INTEGER {
                    Some(parse_invoke_id(id)?)
                } else {
                    return Err(TcapError::UnexpectedTag {
                        expected: INTEGER,
                        found: id.tag,
                    });
                };
                let problem = cursor.next().ok_or(TcapError::MissingElement("problem"))?;
                Self::Reject {
                    invoke_id,
                    problem: Problem::from_ie(problem)?,
                }
            }
        };

        cursor.finish(component_type.name())?;
        Ok(component)
    }
}

impl Marshal for Component {
    fn marshal_len(&self) -> usize {
        self.to_ie().marshal_len()
    }

    fn write_to<B: BufMut>(&self, buf: &mut B) -> Result<()> {
        self.to_ie().write_to(buf)
    }
}

fn parse_invoke_id(ie: &Ie) -> Result<i8> {
    let value = ie.integer("invoke id")?;
    i8::try_from(value).map_err(|_| TcapError::InvalidValue(format!("invoke id {}", value)))
}

fn operation_result(ie: &Ie) -> Result<OperationResult> {
    let mut cursor = ie.cursor();
    let op = cursor.next().ok_or(TcapError::MissingElement("operation code"))?;
    let operation_code = OpCode::from_ie(op, "operation code")?;
    let parameter = cursor.next().cloned();
    cursor.finish("result")?;
    Ok(OperationResult {
        operation_code,
        parameter,
    })
}

/// Component Portion
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Components {
    pub components: Vec<Component>,
}

impl Components {
    pub fn new(components: Vec<Component>) -> Self {
        Self { components }
    }

    pub fn push(&mut self, component: Component) {
        self.components.push(component);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Component> {
        self.components.iter()
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn to_ie(&self) -> Ie {
        Ie::constructed(
            COMPONENT_PORTION_TAG,
            self.components.iter().map(Component::to_ie).collect(),
        )
    }

    /// Decode from a parsed `6c` element
    pub fn from_ie(ie: &Ie) -> Result<Self> {
        if ie.tag != COMPONENT_PORTION_TAG {
            return Err(TcapError::UnexpectedTag {
                expected: COMPONENT_PORTION_TAG,
                found: ie.tag,
            });
        }
        let components = ie
            .children()
            .iter()
            .map(Component::from_ie)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { components })
    }

    /// Parse the portion at the front of `data`, returning it with its size
    pub fn parse_prefix(data: &[u8], max_depth: usize) -> Result<(Self, usize)> {
        let (ie, used) = Ie::parse_with(data, max_depth)?;
        Ok((Self::from_ie(&ie)?, used))
    }
}

impl Marshal for Components {
    fn marshal_len(&self) -> usize {
        self.to_ie().marshal_len()
    }

    fn write_to<B: BufMut>(&self, buf: &mut B) -> Result<()> {
        self.to_ie().write_to(buf)
    }
}

impl<'a> IntoIterator for &'a Components {
    type Item = &'a Component;
    type IntoIter = std::slice::Iter<'a, Component>;

    fn into_iter(self) -> Self::IntoIter {
        self.components.iter()
    }
}
