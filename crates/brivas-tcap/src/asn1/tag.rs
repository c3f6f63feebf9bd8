//! BER identifier octets (class, form, tag number)

use crate::errors::{Result, TcapError};
use bytes::BufMut;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Low five bits set: tag number continues in the following octets
const HIGH_TAG_NUMBER: u8 = 0x1F;

/// Max continuation octets in a high tag number (28 bits)
const MAX_TAG_NUMBER_OCTETS: usize = 4;

/// Tag class (bits 8-7 of the identifier octet)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum TagClass {
    Universal = 0,
    Application = 1,
    ContextSpecific = 2,
    Private = 3,
}

impl TagClass {
    fn from_octet(v: u8) -> Self {
        match v >> 6 {
            0 => Self::Universal,
            1 => Self::Application,
            2 => Self::ContextSpecific,
            _ => Self::Private,
        }
    }

    const fn bits(self) -> u8 {
        (self as u8) << 6
    }
}

/// Primitive or constructed encoding (bit 6)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Form {
    Primitive,
    Constructed,
}

/// BER tag
///
/// Tag numbers 0-30 occupy a single octet:
/// ```text
/// 8 7 | 6 | 5 4 3 2 1
/// cls | P/C | number
/// ```
/// Larger numbers use the high-tag-number form (low bits `11111`, then
/// base-128 octets with the top bit as continuation flag).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tag {
    class: TagClass,
    form: Form,
    number: u32,
}

impl Tag {
    pub const fn new(class: TagClass, form: Form, number: u32) -> Self {
        Self { class, form, number }
    }

    pub const fn universal_primitive(number: u32) -> Self {
        Self::new(TagClass::Universal, Form::Primitive, number)
    }

    pub const fn universal_constructed(number: u32) -> Self {
        Self::new(TagClass::Universal, Form::Constructed, number)
    }

    pub const fn application_primitive(number: u32) -> Self {
        Self::new(TagClass::Application, Form::Primitive, number)
    }

    pub const fn application_constructed(number: u32) -> Self {
        Self::new(TagClass::Application, Form::Constructed, number)
    }

    pub const fn context_primitive(number: u32) -> Self {
        Self::new(TagClass::ContextSpecific, Form::Primitive, number)
    }

    pub const fn context_constructed(number: u32) -> Self {
        Self::new(TagClass::ContextSpecific, Form::Constructed, number)
    }

    pub fn class(&self) -> TagClass {
        self.class
    }

    pub fn form(&self) -> Form {
        self.form
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn is_constructed(&self) -> bool {
        self.form == Form::Constructed
    }

    /// The identifier octet, when the tag fits in one
    pub fn octet(&self) -> Option<u8> {
        if self.number < HIGH_TAG_NUMBER as u32 {
            Some(self.leading_bits() | self.number as u8)
        } else {
            None
        }
    }

    fn leading_bits(&self) -> u8 {
        let form = match self.form {
            Form::Primitive => 0x00,
            Form::Constructed => 0x20,
        };
        self.class.bits() | form
    }

    /// Number of octets `write` produces
    pub fn encoded_len(&self) -> usize {
        if self.number < HIGH_TAG_NUMBER as u32 {
            return 1;
        }
        let mut octets = 1;
        let mut n = self.number >> 7;
        while n > 0 {
            octets += 1;
            n >>= 7;
        }
        1 + octets
    }

    pub fn write<B: BufMut>(&self, buf: &mut B) {
        if let Some(octet) = self.octet() {
            buf.put_u8(octet);
            return;
        }

        buf.put_u8(self.leading_bits() | HIGH_TAG_NUMBER);
        let continuation = self.encoded_len() - 1;
        for i in (0..continuation).rev() {
            let septet = ((self.number >> (7 * i)) & 0x7F) as u8;
            if i == 0 {
                buf.put_u8(septet);
            } else {
                buf.put_u8(septet | 0x80);
            }
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len());
        self.write(&mut out);
        out
    }

    /// Decode a tag, returning it with the number of octets consumed
    pub fn parse(data: &[u8]) -> Result<(Self, usize)> {
        let first = *data.first().ok_or_else(|| TcapError::truncated(1, 0))?;
        let class = TagClass::from_octet(first);
        let form = if first & 0x20 != 0 {
            Form::Constructed
        } else {
            Form::Primitive
        };

        let low = first & HIGH_TAG_NUMBER;
        if low != HIGH_TAG_NUMBER {
            return Ok((Self::new(class, form, low as u32), 1));
        }

        let mut number = 0u32;
        for i in 0..MAX_TAG_NUMBER_OCTETS {
            let octet = *data
                .get(1 + i)
                .ok_or_else(|| TcapError::truncated(2 + i, data.len()))?;
            if i == 0 && octet == 0x80 {
                return Err(TcapError::MalformedTag(
                    "leading zero septet in tag number".to_string(),
                ));
            }
            number = (number << 7) | (octet & 0x7F) as u32;
            if octet & 0x80 == 0 {
                if number < HIGH_TAG_NUMBER as u32 {
                    return Err(TcapError::MalformedTag(format!(
                        "tag number {} must use the single-octet form",
                        number
                    )));
                }
                return Ok((Self::new(class, form, number), 2 + i));
            }
        }

        Err(TcapError::MalformedTag(format!(
            "tag number longer than {} octets",
            MAX_TAG_NUMBER_OCTETS
        )))
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.octet() {
            Some(octet) => write!(f, "0x{:02x}", octet),
            None => write!(f, "[{:?} {:?} {}]", self.class, self.form, self.number),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_octet_round_trip() {
        for octet in 0u8..=0xFF {
            if octet & 0x1F == 0x1F {
                continue;
            }
            let (tag, used) = Tag::parse(&[octet]).unwrap();
            assert_eq!(used, 1);
            assert_eq!(tag.encode(), vec![octet]);
            assert_eq!(tag.octet(), Some(octet));
        }
    }

    #[test]
    fn test_tcap_tags() {
        let (begin, _) = Tag::parse(&[0x62]).unwrap();
        assert_eq!(begin.class(), TagClass::Application);
        assert!(begin.is_constructed());
        assert_eq!(begin.number(), 2);

        let (otid, _) = Tag::parse(&[0x48]).unwrap();
        assert_eq!(otid, Tag::application_primitive(8));

        assert_eq!(Tag::context_constructed(1).octet(), Some(0xA1));
        assert_eq!(Tag::context_constructed(30).octet(), Some(0xBE));
    }

    #[test]
    fn test_high_tag_number() {
        let tag = Tag::context_primitive(200);
        let encoded = tag.encode();
        assert_eq!(encoded, vec![0x9F, 0x81, 0x48]);
        assert_eq!(Tag::parse(&encoded).unwrap(), (tag, 3));

        let tag = Tag::application_constructed(31);
        assert_eq!(tag.encode(), vec![0x7F, 0x1F]);
    }

    #[test]
    fn test_malformed_tags() {
        assert!(matches!(Tag::parse(&[0x9F, 0x80, 0x01]), Err(TcapError::MalformedTag(_))));
        assert!(matches!(Tag::parse(&[0x9F, 0x05]), Err(TcapError::MalformedTag(_))));
        assert!(matches!(
            Tag::parse(&[0x9F, 0x81, 0x81, 0x81, 0x81, 0x01]),
            Err(TcapError::MalformedTag(_))
        ));
        assert!(matches!(Tag::parse(&[0x9F, 0x81]), Err(TcapError::TruncatedInput { .. })));
        assert!(matches!(Tag::parse(&[]), Err(TcapError::TruncatedInput { .. })));
    }
}
