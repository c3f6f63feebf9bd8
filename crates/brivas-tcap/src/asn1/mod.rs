//! ASN.1 BER building blocks
//!
//! Tag and length codecs, the generic [`Ie`] tree every TCAP portion is
//! built on, and INTEGER / OBJECT IDENTIFIER content helpers.

mod ie;
mod length;
mod tag;

pub use ie::{Children, Ie, IeValue};
pub use length::{decode_length, encode_length, encoded_length_len, MAX_LENGTH_OCTETS};
pub use tag::{Form, Tag, TagClass};

use crate::errors::{Result, TcapError};
use bytes::{BufMut, BytesMut};

/// Nesting limit used when no configuration is supplied
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Universal tags used by TCAP
pub const INTEGER: Tag = Tag::universal_primitive(2);
pub const OCTET_STRING: Tag = Tag::universal_primitive(4);
pub const NULL: Tag = Tag::universal_primitive(5);
pub const OBJECT_IDENTIFIER: Tag = Tag::universal_primitive(6);
pub const SEQUENCE: Tag = Tag::universal_constructed(16);
pub const EXTERNAL: Tag = Tag::universal_constructed(8);

/// Binary serialization with a precomputed size
pub trait Marshal {
    /// Exact number of bytes `write_to` produces
    fn marshal_len(&self) -> usize;

    fn write_to<B: BufMut>(&self, buf: &mut B) -> Result<()>;

    fn marshal(&self) -> Result<BytesMut> {
        let mut buf = BytesMut::with_capacity(self.marshal_len());
        self.write_to(&mut buf)?;
        Ok(buf)
    }

    /// Write into the front of `dst`, returning the bytes written
    ///
    /// Never writes past `marshal_len()`; an undersized `dst` is an error.
    fn marshal_to(&self, dst: &mut [u8]) -> Result<usize> {
        let needed = self.marshal_len();
        if dst.len() < needed {
            return Err(TcapError::DestinationTooSmall {
                needed,
                available: dst.len(),
            });
        }
        let mut window = &mut dst[..needed];
        self.write_to(&mut window)?;
        Ok(needed)
    }
}

/// Total size of a TLV with `content_len` bytes of contents
pub fn tlv_len(tag: Tag, content_len: usize) -> usize {
    tag.encoded_len() + encoded_length_len(content_len) + content_len
}

/// Write tag and length; the caller writes the contents
pub fn write_header<B: BufMut>(buf: &mut B, tag: Tag, content_len: usize) -> Result<()> {
    tag.write(buf);
    encode_length(buf, content_len)
}

/// Convert integer to minimal two's complement representation
pub fn integer_to_bytes(value: i64) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let mut start = 0;

    // Drop sign octets the next octet's top bit already implies
    while start < bytes.len() - 1 {
        let (cur, next) = (bytes[start], bytes[start + 1]);
        let redundant = (cur == 0x00 && next & 0x80 == 0) || (cur == 0xFF && next & 0x80 != 0);
        if !redundant {
            break;
        }
        start += 1;
    }

    bytes[start..].to_vec()
}

/// Decode INTEGER contents (two's complement, big-endian)
pub fn decode_integer(data: &[u8]) -> Result<i64> {
    if data.is_empty() || data.len() > 8 {
        return Err(TcapError::InvalidValue(format!(
            "INTEGER of {} octets",
            data.len()
        )));
    }

    let seed: i64 = if data[0] & 0x80 != 0 { -1 } else { 0 };
    Ok(data.iter().fold(seed, |acc, &b| (acc << 8) | b as i64))
}

/// Build an INTEGER element
pub fn integer_ie(tag: Tag, value: i64) -> Ie {
    Ie::primitive(tag, integer_to_bytes(value))
}

/// Encode OID contents from its arcs
pub fn encode_oid(arcs: &[u32]) -> Result<Vec<u8>> {
    if arcs.len() < 2 || arcs[0] > 2 || (arcs[0] < 2 && arcs[1] >= 40) {
        return Err(TcapError::InvalidValue(format!("invalid OID arcs {:?}", arcs)));
    }

    let first = arcs[0]
        .checked_mul(40)
        .and_then(|v| v.checked_add(arcs[1]))
        .ok_or_else(|| TcapError::InvalidValue(format!("invalid OID arcs {:?}", arcs)))?;

    let mut content = Vec::new();
    encode_oid_component(&mut content, first);
    for &component in &arcs[2..] {
        encode_oid_component(&mut content, component);
    }
    Ok(content)
}

fn encode_oid_component(buf: &mut Vec<u8>, value: u32) {
    let mut septets = vec![(value & 0x7F) as u8];
    let mut v = value >> 7;
    while v > 0 {
        septets.push(((v & 0x7F) | 0x80) as u8);
        v >>= 7;
    }
    septets.reverse();
    buf.extend(septets);
}

/// Decode OID contents into arcs
pub fn decode_oid(data: &[u8]) -> Result<Vec<u32>> {
    if data.is_empty() {
        return Err(TcapError::InvalidValue("empty OID".to_string()));
    }

    let mut arcs = Vec::new();
    let mut i = 0;
    while i < data.len() {
        let (component, len) = decode_oid_component(&data[i..])?;
        if arcs.is_empty() {
            let (a, b) = match component {
                0..=39 => (0, component),
                40..=79 => (1, component - 40),
                _ => (2, component - 80),
            };
            arcs.push(a);
            arcs.push(b);
        } else {
            arcs.push(component);
        }
        i += len;
    }

    Ok(arcs)
}

fn decode_oid_component(data: &[u8]) -> Result<(u32, usize)> {
    let mut value = 0u32;

    for (i, &byte) in data.iter().enumerate() {
        if i == 4 && value > 0x0F {
            return Err(TcapError::InvalidValue("OID component exceeds 32 bits".to_string()));
        }
        if i > 4 {
            return Err(TcapError::InvalidValue("OID component exceeds 32 bits".to_string()));
        }
        value = (value << 7) | (byte & 0x7F) as u32;
        if byte & 0x80 == 0 {
            return Ok((value, i + 1));
        }
    }

    Err(TcapError::InvalidValue("unterminated OID component".to_string()))
}

/// Dotted notation of OID contents, e.g. `0.4.0.0.1.0.20.3`
pub fn oid_to_string(data: &[u8]) -> Result<String> {
    let arcs = decode_oid(data)?;
    Ok(arcs
        .iter()
        .map(|a| a.to_string())
        .collect::<Vec<_>>()
        .join("."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_encoding() {
        assert_eq!(integer_to_bytes(0), vec![0x00]);
        assert_eq!(integer_to_bytes(5), vec![0x05]);
        assert_eq!(integer_to_bytes(127), vec![0x7F]);
        assert_eq!(integer_to_bytes(128), vec![0x00, 0x80]);
        assert_eq!(integer_to_bytes(256), vec![0x01, 0x00]);
        assert_eq!(integer_to_bytes(-1), vec![0xFF]);
        assert_eq!(integer_to_bytes(-128), vec![0x80]);
        assert_eq!(integer_to_bytes(-129), vec![0xFF, 0x7F]);
    }

    #[test]
    fn test_integer_decoding() {
        for v in [0i64, 1, 5, 127, 128, 255, 256, -1, -128, -129, 70000, i64::MAX, i64::MIN] {
            assert_eq!(decode_integer(&integer_to_bytes(v)).unwrap(), v);
        }
        assert!(decode_integer(&[]).is_err());
        assert!(decode_integer(&[0; 9]).is_err());
    }

    #[test]
    fn test_oid() {
        let content = encode_oid(&[0, 4, 0, 0, 1, 0, 20, 3]).unwrap();
        assert_eq!(content, vec![0x04, 0x00, 0x00, 0x01, 0x00, 0x14, 0x03]);
        assert_eq!(oid_to_string(&content).unwrap(), "0.4.0.0.1.0.20.3");

        let dialogue_as_id = [0x00, 0x11, 0x86, 0x05, 0x01, 0x01, 0x01];
        assert_eq!(decode_oid(&dialogue_as_id).unwrap(), vec![0, 0, 17, 773, 1, 1, 1]);
        assert_eq!(encode_oid(&[0, 0, 17, 773, 1, 1, 1]).unwrap(), dialogue_as_id.to_vec());
    }

    #[test]
    fn test_oid_errors() {
        assert!(encode_oid(&[1]).is_err());
        assert!(encode_oid(&[0, 40]).is_err());
        assert!(decode_oid(&[0x04, 0x86]).is_err());
        assert!(decode_oid(&[]).is_err());
    }

    #[test]
    fn test_marshal_to_bounds() {
        let ie = integer_ie(INTEGER, 300);
        let mut small = [0u8; 3];
        assert_eq!(
            ie.marshal_to(&mut small),
            Err(TcapError::DestinationTooSmall { needed: 4, available: 3 })
        );

        let mut big = [0xEEu8; 8];
        assert_eq!(ie.marshal_to(&mut big).unwrap(), 4);
        assert_eq!(big, [0x02, 0x02, 0x01, 0x2C, 0xEE, 0xEE, 0xEE, 0xEE]);
    }
}
