//! BER definite-length encoding

use crate::errors::{Result, TcapError};
use bytes::BufMut;

/// Largest long form accepted or produced (32-bit lengths)
pub const MAX_LENGTH_OCTETS: usize = 4;

/// Decode a BER length, returning `(value, octets consumed)`
///
/// Both short and long forms are accepted, including non-minimal long
/// forms such as `81 05`.
pub fn decode_length(data: &[u8]) -> Result<(usize, usize)> {
    let first = *data.first().ok_or_else(|| TcapError::truncated(1, 0))?;

    if first & 0x80 == 0 {
        return Ok((first as usize, 1));
    }

    let num_bytes = (first & 0x7F) as usize;
    if num_bytes == 0 {
        return Err(TcapError::UnsupportedIndefiniteLength);
    }
    if num_bytes > MAX_LENGTH_OCTETS {
        return Err(TcapError::LengthOverflow(num_bytes));
    }
    if data.len() < 1 + num_bytes {
        return Err(TcapError::truncated(1 + num_bytes, data.len()));
    }

    let length = data[1..=num_bytes]
        .iter()
        .fold(0usize, |acc, &b| (acc << 8) | b as usize);

    Ok((length, 1 + num_bytes))
}

/// Number of magnitude octets needed for `len`
fn magnitude_octets(len: usize) -> usize {
    let mut octets = 0;
    let mut v = len;
    while v > 0 {
        octets += 1;
        v >>= 8;
    }
    octets
}

/// Size of the canonical encoding of `len`
pub fn encoded_length_len(len: usize) -> usize {
    if len < 128 {
        1
    } else {
        1 + magnitude_octets(len)
    }
}

/// Encode length in canonical BER form
pub fn encode_length<B: BufMut>(buf: &mut B, len: usize) -> Result<()> {
    if len < 128 {
        buf.put_u8(len as u8);
        return Ok(());
    }

    let octets = magnitude_octets(len);
    if octets > MAX_LENGTH_OCTETS {
        return Err(TcapError::LengthOverflow(octets));
    }

    buf.put_u8(0x80 | octets as u8);
    for i in (0..octets).rev() {
        buf.put_u8(((len >> (8 * i)) & 0xFF) as u8);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded(len: usize) -> Vec<u8> {
        let mut buf = Vec::new();
        encode_length(&mut buf, len).unwrap();
        buf
    }

    #[test]
    fn test_length_encoding() {
        assert_eq!(encoded(10), vec![10]);
        assert_eq!(encoded(127), vec![0x7F]);
        assert_eq!(encoded(128), vec![0x81, 0x80]);
        assert_eq!(encoded(200), vec![0x81, 200]);
        assert_eq!(encoded(1000), vec![0x82, 0x03, 0xE8]);
        assert_eq!(encoded(0x0100_0000), vec![0x84, 0x01, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn test_encoded_len_matches_output() {
        for len in [0, 1, 127, 128, 255, 256, 65535, 65536, 0xFFFF_FFFF] {
            assert_eq!(encoded_length_len(len), encoded(len).len(), "len {}", len);
        }
    }

    #[test]
    fn test_decode_both_forms() {
        assert_eq!(decode_length(&[0x05]).unwrap(), (5, 1));
        assert_eq!(decode_length(&[0x81, 0x05]).unwrap(), (5, 2));
        assert_eq!(decode_length(&[0x81, 0x80]).unwrap(), (128, 2));
        assert_eq!(decode_length(&[0x82, 0x01, 0x00]).unwrap(), (256, 3));
    }

    #[test]
    fn test_decode_errors() {
        assert_eq!(decode_length(&[0x80]), Err(TcapError::UnsupportedIndefiniteLength));
        assert_eq!(decode_length(&[0x85, 1, 2, 3, 4, 5]), Err(TcapError::LengthOverflow(5)));
        assert!(matches!(decode_length(&[0x82, 0x01]), Err(TcapError::TruncatedInput { .. })));
        assert!(matches!(decode_length(&[]), Err(TcapError::TruncatedInput { .. })));
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn test_encode_overflow() {
        let mut buf = Vec::new();
        assert_eq!(
            encode_length(&mut buf, 0x1_0000_0000),
            Err(TcapError::LengthOverflow(5))
        );
    }
}
