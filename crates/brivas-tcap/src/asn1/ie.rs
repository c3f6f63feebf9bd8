//! Generic BER information element tree

use super::length::{decode_length, encode_length};
use super::{decode_integer, tlv_len, Marshal, Tag, DEFAULT_MAX_DEPTH};
use crate::errors::{Result, TcapError};
use bytes::{BufMut, Bytes, BytesMut};

/// Value of an information element
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IeValue {
    /// Opaque contents of a primitive element
    Primitive(Bytes),
    /// Child elements of a constructed element, in wire order
    Constructed(Vec<Ie>),
}

/// Information Element: a tag-length-value node
///
/// `length` is the declared length of the contents. Builders set it, the
/// parser records what was on the wire, and `set_length` recomputes it
/// after edits. `write_to` always emits the recomputed length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ie {
    pub tag: Tag,
    pub length: usize,
    pub value: IeValue,
}

impl Ie {
    pub fn primitive(tag: Tag, value: impl Into<Bytes>) -> Self {
        let value: Bytes = value.into();
        Self {
            tag,
            length: value.len(),
            value: IeValue::Primitive(value),
        }
    }

    pub fn constructed(tag: Tag, children: Vec<Ie>) -> Self {
        let mut ie = Self {
            tag,
            length: 0,
            value: IeValue::Constructed(children),
        };
        ie.length = ie.content_len();
        ie
    }

    /// Parse the first element of `data`; trailing bytes are ignored
    pub fn parse(data: &[u8]) -> Result<Self> {
        Self::parse_prefix(data).map(|(ie, _)| ie)
    }

    /// Parse the first element of `data`, returning it with its encoded size
    pub fn parse_prefix(data: &[u8]) -> Result<(Self, usize)> {
        Self::parse_with(data, DEFAULT_MAX_DEPTH)
    }

    pub fn parse_with(data: &[u8], max_depth: usize) -> Result<(Self, usize)> {
        parse_element(data, 0, max_depth)
    }

    /// Parse consecutive top-level elements until `data` is exhausted
    pub fn parse_all(data: &[u8]) -> Result<Vec<Self>> {
        Self::parse_all_with(data, DEFAULT_MAX_DEPTH)
    }

    pub fn parse_all_with(data: &[u8], max_depth: usize) -> Result<Vec<Self>> {
        let mut elements = Vec::new();
        let mut offset = 0;
        while offset < data.len() {
            let (ie, used) = parse_element(&data[offset..], 0, max_depth)?;
            elements.push(ie);
            offset += used;
        }
        Ok(elements)
    }

    /// Length of the contents as they would be written now
    pub fn content_len(&self) -> usize {
        match &self.value {
            IeValue::Primitive(value) => value.len(),
            IeValue::Constructed(children) => children.iter().map(Marshal::marshal_len).sum(),
        }
    }

    /// Recompute `length` for this element and all of its descendants
    pub fn set_length(&mut self) {
        if let IeValue::Constructed(children) = &mut self.value {
            for child in children.iter_mut() {
                child.set_length();
            }
        }
        self.length = self.content_len();
    }

    /// Primitive contents, `None` for constructed elements
    pub fn value(&self) -> Option<&Bytes> {
        match &self.value {
            IeValue::Primitive(value) => Some(value),
            IeValue::Constructed(_) => None,
        }
    }

    /// Primitive contents, failing on a constructed element
    pub fn primitive_value(&self, what: &str) -> Result<&Bytes> {
        self.value()
            .ok_or_else(|| TcapError::InvalidValue(format!("{} must be primitive", what)))
    }

    /// Contents decoded as an INTEGER
    pub fn integer(&self, what: &str) -> Result<i64> {
        decode_integer(self.primitive_value(what)?)
    }

    /// Child elements, empty for primitive elements
    pub fn children(&self) -> &[Ie] {
        match &self.value {
            IeValue::Primitive(_) => &[],
            IeValue::Constructed(children) => children,
        }
    }

    /// First child carrying `tag`
    pub fn child(&self, tag: Tag) -> Option<&Ie> {
        self.children().iter().find(|c| c.tag == tag)
    }

    /// Walk the children positionally
    pub fn cursor(&self) -> Children<'_> {
        Children {
            items: self.children(),
            pos: 0,
        }
    }

    /// Contents as bytes; constructed elements re-marshal their children
    pub fn content(&self) -> Result<Bytes> {
        match &self.value {
            IeValue::Primitive(value) => Ok(value.clone()),
            IeValue::Constructed(children) => {
                let mut buf = BytesMut::with_capacity(self.content_len());
                for child in children {
                    child.write_to(&mut buf)?;
                }
                Ok(buf.freeze())
            }
        }
    }
}

impl Marshal for Ie {
    fn marshal_len(&self) -> usize {
        tlv_len(self.tag, self.content_len())
    }

    fn write_to<B: BufMut>(&self, buf: &mut B) -> Result<()> {
        self.tag.write(buf);
        encode_length(buf, self.content_len())?;
        match &self.value {
            IeValue::Primitive(value) => buf.put_slice(value),
            IeValue::Constructed(children) => {
                for child in children {
                    child.write_to(buf)?;
                }
            }
        }
        Ok(())
    }
}

fn parse_element(data: &[u8], depth: usize, max_depth: usize) -> Result<(Ie, usize)> {
    if depth > max_depth {
        return Err(TcapError::NestingTooDeep(max_depth));
    }

    let (tag, tag_len) = Tag::parse(data)?;
    let (length, len_len) = decode_length(&data[tag_len..])?;
    let header = tag_len + len_len;
    let end = header
        .checked_add(length)
        .ok_or(TcapError::LengthOverflow(len_len - 1))?;
    if data.len() < end {
        return Err(TcapError::truncated(end, data.len()));
    }

    let content = &data[header..end];
    let value = if tag.is_constructed() {
        IeValue::Constructed(parse_children(content, depth + 1, max_depth)?)
    } else {
        IeValue::Primitive(Bytes::copy_from_slice(content))
    };

    Ok((Ie { tag, length, value }, end))
}

fn parse_children(content: &[u8], depth: usize, max_depth: usize) -> Result<Vec<Ie>> {
    let mut children = Vec::new();
    let mut offset = 0;

    while offset < content.len() {
        // The parent's extent was already checked, so a child that runs
        // short overruns its parent rather than the buffer.
        let (child, used) = match parse_element(&content[offset..], depth, max_depth) {
            Err(TcapError::TruncatedInput { needed, .. }) => {
                return Err(TcapError::InconsistentLength {
                    declared: content.len(),
                    actual: offset + needed,
                })
            }
            other => other?,
        };
        children.push(child);
        offset += used;
    }

    Ok(children)
}

/// Positional walk over the children of a constructed element
#[derive(Debug, Clone)]
pub struct Children<'a> {
    items: &'a [Ie],
    pos: usize,
}

impl<'a> Children<'a> {
    pub fn peek(&self) -> Option<&'a Ie> {
        self.items.get(self.pos)
    }

    /// Consume the next child if it carries `tag`
    pub fn next_if(&mut self, tag: Tag) -> Option<&'a Ie> {
        let ie = self.peek().filter(|ie| ie.tag == tag)?;
        self.pos += 1;
        Some(ie)
    }

    /// Consume the next child, which must carry `tag`
    pub fn expect(&mut self, tag: Tag, what: &'static str) -> Result<&'a Ie> {
        let ie = self.peek().ok_or(TcapError::MissingElement(what))?;
        if ie.tag != tag {
            return Err(TcapError::UnexpectedTag {
                expected: tag,
                found: ie.tag,
            });
        }
        self.pos += 1;
        Ok(ie)
    }

    /// Fail if any child is left unconsumed
    pub fn finish(self, what: &'static str) -> Result<()> {
        match self.peek() {
            None => Ok(()),
            Some(ie) => Err(TcapError::InvalidValue(format!(
                "unexpected element {} in {}",
                ie.tag, what
            ))),
        }
    }
}

impl<'a> Iterator for Children<'a> {
    type Item = &'a Ie;

    fn next(&mut self) -> Option<Self::Item> {
        let ie = self.peek()?;
        self.pos += 1;
        Some(ie)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_primitive() {
        let ie = Ie::parse(&[0x48, 0x04, 0x00, 0x00, 0x00, 0x01, 0xFF]).unwrap();
        assert_eq!(ie.tag, Tag::application_primitive(8));
        assert_eq!(ie.length, 4);
        assert_eq!(ie.value().unwrap().as_ref(), &[0, 0, 0, 1]);
    }

    #[test]
    fn test_parse_nested() {
        let data = [0x6C, 0x08, 0xA1, 0x06, 0x02, 0x01, 0x01, 0x02, 0x01, 0x05];
        let (ie, used) = Ie::parse_prefix(&data).unwrap();
        assert_eq!(used, data.len());
        assert_eq!(ie.children().len(), 1);

        let invoke = &ie.children()[0];
        assert_eq!(invoke.tag.octet(), Some(0xA1));
        let ids: Vec<u8> = invoke.children().iter().map(|c| c.value().unwrap()[0]).collect();
        assert_eq!(ids, vec![1, 5]);

        assert_eq!(&ie.marshal().unwrap()[..], &data[..]);
    }

    #[test]
    fn test_set_length_after_edit() {
        let mut ie = Ie::constructed(
            Tag::universal_constructed(16),
            vec![Ie::primitive(Tag::universal_primitive(4), vec![0xAA])],
        );
        assert_eq!(ie.length, 3);

        if let IeValue::Constructed(children) = &mut ie.value {
            children.push(Ie::primitive(Tag::universal_primitive(4), vec![0xBB, 0xCC]));
        }
        assert_eq!(ie.length, 3);
        ie.set_length();
        assert_eq!(ie.length, 7);
        assert_eq!(ie.marshal_len(), 9);
    }

    #[test]
    fn test_long_form_content() {
        let ie = Ie::primitive(Tag::universal_primitive(4), vec![0x11; 300]);
        let encoded = ie.marshal().unwrap();
        assert_eq!(&encoded[..4], &[0x04, 0x82, 0x01, 0x2C]);
        assert_eq!(Ie::parse(&encoded).unwrap(), ie);
    }

    #[test]
    fn test_truncated_and_inconsistent() {
        assert!(matches!(
            Ie::parse(&[0x04, 0x03, 0x01, 0x02]),
            Err(TcapError::TruncatedInput { needed: 5, available: 4 })
        ));
        // Child claims 4 bytes inside a 3-byte parent
        assert!(matches!(
            Ie::parse(&[0x30, 0x03, 0x04, 0x04, 0x01]),
            Err(TcapError::InconsistentLength { .. })
        ));
    }

    #[test]
    fn test_nesting_limit() {
        let data = [0x30, 0x04, 0x30, 0x02, 0x30, 0x00];
        assert!(Ie::parse_with(&data, 2).is_ok());
        assert_eq!(Ie::parse_with(&data, 1), Err(TcapError::NestingTooDeep(1)));
    }

    #[test]
    fn test_parse_all() {
        let data = [0x02, 0x01, 0x01, 0x05, 0x00, 0x04, 0x01, 0xAA];
        let elements = Ie::parse_all(&data).unwrap();
        assert_eq!(elements.len(), 3);
        assert_eq!(elements[1].tag, Tag::universal_primitive(5));
    }

    #[test]
    fn test_children_cursor() {
        let ie = Ie::parse(&[0x30, 0x06, 0x02, 0x01, 0x01, 0x80, 0x01, 0x02]).unwrap();
        let mut cursor = ie.cursor();
        assert!(cursor.next_if(Tag::context_primitive(0)).is_none());
        cursor.expect(Tag::universal_primitive(2), "first").unwrap();
        assert!(cursor.clone().finish("seq").is_err());
        cursor.expect(Tag::context_primitive(0), "second").unwrap();
        assert!(cursor.finish("seq").is_ok());
    }
}
