use std::{
    fmt,
    io::{self, Read, Write},
};

use crate::{utils, Error};

/// Highest tag representable in a TLV16 header
pub const MAX_TAG: u16 = 0x1FFF;

/// Highest tag representable in a TLV8 header
pub const MAX_TLV8_TAG: u16 = 0x1F;

pub const MAX_TLV8_LEN: usize = 0xFF;

pub const MAX_CONTENT_LEN: usize = 0xFFFF;

const TLV16_FLAG: u8 = 0x80;
const NON_CRITICAL_FLAG: u8 = 0x40;
const FORWARD_FLAG: u8 = 0x20;
const TAG_HI_MASK: u8 = 0x1F;

/// A single type-length-value element.
///
/// The content is kept as raw bytes. Composite elements are just elements
/// whose content is the concatenation of their children's encodings, see
/// [`Element::composite`] and [`Element::children`].
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Element {
    tag: u16,
    non_critical: bool,
    forward: bool,
    content: Vec<u8>,
}

impl Element {
    pub fn new(tag: u16, content: Vec<u8>) -> Self {
        Self {
            tag,
            non_critical: false,
            forward: false,
            content,
        }
    }

    pub fn from_u64(tag: u16, value: u64) -> Self {
        Self::new(tag, utils::encode_u64(value))
    }

    pub fn from_string(tag: u16, value: &str) -> Self {
        Self::new(tag, utils::encode_string(value))
    }

    /// Builds an element whose content is the encoding of `children`
    pub fn composite(tag: u16, children: &[Element]) -> Result<Self, Error> {
        let mut content = Vec::new();

        for child in children {
            child.write_to(&mut content)?;
        }

        Ok(Self::new(tag, content))
    }

    pub fn with_non_critical(mut self, non_critical: bool) -> Self {
        self.non_critical = non_critical;
        self
    }

    pub fn with_forward(mut self, forward: bool) -> Self {
        self.forward = forward;
        self
    }

    pub fn tag(&self) -> u16 {
        self.tag
    }

    pub fn is_non_critical(&self) -> bool {
        self.non_critical
    }

    pub fn is_forward(&self) -> bool {
        self.forward
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    pub fn into_content(self) -> Vec<u8> {
        self.content
    }

    fn is_tlv16(&self) -> bool {
        self.tag > MAX_TLV8_TAG || self.content.len() > MAX_TLV8_LEN
    }

    /// Size of the element once encoded, header included
    pub fn encoded_len(&self) -> usize {
        let header = if self.is_tlv16() { 4 } else { 2 };
        header + self.content.len()
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<(), Error> {
        if self.tag > MAX_TAG {
            return Err(Error::TagOutOfRange(self.tag));
        }

        let len = self.content.len();

        if len > MAX_CONTENT_LEN {
            return Err(Error::ContentTooLong { tag: self.tag, len });
        }

        let mut flags = 0u8;

        if self.non_critical {
            flags |= NON_CRITICAL_FLAG;
        }

        if self.forward {
            flags |= FORWARD_FLAG;
        }

        if self.is_tlv16() {
            let [tag_hi, tag_lo] = self.tag.to_be_bytes();
            let [len_hi, len_lo] = (len as u16).to_be_bytes();
            writer.write_all(&[TLV16_FLAG | flags | tag_hi, tag_lo, len_hi, len_lo])?;
        } else {
            writer.write_all(&[flags | self.tag as u8, len as u8])?;
        }

        writer.write_all(&self.content)?;

        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        let mut out = Vec::with_capacity(self.encoded_len());
        self.write_to(&mut out)?;
        Ok(out)
    }

    /// Decodes exactly one element, rejecting any trailing bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        let mut reader = Reader::new(bytes);

        let element = reader.read_element()?.ok_or(Error::Truncated)?;

        if !reader.into_inner().is_empty() {
            return Err(Error::TrailingBytes(element.tag));
        }

        Ok(element)
    }

    /// Parses the content as a sequence of nested elements
    pub fn children(&self) -> Result<Vec<Element>, Error> {
        Reader::new(self.content.as_slice()).collect()
    }

    pub fn expect_tag(&self, expected: u16) -> Result<(), Error> {
        if self.tag != expected {
            return Err(Error::UnexpectedTag {
                expected,
                found: self.tag,
            });
        }

        Ok(())
    }

    /// Call on a child nobody knows how to handle: non-critical elements are
    /// skipped, critical ones abort the decoding.
    pub fn ensure_skippable(&self) -> Result<(), Error> {
        match self.non_critical {
            true => Ok(()),
            false => Err(Error::UnknownCritical(self.tag)),
        }
    }

    pub fn decode_u64(&self) -> Result<u64, Error> {
        utils::decode_u64(self.tag, &self.content)
    }

    pub fn decode_string(&self) -> Result<String, Error> {
        utils::decode_string(self.tag, &self.content)
    }
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Element")
            .field("tag", &format_args!("{:#x}", self.tag))
            .field("non_critical", &self.non_critical)
            .field("forward", &self.forward)
            .field("content", &hex::encode(&self.content))
            .finish()
    }
}

/// Reads consecutive elements out of a byte stream until a clean end-of-input
pub struct Reader<R> {
    inner: R,
}

impl<R: Read> Reader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), Error> {
        self.inner.read_exact(buf).map_err(|err| match err.kind() {
            io::ErrorKind::UnexpectedEof => Error::Truncated,
            _ => Error::Io(err),
        })
    }

    /// Returns `None` when the stream ends exactly at an element boundary
    pub fn read_element(&mut self) -> Result<Option<Element>, Error> {
        let mut first = [0u8; 1];

        loop {
            match self.inner.read(&mut first) {
                Ok(0) => return Ok(None),
                Ok(_) => break,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(Error::Io(err)),
            }
        }

        let first = first[0];
        let non_critical = first & NON_CRITICAL_FLAG != 0;
        let forward = first & FORWARD_FLAG != 0;

        let (tag, len) = if first & TLV16_FLAG != 0 {
            let mut rest = [0u8; 3];
            self.read_exact(&mut rest)?;

            let tag = u16::from_be_bytes([first & TAG_HI_MASK, rest[0]]);
            let len = u16::from_be_bytes([rest[1], rest[2]]) as usize;
            (tag, len)
        } else {
            let mut rest = [0u8; 1];
            self.read_exact(&mut rest)?;

            ((first & TAG_HI_MASK) as u16, rest[0] as usize)
        };

        let mut content = vec![0u8; len];
        self.read_exact(&mut content)?;

        Ok(Some(Element {
            tag,
            non_critical,
            forward,
            content,
        }))
    }
}

impl<R: Read> Iterator for Reader<R> {
    type Item = Result<Element, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_element().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_element_uses_tlv8_header() {
        let element = Element::new(0x05, vec![0xAA, 0xBB]);
        let bytes = element.to_bytes().unwrap();

        assert_eq!(bytes, vec![0x05, 0x02, 0xAA, 0xBB]);
        assert_eq!(element.encoded_len(), 4);
    }

    #[test]
    fn large_tag_uses_tlv16_header() {
        let element = Element::new(0x0801, vec![0x01]).with_non_critical(true);
        let bytes = element.to_bytes().unwrap();

        assert_eq!(bytes, vec![0xC8, 0x01, 0x00, 0x01, 0x01]);

        let decoded = Element::from_bytes(&bytes).unwrap();
        assert_eq!(decoded, element);
    }

    #[test]
    fn long_content_uses_tlv16_header() {
        let element = Element::new(0x02, vec![0x11; 300]);
        let bytes = element.to_bytes().unwrap();

        assert_eq!(&bytes[..4], &[0x80, 0x02, 0x01, 0x2C]);
        assert_eq!(bytes.len(), 304);
    }

    #[test]
    fn flags_survive_decoding() {
        let bytes = [0x65, 0x01, 0x07];
        let element = Element::from_bytes(&bytes).unwrap();

        assert_eq!(element.tag(), 0x05);
        assert!(element.is_non_critical());
        assert!(element.is_forward());
        assert_eq!(element.content(), &[0x07]);
    }

    #[test]
    fn oversized_content_is_rejected() {
        let element = Element::new(0x02, vec![0; MAX_CONTENT_LEN + 1]);
        assert!(matches!(
            element.to_bytes(),
            Err(Error::ContentTooLong { tag: 0x02, .. })
        ));
    }

    #[test]
    fn tag_out_of_range_is_rejected() {
        let element = Element::new(0x2000, vec![]);
        assert!(matches!(element.to_bytes(), Err(Error::TagOutOfRange(0x2000))));
    }

    #[test]
    fn truncated_content_fails() {
        let bytes = [0x05, 0x04, 0x01, 0x02];
        assert!(matches!(Element::from_bytes(&bytes), Err(Error::Truncated)));
    }

    #[test]
    fn trailing_bytes_fail() {
        let bytes = [0x05, 0x01, 0x01, 0x06];
        assert!(matches!(
            Element::from_bytes(&bytes),
            Err(Error::TrailingBytes(0x05))
        ));
    }

    #[test]
    fn trailing_element_fails() {
        let bytes = [0x05, 0x01, 0x01, 0x06, 0x00];
        assert!(matches!(
            Element::from_bytes(&bytes),
            Err(Error::TrailingBytes(0x05))
        ));
    }

    #[test]
    fn composite_exposes_children() {
        let parent = Element::composite(
            0x0802,
            &[Element::from_u64(0x01, 1_500_000_000), Element::from_u64(0x02, 7)],
        )
        .unwrap();

        let children = parent.children().unwrap();

        assert_eq!(children.len(), 2);
        assert_eq!(children[0].decode_u64().unwrap(), 1_500_000_000);
        assert_eq!(children[1].decode_u64().unwrap(), 7);
    }

    #[test]
    fn unknown_critical_child_is_not_skippable() {
        let critical = Element::new(0x1A, vec![]);
        let optional = Element::new(0x1A, vec![]).with_non_critical(true);

        assert!(matches!(
            critical.ensure_skippable(),
            Err(Error::UnknownCritical(0x1A))
        ));
        assert!(optional.ensure_skippable().is_ok());
    }

    #[test]
    fn reader_stops_at_clean_eof() {
        let mut stream = Vec::new();
        Element::from_u64(0x01, 1).write_to(&mut stream).unwrap();
        Element::from_u64(0x02, 2).write_to(&mut stream).unwrap();

        let elements: Result<Vec<_>, _> = Reader::new(stream.as_slice()).collect();
        let elements = elements.unwrap();

        assert_eq!(elements.len(), 2);
        assert_eq!(elements[1].tag(), 0x02);
    }
}
