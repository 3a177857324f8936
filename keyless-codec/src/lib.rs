//! Common TLV encoding interface shared by every keyless crate

use thiserror::Error;

/// Type-length-value elements and a streaming element reader
pub mod tlv;

/// Typed helpers to encode / decode the content of primitive elements
pub mod utils;

pub use tlv::Element;

#[derive(Error, Debug)]
pub enum Error {
    #[error("tag {0:#x} doesn't fit in a TLV header")]
    TagOutOfRange(u16),

    #[error("content of element {tag:#x} is too long ({len} bytes)")]
    ContentTooLong { tag: u16, len: usize },

    #[error("unexpected end of input while reading an element")]
    Truncated,

    #[error("trailing bytes after element {0:#x}")]
    TrailingBytes(u16),

    #[error("expected element {expected:#x}, found {found:#x}")]
    UnexpectedTag { expected: u16, found: u16 },

    #[error("unknown critical element {0:#x}")]
    UnknownCritical(u16),

    #[error("missing mandatory element: {0}")]
    MissingField(&'static str),

    #[error("element {0:#x} appears more than once")]
    Duplicate(u16),

    #[error("invalid integer content in element {0:#x}")]
    InvalidInteger(u16),

    #[error("invalid string content in element {0:#x}")]
    InvalidString(u16),

    #[error("{0}")]
    Message(String),

    #[error("io error while reading elements")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn message(msg: impl Into<String>) -> Self {
        Error::Message(msg.into())
    }
}

/// A structure that maps to exactly one TLV element
pub trait Fragment: Sized {
    fn encode_element(&self) -> Result<Element, Error>;

    fn decode_element(element: &Element) -> Result<Self, Error>;

    fn encode_fragment(&self) -> Result<Vec<u8>, Error> {
        self.encode_element()?.to_bytes()
    }

    fn decode_fragment(bytes: &[u8]) -> Result<Self, Error> {
        let element = Element::from_bytes(bytes)?;
        Self::decode_element(&element)
    }
}
