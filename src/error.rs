//! Library error types.
//!
use std::fmt;

/// An `nbfx` result, normally returning an [`Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// An `nbfx` error. Encompasses every failure mode of decoding a record
/// stream or encoding an XML document into one.
#[derive(Debug)]
pub enum Error {
    /// The underlying reader/writer failed.
    Io(std::io::Error),
    /// A record code byte didn't match any known record family, or was used
    /// somewhere the grammar doesn't allow it (e.g. an attribute record
    /// outside a start-tag).
    UnexpectedRecordCode {
        /// The offending byte.
        code: u8,
        /// Byte offset into the stream where it was read.
        position: usize,
    },
    /// An attribute- or xmlns-family record was found outside the attribute
    /// scope of a start-tag.
    UnexpectedAttribute {
        /// The offending byte.
        code: u8,
        /// Byte offset into the stream where it was read.
        position: usize,
    },
    /// A dictionary key didn't resolve in either the static or session
    /// dictionary.
    InvalidDictionaryKey(u32),
    /// A `QNameDictionaryText` record's prefix-index byte was outside
    /// `0..=25`, the single-lowercase-letter range the format defines.
    InvalidPrefixIndex(u8),
    /// A `MultiByteInt31` would need a sixth byte, or decoded to a value
    /// greater than `2^31 - 1`.
    MultiByteInt31Overflow,
    /// End of input was hit while reading a fixed-size or length-prefixed
    /// value.
    TruncatedValue {
        /// What we were trying to read.
        kind: &'static str,
        /// How many bytes we needed.
        needed: usize,
        /// How many were left.
        available: usize,
    },
    /// An `EndElement` record was seen with no open element, or the input
    /// ended with elements still open.
    UnbalancedDocument,
    /// A duplicate `(prefix, name)` attribute pair appeared on one start-tag.
    DuplicateAttribute {
        /// The attribute prefix, if any.
        prefix: Option<String>,
        /// The attribute local name.
        name: String,
    },
    /// Raw bytes claiming to be UTF-8 text weren't valid UTF-8.
    InvalidUtf8(std::str::Utf8Error),
    /// Raw bytes claiming to be UTF-16LE text contained an unpaired
    /// surrogate or other invalid sequence.
    InvalidUtf16,
    /// Bytes claiming to be base64 text didn't decode.
    InvalidBase64(base64::DecodeError),
    /// The encoder couldn't represent a text value using the record type it
    /// chose (or was asked to choose), e.g. non-numeric text for `Int8Text`.
    EncodeDomain {
        /// The text value that failed to convert.
        value: String,
        /// The record type it was being encoded as.
        target_type: &'static str,
    },
    /// The external XML parser/serializer failed.
    Xml(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Io(err) => write!(f, "I/O error: {}", err),
            Error::UnexpectedRecordCode { code, position } => write!(
                f,
                "unexpected record code 0x{:02X} at byte offset {}",
                code, position
            ),
            Error::UnexpectedAttribute { code, position } => write!(
                f,
                "attribute-family record 0x{:02X} at offset {} appeared outside a start-tag",
                code, position
            ),
            Error::InvalidDictionaryKey(key) => {
                write!(f, "dictionary key {} not found in static or session dictionary", key)
            }
            Error::InvalidPrefixIndex(index) => write!(
                f,
                "QNameDictionaryText prefix index {} is outside 0..=25",
                index
            ),
            Error::MultiByteInt31Overflow => {
                write!(f, "MultiByteInt31 exceeds 2^31 - 1 or needs a sixth byte")
            }
            Error::TruncatedValue { kind, needed, available } => write!(
                f,
                "truncated {}: needed {} bytes, only {} available",
                kind, needed, available
            ),
            Error::UnbalancedDocument => {
                write!(f, "unbalanced document: EndElement with no open element, or unclosed elements at EOF")
            }
            Error::DuplicateAttribute { prefix, name } => match prefix {
                Some(p) => write!(f, "duplicate attribute {}:{}", p, name),
                None => write!(f, "duplicate attribute {}", name),
            },
            Error::InvalidUtf8(err) => write!(f, "invalid UTF-8: {}", err),
            Error::InvalidUtf16 => write!(f, "invalid UTF-16LE text"),
            Error::InvalidBase64(err) => write!(f, "invalid base64: {}", err),
            Error::EncodeDomain { value, target_type } => write!(
                f,
                "cannot encode {:?} as {}",
                value, target_type
            ),
            Error::Xml(msg) => write!(f, "XML error: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            Error::InvalidUtf8(err) => Some(err),
            Error::InvalidBase64(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<std::str::Utf8Error> for Error {
    fn from(e: std::str::Utf8Error) -> Self {
        Error::InvalidUtf8(e)
    }
}

impl From<base64::DecodeError> for Error {
    fn from(e: base64::DecodeError) -> Self {
        Error::InvalidBase64(e)
    }
}

impl From<quick_xml::Error> for Error {
    fn from(e: quick_xml::Error) -> Self {
        Error::Xml(e.to_string())
    }
}
