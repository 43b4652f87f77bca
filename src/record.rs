//! The record-code table (spec §3): a single byte identifies which of the
//! ~0xC0 record families follows. Modeled as `(family, prefix_letter)` pairs
//! rather than one enum variant per code, per the design note in spec §9 —
//! this keeps the dispatcher a `match` over families, linear in family
//! count rather than code count. Mirrors `marker.rs`'s `Marker::from_u8` /
//! `into_u8` pattern.

use crate::error::{Error, Result};

/// One of the ~0xC0 record codes, decomposed into its family.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecordCode {
    EndElement,
    Comment,
    Array,
    ShortAttribute,
    Attribute,
    ShortDictionaryAttribute,
    DictionaryAttribute,
    ShortXmlnsAttribute,
    XmlnsAttribute,
    ShortDictionaryXmlnsAttribute,
    DictionaryXmlnsAttribute,
    /// `letter` is 0..=25, mapping to prefix `'a' + letter`.
    PrefixDictionaryAttribute(u8),
    PrefixAttribute(u8),
    ShortElement,
    Element,
    ShortDictionaryElement,
    DictionaryElement,
    PrefixDictionaryElement(u8),
    PrefixElement(u8),
    TypedText(TypedText),
}

/// A typed-text record family (spec §4.3). `with_end_element` is the odd/even
/// bit: when set, decoding the value also closes the enclosing element.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TypedText {
    pub kind: TextKind,
    pub with_end_element: bool,
}

/// Which typed-text value format a record carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextKind {
    Zero,
    One,
    False,
    True,
    Int8,
    Int16,
    Int32,
    Int64,
    Float,
    Double,
    Decimal,
    DateTime,
    Chars8,
    Chars16,
    Chars32,
    Bytes8,
    Bytes16,
    Bytes32,
    StartList,
    EndList,
    Empty,
    Dictionary,
    UniqueId,
    TimeSpan,
    Uuid,
    UInt64,
    Bool,
    UnicodeChars8,
    UnicodeChars16,
    UnicodeChars32,
    QNameDictionary,
}

const PREFIX_DICT_ATTR_BASE: u8 = 0x0C;
const PREFIX_ATTR_BASE: u8 = 0x26;
const PREFIX_DICT_ELEM_BASE: u8 = 0x44;
const PREFIX_ELEM_BASE: u8 = 0x5E;
const TEXT_BASE: u8 = 0x80;

/// Map a prefix family's zero-based letter index to the single lowercase
/// ASCII letter it stands for. The prefix-family record codes themselves
/// (`PrefixElement`, `PrefixAttribute`, ...) always carry an index already
/// bounded to `0..=25` by their 26-byte range in [`RecordCode::from_u8`];
/// callers reading a free-standing index byte off the wire (`QNameDictionaryText`)
/// must check `index <= 25` themselves before calling this, since `u8::MAX`
/// would otherwise overflow past `'z'`.
pub fn letter_for_index(index: u8) -> char {
    (b'a' + index) as char
}

/// The inverse of [`letter_for_index`]: map a single lowercase ASCII letter
/// to its zero-based index, if it's in `'a'..='z'`.
pub fn index_for_letter(c: char) -> Option<u8> {
    if c.is_ascii_lowercase() {
        Some(c as u8 - b'a')
    } else {
        None
    }
}

impl RecordCode {
    /// Decode a record code byte. `position` is only used to annotate the
    /// error if the byte isn't a known code.
    pub fn from_u8(byte: u8, position: usize) -> Result<Self> {
        use RecordCode::*;
        Ok(match byte {
            0x01 => EndElement,
            0x02 => Comment,
            0x03 => Array,
            0x04 => ShortAttribute,
            0x05 => Attribute,
            0x06 => ShortDictionaryAttribute,
            0x07 => DictionaryAttribute,
            0x08 => ShortXmlnsAttribute,
            0x09 => XmlnsAttribute,
            0x0A => ShortDictionaryXmlnsAttribute,
            0x0B => DictionaryXmlnsAttribute,
            PREFIX_DICT_ATTR_BASE..=0x25 => {
                PrefixDictionaryAttribute(byte - PREFIX_DICT_ATTR_BASE)
            }
            PREFIX_ATTR_BASE..=0x3F => PrefixAttribute(byte - PREFIX_ATTR_BASE),
            0x40 => ShortElement,
            0x41 => Element,
            0x42 => ShortDictionaryElement,
            0x43 => DictionaryElement,
            PREFIX_DICT_ELEM_BASE..=0x5D => PrefixDictionaryElement(byte - PREFIX_DICT_ELEM_BASE),
            PREFIX_ELEM_BASE..=0x77 => PrefixElement(byte - PREFIX_ELEM_BASE),
            0x80..=0xBD => {
                let offset = byte - TEXT_BASE;
                let with_end_element = offset % 2 == 1;
                let kind = text_kind_for_offset(offset & !1).ok_or(Error::UnexpectedRecordCode {
                    code: byte,
                    position,
                })?;
                TypedText(
                    TypedText {
                        kind,
                        with_end_element,
                    }
                    .validate(byte, position)?,
                )
            }
            _ => {
                return Err(Error::UnexpectedRecordCode {
                    code: byte,
                    position,
                })
            }
        })
    }

    /// Encode this record code back to its byte.
    pub fn into_u8(self) -> u8 {
        use RecordCode::*;
        match self {
            EndElement => 0x01,
            Comment => 0x02,
            Array => 0x03,
            ShortAttribute => 0x04,
            Attribute => 0x05,
            ShortDictionaryAttribute => 0x06,
            DictionaryAttribute => 0x07,
            ShortXmlnsAttribute => 0x08,
            XmlnsAttribute => 0x09,
            ShortDictionaryXmlnsAttribute => 0x0A,
            DictionaryXmlnsAttribute => 0x0B,
            PrefixDictionaryAttribute(letter) => PREFIX_DICT_ATTR_BASE + letter,
            PrefixAttribute(letter) => PREFIX_ATTR_BASE + letter,
            ShortElement => 0x40,
            Element => 0x41,
            ShortDictionaryElement => 0x42,
            DictionaryElement => 0x43,
            PrefixDictionaryElement(letter) => PREFIX_DICT_ELEM_BASE + letter,
            PrefixElement(letter) => PREFIX_ELEM_BASE + letter,
            TypedText(t) => {
                let offset = text_offset_for_kind(t.kind);
                TEXT_BASE + offset + (t.with_end_element as u8)
            }
        }
    }
}

/// `offset` here is always the even (base) offset of the pair.
fn text_kind_for_offset(offset: u8) -> Option<TextKind> {
    use TextKind::*;
    Some(match offset {
        0x00 => Zero,
        0x02 => One,
        0x04 => False,
        0x06 => True,
        0x08 => Int8,
        0x0A => Int16,
        0x0C => Int32,
        0x0E => Int64,
        0x10 => Float,
        0x12 => Double,
        0x14 => Decimal,
        0x16 => DateTime,
        0x18 => Chars8,
        0x1A => Chars16,
        0x1C => Chars32,
        0x1E => Bytes8,
        0x20 => Bytes16,
        0x22 => Bytes32,
        0x24 => StartList,
        0x26 => EndList,
        0x28 => Empty,
        0x2A => Dictionary,
        0x2C => UniqueId,
        0x2E => TimeSpan,
        0x30 => Uuid,
        0x32 => UInt64,
        0x34 => Bool,
        0x36 => UnicodeChars8,
        0x38 => UnicodeChars16,
        0x3A => UnicodeChars32,
        0x3C => QNameDictionary,
        _ => return None,
    })
}

fn text_offset_for_kind(kind: TextKind) -> u8 {
    use TextKind::*;
    match kind {
        Zero => 0x00,
        One => 0x02,
        False => 0x04,
        True => 0x06,
        Int8 => 0x08,
        Int16 => 0x0A,
        Int32 => 0x0C,
        Int64 => 0x0E,
        Float => 0x10,
        Double => 0x12,
        Decimal => 0x14,
        DateTime => 0x16,
        Chars8 => 0x18,
        Chars16 => 0x1A,
        Chars32 => 0x1C,
        Bytes8 => 0x1E,
        Bytes16 => 0x20,
        Bytes32 => 0x22,
        StartList => 0x24,
        EndList => 0x26,
        Empty => 0x28,
        Dictionary => 0x2A,
        UniqueId => 0x2C,
        TimeSpan => 0x2E,
        Uuid => 0x30,
        UInt64 => 0x32,
        Bool => 0x34,
        UnicodeChars8 => 0x36,
        UnicodeChars16 => 0x38,
        UnicodeChars32 => 0x3A,
        QNameDictionary => 0x3C,
    }
}

/// `StartListText` and `EndListText` don't have a with-end-element variant
/// in the spec's own record table (only 0xA4 and 0xA6 are named); reject the
/// odd "sibling" codes explicitly rather than silently accepting them.
pub fn is_list_marker_without_end_element_variant(kind: TextKind) -> bool {
    matches!(kind, TextKind::StartList | TextKind::EndList)
}

impl TypedText {
    /// Validate that `with_end_element` is actually legal for this text
    /// kind (StartList/EndList never merge with an EndElement).
    pub fn validate(self, byte: u8, position: usize) -> Result<Self> {
        if self.with_end_element && is_list_marker_without_end_element_variant(self.kind) {
            return Err(Error::UnexpectedRecordCode { code: byte, position });
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_fixed_codes() {
        let codes = [
            RecordCode::EndElement,
            RecordCode::Comment,
            RecordCode::Array,
            RecordCode::ShortAttribute,
            RecordCode::Attribute,
            RecordCode::ShortElement,
            RecordCode::Element,
            RecordCode::ShortDictionaryElement,
            RecordCode::DictionaryElement,
        ];
        for code in codes {
            let byte = code.into_u8();
            assert_eq!(RecordCode::from_u8(byte, 0).unwrap(), code);
        }
    }

    #[test]
    fn prefix_families_cover_all_26_letters() {
        for letter in 0..26u8 {
            let code = RecordCode::PrefixDictionaryAttribute(letter);
            let byte = code.into_u8();
            assert_eq!(byte, 0x0C + letter);
            assert_eq!(RecordCode::from_u8(byte, 0).unwrap(), code);

            let code = RecordCode::PrefixAttribute(letter);
            assert_eq!(code.into_u8(), 0x26 + letter);

            let code = RecordCode::PrefixDictionaryElement(letter);
            assert_eq!(code.into_u8(), 0x44 + letter);

            let code = RecordCode::PrefixElement(letter);
            assert_eq!(code.into_u8(), 0x5E + letter);
        }
    }

    #[test]
    fn letter_mapping() {
        assert_eq!(letter_for_index(0), 'a');
        assert_eq!(letter_for_index(25), 'z');
        assert_eq!(index_for_letter('a'), Some(0));
        assert_eq!(index_for_letter('z'), Some(25));
        assert_eq!(index_for_letter('A'), None);
    }

    #[test]
    fn typed_text_odd_even() {
        let code = RecordCode::from_u8(0x8B, 0).unwrap();
        match code {
            RecordCode::TypedText(t) => {
                assert_eq!(t.kind, TextKind::Int16);
                assert!(t.with_end_element);
            }
            _ => panic!("expected typed text"),
        }
        let code = RecordCode::from_u8(0x8A, 0).unwrap();
        match code {
            RecordCode::TypedText(t) => {
                assert_eq!(t.kind, TextKind::Int16);
                assert!(!t.with_end_element);
            }
            _ => panic!("expected typed text"),
        }
    }

    #[test]
    fn unknown_code_errors() {
        assert!(matches!(
            RecordCode::from_u8(0x00, 7),
            Err(Error::UnexpectedRecordCode { code: 0x00, position: 7 })
        ));
        assert!(matches!(
            RecordCode::from_u8(0xFF, 0),
            Err(Error::UnexpectedRecordCode { code: 0xFF, .. })
        ));
    }

    #[test]
    fn list_markers_reject_the_with_end_element_bit() {
        // 0xA4/0xA6 are StartListText/EndListText; the spec names no odd
        // sibling for either, so 0xA5/0xA7 must be rejected rather than
        // silently treated as a with-end-element variant.
        assert!(matches!(
            RecordCode::from_u8(0xA5, 0),
            Err(Error::UnexpectedRecordCode { code: 0xA5, .. })
        ));
        assert!(matches!(
            RecordCode::from_u8(0xA7, 0),
            Err(Error::UnexpectedRecordCode { code: 0xA7, .. })
        ));
        assert!(RecordCode::from_u8(0xA4, 0).is_ok());
        assert!(RecordCode::from_u8(0xA6, 0).is_ok());
    }

    #[test]
    fn qname_dictionary_text_code() {
        let code = RecordCode::from_u8(0xBC, 0).unwrap();
        assert_eq!(
            code,
            RecordCode::TypedText(TypedText {
                kind: TextKind::QNameDictionary,
                with_end_element: false
            })
        );
    }
}
