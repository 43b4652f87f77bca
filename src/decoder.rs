//! The record dispatcher (spec §4.4): turns a byte stream into the XML text
//! the codec promises. Modeled as a recursive-descent reader over a byte
//! slice, in the spirit of `element.rs`'s `Parser` (a `match` on the marker
//! byte driving nested reads) but tracking an explicit open-element stack
//! instead of relying on the caller's recursion for bookkeeping errors.

use crate::dictionary::Dictionaries;
use crate::error::{Error, Result};
use crate::record::{letter_for_index, RecordCode, TextKind};
use crate::text;
use crate::varint;

fn position(input: &[u8], cursor: &[u8]) -> usize {
    input.len() - cursor.len()
}

fn read_u8(input: &[u8], cursor: &mut &[u8]) -> Result<u8> {
    match cursor.split_first() {
        Some((b, rest)) => {
            *cursor = rest;
            Ok(*b)
        }
        None => Err(Error::TruncatedValue {
            kind: "record code",
            needed: 1,
            available: 0,
        }),
    }
}

/// `readString` (spec §4.1): a `MultiByteInt31` length, then that many UTF-8
/// bytes.
fn read_string(cursor: &mut &[u8]) -> Result<String> {
    let len = varint::read_u32(cursor)? as usize;
    if cursor.len() < len {
        return Err(Error::TruncatedValue {
            kind: "string",
            needed: len,
            available: cursor.len(),
        });
    }
    let (head, tail) = cursor.split_at(len);
    *cursor = tail;
    Ok(std::str::from_utf8(head)?.to_string())
}

fn is_attribute_byte(b: u8) -> bool {
    (0x04..=0x3F).contains(&b)
}

fn is_element_byte(b: u8) -> bool {
    (0x40..=0x77).contains(&b)
}

/// A collected attribute, distinguishing xmlns bindings so the caller can
/// render them before other attributes if it chooses.
enum AttrRecord {
    Plain {
        prefix: Option<String>,
        local: String,
        value: String,
    },
    Xmlns {
        prefix: Option<String>,
        uri: String,
    },
}

/// Read one element-start record's `(prefix, local)`, given its already-read
/// code. Does not touch attributes.
fn read_element_header(
    input: &[u8],
    code: RecordCode,
    cursor: &mut &[u8],
    dicts: &Dictionaries,
) -> Result<(Option<String>, String)> {
    use RecordCode::*;
    Ok(match code {
        ShortElement => (None, read_string(cursor)?),
        Element => {
            let prefix = read_string(cursor)?;
            let local = read_string(cursor)?;
            (Some(prefix), local)
        }
        ShortDictionaryElement => {
            let key = varint::read_u32(cursor)?;
            (None, dicts.lookup(key)?.to_string())
        }
        DictionaryElement => {
            let prefix = read_string(cursor)?;
            let key = varint::read_u32(cursor)?;
            (Some(prefix), dicts.lookup(key)?.to_string())
        }
        PrefixDictionaryElement(letter) => {
            let key = varint::read_u32(cursor)?;
            (
                Some(letter_for_index(letter).to_string()),
                dicts.lookup(key)?.to_string(),
            )
        }
        PrefixElement(letter) => (
            Some(letter_for_index(letter).to_string()),
            read_string(cursor)?,
        ),
        _ => {
            return Err(Error::UnexpectedRecordCode {
                code: code.into_u8(),
                position: position(input, cursor),
            })
        }
    })
}

/// Read one attribute- or xmlns-family record, given its already-read code.
/// The value-record's with-end-element bit is ignored: it has no meaning
/// inside a start-tag, since the enclosing element's start-tag isn't even
/// finished yet.
fn read_attribute_record(
    input: &[u8],
    code: RecordCode,
    cursor: &mut &[u8],
    dicts: &Dictionaries,
) -> Result<AttrRecord> {
    use RecordCode::*;
    Ok(match code {
        ShortAttribute => AttrRecord::Plain {
            prefix: None,
            local: read_string(cursor)?,
            value: read_attribute_value(input, cursor, dicts)?,
        },
        Attribute => {
            let prefix = read_string(cursor)?;
            let local = read_string(cursor)?;
            let value = read_attribute_value(input, cursor, dicts)?;
            AttrRecord::Plain {
                prefix: Some(prefix),
                local,
                value,
            }
        }
        ShortDictionaryAttribute => {
            let key = varint::read_u32(cursor)?;
            let local = dicts.lookup(key)?.to_string();
            AttrRecord::Plain {
                prefix: None,
                local,
                value: read_attribute_value(input, cursor, dicts)?,
            }
        }
        DictionaryAttribute => {
            let prefix = read_string(cursor)?;
            let key = varint::read_u32(cursor)?;
            let local = dicts.lookup(key)?.to_string();
            AttrRecord::Plain {
                prefix: Some(prefix),
                local,
                value: read_attribute_value(input, cursor, dicts)?,
            }
        }
        ShortXmlnsAttribute => AttrRecord::Xmlns {
            prefix: None,
            uri: read_string(cursor)?,
        },
        XmlnsAttribute => {
            let prefix = read_string(cursor)?;
            let uri = read_string(cursor)?;
            AttrRecord::Xmlns {
                prefix: Some(prefix),
                uri,
            }
        }
        ShortDictionaryXmlnsAttribute => {
            let key = varint::read_u32(cursor)?;
            AttrRecord::Xmlns {
                prefix: None,
                uri: dicts.lookup(key)?.to_string(),
            }
        }
        DictionaryXmlnsAttribute => {
            let prefix = read_string(cursor)?;
            let key = varint::read_u32(cursor)?;
            AttrRecord::Xmlns {
                prefix: Some(prefix),
                uri: dicts.lookup(key)?.to_string(),
            }
        }
        PrefixDictionaryAttribute(letter) => {
            let key = varint::read_u32(cursor)?;
            let local = dicts.lookup(key)?.to_string();
            AttrRecord::Plain {
                prefix: Some(letter_for_index(letter).to_string()),
                local,
                value: read_attribute_value(input, cursor, dicts)?,
            }
        }
        PrefixAttribute(letter) => {
            let local = read_string(cursor)?;
            AttrRecord::Plain {
                prefix: Some(letter_for_index(letter).to_string()),
                local,
                value: read_attribute_value(input, cursor, dicts)?,
            }
        }
        _ => {
            return Err(Error::UnexpectedAttribute {
                code: code.into_u8(),
                position: position(input, cursor),
            })
        }
    })
}

fn read_attribute_value(input: &[u8], cursor: &mut &[u8], dicts: &Dictionaries) -> Result<String> {
    let pos = position(input, cursor);
    let byte = read_u8(input, cursor)?;
    match RecordCode::from_u8(byte, pos)? {
        RecordCode::TypedText(t) if t.kind == TextKind::StartList => {
            decode_list(input, cursor, dicts)
        }
        RecordCode::TypedText(t) => text::read_value(t.kind, cursor, dicts),
        other => Err(Error::UnexpectedRecordCode {
            code: other.into_u8(),
            position: pos,
        }),
    }
}

/// Decode a `StartListText`/`EndListText` group (spec §3): every typed-text
/// record up to the matching `EndListText` is read and joined with a single
/// space, forming one attribute or element value.
fn decode_list(input: &[u8], cursor: &mut &[u8], dicts: &Dictionaries) -> Result<String> {
    let mut parts = Vec::new();
    loop {
        let pos = position(input, cursor);
        if cursor.is_empty() {
            return Err(Error::UnbalancedDocument);
        }
        let byte = read_u8(input, cursor)?;
        let code = RecordCode::from_u8(byte, pos)?;
        match code {
            RecordCode::TypedText(t) if t.kind == TextKind::EndList => break,
            RecordCode::TypedText(t) if t.kind == TextKind::StartList => {
                return Err(Error::UnexpectedRecordCode {
                    code: byte,
                    position: pos,
                })
            }
            RecordCode::TypedText(t) => parts.push(text::read_value(t.kind, cursor, dicts)?),
            _ => {
                return Err(Error::UnexpectedRecordCode {
                    code: byte,
                    position: pos,
                })
            }
        }
    }
    Ok(parts.join(" "))
}

fn escape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            other => out.push(other),
        }
    }
    out
}

fn escape_attr(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            other => out.push(other),
        }
    }
    out
}

fn qualified(prefix: &Option<String>, local: &str) -> String {
    match prefix {
        Some(p) => format!("{}:{}", p, local),
        None => local.to_string(),
    }
}

/// Render a start-tag (attributes and xmlns bindings in wire order) and
/// return the qualified name used to close it.
fn render_start_tag(
    out: &mut String,
    prefix: Option<String>,
    local: String,
    attrs: Vec<AttrRecord>,
) -> String {
    let qname = qualified(&prefix, &local);
    out.push('<');
    out.push_str(&qname);
    for attr in attrs {
        match attr {
            AttrRecord::Xmlns { prefix, uri } => {
                out.push(' ');
                out.push_str("xmlns");
                if let Some(p) = prefix {
                    out.push(':');
                    out.push_str(&p);
                }
                out.push_str("=\"");
                out.push_str(&escape_attr(&uri));
                out.push('"');
            }
            AttrRecord::Plain {
                prefix,
                local,
                value,
            } => {
                out.push(' ');
                out.push_str(&qualified(&prefix, &local));
                out.push_str("=\"");
                out.push_str(&escape_attr(&value));
                out.push('"');
            }
        }
    }
    out.push('>');
    qname
}

/// Read one element's attribute set (everything between the element-start
/// record and the first non-attribute record).
fn read_attributes(
    input: &[u8],
    cursor: &mut &[u8],
    dicts: &Dictionaries,
) -> Result<Vec<AttrRecord>> {
    let mut attrs = Vec::new();
    while let Some(&b) = cursor.first() {
        if !is_attribute_byte(b) {
            break;
        }
        let pos = position(input, cursor);
        let byte = read_u8(input, cursor)?;
        let code = RecordCode::from_u8(byte, pos)?;
        attrs.push(read_attribute_record(input, code, cursor, dicts)?);
    }
    Ok(attrs)
}

/// Decode one element (already past its start-tag's record code) through to
/// its matching `EndElement`, appending rendered XML to `out`.
fn decode_element(
    input: &[u8],
    code: RecordCode,
    cursor: &mut &[u8],
    dicts: &Dictionaries,
    out: &mut String,
) -> Result<()> {
    let (prefix, local) = read_element_header(input, code, cursor, dicts)?;
    let attrs = read_attributes(input, cursor, dicts)?;
    let qname = render_start_tag(out, prefix, local, attrs);

    loop {
        let pos = position(input, cursor);
        if cursor.is_empty() {
            return Err(Error::UnbalancedDocument);
        }
        let byte = read_u8(input, cursor)?;
        let inner = RecordCode::from_u8(byte, pos)?;
        match inner {
            RecordCode::EndElement => {
                out.push_str("</");
                out.push_str(&qname);
                out.push('>');
                return Ok(());
            }
            RecordCode::Comment => {
                let text = read_string(cursor)?;
                out.push_str("<!--");
                out.push_str(&text);
                out.push_str("-->");
            }
            RecordCode::Array => {
                decode_array(input, cursor, dicts, out)?;
            }
            RecordCode::TypedText(t) if t.kind == TextKind::StartList => {
                let value = decode_list(input, cursor, dicts)?;
                out.push_str(&escape_text(&value));
            }
            RecordCode::TypedText(t) => {
                let value = text::read_value(t.kind, cursor, dicts)?;
                out.push_str(&escape_text(&value));
                if t.with_end_element {
                    out.push_str("</");
                    out.push_str(&qname);
                    out.push('>');
                    return Ok(());
                }
            }
            other if is_element_byte(byte) => {
                decode_element(input, other, cursor, dicts, out)?;
            }
            _ if is_attribute_byte(byte) => {
                return Err(Error::UnexpectedAttribute {
                    code: byte,
                    position: pos,
                })
            }
            _ => {
                return Err(Error::UnexpectedRecordCode {
                    code: byte,
                    position: pos,
                })
            }
        }
    }
}

/// Decode an `Array` record (spec §3/§9): a template element, a count, a
/// single type tag, then that many raw values with no repeated code byte.
fn decode_array(
    input: &[u8],
    cursor: &mut &[u8],
    dicts: &Dictionaries,
    out: &mut String,
) -> Result<()> {
    let pos = position(input, cursor);
    let byte = read_u8(input, cursor)?;
    let code = RecordCode::from_u8(byte, pos)?;
    let (prefix, local) = read_element_header(input, code, cursor, dicts)?;
    let _attrs = read_attributes(input, cursor, dicts)?;
    let end_pos = position(input, cursor);
    let end_byte = read_u8(input, cursor)?;
    if !matches!(RecordCode::from_u8(end_byte, end_pos)?, RecordCode::EndElement) {
        return Err(Error::UnexpectedRecordCode {
            code: end_byte,
            position: end_pos,
        });
    }

    let type_pos = position(input, cursor);
    let type_byte = read_u8(input, cursor)?;
    let kind = match RecordCode::from_u8(type_byte, type_pos)? {
        RecordCode::TypedText(t) => t.kind,
        other => {
            return Err(Error::UnexpectedRecordCode {
                code: other.into_u8(),
                position: type_pos,
            })
        }
    };

    let count = varint::read_u32(cursor)?;
    let qname = qualified(&prefix, &local);
    for _ in 0..count {
        let value = text::read_value(kind, cursor, dicts)?;
        out.push('<');
        out.push_str(&qname);
        out.push('>');
        out.push_str(&escape_text(&value));
        out.push_str("</");
        out.push_str(&qname);
        out.push('>');
    }
    Ok(())
}

/// Decode a complete MC-NBFX/MC-NBFS record stream into a well-formed XML
/// 1.0 document (UTF-8, no XML declaration, no added insignificant
/// whitespace). Once the top-level construct (a single element, possibly
/// via `Array`) has fully closed, any trailing bytes are ignored rather than
/// rejected — the document's root element defines where the document ends,
/// the same way a conforming XML reader stops at the root's close tag.
pub fn decode(input: &[u8], dicts: &Dictionaries) -> Result<String> {
    let mut cursor = input;
    let mut out = String::new();
    loop {
        if cursor.is_empty() {
            break;
        }
        let pos = position(input, &cursor);
        let byte = read_u8(input, &mut cursor)?;
        let code = RecordCode::from_u8(byte, pos)?;
        match code {
            RecordCode::Comment => {
                let text = read_string(&mut cursor)?;
                out.push_str("<!--");
                out.push_str(&text);
                out.push_str("-->");
            }
            RecordCode::Array => {
                decode_array(input, &mut cursor, dicts, &mut out)?;
                break;
            }
            _ if is_element_byte(byte) => {
                decode_element(input, code, &mut cursor, dicts, &mut out)?;
                break;
            }
            RecordCode::EndElement => return Err(Error::UnbalancedDocument),
            _ if is_attribute_byte(byte) => {
                return Err(Error::UnexpectedAttribute {
                    code: byte,
                    position: pos,
                })
            }
            _ => {
                return Err(Error::UnexpectedRecordCode {
                    code: byte,
                    position: pos,
                })
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nbfx() -> Dictionaries {
        Dictionaries::nbfx()
    }

    #[test]
    fn scenario_1_empty_element() {
        let bytes = [0x40, 0x03, 0x64, 0x6F, 0x63, 0x01];
        assert_eq!(decode(&bytes, &nbfx()).unwrap(), "<doc></doc>");
    }

    #[test]
    fn scenario_2_short_attribute() {
        let bytes = [
            0x40, 0x03, 0x64, 0x6F, 0x63, 0x04, 0x04, 0x61, 0x74, 0x74, 0x72, 0x84, 0x01,
        ];
        assert_eq!(
            decode(&bytes, &nbfx()).unwrap(),
            "<doc attr=\"false\"></doc>"
        );
    }

    #[test]
    fn scenario_3_array_of_int16() {
        let bytes = [
            0x03, 0x40, 0x03, 0x61, 0x72, 0x72, 0x01, 0x8B, 0x03, 0x33, 0x33, 0x88, 0x88, 0xDD,
            0xDD,
        ];
        assert_eq!(
            decode(&bytes, &nbfx()).unwrap(),
            "<arr>13107</arr><arr>-30584</arr><arr>-8739</arr>"
        );
    }

    #[test]
    fn scenario_4_nbfs_dictionary_element() {
        let bytes = [
            0x42, 0x9A, 0x01, 0x8F, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00,
        ];
        let dicts = Dictionaries::nbfs(200);
        assert_eq!(
            decode(&bytes, &dicts).unwrap(),
            "<str154>1099511627776</str154>"
        );
    }

    #[test]
    fn scenario_5_uniqueid() {
        let bytes = [
            0x40, 0x03, 0x64, 0x6F, 0x63, 0xAC, 0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77,
            0x88, 0x99, 0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF, 0x01,
        ];
        assert_eq!(
            decode(&bytes, &nbfx()).unwrap(),
            "<doc>urn:uuid:33221100-5544-7766-8899-aabbccddeeff</doc>"
        );
    }

    #[test]
    fn scenario_6_unicode_chars8() {
        let bytes = [
            0x40, 0x0C, 0x50, 0x6F, 0x73, 0x69, 0x74, 0x69, 0x6F, 0x6E, 0x4E, 0x61, 0x6D, 0x65,
            0xB7, 0x08, 0x91, 0x4E, 0x62, 0x88, 0x2D, 0x4E, 0x66, 0x5B, 0x5F,
        ];
        assert_eq!(
            decode(&bytes, &nbfx()).unwrap(),
            "<PositionName>云衢中学</PositionName>"
        );
    }

    #[test]
    fn odd_code_balances_element_stack() {
        let bytes = [0x40, 0x01, 0x61, 0x99, 0x05, b'h', b'e', b'l', b'l', b'o'];
        assert_eq!(decode(&bytes, &nbfx()).unwrap(), "<a>hello</a>");
    }

    #[test]
    fn rejects_attribute_outside_start_tag() {
        // <doc><!----> followed by an attribute-family byte mid-content,
        // well past the start-tag's attribute scope.
        let bytes = [0x40, 0x03, 0x64, 0x6F, 0x63, 0x02, 0x00, 0x04, 0x01, 0x61];
        assert!(matches!(
            decode(&bytes, &nbfx()),
            Err(Error::UnexpectedAttribute { .. })
        ));
    }

    #[test]
    fn rejects_unbalanced_end_element() {
        let bytes = [0x01];
        assert!(matches!(
            decode(&bytes, &nbfx()),
            Err(Error::UnbalancedDocument)
        ));
    }

    #[test]
    fn bool_array() {
        let bytes = [
            0x03, 0x40, 0x03, 0x61, 0x72, 0x72, 0x01, 0xB5, 0x05, 0x01, 0x00, 0x01, 0x00, 0x01,
        ];
        assert_eq!(
            decode(&bytes, &nbfx()).unwrap(),
            "<arr>true</arr><arr>false</arr><arr>true</arr><arr>false</arr><arr>true</arr>"
        );
    }

    #[test]
    fn nested_elements() {
        // <outer><inner>x</inner></outer>
        let bytes = [
            0x40, 0x05, b'o', b'u', b't', b'e', b'r', 0x40, 0x05, b'i', b'n', b'n', b'e', b'r',
            0x99, 0x01, b'x', 0x01,
        ];
        assert_eq!(
            decode(&bytes, &nbfx()).unwrap(),
            "<outer><inner>x</inner></outer>"
        );
    }

    #[test]
    fn xmlns_attribute_rendering() {
        // <doc xmlns="urn:a"></doc>
        let mut bytes = vec![0x40, 0x03, b'd', b'o', b'c', 0x08];
        let uri = b"urn:a";
        bytes.push(uri.len() as u8);
        bytes.extend_from_slice(uri);
        bytes.push(0x01);
        assert_eq!(
            decode(&bytes, &nbfx()).unwrap(),
            "<doc xmlns=\"urn:a\"></doc>"
        );
    }

    #[test]
    fn list_text_joins_values_with_a_space() {
        // <doc>1 0</doc>, via StartListText(OneText, ZeroText)EndListText.
        let bytes = [0x40, 0x03, b'd', b'o', b'c', 0xA4, 0x82, 0x80, 0xA6, 0x01];
        assert_eq!(decode(&bytes, &nbfx()).unwrap(), "<doc>1 0</doc>");
    }

    #[test]
    fn list_text_works_as_an_attribute_value() {
        // <doc attr="1 0"></doc>
        let bytes = [
            0x40, 0x03, b'd', b'o', b'c', 0x04, 0x04, b'a', b't', b't', b'r', 0xA4, 0x82, 0x80,
            0xA6, 0x01,
        ];
        assert_eq!(
            decode(&bytes, &nbfx()).unwrap(),
            "<doc attr=\"1 0\"></doc>"
        );
    }
}
