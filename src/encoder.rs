//! The encoder (spec §4.5): turns a well-formed XML 1.0 text document into
//! the record stream that decodes back to the same infoset. The external
//! XML reader is `quick_xml`, the same crate `other_examples`' WBXML codec
//! reaches for to turn XML text into a plain event stream; this module's
//! job is entirely the event-to-record choice, same division of labor as
//! `element.rs`'s `serialize_elem` (pick the smallest applicable marker).

use std::sync::OnceLock;

use quick_xml::events::Event as XmlEvent;
use quick_xml::Reader;
use regex::Regex;

use crate::dictionary::Dictionaries;
use crate::error::{Error, Result};
use crate::event::{Attribute, Event, XmlnsBinding};
use crate::record::{index_for_letter, RecordCode, TextKind, TypedText};
use crate::text::{self, DateTime, Decimal, Guid, LenWidth};
use crate::varint;

fn guid_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$",
        )
        .expect("static pattern")
    })
}

fn decimal_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^-?[0-9]+\.[0-9]+$").expect("static pattern"))
}

fn split_qname(name: &str) -> (Option<String>, String) {
    match name.split_once(':') {
        Some((prefix, local)) => (Some(prefix.to_string()), local.to_string()),
        None => (None, name.to_string()),
    }
}

fn write_len_string(out: &mut Vec<u8>, s: &str) {
    varint::write_u32(out, s.len() as u32);
    out.extend_from_slice(s.as_bytes());
}

fn single_lowercase_letter(prefix: &Option<String>) -> Option<u8> {
    let p = prefix.as_ref()?;
    let mut chars = p.chars();
    let c = chars.next()?;
    if chars.next().is_some() {
        return None;
    }
    index_for_letter(c)
}

/// Choose and write the smallest applicable element-start record (spec
/// §4.5: prefix family, then dictionary, then `Short`).
fn write_element_start(out: &mut Vec<u8>, prefix: &Option<String>, local: &str, dicts: &Dictionaries) {
    if let Some(letter) = single_lowercase_letter(prefix) {
        if let Some(key) = dicts.reverse_lookup(local) {
            out.push(RecordCode::PrefixDictionaryElement(letter).into_u8());
            varint::write_u32(out, key);
        } else {
            out.push(RecordCode::PrefixElement(letter).into_u8());
            write_len_string(out, local);
        }
        return;
    }
    if let Some(key) = dicts.reverse_lookup(local) {
        match prefix {
            Some(p) => {
                out.push(RecordCode::DictionaryElement.into_u8());
                write_len_string(out, p);
                varint::write_u32(out, key);
            }
            None => {
                out.push(RecordCode::ShortDictionaryElement.into_u8());
                varint::write_u32(out, key);
            }
        }
        return;
    }
    match prefix {
        Some(p) => {
            out.push(RecordCode::Element.into_u8());
            write_len_string(out, p);
            write_len_string(out, local);
        }
        None => {
            out.push(RecordCode::ShortElement.into_u8());
            write_len_string(out, local);
        }
    }
}

fn write_attribute_header(
    out: &mut Vec<u8>,
    prefix: &Option<String>,
    local: &str,
    dicts: &Dictionaries,
) {
    if let Some(letter) = single_lowercase_letter(prefix) {
        if let Some(key) = dicts.reverse_lookup(local) {
            out.push(RecordCode::PrefixDictionaryAttribute(letter).into_u8());
            varint::write_u32(out, key);
        } else {
            out.push(RecordCode::PrefixAttribute(letter).into_u8());
            write_len_string(out, local);
        }
        return;
    }
    if let Some(key) = dicts.reverse_lookup(local) {
        match prefix {
            Some(p) => {
                out.push(RecordCode::DictionaryAttribute.into_u8());
                write_len_string(out, p);
                varint::write_u32(out, key);
            }
            None => {
                out.push(RecordCode::ShortDictionaryAttribute.into_u8());
                varint::write_u32(out, key);
            }
        }
        return;
    }
    match prefix {
        Some(p) => {
            out.push(RecordCode::Attribute.into_u8());
            write_len_string(out, p);
            write_len_string(out, local);
        }
        None => {
            out.push(RecordCode::ShortAttribute.into_u8());
            write_len_string(out, local);
        }
    }
}

fn write_xmlns(out: &mut Vec<u8>, prefix: &Option<String>, uri: &str, dicts: &Dictionaries) {
    if let Some(key) = dicts.reverse_lookup(uri) {
        match prefix {
            Some(p) => {
                out.push(RecordCode::DictionaryXmlnsAttribute.into_u8());
                write_len_string(out, p);
                varint::write_u32(out, key);
            }
            None => {
                out.push(RecordCode::ShortDictionaryXmlnsAttribute.into_u8());
                varint::write_u32(out, key);
            }
        }
        return;
    }
    match prefix {
        Some(p) => {
            out.push(RecordCode::XmlnsAttribute.into_u8());
            write_len_string(out, p);
            write_len_string(out, uri);
        }
        None => {
            out.push(RecordCode::ShortXmlnsAttribute.into_u8());
            write_len_string(out, uri);
        }
    }
}

fn write_start_tag(
    out: &mut Vec<u8>,
    prefix: &Option<String>,
    local: &str,
    attrs: &[Attribute],
    xmlns_bindings: &[XmlnsBinding],
    dicts: &Dictionaries,
) -> Result<()> {
    write_element_start(out, prefix, local, dicts);
    for binding in xmlns_bindings {
        write_xmlns(out, &binding.prefix, &binding.uri, dicts);
    }
    for attr in attrs {
        write_attribute_header(out, &attr.prefix, &attr.local, dicts);
        write_text_value(out, &attr.value, false)?;
    }
    Ok(())
}

/// Choose the most specific typed-text record for `value`'s lexical form
/// (spec §4.5) and write it, including the leading code byte.
fn write_text_value(out: &mut Vec<u8>, value: &str, with_end_element: bool) -> Result<()> {
    let push = |out: &mut Vec<u8>, kind: TextKind| {
        out.push(
            RecordCode::TypedText(TypedText {
                kind,
                with_end_element,
            })
            .into_u8(),
        );
    };

    if value.is_empty() {
        push(out, TextKind::Empty);
        return Ok(());
    }
    if value == "0" {
        push(out, TextKind::Zero);
        return Ok(());
    }
    if value == "1" {
        push(out, TextKind::One);
        return Ok(());
    }
    if value == "true" {
        push(out, TextKind::True);
        return Ok(());
    }
    if value == "false" {
        push(out, TextKind::False);
        return Ok(());
    }
    if let Ok(v) = value.parse::<i64>() {
        if let Ok(v) = i8::try_from(v) {
            push(out, TextKind::Int8);
            text::write_int8(out, v);
        } else if let Ok(v) = i16::try_from(v) {
            push(out, TextKind::Int16);
            text::write_int16(out, v);
        } else if let Ok(v) = i32::try_from(v) {
            push(out, TextKind::Int32);
            text::write_int32(out, v);
        } else {
            push(out, TextKind::Int64);
            text::write_int64(out, v);
        }
        return Ok(());
    }
    if decimal_pattern().is_match(value) {
        if let Ok(d) = Decimal::parse(value) {
            push(out, TextKind::Decimal);
            d.write(out);
            return Ok(());
        }
    }
    if value.contains('T') {
        if let Ok(dt) = DateTime::parse(value) {
            push(out, TextKind::DateTime);
            dt.write(out);
            return Ok(());
        }
    }
    if let Some(rest) = value.strip_prefix("urn:uuid:") {
        if let Ok(g) = Guid::parse(rest) {
            push(out, TextKind::UniqueId);
            g.write(out);
            return Ok(());
        }
    }
    if guid_pattern().is_match(value) {
        if let Ok(g) = Guid::parse(value) {
            push(out, TextKind::Uuid);
            g.write(out);
            return Ok(());
        }
    }
    let len = value.len();
    let (kind, width) = if len <= 0xFF {
        (TextKind::Chars8, LenWidth::W8)
    } else if len <= 0xFFFF {
        (TextKind::Chars16, LenWidth::W16)
    } else {
        (TextKind::Chars32, LenWidth::W32)
    };
    push(out, kind);
    text::write_chars(out, value, width);
    Ok(())
}

fn write_comment(out: &mut Vec<u8>, text: &str) {
    out.push(RecordCode::Comment.into_u8());
    write_len_string(out, text);
}

fn split_xmlns_attrs(
    attrs: Vec<(String, String)>,
) -> (Vec<Attribute>, Vec<XmlnsBinding>) {
    let mut plain = Vec::new();
    let mut xmlns = Vec::new();
    for (name, value) in attrs {
        if name == "xmlns" {
            xmlns.push(XmlnsBinding { prefix: None, uri: value });
        } else if let Some(prefix) = name.strip_prefix("xmlns:") {
            xmlns.push(XmlnsBinding {
                prefix: Some(prefix.to_string()),
                uri: value,
            });
        } else {
            let (prefix, local) = split_qname(&name);
            plain.push(Attribute { prefix, local, value });
        }
    }
    (plain, xmlns)
}

fn read_attrs(e: &quick_xml::events::BytesStart) -> Result<Vec<(String, String)>> {
    let mut out = Vec::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|err| Error::Xml(err.to_string()))?;
        let key = std::str::from_utf8(attr.key.as_ref())?.to_string();
        let value = attr
            .unescape_value()
            .map_err(|err| Error::Xml(err.to_string()))?
            .into_owned();
        out.push((key, value));
    }
    Ok(out)
}

/// Parse XML text into `nbfx::event` values through `quick_xml`'s pull
/// reader (spec §6's "external XML reader" collaborator). A self-closing
/// tag becomes a `StartElement` immediately followed by an `EndElement`,
/// same as `decoder.rs` would produce for either spelling.
fn parse(xml: &str) -> Result<Vec<Event>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut out = Vec::new();
    loop {
        match reader.read_event() {
            Ok(XmlEvent::Eof) => break,
            Ok(XmlEvent::Start(e)) => {
                let name = std::str::from_utf8(e.name().as_ref())?.to_string();
                let (prefix, local) = split_qname(&name);
                let (attrs, xmlns_bindings) = split_xmlns_attrs(read_attrs(&e)?);
                out.push(Event::StartElement {
                    prefix,
                    local,
                    attrs,
                    xmlns_bindings,
                });
            }
            Ok(XmlEvent::Empty(e)) => {
                let name = std::str::from_utf8(e.name().as_ref())?.to_string();
                let (prefix, local) = split_qname(&name);
                let (attrs, xmlns_bindings) = split_xmlns_attrs(read_attrs(&e)?);
                out.push(Event::StartElement {
                    prefix,
                    local,
                    attrs,
                    xmlns_bindings,
                });
                out.push(Event::EndElement);
            }
            Ok(XmlEvent::End(_)) => out.push(Event::EndElement),
            Ok(XmlEvent::Text(e)) => {
                let text_value = e.unescape().map_err(|err| Error::Xml(err.to_string()))?;
                if !text_value.is_empty() {
                    out.push(Event::Text(text_value.into_owned()));
                }
            }
            Ok(XmlEvent::CData(e)) => {
                let text_value = std::str::from_utf8(e.as_ref())?.to_string();
                out.push(Event::Text(text_value));
            }
            Ok(XmlEvent::Comment(e)) => {
                let text_value = std::str::from_utf8(e.as_ref())?.to_string();
                out.push(Event::Comment(text_value));
            }
            Ok(XmlEvent::Decl(_)) | Ok(XmlEvent::PI(_)) | Ok(XmlEvent::DocType(_)) => {}
            Ok(_) => {}
            Err(err) => return Err(Error::Xml(err.to_string())),
        }
    }
    Ok(out)
}

/// Encode a well-formed XML 1.0 document into its MC-NBFX/MC-NBFS record
/// stream. Buffers the whole document, same as the decoder buffers the
/// whole record stream (spec §5: no streaming API on either side).
pub fn encode(xml: &str, dicts: &Dictionaries) -> Result<Vec<u8>> {
    let events = parse(xml)?;
    let mut out = Vec::new();
    let mut i = 0;
    while i < events.len() {
        match &events[i] {
            Event::StartElement {
                prefix,
                local,
                attrs,
                xmlns_bindings,
            } => {
                // A start-tag immediately followed by one text value and then
                // the matching end merges into the single with-end-element
                // typed-text record (spec §4.3's odd codes), instead of a
                // separate record plus an explicit `EndElement`.
                if let (Some(Event::Text(value)), Some(Event::EndElement)) =
                    (events.get(i + 1), events.get(i + 2))
                {
                    write_start_tag(&mut out, prefix, local, attrs, xmlns_bindings, dicts)?;
                    write_text_value(&mut out, value, true)?;
                    i += 3;
                    continue;
                }
                write_start_tag(&mut out, prefix, local, attrs, xmlns_bindings, dicts)?;
                i += 1;
            }
            Event::EndElement => {
                out.push(RecordCode::EndElement.into_u8());
                i += 1;
            }
            Event::Text(value) => {
                write_text_value(&mut out, value, false)?;
                i += 1;
            }
            Event::Comment(text) => {
                write_comment(&mut out, text);
                i += 1;
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder;

    fn dicts() -> Dictionaries {
        Dictionaries::nbfx()
    }

    #[test]
    fn empty_element_roundtrips() {
        let bytes = encode("<doc></doc>", &dicts()).unwrap();
        assert_eq!(bytes, vec![0x40, 0x03, b'd', b'o', b'c', 0x01]);
        assert_eq!(decoder::decode(&bytes, &dicts()).unwrap(), "<doc></doc>");
    }

    #[test]
    fn self_closing_and_text_both_produce_with_end_element_form() {
        let bytes = encode("<a>hello</a>", &dicts()).unwrap();
        // ShortElement "a", Chars8-with-end-element, len 5, "hello".
        assert_eq!(
            bytes,
            vec![0x40, 0x01, b'a', 0x99, 0x05, b'h', b'e', b'l', b'l', b'o']
        );

        let empty = encode("<a/>", &dicts()).unwrap();
        // ShortElement "a", Empty-with-end-element — the other route to the
        // same merged shape, with no payload bytes to follow.
        assert_eq!(empty, vec![0x40, 0x01, b'a', 0xA9]);
        assert_eq!(decoder::decode(&empty, &dicts()).unwrap(), "<a></a>");
    }

    #[test]
    fn prefers_smallest_integer_width() {
        let bytes = encode("<n>5</n>", &dicts()).unwrap();
        // ShortElement "n", Int8-with-end-element, value 5.
        assert_eq!(bytes, vec![0x40, 0x01, b'n', 0x89, 0x05]);
    }

    #[test]
    fn attribute_and_nested_elements_roundtrip() {
        let xml = r#"<outer attr="v"><inner>7</inner></outer>"#;
        let bytes = encode(xml, &dicts()).unwrap();
        let decoded = decoder::decode(&bytes, &dicts()).unwrap();
        assert_eq!(decoded, xml);
    }

    #[test]
    fn xmlns_binding_roundtrips() {
        let xml = r#"<a xmlns="urn:example">text</a>"#;
        let bytes = encode(xml, &dicts()).unwrap();
        let decoded = decoder::decode(&bytes, &dicts()).unwrap();
        assert_eq!(decoded, xml);
    }

    #[test]
    fn prefix_family_used_for_single_letter_prefix() {
        let bytes = encode("<p:a>x</p:a>", &dicts()).unwrap();
        // PrefixElement('p' - 'a' = 15), then inner text.
        assert_eq!(bytes[0], RecordCode::PrefixElement(15).into_u8());
    }

    #[test]
    fn dictionary_preferred_when_reverse_lookup_hits() {
        let d = Dictionaries::nbfs(2000);
        let bytes = encode("<str910/>", &d).unwrap();
        assert_eq!(bytes[0], RecordCode::ShortDictionaryElement.into_u8());
        let decoded = decoder::decode(&bytes, &d).unwrap();
        assert_eq!(decoded, "<str910></str910>");
    }

    #[test]
    fn comment_roundtrips() {
        let xml = "<a><!--note--></a>";
        let bytes = encode(xml, &dicts()).unwrap();
        let decoded = decoder::decode(&bytes, &dicts()).unwrap();
        assert_eq!(decoded, xml);
    }

    #[test]
    fn decimal_looking_text_uses_decimal_record() {
        let bytes = encode("<price>5.123456</price>", &dicts()).unwrap();
        assert_eq!(
            bytes[7],
            RecordCode::TypedText(TypedText {
                kind: TextKind::Decimal,
                with_end_element: true
            })
            .into_u8()
        );
    }
}
