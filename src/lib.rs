//! .NET Message Binary Format (MC-NBFX/MC-NBFS) binary XML codec.
//!
//! [`decode`] turns a record stream into its XML infoset, rendered as text;
//! [`encode`] does the reverse. Both take a [`Dictionaries`] bound to
//! whichever static/session string tables the surrounding protocol uses —
//! pass [`Dictionaries::nbfx`] for plain MC-NBFX with no dictionary.

#![allow(dead_code)]

mod dictionary;
mod error;
mod event;
mod record;
mod text;
mod varint;

pub mod decoder;
pub mod encoder;

pub use dictionary::{Dictionaries, SessionDictionary, StaticDictionary};
pub use error::{Error, Result};
pub use event::{Attribute, Event, XmlnsBinding};

/// Decode a complete MC-NBFX/MC-NBFS record stream into its XML infoset.
pub fn decode(input: &[u8], dicts: &Dictionaries) -> Result<String> {
    decoder::decode(input, dicts)
}

/// Encode a well-formed XML 1.0 document into its MC-NBFX/MC-NBFS record
/// stream.
pub fn encode(xml: &str, dicts: &Dictionaries) -> Result<Vec<u8>> {
    encoder::encode(xml, dicts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_through_public_api() {
        let dicts = Dictionaries::nbfx();
        let xml = "<doc><a>1</a><b>hello</b></doc>";
        let bytes = encode(xml, &dicts).unwrap();
        let back = decode(&bytes, &dicts).unwrap();
        assert_eq!(back, xml);
    }
}
