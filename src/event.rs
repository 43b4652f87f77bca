//! The event interface between the record dispatcher and its caller (spec
//! §6): what the decoder emits and what the encoder consumes, independent of
//! whether the events came from records or from an external XML reader.

/// One attribute on a `StartElement` (spec §4.4 step 4: collected in the
/// order records were read, including xmlns declarations folded into
/// `xmlns_bindings` instead of here).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attribute {
    pub prefix: Option<String>,
    pub local: String,
    pub value: String,
}

/// An `xmlns` / `xmlns:prefix` declaration carried by a start-tag.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct XmlnsBinding {
    /// `None` for the default (unprefixed) namespace.
    pub prefix: Option<String>,
    pub uri: String,
}

/// A single XML infoset event, in document order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    StartElement {
        prefix: Option<String>,
        local: String,
        attrs: Vec<Attribute>,
        xmlns_bindings: Vec<XmlnsBinding>,
    },
    EndElement,
    Text(String),
    Comment(String),
}
