//! Static and session string dictionaries used by `DictionaryXxx` record
//! families to shorten recurring element/attribute names and xmlns URIs.
//!
//! A dictionary key is a [`crate::varint::MultiByteInt31`]. Even keys index
//! the static dictionary at `key/2`; odd keys index the session dictionary
//! at `(key-1)/2`. See `DESIGN.md` for why this particular parity law is
//! the one implemented here.

use std::collections::HashMap;

use crate::error::{Error, Result};

/// An immutable, application-chosen table mapping non-negative integers to
/// strings. Shared freely across concurrent decode/encode calls.
#[derive(Clone, Debug, Default)]
pub struct StaticDictionary {
    forward: HashMap<u32, String>,
    reverse: HashMap<String, u32>,
}

impl StaticDictionary {
    /// Build a static dictionary from `(index, string)` pairs.
    pub fn new(entries: impl IntoIterator<Item = (u32, String)>) -> Self {
        let mut forward = HashMap::new();
        let mut reverse = HashMap::new();
        for (index, s) in entries {
            reverse.entry(s.clone()).or_insert(index);
            forward.insert(index, s);
        }
        Self { forward, reverse }
    }

    /// An empty static dictionary (the NBFX default).
    pub fn empty() -> Self {
        Self::default()
    }

    /// The WCF-style demonstration dictionary used by the worked examples in
    /// the format's test corpus: entry `i` holds the string `"str" + 2*i`,
    /// so that even dictionary key `2*i` resolves to `"str{2*i}"`.
    pub fn nbfs(len: u32) -> Self {
        Self::new((0..len).map(|i| (i, format!("str{}", 2 * i))))
    }

    /// Look up the string at `index`.
    pub fn lookup(&self, index: u32) -> Option<&str> {
        self.forward.get(&index).map(String::as_str)
    }

    /// Find the index of `s`, if present, for use by the encoder.
    pub fn reverse_lookup(&self, s: &str) -> Option<u32> {
        self.reverse.get(s).copied()
    }
}

/// A per-document mutable table populated by the transport layer before
/// decoding. Read-only from the codec's point of view.
#[derive(Clone, Debug, Default)]
pub struct SessionDictionary {
    forward: HashMap<u32, String>,
    reverse: HashMap<String, u32>,
}

impl SessionDictionary {
    /// Build a session dictionary from `(index, string)` pairs.
    pub fn new(entries: impl IntoIterator<Item = (u32, String)>) -> Self {
        let mut forward = HashMap::new();
        let mut reverse = HashMap::new();
        for (index, s) in entries {
            reverse.entry(s.clone()).or_insert(index);
            forward.insert(index, s);
        }
        Self { forward, reverse }
    }

    /// An empty session dictionary.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Look up the string at `index`.
    pub fn lookup(&self, index: u32) -> Option<&str> {
        self.forward.get(&index).map(String::as_str)
    }

    /// Find the index of `s`, if present, for use by the encoder.
    pub fn reverse_lookup(&self, s: &str) -> Option<u32> {
        self.reverse.get(s).copied()
    }
}

/// The `{ static_dict, session_dict }` pair a codec is constructed with.
#[derive(Clone, Debug, Default)]
pub struct Dictionaries {
    /// The fixed, application/profile-chosen table (empty for plain NBFX).
    pub static_dict: StaticDictionary,
    /// The per-document table, supplied by the transport layer.
    pub session_dict: SessionDictionary,
}

impl Dictionaries {
    /// The empty-dictionary NBFX profile.
    pub fn nbfx() -> Self {
        Self::default()
    }

    /// The NBFS profile: NBFX bound to the demonstration WCF-style static
    /// dictionary (see [`StaticDictionary::nbfs`]).
    pub fn nbfs(static_len: u32) -> Self {
        Self {
            static_dict: StaticDictionary::nbfs(static_len),
            session_dict: SessionDictionary::empty(),
        }
    }

    /// Resolve a dictionary key per the even/odd parity law.
    pub fn lookup(&self, key: u32) -> Result<&str> {
        if key % 2 == 0 {
            self.static_dict
                .lookup(key / 2)
                .ok_or(Error::InvalidDictionaryKey(key))
        } else {
            self.session_dict
                .lookup((key - 1) / 2)
                .ok_or(Error::InvalidDictionaryKey(key))
        }
    }

    /// Find a dictionary key for `s`, preferring the static dictionary (the
    /// encoder's compactness preference order: static dictionary entries are
    /// assumed to be shared across an entire protocol, session entries only
    /// within one document).
    pub fn reverse_lookup(&self, s: &str) -> Option<u32> {
        if let Some(i) = self.static_dict.reverse_lookup(s) {
            return Some(2 * i);
        }
        if let Some(i) = self.session_dict.reverse_lookup(s) {
            return Some(2 * i + 1);
        }
        None
    }
}
