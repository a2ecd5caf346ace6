// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use super::{read_mask, UaString};
use crate::codec::{BinaryEncodable, BinaryReader, BinaryWriter, EncodingResult};
use std::fmt;

/// Namespace-qualified name (browse names).
#[derive(Clone, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct QualifiedName {
    pub namespace_index: u16,
    pub name: UaString,
}

impl QualifiedName {
    pub fn new(namespace_index: u16, name: &str) -> Self {
        Self {
            namespace_index,
            name: UaString::from(name),
        }
    }

    pub fn is_null(&self) -> bool {
        self.namespace_index == 0 && self.name.is_empty()
    }
}

impl fmt::Debug for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace_index, self.name)
    }
}

impl BinaryEncodable for QualifiedName {
    fn byte_len(&self) -> usize {
        2 + self.name.byte_len()
    }

    fn encode(&self, w: &mut BinaryWriter<'_>) -> EncodingResult<()> {
        self.namespace_index.encode(w)?;
        self.name.encode(w)
    }

    fn decode(r: &mut BinaryReader<'_>) -> EncodingResult<Self> {
        Ok(Self {
            namespace_index: u16::decode(r)?,
            name: UaString::decode(r)?,
        })
    }
}

const HAS_LOCALE: u8 = 0x01;
const HAS_TEXT: u8 = 0x02;

/// Human readable text with optional locale. Null fields are omitted on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct LocalizedText {
    pub locale: UaString,
    pub text: UaString,
}

impl LocalizedText {
    pub fn new(locale: &str, text: &str) -> Self {
        Self {
            locale: UaString::from(locale),
            text: UaString::from(text),
        }
    }

    /// Text without locale.
    pub fn text(text: &str) -> Self {
        Self {
            locale: UaString::null(),
            text: UaString::from(text),
        }
    }

    fn mask(&self) -> u8 {
        let mut mask = 0;
        if !self.locale.is_null() {
            mask |= HAS_LOCALE;
        }
        if !self.text.is_null() {
            mask |= HAS_TEXT;
        }
        mask
    }
}

impl From<&str> for LocalizedText {
    fn from(text: &str) -> Self {
        Self::text(text)
    }
}

impl BinaryEncodable for LocalizedText {
    fn byte_len(&self) -> usize {
        let mut len = 1;
        if !self.locale.is_null() {
            len += self.locale.byte_len();
        }
        if !self.text.is_null() {
            len += self.text.byte_len();
        }
        len
    }

    fn encode(&self, w: &mut BinaryWriter<'_>) -> EncodingResult<()> {
        w.write_u8(self.mask())?;
        if !self.locale.is_null() {
            self.locale.encode(w)?;
        }
        if !self.text.is_null() {
            self.text.encode(w)?;
        }
        Ok(())
    }

    fn decode(r: &mut BinaryReader<'_>) -> EncodingResult<Self> {
        let mask = read_mask(r, HAS_LOCALE | HAS_TEXT, "LocalizedText")?;
        let locale = if mask & HAS_LOCALE != 0 {
            UaString::decode(r)?
        } else {
            UaString::null()
        };
        let text = if mask & HAS_TEXT != 0 {
            UaString::decode(r)?
        } else {
            UaString::null()
        };
        Ok(Self { locale, text })
    }
}
