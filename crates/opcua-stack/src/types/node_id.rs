// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! NodeId and ExpandedNodeId.
//!
//! Wire forms, selected by the leading encoding byte:
//!
//! | Byte | Form | Layout |
//! |------|------|--------|
//! | 0x00 | TwoByte | u8 identifier, namespace 0 |
//! | 0x01 | FourByte | u8 namespace, u16 identifier |
//! | 0x02 | Numeric | u16 namespace, u32 identifier |
//! | 0x03 | String | u16 namespace, String |
//! | 0x04 | Guid | u16 namespace, Guid |
//! | 0x05 | ByteString | u16 namespace, ByteString |
//!
//! ExpandedNodeId reuses the byte and sets 0x80 (namespace URI follows) and
//! 0x40 (server index follows).

use super::{ByteString, Guid, UaString};
use crate::codec::{BinaryEncodable, BinaryReader, BinaryWriter, EncodingError, EncodingResult};
use std::fmt;
use std::str::FromStr;

const TWO_BYTE: u8 = 0x00;
const FOUR_BYTE: u8 = 0x01;
const NUMERIC: u8 = 0x02;
const STRING: u8 = 0x03;
const GUID: u8 = 0x04;
const BYTE_STRING: u8 = 0x05;
const NAMESPACE_URI_FLAG: u8 = 0x80;
const SERVER_INDEX_FLAG: u8 = 0x40;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Identifier {
    Numeric(u32),
    String(UaString),
    Guid(Guid),
    ByteString(ByteString),
}

/// (namespace index, identifier) pair naming a node.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    pub namespace: u16,
    pub identifier: Identifier,
}

impl Default for NodeId {
    fn default() -> Self {
        Self::NULL
    }
}

impl NodeId {
    /// `ns=0;i=0`.
    pub const NULL: NodeId = NodeId {
        namespace: 0,
        identifier: Identifier::Numeric(0),
    };

    pub const fn numeric(namespace: u16, id: u32) -> Self {
        Self {
            namespace,
            identifier: Identifier::Numeric(id),
        }
    }

    /// Namespace 0 numeric id.
    pub const fn ns0(id: u32) -> Self {
        Self::numeric(0, id)
    }

    pub fn string(namespace: u16, id: &str) -> Self {
        Self {
            namespace,
            identifier: Identifier::String(UaString::from(id)),
        }
    }

    pub fn guid(namespace: u16, id: Guid) -> Self {
        Self {
            namespace,
            identifier: Identifier::Guid(id),
        }
    }

    pub fn byte_string(namespace: u16, id: &[u8]) -> Self {
        Self {
            namespace,
            identifier: Identifier::ByteString(ByteString::from(id)),
        }
    }

    pub fn is_null(&self) -> bool {
        match &self.identifier {
            Identifier::Numeric(n) => self.namespace == 0 && *n == 0,
            Identifier::String(s) => s.is_empty(),
            Identifier::Guid(g) => *g == Guid::NULL,
            Identifier::ByteString(b) => b.is_empty(),
        }
    }

    /// Numeric identifier in namespace 0, if this is one.
    pub fn as_ns0(&self) -> Option<u32> {
        match self.identifier {
            Identifier::Numeric(n) if self.namespace == 0 => Some(n),
            _ => None,
        }
    }

    fn encoding_byte(&self) -> u8 {
        match &self.identifier {
            Identifier::Numeric(n) if self.namespace == 0 && *n <= 0xFF => TWO_BYTE,
            Identifier::Numeric(n) if self.namespace <= 0xFF && *n <= 0xFFFF => FOUR_BYTE,
            Identifier::Numeric(_) => NUMERIC,
            Identifier::String(_) => STRING,
            Identifier::Guid(_) => GUID,
            Identifier::ByteString(_) => BYTE_STRING,
        }
    }

    fn body_len(&self) -> usize {
        match &self.identifier {
            Identifier::Numeric(_) => match self.encoding_byte() {
                TWO_BYTE => 1,
                FOUR_BYTE => 3,
                _ => 6,
            },
            Identifier::String(s) => 2 + s.byte_len(),
            Identifier::Guid(_) => 18,
            Identifier::ByteString(b) => 2 + b.byte_len(),
        }
    }

    /// Write the encoding byte (with extra flag bits) and body.
    fn encode_with_flags(&self, flags: u8, w: &mut BinaryWriter<'_>) -> EncodingResult<()> {
        let encoding = self.encoding_byte();
        w.write_u8(encoding | flags)?;
        match &self.identifier {
            Identifier::Numeric(n) => match encoding {
                TWO_BYTE => w.write_u8(*n as u8),
                FOUR_BYTE => {
                    w.write_u8(self.namespace as u8)?;
                    (*n as u16).encode(w)
                }
                _ => {
                    self.namespace.encode(w)?;
                    n.encode(w)
                }
            },
            Identifier::String(s) => {
                self.namespace.encode(w)?;
                s.encode(w)
            }
            Identifier::Guid(g) => {
                self.namespace.encode(w)?;
                g.encode(w)
            }
            Identifier::ByteString(b) => {
                self.namespace.encode(w)?;
                b.encode(w)
            }
        }
    }

    /// Decode the body for an already-read encoding byte (flag bits cleared).
    fn decode_body(encoding: u8, r: &mut BinaryReader<'_>) -> EncodingResult<Self> {
        Ok(match encoding {
            TWO_BYTE => Self::numeric(0, u32::from(r.read_u8()?)),
            FOUR_BYTE => {
                let ns = u16::from(r.read_u8()?);
                Self::numeric(ns, u32::from(u16::decode(r)?))
            }
            NUMERIC => {
                let ns = u16::decode(r)?;
                Self::numeric(ns, u32::decode(r)?)
            }
            STRING => Self {
                namespace: u16::decode(r)?,
                identifier: Identifier::String(UaString::decode(r)?),
            },
            GUID => Self {
                namespace: u16::decode(r)?,
                identifier: Identifier::Guid(Guid::decode(r)?),
            },
            BYTE_STRING => Self {
                namespace: u16::decode(r)?,
                identifier: Identifier::ByteString(ByteString::decode(r)?),
            },
            other => {
                return Err(EncodingError::InvalidData(format!(
                    "unknown NodeId encoding 0x{:02X}",
                    other
                )))
            }
        })
    }
}

impl BinaryEncodable for NodeId {
    fn byte_len(&self) -> usize {
        1 + self.body_len()
    }

    fn encode(&self, w: &mut BinaryWriter<'_>) -> EncodingResult<()> {
        self.encode_with_flags(0, w)
    }

    fn decode(r: &mut BinaryReader<'_>) -> EncodingResult<Self> {
        let encoding = r.read_u8()?;
        if encoding & (NAMESPACE_URI_FLAG | SERVER_INDEX_FLAG) != 0 {
            return Err(EncodingError::InvalidData(
                "NodeId carries ExpandedNodeId flags".to_string(),
            ));
        }
        Self::decode_body(encoding, r)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace != 0 {
            write!(f, "ns={};", self.namespace)?;
        }
        match &self.identifier {
            Identifier::Numeric(n) => write!(f, "i={}", n),
            Identifier::String(s) => write!(f, "s={}", s),
            Identifier::Guid(g) => write!(f, "g={}", g),
            Identifier::ByteString(b) => write!(f, "b={:?}", b),
        }
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Parses `i=85`, `ns=1;i=5`, `ns=2;s=Counter`.
impl FromStr for NodeId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (namespace, rest) = match s.strip_prefix("ns=") {
            Some(tail) => {
                let (ns, rest) = tail
                    .split_once(';')
                    .ok_or_else(|| format!("missing ';' in node id '{}'", s))?;
                let ns = ns
                    .parse::<u16>()
                    .map_err(|e| format!("bad namespace in '{}': {}", s, e))?;
                (ns, rest)
            }
            None => (0, s),
        };
        if let Some(id) = rest.strip_prefix("i=") {
            let id = id
                .parse::<u32>()
                .map_err(|e| format!("bad numeric id in '{}': {}", s, e))?;
            Ok(Self::numeric(namespace, id))
        } else if let Some(id) = rest.strip_prefix("s=") {
            Ok(Self::string(namespace, id))
        } else {
            Err(format!("unsupported node id '{}'", s))
        }
    }
}

impl From<u32> for NodeId {
    fn from(id: u32) -> Self {
        Self::ns0(id)
    }
}

/// NodeId with optional namespace URI and server index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ExpandedNodeId {
    pub node_id: NodeId,
    pub namespace_uri: UaString,
    pub server_index: u32,
}

impl ExpandedNodeId {
    pub fn is_local(&self) -> bool {
        self.server_index == 0 && self.namespace_uri.is_null()
    }
}

impl From<NodeId> for ExpandedNodeId {
    fn from(node_id: NodeId) -> Self {
        Self {
            node_id,
            namespace_uri: UaString::null(),
            server_index: 0,
        }
    }
}

impl BinaryEncodable for ExpandedNodeId {
    fn byte_len(&self) -> usize {
        let mut len = self.node_id.byte_len();
        if !self.namespace_uri.is_null() {
            len += self.namespace_uri.byte_len();
        }
        if self.server_index != 0 {
            len += 4;
        }
        len
    }

    fn encode(&self, w: &mut BinaryWriter<'_>) -> EncodingResult<()> {
        let mut flags = 0;
        if !self.namespace_uri.is_null() {
            flags |= NAMESPACE_URI_FLAG;
        }
        if self.server_index != 0 {
            flags |= SERVER_INDEX_FLAG;
        }
        self.node_id.encode_with_flags(flags, w)?;
        if !self.namespace_uri.is_null() {
            self.namespace_uri.encode(w)?;
        }
        if self.server_index != 0 {
            self.server_index.encode(w)?;
        }
        Ok(())
    }

    fn decode(r: &mut BinaryReader<'_>) -> EncodingResult<Self> {
        let encoding = r.read_u8()?;
        let node_id =
            NodeId::decode_body(encoding & !(NAMESPACE_URI_FLAG | SERVER_INDEX_FLAG), r)?;
        let namespace_uri = if encoding & NAMESPACE_URI_FLAG != 0 {
            UaString::decode(r)?
        } else {
            UaString::null()
        };
        let server_index = if encoding & SERVER_INDEX_FLAG != 0 {
            u32::decode(r)?
        } else {
            0
        };
        Ok(Self {
            node_id,
            namespace_uri,
            server_index,
        })
    }
}
