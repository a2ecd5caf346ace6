// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Declarative generators for protocol structures and enumerations.

/// Declare a protocol structure: fields encode in declaration order.
///
/// ```ignore
/// ua_struct! {
///     /// Doc
///     ReadValueId: 626, 628 {
///         node_id: NodeId,
///         attribute_id: u32,
///     }
/// }
/// ```
///
/// `626` is the DataType id, `628` the binary encoding id.
macro_rules! ua_struct {
    (
        $(#[$meta:meta])*
        $name:ident : $type_id:literal, $encoding_id:literal {
            $( $(#[$fmeta:meta])* $field:ident : $fty:ty ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Default)]
        pub struct $name {
            $( $(#[$fmeta])* pub $field: $fty, )*
        }

        impl $crate::codec::BinaryEncodable for $name {
            fn byte_len(&self) -> usize {
                0 $( + $crate::codec::BinaryEncodable::byte_len(&self.$field) )*
            }

            #[allow(unused_variables)]
            fn encode(
                &self,
                w: &mut $crate::codec::BinaryWriter<'_>,
            ) -> $crate::codec::EncodingResult<()> {
                $( $crate::codec::BinaryEncodable::encode(&self.$field, w)?; )*
                Ok(())
            }

            #[allow(unused_variables)]
            fn decode(
                r: &mut $crate::codec::BinaryReader<'_>,
            ) -> $crate::codec::EncodingResult<Self> {
                Ok(Self {
                    $( $field: <$fty as $crate::codec::BinaryEncodable>::decode(r)?, )*
                })
            }
        }

        impl $crate::codec::Described for $name {
            const TYPE_REF: $crate::codec::TypeRef = $crate::codec::TypeRef::Structure($type_id);
        }

        impl $crate::codec::DataType for $name {
            const NAME: &'static str = stringify!($name);
            const TYPE_ID: u32 = $type_id;
            const BINARY_ENCODING_ID: u32 = $encoding_id;

            fn members() -> Vec<$crate::codec::MemberDescriptor> {
                vec![
                    $(
                        $crate::codec::MemberDescriptor {
                            name: stringify!($field),
                            type_ref: <$fty as $crate::codec::Described>::TYPE_REF,
                            is_array: <$fty as $crate::codec::Described>::IS_ARRAY,
                        },
                    )*
                ]
            }
        }
    };
}

/// Declare an Int32-encoded enumeration. The first variant is the default.
macro_rules! ua_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $default:ident = $dv:literal
            $(, $variant:ident = $value:literal)* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
        #[cfg_attr(
            feature = "config-loaders",
            derive(serde::Serialize, serde::Deserialize)
        )]
        #[repr(i32)]
        pub enum $name {
            #[default]
            $default = $dv,
            $( $variant = $value, )*
        }

        impl $name {
            pub fn from_i32(value: i32) -> Option<Self> {
                match value {
                    $dv => Some(Self::$default),
                    $( $value => Some(Self::$variant), )*
                    _ => None,
                }
            }
        }

        impl $crate::codec::BinaryEncodable for $name {
            const FIXED_SIZE: Option<usize> = Some(4);

            fn byte_len(&self) -> usize {
                4
            }

            fn encode(
                &self,
                w: &mut $crate::codec::BinaryWriter<'_>,
            ) -> $crate::codec::EncodingResult<()> {
                w.write_i32(*self as i32)
            }

            fn decode(
                r: &mut $crate::codec::BinaryReader<'_>,
            ) -> $crate::codec::EncodingResult<Self> {
                let value = r.read_i32()?;
                Self::from_i32(value).ok_or_else(|| {
                    $crate::codec::EncodingError::InvalidData(format!(
                        "{} value {} out of range",
                        stringify!($name),
                        value
                    ))
                })
            }
        }

        impl $crate::codec::Described for $name {
            const TYPE_REF: $crate::codec::TypeRef =
                $crate::codec::TypeRef::Builtin($crate::types::BuiltinType::Int32);
        }
    };
}

/// Declare the message enum over every request/response body.
macro_rules! supported_messages {
    (
        requests { $( $req:ident ),* $(,)? }
        responses { $( $resp:ident ),* $(,)? }
    ) => {
        /// Any service request or response body, keyed by binary encoding id.
        #[derive(Debug, Clone, PartialEq)]
        pub enum SupportedMessage {
            $( $req(Box<$req>), )*
            $( $resp(Box<$resp>), )*
        }

        impl SupportedMessage {
            /// Binary encoding id written before the body.
            pub fn encoding_id(&self) -> u32 {
                match self {
                    $( Self::$req(_) => <$req as $crate::codec::DataType>::BINARY_ENCODING_ID, )*
                    $( Self::$resp(_) => <$resp as $crate::codec::DataType>::BINARY_ENCODING_ID, )*
                }
            }

            pub fn type_name(&self) -> &'static str {
                match self {
                    $( Self::$req(_) => stringify!($req), )*
                    $( Self::$resp(_) => stringify!($resp), )*
                }
            }

            pub fn request_header(&self) -> Option<&RequestHeader> {
                match self {
                    $( Self::$req(m) => Some(&m.request_header), )*
                    _ => None,
                }
            }

            pub fn response_header(&self) -> Option<&ResponseHeader> {
                match self {
                    $( Self::$resp(m) => Some(&m.response_header), )*
                    _ => None,
                }
            }

            pub fn response_header_mut(&mut self) -> Option<&mut ResponseHeader> {
                match self {
                    $( Self::$resp(m) => Some(&mut m.response_header), )*
                    _ => None,
                }
            }

            /// Decode a body whose encoding id has already been read.
            pub fn decode_body(
                encoding_id: u32,
                r: &mut $crate::codec::BinaryReader<'_>,
            ) -> $crate::codec::EncodingResult<Self> {
                use $crate::codec::{BinaryEncodable, DataType};
                $(
                    if encoding_id == <$req as DataType>::BINARY_ENCODING_ID {
                        return <$req as BinaryEncodable>::decode(r)
                            .map(|m| Self::$req(Box::new(m)));
                    }
                )*
                $(
                    if encoding_id == <$resp as DataType>::BINARY_ENCODING_ID {
                        return <$resp as BinaryEncodable>::decode(r)
                            .map(|m| Self::$resp(Box::new(m)));
                    }
                )*
                Err($crate::codec::EncodingError::UnknownType(encoding_id))
            }

            fn body_len(&self) -> usize {
                use $crate::codec::BinaryEncodable;
                match self {
                    $( Self::$req(m) => m.byte_len(), )*
                    $( Self::$resp(m) => m.byte_len(), )*
                }
            }

            fn encode_body(
                &self,
                w: &mut $crate::codec::BinaryWriter<'_>,
            ) -> $crate::codec::EncodingResult<()> {
                use $crate::codec::BinaryEncodable;
                match self {
                    $( Self::$req(m) => m.encode(w), )*
                    $( Self::$resp(m) => m.encode(w), )*
                }
            }

            pub(crate) fn register_all(table: &mut $crate::codec::TypeTable) {
                $( table.register::<$req>(); )*
                $( table.register::<$resp>(); )*
            }
        }

        $(
            impl From<$req> for SupportedMessage {
                fn from(m: $req) -> Self {
                    Self::$req(Box::new(m))
                }
            }
        )*
        $(
            impl From<$resp> for SupportedMessage {
                fn from(m: $resp) -> Self {
                    Self::$resp(Box::new(m))
                }
            }
        )*
    };
}
