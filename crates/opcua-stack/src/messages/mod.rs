// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Service request/response bodies and the structures they carry (Part 4).
//!
//! On the wire every service message is the NodeId of its binary encoding
//! followed by the structure body; [`SupportedMessage`] is that pairing.

#[macro_use]
mod macros;

mod attribute;
mod channel;
mod discovery;
mod header;
mod method;
mod node_management;
mod session;
mod subscription;
mod view;

pub use attribute::*;
pub use channel::*;
pub use discovery::*;
pub use header::*;
pub use method::*;
pub use node_management::*;
pub use session::*;
pub use subscription::*;
pub use view::*;

use crate::codec::{
    BinaryEncodable, BinaryReader, BinaryWriter, EncodingError, EncodingResult, TypeTable,
};
use crate::types::NodeId;

supported_messages! {
    requests {
        OpenSecureChannelRequest,
        CloseSecureChannelRequest,
        GetEndpointsRequest,
        FindServersRequest,
        CreateSessionRequest,
        ActivateSessionRequest,
        CloseSessionRequest,
        ReadRequest,
        WriteRequest,
        BrowseRequest,
        BrowseNextRequest,
        CallRequest,
        CreateSubscriptionRequest,
        ModifySubscriptionRequest,
        SetPublishingModeRequest,
        DeleteSubscriptionsRequest,
        CreateMonitoredItemsRequest,
        ModifyMonitoredItemsRequest,
        SetMonitoringModeRequest,
        DeleteMonitoredItemsRequest,
        PublishRequest,
        RepublishRequest,
        AddNodesRequest,
        AddReferencesRequest,
        DeleteNodesRequest,
        DeleteReferencesRequest,
    }
    responses {
        ServiceFault,
        OpenSecureChannelResponse,
        CloseSecureChannelResponse,
        GetEndpointsResponse,
        FindServersResponse,
        CreateSessionResponse,
        ActivateSessionResponse,
        CloseSessionResponse,
        ReadResponse,
        WriteResponse,
        BrowseResponse,
        BrowseNextResponse,
        CallResponse,
        CreateSubscriptionResponse,
        ModifySubscriptionResponse,
        SetPublishingModeResponse,
        DeleteSubscriptionsResponse,
        CreateMonitoredItemsResponse,
        ModifyMonitoredItemsResponse,
        SetMonitoringModeResponse,
        DeleteMonitoredItemsResponse,
        PublishResponse,
        RepublishResponse,
        AddNodesResponse,
        AddReferencesResponse,
        DeleteNodesResponse,
        DeleteReferencesResponse,
    }
}

impl SupportedMessage {
    /// Request handle from whichever header the message carries.
    pub fn request_handle(&self) -> u32 {
        self.request_header()
            .map(|h| h.request_handle)
            .or_else(|| self.response_header().map(|h| h.request_handle))
            .unwrap_or(0)
    }

    pub fn is_service_fault(&self) -> bool {
        matches!(self, Self::ServiceFault(_))
    }
}

impl BinaryEncodable for SupportedMessage {
    fn byte_len(&self) -> usize {
        NodeId::ns0(self.encoding_id()).byte_len() + self.body_len()
    }

    fn encode(&self, w: &mut BinaryWriter<'_>) -> EncodingResult<()> {
        NodeId::ns0(self.encoding_id()).encode(w)?;
        self.encode_body(w)
    }

    fn decode(r: &mut BinaryReader<'_>) -> EncodingResult<Self> {
        let type_id = NodeId::decode(r)?;
        let encoding_id = type_id.as_ns0().ok_or_else(|| {
            EncodingError::InvalidData(format!("message type id {} is not in namespace 0", type_id))
        })?;
        Self::decode_body(encoding_id, r)
    }
}

/// Register every structure with the type table.
pub(crate) fn register_types(table: &mut TypeTable) {
    // Nested structures first so indices stay stable across builds.
    table.register::<RequestHeader>();
    table.register::<ResponseHeader>();
    table.register::<ChannelSecurityToken>();
    table.register::<ApplicationDescription>();
    table.register::<UserTokenPolicy>();
    table.register::<EndpointDescription>();
    table.register::<SignatureData>();
    table.register::<SignedSoftwareCertificate>();
    table.register::<AnonymousIdentityToken>();
    table.register::<UserNameIdentityToken>();
    table.register::<BuildInfo>();
    table.register::<ServerStatusDataType>();
    table.register::<ReadValueId>();
    table.register::<WriteValue>();
    table.register::<ViewDescription>();
    table.register::<BrowseDescription>();
    table.register::<ReferenceDescription>();
    table.register::<BrowseResult>();
    table.register::<Argument>();
    table.register::<CallMethodRequest>();
    table.register::<CallMethodResult>();
    table.register::<DataChangeFilter>();
    table.register::<MonitoringParameters>();
    table.register::<MonitoredItemCreateRequest>();
    table.register::<MonitoredItemCreateResult>();
    table.register::<MonitoredItemModifyRequest>();
    table.register::<MonitoredItemModifyResult>();
    table.register::<SubscriptionAcknowledgement>();
    table.register::<NotificationMessage>();
    table.register::<MonitoredItemNotification>();
    table.register::<DataChangeNotification>();
    table.register::<StatusChangeNotification>();
    table.register::<ObjectAttributes>();
    table.register::<VariableAttributes>();
    table.register::<AddNodesItem>();
    table.register::<AddNodesResult>();
    table.register::<AddReferencesItem>();
    table.register::<DeleteNodesItem>();
    table.register::<DeleteReferencesItem>();
    SupportedMessage::register_all(table);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{decode_from_slice, encode_to_vec, type_table, DataType, DecodingOptions};
    use crate::types::UaString;

    #[test]
    fn test_message_prefixed_with_encoding_id() {
        let msg = SupportedMessage::from(GetEndpointsRequest {
            request_header: RequestHeader {
                request_handle: 3,
                ..Default::default()
            },
            endpoint_url: UaString::from("opc.tcp://localhost:4840"),
            ..Default::default()
        });
        let bytes = encode_to_vec(&msg).unwrap();
        // four-byte NodeId form: 0x01, ns 0, u16 id
        assert_eq!(&bytes[..4], &[0x01, 0x00, 0xAC, 0x01]);
        assert_eq!(bytes.len(), msg.byte_len());
        let back: SupportedMessage =
            decode_from_slice(&bytes, &DecodingOptions::default()).unwrap();
        assert_eq!(back, msg);
        assert_eq!(back.request_handle(), 3);
        assert_eq!(back.type_name(), "GetEndpointsRequest");
    }

    #[test]
    fn test_unknown_encoding_id() {
        let bytes = encode_to_vec(&NodeId::ns0(12345)).unwrap();
        let err = decode_from_slice::<SupportedMessage>(&bytes, &DecodingOptions::default())
            .unwrap_err();
        assert_eq!(err, EncodingError::UnknownType(12345));
    }

    #[test]
    fn test_every_message_registered() {
        let table = type_table();
        for id in [
            ReadRequest::BINARY_ENCODING_ID,
            PublishResponse::BINARY_ENCODING_ID,
            ServiceFault::BINARY_ENCODING_ID,
            DeleteReferencesResponse::BINARY_ENCODING_ID,
        ] {
            assert!(table.by_encoding_id(id).is_some(), "encoding id {}", id);
        }
        let fault = table.by_type_id(ServiceFault::TYPE_ID).unwrap();
        assert_eq!(fault.members[0].type_ref, crate::codec::TypeRef::Structure(392));
    }
}
