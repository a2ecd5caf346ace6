// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! OPC UA status codes (Part 4 Sec.7.34, Part 6 Annex A).
//!
//! A status code is a flat 32-bit value: the two top bits carry severity
//! (`00` good, `01` uncertain, `10` bad), bits 16..28 the sub-code and the
//! low 16 bits informational flags. Every failure that crosses the wire is
//! one of these values, never a Rust error type.

use std::fmt;

/// 32-bit OPC UA status code.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(
    feature = "config-loaders",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct StatusCode(pub u32);

const SEVERITY_MASK: u32 = 0xC000_0000;
const SEVERITY_BAD: u32 = 0x8000_0000;
const SEVERITY_UNCERTAIN: u32 = 0x4000_0000;

macro_rules! status_codes {
    ($( $name:ident = $value:literal, $text:literal; )*) => {
        impl StatusCode {
            $(
                pub const $name: StatusCode = StatusCode($value);
            )*

            /// Symbolic name of a well-known code (sub-code only, flags ignored).
            pub fn name(&self) -> Option<&'static str> {
                match self.0 & 0xFFFF_0000 {
                    $( $value => Some($text), )*
                    _ => None,
                }
            }
        }
    };
}

status_codes! {
    GOOD = 0x0000_0000, "Good";
    UNCERTAIN = 0x4000_0000, "Uncertain";
    BAD = 0x8000_0000, "Bad";
    BAD_UNEXPECTED_ERROR = 0x8001_0000, "BadUnexpectedError";
    BAD_INTERNAL_ERROR = 0x8002_0000, "BadInternalError";
    BAD_OUT_OF_MEMORY = 0x8003_0000, "BadOutOfMemory";
    BAD_RESOURCE_UNAVAILABLE = 0x8004_0000, "BadResourceUnavailable";
    BAD_COMMUNICATION_ERROR = 0x8005_0000, "BadCommunicationError";
    BAD_ENCODING_ERROR = 0x8006_0000, "BadEncodingError";
    BAD_DECODING_ERROR = 0x8007_0000, "BadDecodingError";
    BAD_ENCODING_LIMITS_EXCEEDED = 0x8008_0000, "BadEncodingLimitsExceeded";
    BAD_UNKNOWN_RESPONSE = 0x8009_0000, "BadUnknownResponse";
    BAD_TIMEOUT = 0x800A_0000, "BadTimeout";
    BAD_SERVICE_UNSUPPORTED = 0x800B_0000, "BadServiceUnsupported";
    BAD_SHUTDOWN = 0x800C_0000, "BadShutdown";
    BAD_SERVER_NOT_CONNECTED = 0x800D_0000, "BadServerNotConnected";
    BAD_SERVER_HALTED = 0x800E_0000, "BadServerHalted";
    BAD_NOTHING_TO_DO = 0x800F_0000, "BadNothingToDo";
    BAD_TOO_MANY_OPERATIONS = 0x8010_0000, "BadTooManyOperations";
    BAD_DATA_TYPE_ID_UNKNOWN = 0x8011_0000, "BadDataTypeIdUnknown";
    BAD_SECURITY_CHECKS_FAILED = 0x8013_0000, "BadSecurityChecksFailed";
    BAD_USER_ACCESS_DENIED = 0x801F_0000, "BadUserAccessDenied";
    BAD_IDENTITY_TOKEN_INVALID = 0x8020_0000, "BadIdentityTokenInvalid";
    BAD_IDENTITY_TOKEN_REJECTED = 0x8021_0000, "BadIdentityTokenRejected";
    BAD_SECURE_CHANNEL_ID_INVALID = 0x8022_0000, "BadSecureChannelIdInvalid";
    BAD_NONCE_INVALID = 0x8024_0000, "BadNonceInvalid";
    BAD_SESSION_ID_INVALID = 0x8025_0000, "BadSessionIdInvalid";
    BAD_SESSION_CLOSED = 0x8026_0000, "BadSessionClosed";
    BAD_SESSION_NOT_ACTIVATED = 0x8027_0000, "BadSessionNotActivated";
    BAD_SUBSCRIPTION_ID_INVALID = 0x8028_0000, "BadSubscriptionIdInvalid";
    BAD_REQUEST_HEADER_INVALID = 0x802A_0000, "BadRequestHeaderInvalid";
    BAD_TIMESTAMPS_TO_RETURN_INVALID = 0x802B_0000, "BadTimestampsToReturnInvalid";
    BAD_REQUEST_CANCELLED_BY_CLIENT = 0x802C_0000, "BadRequestCancelledByClient";
    BAD_WAITING_FOR_INITIAL_DATA = 0x8032_0000, "BadWaitingForInitialData";
    BAD_NODE_ID_INVALID = 0x8033_0000, "BadNodeIdInvalid";
    BAD_NODE_ID_UNKNOWN = 0x8034_0000, "BadNodeIdUnknown";
    BAD_ATTRIBUTE_ID_INVALID = 0x8035_0000, "BadAttributeIdInvalid";
    BAD_INDEX_RANGE_INVALID = 0x8036_0000, "BadIndexRangeInvalid";
    BAD_DATA_ENCODING_INVALID = 0x8038_0000, "BadDataEncodingInvalid";
    BAD_DATA_ENCODING_UNSUPPORTED = 0x8039_0000, "BadDataEncodingUnsupported";
    BAD_NOT_READABLE = 0x803A_0000, "BadNotReadable";
    BAD_NOT_WRITABLE = 0x803B_0000, "BadNotWritable";
    BAD_OUT_OF_RANGE = 0x803C_0000, "BadOutOfRange";
    BAD_NOT_SUPPORTED = 0x803D_0000, "BadNotSupported";
    BAD_NOT_FOUND = 0x803E_0000, "BadNotFound";
    BAD_NOT_IMPLEMENTED = 0x8040_0000, "BadNotImplemented";
    BAD_MONITORING_MODE_INVALID = 0x8041_0000, "BadMonitoringModeInvalid";
    BAD_MONITORED_ITEM_ID_INVALID = 0x8042_0000, "BadMonitoredItemIdInvalid";
    BAD_MONITORED_ITEM_FILTER_INVALID = 0x8043_0000, "BadMonitoredItemFilterInvalid";
    BAD_MONITORED_ITEM_FILTER_UNSUPPORTED = 0x8044_0000, "BadMonitoredItemFilterUnsupported";
    BAD_FILTER_NOT_ALLOWED = 0x8045_0000, "BadFilterNotAllowed";
    BAD_CONTINUATION_POINT_INVALID = 0x804A_0000, "BadContinuationPointInvalid";
    BAD_NO_CONTINUATION_POINTS = 0x804B_0000, "BadNoContinuationPoints";
    BAD_REFERENCE_TYPE_ID_INVALID = 0x804C_0000, "BadReferenceTypeIdInvalid";
    BAD_BROWSE_DIRECTION_INVALID = 0x804D_0000, "BadBrowseDirectionInvalid";
    BAD_SECURITY_MODE_REJECTED = 0x8054_0000, "BadSecurityModeRejected";
    BAD_SECURITY_POLICY_REJECTED = 0x8055_0000, "BadSecurityPolicyRejected";
    BAD_TOO_MANY_SESSIONS = 0x8056_0000, "BadTooManySessions";
    BAD_PARENT_NODE_ID_INVALID = 0x805B_0000, "BadParentNodeIdInvalid";
    BAD_REFERENCE_NOT_ALLOWED = 0x805C_0000, "BadReferenceNotAllowed";
    BAD_NODE_ID_REJECTED = 0x805D_0000, "BadNodeIdRejected";
    BAD_NODE_ID_EXISTS = 0x805E_0000, "BadNodeIdExists";
    BAD_NODE_CLASS_INVALID = 0x805F_0000, "BadNodeClassInvalid";
    BAD_BROWSE_NAME_INVALID = 0x8060_0000, "BadBrowseNameInvalid";
    BAD_NODE_ATTRIBUTES_INVALID = 0x8062_0000, "BadNodeAttributesInvalid";
    BAD_TYPE_DEFINITION_INVALID = 0x8063_0000, "BadTypeDefinitionInvalid";
    BAD_SOURCE_NODE_ID_INVALID = 0x8064_0000, "BadSourceNodeIdInvalid";
    BAD_TARGET_NODE_ID_INVALID = 0x8065_0000, "BadTargetNodeIdInvalid";
    BAD_DUPLICATE_REFERENCE_NOT_ALLOWED = 0x8066_0000, "BadDuplicateReferenceNotAllowed";
    BAD_INVALID_SELF_REFERENCE = 0x8067_0000, "BadInvalidSelfReference";
    BAD_BROWSE_NAME_DUPLICATED = 0x8061_0000, "BadBrowseNameDuplicated";
    BAD_SERVER_INDEX_INVALID = 0x806A_0000, "BadServerIndexInvalid";
    BAD_VIEW_ID_UNKNOWN = 0x806B_0000, "BadViewIdUnknown";
    BAD_MAX_AGE_INVALID = 0x8070_0000, "BadMaxAgeInvalid";
    BAD_WRITE_NOT_SUPPORTED = 0x8073_0000, "BadWriteNotSupported";
    BAD_TYPE_MISMATCH = 0x8074_0000, "BadTypeMismatch";
    BAD_METHOD_INVALID = 0x8075_0000, "BadMethodInvalid";
    BAD_ARGUMENTS_MISSING = 0x8076_0000, "BadArgumentsMissing";
    BAD_TOO_MANY_SUBSCRIPTIONS = 0x8077_0000, "BadTooManySubscriptions";
    BAD_TOO_MANY_PUBLISH_REQUESTS = 0x8078_0000, "BadTooManyPublishRequests";
    BAD_NO_SUBSCRIPTION = 0x8079_0000, "BadNoSubscription";
    BAD_SEQUENCE_NUMBER_UNKNOWN = 0x807A_0000, "BadSequenceNumberUnknown";
    BAD_MESSAGE_NOT_AVAILABLE = 0x807B_0000, "BadMessageNotAvailable";
    BAD_TCP_MESSAGE_TYPE_INVALID = 0x807E_0000, "BadTcpMessageTypeInvalid";
    BAD_TCP_SECURE_CHANNEL_UNKNOWN = 0x807F_0000, "BadTcpSecureChannelUnknown";
    BAD_TCP_MESSAGE_TOO_LARGE = 0x8080_0000, "BadTcpMessageTooLarge";
    BAD_TCP_NOT_ENOUGH_RESOURCES = 0x8081_0000, "BadTcpNotEnoughResources";
    BAD_TCP_INTERNAL_ERROR = 0x8082_0000, "BadTcpInternalError";
    BAD_TCP_ENDPOINT_URL_INVALID = 0x8083_0000, "BadTcpEndpointUrlInvalid";
    BAD_SECURE_CHANNEL_CLOSED = 0x8086_0000, "BadSecureChannelClosed";
    BAD_SECURE_CHANNEL_TOKEN_UNKNOWN = 0x8087_0000, "BadSecureChannelTokenUnknown";
    BAD_SEQUENCE_NUMBER_INVALID = 0x8088_0000, "BadSequenceNumberInvalid";
    BAD_DEADBAND_FILTER_INVALID = 0x808E_0000, "BadDeadbandFilterInvalid";
    BAD_INVALID_ARGUMENT = 0x80AB_0000, "BadInvalidArgument";
    BAD_CONNECTION_REJECTED = 0x80AC_0000, "BadConnectionRejected";
    BAD_CONNECTION_CLOSED = 0x80AE_0000, "BadConnectionClosed";
    BAD_INVALID_STATE = 0x80AF_0000, "BadInvalidState";
    BAD_REQUEST_TOO_LARGE = 0x80B8_0000, "BadRequestTooLarge";
    BAD_RESPONSE_TOO_LARGE = 0x80B9_0000, "BadResponseTooLarge";
    BAD_INDEX_RANGE_NO_DATA = 0x80B7_0000, "BadIndexRangeNoData";
    BAD_PROTOCOL_VERSION_UNSUPPORTED = 0x80BE_0000, "BadProtocolVersionUnsupported";
    BAD_TOO_MANY_MONITORED_ITEMS = 0x80DB_0000, "BadTooManyMonitoredItems";
    BAD_TOO_MANY_ARGUMENTS = 0x80E5_0000, "BadTooManyArguments";
    BAD_NOT_EXECUTABLE = 0x8111_0000, "BadNotExecutable";
}

impl StatusCode {
    /// Severity bits are `00`.
    #[inline]
    pub fn is_good(&self) -> bool {
        self.0 & SEVERITY_MASK == 0
    }

    /// Severity bits are `10` (or `11`, which the standard reserves as bad).
    #[inline]
    pub fn is_bad(&self) -> bool {
        self.0 & SEVERITY_BAD != 0
    }

    #[inline]
    pub fn is_uncertain(&self) -> bool {
        self.0 & SEVERITY_MASK == SEVERITY_UNCERTAIN
    }

    /// Raw wire value.
    #[inline]
    pub fn bits(&self) -> u32 {
        self.0
    }

    /// `Ok(())` for good/uncertain codes, `Err(self)` for bad ones.
    pub fn into_result(self) -> Result<(), StatusCode> {
        if self.is_bad() {
            Err(self)
        } else {
            Ok(())
        }
    }
}

impl From<u32> for StatusCode {
    fn from(value: u32) -> Self {
        StatusCode(value)
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{} (0x{:08X})", name, self.0),
            None => write!(f, "0x{:08X}", self.0),
        }
    }
}

impl fmt::Debug for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl std::error::Error for StatusCode {}
