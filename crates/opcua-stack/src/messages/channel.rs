// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use super::{RequestHeader, ResponseHeader};
use crate::types::{ByteString, DateTime};

ua_enum! {
    SecurityTokenRequestType {
        Issue = 0,
        Renew = 1,
    }
}

ua_enum! {
    MessageSecurityMode {
        Invalid = 0,
        None = 1,
        Sign = 2,
        SignAndEncrypt = 3,
    }
}

ua_struct! {
    ChannelSecurityToken: 441, 443 {
        channel_id: u32,
        token_id: u32,
        created_at: DateTime,
        /// Milliseconds.
        revised_lifetime: u32,
    }
}

ua_struct! {
    OpenSecureChannelRequest: 444, 446 {
        request_header: RequestHeader,
        client_protocol_version: u32,
        request_type: SecurityTokenRequestType,
        security_mode: MessageSecurityMode,
        client_nonce: ByteString,
        requested_lifetime: u32,
    }
}

ua_struct! {
    OpenSecureChannelResponse: 447, 449 {
        response_header: ResponseHeader,
        server_protocol_version: u32,
        security_token: ChannelSecurityToken,
        server_nonce: ByteString,
    }
}

ua_struct! {
    CloseSecureChannelRequest: 450, 452 {
        request_header: RequestHeader,
    }
}

ua_struct! {
    CloseSecureChannelResponse: 453, 455 {
        response_header: ResponseHeader,
    }
}
