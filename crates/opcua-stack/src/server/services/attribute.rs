// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Read and Write.

use crate::messages::{
    ReadRequest, ReadResponse, ReadValueId, ResponseHeader, SupportedMessage, TimestampsToReturn,
    WriteRequest, WriteResponse, WriteValue,
};
use crate::nodestore::{
    access_level, attribute_id, value_matches_data_type, NodeStore, VariableValue,
};
use crate::status::StatusCode;
use crate::types::{DataValue, DateTime, Variant, VariantArray};

use super::{check_operations, fault};
use crate::server::ServerCore;

/// WriteMask bits for the attributes Write accepts besides Value.
mod write_mask {
    pub const DESCRIPTION: u32 = 1 << 5;
    pub const DISPLAY_NAME: u32 = 1 << 6;
}

const DEFAULT_BINARY: &str = "Default Binary";

/// Single-dimension NumericRange: `"n"` or `"a:b"` with `a < b`.
fn parse_index_range(text: &str) -> Result<(usize, usize), StatusCode> {
    let invalid = StatusCode::BAD_INDEX_RANGE_INVALID;
    if text.contains(',') {
        // multi-dimensional ranges are not supported
        return Err(invalid);
    }
    let parse = |s: &str| s.trim().parse::<usize>().map_err(|_| invalid);
    match text.split_once(':') {
        None => {
            let index = parse(text)?;
            Ok((index, index))
        }
        Some((a, b)) => {
            let (start, end) = (parse(a)?, parse(b)?);
            if start >= end {
                return Err(invalid);
            }
            Ok((start, end))
        }
    }
}

fn apply_index_range(value: Variant, range: (usize, usize)) -> Result<Variant, StatusCode> {
    let Variant::Array(array) = value else {
        return Err(StatusCode::BAD_INDEX_RANGE_NO_DATA);
    };
    let (start, end) = range;
    if start >= array.values.len() {
        return Err(StatusCode::BAD_INDEX_RANGE_NO_DATA);
    }
    let end = end.min(array.values.len() - 1);
    let values = array.values[start..=end].to_vec();
    Ok(Variant::Array(Box::new(VariantArray::new(array.element_type, values))))
}

fn read_inner(
    store: &NodeStore,
    item: &ReadValueId,
    timestamps: TimestampsToReturn,
) -> Result<DataValue, StatusCode> {
    if !item.data_encoding.is_null() && item.data_encoding.name.as_str() != Some(DEFAULT_BINARY) {
        return Err(StatusCode::BAD_DATA_ENCODING_UNSUPPORTED);
    }
    if !attribute_id::is_valid(item.attribute_id) {
        return Err(StatusCode::BAD_ATTRIBUTE_ID_INVALID);
    }
    let node = store
        .get(&item.node_id)
        .ok_or(StatusCode::BAD_NODE_ID_UNKNOWN)?;
    let range = match item.index_range.as_str().filter(|r| !r.is_empty()) {
        Some(text) => Some(parse_index_range(text)?),
        None => None,
    };

    let is_value = item.attribute_id == attribute_id::VALUE;
    let mut value = if is_value {
        node.read_value(timestamps.wants_source())?
    } else {
        DataValue::new(node.read_attribute(item.attribute_id)?)
    };
    if let Some(range) = range {
        let v = value.value.take().unwrap_or_default();
        value.value = Some(apply_index_range(v, range)?);
    }
    if !is_value || !timestamps.wants_source() {
        value.source_timestamp = None;
        value.source_picoseconds = None;
    }
    if timestamps.wants_server() {
        value.server_timestamp = Some(DateTime::now());
    } else {
        value.server_timestamp = None;
        value.server_picoseconds = None;
    }
    Ok(value)
}

/// Read one attribute; failures become a status-only DataValue.
pub(crate) fn read_data_value(
    store: &NodeStore,
    item: &ReadValueId,
    timestamps: TimestampsToReturn,
) -> DataValue {
    read_inner(store, item, timestamps).unwrap_or_else(DataValue::from_status)
}

pub(super) fn read(core: &ServerCore, request: &ReadRequest) -> SupportedMessage {
    let handle = request.request_header.request_handle;
    if request.max_age.is_nan() || request.max_age < 0.0 {
        return fault(handle, StatusCode::BAD_MAX_AGE_INVALID);
    }
    if request.timestamps_to_return == TimestampsToReturn::Invalid {
        return fault(handle, StatusCode::BAD_TIMESTAMPS_TO_RETURN_INVALID);
    }
    let items = match check_operations(core, &request.nodes_to_read) {
        Ok(items) => items,
        Err(status) => return fault(handle, status),
    };
    let results = items
        .iter()
        .map(|item| read_data_value(&core.node_store, item, request.timestamps_to_return))
        .collect();
    SupportedMessage::from(ReadResponse {
        response_header: ResponseHeader::good(&request.request_header),
        results: Some(results),
        diagnostic_infos: None,
    })
}

// ----------------------------------------------------------------------------
// Write
// ----------------------------------------------------------------------------

fn write_value(store: &NodeStore, item: &WriteValue) -> Result<(), StatusCode> {
    if !item.index_range.is_empty() {
        return Err(StatusCode::BAD_WRITE_NOT_SUPPORTED);
    }
    let node = store
        .get(&item.node_id)
        .ok_or(StatusCode::BAD_NODE_ID_UNKNOWN)?;
    let variable = node.as_variable().ok_or(StatusCode::BAD_NOT_WRITABLE)?;
    if variable.access_level & access_level::CURRENT_WRITE == 0 {
        return Err(StatusCode::BAD_NOT_WRITABLE);
    }
    if variable.user_access_level & access_level::CURRENT_WRITE == 0 {
        return Err(StatusCode::BAD_USER_ACCESS_DENIED);
    }
    if matches!(variable.value, VariableValue::Source(_)) {
        return Err(StatusCode::BAD_WRITE_NOT_SUPPORTED);
    }

    let value = item.value.value.clone().unwrap_or_default();
    let rank_ok = match variable.value_rank {
        -1 => !value.is_array(),
        rank if rank >= 1 => value.is_array() || value.is_empty(),
        _ => true,
    };
    if !rank_ok || !value_matches_data_type(store, &variable.data_type, &value) {
        log::debug!(
            "[service] write to {} rejected: {:?} does not match data type {}",
            item.node_id,
            value.builtin_type(),
            variable.data_type
        );
        return Err(StatusCode::BAD_TYPE_MISMATCH);
    }

    let now = DateTime::now();
    let stored = DataValue {
        value: Some(value),
        status: item.value.status,
        source_timestamp: Some(item.value.source_timestamp.unwrap_or(now)),
        source_picoseconds: item.value.source_picoseconds,
        server_timestamp: Some(now),
        server_picoseconds: None,
    };
    store.edit(&item.node_id, |node| {
        let variable = node.as_variable_mut().ok_or(StatusCode::BAD_NOT_WRITABLE)?;
        variable.value = VariableValue::Stored(stored);
        Ok(())
    })
}

fn write_text(store: &NodeStore, item: &WriteValue, mask: u32) -> Result<(), StatusCode> {
    let Some(Variant::LocalizedText(text)) = &item.value.value else {
        return Err(StatusCode::BAD_TYPE_MISMATCH);
    };
    let text = (**text).clone();
    store.edit(&item.node_id, |node| {
        if node.write_mask & mask == 0 {
            return Err(StatusCode::BAD_NOT_WRITABLE);
        }
        if node.user_write_mask & mask == 0 {
            return Err(StatusCode::BAD_USER_ACCESS_DENIED);
        }
        if mask == write_mask::DISPLAY_NAME {
            node.display_name = text;
        } else {
            node.description = text;
        }
        Ok(())
    })
}

fn write_one(store: &NodeStore, item: &WriteValue) -> StatusCode {
    if !attribute_id::is_valid(item.attribute_id) {
        return StatusCode::BAD_ATTRIBUTE_ID_INVALID;
    }
    if !store.contains(&item.node_id) {
        return StatusCode::BAD_NODE_ID_UNKNOWN;
    }
    let result = match item.attribute_id {
        attribute_id::VALUE => write_value(store, item),
        attribute_id::DISPLAY_NAME => write_text(store, item, write_mask::DISPLAY_NAME),
        attribute_id::DESCRIPTION => write_text(store, item, write_mask::DESCRIPTION),
        _ => Err(StatusCode::BAD_NOT_WRITABLE),
    };
    match result {
        Ok(()) => StatusCode::GOOD,
        Err(status) => status,
    }
}

pub(super) fn write(core: &ServerCore, request: &WriteRequest) -> SupportedMessage {
    let items = match check_operations(core, &request.nodes_to_write) {
        Ok(items) => items,
        Err(status) => return fault(request.request_header.request_handle, status),
    };
    let results = items
        .iter()
        .map(|item| write_one(&core.node_store, item))
        .collect();
    SupportedMessage::from(WriteResponse {
        response_header: ResponseHeader::good(&request.request_header),
        results: Some(results),
        diagnostic_infos: None,
    })
}
