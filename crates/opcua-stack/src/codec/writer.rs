// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Bounded output buffer with buffer exchange.

use super::{EncodingError, EncodingResult};

/// Sink that takes a filled buffer and makes room for more.
///
/// `exchange` receives the bytes written since the previous exchange. It must
/// drain `filled` (the writer clears it afterwards regardless) or fail, in
/// which case encoding aborts with that error.
pub trait BufferExchange {
    fn exchange(&mut self, filled: &mut Vec<u8>) -> EncodingResult<()>;
}

/// Encoder output cursor.
///
/// The writer holds at most `limit` bytes. Fixed-width values are written
/// atomically: if one does not fit, the buffer is exchanged and the same value
/// is written again into the fresh buffer. Byte runs (strings, overlayable
/// arrays) are split across exchanges.
pub struct BinaryWriter<'a> {
    buf: Vec<u8>,
    limit: usize,
    exchange: Option<&'a mut dyn BufferExchange>,
    flushed: usize,
    exchanges: usize,
}

impl BinaryWriter<'static> {
    /// Unbounded writer.
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Unbounded writer with preallocated capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
            limit: usize::MAX,
            exchange: None,
            flushed: 0,
            exchanges: 0,
        }
    }

    /// Bounded writer without exchange: overflow is an error.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            buf: Vec::with_capacity(limit.min(64 * 1024)),
            limit,
            exchange: None,
            flushed: 0,
            exchanges: 0,
        }
    }
}

impl Default for BinaryWriter<'static> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> BinaryWriter<'a> {
    /// Bounded writer that calls `exchange` whenever `limit` would be exceeded.
    pub fn with_exchange(limit: usize, exchange: &'a mut dyn BufferExchange) -> Self {
        Self {
            buf: Vec::with_capacity(limit.min(64 * 1024)),
            limit,
            exchange: Some(exchange),
            flushed: 0,
            exchanges: 0,
        }
    }

    /// Total bytes written, including bytes already handed to the sink.
    pub fn position(&self) -> usize {
        self.flushed + self.buf.len()
    }

    /// Room left in the current buffer.
    pub fn remaining(&self) -> usize {
        self.limit.saturating_sub(self.buf.len())
    }

    /// Number of exchanges performed so far.
    pub fn exchange_count(&self) -> usize {
        self.exchanges
    }

    /// Bytes in the current (not yet exchanged) buffer.
    pub fn buffer(&self) -> &[u8] {
        &self.buf
    }

    /// Consume the writer, returning the current buffer.
    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }

    pub fn write_u8(&mut self, value: u8) -> EncodingResult<()> {
        self.write_atomic(&[value])
    }

    pub fn write_i32(&mut self, value: i32) -> EncodingResult<()> {
        self.write_atomic(&value.to_le_bytes())
    }

    /// Int32 array length prefix. Lengths past `i32::MAX` are rejected.
    pub fn write_array_len(&mut self, len: usize) -> EncodingResult<()> {
        let len = i32::try_from(len).map_err(|_| {
            EncodingError::LimitsExceeded(format!("array length {} does not fit Int32", len))
        })?;
        self.write_i32(len)
    }

    pub fn write_u32(&mut self, value: u32) -> EncodingResult<()> {
        self.write_atomic(&value.to_le_bytes())
    }

    /// Write a value that must not be split across buffers.
    pub fn write_atomic(&mut self, bytes: &[u8]) -> EncodingResult<()> {
        if bytes.len() > self.remaining() {
            self.exchange_buffer(bytes.len())?;
        }
        self.buf.extend_from_slice(bytes);
        Ok(())
    }

    /// Write a byte run, splitting it across buffers when needed.
    pub fn write_block(&mut self, mut bytes: &[u8]) -> EncodingResult<()> {
        while !bytes.is_empty() {
            let room = self.remaining();
            if room == 0 {
                self.exchange_buffer(1)?;
                continue;
            }
            let n = room.min(bytes.len());
            self.buf.extend_from_slice(&bytes[..n]);
            bytes = &bytes[n..];
        }
        Ok(())
    }

    fn exchange_buffer(&mut self, needed: usize) -> EncodingResult<()> {
        let available = self.remaining();
        let Some(sink) = self.exchange.as_mut() else {
            return Err(EncodingError::BufferFull { needed, available });
        };
        let filled = self.buf.len();
        sink.exchange(&mut self.buf)?;
        self.buf.clear();
        self.flushed += filled;
        self.exchanges += 1;
        if needed > self.limit {
            return Err(EncodingError::BufferFull {
                needed,
                available: self.limit,
            });
        }
        Ok(())
    }
}
