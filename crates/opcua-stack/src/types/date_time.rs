// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use crate::codec::{BinaryEncodable, BinaryReader, BinaryWriter, EncodingResult};
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// 100 ns ticks between 1601-01-01 and 1970-01-01.
const UNIX_EPOCH_TICKS: i64 = 116_444_736_000_000_000;
const TICKS_PER_SECOND: i64 = 10_000_000;

/// UTC timestamp: Int64 count of 100 ns intervals since 1601-01-01.
///
/// Zero is the "null" DateTime (no timestamp).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct DateTime(pub i64);

impl DateTime {
    pub const NULL: DateTime = DateTime(0);

    pub fn now() -> Self {
        Self::from_system_time(SystemTime::now())
    }

    pub fn from_system_time(t: SystemTime) -> Self {
        match t.duration_since(UNIX_EPOCH) {
            Ok(d) => Self(UNIX_EPOCH_TICKS.saturating_add(duration_ticks(d))),
            Err(e) => Self(UNIX_EPOCH_TICKS.saturating_sub(duration_ticks(e.duration()))),
        }
    }

    pub fn ticks(&self) -> i64 {
        self.0
    }

    pub fn is_null(&self) -> bool {
        self.0 == 0
    }

    /// Seconds since the Unix epoch (may be negative).
    pub fn unix_seconds(&self) -> i64 {
        (self.0 - UNIX_EPOCH_TICKS).div_euclid(TICKS_PER_SECOND)
    }

    /// Shift by a millisecond offset (negative moves backwards).
    pub fn add_millis(&self, ms: i64) -> Self {
        Self(self.0.saturating_add(ms.saturating_mul(10_000)))
    }
}

fn duration_ticks(d: Duration) -> i64 {
    i64::try_from(d.as_nanos() / 100).unwrap_or(i64::MAX)
}

impl fmt::Debug for DateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DateTime({})", self.0)
    }
}

impl BinaryEncodable for DateTime {
    const FIXED_SIZE: Option<usize> = Some(8);

    fn byte_len(&self) -> usize {
        8
    }

    fn encode(&self, w: &mut BinaryWriter<'_>) -> EncodingResult<()> {
        w.write_atomic(&self.0.to_le_bytes())
    }

    fn decode(r: &mut BinaryReader<'_>) -> EncodingResult<Self> {
        Ok(Self(i64::from_le_bytes(r.read_array()?)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unix_epoch() {
        let t = DateTime::from_system_time(UNIX_EPOCH);
        assert_eq!(t.ticks(), UNIX_EPOCH_TICKS);
        assert_eq!(t.unix_seconds(), 0);
        let later = DateTime::from_system_time(UNIX_EPOCH + Duration::from_secs(90));
        assert_eq!(later.unix_seconds(), 90);
        assert_eq!(later.add_millis(-90_000), t);
    }

    #[test]
    fn test_now_is_monotonic_enough() {
        let a = DateTime::now();
        let b = DateTime::now();
        assert!(b >= a);
        assert!(!a.is_null());
    }
}
