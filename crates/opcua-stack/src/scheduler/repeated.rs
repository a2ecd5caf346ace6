// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Repeated job scheduler.
//!
//! Jobs with the same interval share a bucket; buckets are kept sorted by
//! their next fire time. A tick pops every due bucket, hands its jobs out
//! in registration order and reschedules the bucket one interval later
//! (never earlier than `now`, so a stalled loop does not replay missed
//! ticks in a burst).
//!
//! Unregistering only clears the job's slot. Empty buckets are dropped by
//! the next tick that reaches them.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::config::MIN_JOB_INTERVAL;
use crate::status::StatusCode;

/// Handle returned by [`Scheduler::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(u64);

impl JobId {
    pub fn raw(self) -> u64 {
        self.0
    }
}

#[derive(Debug)]
struct Bucket<J> {
    interval: Duration,
    next_fire: Instant,
    /// `None` marks an unregistered job awaiting compaction.
    jobs: Vec<Option<(JobId, J)>>,
    live: usize,
}

/// Interval-bucketed job table.
#[derive(Debug)]
pub struct Scheduler<J> {
    /// Sorted by `next_fire` ascending.
    buckets: Vec<Bucket<J>>,
    /// Job id to bucket interval.
    registered: HashMap<JobId, Duration>,
    next_id: u64,
}

impl<J: Clone> Default for Scheduler<J> {
    fn default() -> Self {
        Self::new()
    }
}

impl<J: Clone> Scheduler<J> {
    pub fn new() -> Self {
        Self {
            buckets: Vec::new(),
            registered: HashMap::new(),
            next_id: 1,
        }
    }

    /// Register `job` to run every `interval`, first at `now + interval`.
    ///
    /// Intervals below [`MIN_JOB_INTERVAL`] are rejected.
    pub fn register(
        &mut self,
        interval: Duration,
        job: J,
        now: Instant,
    ) -> Result<JobId, StatusCode> {
        if interval < MIN_JOB_INTERVAL {
            return Err(StatusCode::BAD_INVALID_ARGUMENT);
        }
        let first_fire = now
            .checked_add(interval)
            .ok_or(StatusCode::BAD_INVALID_ARGUMENT)?;
        let id = JobId(self.next_id);
        self.next_id += 1;

        match self.buckets.iter_mut().find(|b| b.interval == interval) {
            Some(bucket) => {
                bucket.jobs.push(Some((id, job)));
                bucket.live += 1;
            }
            None => {
                self.insert_sorted(Bucket {
                    interval,
                    next_fire: first_fire,
                    jobs: vec![Some((id, job))],
                    live: 1,
                });
            }
        }
        self.registered.insert(id, interval);
        Ok(id)
    }

    /// Cancel a job. Returns false if the id is unknown.
    pub fn unregister(&mut self, id: JobId) -> bool {
        let Some(interval) = self.registered.remove(&id) else {
            return false;
        };
        if let Some(bucket) = self.buckets.iter_mut().find(|b| b.interval == interval) {
            for slot in bucket.jobs.iter_mut() {
                if matches!(slot, Some((jid, _)) if *jid == id) {
                    *slot = None;
                    bucket.live -= 1;
                    break;
                }
            }
        }
        true
    }

    pub fn contains(&self, id: JobId) -> bool {
        self.registered.contains_key(&id)
    }

    /// Number of live jobs.
    pub fn len(&self) -> usize {
        self.registered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registered.is_empty()
    }

    /// Fire time of the earliest bucket.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.buckets.first().map(|b| b.next_fire)
    }

    /// Pop every job due at `now`, in bucket then registration order.
    ///
    /// The jobs are cloned out so the caller can run them against state the
    /// scheduler is part of. A job unregistered by an earlier job of the
    /// same tick is still returned; check [`contains`](Self::contains)
    /// before running it.
    pub fn due(&mut self, now: Instant) -> Vec<(JobId, J)> {
        let split = self
            .buckets
            .iter()
            .position(|b| b.next_fire > now)
            .unwrap_or(self.buckets.len());
        let fired: Vec<Bucket<J>> = self.buckets.drain(..split).collect();

        let mut out = Vec::new();
        for mut bucket in fired {
            bucket.jobs.retain(Option::is_some);
            if bucket.live == 0 {
                continue;
            }
            out.extend(bucket.jobs.iter().flatten().cloned());

            bucket.next_fire += bucket.interval;
            if bucket.next_fire < now {
                bucket.next_fire = now;
            }
            self.insert_sorted(bucket);
        }
        out
    }

    fn insert_sorted(&mut self, bucket: Bucket<J>) {
        let pos = self
            .buckets
            .iter()
            .position(|b| b.next_fire > bucket.next_fire)
            .unwrap_or(self.buckets.len());
        self.buckets.insert(pos, bucket);
    }
}
