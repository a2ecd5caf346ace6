// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Job scheduling.
//!
//! - [`Scheduler`]: repeated jobs (monitored item sampling, subscription
//!   publishing, housekeeping) keyed by interval.
//! - [`DispatchPool`]: worker threads for multi-threaded execution, with
//!   results released in submission order.

mod dispatch;
mod repeated;

pub use dispatch::{DispatchPool, Notify};
pub use repeated::{JobId, Scheduler};
