// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Log sinks for the `log` facade.
//!
//! Every module logs through `log::debug!` / `info!` / `warn!` / `error!`
//! with a bracketed component prefix (`[channel]`, `[session]`, ...).
//! Applications that already install a `log` backend need nothing from
//! here; others can route records to stderr or a file:
//!
//! ```ignore
//! use opcua_stack::logging::{init_logger, ConsoleOutput, LogLevel};
//! use std::sync::Arc;
//!
//! init_logger(Arc::new(ConsoleOutput::new(LogLevel::Debug)), LogLevel::Debug);
//! log::info!("[server] listening on {}", addr);
//! ```

mod logger;
mod output;

pub use logger::{flush_logger, init_logger};
pub use output::{ConsoleOutput, FileOutput, LogLevel, Output};
