// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! `log::Log` bridge forwarding records to an [`Output`].

use super::output::{LogLevel, Output};
use std::io;
use std::sync::{Arc, OnceLock};

static LOGGER: OnceLock<GlobalLogger> = OnceLock::new();

struct GlobalLogger {
    output: Arc<dyn Output>,
    level_filter: LogLevel,
}

impl log::Log for GlobalLogger {
    fn enabled(&self, metadata: &log::Metadata<'_>) -> bool {
        LogLevel::from(metadata.level()) >= self.level_filter
    }

    fn log(&self, record: &log::Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let mut message = record.args().to_string();
        if !message.starts_with('[') {
            message = format!("[{}] {}", component(record.target()), message);
        }
        // Output errors cannot be reported anywhere useful.
        let _ = self.output.write(LogLevel::from(record.level()), &message);
    }

    fn flush(&self) {
        let _ = self.output.flush();
    }
}

/// Component tag for records logged without a `[component]` prefix: the
/// last module path segment inside this crate, the whole target otherwise.
fn component(target: &str) -> &str {
    match target.strip_prefix("opcua_stack::") {
        Some(path) => path.rsplit("::").next().unwrap_or(path),
        None => target,
    }
}

/// Install `output` as the `log` backend.
///
/// Only the first call has an effect; later calls, and calls made after
/// another `log` backend was installed, are ignored.
pub fn init_logger(output: Arc<dyn Output>, level: LogLevel) {
    let mut installed = false;
    let logger = LOGGER.get_or_init(|| {
        installed = true;
        GlobalLogger {
            output,
            level_filter: level,
        }
    });
    if installed && log::set_logger(logger).is_ok() {
        log::set_max_level(level.to_filter());
    }
}

/// Flush the installed output. No-op before [`init_logger`].
pub fn flush_logger() -> io::Result<()> {
    match LOGGER.get() {
        Some(logger) => logger.output.flush(),
        None => Ok(()),
    }
}
