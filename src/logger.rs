//! The injectable logger service.
//!
//! [`Ware::new`](crate::Ware::new) binds one `Logger` globally so any handler
//! can declare `Dep<Logger>` and log through it. Clones share the prefix: a
//! handler that changes it changes it for every later handler and run.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, error, info, warn};

pub const DEFAULT_PREFIX: &str = "[ware]";

/// Forwards messages to `tracing`, tagged with a mutable prefix.
#[derive(Debug, Clone)]
pub struct Logger {
    prefix: Arc<RwLock<String>>,
}

impl Logger {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: Arc::new(RwLock::new(prefix.into())) }
    }

    pub fn prefix(&self) -> String {
        self.prefix.read().clone()
    }

    pub fn set_prefix(&self, prefix: impl Into<String>) {
        *self.prefix.write() = prefix.into();
    }

    pub fn debug(&self, msg: &str) {
        debug!(prefix = %self.prefix.read(), "{msg}");
    }

    pub fn info(&self, msg: &str) {
        info!(prefix = %self.prefix.read(), "{msg}");
    }

    pub fn warn(&self, msg: &str) {
        warn!(prefix = %self.prefix.read(), "{msg}");
    }

    pub fn error(&self, msg: &str) {
        error!(prefix = %self.prefix.read(), "{msg}");
    }
}

impl Default for Logger {
    fn default() -> Self { Self::new(DEFAULT_PREFIX) }
}
