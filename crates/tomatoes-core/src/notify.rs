//! Completion notice collaborators.

use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::storage::NotificationsConfig;

/// Played once for every unit that finishes on its own (foreground or
/// background), never for early finishes.
pub trait Notifier: Send + Sync {
    fn unit_finished(&self, completed_units: u32);
}

/// Rings the terminal bell on stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct Bell;

impl Notifier for Bell {
    fn unit_finished(&self, completed_units: u32) {
        let mut stderr = std::io::stderr();
        if let Err(e) = write!(stderr, "\x07").and_then(|_| stderr.flush()) {
            tracing::warn!("bell failed: {e}");
        }
        tracing::info!(completed_units, "unit finished");
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Silent;

impl Notifier for Silent {
    fn unit_finished(&self, completed_units: u32) {
        tracing::info!(completed_units, "unit finished (silent)");
    }
}

/// Counts notices; for tests.
#[derive(Debug, Default)]
pub struct Recording {
    count: AtomicUsize,
}

impl Recording {
    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

impl Notifier for Recording {
    fn unit_finished(&self, _completed_units: u32) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }
}

/// Pick the notifier the config asks for.
pub fn from_config(config: &NotificationsConfig) -> Arc<dyn Notifier> {
    if config.enabled && config.bell {
        Arc::new(Bell)
    } else {
        Arc::new(Silent)
    }
}
