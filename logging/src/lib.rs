//! Progress-aware logging for state transitions.
//!
//! Every message logged through the macros in this crate is prefixed with the number of slots,
//! blocks and epochs processed by the current process. The counters are updated by
//! `transition_functions` and are only informational.

use core::sync::atomic::{AtomicU64, Ordering};

use derive_more::Display;

pub static TRANSITION_LOG_METRICS: TransitionLogMetrics = TransitionLogMetrics::new();

#[derive(Display, Debug)]
#[display("slots: {processed_slots:?}, blocks: {processed_blocks:?}, epochs: {processed_epochs:?}")]
pub struct TransitionLogMetrics {
    processed_slots: AtomicU64,
    processed_blocks: AtomicU64,
    processed_epochs: AtomicU64,
}

impl TransitionLogMetrics {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            processed_slots: AtomicU64::new(0),
            processed_blocks: AtomicU64::new(0),
            processed_epochs: AtomicU64::new(0),
        }
    }

    pub fn record_slot(&self) {
        self.processed_slots.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_block(&self) {
        self.processed_blocks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_epoch(&self) {
        self.processed_epochs.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn processed_slots(&self) -> u64 {
        self.processed_slots.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn processed_blocks(&self) -> u64 {
        self.processed_blocks.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn processed_epochs(&self) -> u64 {
        self.processed_epochs.load(Ordering::Relaxed)
    }
}

impl Default for TransitionLogMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[macro_export]
macro_rules! info_with_progress {
    ($($arg:tt)*) => {
        ::tracing::info!("[{}] {}", $crate::TRANSITION_LOG_METRICS, format_args!($($arg)*));
    };
}

#[macro_export]
macro_rules! debug_with_progress {
    ($($arg:tt)*) => {
        ::tracing::debug!("[{}] {}", $crate::TRANSITION_LOG_METRICS, format_args!($($arg)*));
    };
}

#[macro_export]
macro_rules! warn_with_progress {
    ($($arg:tt)*) => {
        ::tracing::warn!("[{}] {}", $crate::TRANSITION_LOG_METRICS, format_args!($($arg)*));
    };
}

#[macro_export]
macro_rules! error_with_progress {
    ($($arg:tt)*) => {
        ::tracing::error!("[{}] {}", $crate::TRANSITION_LOG_METRICS, format_args!($($arg)*));
    };
}

#[macro_export]
macro_rules! trace_with_progress {
    ($($arg:tt)*) => {
        ::tracing::trace!("[{}] {}", $crate::TRANSITION_LOG_METRICS, format_args!($($arg)*));
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_are_displayed_in_prefix() {
        let metrics = TransitionLogMetrics::new();

        metrics.record_slot();
        metrics.record_slot();
        metrics.record_block();

        assert_eq!(metrics.to_string(), "slots: 2, blocks: 1, epochs: 0");
    }

    #[test]
    fn macros_expand_with_a_subscriber_installed() {
        let subscriber = tracing_subscriber::fmt().with_test_writer().finish();

        tracing::subscriber::with_default(subscriber, || {
            TRANSITION_LOG_METRICS.record_epoch();
            info_with_progress!("upgraded state to {}", "altair");
            debug_with_progress!("processing epoch {}", 3);
            warn_with_progress!("signature {} failed", "randao reveal");
            trace_with_progress!("processed slot {}", 5);
        });

        assert!(TRANSITION_LOG_METRICS.processed_epochs() >= 1);
    }
}
