//! Batching configuration, read once per execution from item 0.

use std::time::Duration;

use nodes::{CommonOptions, ExecutionContext};

pub const DEFAULT_BATCH_SIZE: usize = 50;

/// How the driver spreads items over time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchConfig {
    /// Set only when the user explicitly added the Batching option.
    pub enabled: bool,
    /// Items launched per wave; always at least 1.
    pub batch_size: usize,
    /// Pause before every wave after the first.
    pub batch_interval: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            batch_size: DEFAULT_BATCH_SIZE,
            batch_interval: Duration::ZERO,
        }
    }
}

impl BatchConfig {
    /// Batched mode with the given wave size and pause (in milliseconds).
    pub fn batched(batch_size: usize, batch_interval_ms: u64) -> Self {
        Self {
            enabled: true,
            batch_size: batch_size.max(1),
            batch_interval: Duration::from_millis(batch_interval_ms),
        }
    }

    /// Resolve from item 0's `options`.
    ///
    /// An absent or unreadable `options` parameter yields the serial default.
    pub fn resolve(ctx: &ExecutionContext) -> Self {
        match ctx.common_options(0) {
            Ok(Some(options)) => Self::from_options(&options),
            _ => Self::default(),
        }
    }

    pub fn from_options(options: &CommonOptions) -> Self {
        let Some(batch) = options.batching.as_ref().and_then(|b| b.batch.as_ref()) else {
            return Self::default();
        };

        let size = batch.batch_size.unwrap_or(DEFAULT_BATCH_SIZE as u64);
        Self::batched(
            usize::try_from(size).unwrap_or(usize::MAX),
            batch.batch_interval.unwrap_or(0),
        )
    }

    /// Zero-based wave an item belongs to.
    pub fn wave_of(&self, item_index: usize) -> usize {
        item_index / self.batch_size
    }

    /// Whether the driver pauses before launching this item.
    pub fn pauses_before(&self, item_index: usize) -> bool {
        item_index > 0 && !self.batch_interval.is_zero() && item_index % self.batch_size == 0
    }
}
