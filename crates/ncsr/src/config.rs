//! Pipeline settings.

use serde::{Deserialize, Serialize};

use crate::locator::PAGE_SIZE;

/// Default number of filings extracted concurrently.
const DEFAULT_CONCURRENCY: usize = 8;

/// What to do with facts whose segment carries no recoverable class id.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClassIdPolicy {
    /// Keep them. Within each field the i-th such fact is paired with the
    /// i-th such fact of every other field, so they still outer-join.
    #[default]
    Lenient,
    /// Drop them.
    Strict,
}

/// Settings for a pipeline run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Maximum filings extracted at once.
    pub concurrency: usize,
    /// Search page size.
    pub page_size: usize,
    /// Handling of facts without a class id.
    pub class_id_policy: ClassIdPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            page_size: PAGE_SIZE,
            class_id_policy: ClassIdPolicy::default(),
        }
    }
}

impl PipelineConfig {
    /// Sets the extraction concurrency (at least one).
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Sets the class id policy.
    #[must_use]
    pub const fn with_class_id_policy(mut self, policy: ClassIdPolicy) -> Self {
        self.class_id_policy = policy;
        self
    }
}
