//! Construction-time settings shared by every operator.

use crate::stream::OverflowPolicy;

/// Buffer capacity used when a caller does not pick one
pub const DEFAULT_BUFFER_CAPACITY: usize = 32;

/// Where source stages may appear inside a pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProducerPlacement {
    /// A producer may only be the first stage
    #[default]
    FirstOnly,
    /// Producers are accepted at any position
    Anywhere,
}

/// Settings threaded through operator constructors
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Capacity of the output stream of producers and consumers
    pub buffer_capacity: usize,
    /// Placement rule checked by [`crate::Pipeline::with_config`]
    pub producer_placement: ProducerPlacement,
    /// How mirror branches of a [`crate::Mirror`] treat a full input
    pub mirror_overflow: OverflowPolicy,
}

impl PipelineConfig {
    /// Same as [`PipelineConfig::default`]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the capacity of streams created by stages
    pub fn with_buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = capacity;
        self
    }

    /// Set where producers may appear in a pipeline
    pub fn with_producer_placement(mut self, placement: ProducerPlacement) -> Self {
        self.producer_placement = placement;
        self
    }

    /// Set how mirror branches treat a full input
    pub fn with_mirror_overflow(mut self, policy: OverflowPolicy) -> Self {
        self.mirror_overflow = policy;
        self
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            producer_placement: ProducerPlacement::FirstOnly,
            mirror_overflow: OverflowPolicy::Drop,
        }
    }
}
