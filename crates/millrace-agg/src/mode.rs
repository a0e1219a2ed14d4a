//! Aggregator modes: which side of an aggregator is partial.

use serde::{Deserialize, Serialize};

/// Input/output partiality for one aggregator instance. Chosen by the
/// planner and fixed for the aggregator's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AggregatorMode {
    /// raw input → final output, single stage.
    Single,
    /// raw input → partial output, local pre-aggregation.
    Partial,
    /// partial input → partial output, intermediate combine.
    Intermediate,
    /// partial input → final output, final combine.
    Final,
}

impl AggregatorMode {
    pub fn is_input_partial(self) -> bool {
        matches!(self, AggregatorMode::Intermediate | AggregatorMode::Final)
    }

    pub fn is_output_partial(self) -> bool {
        matches!(self, AggregatorMode::Partial | AggregatorMode::Intermediate)
    }
}
