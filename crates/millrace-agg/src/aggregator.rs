//! Scalar aggregator: an aggregate function plus its planner-chosen mode.

use serde::{Deserialize, Serialize};

use millrace_core::block::Block;
use millrace_core::error::Result;
use millrace_core::page::Page;

use crate::mode::AggregatorMode;
use crate::scalar::{
    AggregatorFunction, AvgAggregator, CountAggregator, MaxAggregator, MinAggregator,
    SumAggregator,
};

/// Which aggregate function to instantiate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AggKind {
    Count,
    Sum,
    Min,
    Max,
    Avg,
}

/// Instantiate a scalar aggregate function for `mode`. Partial-input modes
/// get the merge-only shape; raw-input modes bind the input channel.
pub fn create_function(
    kind: AggKind,
    mode: AggregatorMode,
    channel: usize,
) -> Box<dyn AggregatorFunction> {
    if mode.is_input_partial() {
        match kind {
            AggKind::Count => Box::new(CountAggregator::intermediate()),
            AggKind::Sum => Box::new(SumAggregator::intermediate()),
            AggKind::Min => Box::new(MinAggregator::intermediate()),
            AggKind::Max => Box::new(MaxAggregator::intermediate()),
            AggKind::Avg => Box::new(AvgAggregator::intermediate()),
        }
    } else {
        match kind {
            AggKind::Count => Box::new(CountAggregator::new(channel)),
            AggKind::Sum => Box::new(SumAggregator::new(channel)),
            AggKind::Min => Box::new(MinAggregator::new(channel)),
            AggKind::Max => Box::new(MaxAggregator::new(channel)),
            AggKind::Avg => Box::new(AvgAggregator::new(channel)),
        }
    }
}

/// One aggregate bound to a mode and an input channel. In partial-input
/// modes the channel names where serialized states arrive; otherwise it
/// names the raw value column.
pub struct Aggregator {
    function: Box<dyn AggregatorFunction>,
    mode: AggregatorMode,
    intermediate_channel: Option<usize>,
}

impl Aggregator {
    pub fn new(kind: AggKind, mode: AggregatorMode, channel: usize) -> Self {
        let function = create_function(kind, mode, channel);
        let intermediate_channel = mode.is_input_partial().then_some(channel);
        Self {
            function,
            mode,
            intermediate_channel,
        }
    }

    pub fn process_page(&mut self, page: &Page) -> Result<()> {
        match self.intermediate_channel {
            Some(channel) => self.function.add_intermediate_input(page.block(channel)?),
            None => self.function.add_raw_input(page),
        }
    }

    pub fn evaluate(&self) -> Result<Block> {
        if self.mode.is_output_partial() {
            self.function.evaluate_intermediate()
        } else {
            self.function.evaluate_final()
        }
    }
}
