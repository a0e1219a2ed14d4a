//! Pipeline-breaking aggregation operators.
//!
//! Both operators buffer nothing but aggregator state: they accept pages
//! until `finish()`, evaluate every aggregate into a single output page,
//! and emit it on the next pull.

use serde::{Deserialize, Serialize};

use millrace_agg::{AggKind, Aggregator, AggregatorMode, GroupingAggregator};
use millrace_core::block::Block;
use millrace_core::error::{Error, Result};
use millrace_core::page::Page;

use crate::traits::Operator;

/// One aggregate column: function kind, mode, and input channel. In
/// partial-input modes the channel names where serialized states arrive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateSpec {
    pub kind: AggKind,
    pub mode: AggregatorMode,
    pub channel: usize,
}

/// Construction options for [`AggregationOperator`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregationConfig {
    pub aggregates: Vec<AggregateSpec>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Collecting,
    Emitting,
    Finished,
}

/// Scalar aggregation: one output row, one block per aggregate.
pub struct AggregationOperator {
    aggregators: Vec<Aggregator>,
    output: Option<Page>,
    step: Step,
}

impl AggregationOperator {
    pub fn new(config: AggregationConfig) -> Self {
        let aggregators = config
            .aggregates
            .into_iter()
            .map(|spec| Aggregator::new(spec.kind, spec.mode, spec.channel))
            .collect();
        Self {
            aggregators,
            output: None,
            step: Step::Collecting,
        }
    }
}

impl Operator for AggregationOperator {
    fn name(&self) -> &'static str {
        "aggregation"
    }

    fn needs_input(&self) -> bool {
        self.step == Step::Collecting
    }

    fn add_input(&mut self, page: Page) -> Result<()> {
        if self.step != Step::Collecting {
            return Err(Error::ContractViolation(
                "aggregation received input after finish".into(),
            ));
        }
        for aggregator in &mut self.aggregators {
            aggregator.process_page(&page)?;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        match self.step {
            Step::Collecting => {
                let blocks = self
                    .aggregators
                    .iter()
                    .map(|aggregator| aggregator.evaluate())
                    .collect::<Result<Vec<_>>>()?;
                self.output = Some(Page::new(1, blocks)?);
                self.step = Step::Emitting;
                Ok(())
            }
            Step::Emitting => {
                self.output = None;
                self.step = Step::Finished;
                Ok(())
            }
            Step::Finished => Err(Error::ContractViolation(
                "aggregation finished twice".into(),
            )),
        }
    }

    fn is_finished(&self) -> bool {
        self.step == Step::Finished
    }

    fn get_output(&mut self) -> Result<Option<Page>> {
        if self.step != Step::Emitting {
            return Ok(None);
        }
        let page = self.output.take();
        self.step = Step::Finished;
        Ok(page)
    }

    fn close(&mut self) {
        self.output = None;
    }
}

/// Construction options for [`GroupingAggregationOperator`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupingConfig {
    /// Channel carrying the dense group-id block in every input page.
    pub group_channel: usize,
    pub aggregates: Vec<AggregateSpec>,
}

/// Grouping aggregation: one output row per group. The output page leads
/// with a `Long` block of group ids `0..groups`, followed by one block per
/// aggregate.
pub struct GroupingAggregationOperator {
    group_channel: usize,
    aggregators: Vec<GroupingAggregator>,
    output: Option<Page>,
    step: Step,
}

impl GroupingAggregationOperator {
    pub fn new(config: GroupingConfig) -> Self {
        let aggregators = config
            .aggregates
            .into_iter()
            .map(|spec| GroupingAggregator::new(spec.kind, spec.mode, spec.channel))
            .collect();
        Self {
            group_channel: config.group_channel,
            aggregators,
            output: None,
            step: Step::Collecting,
        }
    }
}

impl Operator for GroupingAggregationOperator {
    fn name(&self) -> &'static str {
        "grouping_aggregation"
    }

    fn needs_input(&self) -> bool {
        self.step == Step::Collecting
    }

    fn add_input(&mut self, page: Page) -> Result<()> {
        if self.step != Step::Collecting {
            return Err(Error::ContractViolation(
                "grouping aggregation received input after finish".into(),
            ));
        }
        let group_ids = page.block(self.group_channel)?;
        for aggregator in &mut self.aggregators {
            aggregator.process_page(group_ids, &page)?;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        match self.step {
            Step::Collecting => {
                let groups = self
                    .aggregators
                    .iter()
                    .map(|aggregator| aggregator.group_count())
                    .max()
                    .unwrap_or(0);
                let mut blocks = Vec::with_capacity(self.aggregators.len() + 1);
                blocks.push(Block::Long((0..groups as i64).collect()));
                for aggregator in &self.aggregators {
                    blocks.push(aggregator.evaluate()?);
                }
                self.output = Some(Page::new(groups, blocks)?);
                self.step = Step::Emitting;
                Ok(())
            }
            Step::Emitting => {
                self.output = None;
                self.step = Step::Finished;
                Ok(())
            }
            Step::Finished => Err(Error::ContractViolation(
                "grouping aggregation finished twice".into(),
            )),
        }
    }

    fn is_finished(&self) -> bool {
        self.step == Step::Finished
    }

    fn get_output(&mut self) -> Result<Option<Page>> {
        if self.step != Step::Emitting {
            return Ok(None);
        }
        let page = self.output.take();
        self.step = Step::Finished;
        Ok(page)
    }

    fn close(&mut self) {
        self.output = None;
    }
}
