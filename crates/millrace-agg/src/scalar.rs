//! Single-group (scalar) aggregate functions.

use millrace_core::block::Block;
use millrace_core::error::{Error, Result};
use millrace_core::page::Page;

use crate::builder::AggStateBlockBuilder;
use crate::state::{read_state, AggregatorState, AvgState, DoubleState, LongState};

/// One scalar aggregate: folds raw pages or merges serialized partial
/// states, then evaluates to an intermediate state block or a final
/// primitive block.
pub trait AggregatorFunction: Send {
    /// Fold raw values from the declared input channel into the state.
    fn add_raw_input(&mut self, page: &Page) -> Result<()>;

    /// Merge a block of serialized states, position by position.
    fn add_intermediate_input(&mut self, block: &Block) -> Result<()>;

    /// A single-position state block holding the current serialization.
    fn evaluate_intermediate(&self) -> Result<Block>;

    /// A single-position primitive block carrying the finalized scalar.
    fn evaluate_final(&self) -> Result<Block>;
}

/// Maximum over doubles; identity is negative infinity so negative-only
/// inputs fold correctly.
pub struct MaxAggregator {
    state: DoubleState,
    channel: Option<usize>,
}

impl MaxAggregator {
    pub fn new(channel: usize) -> Self {
        Self {
            state: DoubleState::new(f64::NEG_INFINITY),
            channel: Some(channel),
        }
    }

    pub fn intermediate() -> Self {
        Self {
            state: DoubleState::new(f64::NEG_INFINITY),
            channel: None,
        }
    }
}

impl AggregatorFunction for MaxAggregator {
    fn add_raw_input(&mut self, page: &Page) -> Result<()> {
        let channel = raw_channel(self.channel)?;
        let folded = fold_double(page.block(channel)?, f64::NEG_INFINITY, f64::max)?;
        self.state.value = self.state.value.max(folded);
        Ok(())
    }

    fn add_intermediate_input(&mut self, block: &Block) -> Result<()> {
        let state = &mut self.state;
        for_each_state::<DoubleState>(block, |incoming| {
            state.value = state.value.max(incoming.value);
        })
    }

    fn evaluate_intermediate(&self) -> Result<Block> {
        single_state_block(&self.state)
    }

    fn evaluate_final(&self) -> Result<Block> {
        Ok(Block::Double(vec![self.state.value]))
    }
}

/// Minimum over doubles.
pub struct MinAggregator {
    state: DoubleState,
    channel: Option<usize>,
}

impl MinAggregator {
    pub fn new(channel: usize) -> Self {
        Self {
            state: DoubleState::new(f64::INFINITY),
            channel: Some(channel),
        }
    }

    pub fn intermediate() -> Self {
        Self {
            state: DoubleState::new(f64::INFINITY),
            channel: None,
        }
    }
}

impl AggregatorFunction for MinAggregator {
    fn add_raw_input(&mut self, page: &Page) -> Result<()> {
        let channel = raw_channel(self.channel)?;
        let folded = fold_double(page.block(channel)?, f64::INFINITY, f64::min)?;
        self.state.value = self.state.value.min(folded);
        Ok(())
    }

    fn add_intermediate_input(&mut self, block: &Block) -> Result<()> {
        let state = &mut self.state;
        for_each_state::<DoubleState>(block, |incoming| {
            state.value = state.value.min(incoming.value);
        })
    }

    fn evaluate_intermediate(&self) -> Result<Block> {
        single_state_block(&self.state)
    }

    fn evaluate_final(&self) -> Result<Block> {
        Ok(Block::Double(vec![self.state.value]))
    }
}

/// Sum over doubles.
pub struct SumAggregator {
    state: DoubleState,
    channel: Option<usize>,
}

impl SumAggregator {
    pub fn new(channel: usize) -> Self {
        Self {
            state: DoubleState::default(),
            channel: Some(channel),
        }
    }

    pub fn intermediate() -> Self {
        Self {
            state: DoubleState::default(),
            channel: None,
        }
    }
}

impl AggregatorFunction for SumAggregator {
    fn add_raw_input(&mut self, page: &Page) -> Result<()> {
        let channel = raw_channel(self.channel)?;
        let folded = fold_double(page.block(channel)?, 0.0, |a, b| a + b)?;
        self.state.value += folded;
        Ok(())
    }

    fn add_intermediate_input(&mut self, block: &Block) -> Result<()> {
        let state = &mut self.state;
        for_each_state::<DoubleState>(block, |incoming| {
            state.value += incoming.value;
        })
    }

    fn evaluate_intermediate(&self) -> Result<Block> {
        single_state_block(&self.state)
    }

    fn evaluate_final(&self) -> Result<Block> {
        Ok(Block::Double(vec![self.state.value]))
    }
}

/// Row count for the declared channel.
pub struct CountAggregator {
    state: LongState,
    channel: Option<usize>,
}

impl CountAggregator {
    pub fn new(channel: usize) -> Self {
        Self {
            state: LongState::default(),
            channel: Some(channel),
        }
    }

    pub fn intermediate() -> Self {
        Self {
            state: LongState::default(),
            channel: None,
        }
    }
}

impl AggregatorFunction for CountAggregator {
    fn add_raw_input(&mut self, page: &Page) -> Result<()> {
        let channel = raw_channel(self.channel)?;
        self.state.value += page.block(channel)?.position_count() as i64;
        Ok(())
    }

    fn add_intermediate_input(&mut self, block: &Block) -> Result<()> {
        let state = &mut self.state;
        for_each_state::<LongState>(block, |incoming| {
            state.value += incoming.value;
        })
    }

    fn evaluate_intermediate(&self) -> Result<Block> {
        single_state_block(&self.state)
    }

    fn evaluate_final(&self) -> Result<Block> {
        Ok(Block::Long(vec![self.state.value]))
    }
}

/// Arithmetic mean; the partial state keeps sum and count so merges stay
/// exact in count.
pub struct AvgAggregator {
    state: AvgState,
    channel: Option<usize>,
}

impl AvgAggregator {
    pub fn new(channel: usize) -> Self {
        Self {
            state: AvgState::default(),
            channel: Some(channel),
        }
    }

    pub fn intermediate() -> Self {
        Self {
            state: AvgState::default(),
            channel: None,
        }
    }
}

impl AggregatorFunction for AvgAggregator {
    fn add_raw_input(&mut self, page: &Page) -> Result<()> {
        let channel = raw_channel(self.channel)?;
        let block = page.block(channel)?;
        self.state.sum += fold_double(block, 0.0, |a, b| a + b)?;
        self.state.count += block.position_count() as i64;
        Ok(())
    }

    fn add_intermediate_input(&mut self, block: &Block) -> Result<()> {
        let state = &mut self.state;
        for_each_state::<AvgState>(block, |incoming| {
            state.sum += incoming.sum;
            state.count += incoming.count;
        })
    }

    fn evaluate_intermediate(&self) -> Result<Block> {
        single_state_block(&self.state)
    }

    fn evaluate_final(&self) -> Result<Block> {
        Ok(Block::Double(vec![self.state.sum / self.state.count as f64]))
    }
}

// ---- shared folding/merging helpers ----

pub(crate) fn raw_channel(channel: Option<usize>) -> Result<usize> {
    channel.ok_or_else(|| {
        Error::ModeMismatch("aggregator built for partial input cannot take raw pages".into())
    })
}

/// Fold a primitive block into a double. Long and double vectors take
/// typed fast paths; constants loop through the broadcast accessor.
fn fold_double(block: &Block, identity: f64, combine: fn(f64, f64) -> f64) -> Result<f64> {
    Ok(match block {
        Block::Int(values) => values
            .iter()
            .fold(identity, |acc, &v| combine(acc, f64::from(v))),
        Block::Long(values) => values
            .iter()
            .fold(identity, |acc, &v| combine(acc, v as f64)),
        Block::Double(values) => values.iter().copied().fold(identity, combine),
        Block::Constant { .. } => {
            let mut acc = identity;
            for position in 0..block.position_count() {
                acc = combine(acc, block.get_double(position)?);
            }
            acc
        }
        Block::AggState(_) => {
            return Err(Error::ModeMismatch(
                "raw-input fold cannot consume an aggregator-state block".into(),
            ))
        }
    })
}

/// Deserialize each position of a state block and hand it to `merge`.
fn for_each_state<S: AggregatorState>(block: &Block, mut merge: impl FnMut(&S)) -> Result<()> {
    let states = block.agg_state().ok_or_else(|| {
        Error::ModeMismatch("intermediate input must be an aggregator-state block".into())
    })?;
    let mut tmp = S::default();
    for position in 0..states.position_count() {
        read_state(states, position, &mut tmp)?;
        merge(&tmp);
    }
    Ok(())
}

fn single_state_block<S: AggregatorState>(state: &S) -> Result<Block> {
    let mut builder = AggStateBlockBuilder::<S>::new();
    builder.add(state)?;
    builder.build()
}
