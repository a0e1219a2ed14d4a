//! Multi-group aggregate functions keyed by a dense group-id block.
//!
//! Group ids are non-negative and dense: seeing id `g` ensures slots
//! `0..=g` exist, with new slots initialized to the aggregate's identity.

use millrace_core::block::Block;
use millrace_core::error::{Error, Result};
use millrace_core::page::Page;

use crate::aggregator::AggKind;
use crate::builder::AggStateBlockBuilder;
use crate::mode::AggregatorMode;
use crate::scalar::raw_channel;
use crate::state::{read_state, AggregatorState, AvgState, DoubleState, LongState};

/// One multi-group aggregate holding one state slot per group id.
pub trait GroupingAggregatorFunction: Send {
    /// Fold one raw value per position into the slot named by its group id.
    fn add_raw_input(&mut self, group_ids: &Block, page: &Page) -> Result<()>;

    /// Merge one serialized state per position into the slot named by its
    /// group id.
    fn add_intermediate_input(&mut self, group_ids: &Block, block: &Block) -> Result<()>;

    /// State block with one position per group.
    fn evaluate_intermediate(&self) -> Result<Block>;

    /// Primitive block with one finalized value per group.
    fn evaluate_final(&self) -> Result<Block>;

    /// Number of group slots allocated so far.
    fn group_count(&self) -> usize;
}

pub struct GroupingMax {
    states: Vec<DoubleState>,
    channel: Option<usize>,
}

impl GroupingMax {
    pub fn new(channel: usize) -> Self {
        Self {
            states: Vec::new(),
            channel: Some(channel),
        }
    }

    pub fn intermediate() -> Self {
        Self {
            states: Vec::new(),
            channel: None,
        }
    }
}

impl GroupingAggregatorFunction for GroupingMax {
    fn add_raw_input(&mut self, group_ids: &Block, page: &Page) -> Result<()> {
        let values = page.block(raw_channel(self.channel)?)?;
        for position in 0..page.position_count() {
            let group = group_at(group_ids, position)?;
            ensure_slots(&mut self.states, group, DoubleState::new(f64::NEG_INFINITY));
            let value = values.get_double(position)?;
            let slot = &mut self.states[group];
            slot.value = slot.value.max(value);
        }
        Ok(())
    }

    fn add_intermediate_input(&mut self, group_ids: &Block, block: &Block) -> Result<()> {
        let states = &mut self.states;
        merge_states_by_group::<DoubleState>(block, group_ids, |group, incoming| {
            ensure_slots(states, group, DoubleState::new(f64::NEG_INFINITY));
            let slot = &mut states[group];
            slot.value = slot.value.max(incoming.value);
        })
    }

    fn evaluate_intermediate(&self) -> Result<Block> {
        states_to_block(&self.states)
    }

    fn evaluate_final(&self) -> Result<Block> {
        Ok(Block::Double(self.states.iter().map(|s| s.value).collect()))
    }

    fn group_count(&self) -> usize {
        self.states.len()
    }
}

pub struct GroupingMin {
    states: Vec<DoubleState>,
    channel: Option<usize>,
}

impl GroupingMin {
    pub fn new(channel: usize) -> Self {
        Self {
            states: Vec::new(),
            channel: Some(channel),
        }
    }

    pub fn intermediate() -> Self {
        Self {
            states: Vec::new(),
            channel: None,
        }
    }
}

impl GroupingAggregatorFunction for GroupingMin {
    fn add_raw_input(&mut self, group_ids: &Block, page: &Page) -> Result<()> {
        let values = page.block(raw_channel(self.channel)?)?;
        for position in 0..page.position_count() {
            let group = group_at(group_ids, position)?;
            ensure_slots(&mut self.states, group, DoubleState::new(f64::INFINITY));
            let value = values.get_double(position)?;
            let slot = &mut self.states[group];
            slot.value = slot.value.min(value);
        }
        Ok(())
    }

    fn add_intermediate_input(&mut self, group_ids: &Block, block: &Block) -> Result<()> {
        let states = &mut self.states;
        merge_states_by_group::<DoubleState>(block, group_ids, |group, incoming| {
            ensure_slots(states, group, DoubleState::new(f64::INFINITY));
            let slot = &mut states[group];
            slot.value = slot.value.min(incoming.value);
        })
    }

    fn evaluate_intermediate(&self) -> Result<Block> {
        states_to_block(&self.states)
    }

    fn evaluate_final(&self) -> Result<Block> {
        Ok(Block::Double(self.states.iter().map(|s| s.value).collect()))
    }

    fn group_count(&self) -> usize {
        self.states.len()
    }
}

pub struct GroupingSum {
    states: Vec<DoubleState>,
    channel: Option<usize>,
}

impl GroupingSum {
    pub fn new(channel: usize) -> Self {
        Self {
            states: Vec::new(),
            channel: Some(channel),
        }
    }

    pub fn intermediate() -> Self {
        Self {
            states: Vec::new(),
            channel: None,
        }
    }
}

impl GroupingAggregatorFunction for GroupingSum {
    fn add_raw_input(&mut self, group_ids: &Block, page: &Page) -> Result<()> {
        let values = page.block(raw_channel(self.channel)?)?;
        for position in 0..page.position_count() {
            let group = group_at(group_ids, position)?;
            ensure_slots(&mut self.states, group, DoubleState::default());
            self.states[group].value += values.get_double(position)?;
        }
        Ok(())
    }

    fn add_intermediate_input(&mut self, group_ids: &Block, block: &Block) -> Result<()> {
        let states = &mut self.states;
        merge_states_by_group::<DoubleState>(block, group_ids, |group, incoming| {
            ensure_slots(states, group, DoubleState::default());
            states[group].value += incoming.value;
        })
    }

    fn evaluate_intermediate(&self) -> Result<Block> {
        states_to_block(&self.states)
    }

    fn evaluate_final(&self) -> Result<Block> {
        Ok(Block::Double(self.states.iter().map(|s| s.value).collect()))
    }

    fn group_count(&self) -> usize {
        self.states.len()
    }
}

pub struct GroupingCount {
    states: Vec<LongState>,
    channel: Option<usize>,
}

impl GroupingCount {
    pub fn new(channel: usize) -> Self {
        Self {
            states: Vec::new(),
            channel: Some(channel),
        }
    }

    pub fn intermediate() -> Self {
        Self {
            states: Vec::new(),
            channel: None,
        }
    }
}

impl GroupingAggregatorFunction for GroupingCount {
    fn add_raw_input(&mut self, group_ids: &Block, page: &Page) -> Result<()> {
        // The counted channel must exist even though its values are unused.
        page.block(raw_channel(self.channel)?)?;
        for position in 0..page.position_count() {
            let group = group_at(group_ids, position)?;
            ensure_slots(&mut self.states, group, LongState::default());
            self.states[group].value += 1;
        }
        Ok(())
    }

    fn add_intermediate_input(&mut self, group_ids: &Block, block: &Block) -> Result<()> {
        let states = &mut self.states;
        merge_states_by_group::<LongState>(block, group_ids, |group, incoming| {
            ensure_slots(states, group, LongState::default());
            states[group].value += incoming.value;
        })
    }

    fn evaluate_intermediate(&self) -> Result<Block> {
        states_to_block(&self.states)
    }

    fn evaluate_final(&self) -> Result<Block> {
        Ok(Block::Long(self.states.iter().map(|s| s.value).collect()))
    }

    fn group_count(&self) -> usize {
        self.states.len()
    }
}

pub struct GroupingAvg {
    states: Vec<AvgState>,
    channel: Option<usize>,
}

impl GroupingAvg {
    pub fn new(channel: usize) -> Self {
        Self {
            states: Vec::new(),
            channel: Some(channel),
        }
    }

    pub fn intermediate() -> Self {
        Self {
            states: Vec::new(),
            channel: None,
        }
    }
}

impl GroupingAggregatorFunction for GroupingAvg {
    fn add_raw_input(&mut self, group_ids: &Block, page: &Page) -> Result<()> {
        let values = page.block(raw_channel(self.channel)?)?;
        for position in 0..page.position_count() {
            let group = group_at(group_ids, position)?;
            ensure_slots(&mut self.states, group, AvgState::default());
            let slot = &mut self.states[group];
            slot.sum += values.get_double(position)?;
            slot.count += 1;
        }
        Ok(())
    }

    fn add_intermediate_input(&mut self, group_ids: &Block, block: &Block) -> Result<()> {
        let states = &mut self.states;
        merge_states_by_group::<AvgState>(block, group_ids, |group, incoming| {
            ensure_slots(states, group, AvgState::default());
            let slot = &mut states[group];
            slot.sum += incoming.sum;
            slot.count += incoming.count;
        })
    }

    fn evaluate_intermediate(&self) -> Result<Block> {
        states_to_block(&self.states)
    }

    fn evaluate_final(&self) -> Result<Block> {
        Ok(Block::Double(
            self.states
                .iter()
                .map(|s| s.sum / s.count as f64)
                .collect(),
        ))
    }

    fn group_count(&self) -> usize {
        self.states.len()
    }
}

/// Instantiate a grouping aggregate function for `mode`.
pub fn create_grouping_function(
    kind: AggKind,
    mode: AggregatorMode,
    channel: usize,
) -> Box<dyn GroupingAggregatorFunction> {
    if mode.is_input_partial() {
        match kind {
            AggKind::Count => Box::new(GroupingCount::intermediate()),
            AggKind::Sum => Box::new(GroupingSum::intermediate()),
            AggKind::Min => Box::new(GroupingMin::intermediate()),
            AggKind::Max => Box::new(GroupingMax::intermediate()),
            AggKind::Avg => Box::new(GroupingAvg::intermediate()),
        }
    } else {
        match kind {
            AggKind::Count => Box::new(GroupingCount::new(channel)),
            AggKind::Sum => Box::new(GroupingSum::new(channel)),
            AggKind::Min => Box::new(GroupingMin::new(channel)),
            AggKind::Max => Box::new(GroupingMax::new(channel)),
            AggKind::Avg => Box::new(GroupingAvg::new(channel)),
        }
    }
}

/// One grouping aggregate bound to a mode. In partial-input modes the
/// channel names where serialized states arrive in each page; otherwise it
/// names the raw value column.
pub struct GroupingAggregator {
    function: Box<dyn GroupingAggregatorFunction>,
    mode: AggregatorMode,
    intermediate_channel: Option<usize>,
}

impl GroupingAggregator {
    pub fn new(kind: AggKind, mode: AggregatorMode, channel: usize) -> Self {
        let function = create_grouping_function(kind, mode, channel);
        let intermediate_channel = mode.is_input_partial().then_some(channel);
        Self {
            function,
            mode,
            intermediate_channel,
        }
    }

    pub fn process_page(&mut self, group_ids: &Block, page: &Page) -> Result<()> {
        match self.intermediate_channel {
            Some(channel) => self
                .function
                .add_intermediate_input(group_ids, page.block(channel)?),
            None => self.function.add_raw_input(group_ids, page),
        }
    }

    pub fn evaluate(&self) -> Result<Block> {
        if self.mode.is_output_partial() {
            self.function.evaluate_intermediate()
        } else {
            self.function.evaluate_final()
        }
    }

    pub fn group_count(&self) -> usize {
        self.function.group_count()
    }
}

// ---- shared slot/state helpers ----

fn group_at(group_ids: &Block, position: usize) -> Result<usize> {
    let id = group_ids.get_long(position)?;
    usize::try_from(id)
        .map_err(|_| Error::ContractViolation(format!("negative group id {id}")))
}

fn ensure_slots<S: Clone>(states: &mut Vec<S>, group: usize, identity: S) {
    if group >= states.len() {
        states.resize(group + 1, identity);
    }
}

/// Pair each position's serialized state with its group id and hand both
/// to `merge`.
fn merge_states_by_group<S: AggregatorState>(
    block: &Block,
    group_ids: &Block,
    mut merge: impl FnMut(usize, &S),
) -> Result<()> {
    let states = block.agg_state().ok_or_else(|| {
        Error::ModeMismatch("intermediate input must be an aggregator-state block".into())
    })?;
    let mut tmp = S::default();
    for position in 0..states.position_count() {
        let group = group_at(group_ids, position)?;
        read_state(states, position, &mut tmp)?;
        merge(group, &tmp);
    }
    Ok(())
}

fn states_to_block<S: AggregatorState>(states: &[S]) -> Result<Block> {
    let mut builder = AggStateBlockBuilder::<S>::new();
    for state in states {
        builder.add(state)?;
    }
    builder.build()
}
