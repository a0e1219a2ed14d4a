//! Accumulator states and their byte serializers.
//!
//! The encoding is little-endian, natural width, no padding. A serializer's
//! `size()` is stable for its state type across processes of the same major
//! version; it defines the wire format for cross-node partial aggregation.

use millrace_core::block::{AggStateBlock, StateKind};
use millrace_core::error::{Error, Result};

/// Round-trips one state kind to and from a byte region at a given offset.
pub trait StateSerializer {
    type State;

    /// Fixed byte width of one serialized state.
    fn size(&self) -> usize;

    /// Write exactly `size()` bytes at `offset`; returns bytes written.
    fn serialize(&self, state: &Self::State, buf: &mut [u8], offset: usize) -> usize;

    /// Read exactly `size()` bytes at `offset`.
    fn deserialize(&self, state: &mut Self::State, buf: &[u8], offset: usize);
}

/// An aggregator accumulator with a fixed-width byte round-trip.
pub trait AggregatorState: Default + PartialEq + std::fmt::Debug {
    type Serializer: StateSerializer<State = Self> + Default;

    fn kind() -> StateKind;

    fn serializer() -> Self::Serializer {
        Self::Serializer::default()
    }
}

/// Deserialize the record at `position` into `state` through the state's
/// serializer, reading from offset `position * item_size`.
pub fn read_state<S: AggregatorState>(
    states: &AggStateBlock,
    position: usize,
    state: &mut S,
) -> Result<()> {
    if states.kind() != S::kind() {
        return Err(Error::ModeMismatch(format!(
            "expected {:?} states, got {:?}",
            S::kind(),
            states.kind()
        )));
    }
    states.item_bytes(position)?;
    S::serializer().deserialize(state, states.bytes(), position * states.item_size());
    Ok(())
}

/// A single double, e.g. a running min/max/sum.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct DoubleState {
    pub value: f64,
}

impl DoubleState {
    pub fn new(value: f64) -> Self {
        Self { value }
    }
}

#[derive(Debug, Default)]
pub struct DoubleStateSerializer;

impl StateSerializer for DoubleStateSerializer {
    type State = DoubleState;

    fn size(&self) -> usize {
        8
    }

    fn serialize(&self, state: &DoubleState, buf: &mut [u8], offset: usize) -> usize {
        buf[offset..offset + 8].copy_from_slice(&state.value.to_le_bytes());
        8
    }

    fn deserialize(&self, state: &mut DoubleState, buf: &[u8], offset: usize) {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&buf[offset..offset + 8]);
        state.value = f64::from_le_bytes(raw);
    }
}

impl AggregatorState for DoubleState {
    type Serializer = DoubleStateSerializer;

    fn kind() -> StateKind {
        StateKind::Double
    }
}

/// A single long, e.g. a running count.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct LongState {
    pub value: i64,
}

impl LongState {
    pub fn new(value: i64) -> Self {
        Self { value }
    }
}

#[derive(Debug, Default)]
pub struct LongStateSerializer;

impl StateSerializer for LongStateSerializer {
    type State = LongState;

    fn size(&self) -> usize {
        8
    }

    fn serialize(&self, state: &LongState, buf: &mut [u8], offset: usize) -> usize {
        buf[offset..offset + 8].copy_from_slice(&state.value.to_le_bytes());
        8
    }

    fn deserialize(&self, state: &mut LongState, buf: &[u8], offset: usize) {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&buf[offset..offset + 8]);
        state.value = i64::from_le_bytes(raw);
    }
}

impl AggregatorState for LongState {
    type Serializer = LongStateSerializer;

    fn kind() -> StateKind {
        StateKind::Long
    }
}

/// Running sum and count for averages. Serialized as sum then count.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct AvgState {
    pub sum: f64,
    pub count: i64,
}

#[derive(Debug, Default)]
pub struct AvgStateSerializer;

impl StateSerializer for AvgStateSerializer {
    type State = AvgState;

    fn size(&self) -> usize {
        16
    }

    fn serialize(&self, state: &AvgState, buf: &mut [u8], offset: usize) -> usize {
        buf[offset..offset + 8].copy_from_slice(&state.sum.to_le_bytes());
        buf[offset + 8..offset + 16].copy_from_slice(&state.count.to_le_bytes());
        16
    }

    fn deserialize(&self, state: &mut AvgState, buf: &[u8], offset: usize) {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&buf[offset..offset + 8]);
        state.sum = f64::from_le_bytes(raw);
        raw.copy_from_slice(&buf[offset + 8..offset + 16]);
        state.count = i64::from_le_bytes(raw);
    }
}

impl AggregatorState for AvgState {
    type Serializer = AvgStateSerializer;

    fn kind() -> StateKind {
        StateKind::Avg
    }
}
