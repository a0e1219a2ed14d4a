//! Builder for aggregator-state blocks.

use millrace_core::block::{AggStateBlock, Block};
use millrace_core::error::{Error, Result};

use crate::state::{AggregatorState, StateSerializer};

/// Accumulates serialized states into a growing buffer.
///
/// The first record pins the item width; a record serializing to any other
/// width fails fast. `build` snapshots the buffer into an immutable block,
/// so block readers never observe a still-growing buffer.
pub struct AggStateBlockBuilder<S: AggregatorState> {
    serializer: S::Serializer,
    buf: Vec<u8>,
    position_count: usize,
    item_size: Option<usize>,
}

impl<S: AggregatorState> AggStateBlockBuilder<S> {
    pub fn new() -> Self {
        Self {
            serializer: S::serializer(),
            buf: Vec::new(),
            position_count: 0,
            item_size: None,
        }
    }

    pub fn add(&mut self, state: &S) -> Result<()> {
        let offset = self.buf.len();
        self.buf.resize(offset + self.serializer.size(), 0);
        let written = self.serializer.serialize(state, &mut self.buf, offset);
        self.buf.truncate(offset + written);
        match self.item_size {
            None => self.item_size = Some(written),
            Some(expected) if expected != written => {
                return Err(Error::VariableSizeState {
                    expected,
                    got: written,
                });
            }
            Some(_) => {}
        }
        self.position_count += 1;
        Ok(())
    }

    pub fn build(&self) -> Result<Block> {
        let item_size = self.item_size.unwrap_or_else(|| self.serializer.size());
        Ok(Block::AggState(AggStateBlock::new(
            self.buf.clone(),
            self.position_count,
            item_size,
            S::kind(),
        )?))
    }
}

impl<S: AggregatorState> Default for AggStateBlockBuilder<S> {
    fn default() -> Self {
        Self::new()
    }
}
