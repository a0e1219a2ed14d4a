//! Pages: row batches formed from equal-length blocks.
//!
//! Pages are value-like and exist only while in flight between two
//! operators; moving one transfers ownership of its blocks.

use crate::block::Block;
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    position_count: usize,
    blocks: Vec<Block>,
}

impl Page {
    /// Build a page from blocks that must all share `position_count`.
    pub fn new(position_count: usize, blocks: Vec<Block>) -> Result<Self> {
        for (channel, block) in blocks.iter().enumerate() {
            if block.position_count() != position_count {
                return Err(Error::ContractViolation(format!(
                    "block at channel {channel} has {} positions, page has {position_count}",
                    block.position_count()
                )));
            }
        }
        Ok(Self {
            position_count,
            blocks,
        })
    }

    pub fn position_count(&self) -> usize {
        self.position_count
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn block(&self, channel: usize) -> Result<&Block> {
        self.blocks.get(channel).ok_or_else(|| {
            Error::ContractViolation(format!(
                "channel {channel} out of range for page of {} blocks",
                self.blocks.len()
            ))
        })
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn into_blocks(self) -> Vec<Block> {
        self.blocks
    }

    /// Extract row `position` as a one-row page of one-position blocks.
    pub fn get_row(&self, position: usize) -> Result<Page> {
        let blocks = self
            .blocks
            .iter()
            .map(|block| block.get_row(position))
            .collect::<Result<Vec<_>>>()?;
        Page::new(1, blocks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_mismatched_block_lengths() {
        let blocks = vec![Block::Int(vec![1, 2]), Block::Long(vec![9])];
        assert!(Page::new(2, blocks).is_err());
    }

    #[test]
    fn row_extraction_yields_one_row_pages() {
        let page = Page::new(
            3,
            vec![Block::Int(vec![10, 20, 30]), Block::constant_int(7, 3)],
        )
        .unwrap();
        let row = page.get_row(2).unwrap();
        assert_eq!(row.position_count(), 1);
        assert_eq!(row.block(0).unwrap().get_int(0).unwrap(), 30);
        assert_eq!(row.block(1).unwrap().get_int(0).unwrap(), 7);
    }
}
