//! Bounded top-N over row pages.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use serde::{Deserialize, Serialize};

use millrace_core::error::{Error, Result};
use millrace_core::page::Page;

use crate::traits::Operator;

/// Construction options for [`TopNOperator`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopNConfig {
    /// Channel whose long value keys the ordering of each row.
    pub sort_channel: usize,
    /// Ascending keeps the k smallest keys; descending keeps the k largest.
    pub ascending: bool,
    pub top_count: usize,
}

// monotonically increasing state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    NeedsInput,
    HasOutput,
    Finished,
}

/// Heap entry ordered so the head is always the worst row currently kept:
/// the largest key when ascending, the smallest when descending.
struct HeapRow {
    key: i64,
    ascending: bool,
    page: Page,
}

impl PartialEq for HeapRow {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for HeapRow {}

impl PartialOrd for HeapRow {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapRow {
    fn cmp(&self, other: &Self) -> Ordering {
        if self.ascending {
            self.key.cmp(&other.key)
        } else {
            other.key.cmp(&self.key)
        }
    }
}

pub struct TopNOperator {
    config: TopNConfig,
    heap: BinaryHeap<HeapRow>,
    state: State,
}

impl TopNOperator {
    pub fn new(config: TopNConfig) -> Self {
        Self {
            heap: BinaryHeap::with_capacity(config.top_count),
            config,
            state: State::NeedsInput,
        }
    }

    /// Insert with overflow: at capacity, the new row displaces the head
    /// iff it dominates it.
    fn insert_with_overflow(&mut self, row: HeapRow) {
        if self.config.top_count == 0 {
            return;
        }
        if self.heap.len() < self.config.top_count {
            self.heap.push(row);
        } else if let Some(head) = self.heap.peek() {
            if row.cmp(head) == Ordering::Less {
                self.heap.pop();
                self.heap.push(row);
            }
        }
    }
}

impl Operator for TopNOperator {
    fn name(&self) -> &'static str {
        "top_n"
    }

    fn needs_input(&self) -> bool {
        self.state == State::NeedsInput
    }

    fn add_input(&mut self, page: Page) -> Result<()> {
        if self.state != State::NeedsInput {
            return Err(Error::ContractViolation(
                "top-n received input after finish".into(),
            ));
        }
        for position in 0..page.position_count() {
            let row = page.get_row(position)?;
            let key = row.block(self.config.sort_channel)?.get_long(0)?;
            self.insert_with_overflow(HeapRow {
                key,
                ascending: self.config.ascending,
                page: row,
            });
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.state = match self.state {
            State::NeedsInput => State::HasOutput,
            // A second finish drains early, dropping buffered rows.
            State::HasOutput => State::Finished,
            State::Finished => {
                return Err(Error::ContractViolation("top-n finished twice".into()));
            }
        };
        Ok(())
    }

    fn is_finished(&self) -> bool {
        self.state == State::Finished
    }

    /// Pops one row-page per call, worst-kept-first; callers that need
    /// sorted output sort downstream.
    fn get_output(&mut self) -> Result<Option<Page>> {
        if self.state != State::HasOutput {
            return Ok(None);
        }
        let page = self.heap.pop().map(|row| row.page);
        if self.heap.is_empty() {
            self.state = State::Finished;
        }
        Ok(page)
    }

    fn close(&mut self) {
        self.heap.clear();
    }
}
