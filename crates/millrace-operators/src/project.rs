//! Streaming channel projection.

use serde::{Deserialize, Serialize};

use millrace_core::error::{Error, Result};
use millrace_core::page::Page;

use crate::traits::Operator;

/// Construction options for [`ProjectOperator`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Input channels to keep, in output order. A channel may repeat.
    pub channels: Vec<usize>,
}

/// Keeps a subset of channels, one page in, one page out. Holds at most
/// one projected page between `add_input` and `get_output`.
pub struct ProjectOperator {
    channels: Vec<usize>,
    buffered: Option<Page>,
    upstream_done: bool,
}

impl ProjectOperator {
    pub fn new(config: ProjectConfig) -> Self {
        Self {
            channels: config.channels,
            buffered: None,
            upstream_done: false,
        }
    }
}

impl Operator for ProjectOperator {
    fn name(&self) -> &'static str {
        "project"
    }

    fn needs_input(&self) -> bool {
        !self.upstream_done && self.buffered.is_none()
    }

    fn add_input(&mut self, page: Page) -> Result<()> {
        if !self.needs_input() {
            return Err(Error::ContractViolation(
                "project received input while holding a page".into(),
            ));
        }
        let blocks = self
            .channels
            .iter()
            .map(|&channel| page.block(channel).cloned())
            .collect::<Result<Vec<_>>>()?;
        self.buffered = Some(Page::new(page.position_count(), blocks)?);
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if self.upstream_done {
            return Err(Error::ContractViolation("project finished twice".into()));
        }
        self.upstream_done = true;
        Ok(())
    }

    fn is_finished(&self) -> bool {
        self.upstream_done && self.buffered.is_none()
    }

    fn get_output(&mut self) -> Result<Option<Page>> {
        Ok(self.buffered.take())
    }

    fn close(&mut self) {
        self.buffered = None;
    }
}
