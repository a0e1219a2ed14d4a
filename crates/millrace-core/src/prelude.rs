//! Convenient re-exports for downstream crates.

pub use crate::block::{AggStateBlock, Block, StateKind, Value};
pub use crate::config::EngineConfig;
pub use crate::error::{Error, Result};
pub use crate::id::{PipelineId, ShardId};
pub use crate::page::Page;
