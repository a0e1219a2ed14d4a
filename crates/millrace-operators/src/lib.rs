#![forbid(unsafe_code)]
//! millrace-operators: the operator protocol and the operators that plug
//! into it.
//!
//! Three operator shapes exist. Sources never accept input and finish when
//! their scan is exhausted. Pipeline breakers (aggregation, top-N) accept
//! input until `finish()`, then turn around and produce. Streaming
//! operators move pages through one-for-one or fewer.

pub mod agg;
pub mod project;
pub mod source;
pub mod topn;
pub mod traits;

pub use agg::{
    AggregateSpec, AggregationConfig, AggregationOperator, GroupingAggregationOperator,
    GroupingConfig,
};
pub use project::{ProjectConfig, ProjectOperator};
pub use source::{doc_slices, segment_slices, IndexSourceOperator, PartialLeaf, SourceConfig};
pub use topn::{TopNConfig, TopNOperator};
pub use traits::Operator;
