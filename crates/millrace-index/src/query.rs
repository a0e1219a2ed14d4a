//! Query-side traits: rewrite, weights, and bulk scoring.

use std::sync::Arc;

use millrace_core::error::Result;

use crate::reader::{IndexReader, LeafReader, LiveDocs};

/// How matches are scored. The engine only ever asks for constant-score
/// matching; scorers must not compute relevance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreMode {
    CompleteNoScores,
}

/// An opaque, rewriteable query accepted by the reader's searcher.
pub trait Query: Send + Sync {
    /// Simplify this query against a concrete reader. Queries with nothing
    /// to simplify return themselves.
    fn rewrite(self: Arc<Self>, reader: &dyn IndexReader) -> Result<Arc<dyn Query>>;

    /// Realize this (rewritten) query into a weight ready to produce
    /// per-leaf scorers.
    fn create_weight(&self, reader: &dyn IndexReader, mode: ScoreMode)
        -> Result<Arc<dyn Weight>>;
}

/// A query bound to a reader, ready to score leaves.
pub trait Weight: Send + Sync {
    /// A scorer over `leaf`, or `None` when the leaf cannot match anything
    /// and should be skipped outright.
    fn bulk_scorer(&self, leaf: &dyn LeafReader) -> Result<Option<Box<dyn BulkScorer>>>;
}

/// Scores one leaf in doc-id order.
pub trait BulkScorer: Send {
    /// Collect matching live doc ids in `[min, max)` through `collector`
    /// and return the next undone position (`max` once the range is fully
    /// scored).
    fn score(
        &mut self,
        collector: &mut dyn FnMut(u32),
        live_docs: Option<&LiveDocs>,
        min: u32,
        max: u32,
    ) -> Result<u32>;
}
