//! Segmented in-memory index.
//!
//! Enough of an inverted index to drive the engine end-to-end: segments
//! with optional live-doc bitmaps, per-term postings, and the three query
//! shapes the test suites lean on.

use std::collections::HashMap;
use std::sync::Arc;

use millrace_core::error::Result;

use crate::query::{BulkScorer, Query, ScoreMode, Weight};
use crate::reader::{IndexReader, LeafReader, LiveDocs};

/// One in-memory segment: a doc-id space, optional live-doc bitmap, and
/// term postings in doc-id order.
#[derive(Debug, Default)]
pub struct MemSegment {
    ord: usize,
    max_doc: u32,
    live: Option<LiveDocs>,
    postings: HashMap<String, Vec<u32>>,
}

impl MemSegment {
    pub fn new(max_doc: u32) -> Self {
        Self {
            max_doc,
            ..Self::default()
        }
    }

    /// Postings must be sorted ascending and within `0..max_doc`.
    pub fn with_postings(mut self, term: &str, docs: Vec<u32>) -> Self {
        self.postings.insert(term.to_string(), docs);
        self
    }

    /// Bitmap length must equal `max_doc`; a cleared bit marks a deleted
    /// document.
    pub fn with_live_docs(mut self, live: LiveDocs) -> Self {
        self.live = Some(live);
        self
    }
}

impl LeafReader for MemSegment {
    fn ord(&self) -> usize {
        self.ord
    }

    fn max_doc(&self) -> u32 {
        self.max_doc
    }

    fn live_docs(&self) -> Option<&LiveDocs> {
        self.live.as_ref()
    }
}

/// A shard-level reader over in-memory segments.
pub struct MemIndex {
    segments: Vec<Arc<MemSegment>>,
}

impl MemIndex {
    /// Leaf ordinals are assigned from segment order.
    pub fn new(segments: Vec<MemSegment>) -> Self {
        let segments = segments
            .into_iter()
            .enumerate()
            .map(|(ord, mut segment)| {
                segment.ord = ord;
                Arc::new(segment)
            })
            .collect();
        Self { segments }
    }

    /// An index with the given segment sizes and no postings or deletions.
    pub fn with_sizes(segment_sizes: &[u32]) -> Self {
        Self::new(segment_sizes.iter().map(|&n| MemSegment::new(n)).collect())
    }

    /// A query over `term`'s postings, snapshotted from this index.
    ///
    /// The engine-facing traits deliberately hide postings, so term queries
    /// are minted by the index they search.
    pub fn term_query(&self, term: &str) -> TermQuery {
        let per_leaf = self
            .segments
            .iter()
            .map(|segment| segment.postings.get(term).cloned().unwrap_or_default())
            .collect();
        TermQuery {
            term: term.to_string(),
            per_leaf,
        }
    }
}

impl IndexReader for MemIndex {
    fn leaves(&self) -> Vec<Arc<dyn LeafReader>> {
        self.segments
            .iter()
            .map(|segment| Arc::clone(segment) as Arc<dyn LeafReader>)
            .collect()
    }
}

// ---- queries ----

/// Matches every live document.
#[derive(Debug, Clone, Copy, Default)]
pub struct MatchAllQuery;

impl Query for MatchAllQuery {
    fn rewrite(self: Arc<Self>, _reader: &dyn IndexReader) -> Result<Arc<dyn Query>> {
        Ok(self)
    }

    fn create_weight(
        &self,
        _reader: &dyn IndexReader,
        _mode: ScoreMode,
    ) -> Result<Arc<dyn Weight>> {
        Ok(Arc::new(MatchAllWeight))
    }
}

struct MatchAllWeight;

impl Weight for MatchAllWeight {
    fn bulk_scorer(&self, _leaf: &dyn LeafReader) -> Result<Option<Box<dyn BulkScorer>>> {
        Ok(Some(Box::new(RangeScorer)))
    }
}

struct RangeScorer;

impl BulkScorer for RangeScorer {
    fn score(
        &mut self,
        collector: &mut dyn FnMut(u32),
        live_docs: Option<&LiveDocs>,
        min: u32,
        max: u32,
    ) -> Result<u32> {
        for doc in min..max {
            if is_live(live_docs, doc) {
                collector(doc);
            }
        }
        Ok(max)
    }
}

/// Matches nothing; every leaf reports no scorer.
#[derive(Debug, Clone, Copy, Default)]
pub struct MatchNoneQuery;

impl Query for MatchNoneQuery {
    fn rewrite(self: Arc<Self>, _reader: &dyn IndexReader) -> Result<Arc<dyn Query>> {
        Ok(self)
    }

    fn create_weight(
        &self,
        _reader: &dyn IndexReader,
        _mode: ScoreMode,
    ) -> Result<Arc<dyn Weight>> {
        Ok(Arc::new(MatchNoneWeight))
    }
}

struct MatchNoneWeight;

impl Weight for MatchNoneWeight {
    fn bulk_scorer(&self, _leaf: &dyn LeafReader) -> Result<Option<Box<dyn BulkScorer>>> {
        Ok(None)
    }
}

/// Matches the postings of a single term. Built by [`MemIndex::term_query`].
#[derive(Debug, Clone)]
pub struct TermQuery {
    term: String,
    per_leaf: Vec<Vec<u32>>,
}

impl TermQuery {
    pub fn term(&self) -> &str {
        &self.term
    }
}

impl Query for TermQuery {
    fn rewrite(self: Arc<Self>, _reader: &dyn IndexReader) -> Result<Arc<dyn Query>> {
        Ok(self)
    }

    fn create_weight(
        &self,
        _reader: &dyn IndexReader,
        _mode: ScoreMode,
    ) -> Result<Arc<dyn Weight>> {
        Ok(Arc::new(TermWeight {
            per_leaf: self.per_leaf.clone(),
        }))
    }
}

struct TermWeight {
    per_leaf: Vec<Vec<u32>>,
}

impl Weight for TermWeight {
    fn bulk_scorer(&self, leaf: &dyn LeafReader) -> Result<Option<Box<dyn BulkScorer>>> {
        match self.per_leaf.get(leaf.ord()) {
            Some(postings) if !postings.is_empty() => Ok(Some(Box::new(PostingsScorer {
                postings: postings.clone(),
                cursor: 0,
            }))),
            _ => Ok(None),
        }
    }
}

struct PostingsScorer {
    postings: Vec<u32>,
    cursor: usize,
}

impl BulkScorer for PostingsScorer {
    fn score(
        &mut self,
        collector: &mut dyn FnMut(u32),
        live_docs: Option<&LiveDocs>,
        min: u32,
        max: u32,
    ) -> Result<u32> {
        while self.cursor < self.postings.len() {
            let doc = self.postings[self.cursor];
            if doc < min {
                self.cursor += 1;
                continue;
            }
            if doc >= max {
                break;
            }
            if is_live(live_docs, doc) {
                collector(doc);
            }
            self.cursor += 1;
        }
        Ok(max)
    }
}

fn is_live(live_docs: Option<&LiveDocs>, doc: u32) -> bool {
    live_docs.map_or(true, |live| {
        live.get(doc as usize).map_or(true, |bit| *bit)
    })
}
