//! Source operator: incrementally scans an index reader into doc-id pages.
//!
//! Each emitted page carries three blocks: the matched doc ids, a constant
//! block with the leaf ordinal, and a constant block with the shard id.
//! Work slicing splits a shard's documents across parallel pipelines
//! before the weight is realized.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::trace;

use millrace_core::block::Block;
use millrace_core::config::EngineConfig;
use millrace_core::error::{Error, Result};
use millrace_core::id::ShardId;
use millrace_core::page::Page;
use millrace_index::{BulkScorer, IndexReader, LeafReader, Query, ScoreMode, Weight};

use crate::traits::Operator;

/// Upstream searcher heuristic bounds for whole-segment slices.
const MAX_DOCS_PER_SLICE: u32 = 250_000;
const MAX_SEGMENTS_PER_SLICE: usize = 5;

/// A contiguous half-open doc range inside one leaf; the unit of scan work
/// assigned to a pipeline.
#[derive(Clone)]
pub struct PartialLeaf {
    leaf: Arc<dyn LeafReader>,
    min_doc: u32,
    max_doc: u32,
}

impl PartialLeaf {
    fn whole(leaf: Arc<dyn LeafReader>) -> Self {
        let max_doc = leaf.max_doc();
        Self {
            leaf,
            min_doc: 0,
            max_doc,
        }
    }

    pub fn doc_count(&self) -> u32 {
        self.max_doc - self.min_doc
    }
}

/// Construction options for [`IndexSourceOperator`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub shard_id: ShardId,
    /// Doc ids per page; defaults to the engine page byte budget read as
    /// i32s.
    pub max_page_size: usize,
}

impl SourceConfig {
    pub fn new(shard_id: ShardId) -> Self {
        Self {
            shard_id,
            max_page_size: EngineConfig::default().max_page_size(),
        }
    }

    pub fn with_max_page_size(mut self, max_page_size: usize) -> Self {
        self.max_page_size = max_page_size;
        self
    }
}

struct LeafScan {
    leaf: PartialLeaf,
    scorer: Box<dyn BulkScorer>,
    pos: u32,
}

pub struct IndexSourceOperator {
    reader: Option<Arc<dyn IndexReader>>,
    query: Option<Arc<dyn Query>>,
    shard_id: ShardId,
    leaves: Vec<PartialLeaf>,
    max_page_size: usize,
    min_page_size: usize,
    weight: Option<Arc<dyn Weight>>,
    current_leaf: usize,
    current: Option<LeafScan>,
    page_buf: Vec<i32>,
    page_len: usize,
}

impl IndexSourceOperator {
    pub fn new(
        reader: Arc<dyn IndexReader>,
        query: Arc<dyn Query>,
        config: SourceConfig,
    ) -> Self {
        let leaves = reader.leaves().into_iter().map(PartialLeaf::whole).collect();
        let max_page_size = config.max_page_size;
        Self {
            reader: Some(reader),
            query: Some(query),
            shard_id: config.shard_id,
            leaves,
            max_page_size,
            min_page_size: max_page_size / 2,
            weight: None,
            current_leaf: 0,
            current: None,
            page_buf: vec![0; max_page_size],
            page_len: 0,
        }
    }

    fn from_weight(
        weight: Arc<dyn Weight>,
        shard_id: ShardId,
        leaves: Vec<PartialLeaf>,
        max_page_size: usize,
    ) -> Self {
        Self {
            reader: None,
            query: None,
            shard_id,
            leaves,
            max_page_size,
            min_page_size: max_page_size / 2,
            weight: Some(weight),
            current_leaf: 0,
            current: None,
            page_buf: vec![0; max_page_size],
            page_len: 0,
        }
    }

    /// Split this operator into `min(num_slices, total_docs)` operators
    /// over disjoint contiguous doc ranges sharing one weight.
    ///
    /// Slicing is one-shot: it fails once the weight is realized, whether
    /// by an earlier slice call or by pulling output.
    pub fn doc_slice(&mut self, num_slices: usize) -> Result<Vec<IndexSourceOperator>> {
        let reader = self.sliceable_reader()?;
        let weight = self.realize_weight()?;
        let slices = doc_slices(reader.as_ref(), num_slices)?;
        Ok(self.slice_operators(weight, slices))
    }

    /// Split this operator along whole-segment boundaries using the
    /// upstream searcher heuristic. One-shot, like [`Self::doc_slice`].
    pub fn segment_slice(&mut self) -> Result<Vec<IndexSourceOperator>> {
        let reader = self.sliceable_reader()?;
        let weight = self.realize_weight()?;
        let slices = segment_slices(reader.as_ref());
        Ok(self.slice_operators(weight, slices))
    }

    fn sliceable_reader(&self) -> Result<Arc<dyn IndexReader>> {
        if self.weight.is_some() {
            return Err(Error::ContractViolation(
                "source can only be sliced once, before its weight is realized".into(),
            ));
        }
        self.reader.clone().ok_or_else(|| {
            Error::ContractViolation("a sliced source cannot be sliced again".into())
        })
    }

    fn slice_operators(
        &self,
        weight: Arc<dyn Weight>,
        slices: Vec<Vec<PartialLeaf>>,
    ) -> Vec<IndexSourceOperator> {
        slices
            .into_iter()
            .map(|leaves| {
                Self::from_weight(weight.clone(), self.shard_id, leaves, self.max_page_size)
            })
            .collect()
    }

    /// Lazily rewrite the query under constant-score matching and realize
    /// the weight.
    fn realize_weight(&mut self) -> Result<Arc<dyn Weight>> {
        if let Some(weight) = &self.weight {
            return Ok(weight.clone());
        }
        let reader = self.reader.clone().ok_or_else(|| {
            Error::ContractViolation("a source built from a slice must carry a weight".into())
        })?;
        let query = self.query.clone().ok_or_else(|| {
            Error::ContractViolation("a source built from a slice must carry a weight".into())
        })?;
        let rewritten = query.rewrite(reader.as_ref())?;
        let weight = rewritten.create_weight(reader.as_ref(), ScoreMode::CompleteNoScores)?;
        self.weight = Some(weight.clone());
        Ok(weight)
    }
}

impl Operator for IndexSourceOperator {
    fn name(&self) -> &'static str {
        "index_source"
    }

    fn needs_input(&self) -> bool {
        false
    }

    fn add_input(&mut self, _page: Page) -> Result<()> {
        Err(Error::ContractViolation(
            "source operators do not accept input".into(),
        ))
    }

    fn finish(&mut self) -> Result<()> {
        Err(Error::ContractViolation(
            "source operators finish by exhausting their scan".into(),
        ))
    }

    fn is_finished(&self) -> bool {
        self.current_leaf >= self.leaves.len()
    }

    fn get_output(&mut self) -> Result<Option<Page>> {
        if self.is_finished() {
            return Ok(None);
        }
        let weight = self.realize_weight()?;

        // Advance to the next leaf with a scorer; a query that cannot match
        // a leaf reports no scorer and the leaf is skipped outright.
        if self.current.is_none() {
            loop {
                let leaf = self.leaves[self.current_leaf].clone();
                match weight.bulk_scorer(leaf.leaf.as_ref())? {
                    Some(scorer) => {
                        trace!(leaf = leaf.leaf.ord(), "scanning leaf");
                        self.current = Some(LeafScan {
                            pos: leaf.min_doc,
                            leaf,
                            scorer,
                        });
                        break;
                    }
                    None => {
                        self.current_leaf += 1;
                        if self.is_finished() {
                            return Ok(None);
                        }
                    }
                }
            }
        }

        let Some(scan) = self.current.as_mut() else {
            return Ok(None);
        };

        // Collect into the page buffer, bounded by the leaf's doc range and
        // the remaining page capacity.
        let page_buf = &mut self.page_buf;
        let page_len = &mut self.page_len;
        let limit = scan
            .leaf
            .max_doc
            .min(scan.pos + (self.max_page_size - *page_len) as u32);
        scan.pos = scan.scorer.score(
            &mut |doc| {
                page_buf[*page_len] = doc as i32;
                *page_len += 1;
            },
            scan.leaf.leaf.live_docs(),
            scan.pos,
            limit,
        )?;

        let leaf_done = scan.pos >= scan.leaf.max_doc;
        let leaf_ord = scan.leaf.leaf.ord();

        let mut page = None;
        if (self.page_len >= self.min_page_size || leaf_done) && self.page_len > 0 {
            let count = self.page_len;
            page = Some(Page::new(
                count,
                vec![
                    Block::Int(self.page_buf[..count].to_vec()),
                    Block::constant_int(leaf_ord as i32, count),
                    Block::constant_int(self.shard_id.get() as i32, count),
                ],
            )?);
            self.page_len = 0;
        }

        if leaf_done {
            self.current_leaf += 1;
            self.current = None;
        }

        Ok(page)
    }

    fn close(&mut self) {
        self.current = None;
    }
}

/// Partition a reader's documents into contiguous ranges of roughly equal
/// size. The first range absorbs `total_docs % n` extra documents; every
/// other range receives exactly `total_docs / n`. A range may cross leaf
/// boundaries. Yields `min(num_slices, total_docs)` slices whose doc
/// counts sum to `total_docs`.
pub fn doc_slices(
    reader: &dyn IndexReader,
    num_slices: usize,
) -> Result<Vec<Vec<PartialLeaf>>> {
    if num_slices == 0 {
        return Err(Error::ContractViolation(
            "doc slicing needs at least one slice".into(),
        ));
    }
    let total_docs = reader.max_doc() as usize;
    if total_docs == 0 {
        return Ok(Vec::new());
    }
    let num_slices = num_slices.min(total_docs);
    let normal = total_docs / num_slices;
    let extra = total_docs % num_slices;

    let mut slices: Vec<Vec<PartialLeaf>> = Vec::with_capacity(num_slices);
    let mut current: Vec<PartialLeaf> = Vec::new();
    let mut allocated = 0usize;
    let mut max_docs_per_slice = normal + extra;

    for leaf in reader.leaves() {
        let leaf_docs = leaf.max_doc();
        let mut min_doc = 0u32;
        while min_doc < leaf_docs {
            let take = ((max_docs_per_slice - allocated) as u32).min(leaf_docs - min_doc);
            if take == 0 {
                break;
            }
            current.push(PartialLeaf {
                leaf: Arc::clone(&leaf),
                min_doc,
                max_doc: min_doc + take,
            });
            min_doc += take;
            allocated += take as usize;
            if allocated == max_docs_per_slice {
                slices.push(std::mem::take(&mut current));
                // Only the first slice carries the remainder.
                max_docs_per_slice = normal;
                allocated = 0;
            }
        }
    }
    if !current.is_empty() {
        slices.push(current);
    }

    // Partition invariants: expected slice count, every doc exactly once.
    if slices.len() != num_slices {
        return Err(Error::ContractViolation(format!(
            "expected {num_slices} slices, built {}",
            slices.len()
        )));
    }
    let counted: usize = slices
        .iter()
        .flat_map(|slice| slice.iter())
        .map(|partial| partial.doc_count() as usize)
        .sum();
    if counted != total_docs {
        return Err(Error::ContractViolation(format!(
            "slices cover {counted} docs, reader has {total_docs}"
        )));
    }
    Ok(slices)
}

/// Group whole leaves into slices with the upstream searcher heuristic:
/// sort segments by doc count descending, then pack while staying within
/// the per-slice doc and segment bounds.
pub fn segment_slices(reader: &dyn IndexReader) -> Vec<Vec<PartialLeaf>> {
    let mut leaves = reader.leaves();
    leaves.sort_by(|a, b| b.max_doc().cmp(&a.max_doc()));

    let mut slices: Vec<Vec<PartialLeaf>> = Vec::new();
    let mut current: Vec<PartialLeaf> = Vec::new();
    let mut current_docs = 0u64;
    for leaf in leaves {
        let docs = u64::from(leaf.max_doc());
        if !current.is_empty()
            && (current_docs + docs > u64::from(MAX_DOCS_PER_SLICE)
                || current.len() == MAX_SEGMENTS_PER_SLICE)
        {
            slices.push(std::mem::take(&mut current));
            current_docs = 0;
        }
        current.push(PartialLeaf::whole(leaf));
        current_docs += docs;
    }
    if !current.is_empty() {
        slices.push(current);
    }
    slices
}
