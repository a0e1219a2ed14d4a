//! End-to-end pipelines through the driver.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use millrace_agg::{AggKind, AggregatorMode};
use millrace_core::error::{Error, Result};
use millrace_core::id::{PipelineId, ShardId};
use millrace_core::page::Page;
use millrace_exec::{CancellationToken, Driver};
use millrace_index::{IndexReader, MatchAllQuery, MemIndex};
use millrace_operators::{
    AggregateSpec, AggregationConfig, AggregationOperator, IndexSourceOperator, Operator,
    ProjectConfig, ProjectOperator, SourceConfig, TopNConfig, TopNOperator,
};

fn match_all_source(sizes: &[u32], max_page_size: usize) -> IndexSourceOperator {
    IndexSourceOperator::new(
        Arc::new(MemIndex::with_sizes(sizes)),
        Arc::new(MatchAllQuery),
        SourceConfig::new(ShardId::new(1)).with_max_page_size(max_page_size),
    )
}

#[test]
fn source_feeds_top_n_through_project() {
    let source = match_all_source(&[500, 500], 128);
    let project = ProjectOperator::new(ProjectConfig { channels: vec![0] });
    let top = TopNOperator::new(TopNConfig {
        sort_channel: 0,
        ascending: true,
        top_count: 3,
    });

    let driver = Driver::new(
        PipelineId::new(1),
        vec![Box::new(source), Box::new(project), Box::new(top)],
    )
    .unwrap();
    let pages = driver.run().unwrap();

    // Doc id 0 exists in both leaves, so the three smallest are 0, 0, 1.
    assert_eq!(pages.len(), 3);
    let mut keys: Vec<i64> = pages
        .iter()
        .map(|page| page.block(0).unwrap().get_long(0).unwrap())
        .collect();
    keys.sort_unstable();
    assert_eq!(keys, vec![0, 0, 1]);
}

#[test]
fn source_counts_through_aggregation() {
    let source = match_all_source(&[400, 350, 250], 256);
    let agg = AggregationOperator::new(AggregationConfig {
        aggregates: vec![AggregateSpec {
            kind: AggKind::Count,
            mode: AggregatorMode::Single,
            channel: 0,
        }],
    });
    let pages = Driver::new(PipelineId::new(2), vec![Box::new(source), Box::new(agg)])
        .unwrap()
        .run()
        .unwrap();
    assert_eq!(pages.len(), 1);
    assert_eq!(pages[0].block(0).unwrap().get_long(0).unwrap(), 1000);
}

/// Partial aggregation over disjoint slices, recombined in final mode,
/// must equal the single-pipeline answer.
#[test]
fn sliced_pipelines_recombine_to_the_single_pipeline_result() {
    let index: Arc<dyn IndexReader> = Arc::new(MemIndex::with_sizes(&[400, 350, 250]));

    let single = {
        let source = IndexSourceOperator::new(
            Arc::clone(&index),
            Arc::new(MatchAllQuery),
            SourceConfig::new(ShardId::new(4)).with_max_page_size(128),
        );
        let agg = AggregationOperator::new(AggregationConfig {
            aggregates: vec![AggregateSpec {
                kind: AggKind::Max,
                mode: AggregatorMode::Single,
                channel: 0,
            }],
        });
        let pages = Driver::new(PipelineId::new(10), vec![Box::new(source), Box::new(agg)])
            .unwrap()
            .run()
            .unwrap();
        pages[0].block(0).unwrap().get_double(0).unwrap()
    };

    let mut source = IndexSourceOperator::new(
        Arc::clone(&index),
        Arc::new(MatchAllQuery),
        SourceConfig::new(ShardId::new(4)).with_max_page_size(128),
    );
    let mut partial_pages: Vec<Page> = Vec::new();
    for (i, slice) in source.doc_slice(3).unwrap().into_iter().enumerate() {
        let agg = AggregationOperator::new(AggregationConfig {
            aggregates: vec![AggregateSpec {
                kind: AggKind::Max,
                mode: AggregatorMode::Partial,
                channel: 0,
            }],
        });
        let pages = Driver::new(
            PipelineId::new(20 + i as u64),
            vec![Box::new(slice), Box::new(agg)],
        )
        .unwrap()
        .run()
        .unwrap();
        partial_pages.extend(pages);
    }
    assert_eq!(partial_pages.len(), 3);

    // Downstream combine, as if the partial pages arrived from other nodes.
    let mut combiner = AggregationOperator::new(AggregationConfig {
        aggregates: vec![AggregateSpec {
            kind: AggKind::Max,
            mode: AggregatorMode::Final,
            channel: 0,
        }],
    });
    for page in partial_pages {
        combiner.add_input(page).unwrap();
    }
    combiner.finish().unwrap();
    let combined = combiner.get_output().unwrap().unwrap();

    assert_eq!(combined.block(0).unwrap().get_double(0).unwrap(), single);
    assert_eq!(single, 399.0);
}

struct CloseProbe<O> {
    inner: O,
    closes: Arc<AtomicUsize>,
}

impl<O: Operator> Operator for CloseProbe<O> {
    fn name(&self) -> &'static str {
        self.inner.name()
    }
    fn needs_input(&self) -> bool {
        self.inner.needs_input()
    }
    fn add_input(&mut self, page: Page) -> Result<()> {
        self.inner.add_input(page)
    }
    fn finish(&mut self) -> Result<()> {
        self.inner.finish()
    }
    fn is_finished(&self) -> bool {
        self.inner.is_finished()
    }
    fn get_output(&mut self) -> Result<Option<Page>> {
        self.inner.get_output()
    }
    fn close(&mut self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.inner.close();
    }
}

#[test]
fn cancellation_closes_every_operator_exactly_once() {
    let source_closes = Arc::new(AtomicUsize::new(0));
    let top_closes = Arc::new(AtomicUsize::new(0));

    let source = CloseProbe {
        inner: match_all_source(&[1000], 64),
        closes: Arc::clone(&source_closes),
    };
    let top = CloseProbe {
        inner: TopNOperator::new(TopNConfig {
            sort_channel: 0,
            ascending: true,
            top_count: 5,
        }),
        closes: Arc::clone(&top_closes),
    };

    let cancel = CancellationToken::new();
    cancel.cancel();
    let driver = Driver::new(PipelineId::new(3), vec![Box::new(source), Box::new(top)])
        .unwrap()
        .with_cancellation(cancel);

    assert!(matches!(driver.run(), Err(Error::Cancelled)));
    assert_eq!(source_closes.load(Ordering::SeqCst), 1);
    assert_eq!(top_closes.load(Ordering::SeqCst), 1);
}

#[test]
fn deadline_overrun_cancels_the_pipeline() {
    let source = match_all_source(&[1000], 64);
    let driver = Driver::new(PipelineId::new(5), vec![Box::new(source)])
        .unwrap()
        .with_deadline(Duration::ZERO);
    assert!(matches!(driver.run(), Err(Error::Cancelled)));
}

#[test]
fn page_order_is_preserved_end_to_end() {
    let source = match_all_source(&[300], 64);
    let project = ProjectOperator::new(ProjectConfig { channels: vec![0, 2] });
    let driver = Driver::new(
        PipelineId::new(6),
        vec![Box::new(source), Box::new(project)],
    )
    .unwrap();

    let pages = driver.run().unwrap();
    let mut expected = 0;
    for page in &pages {
        let docs = page.block(0).unwrap();
        for position in 0..page.position_count() {
            assert_eq!(docs.get_int(position).unwrap(), expected);
            expected += 1;
        }
        // Shard id survives projection onto channel 1.
        assert_eq!(page.block(1).unwrap().get_int(0).unwrap(), 1);
    }
    assert_eq!(expected, 300);
}
