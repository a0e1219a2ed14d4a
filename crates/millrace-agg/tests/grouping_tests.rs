//! Grouping aggregator behavior: dense slots, raw folds, and partial
//! state merging keyed by group id.

use millrace_agg::{AggKind, AggregatorMode, GroupingAggregator};
use millrace_core::block::Block;
use millrace_core::page::Page;

fn raw_page(group_ids: &[i64], values: &[f64]) -> Page {
    Page::new(
        group_ids.len(),
        vec![
            Block::Long(group_ids.to_vec()),
            Block::Double(values.to_vec()),
        ],
    )
    .unwrap()
}

fn process_raw(aggregator: &mut GroupingAggregator, group_ids: &[i64], values: &[f64]) {
    let page = raw_page(group_ids, values);
    let groups = page.block(0).unwrap().clone();
    aggregator.process_page(&groups, &page).unwrap();
}

#[test]
fn grouping_max_finalizes_per_group() {
    let mut max = GroupingAggregator::new(AggKind::Max, AggregatorMode::Single, 1);
    process_raw(&mut max, &[0, 1, 0, 1, 2], &[10.0, 20.0, 30.0, 5.0, 7.0]);
    assert_eq!(max.group_count(), 3);
    assert_eq!(
        max.evaluate().unwrap(),
        Block::Double(vec![30.0, 20.0, 7.0])
    );
}

#[test]
fn grouping_count_sum_avg_finalize() {
    let ids = [0, 0, 1, 2, 2, 2];
    let values = [1.0, 3.0, 10.0, 4.0, 4.0, 1.0];

    let mut count = GroupingAggregator::new(AggKind::Count, AggregatorMode::Single, 1);
    let mut sum = GroupingAggregator::new(AggKind::Sum, AggregatorMode::Single, 1);
    let mut avg = GroupingAggregator::new(AggKind::Avg, AggregatorMode::Single, 1);
    for aggregator in [&mut count, &mut sum, &mut avg] {
        process_raw(aggregator, &ids, &values);
    }

    assert_eq!(count.evaluate().unwrap(), Block::Long(vec![2, 1, 3]));
    assert_eq!(
        sum.evaluate().unwrap(),
        Block::Double(vec![4.0, 10.0, 9.0])
    );
    assert_eq!(
        avg.evaluate().unwrap(),
        Block::Double(vec![2.0, 10.0, 3.0])
    );
}

#[test]
fn partial_states_merge_by_group_id() {
    // Two pipelines pre-aggregate disjoint page streams, then a final
    // combiner merges their serialized states.
    let mut node_a = GroupingAggregator::new(AggKind::Max, AggregatorMode::Partial, 1);
    process_raw(&mut node_a, &[0, 1], &[1.0, 2.0]);
    let mut node_b = GroupingAggregator::new(AggKind::Max, AggregatorMode::Partial, 1);
    process_raw(&mut node_b, &[1, 2], &[5.0, 3.0]);

    let mut combiner = GroupingAggregator::new(AggKind::Max, AggregatorMode::Final, 1);
    for node in [&node_a, &node_b] {
        let states = node.evaluate().unwrap();
        let groups: Vec<i64> = (0..node.group_count() as i64).collect();
        let page = Page::new(
            groups.len(),
            vec![Block::Long(groups.clone()), states],
        )
        .unwrap();
        let group_block = page.block(0).unwrap().clone();
        combiner.process_page(&group_block, &page).unwrap();
    }

    assert_eq!(
        combiner.evaluate().unwrap(),
        Block::Double(vec![1.0, 5.0, 3.0])
    );
}

#[test]
fn slots_grow_on_demand_with_identity_fill() {
    let mut max = GroupingAggregator::new(AggKind::Max, AggregatorMode::Single, 1);
    process_raw(&mut max, &[5], &[1.5]);
    assert_eq!(max.group_count(), 6);
    let finalized = max.evaluate().unwrap();
    assert_eq!(finalized.get_double(5).unwrap(), 1.5);
    // Untouched slots hold the combine identity.
    assert_eq!(finalized.get_double(0).unwrap(), f64::NEG_INFINITY);
}

#[test]
fn intermediate_input_requires_a_state_block() {
    let mut combiner = GroupingAggregator::new(AggKind::Sum, AggregatorMode::Final, 1);
    let page = raw_page(&[0], &[1.0]);
    let groups = page.block(0).unwrap().clone();
    let err = combiner.process_page(&groups, &page).unwrap_err();
    assert!(matches!(
        err,
        millrace_core::error::Error::ModeMismatch(_)
    ));
}
