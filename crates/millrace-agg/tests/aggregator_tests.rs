//! Scalar aggregator behavior: raw folds, partial/final composition, and
//! the partition invariant.

use millrace_agg::state::{read_state, DoubleState};
use millrace_agg::{AggKind, Aggregator, AggregatorMode};
use millrace_core::block::Block;
use millrace_core::page::Page;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn double_page(values: &[f64]) -> Page {
    Page::new(values.len(), vec![Block::Double(values.to_vec())]).unwrap()
}

fn partial_output(aggregator: &Aggregator) -> Page {
    Page::new(1, vec![aggregator.evaluate().unwrap()]).unwrap()
}

#[test]
fn max_partial_then_final_combination() {
    let mut node_a = Aggregator::new(AggKind::Max, AggregatorMode::Partial, 0);
    node_a.process_page(&double_page(&[1.0, 5.0, 2.0])).unwrap();
    let mut node_b = Aggregator::new(AggKind::Max, AggregatorMode::Partial, 0);
    node_b.process_page(&double_page(&[3.0, 4.0])).unwrap();

    // Each node's partial state carries its local max.
    let state_a = read_double_state(&node_a.evaluate().unwrap());
    let state_b = read_double_state(&node_b.evaluate().unwrap());
    assert_eq!(state_a, 5.0);
    assert_eq!(state_b, 4.0);

    let mut combiner = Aggregator::new(AggKind::Max, AggregatorMode::Final, 0);
    combiner.process_page(&partial_output(&node_a)).unwrap();
    combiner.process_page(&partial_output(&node_b)).unwrap();
    let finalized = combiner.evaluate().unwrap();
    assert_eq!(finalized.get_double(0).unwrap(), 5.0);
}

#[test]
fn max_folds_negative_only_input() {
    let mut aggregator = Aggregator::new(AggKind::Max, AggregatorMode::Single, 0);
    aggregator
        .process_page(&double_page(&[-8.5, -3.0, -11.0]))
        .unwrap();
    assert_eq!(aggregator.evaluate().unwrap().get_double(0).unwrap(), -3.0);
}

#[test]
fn folds_take_typed_paths_for_long_and_int_blocks() {
    let mut aggregator = Aggregator::new(AggKind::Max, AggregatorMode::Single, 0);
    let longs = Page::new(3, vec![Block::Long(vec![1, 9, 4])]).unwrap();
    aggregator.process_page(&longs).unwrap();
    let ints = Page::new(2, vec![Block::Int(vec![12, 3])]).unwrap();
    aggregator.process_page(&ints).unwrap();
    assert_eq!(aggregator.evaluate().unwrap().get_double(0).unwrap(), 12.0);
}

#[test]
fn count_and_avg_finalize() {
    let mut count = Aggregator::new(AggKind::Count, AggregatorMode::Single, 0);
    let mut avg = Aggregator::new(AggKind::Avg, AggregatorMode::Single, 0);
    for page in [double_page(&[2.0, 4.0]), double_page(&[9.0])] {
        count.process_page(&page).unwrap();
        avg.process_page(&page).unwrap();
    }
    assert_eq!(count.evaluate().unwrap().get_long(0).unwrap(), 3);
    assert_eq!(avg.evaluate().unwrap().get_double(0).unwrap(), 5.0);
}

#[test]
fn raw_input_on_partial_input_mode_is_rejected() {
    let mut combiner = Aggregator::new(AggKind::Sum, AggregatorMode::Final, 0);
    let err = combiner.process_page(&double_page(&[1.0])).unwrap_err();
    assert!(matches!(
        err,
        millrace_core::error::Error::ModeMismatch(_)
    ));
}

/// For any split of the input, partial aggregation on the parts followed
/// by a final combine must equal single-stage aggregation of the whole.
#[test]
fn any_partition_recombines_exactly() {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    let kinds = [
        AggKind::Count,
        AggKind::Sum,
        AggKind::Min,
        AggKind::Max,
        AggKind::Avg,
    ];
    for kind in kinds {
        for _ in 0..25 {
            // Dyadic values keep every fold exact, so equality is strict.
            let len = rng.gen_range(1..64);
            let values: Vec<f64> = (0..len)
                .map(|_| f64::from(rng.gen_range(-1000..1000)) / 8.0)
                .collect();
            let split = rng.gen_range(0..=len);

            let mut whole = Aggregator::new(kind, AggregatorMode::Single, 0);
            whole.process_page(&double_page(&values)).unwrap();

            let mut left = Aggregator::new(kind, AggregatorMode::Partial, 0);
            left.process_page(&double_page(&values[..split])).unwrap();
            let mut right = Aggregator::new(kind, AggregatorMode::Partial, 0);
            right.process_page(&double_page(&values[split..])).unwrap();

            let mut combined = Aggregator::new(kind, AggregatorMode::Final, 0);
            combined.process_page(&partial_output(&right)).unwrap();
            combined.process_page(&partial_output(&left)).unwrap();

            assert_eq!(
                whole.evaluate().unwrap(),
                combined.evaluate().unwrap(),
                "{kind:?} over {values:?} split at {split}"
            );
        }
    }
}

fn read_double_state(block: &Block) -> f64 {
    let states = block.agg_state().expect("partial output is a state block");
    assert_eq!(states.position_count(), 1);
    let mut state = DoubleState::default();
    read_state(states, 0, &mut state).unwrap();
    state.value
}
