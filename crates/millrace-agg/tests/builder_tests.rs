//! Aggregator-state block builder invariants.

use millrace_agg::state::{AggregatorState, DoubleState, StateSerializer};
use millrace_agg::AggStateBlockBuilder;
use millrace_core::block::StateKind;
use millrace_core::error::Error;

#[test]
fn records_pack_at_the_serializer_width() {
    let mut builder = AggStateBlockBuilder::<DoubleState>::new();
    for i in 0..3 {
        builder.add(&DoubleState::new(f64::from(i))).unwrap();
    }
    let block = builder.build().unwrap();
    let states = block.agg_state().unwrap();
    assert_eq!(states.position_count(), 3);
    assert_eq!(states.item_size(), DoubleState::serializer().size());
    assert_eq!(states.bytes().len(), 3 * states.item_size());
}

#[test]
fn build_snapshots_the_buffer() {
    let mut builder = AggStateBlockBuilder::<DoubleState>::new();
    builder.add(&DoubleState::new(1.0)).unwrap();
    let first = builder.build().unwrap();

    builder.add(&DoubleState::new(2.0)).unwrap();
    let second = builder.build().unwrap();

    // The earlier block must not observe the later growth.
    assert_eq!(first.position_count(), 1);
    assert_eq!(second.position_count(), 2);
}

// A state whose width drifts between records, to drive the fail-fast path.
#[derive(Debug, Default, PartialEq)]
struct WobblyState {
    short: bool,
}

#[derive(Default)]
struct WobblySerializer;

impl StateSerializer for WobblySerializer {
    type State = WobblyState;

    fn size(&self) -> usize {
        4
    }

    fn serialize(&self, state: &WobblyState, buf: &mut [u8], offset: usize) -> usize {
        let width = if state.short { 2 } else { 4 };
        for byte in &mut buf[offset..offset + width] {
            *byte = 0xAB;
        }
        width
    }

    fn deserialize(&self, state: &mut WobblyState, _buf: &[u8], _offset: usize) {
        state.short = false;
    }
}

impl AggregatorState for WobblyState {
    type Serializer = WobblySerializer;

    fn kind() -> StateKind {
        StateKind::Double
    }
}

#[test]
fn variable_size_records_fail_fast() {
    let mut builder = AggStateBlockBuilder::<WobblyState>::new();
    builder.add(&WobblyState { short: false }).unwrap();
    let err = builder.add(&WobblyState { short: true }).unwrap_err();
    assert!(matches!(
        err,
        Error::VariableSizeState {
            expected: 4,
            got: 2
        }
    ));
}
