//! Typed columnar blocks.
//!
//! A block is an immutable vector of `position_count` values of a single
//! logical type. Builders produce new blocks; a block's values never change
//! after construction, so blocks may be shared between operators within a
//! pipeline without locks.

use crate::error::{Error, Result};

/// Boxed scalar returned by [`Block::get_object`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Int(i32),
    Long(i64),
    Double(f64),
}

/// Tag naming the aggregator-state kind held by an [`AggStateBlock`].
///
/// The numeric tag is part of the intermediate wire format and must stay
/// stable across processes of the same major version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateKind {
    Double,
    Long,
    Avg,
}

impl StateKind {
    pub fn tag(self) -> u8 {
        match self {
            StateKind::Double => 0,
            StateKind::Long => 1,
            StateKind::Avg => 2,
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(StateKind::Double),
            1 => Some(StateKind::Long),
            2 => Some(StateKind::Avg),
            _ => None,
        }
    }
}

/// Opaque byte container holding `position_count` serialized aggregator
/// states of `item_size` bytes each. Interpreting a position requires a
/// serializer matching [`AggStateBlock::kind`].
#[derive(Debug, Clone, PartialEq)]
pub struct AggStateBlock {
    bytes: Vec<u8>,
    position_count: usize,
    item_size: usize,
    kind: StateKind,
}

impl AggStateBlock {
    pub fn new(
        bytes: Vec<u8>,
        position_count: usize,
        item_size: usize,
        kind: StateKind,
    ) -> Result<Self> {
        if bytes.len() < position_count * item_size {
            return Err(Error::ContractViolation(format!(
                "state buffer holds {} bytes, need {} for {position_count} items of {item_size}",
                bytes.len(),
                position_count * item_size,
            )));
        }
        Ok(Self {
            bytes,
            position_count,
            item_size,
            kind,
        })
    }

    pub fn position_count(&self) -> usize {
        self.position_count
    }

    pub fn item_size(&self) -> usize {
        self.item_size
    }

    pub fn kind(&self) -> StateKind {
        self.kind
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// The serialized record at `position`, `item_size` bytes wide.
    pub fn item_bytes(&self, position: usize) -> Result<&[u8]> {
        if position >= self.position_count {
            return Err(out_of_range(position, self.position_count));
        }
        let start = position * self.item_size;
        Ok(&self.bytes[start..start + self.item_size])
    }
}

/// Tagged columnar vector. Accessors pattern-match on the tag; a
/// tag/accessor mismatch is a [`Error::ContractViolation`].
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Int(Vec<i32>),
    Long(Vec<i64>),
    Double(Vec<f64>),
    /// A single value broadcast over `positions` positions.
    Constant { value: Value, positions: usize },
    AggState(AggStateBlock),
}

impl Block {
    pub fn constant_int(value: i32, positions: usize) -> Self {
        Block::Constant {
            value: Value::Int(value),
            positions,
        }
    }

    pub fn constant_long(value: i64, positions: usize) -> Self {
        Block::Constant {
            value: Value::Long(value),
            positions,
        }
    }

    pub fn constant_double(value: f64, positions: usize) -> Self {
        Block::Constant {
            value: Value::Double(value),
            positions,
        }
    }

    pub fn position_count(&self) -> usize {
        match self {
            Block::Int(values) => values.len(),
            Block::Long(values) => values.len(),
            Block::Double(values) => values.len(),
            Block::Constant { positions, .. } => *positions,
            Block::AggState(block) => block.position_count(),
        }
    }

    pub fn get_int(&self, position: usize) -> Result<i32> {
        self.check(position)?;
        match self {
            Block::Int(values) => Ok(values[position]),
            Block::Constant {
                value: Value::Int(v),
                ..
            } => Ok(*v),
            other => Err(type_mismatch("int", other)),
        }
    }

    /// Int blocks widen to long so doc-id columns can feed long-keyed
    /// operators directly.
    pub fn get_long(&self, position: usize) -> Result<i64> {
        self.check(position)?;
        match self {
            Block::Int(values) => Ok(i64::from(values[position])),
            Block::Long(values) => Ok(values[position]),
            Block::Constant {
                value: Value::Int(v),
                ..
            } => Ok(i64::from(*v)),
            Block::Constant {
                value: Value::Long(v),
                ..
            } => Ok(*v),
            other => Err(type_mismatch("long", other)),
        }
    }

    pub fn get_double(&self, position: usize) -> Result<f64> {
        self.check(position)?;
        match self {
            Block::Int(values) => Ok(f64::from(values[position])),
            Block::Long(values) => Ok(values[position] as f64),
            Block::Double(values) => Ok(values[position]),
            Block::Constant { value, .. } => Ok(value_as_double(*value)),
            other => Err(type_mismatch("double", other)),
        }
    }

    /// Generic boxed access for the primitive and constant tags.
    pub fn get_object(&self, position: usize) -> Result<Value> {
        self.check(position)?;
        match self {
            Block::Int(values) => Ok(Value::Int(values[position])),
            Block::Long(values) => Ok(Value::Long(values[position])),
            Block::Double(values) => Ok(Value::Double(values[position])),
            Block::Constant { value, .. } => Ok(*value),
            other => Err(type_mismatch("object", other)),
        }
    }

    /// The state container, if this is an aggregator-state block.
    pub fn agg_state(&self) -> Option<&AggStateBlock> {
        match self {
            Block::AggState(block) => Some(block),
            _ => None,
        }
    }

    /// One-position slice of this block, used by row extraction.
    pub fn get_row(&self, position: usize) -> Result<Block> {
        self.check(position)?;
        Ok(match self {
            Block::Int(values) => Block::Int(vec![values[position]]),
            Block::Long(values) => Block::Long(vec![values[position]]),
            Block::Double(values) => Block::Double(vec![values[position]]),
            Block::Constant { value, .. } => Block::Constant {
                value: *value,
                positions: 1,
            },
            Block::AggState(block) => Block::AggState(AggStateBlock::new(
                block.item_bytes(position)?.to_vec(),
                1,
                block.item_size(),
                block.kind(),
            )?),
        })
    }

    fn check(&self, position: usize) -> Result<()> {
        let count = self.position_count();
        if position >= count {
            return Err(out_of_range(position, count));
        }
        Ok(())
    }

    fn tag_name(&self) -> &'static str {
        match self {
            Block::Int(_) => "int",
            Block::Long(_) => "long",
            Block::Double(_) => "double",
            Block::Constant { .. } => "constant",
            Block::AggState(_) => "agg_state",
        }
    }
}

fn value_as_double(value: Value) -> f64 {
    match value {
        Value::Int(v) => f64::from(v),
        Value::Long(v) => v as f64,
        Value::Double(v) => v,
    }
}

fn out_of_range(position: usize, count: usize) -> Error {
    Error::ContractViolation(format!(
        "position {position} out of range for block of {count} positions"
    ))
}

fn type_mismatch(wanted: &str, block: &Block) -> Error {
    Error::ContractViolation(format!(
        "cannot read {wanted} from a {} block",
        block.tag_name()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_accessors_widen_numerically() {
        let ints = Block::Int(vec![3, -7]);
        assert_eq!(ints.get_int(0).unwrap(), 3);
        assert_eq!(ints.get_long(1).unwrap(), -7);
        assert_eq!(ints.get_double(0).unwrap(), 3.0);

        let longs = Block::Long(vec![1 << 40]);
        assert!(longs.get_int(0).is_err());
        assert_eq!(longs.get_long(0).unwrap(), 1 << 40);
        assert_eq!(longs.get_double(0).unwrap(), (1u64 << 40) as f64);
    }

    #[test]
    fn constant_answers_every_position() {
        let block = Block::constant_int(42, 5);
        assert_eq!(block.position_count(), 5);
        for position in 0..5 {
            assert_eq!(block.get_int(position).unwrap(), 42);
            assert_eq!(block.get_long(position).unwrap(), 42);
        }
        assert!(block.get_int(5).is_err());
    }

    #[test]
    fn out_of_range_is_a_contract_violation() {
        let block = Block::Double(vec![1.0]);
        match block.get_double(1) {
            Err(Error::ContractViolation(_)) => {}
            other => panic!("expected contract violation, got {other:?}"),
        }
    }

    #[test]
    fn row_extraction_slices_state_blocks() {
        let states =
            AggStateBlock::new(vec![1, 2, 3, 4, 5, 6], 3, 2, StateKind::Double).unwrap();
        let block = Block::AggState(states);
        let row = block.get_row(1).unwrap();
        let sliced = row.agg_state().unwrap();
        assert_eq!(sliced.position_count(), 1);
        assert_eq!(sliced.item_bytes(0).unwrap(), &[3, 4]);
    }
}
