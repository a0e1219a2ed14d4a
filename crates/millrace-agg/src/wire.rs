//! Intermediate-state wire codec for cross-node transfer.
//!
//! Layout: `u8` state-kind tag, `u32` position count, `u32` item size,
//! then `position_count * item_size` bytes of concatenated per-position
//! serializations. All integers little-endian. This is a cross-language
//! wire contract; it must not drift between minor versions.

use millrace_core::block::{AggStateBlock, StateKind};
use millrace_core::error::{Error, Result};

const HEADER_LEN: usize = 1 + 4 + 4;

pub fn encode(block: &AggStateBlock) -> Vec<u8> {
    let payload_len = block.position_count() * block.item_size();
    let mut out = Vec::with_capacity(HEADER_LEN + payload_len);
    out.push(block.kind().tag());
    out.extend_from_slice(&(block.position_count() as u32).to_le_bytes());
    out.extend_from_slice(&(block.item_size() as u32).to_le_bytes());
    out.extend_from_slice(&block.bytes()[..payload_len]);
    out
}

pub fn decode(buf: &[u8]) -> Result<AggStateBlock> {
    if buf.len() < HEADER_LEN {
        return Err(Error::ModeMismatch(
            "truncated intermediate-state header".into(),
        ));
    }
    let kind = StateKind::from_tag(buf[0])
        .ok_or_else(|| Error::ModeMismatch(format!("unknown state tag {}", buf[0])))?;

    let mut raw = [0u8; 4];
    raw.copy_from_slice(&buf[1..5]);
    let position_count = u32::from_le_bytes(raw) as usize;
    raw.copy_from_slice(&buf[5..9]);
    let item_size = u32::from_le_bytes(raw) as usize;

    let payload = &buf[HEADER_LEN..];
    if payload.len() != position_count * item_size {
        return Err(Error::ModeMismatch(format!(
            "intermediate-state payload holds {} bytes, header promises {}",
            payload.len(),
            position_count * item_size
        )));
    }
    AggStateBlock::new(payload.to_vec(), position_count, item_size, kind)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::AggStateBlockBuilder;
    use crate::state::{AvgState, DoubleState};

    #[test]
    fn round_trips_every_position() {
        let mut builder = AggStateBlockBuilder::<AvgState>::new();
        for i in 0..7i64 {
            builder
                .add(&AvgState {
                    sum: i as f64 * 1.5,
                    count: i,
                })
                .unwrap();
        }
        let block = builder.build().unwrap();
        let states = block.agg_state().unwrap();

        let encoded = encode(states);
        let decoded = decode(&encoded).unwrap();
        assert_eq!(&decoded, states);
    }

    #[test]
    fn rejects_truncated_payloads() {
        let mut builder = AggStateBlockBuilder::<DoubleState>::new();
        builder.add(&DoubleState::new(3.25)).unwrap();
        let block = builder.build().unwrap();
        let mut encoded = encode(block.agg_state().unwrap());
        encoded.pop();
        assert!(decode(&encoded).is_err());
    }
}
