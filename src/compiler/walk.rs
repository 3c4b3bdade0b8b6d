//! Abstract interpretation of straight-line DIL.
//!
//! A walk steps through instructions from a pointer at relative zero and
//! records, per touched cell, what the span does to it. It stops at the first
//! instruction it cannot summarise (the *boundary*): any I/O, a `Loop`, a
//! `Multiply` whose source cell is not known, or an instruction that already
//! carries a resolved address.

use super::ir::{wrap, DilInstruction};
use serde::Serialize;
use std::collections::BTreeMap;

/// Net effect of a span on one cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CellEffect {
    /// Cell gains this amount (mod 256)
    Delta(i32),
    /// Cell ends holding exactly this value
    Set(u8),
}

impl CellEffect {
    fn plus(self, amount: i32) -> Self {
        match self {
            CellEffect::Delta(d) => CellEffect::Delta(wrap(i64::from(d) + i64::from(amount))),
            CellEffect::Set(v) => CellEffect::Set(v.wrapping_add(amount as u8)),
        }
    }

    /// Value of the cell after the span, given its value before
    pub fn apply(self, before: u8) -> u8 {
        match self {
            CellEffect::Delta(d) => before.wrapping_add(d as u8),
            CellEffect::Set(v) => v,
        }
    }

    /// True when the span leaves the cell unchanged
    pub fn is_identity(self) -> bool {
        self == CellEffect::Delta(0)
    }
}

/// I/O met at the end of a span
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SideEffect {
    Read { repeat: u32 },
    Write { repeat: u32 },
}

/// Summary of a straight-line span
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WalkResult {
    /// Effect per touched cell, keyed by offset from the entry pointer
    pub cell_deltas: BTreeMap<i64, CellEffect>,
    /// Pointer movement over the span
    pub final_pointer_delta: i64,
    /// I/O that ended the span, keyed by offset from the entry pointer
    pub side_effects: BTreeMap<i64, SideEffect>,
    /// Number of instructions folded into the summary; the boundary is not counted
    pub consumed: usize,
}

impl WalkResult {
    pub fn has_side_effects(&self) -> bool {
        !self.side_effects.is_empty()
    }

    /// True if the walk summarised all `len` instructions it was given
    pub fn covers(&self, len: usize) -> bool {
        self.consumed == len
    }

    /// Canonical cell operations for the summary, ascending by offset.
    ///
    /// Identity effects produce nothing; pointer movement is not included.
    pub fn to_instructions(&self) -> Vec<DilInstruction> {
        self.cell_deltas
            .iter()
            .filter(|(_, effect)| !effect.is_identity())
            .map(|(&offset, effect)| match *effect {
                CellEffect::Delta(d) => DilInstruction::add(offset, i64::from(d)),
                CellEffect::Set(v) => DilInstruction::assign(offset, v),
            })
            .collect()
    }
}

/// Walk `instructions` until the first boundary
pub fn walk(instructions: &[DilInstruction]) -> WalkResult {
    let mut result = WalkResult::default();
    let mut pointer: i64 = 0;

    for instruction in instructions {
        match instruction {
            DilInstruction::Add {
                offset,
                amount,
                address: None,
            } => {
                let effect = result
                    .cell_deltas
                    .entry(pointer + offset)
                    .or_insert(CellEffect::Delta(0));
                *effect = effect.plus(*amount);
            }
            DilInstruction::Assign {
                offset,
                value,
                address: None,
            } => {
                result.cell_deltas.insert(pointer + offset, CellEffect::Set(*value));
            }
            DilInstruction::MovePtr { delta } => pointer += delta,
            DilInstruction::Multiply {
                offset,
                source,
                factor,
                source_address: None,
                target_address: None,
            } => {
                // Only a source of known value folds to a constant.
                let Some(CellEffect::Set(value)) = result.cell_deltas.get(&(pointer + source)).copied()
                else {
                    break;
                };
                let amount = wrap(i64::from(value) * i64::from(*factor));
                let effect = result
                    .cell_deltas
                    .entry(pointer + offset)
                    .or_insert(CellEffect::Delta(0));
                *effect = effect.plus(amount);
            }
            DilInstruction::Write {
                offset,
                repeat,
                address: None,
            } => {
                result
                    .side_effects
                    .insert(pointer + offset, SideEffect::Write { repeat: *repeat });
                break;
            }
            DilInstruction::Read {
                offset,
                repeat,
                address: None,
            } => {
                result
                    .side_effects
                    .insert(pointer + offset, SideEffect::Read { repeat: *repeat });
                break;
            }
            _ => break,
        }
        result.consumed += 1;
    }

    result.final_pointer_delta = pointer;
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::ir::Address;

    #[test]
    fn test_sums_and_pointer() {
        let ops = vec![
            DilInstruction::add(0, -1),
            DilInstruction::move_ptr(1),
            DilInstruction::add(0, 3),
            DilInstruction::move_ptr(-1),
        ];
        let result = walk(&ops);
        assert!(result.covers(ops.len()));
        assert_eq!(result.final_pointer_delta, 0);
        assert_eq!(result.cell_deltas.get(&0), Some(&CellEffect::Delta(-1)));
        assert_eq!(result.cell_deltas.get(&1), Some(&CellEffect::Delta(3)));
        assert!(!result.has_side_effects());
    }

    #[test]
    fn test_assign_is_not_a_delta() {
        let ops = vec![
            DilInstruction::add(0, 7),
            DilInstruction::assign(0, 2),
            DilInstruction::add(0, 1),
        ];
        let result = walk(&ops);
        assert_eq!(result.cell_deltas.get(&0), Some(&CellEffect::Set(3)));
        assert_eq!(result.to_instructions(), vec![DilInstruction::assign(0, 3)]);
    }

    #[test]
    fn test_multiply_of_known_source_folds() {
        let ops = vec![
            DilInstruction::assign(0, 4),
            DilInstruction::multiply(2, 0, 3),
            DilInstruction::multiply(1, 5, 2),
        ];
        let result = walk(&ops);
        assert_eq!(result.consumed, 2);
        assert_eq!(result.cell_deltas.get(&2), Some(&CellEffect::Delta(12)));
    }

    #[test]
    fn test_io_ends_span_and_is_recorded() {
        let ops = vec![
            DilInstruction::move_ptr(2),
            DilInstruction::write(1),
            DilInstruction::add(0, 1),
        ];
        let result = walk(&ops);
        assert_eq!(result.consumed, 1);
        assert_eq!(result.side_effects.get(&3), Some(&SideEffect::Write { repeat: 1 }));
        assert_eq!(result.final_pointer_delta, 2);
    }

    #[test]
    fn test_resolved_instruction_is_a_boundary() {
        let ops = vec![DilInstruction::Add {
            offset: 0,
            amount: 1,
            address: Some(Address(0)),
        }];
        assert_eq!(walk(&ops).consumed, 0);
    }

    #[test]
    fn test_apply() {
        assert_eq!(CellEffect::Delta(-1).apply(0), 255);
        assert_eq!(CellEffect::Set(9).apply(200), 9);
        assert!(CellEffect::Delta(0).is_identity());
    }
}
