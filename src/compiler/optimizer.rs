//! # DIL Optimizer
//!
//! Rewrites an [`OperationSet`] to a fixed point. One cycle runs every pass
//! once, in this order:
//! - Compaction: merge adjacent same-cell instructions
//! - Loop unrolling: clearance and multiplication loops, one per cycle
//! - Straight-line folding: canonical form per span between boundaries
//! - Address substitution: pointer-relative offsets to absolute addresses
//! - Literal materialization: collapse a fully known program to its output
//!
//! Every pass is total. A pass that cannot improve a region leaves it alone
//! and reports no change; the driver stops after a cycle with no change.

use super::ir::{wrap, Address, DilInstruction, OperationSet};
use super::walk::{walk, CellEffect};
use serde::Serialize;
use std::collections::HashMap;

/// Pass activity over one `optimize` call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OptimizationStats {
    /// Pipeline cycles run, including the final unchanged one
    pub cycles: usize,
    /// Cycles in which each pass changed the set
    pub compactions: usize,
    pub unrolls: usize,
    pub folds: usize,
    pub substitutions: usize,
    pub materializations: usize,
}

/// Fixed-point driver over the five passes
pub struct Optimizer {
    tape_size: usize,
}

impl Optimizer {
    /// Create an optimizer for programs running on a tape of `tape_size` cells
    pub fn new(tape_size: usize) -> Self {
        Self { tape_size }
    }

    /// Run all passes until a full cycle changes nothing
    pub fn optimize(&self, set: &mut OperationSet) -> OptimizationStats {
        let mut stats = OptimizationStats::default();

        loop {
            stats.cycles += 1;
            let mut changed = false;

            if compact(set) {
                stats.compactions += 1;
                changed = true;
            }
            if unroll_loops(set) {
                stats.unrolls += 1;
                changed = true;
            }
            if fold_straight_line(set) {
                stats.folds += 1;
                changed = true;
            }
            if substitute_addresses(set, self.tape_size) {
                stats.substitutions += 1;
                changed = true;
            }
            if materialize_literals(set) {
                stats.materializations += 1;
                changed = true;
            }

            tracing::trace!(cycle = stats.cycles, changed, size = set.deep_len(), "optimizer cycle");
            if !changed {
                break;
            }
        }

        tracing::debug!(
            cycles = stats.cycles,
            compactions = stats.compactions,
            unrolls = stats.unrolls,
            folds = stats.folds,
            substitutions = stats.substitutions,
            materializations = stats.materializations,
            "optimization finished"
        );
        stats
    }
}

fn same_cell(a: (i64, Option<Address>), b: (i64, Option<Address>)) -> bool {
    match (a.1, b.1) {
        (Some(x), Some(y)) => x == y,
        (None, None) => a.0 == b.0,
        _ => false,
    }
}

fn is_noop(instruction: &DilInstruction) -> bool {
    matches!(
        instruction,
        DilInstruction::Add { amount: 0, .. } | DilInstruction::MovePtr { delta: 0 }
    )
}

/// Absorb `next` into `prev` if both act on the same cell in a mergeable way
fn merge(prev: &mut DilInstruction, next: &DilInstruction) -> bool {
    match (prev, next) {
        (
            DilInstruction::Add {
                offset: o1,
                amount: a1,
                address: x1,
            },
            DilInstruction::Add {
                offset: o2,
                amount: a2,
                address: x2,
            },
        ) if same_cell((*o1, *x1), (*o2, *x2)) => {
            *a1 = wrap(i64::from(*a1) + i64::from(*a2));
            true
        }
        (DilInstruction::MovePtr { delta: d1 }, DilInstruction::MovePtr { delta: d2 }) => {
            *d1 += d2;
            true
        }
        (
            DilInstruction::Assign {
                offset: o1,
                value: v1,
                address: x1,
            },
            DilInstruction::Assign {
                offset: o2,
                value: v2,
                address: x2,
            },
        ) if same_cell((*o1, *x1), (*o2, *x2)) => {
            *v1 = *v2;
            true
        }
        (
            DilInstruction::Write {
                offset: o1,
                repeat: r1,
                address: x1,
            },
            DilInstruction::Write {
                offset: o2,
                repeat: r2,
                address: x2,
            },
        )
        | (
            DilInstruction::Read {
                offset: o1,
                repeat: r1,
                address: x1,
            },
            DilInstruction::Read {
                offset: o2,
                repeat: r2,
                address: x2,
            },
        ) if same_cell((*o1, *x1), (*o2, *x2)) => match r1.checked_add(*r2) {
            Some(sum) => {
                *r1 = sum;
                true
            }
            None => false,
        },
        _ => false,
    }
}

/// Compaction pass
pub fn compact(set: &mut OperationSet) -> bool {
    let mut changed = false;
    let mut out: Vec<DilInstruction> = Vec::with_capacity(set.len());

    for mut instruction in std::mem::take(&mut set.instructions) {
        if let DilInstruction::Loop { body } = &mut instruction {
            changed |= compact(body);
        }
        if is_noop(&instruction) {
            changed = true;
            continue;
        }
        if let Some(last) = out.last_mut() {
            if merge(last, &instruction) {
                changed = true;
                if is_noop(last) {
                    out.pop();
                }
                continue;
            }
        }
        out.push(instruction);
    }

    set.instructions = out;
    changed
}

/// Loop unrolling pass; rewrites at most one loop, innermost first
pub fn unroll_loops(set: &mut OperationSet) -> bool {
    for idx in 0..set.instructions.len() {
        let replacement = match &mut set.instructions[idx] {
            DilInstruction::Loop { body } => {
                if unroll_loops(body) {
                    return true;
                }
                unrolled_form(body)
            }
            _ => continue,
        };

        if let Some(ops) = replacement {
            tracing::trace!(replacement = ops.len(), "unrolled loop");
            set.instructions.splice(idx..=idx, ops);
            return true;
        }
    }
    false
}

/// Loop-free equivalent of a loop with this body, if one exists
fn unrolled_form(body: &OperationSet) -> Option<Vec<DilInstruction>> {
    // One odd step reaches zero from any start value mod 256.
    if let [DilInstruction::Add {
        offset: 0,
        amount,
        address: None,
    }] = body.instructions.as_slice()
    {
        if amount % 2 != 0 {
            return Some(vec![DilInstruction::assign(0, 0)]);
        }
    }

    if body.contains_loop() {
        return None;
    }
    let effect = walk(&body.instructions);
    if !effect.covers(body.len()) || effect.final_pointer_delta != 0 || effect.has_side_effects() {
        return None;
    }
    if effect.cell_deltas.get(&0) != Some(&CellEffect::Delta(-1)) {
        return None;
    }

    let mut ops = Vec::new();
    for (&offset, cell) in &effect.cell_deltas {
        match *cell {
            _ if offset == 0 || cell.is_identity() => {}
            CellEffect::Delta(factor) => ops.push(DilInstruction::multiply(offset, 0, i64::from(factor))),
            CellEffect::Set(_) => return None,
        }
    }
    ops.push(DilInstruction::assign(0, 0));
    Some(ops)
}

/// Straight-line folding pass
pub fn fold_straight_line(set: &mut OperationSet) -> bool {
    if set.addresses_resolved {
        return false;
    }

    let mut old = std::mem::take(&mut set.instructions);
    let mut out = Vec::with_capacity(old.len());
    let mut changed = false;
    let mut idx = 0;

    while idx < old.len() {
        if let DilInstruction::Loop { body } = &mut old[idx] {
            changed |= fold_straight_line(body);
            out.push(std::mem::replace(&mut old[idx], DilInstruction::move_ptr(0)));
            idx += 1;
            continue;
        }

        let span = walk(&old[idx..]);
        let mut next = idx + span.consumed;
        let mut folded = span.to_instructions();
        if let Some(boundary) = old.get(next).filter(|b| !b.is_loop()) {
            folded.push(boundary.shifted(span.final_pointer_delta));
            next += 1;
        }
        if span.final_pointer_delta != 0 {
            folded.push(DilInstruction::move_ptr(span.final_pointer_delta));
        }

        if folded.as_slice() != &old[idx..next] {
            tracing::trace!(from = next - idx, to = folded.len(), "folded span");
            changed = true;
        }
        out.extend(folded);
        idx = next;
    }

    set.instructions = out;
    changed
}

/// Address substitution pass; top level, loop-free sets only
pub fn substitute_addresses(set: &mut OperationSet, tape_size: usize) -> bool {
    if set.addresses_resolved || set.contains_loop() {
        return false;
    }

    let mut running: i64 = 0;
    let mut resolved = Vec::with_capacity(set.len());
    for instruction in &set.instructions {
        match instruction {
            DilInstruction::MovePtr { delta } => running += delta,
            other => match other.resolved(running, tape_size) {
                Some(instruction) => resolved.push(instruction),
                None => {
                    tracing::trace!(base = running, "address outside the tape; substitution skipped");
                    return false;
                }
            },
        }
    }

    set.instructions = resolved;
    set.addresses_resolved = true;
    true
}

/// Literal materialization pass; resolved read-free sets only
pub fn materialize_literals(set: &mut OperationSet) -> bool {
    if !set.addresses_resolved {
        return false;
    }

    let mut tape: HashMap<usize, u8> = HashMap::new();
    let mut text = Vec::new();

    for instruction in &set.instructions {
        match instruction {
            DilInstruction::Add {
                amount,
                address: Some(address),
                ..
            } => {
                let cell = tape.entry(address.0).or_insert(0);
                *cell = CellEffect::Delta(*amount).apply(*cell);
            }
            DilInstruction::Assign {
                value,
                address: Some(address),
                ..
            } => {
                tape.insert(address.0, *value);
            }
            DilInstruction::Multiply {
                factor,
                source_address: Some(source),
                target_address: Some(target),
                ..
            } => {
                let product = tape
                    .get(&source.0)
                    .copied()
                    .unwrap_or(0)
                    .wrapping_mul(*factor as u8);
                let cell = tape.entry(target.0).or_insert(0);
                *cell = cell.wrapping_add(product);
            }
            DilInstruction::Write {
                repeat,
                address: Some(address),
                ..
            } => {
                let value = tape.get(&address.0).copied().unwrap_or(0);
                text.extend(std::iter::repeat(value).take(*repeat as usize));
            }
            DilInstruction::WriteLiteral { text: literal } => text.extend_from_slice(literal),
            _ => return false,
        }
    }

    let replacement = if text.is_empty() {
        Vec::new()
    } else {
        vec![DilInstruction::write_literal(text)]
    };
    if replacement == set.instructions {
        return false;
    }

    tracing::trace!(from = set.len(), to = replacement.len(), "materialized literal output");
    set.instructions = replacement;
    true
}
