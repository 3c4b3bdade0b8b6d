//! Loop classification over the primitive stream.

use super::ir::IrBuilder;
use super::optimizer::unroll_loops;
use super::walk::{walk, WalkResult};
use crate::error::{Error, LoopMarker, Result};
use crate::lexer::Instruction;

/// Deepest loop nesting accepted. Every later pass recurses once per level,
/// so deeper programs are rejected here with an error.
pub const MAX_LOOP_DEPTH: usize = 512;

/// A classified loop of the primitive stream
#[derive(Debug, Clone, PartialEq)]
pub struct Loop {
    /// Index of the opening marker in the enclosing stream
    pub start_index: usize,
    /// Primitives strictly between the markers
    pub body: Vec<Instruction>,
    /// Directly nested loops, in order; indices are relative to `body`
    pub nested_loops: Vec<Loop>,
    /// Body is exactly one `Increment` or `Decrement`
    pub is_clearance: bool,
    /// Body is empty: the loop never ends once entered
    pub is_infinite_pattern: bool,
    /// No I/O and balanced pointer movement outside the nested loops
    pub is_simple: bool,
    /// Summary of one iteration, when the body can be summarised at all
    pub invariant_effect: Option<WalkResult>,
}

impl Loop {
    /// Index of the closing marker in the enclosing stream
    pub fn end_index(&self) -> usize {
        self.start_index + self.body.len() + 1
    }

    /// Primitives of the body that belong to this loop and not to a nested one
    pub fn own_instructions(&self) -> Vec<Instruction> {
        let mut own = Vec::with_capacity(self.body.len());
        let mut depth = 0usize;
        for &instruction in &self.body {
            match instruction {
                Instruction::LoopStart => depth += 1,
                Instruction::LoopEnd => depth = depth.saturating_sub(1),
                other if depth == 0 => own.push(other),
                _ => {}
            }
        }
        own
    }
}

/// Index of the marker closing the loop opened at `start`
pub fn matching_end(stream: &[Instruction], start: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (idx, instruction) in stream.iter().enumerate().skip(start) {
        match instruction {
            Instruction::LoopStart => depth += 1,
            Instruction::LoopEnd => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(idx);
                }
            }
            _ => {}
        }
    }
    None
}

/// Classify the loop whose opening marker sits at `start_index`
pub fn classify(stream: &[Instruction], start_index: usize) -> Result<Loop> {
    debug_assert_eq!(stream.get(start_index), Some(&Instruction::LoopStart));
    check_nesting(stream, start_index)?;
    classify_loop(stream, start_index)
}

/// Reject a loop nested deeper than [`MAX_LOOP_DEPTH`], without recursing
fn check_nesting(stream: &[Instruction], start_index: usize) -> Result<()> {
    let mut depth = 0usize;
    for (idx, instruction) in stream.iter().enumerate().skip(start_index) {
        match instruction {
            Instruction::LoopStart => {
                depth += 1;
                if depth > MAX_LOOP_DEPTH {
                    return Err(Error::NestingTooDeep {
                        index: idx,
                        limit: MAX_LOOP_DEPTH,
                    });
                }
            }
            Instruction::LoopEnd => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    break;
                }
            }
            _ => {}
        }
    }
    Ok(())
}

fn classify_loop(stream: &[Instruction], start_index: usize) -> Result<Loop> {
    let end = matching_end(stream, start_index).ok_or(Error::Structural {
        missing: LoopMarker::End,
        index: start_index,
    })?;
    let body = stream[start_index + 1..end].to_vec();

    let mut nested_loops = Vec::new();
    let mut idx = 0;
    while idx < body.len() {
        if body[idx] == Instruction::LoopStart {
            let inner = classify_loop(&body, idx)?;
            idx = inner.end_index() + 1;
            nested_loops.push(inner);
        } else {
            idx += 1;
        }
    }

    let mut lp = Loop {
        start_index,
        is_clearance: matches!(body.as_slice(), [Instruction::Increment] | [Instruction::Decrement]),
        is_infinite_pattern: body.is_empty(),
        body,
        nested_loops,
        is_simple: false,
        invariant_effect: None,
    };

    let own = lp.own_instructions();
    let rights = own.iter().filter(|i| **i == Instruction::MoveRight).count();
    let lefts = own.iter().filter(|i| **i == Instruction::MoveLeft).count();
    lp.is_simple = !own.iter().any(|i| i.is_io()) && rights == lefts;

    if lp.is_simple {
        lp.invariant_effect = summarize_body(&lp);
    }

    tracing::trace!(
        start = lp.start_index,
        clearance = lp.is_clearance,
        simple = lp.is_simple,
        summarised = lp.invariant_effect.is_some(),
        "classified loop"
    );

    Ok(lp)
}

/// Effect of one iteration, with nested loops reduced where possible
fn summarize_body(lp: &Loop) -> Option<WalkResult> {
    let mut ops = IrBuilder::new().lower_body(lp, 0);
    while unroll_loops(&mut ops) {}
    if ops.contains_loop() {
        return None;
    }

    let result = walk(&ops.instructions);
    result.covers(ops.len()).then_some(result)
}
