use super::instruction::DilInstruction;
use super::operation_set::OperationSet;
use crate::compiler::loop_analyzer::{classify, Loop};
use crate::error::{Error, LoopMarker, Result};
use crate::lexer::Instruction;
use serde::Serialize;
use std::fmt;

/// Non-fatal finding raised while lowering
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum CompileWarning {
    /// A loop with an empty body; it never ends once entered
    InfiniteLoopPattern { index: usize },
}

impl fmt::Display for CompileWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileWarning::InfiniteLoopPattern { index } => write!(
                f,
                "loop at instruction {} has an empty body and never ends once entered",
                index
            ),
        }
    }
}

/// Lowers a primitive stream to DIL
#[derive(Debug, Default)]
pub struct IrBuilder {
    warnings: Vec<CompileWarning>,
}

impl IrBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lower a whole stream, validating loop structure
    pub fn build(&mut self, stream: &[Instruction]) -> Result<OperationSet> {
        let mut set = OperationSet::new();
        let reported = self.warnings.len();
        let mut idx = 0;

        while idx < stream.len() {
            match stream[idx] {
                Instruction::LoopStart => {
                    let lp = classify(stream, idx)?;
                    idx = lp.end_index() + 1;
                    set.push(self.lower_loop(&lp, 0));
                }
                Instruction::LoopEnd => {
                    return Err(Error::Structural {
                        missing: LoopMarker::Start,
                        index: idx,
                    });
                }
                primitive => {
                    set.extend(lower_primitive(primitive));
                    idx += 1;
                }
            }
        }

        // Classification lowers loop bodies with a builder of its own; only
        // the warnings of this stream are logged.
        for warning in &self.warnings[reported..] {
            tracing::warn!("{}", warning);
        }
        tracing::debug!(primitives = stream.len(), instructions = set.deep_len(), "lowered to DIL");
        Ok(set)
    }

    /// Lower the body of a classified loop.
    ///
    /// `base` is the stream index of the first body primitive; it only
    /// positions warnings.
    pub fn lower_body(&mut self, lp: &Loop, base: usize) -> OperationSet {
        let mut body = OperationSet::new();
        let mut nested = lp.nested_loops.iter().peekable();
        let mut idx = 0;

        while idx < lp.body.len() {
            match nested.peek() {
                Some(&inner) if inner.start_index == idx => {
                    nested.next();
                    body.push(self.lower_loop(inner, base));
                    idx = inner.end_index() + 1;
                }
                _ => {
                    body.extend(lower_primitive(lp.body[idx]));
                    idx += 1;
                }
            }
        }

        body
    }

    fn lower_loop(&mut self, lp: &Loop, base: usize) -> DilInstruction {
        let index = base + lp.start_index;
        if lp.is_infinite_pattern {
            self.warnings.push(CompileWarning::InfiniteLoopPattern { index });
        }
        DilInstruction::looped(self.lower_body(lp, index + 1))
    }

    pub fn into_warnings(self) -> Vec<CompileWarning> {
        self.warnings
    }
}

fn lower_primitive(primitive: Instruction) -> Option<DilInstruction> {
    match primitive {
        Instruction::MoveRight => Some(DilInstruction::move_ptr(1)),
        Instruction::MoveLeft => Some(DilInstruction::move_ptr(-1)),
        Instruction::Increment => Some(DilInstruction::add(0, 1)),
        Instruction::Decrement => Some(DilInstruction::add(0, -1)),
        Instruction::Write => Some(DilInstruction::write(0)),
        Instruction::Read => Some(DilInstruction::read(0)),
        Instruction::LoopStart | Instruction::LoopEnd => None,
    }
}
