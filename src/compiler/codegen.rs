//! # Code Generator
//!
//! Walks a final [`OperationSet`] and drives a [`Backend`]. The generator owns
//! the loop-label stack: `open_loop` hands out a label that is given back to
//! `close_loop` once the body is emitted, so the backend can backpatch its
//! forward branch.

use super::ir::{Address, DilInstruction, OperationSet};
use crate::error::{Error, Result};

/// Operand of a cell primitive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellRef {
    /// Offset from the cell pointer
    Relative(i64),
    /// Absolute tape index
    Absolute(usize),
}

impl CellRef {
    pub fn of(offset: i64, address: Option<Address>) -> Self {
        match address {
            Some(address) => CellRef::Absolute(address.0),
            None => CellRef::Relative(offset),
        }
    }
}

/// Target of code generation
pub trait Backend {
    /// Backpatching handle for a loop or a counted repeat
    type Label;
    /// Finished artifact
    type Output;

    fn declare_tape(&mut self, size: usize) -> Result<()>;
    fn declare_pointer(&mut self) -> Result<()>;
    fn move_pointer(&mut self, delta: i64) -> Result<()>;
    fn add_at(&mut self, cell: CellRef, amount: i32) -> Result<()>;
    fn assign_at(&mut self, cell: CellRef, value: u8) -> Result<()>;
    fn multiply_accumulate(&mut self, target: CellRef, source: CellRef, factor: i32) -> Result<()>;
    fn write_literal(&mut self, text: &[u8]) -> Result<()>;
    fn read_into(&mut self, cell: CellRef) -> Result<()>;
    fn write_from(&mut self, cell: CellRef) -> Result<()>;

    /// Start a loop testing the cell under the pointer; skips the body on zero
    fn open_loop(&mut self) -> Result<Self::Label>;
    /// Branch back to the body while the cell under the pointer is nonzero
    fn close_loop(&mut self, label: Self::Label) -> Result<()>;

    /// Start a block executed `count` times. Repeat blocks never nest.
    fn open_repeat(&mut self, count: u32) -> Result<Self::Label>;
    fn close_repeat(&mut self, label: Self::Label) -> Result<()>;

    fn finish(self) -> Result<Self::Output>;
}

/// Drives a [`Backend`] over an operation set
pub struct CodeGenerator<B: Backend> {
    backend: B,
    tape_size: usize,
    optimize_for_space: bool,
    loop_stack: Vec<B::Label>,
    primitives: usize,
}

impl<B: Backend> CodeGenerator<B> {
    pub fn new(backend: B, tape_size: usize) -> Self {
        Self {
            backend,
            tape_size,
            optimize_for_space: false,
            loop_stack: Vec::new(),
            primitives: 0,
        }
    }

    /// Emit counted runtime loops instead of repeating a primitive inline
    pub fn with_optimize_for_space(mut self, enabled: bool) -> Self {
        self.optimize_for_space = enabled;
        self
    }

    /// Emit the whole program; returns the artifact and the number of
    /// backend primitives issued
    pub fn emit(mut self, set: &OperationSet) -> Result<(B::Output, usize)> {
        self.backend.declare_tape(self.tape_size)?;
        self.backend.declare_pointer()?;
        self.emit_set(set)?;

        if !self.loop_stack.is_empty() {
            return Err(Error::codegen("loop left open at end of program"));
        }
        tracing::debug!(primitives = self.primitives, "code generation finished");
        Ok((self.backend.finish()?, self.primitives))
    }

    fn emit_set(&mut self, set: &OperationSet) -> Result<()> {
        let instructions = &set.instructions;
        let mut idx = 0;

        while idx < instructions.len() {
            let instruction = &instructions[idx];
            let run = if self.optimize_for_space && !instruction.is_loop() {
                instructions[idx..]
                    .iter()
                    .take_while(|other| *other == instruction)
                    .count()
            } else {
                1
            };

            if run > 1 {
                let count = u32::try_from(run).map_err(|_| Error::codegen("repeat count overflow"))?;
                self.counted(count, |generator| generator.emit_instruction(instruction))?;
            } else {
                self.emit_instruction(instruction)?;
            }
            idx += run;
        }
        Ok(())
    }

    fn emit_instruction(&mut self, instruction: &DilInstruction) -> Result<()> {
        match instruction {
            DilInstruction::Add {
                offset,
                amount,
                address,
            } => self.primitive(|b| b.add_at(CellRef::of(*offset, *address), *amount)),
            DilInstruction::Assign {
                offset,
                value,
                address,
            } => self.primitive(|b| b.assign_at(CellRef::of(*offset, *address), *value)),
            DilInstruction::Multiply {
                offset,
                source,
                factor,
                source_address,
                target_address,
            } => self.primitive(|b| {
                b.multiply_accumulate(
                    CellRef::of(*offset, *target_address),
                    CellRef::of(*source, *source_address),
                    *factor,
                )
            }),
            DilInstruction::MovePtr { delta } => self.primitive(|b| b.move_pointer(*delta)),
            DilInstruction::Write {
                offset,
                repeat,
                address,
            } => {
                let cell = CellRef::of(*offset, *address);
                self.repeated(*repeat, |generator| generator.primitive(|b| b.write_from(cell)))
            }
            DilInstruction::Read {
                offset,
                repeat,
                address,
            } => {
                let cell = CellRef::of(*offset, *address);
                self.repeated(*repeat, |generator| generator.primitive(|b| b.read_into(cell)))
            }
            DilInstruction::WriteLiteral { text } => self.primitive(|b| b.write_literal(text)),
            DilInstruction::Loop { body } => {
                let label = self.backend.open_loop()?;
                self.loop_stack.push(label);
                self.emit_set(body)?;
                let label = self
                    .loop_stack
                    .pop()
                    .ok_or_else(|| Error::codegen("loop stack underflow"))?;
                self.backend.close_loop(label)
            }
        }
    }

    fn primitive(&mut self, emit: impl FnOnce(&mut B) -> Result<()>) -> Result<()> {
        self.primitives += 1;
        emit(&mut self.backend)
    }

    /// `count` copies of an I/O primitive, inline or as a counted loop
    fn repeated(&mut self, count: u32, mut emit: impl FnMut(&mut Self) -> Result<()>) -> Result<()> {
        if self.optimize_for_space && count > 1 {
            return self.counted(count, emit);
        }
        for _ in 0..count {
            emit(self)?;
        }
        Ok(())
    }

    fn counted(&mut self, count: u32, emit: impl FnOnce(&mut Self) -> Result<()>) -> Result<()> {
        let label = self.backend.open_repeat(count)?;
        // Nested repeats would share one counter; expand the inner one instead.
        let was = std::mem::replace(&mut self.optimize_for_space, false);
        let result = emit(self);
        self.optimize_for_space = was;
        result?;
        self.backend.close_repeat(label)
    }
}
