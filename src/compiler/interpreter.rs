//! Reference interpreter for DIL.
//!
//! Runs any [`OperationSet`], optimized or not, against a concrete tape. It is
//! the oracle the optimizer is checked against, not a production runtime.

use super::ir::{Address, DilInstruction, OperationSet};
use crate::error::{Error, Result};

/// Byte stored by a read once the input is exhausted
pub const EOF_BYTE: u8 = 255;

/// Tape machine executing DIL
#[derive(Debug, Clone)]
pub struct Interpreter {
    tape: Vec<u8>,
    pointer: i64,
    input: Vec<u8>,
    input_pos: usize,
    output: Vec<u8>,
    steps: u64,
    step_limit: Option<u64>,
}

impl Interpreter {
    /// Zeroed tape of `tape_size` cells, pointer at cell 0
    pub fn new(tape_size: usize) -> Self {
        Self::with_tape(vec![0; tape_size], 0)
    }

    /// Start from an existing tape and pointer position
    pub fn with_tape(tape: Vec<u8>, pointer: i64) -> Self {
        Self {
            tape,
            pointer,
            input: Vec::new(),
            input_pos: 0,
            output: Vec::new(),
            steps: 0,
            step_limit: None,
        }
    }

    pub fn with_input(mut self, input: &[u8]) -> Self {
        self.input = input.to_vec();
        self.input_pos = 0;
        self
    }

    /// Fail with `StepLimitExceeded` after `limit` executed instructions
    pub fn with_step_limit(mut self, limit: u64) -> Self {
        self.step_limit = Some(limit);
        self
    }

    pub fn tape(&self) -> &[u8] {
        &self.tape
    }

    pub fn pointer(&self) -> i64 {
        self.pointer
    }

    pub fn output(&self) -> &[u8] {
        &self.output
    }

    pub fn into_output(self) -> Vec<u8> {
        self.output
    }

    /// Execute `set` from the current machine state
    pub fn run(&mut self, set: &OperationSet) -> Result<()> {
        for instruction in &set.instructions {
            self.step(instruction)?;
        }
        Ok(())
    }

    fn step(&mut self, instruction: &DilInstruction) -> Result<()> {
        self.tick()?;

        match instruction {
            DilInstruction::Add {
                offset,
                amount,
                address,
            } => {
                let idx = self.cell_index(*offset, *address)?;
                self.tape[idx] = self.tape[idx].wrapping_add(*amount as u8);
            }
            DilInstruction::Assign {
                offset,
                value,
                address,
            } => {
                let idx = self.cell_index(*offset, *address)?;
                self.tape[idx] = *value;
            }
            DilInstruction::Multiply {
                offset,
                source,
                factor,
                source_address,
                target_address,
            } => {
                let src = self.cell_index(*source, *source_address)?;
                // A zero source is the skipped-loop case; the target is never touched.
                if self.tape[src] == 0 {
                    return Ok(());
                }
                let dst = self.cell_index(*offset, *target_address)?;
                let product = self.tape[src].wrapping_mul(*factor as u8);
                self.tape[dst] = self.tape[dst].wrapping_add(product);
            }
            DilInstruction::MovePtr { delta } => self.pointer += delta,
            DilInstruction::Write {
                offset,
                repeat,
                address,
            } => {
                let idx = self.cell_index(*offset, *address)?;
                let value = self.tape[idx];
                self.output.extend(std::iter::repeat(value).take(*repeat as usize));
            }
            DilInstruction::Read {
                offset,
                repeat,
                address,
            } => {
                let idx = self.cell_index(*offset, *address)?;
                for _ in 0..*repeat {
                    self.tape[idx] = self.next_input();
                }
            }
            DilInstruction::WriteLiteral { text } => self.output.extend_from_slice(text),
            DilInstruction::Loop { body } => {
                while self.tape[self.cell_index(0, None)?] != 0 {
                    self.run(body)?;
                    self.tick()?;
                }
            }
        }
        Ok(())
    }

    fn tick(&mut self) -> Result<()> {
        self.steps += 1;
        match self.step_limit {
            Some(limit) if self.steps > limit => Err(Error::StepLimitExceeded { limit }),
            _ => Ok(()),
        }
    }

    fn next_input(&mut self) -> u8 {
        match self.input.get(self.input_pos) {
            Some(&byte) => {
                self.input_pos += 1;
                byte
            }
            None => EOF_BYTE,
        }
    }

    fn cell_index(&self, offset: i64, address: Option<Address>) -> Result<usize> {
        let target = match address {
            Some(address) => i64::try_from(address.0).unwrap_or(i64::MAX),
            None => self.pointer.saturating_add(offset),
        };
        match usize::try_from(target) {
            Ok(idx) if idx < self.tape.len() => Ok(idx),
            _ => Err(Error::TapeOverflow {
                address: target,
                size: self.tape.len(),
            }),
        }
    }
}

/// Run `set` on a zeroed tape with `input`, returning what it wrote
pub fn interpret(set: &OperationSet, input: &[u8], tape_size: usize) -> Result<Vec<u8>> {
    let mut interpreter = Interpreter::new(tape_size).with_input(input);
    interpreter.run(set)?;
    Ok(interpreter.into_output())
}
