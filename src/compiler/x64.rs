//! x86-64 Linux machine code backend, assembled with iced-x86.
//!
//! Register use:
//! - `rbx`: cell pointer (absolute address into the tape)
//! - `r13`: address of tape cell 0, base of every absolute cell
//! - `eax`, `edi`, `rsi`, `edx`: syscall arguments and scratch
//! - `r12d`: counter of the current repeat block
//!
//! The tape is a zero-filled segment at [`TAPE_VADDR`]. Literals are placed
//! after the exit sequence and loaded RIP-relative.

use super::codegen::{Backend, CellRef};
use super::elf::{ElfWriter, TEXT_VADDR};
use crate::error::{Error, Result};
use iced_x86::code_asm::*;
use iced_x86::IcedError;

/// Virtual address of tape cell 0
pub const TAPE_VADDR: u64 = 0x0100_0000;

/// Syscall numbers
const SYS_READ: i32 = 0;
const SYS_WRITE: i32 = 1;
const SYS_EXIT: i32 = 60;

fn encoding(err: IcedError) -> Error {
    Error::codegen(format!("x86-64 encoding failed: {}", err))
}

/// Labels of a loop or repeat block
#[derive(Debug, Clone, Copy)]
pub struct BranchLabel {
    /// First instruction of the body; the backward branch target
    body: CodeLabel,
    /// First instruction after the block, for loops only
    exit: Option<CodeLabel>,
}

/// Emits x86-64 code and packages it with [`ElfWriter`]
pub struct X64Backend {
    assembler: CodeAssembler,
    literals: Vec<(CodeLabel, Vec<u8>)>,
    tape_size: usize,
    in_repeat: bool,
}

impl X64Backend {
    pub fn new() -> Result<Self> {
        Ok(Self {
            assembler: CodeAssembler::new(64).map_err(encoding)?,
            literals: Vec::new(),
            tape_size: 0,
            in_repeat: false,
        })
    }

    /// Memory operand for a cell, without an operand size
    fn cell(&self, cell: CellRef) -> Result<AsmMemoryOperand> {
        match cell {
            CellRef::Relative(offset) => {
                let disp = i32::try_from(offset)
                    .map_err(|_| Error::codegen(format!("cell offset {} exceeds 32 bits", offset)))?;
                Ok(ptr(rbx + disp))
            }
            CellRef::Absolute(index) => {
                let disp = i32::try_from(index)
                    .map_err(|_| Error::codegen(format!("cell {} is not addressable", index)))?;
                Ok(ptr(r13 + disp))
            }
        }
    }

    /// Bind `label` to the current position. A zero-length marker follows so
    /// that labels closing back to back each get an instruction of their own.
    fn bind(&mut self, label: &mut CodeLabel) -> Result<()> {
        self.assembler.set_label(label).map_err(encoding)?;
        self.assembler.zero_bytes().map_err(encoding)
    }

    /// `cmp byte [rbx], 0`
    fn test_current_cell(&mut self) -> Result<()> {
        self.assembler.cmp(byte_ptr(rbx + 0), 0).map_err(encoding)
    }

    /// `write(1, [rsi], edx)` once `rsi` is loaded
    fn write_syscall(&mut self, len: i32) -> Result<()> {
        self.assembler.mov(eax, SYS_WRITE).map_err(encoding)?;
        self.assembler.mov(edi, 1).map_err(encoding)?;
        self.assembler.mov(edx, len).map_err(encoding)?;
        self.assembler.syscall().map_err(encoding)
    }

    /// Append the literal pool and assemble everything for address `ip`
    fn assemble(&mut self, ip: u64) -> Result<Vec<u8>> {
        for (mut label, text) in std::mem::take(&mut self.literals) {
            self.assembler.set_label(&mut label).map_err(encoding)?;
            self.assembler.db(&text).map_err(encoding)?;
        }
        self.assembler.assemble(ip).map_err(encoding)
    }
}

impl Backend for X64Backend {
    type Label = BranchLabel;
    type Output = Vec<u8>;

    fn declare_tape(&mut self, size: usize) -> Result<()> {
        if size > i32::MAX as usize {
            return Err(Error::codegen(format!("tape of {} cells does not fit the image", size)));
        }
        self.tape_size = size;
        Ok(())
    }

    fn declare_pointer(&mut self) -> Result<()> {
        self.assembler.mov(r13, TAPE_VADDR as i64).map_err(encoding)?;
        self.assembler.mov(rbx, r13).map_err(encoding)
    }

    fn move_pointer(&mut self, delta: i64) -> Result<()> {
        if delta == 0 {
            return Ok(());
        }
        let imm = i32::try_from(delta)
            .map_err(|_| Error::codegen(format!("pointer move {} exceeds 32 bits", delta)))?;
        self.assembler.add(rbx, imm).map_err(encoding)
    }

    fn add_at(&mut self, cell: CellRef, amount: i32) -> Result<()> {
        let mem = byte_ptr(self.cell(cell)?);
        self.assembler.add(mem, amount as i8 as i32).map_err(encoding)
    }

    fn assign_at(&mut self, cell: CellRef, value: u8) -> Result<()> {
        let mem = byte_ptr(self.cell(cell)?);
        self.assembler.mov(mem, value as i32).map_err(encoding)
    }

    fn multiply_accumulate(&mut self, target: CellRef, source: CellRef, factor: i32) -> Result<()> {
        let source = byte_ptr(self.cell(source)?);
        let target = byte_ptr(self.cell(target)?);
        let mut skip = self.assembler.create_label();

        self.assembler.movzx(eax, source).map_err(encoding)?;
        // A zero source never touches the target.
        self.assembler.test(eax, eax).map_err(encoding)?;
        self.assembler.je(skip).map_err(encoding)?;
        if factor != 1 {
            self.assembler.imul_3(eax, eax, factor).map_err(encoding)?;
        }
        self.assembler.add(target, al).map_err(encoding)?;
        self.bind(&mut skip)
    }

    fn write_literal(&mut self, text: &[u8]) -> Result<()> {
        if text.is_empty() {
            return Ok(());
        }
        let len = i32::try_from(text.len()).map_err(|_| Error::codegen("literal too long"))?;

        let label = self.assembler.create_label();
        self.assembler.lea(rsi, ptr(label)).map_err(encoding)?;
        self.write_syscall(len)?;
        self.literals.push((label, text.to_vec()));
        Ok(())
    }

    fn read_into(&mut self, cell: CellRef) -> Result<()> {
        // End of input leaves 255 in the cell.
        self.assign_at(cell, 0xFF)?;
        let mem = self.cell(cell)?;
        self.assembler.lea(rsi, mem).map_err(encoding)?;
        self.assembler.mov(eax, SYS_READ).map_err(encoding)?;
        self.assembler.xor(edi, edi).map_err(encoding)?;
        self.assembler.mov(edx, 1).map_err(encoding)?;
        self.assembler.syscall().map_err(encoding)
    }

    fn write_from(&mut self, cell: CellRef) -> Result<()> {
        let mem = self.cell(cell)?;
        self.assembler.lea(rsi, mem).map_err(encoding)?;
        self.write_syscall(1)
    }

    fn open_loop(&mut self) -> Result<BranchLabel> {
        let mut body = self.assembler.create_label();
        let exit = self.assembler.create_label();
        self.test_current_cell()?;
        self.assembler.je(exit).map_err(encoding)?;
        self.bind(&mut body)?;
        Ok(BranchLabel { body, exit: Some(exit) })
    }

    fn close_loop(&mut self, label: BranchLabel) -> Result<()> {
        let mut exit = label
            .exit
            .ok_or_else(|| Error::codegen("repeat label closed as a loop"))?;
        self.test_current_cell()?;
        self.assembler.jne(label.body).map_err(encoding)?;
        self.bind(&mut exit)
    }

    fn open_repeat(&mut self, count: u32) -> Result<BranchLabel> {
        if self.in_repeat {
            return Err(Error::codegen("repeat blocks cannot nest"));
        }
        self.in_repeat = true;
        let mut body = self.assembler.create_label();
        self.assembler.mov(r12d, count as i32).map_err(encoding)?;
        self.bind(&mut body)?;
        Ok(BranchLabel { body, exit: None })
    }

    fn close_repeat(&mut self, label: BranchLabel) -> Result<()> {
        self.assembler.dec(r12d).map_err(encoding)?;
        self.assembler.jne(label.body).map_err(encoding)?;
        self.in_repeat = false;
        Ok(())
    }

    fn finish(mut self) -> Result<Vec<u8>> {
        self.assembler.mov(eax, SYS_EXIT).map_err(encoding)?;
        self.assembler.xor(edi, edi).map_err(encoding)?;
        self.assembler.syscall().map_err(encoding)?;

        let code = self.assemble(TEXT_VADDR + ElfWriter::HEADERS_SIZE as u64)?;
        tracing::debug!(code = code.len(), tape = self.tape_size, "x86-64 code assembled");
        ElfWriter::new().write(&code, self.tape_size, TAPE_VADDR)
    }
}
