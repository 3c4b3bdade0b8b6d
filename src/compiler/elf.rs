//! # ELF Writer for x86-64 Linux
//!
//! Packages machine code into a static `ET_EXEC` image. The image has no
//! section headers and two loadable segments:
//!
//! ```text
//! PT_LOAD R+X  @ TEXT_VADDR   ELF header | program headers | code
//! PT_LOAD R+W  @ tape vaddr   tape (no file bytes, zero-filled by the loader)
//! ```

use crate::error::{Error, Result};

/// ELF magic number
const ELF_MAGIC: [u8; 4] = [0x7f, b'E', b'L', b'F'];

/// ELF class: 64-bit
const ELFCLASS64: u8 = 2;

/// ELF data encoding: little-endian
const ELFDATA2LSB: u8 = 1;

/// ELF version
const EV_CURRENT: u8 = 1;

/// ELF OS/ABI: System V
const ELFOSABI_NONE: u8 = 0;

/// ELF type: executable
const ET_EXEC: u16 = 2;

/// ELF machine: AMD x86-64
const EM_X86_64: u16 = 62;

/// Program header type
const PT_LOAD: u32 = 1;

/// Program header flags
const PF_X: u32 = 0x1;
const PF_W: u32 = 0x2;
const PF_R: u32 = 0x4;

const EHDR_SIZE: usize = 64;
const PHDR_SIZE: usize = 56;
const PAGE_SIZE: u64 = 0x1000;

/// Load address of the image (headers included)
pub const TEXT_VADDR: u64 = 0x40_0000;

/// Writes static x86-64 executables
#[derive(Debug, Default)]
pub struct ElfWriter;

impl ElfWriter {
    /// Bytes before the first code byte
    pub const HEADERS_SIZE: usize = EHDR_SIZE + 2 * PHDR_SIZE;

    pub fn new() -> Self {
        Self
    }

    /// Build the image around `code`, which must be assembled for the
    /// address right after the headers
    pub fn write(&self, code: &[u8], tape_size: usize, tape_vaddr: u64) -> Result<Vec<u8>> {
        if tape_size == 0 {
            return Err(Error::codegen("tape must have at least one cell"));
        }
        if tape_vaddr % PAGE_SIZE != 0 {
            return Err(Error::codegen("tape address must be page aligned"));
        }

        let code_offset = Self::HEADERS_SIZE;
        let image_size = code_offset + code.len();
        if TEXT_VADDR + image_size as u64 > tape_vaddr {
            return Err(Error::codegen(format!(
                "program image of {} bytes overlaps the tape",
                image_size
            )));
        }

        let mut elf = Vec::with_capacity(image_size);

        // ELF header
        elf.extend_from_slice(&ELF_MAGIC);
        elf.push(ELFCLASS64);
        elf.push(ELFDATA2LSB);
        elf.push(EV_CURRENT);
        elf.push(ELFOSABI_NONE);
        elf.extend_from_slice(&[0; 8]); // e_ident padding
        elf.extend_from_slice(&ET_EXEC.to_le_bytes());
        elf.extend_from_slice(&EM_X86_64.to_le_bytes());
        elf.extend_from_slice(&1u32.to_le_bytes());
        elf.extend_from_slice(&(TEXT_VADDR + code_offset as u64).to_le_bytes()); // e_entry
        elf.extend_from_slice(&(EHDR_SIZE as u64).to_le_bytes()); // e_phoff
        elf.extend_from_slice(&0u64.to_le_bytes()); // e_shoff
        elf.extend_from_slice(&0u32.to_le_bytes()); // e_flags
        elf.extend_from_slice(&(EHDR_SIZE as u16).to_le_bytes());
        elf.extend_from_slice(&(PHDR_SIZE as u16).to_le_bytes());
        elf.extend_from_slice(&2u16.to_le_bytes()); // e_phnum
        elf.extend_from_slice(&64u16.to_le_bytes()); // e_shentsize
        elf.extend_from_slice(&0u16.to_le_bytes()); // e_shnum
        elf.extend_from_slice(&0u16.to_le_bytes()); // e_shstrndx

        self.write_phdr(&mut elf, PF_R | PF_X, 0, TEXT_VADDR, image_size, image_size);
        self.write_phdr(&mut elf, PF_R | PF_W, 0, tape_vaddr, 0, tape_size);

        elf.extend_from_slice(code);

        tracing::debug!(bytes = elf.len(), "ELF image written");
        Ok(elf)
    }

    fn write_phdr(
        &self,
        elf: &mut Vec<u8>,
        p_flags: u32,
        p_offset: usize,
        p_vaddr: u64,
        p_filesz: usize,
        p_memsz: usize,
    ) {
        elf.extend_from_slice(&PT_LOAD.to_le_bytes());
        elf.extend_from_slice(&p_flags.to_le_bytes());
        elf.extend_from_slice(&(p_offset as u64).to_le_bytes());
        elf.extend_from_slice(&p_vaddr.to_le_bytes());
        elf.extend_from_slice(&p_vaddr.to_le_bytes());
        elf.extend_from_slice(&(p_filesz as u64).to_le_bytes());
        elf.extend_from_slice(&(p_memsz as u64).to_le_bytes());
        elf.extend_from_slice(&PAGE_SIZE.to_le_bytes());
    }
}

/// Check that `data` looks like an image this writer produced
pub fn validate_elf(data: &[u8]) -> Result<()> {
    if data.len() < ElfWriter::HEADERS_SIZE {
        return Err(Error::codegen("ELF file too small"));
    }

    if data[0..4] != ELF_MAGIC {
        return Err(Error::codegen("Invalid ELF magic"));
    }

    if data[4] != ELFCLASS64 {
        return Err(Error::codegen("Not a 64-bit ELF"));
    }

    let e_type = u16::from_le_bytes([data[16], data[17]]);
    let machine = u16::from_le_bytes([data[18], data[19]]);
    if e_type != ET_EXEC || machine != EM_X86_64 {
        return Err(Error::codegen(format!(
            "Not an x86-64 executable: type={} machine={}",
            e_type, machine
        )));
    }

    Ok(())
}
