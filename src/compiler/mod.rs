//! # tapec Compiler - tape languages to native code
//!
//! ## Architecture
//!
//! ```text
//! Source → Tokens → DIL (IR Builder + Loop Analyzer) → Optimize → Backend
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! use tapec::compiler::{Compiler, CompileOptions};
//! use tapec::Language;
//!
//! let compiler = Compiler::new(CompileOptions::default());
//! let result = compiler.compile("++++++++[>+++++++++<-]>.", Language::Brainfuck.table())?;
//! std::fs::write("hello", result.artifact)?;
//! ```

pub mod c_backend;
pub mod codegen;
pub mod elf;
pub mod interpreter;
pub mod ir;
pub mod loop_analyzer;
pub mod optimizer;
pub mod walk;
pub mod x64;

pub use c_backend::CBackend;
pub use codegen::{Backend, CellRef, CodeGenerator};
pub use elf::{validate_elf, ElfWriter};
pub use interpreter::{interpret, Interpreter};
pub use ir::{Address, CompileWarning, DilInstruction, IrBuilder, OperationSet};
pub use loop_analyzer::{classify, Loop};
pub use optimizer::{OptimizationStats, Optimizer};
pub use walk::{walk, CellEffect, SideEffect, WalkResult};
pub use x64::X64Backend;

use crate::error::Result;
use crate::lexer::{tokenize, Instruction, TokenTable};

/// Tape size of the historical runtime
pub const DEFAULT_TAPE_SIZE: usize = 300_000;

/// Output artifact kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Target {
    /// Static x86-64 Linux executable
    #[default]
    Elf,
    /// C source file
    C,
}

/// Compilation options
#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// Skip the optimizer; translate each primitive directly
    pub debug_mode: bool,
    /// Emit counted runtime loops for repeated primitives
    pub optimize_for_space: bool,
    /// Tape size in cells
    pub tape_size: usize,
    /// Artifact kind
    pub target: Target,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            debug_mode: false,
            optimize_for_space: false,
            tape_size: DEFAULT_TAPE_SIZE,
            target: Target::Elf,
        }
    }
}

/// Compilation result with metadata
#[derive(Debug)]
pub struct CompileResult {
    /// Executable image or C source, depending on the target
    pub artifact: Vec<u8>,
    /// Final operation set handed to the backend
    pub program: OperationSet,
    /// Warnings generated during compilation
    pub warnings: Vec<CompileWarning>,
    /// Number of primitive instructions in the source
    pub primitive_count: usize,
    /// Number of DIL instructions after optimization, loop bodies included
    pub instruction_count: usize,
    /// Optimizer activity (all zero in debug mode)
    pub stats: OptimizationStats,
}

/// Tape language compiler
pub struct Compiler {
    options: CompileOptions,
}

impl Compiler {
    /// Create a new compiler with options
    pub fn new(options: CompileOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    /// Compile source text written in the language of `table`
    pub fn compile(&self, source: &str, table: &TokenTable) -> Result<CompileResult> {
        // Phase 1: Tokenize
        let stream = tokenize(source, table)?;
        self.compile_stream(&stream)
    }

    /// Compile an already tokenized primitive stream
    pub fn compile_stream(&self, stream: &[Instruction]) -> Result<CompileResult> {
        // Phases 2-3: Lower and optimize
        let (program, warnings, stats) = self.lower(stream)?;

        // Phase 4: Generate code
        let (artifact, primitives) = match self.options.target {
            Target::Elf => self.generator(X64Backend::new()?).emit(&program)?,
            Target::C => {
                let (source, primitives) = self.generator(CBackend::new()).emit(&program)?;
                (source.into_bytes(), primitives)
            }
        };

        tracing::debug!(
            target = ?self.options.target,
            primitives = stream.len(),
            instructions = program.deep_len(),
            emitted = primitives,
            bytes = artifact.len(),
            "compilation finished"
        );

        Ok(CompileResult {
            artifact,
            instruction_count: program.deep_len(),
            program,
            warnings,
            primitive_count: stream.len(),
            stats,
        })
    }

    /// Lower a stream to DIL and optimize it unless in debug mode
    pub fn lower(&self, stream: &[Instruction]) -> Result<(OperationSet, Vec<CompileWarning>, OptimizationStats)> {
        let mut builder = IrBuilder::new();
        let mut program = builder.build(stream)?;

        let stats = if self.options.debug_mode {
            OptimizationStats::default()
        } else {
            Optimizer::new(self.options.tape_size).optimize(&mut program)
        };

        Ok((program, builder.into_warnings(), stats))
    }

    fn generator<B: Backend>(&self, backend: B) -> CodeGenerator<B> {
        CodeGenerator::new(backend, self.options.tape_size).with_optimize_for_space(self.options.optimize_for_space)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Language;

    fn compile(source: &str, options: CompileOptions) -> CompileResult {
        Compiler::new(options)
            .compile(source, Language::Brainfuck.table())
            .unwrap()
    }

    #[test]
    fn test_compile_elf() {
        let result = compile("++++++++[>+++++++++<-]>.", CompileOptions::default());
        validate_elf(&result.artifact).unwrap();
        assert_eq!(result.primitive_count, 24);
        assert_eq!(result.program.instructions, vec![DilInstruction::write_literal(b"H".to_vec())]);
        assert_eq!(result.instruction_count, 1);
        assert!(result.stats.cycles > 1);
    }

    #[test]
    fn test_debug_mode_skips_optimizer() {
        let options = CompileOptions {
            debug_mode: true,
            ..CompileOptions::default()
        };
        let result = compile("+++[-].", options);
        assert_eq!(result.instruction_count, 6);
        assert_eq!(result.stats, OptimizationStats::default());
    }

    #[test]
    fn test_compile_c() {
        let options = CompileOptions {
            target: Target::C,
            tape_size: 64,
            ..CompileOptions::default()
        };
        let result = compile(",[.,]", options);
        let source = String::from_utf8(result.artifact).unwrap();
        assert!(source.contains("static unsigned char tape[64];"));
        assert!(source.contains("while (p[0]) {"));
    }

    #[test]
    fn test_warnings_are_reported() {
        let result = compile("+[]", CompileOptions::default());
        assert_eq!(result.warnings, vec![CompileWarning::InfiniteLoopPattern { index: 1 }]);
    }
}
