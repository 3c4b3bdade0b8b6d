//! # tapec - An optimizing compiler for tape languages
//!
//! Compiles programs written for the eight-instruction pointer/tape machine
//! (Brainfuck and its token-substitution dialects such as Ook!) to static
//! x86-64 Linux executables or portable C.
//!
//! ## Quick Start
//!
//! ```rust
//! use tapec::{interpret, CompileOptions, Compiler, Language};
//!
//! # fn main() -> tapec::Result<()> {
//! let source = "++++++++[>+++++++++<-]>.+.";
//! let compiler = Compiler::new(CompileOptions::default());
//!
//! // Lower and optimize without generating code
//! let stream = tapec::tokenize(source, Language::Brainfuck.table())?;
//! let (program, warnings, _) = compiler.lower(&stream)?;
//! assert!(warnings.is_empty());
//!
//! // The reference interpreter runs any stage of the pipeline
//! assert_eq!(interpret(&program, b"", 30_000)?, b"HI");
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! Source → Tokens → Instructions → DIL → Optimized DIL → ELF / C
//! ```
//!
//! ### Main Components
//!
//! - [`TokenTable`] - Bidirectional token/instruction mapping per language
//! - [`IrBuilder`] - Lowers the primitive stream, classifying every loop
//! - [`Optimizer`] - Fixed-point pass pipeline over the DIL
//! - [`Interpreter`] - Reference semantics for any operation set
//! - [`Compiler`] - End-to-end driver over the [`compiler::Backend`]s

/// Version of the tapec compiler
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod compiler;
pub mod error;
pub mod lexer;

// Re-export main types
pub use compiler::{
    interpret, CompileOptions, CompileResult, CompileWarning, Compiler, DilInstruction, Interpreter, IrBuilder,
    OperationSet, OptimizationStats, Optimizer, Target, DEFAULT_TAPE_SIZE,
};
pub use error::{Error, LoopMarker, Result};
pub use lexer::{tokenize, CommentPolicy, Instruction, Language, Scanner, Token, TokenTable};
