//! # Dense Intermediate Language (DIL)
//!
//! The optimizer's working form of a program.
//!
//! ```text
//! ir/
//! ├── mod.rs            # This file - module definition and re-exports
//! ├── instruction.rs    # DilInstruction, Address, wrap()
//! ├── operation_set.rs  # OperationSet (program or loop body)
//! └── builder.rs        # IrBuilder: primitive stream -> OperationSet
//! ```
//!
//! Cell arithmetic is modulo 256 throughout; amounts and factors are kept
//! sign-normalised so that equal effects compare equal.

mod builder;
mod instruction;
mod operation_set;

pub use builder::{CompileWarning, IrBuilder};
pub use instruction::{wrap, Address, DilInstruction};
pub use operation_set::OperationSet;
