//! Token source for tapec
//!
//! Converts source text into a flat stream of primitive tape instructions using
//! a pluggable, bidirectional token table.

mod scanner;
mod table;
mod token;

pub use scanner::{tokenize, Scanner};
pub use table::{CommentPolicy, Language, TokenTable};
pub use token::{Instruction, Token};
