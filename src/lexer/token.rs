use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the eight primitive tape operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Instruction {
    /// Move the cell pointer one cell to the right
    MoveRight,
    /// Move the cell pointer one cell to the left
    MoveLeft,
    /// Increment the current cell (mod 256)
    Increment,
    /// Decrement the current cell (mod 256)
    Decrement,
    /// Write the current cell to standard output
    Write,
    /// Read one byte from standard input into the current cell
    Read,
    /// Jump past the matching `LoopEnd` if the current cell is zero
    LoopStart,
    /// Jump back to the matching `LoopStart` if the current cell is nonzero
    LoopEnd,
}

impl Instruction {
    /// All instructions, in table order
    pub const ALL: [Instruction; 8] = [
        Instruction::MoveRight,
        Instruction::MoveLeft,
        Instruction::Increment,
        Instruction::Decrement,
        Instruction::Write,
        Instruction::Read,
        Instruction::LoopStart,
        Instruction::LoopEnd,
    ];

    /// Canonical name, as accepted in language definition files
    pub fn name(self) -> &'static str {
        match self {
            Instruction::MoveRight => "MoveRight",
            Instruction::MoveLeft => "MoveLeft",
            Instruction::Increment => "Increment",
            Instruction::Decrement => "Decrement",
            Instruction::Write => "Write",
            Instruction::Read => "Read",
            Instruction::LoopStart => "LoopStart",
            Instruction::LoopEnd => "LoopEnd",
        }
    }

    /// True for the two I/O instructions
    pub fn is_io(self) -> bool {
        matches!(self, Instruction::Write | Instruction::Read)
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Instruction {
    type Err = String;

    /// Accepts the canonical names and the short historical aliases
    /// (`IncPtr`, `DecPtr`, `Inc`, `Dec`, `Output`, `Input`, `StartLoop`, `EndLoop`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "MoveRight" | "IncPtr" => Ok(Instruction::MoveRight),
            "MoveLeft" | "DecPtr" => Ok(Instruction::MoveLeft),
            "Increment" | "Inc" => Ok(Instruction::Increment),
            "Decrement" | "Dec" => Ok(Instruction::Decrement),
            "Write" | "Output" => Ok(Instruction::Write),
            "Read" | "Input" => Ok(Instruction::Read),
            "LoopStart" | "StartLoop" => Ok(Instruction::LoopStart),
            "LoopEnd" | "EndLoop" => Ok(Instruction::LoopEnd),
            other => Err(format!("unknown instruction name '{}'", other)),
        }
    }
}

/// A single token recognised in the source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    /// The primitive instruction the token stands for
    pub instruction: Instruction,
    /// Original text of the token, whitespace removed
    pub lexeme: String,
    /// Line number where token appears (1-indexed)
    pub line: usize,
    /// Column number where token starts (1-indexed)
    pub column: usize,
}

impl Token {
    /// Creates a new token with the given properties
    pub fn new(instruction: Instruction, lexeme: String, line: usize, column: usize) -> Self {
        Token {
            instruction,
            lexeme,
            line,
            column,
        }
    }
}
