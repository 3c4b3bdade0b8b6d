//! DIL instruction definitions

use super::operation_set::OperationSet;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Statically resolved absolute tape index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address(pub usize);

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

/// Reduce a cell quantity to its mod-256 class, sign-normalised to `-128..=127`
pub fn wrap(value: i64) -> i32 {
    value.rem_euclid(256) as u8 as i8 as i32
}

/// Instruction of the optimizer's intermediate language.
///
/// `offset` fields are relative to the pointer at entry to the enclosing
/// straight-line region. Once an `address` is present the instruction no
/// longer depends on the pointer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DilInstruction {
    /// cell += amount
    Add {
        offset: i64,
        amount: i32,
        address: Option<Address>,
    },
    /// cell = value
    Assign {
        offset: i64,
        value: u8,
        address: Option<Address>,
    },
    /// target += source * factor
    Multiply {
        /// Target cell offset
        offset: i64,
        /// Source cell offset
        source: i64,
        factor: i32,
        source_address: Option<Address>,
        target_address: Option<Address>,
    },
    /// pointer += delta
    MovePtr { delta: i64 },
    /// Write the cell `repeat` times
    Write {
        offset: i64,
        repeat: u32,
        address: Option<Address>,
    },
    /// Read `repeat` bytes into the cell; the last one sticks
    Read {
        offset: i64,
        repeat: u32,
        address: Option<Address>,
    },
    /// Write a known byte string
    WriteLiteral { text: Vec<u8> },
    /// Run the body while the cell under the pointer is nonzero
    Loop { body: OperationSet },
}

impl DilInstruction {
    /// `Add` at a pointer-relative offset
    pub fn add(offset: i64, amount: i64) -> Self {
        DilInstruction::Add {
            offset,
            amount: wrap(amount),
            address: None,
        }
    }

    /// `Assign` at a pointer-relative offset
    pub fn assign(offset: i64, value: u8) -> Self {
        DilInstruction::Assign {
            offset,
            value,
            address: None,
        }
    }

    /// `Multiply` between two pointer-relative cells
    pub fn multiply(offset: i64, source: i64, factor: i64) -> Self {
        DilInstruction::Multiply {
            offset,
            source,
            factor: wrap(factor),
            source_address: None,
            target_address: None,
        }
    }

    pub fn move_ptr(delta: i64) -> Self {
        DilInstruction::MovePtr { delta }
    }

    pub fn write(offset: i64) -> Self {
        DilInstruction::Write {
            offset,
            repeat: 1,
            address: None,
        }
    }

    pub fn read(offset: i64) -> Self {
        DilInstruction::Read {
            offset,
            repeat: 1,
            address: None,
        }
    }

    pub fn write_literal(text: impl Into<Vec<u8>>) -> Self {
        DilInstruction::WriteLiteral { text: text.into() }
    }

    pub fn looped(body: OperationSet) -> Self {
        DilInstruction::Loop { body }
    }

    /// True for `Read`, `Write` and `WriteLiteral`
    pub fn is_io(&self) -> bool {
        matches!(
            self,
            DilInstruction::Write { .. } | DilInstruction::Read { .. } | DilInstruction::WriteLiteral { .. }
        )
    }

    pub fn is_loop(&self) -> bool {
        matches!(self, DilInstruction::Loop { .. })
    }

    /// True once every cell the instruction touches has a resolved address
    pub fn is_resolved(&self) -> bool {
        match self {
            DilInstruction::Add { address, .. }
            | DilInstruction::Assign { address, .. }
            | DilInstruction::Write { address, .. }
            | DilInstruction::Read { address, .. } => address.is_some(),
            DilInstruction::Multiply {
                source_address,
                target_address,
                ..
            } => source_address.is_some() && target_address.is_some(),
            DilInstruction::WriteLiteral { .. } => true,
            DilInstruction::MovePtr { .. } | DilInstruction::Loop { .. } => false,
        }
    }

    /// Same instruction, with every relative offset moved by `by`
    pub fn shifted(&self, by: i64) -> Self {
        let mut shifted = self.clone();
        match &mut shifted {
            DilInstruction::Add { offset, .. }
            | DilInstruction::Assign { offset, .. }
            | DilInstruction::Write { offset, .. }
            | DilInstruction::Read { offset, .. } => *offset += by,
            DilInstruction::Multiply { offset, source, .. } => {
                *offset += by;
                *source += by;
            }
            DilInstruction::MovePtr { .. }
            | DilInstruction::WriteLiteral { .. }
            | DilInstruction::Loop { .. } => {}
        }
        shifted
    }

    /// Same instruction with addresses resolved against a pointer at `base`.
    ///
    /// Returns `None` if a resolved cell falls outside `0..tape_size`, or for
    /// instructions that have no pointer-independent form.
    pub fn resolved(&self, base: i64, tape_size: usize) -> Option<Self> {
        let resolve = |offset: i64, existing: Option<Address>| -> Option<Address> {
            if existing.is_some() {
                return existing;
            }
            let index = usize::try_from(base.checked_add(offset)?).ok()?;
            (index < tape_size).then_some(Address(index))
        };

        let resolved = match self {
            DilInstruction::Add {
                offset,
                amount,
                address,
            } => DilInstruction::Add {
                offset: *offset,
                amount: *amount,
                address: Some(resolve(*offset, *address)?),
            },
            DilInstruction::Assign {
                offset,
                value,
                address,
            } => DilInstruction::Assign {
                offset: *offset,
                value: *value,
                address: Some(resolve(*offset, *address)?),
            },
            DilInstruction::Multiply {
                offset,
                source,
                factor,
                source_address,
                target_address,
            } => DilInstruction::Multiply {
                offset: *offset,
                source: *source,
                factor: *factor,
                source_address: Some(resolve(*source, *source_address)?),
                target_address: Some(resolve(*offset, *target_address)?),
            },
            DilInstruction::Write {
                offset,
                repeat,
                address,
            } => DilInstruction::Write {
                offset: *offset,
                repeat: *repeat,
                address: Some(resolve(*offset, *address)?),
            },
            DilInstruction::Read {
                offset,
                repeat,
                address,
            } => DilInstruction::Read {
                offset: *offset,
                repeat: *repeat,
                address: Some(resolve(*offset, *address)?),
            },
            DilInstruction::WriteLiteral { .. } => self.clone(),
            DilInstruction::MovePtr { .. } | DilInstruction::Loop { .. } => return None,
        };
        Some(resolved)
    }
}

fn cell(offset: i64, address: Option<Address>) -> String {
    match address {
        Some(address) => address.to_string(),
        None => format!("p[{:+}]", offset),
    }
}

fn times(repeat: u32) -> String {
    if repeat > 1 {
        format!(" x{}", repeat)
    } else {
        String::new()
    }
}

impl fmt::Display for DilInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DilInstruction::Add {
                offset,
                amount,
                address,
            } => write!(f, "add {} {:+}", cell(*offset, *address), amount),
            DilInstruction::Assign {
                offset,
                value,
                address,
            } => write!(f, "set {} {}", cell(*offset, *address), value),
            DilInstruction::Multiply {
                offset,
                source,
                factor,
                source_address,
                target_address,
            } => write!(
                f,
                "mul {} += {} * {}",
                cell(*offset, *target_address),
                cell(*source, *source_address),
                factor
            ),
            DilInstruction::MovePtr { delta } => write!(f, "move {:+}", delta),
            DilInstruction::Write {
                offset,
                repeat,
                address,
            } => write!(f, "write {}{}", cell(*offset, *address), times(*repeat)),
            DilInstruction::Read {
                offset,
                repeat,
                address,
            } => write!(f, "read {}{}", cell(*offset, *address), times(*repeat)),
            DilInstruction::WriteLiteral { text } => {
                write!(f, "literal {:?}", String::from_utf8_lossy(text))
            }
            DilInstruction::Loop { body } => write!(f, "loop ({} ops)", body.len()),
        }
    }
}
