use super::instruction::DilInstruction;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordered DIL sequence; the program, or the body of a loop.
///
/// `addresses_resolved` is set once the pointer-movement dependency of the
/// set has been removed. A resolved set contains no `MovePtr` and no `Loop`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationSet {
    pub instructions: Vec<DilInstruction>,
    pub addresses_resolved: bool,
}

impl OperationSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_instructions(instructions: Vec<DilInstruction>) -> Self {
        Self {
            instructions,
            addresses_resolved: false,
        }
    }

    pub fn push(&mut self, instruction: DilInstruction) {
        self.instructions.push(instruction);
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DilInstruction> {
        self.instructions.iter()
    }

    /// True if a `Loop` appears at the top level
    pub fn contains_loop(&self) -> bool {
        self.instructions.iter().any(DilInstruction::is_loop)
    }

    /// Instruction count including every nested loop body
    pub fn deep_len(&self) -> usize {
        self.instructions
            .iter()
            .map(|instruction| match instruction {
                DilInstruction::Loop { body } => 1 + body.deep_len(),
                _ => 1,
            })
            .sum()
    }

    /// Number of loops at any depth
    pub fn loop_count(&self) -> usize {
        self.instructions
            .iter()
            .map(|instruction| match instruction {
                DilInstruction::Loop { body } => 1 + body.loop_count(),
                _ => 0,
            })
            .sum()
    }

    fn fmt_nested(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        for instruction in &self.instructions {
            let indent = "  ".repeat(depth);
            match instruction {
                DilInstruction::Loop { body } => {
                    writeln!(f, "{}loop", indent)?;
                    body.fmt_nested(f, depth + 1)?;
                    writeln!(f, "{}end", indent)?;
                }
                other => writeln!(f, "{}{}", indent, other)?,
            }
        }
        Ok(())
    }
}

impl fmt::Display for OperationSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_nested(f, 0)
    }
}

impl<'a> IntoIterator for &'a OperationSet {
    type Item = &'a DilInstruction;
    type IntoIter = std::slice::Iter<'a, DilInstruction>;

    fn into_iter(self) -> Self::IntoIter {
        self.instructions.iter()
    }
}

impl Extend<DilInstruction> for OperationSet {
    fn extend<I: IntoIterator<Item = DilInstruction>>(&mut self, iter: I) {
        self.instructions.extend(iter);
    }
}

impl FromIterator<DilInstruction> for OperationSet {
    fn from_iter<I: IntoIterator<Item = DilInstruction>>(iter: I) -> Self {
        Self::from_instructions(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nested() -> OperationSet {
        let inner: OperationSet = vec![DilInstruction::add(0, -1)].into_iter().collect();
        vec![
            DilInstruction::add(0, 2),
            DilInstruction::looped(vec![DilInstruction::move_ptr(1), DilInstruction::looped(inner)]
                .into_iter()
                .collect()),
            DilInstruction::write(0),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_counts() {
        let set = nested();
        assert_eq!(set.len(), 3);
        assert_eq!(set.deep_len(), 6);
        assert_eq!(set.loop_count(), 2);
        assert!(set.contains_loop());
        assert!(!set.addresses_resolved);
    }

    #[test]
    fn test_listing_indents_loop_bodies() {
        let listing = nested().to_string();
        assert_eq!(
            listing,
            "add p[+0] +2\nloop\n  move +1\n  loop\n    add p[+0] -1\n  end\nend\nwrite p[+0]\n"
        );
    }
}
