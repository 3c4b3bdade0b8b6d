//! Token tables: the bidirectional token <-> instruction mapping of a language

use super::token::Instruction;
use crate::error::{Error, Result};
use lazy_static::lazy_static;
use std::collections::HashMap;
use std::path::Path;

/// What the scanner does with text that cannot start any token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentPolicy {
    /// Skip it as commentary
    Ignore,
    /// Fail with an unknown-token error
    Reject,
}

/// One-to-one mapping between source tokens and primitive instructions
#[derive(Debug, Clone)]
pub struct TokenTable {
    by_token: HashMap<String, Instruction>,
    by_instruction: HashMap<Instruction, String>,
    policy: CommentPolicy,
    max_token_len: usize,
}

impl TokenTable {
    /// Create an empty table
    pub fn new(policy: CommentPolicy) -> Self {
        Self {
            by_token: HashMap::new(),
            by_instruction: HashMap::new(),
            policy,
            max_token_len: 0,
        }
    }

    fn from_pairs(pairs: &[(&str, Instruction)], policy: CommentPolicy) -> Self {
        let mut table = Self::new(policy);
        for (token, instruction) in pairs {
            table.by_token.insert(token.to_string(), *instruction);
            table.by_instruction.insert(*instruction, token.to_string());
            table.max_token_len = table.max_token_len.max(token.chars().count());
        }
        table
    }

    /// Add a mapping. Both sides must be unused, and the token must not be empty.
    pub fn insert(&mut self, token: &str, instruction: Instruction) -> std::result::Result<(), String> {
        if token.is_empty() {
            return Err("empty token".to_string());
        }
        if let Some(existing) = self.by_token.get(token) {
            return Err(format!("token '{}' is already mapped to {}", token, existing));
        }
        if let Some(existing) = self.by_instruction.get(&instruction) {
            return Err(format!("{} is already mapped to '{}'", instruction, existing));
        }

        self.by_token.insert(token.to_string(), instruction);
        self.by_instruction.insert(instruction, token.to_string());
        self.max_token_len = self.max_token_len.max(token.chars().count());
        Ok(())
    }

    /// Parse a language definition: one `InstructionName token` pair per line.
    ///
    /// The line is split on its first space; whitespace inside the token is
    /// dropped because the scanner never sees it.
    pub fn parse_definition(text: &str) -> Result<Self> {
        let mut table = Self::new(CommentPolicy::Reject);

        for (idx, raw) in text.lines().enumerate() {
            let line_no = idx + 1;
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }

            let (name, token) = line
                .split_once(' ')
                .ok_or_else(|| Error::token_table(line_no, "expected '<instruction> <token>'"))?;
            let instruction: Instruction = name
                .parse()
                .map_err(|msg: String| Error::token_table(line_no, msg))?;
            let token: String = token.chars().filter(|c| !c.is_whitespace()).collect();

            table
                .insert(&token, instruction)
                .map_err(|msg| Error::token_table(line_no, msg))?;
        }

        if table.is_empty() {
            return Err(Error::token_table(0, "definition declares no tokens"));
        }

        Ok(table)
    }

    /// Instruction for an exact token
    pub fn instruction(&self, token: &str) -> Option<Instruction> {
        self.by_token.get(token).copied()
    }

    /// Token for an instruction
    pub fn token(&self, instruction: Instruction) -> Option<&str> {
        self.by_instruction.get(&instruction).map(String::as_str)
    }

    /// True when some token starts with `text`
    pub fn is_prefix(&self, text: &str) -> bool {
        self.by_token.keys().any(|token| token.starts_with(text))
    }

    /// Length in characters of the longest token
    pub fn max_token_len(&self) -> usize {
        self.max_token_len
    }

    /// Comment handling of this table
    pub fn policy(&self) -> CommentPolicy {
        self.policy
    }

    /// Number of mapped tokens
    pub fn len(&self) -> usize {
        self.by_token.len()
    }

    /// True when no token is mapped
    pub fn is_empty(&self) -> bool {
        self.by_token.is_empty()
    }

    /// Render a primitive stream back to source text in this language.
    ///
    /// Returns `None` if the table lacks a token for one of the instructions.
    pub fn render(&self, stream: &[Instruction]) -> Option<String> {
        let separator = if self.max_token_len > 1 { " " } else { "" };
        let tokens = stream
            .iter()
            .map(|instruction| self.token(*instruction))
            .collect::<Option<Vec<_>>>()?;
        Some(tokens.join(separator))
    }
}

lazy_static! {
    static ref BRAINFUCK: TokenTable = TokenTable::from_pairs(
        &[
            (">", Instruction::MoveRight),
            ("<", Instruction::MoveLeft),
            ("+", Instruction::Increment),
            ("-", Instruction::Decrement),
            (".", Instruction::Write),
            (",", Instruction::Read),
            ("[", Instruction::LoopStart),
            ("]", Instruction::LoopEnd),
        ],
        CommentPolicy::Ignore,
    );
    static ref OOK: TokenTable = TokenTable::from_pairs(
        &[
            ("Ook.Ook?", Instruction::MoveRight),
            ("Ook?Ook.", Instruction::MoveLeft),
            ("Ook.Ook.", Instruction::Increment),
            ("Ook!Ook!", Instruction::Decrement),
            ("Ook!Ook.", Instruction::Write),
            ("Ook.Ook!", Instruction::Read),
            ("Ook!Ook?", Instruction::LoopStart),
            ("Ook?Ook!", Instruction::LoopEnd),
        ],
        CommentPolicy::Reject,
    );
    static ref SHORT_OOK: TokenTable = TokenTable::from_pairs(
        &[
            (".?", Instruction::MoveRight),
            ("?.", Instruction::MoveLeft),
            ("..", Instruction::Increment),
            ("!!", Instruction::Decrement),
            ("!.", Instruction::Write),
            (".!", Instruction::Read),
            ("!?", Instruction::LoopStart),
            ("?!", Instruction::LoopEnd),
        ],
        CommentPolicy::Reject,
    );
}

/// Built-in languages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    /// The classic symbolic form
    Brainfuck,
    /// Ook! (word pairs)
    Ook,
    /// Ook! with the `Ook` words dropped
    ShortOok,
}

impl Language {
    /// Resolve a language by name
    pub fn from_name(name: &str) -> Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "bf" | "brainfuck" => Ok(Language::Brainfuck),
            "ook" => Ok(Language::Ook),
            "sook" | "short-ook" | "shortook" => Ok(Language::ShortOok),
            _ => Err(Error::UnsupportedLanguage {
                name: name.to_string(),
            }),
        }
    }

    /// Resolve a language from a source file extension
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|ext| ext.to_str())
            .ok_or_else(|| Error::UnsupportedLanguage {
                name: path.display().to_string(),
            })?;
        Self::from_name(ext)
    }

    /// Token table of the language
    pub fn table(self) -> &'static TokenTable {
        match self {
            Language::Brainfuck => &BRAINFUCK,
            Language::Ook => &OOK,
            Language::ShortOok => &SHORT_OOK,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_tables_are_complete() {
        for language in [Language::Brainfuck, Language::Ook, Language::ShortOok] {
            let table = language.table();
            assert_eq!(table.len(), 8);
            for instruction in Instruction::ALL {
                let token = table.token(instruction).unwrap();
                assert_eq!(table.instruction(token), Some(instruction));
            }
        }
    }

    #[test]
    fn test_language_from_path() {
        assert_eq!(Language::from_path(Path::new("hello.bf")).unwrap(), Language::Brainfuck);
        assert_eq!(Language::from_path(Path::new("x.OOK")).unwrap(), Language::Ook);
        assert_eq!(Language::from_path(Path::new("x.sook")).unwrap(), Language::ShortOok);
        assert!(matches!(
            Language::from_path(Path::new("x.txt")),
            Err(Error::UnsupportedLanguage { .. })
        ));
        assert!(Language::from_path(Path::new("noext")).is_err());
    }

    #[test]
    fn test_parse_definition() {
        let def = "MoveRight moo\nMoveLeft oom\n\nInc MOO\nDec OOM\nOutput m o o!\n";
        let table = TokenTable::parse_definition(def).unwrap();
        assert_eq!(table.len(), 5);
        assert_eq!(table.instruction("moo"), Some(Instruction::MoveRight));
        assert_eq!(table.instruction("MOO"), Some(Instruction::Increment));
        assert_eq!(table.token(Instruction::Write), Some("moo!"));
        assert_eq!(table.token(Instruction::Read), None);
        assert_eq!(table.max_token_len(), 4);
        assert_eq!(table.policy(), CommentPolicy::Reject);
    }

    #[test]
    fn test_parse_definition_errors() {
        let err = TokenTable::parse_definition("MoveRight a\nJump b\n").unwrap_err();
        assert!(matches!(err, Error::InvalidTokenTable { line: 2, .. }));

        let err = TokenTable::parse_definition("MoveRight a\nMoveLeft a\n").unwrap_err();
        assert!(matches!(err, Error::InvalidTokenTable { line: 2, .. }));

        let err = TokenTable::parse_definition("MoveRight\n").unwrap_err();
        assert!(matches!(err, Error::InvalidTokenTable { line: 1, .. }));

        let err = TokenTable::parse_definition("\n\n").unwrap_err();
        assert!(matches!(err, Error::InvalidTokenTable { line: 0, .. }));
    }

    #[test]
    fn test_render() {
        let stream = [Instruction::Increment, Instruction::LoopStart, Instruction::LoopEnd];
        assert_eq!(Language::Brainfuck.table().render(&stream).unwrap(), "+[]");
        assert_eq!(
            Language::Ook.table().render(&stream).unwrap(),
            "Ook.Ook. Ook!Ook? Ook?Ook!"
        );
    }
}
