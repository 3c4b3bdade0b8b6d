use super::table::{CommentPolicy, TokenTable};
use super::token::{Instruction, Token};
use crate::error::{Error, Result};

/// Scanner turning source text into tokens of a [`TokenTable`]
pub struct Scanner<'t> {
    /// Source code as character vector
    source: Vec<char>,
    /// Vocabulary of the language being scanned
    table: &'t TokenTable,
    /// Accumulated tokens
    tokens: Vec<Token>,
    /// Current position in source
    current: usize,
    /// Current line number (1-indexed)
    line: usize,
    /// Current column number (1-indexed)
    column: usize,
}

impl<'t> Scanner<'t> {
    /// Creates a new scanner over `source` using `table`
    pub fn new(source: &str, table: &'t TokenTable) -> Self {
        Scanner {
            source: source.chars().collect(),
            table,
            tokens: Vec::new(),
            current: 0,
            line: 1,
            column: 1,
        }
    }

    /// Scans all tokens from source code and returns them as a vector
    pub fn scan_tokens(&mut self) -> Result<Vec<Token>> {
        while !self.is_at_end() {
            if self.source[self.current].is_whitespace() {
                self.advance();
                continue;
            }
            self.scan_token()?;
        }

        Ok(std::mem::take(&mut self.tokens))
    }

    /// Scans and keeps only the primitive instructions
    pub fn scan_instructions(&mut self) -> Result<Vec<Instruction>> {
        Ok(self
            .scan_tokens()?
            .into_iter()
            .map(|token| token.instruction)
            .collect())
    }

    fn scan_token(&mut self) -> Result<()> {
        let (line, column) = (self.line, self.column);
        let mut lexeme = String::new();
        let mut pos = self.current;

        // Whitespace may split a multi-character token; accept the shortest match.
        let matched = loop {
            let Some(&c) = self.source.get(pos) else {
                break None;
            };
            pos += 1;
            if c.is_whitespace() {
                continue;
            }

            lexeme.push(c);
            if let Some(instruction) = self.table.instruction(&lexeme) {
                break Some(instruction);
            }
            if !self.table.is_prefix(&lexeme) {
                break None;
            }
        };

        match matched {
            Some(instruction) => {
                while self.current < pos {
                    self.advance();
                }
                self.tokens.push(Token::new(instruction, lexeme, line, column));
                Ok(())
            }
            None => match self.table.policy() {
                CommentPolicy::Ignore => {
                    self.advance();
                    Ok(())
                }
                CommentPolicy::Reject => Err(Error::UnknownToken {
                    segment: lexeme,
                    line,
                    column,
                }),
            },
        }
    }

    fn advance(&mut self) -> char {
        let c = self.source[self.current];
        self.current += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        c
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.source.len()
    }
}

/// Tokenize `source` with `table` into a flat primitive stream
pub fn tokenize(source: &str, table: &TokenTable) -> Result<Vec<Instruction>> {
    Scanner::new(source, table).scan_instructions()
}
