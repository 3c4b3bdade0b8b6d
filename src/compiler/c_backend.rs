//! Portable C backend.

use super::codegen::{Backend, CellRef};
use crate::error::Result;

/// Emits a single C translation unit
#[derive(Debug, Default)]
pub struct CBackend {
    out: String,
    depth: usize,
    repeat_vars: usize,
}

impl CBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn line(&mut self, text: &str) {
        for _ in 0..self.depth {
            self.out.push_str("    ");
        }
        self.out.push_str(text);
        self.out.push('\n');
    }
}

fn cell(cell: CellRef) -> String {
    match cell {
        CellRef::Relative(offset) => format!("p[{}]", offset),
        CellRef::Absolute(index) => format!("tape[{}]", index),
    }
}

/// C string literal body; octal escapes keep it free of trigraphs and
/// never swallow a following digit
fn escape(text: &[u8]) -> String {
    let mut escaped = String::with_capacity(text.len());
    for &byte in text {
        match byte {
            0x20..=0x7e if !matches!(byte, b'"' | b'\\' | b'?') => escaped.push(byte as char),
            _ => escaped.push_str(&format!("\\{:03o}", byte)),
        }
    }
    escaped
}

impl Backend for CBackend {
    type Label = ();
    type Output = String;

    fn declare_tape(&mut self, size: usize) -> Result<()> {
        self.out.push_str("#include <stdio.h>\n\n");
        self.out.push_str(&format!("static unsigned char tape[{}];\n\n", size));
        self.out.push_str("int main(void)\n{\n");
        self.depth = 1;
        Ok(())
    }

    fn declare_pointer(&mut self) -> Result<()> {
        self.line("unsigned char *p = tape;");
        Ok(())
    }

    fn move_pointer(&mut self, delta: i64) -> Result<()> {
        match delta {
            0 => {}
            d if d > 0 => self.line(&format!("p += {};", d)),
            d => self.line(&format!("p -= {};", d.unsigned_abs())),
        }
        Ok(())
    }

    fn add_at(&mut self, target: CellRef, amount: i32) -> Result<()> {
        let text = if amount < 0 {
            format!("{} -= {};", cell(target), amount.unsigned_abs())
        } else {
            format!("{} += {};", cell(target), amount)
        };
        self.line(&text);
        Ok(())
    }

    fn assign_at(&mut self, target: CellRef, value: u8) -> Result<()> {
        self.line(&format!("{} = {};", cell(target), value));
        Ok(())
    }

    fn multiply_accumulate(&mut self, target: CellRef, source: CellRef, factor: i32) -> Result<()> {
        let (target, source) = (cell(target), cell(source));
        let update = match factor {
            1 => format!("{} += {};", target, source),
            -1 => format!("{} -= {};", target, source),
            f => format!("{} += {} * ({});", target, source, f),
        };
        // A zero source never touches the target.
        self.line(&format!("if ({}) {}", source, update));
        Ok(())
    }

    fn write_literal(&mut self, text: &[u8]) -> Result<()> {
        if !text.is_empty() {
            self.line(&format!("fwrite(\"{}\", 1, {}, stdout);", escape(text), text.len()));
        }
        Ok(())
    }

    fn read_into(&mut self, target: CellRef) -> Result<()> {
        // EOF (-1) converts to 255
        self.line(&format!("{} = (unsigned char)getchar();", cell(target)));
        Ok(())
    }

    fn write_from(&mut self, source: CellRef) -> Result<()> {
        self.line(&format!("putchar({});", cell(source)));
        Ok(())
    }

    fn open_loop(&mut self) -> Result<()> {
        self.line("while (p[0]) {");
        self.depth += 1;
        Ok(())
    }

    fn close_loop(&mut self, _label: ()) -> Result<()> {
        self.depth = self.depth.saturating_sub(1);
        self.line("}");
        Ok(())
    }

    fn open_repeat(&mut self, count: u32) -> Result<()> {
        let var = format!("r{}", self.repeat_vars);
        self.repeat_vars += 1;
        self.line(&format!("for (unsigned long {v} = 0; {v} < {}UL; {v}++) {{", count, v = var));
        self.depth += 1;
        Ok(())
    }

    fn close_repeat(&mut self, _label: ()) -> Result<()> {
        self.close_loop(())
    }

    fn finish(mut self) -> Result<String> {
        self.line("fflush(stdout);");
        self.line("return 0;");
        self.out.push_str("}\n");
        Ok(self.out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::codegen::CodeGenerator;
    use crate::compiler::ir::{DilInstruction, OperationSet};

    #[test]
    fn test_escape() {
        assert_eq!(escape(b"Hi!\n"), "Hi!\\012");
        assert_eq!(escape(b"a\"b\\c?"), "a\\042b\\134c\\077");
        assert_eq!(escape(&[0xFF, b'7']), "\\3777");
    }

    #[test]
    fn test_translation_unit() {
        let body = OperationSet::from_instructions(vec![
            DilInstruction::add(0, -1),
            DilInstruction::multiply(1, 0, 3),
        ]);
        let set = OperationSet::from_instructions(vec![
            DilInstruction::read(0),
            DilInstruction::looped(body),
            DilInstruction::move_ptr(1),
            DilInstruction::write(0),
        ]);
        let (source, _) = CodeGenerator::new(CBackend::new(), 100).emit(&set).unwrap();
        assert_eq!(
            source,
            "#include <stdio.h>\n\
             \n\
             static unsigned char tape[100];\n\
             \n\
             int main(void)\n\
             {\n\
             \x20   unsigned char *p = tape;\n\
             \x20   p[0] = (unsigned char)getchar();\n\
             \x20   while (p[0]) {\n\
             \x20       p[0] -= 1;\n\
             \x20       if (p[0]) p[1] += p[0] * (3);\n\
             \x20   }\n\
             \x20   p += 1;\n\
             \x20   putchar(p[0]);\n\
             \x20   fflush(stdout);\n\
             \x20   return 0;\n\
             }\n"
        );
    }

    #[test]
    fn test_repeat_blocks() {
        let set = OperationSet::from_instructions(vec![DilInstruction::Write {
            offset: 0,
            repeat: 4,
            address: None,
        }]);
        let (source, _) = CodeGenerator::new(CBackend::new(), 8)
            .with_optimize_for_space(true)
            .emit(&set)
            .unwrap();
        assert!(source.contains("for (unsigned long r0 = 0; r0 < 4UL; r0++) {\n        putchar(p[0]);\n    }\n"));
    }
}
