//! Artifact shape for both targets

use tapec::compiler::elf::TEXT_VADDR;
use tapec::compiler::x64::TAPE_VADDR;
use tapec::compiler::{validate_elf, ElfWriter};
use tapec::{CompileOptions, CompileResult, Compiler, Language, Target};

fn compile(source: &str, options: CompileOptions) -> CompileResult {
    Compiler::new(options)
        .compile(source, Language::Brainfuck.table())
        .unwrap()
}

fn c_options() -> CompileOptions {
    CompileOptions {
        target: Target::C,
        ..CompileOptions::default()
    }
}

fn u16_at(data: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([data[at], data[at + 1]])
}

fn u64_at(data: &[u8], at: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&data[at..at + 8]);
    u64::from_le_bytes(bytes)
}

#[test]
fn test_elf_header_layout() {
    let elf = compile("++++++++[>+++++++++<-]>.+.", CompileOptions::default()).artifact;
    validate_elf(&elf).unwrap();

    assert_eq!(u16_at(&elf, 16), 2); // ET_EXEC
    assert_eq!(u16_at(&elf, 18), 62); // EM_X86_64
    assert_eq!(u64_at(&elf, 24), TEXT_VADDR + ElfWriter::HEADERS_SIZE as u64);
    assert_eq!(u16_at(&elf, 56), 2); // two program headers
    assert_eq!(u16_at(&elf, 60), 0); // no section headers

    // The materialized literal sits at the end of the image.
    assert!(elf.ends_with(b"HI"));
}

#[test]
fn test_elf_tape_segment() {
    let options = CompileOptions {
        tape_size: 4096,
        ..CompileOptions::default()
    };
    let elf = compile(",[.,]", options).artifact;
    let tape_phdr = 64 + 56;
    assert_eq!(u64_at(&elf, tape_phdr + 16), TAPE_VADDR);
    assert_eq!(u64_at(&elf, tape_phdr + 32), 0);
    assert_eq!(u64_at(&elf, tape_phdr + 40), 4096);
}

#[test]
fn test_oversized_tape_is_rejected() {
    let options = CompileOptions {
        tape_size: usize::MAX,
        ..CompileOptions::default()
    };
    let result = Compiler::new(options).compile("+", Language::Brainfuck.table());
    assert!(matches!(result, Err(tapec::Error::Codegen(_))));
}

#[test]
fn test_space_mode_is_smaller() {
    let source = ",.....................";
    let inline = compile(source, CompileOptions::default()).artifact;
    let counted = compile(
        source,
        CompileOptions {
            optimize_for_space: true,
            ..CompileOptions::default()
        },
    )
    .artifact;
    assert!(counted.len() < inline.len());
}

#[test]
fn test_c_literal_program() {
    let source = String::from_utf8(compile("++++++++[>+++++++++<-]>.+.", c_options()).artifact).unwrap();
    assert!(source.starts_with("#include <stdio.h>\n"));
    assert!(source.contains("static unsigned char tape[300000];"));
    assert!(source.contains("fwrite(\"HI\", 1, 2, stdout);"));
    assert!(!source.contains("while"));
}

#[test]
fn test_c_loops_and_io() {
    let source = String::from_utf8(compile(",[.,]", c_options()).artifact).unwrap();
    assert!(source.contains("    p[0] = (unsigned char)getchar();\n    while"));
    assert!(source.contains("    while (p[0]) {\n        putchar(p[0]);\n        p[0] = (unsigned char)getchar();\n    }\n"));
}

#[test]
fn test_c_counted_repeats() {
    let options = CompileOptions {
        optimize_for_space: true,
        ..c_options()
    };
    let source = String::from_utf8(compile(",.....", options).artifact).unwrap();
    assert!(source.contains("for (unsigned long r0 = 0; r0 < 5UL; r0++) {\n        putchar(tape[0]);\n    }"));
}

// =============================================================================
// RUNNING THE EXECUTABLE
// =============================================================================

#[cfg(all(target_os = "linux", target_arch = "x86_64"))]
mod native {
    use super::*;
    use std::io::Write;
    use std::os::unix::fs::PermissionsExt;
    use std::process::{Command, Output, Stdio};
    use tapec::{interpret, tokenize, IrBuilder};

    const TAPE: usize = 4096;

    /// Output of the program under the reference interpreter, unoptimized
    fn expected(source: &str, input: &[u8]) -> Vec<u8> {
        let stream = tokenize(source, Language::Brainfuck.table()).unwrap();
        let set = IrBuilder::new().build(&stream).unwrap();
        interpret(&set, input, TAPE).unwrap()
    }

    fn execute(elf: &[u8], input: &[u8]) -> Output {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("program");
        std::fs::write(&path, elf).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();

        // Another test thread may still hold the file open across a fork.
        let mut attempts = 0;
        let mut child = loop {
            match Command::new(&path)
                .stdin(Stdio::piped())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .spawn()
            {
                Ok(child) => break child,
                Err(e) if e.raw_os_error() == Some(26) && attempts < 20 => {
                    attempts += 1;
                    std::thread::sleep(std::time::Duration::from_millis(50));
                }
                Err(e) => panic!("failed to run {}: {}", path.display(), e),
            }
        };
        child.stdin.take().unwrap().write_all(input).unwrap();
        child.wait_with_output().unwrap()
    }

    fn assert_runs_like_interpreter(source: &str, input: &[u8]) {
        let want = expected(source, input);
        for (debug_mode, optimize_for_space) in [(false, false), (false, true), (true, false), (true, true)] {
            let options = CompileOptions {
                debug_mode,
                optimize_for_space,
                tape_size: TAPE,
                ..CompileOptions::default()
            };
            let elf = compile(source, options).artifact;
            let output = execute(&elf, input);
            assert_eq!(output.status.code(), Some(0), "{source} debug={debug_mode} space={optimize_for_space}");
            assert_eq!(output.stdout, want, "{source} debug={debug_mode} space={optimize_for_space}");
        }
    }

    #[test]
    fn test_literal_program_runs() {
        assert_runs_like_interpreter("++++++++[>+++++++++<-]>.+.", b"");
    }

    #[test]
    fn test_read_loop_runs() {
        assert_runs_like_interpreter(",+[-.,+]", b"echo\n");
    }

    #[test]
    fn test_multiply_runs() {
        // The source cell is read, so the unrolled loop survives as a multiply.
        assert_runs_like_interpreter(",[->++>+++<<]>.>.<<.", b"!");
        assert_runs_like_interpreter(",[->++>+++<<]>.>.", b"");
        assert_runs_like_interpreter(",-[->++>+++<<]>.>.", b"\x01");
    }

    #[test]
    fn test_tape_starts_zeroed() {
        assert_runs_like_interpreter(">>>>>>.<<<.>>>>>>>>>>[-]+[>,.<-]", b"z");
    }

    #[test]
    fn test_hello_world_runs() {
        let source = "++++++++[>++++[>++>+++>+++>+<<<<-]>+>+>->>+[<]<-]>>.>---.+++++++..+++.>>.<-.<.+++.------.--------.>>+.>++.";
        assert_runs_like_interpreter(source, b"");
        let output = execute(&compile(source, CompileOptions::default()).artifact, b"");
        assert_eq!(output.stdout, b"Hello World!\n");
    }
}
