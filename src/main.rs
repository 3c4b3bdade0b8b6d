use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::path::{Path, PathBuf};
use tapec::{CompileOptions, Compiler, Language, Target, TokenTable, DEFAULT_TAPE_SIZE};

#[derive(Parser)]
#[command(name = "tapec")]
#[command(about = "Optimizing compiler for Brainfuck, Ook! and custom tape languages")]
#[command(version = tapec::VERSION)]
struct Cli {
    /// Source file to compile
    source: PathBuf,

    /// Output file (default: the source name without extension, `.c` for C)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Source language (bf, ook, sook); inferred from the extension otherwise
    #[arg(short, long)]
    language: Option<String>,

    /// Language definition file, one `Instruction token` pair per line
    #[arg(long, value_name = "FILE")]
    definition: Option<PathBuf>,

    /// Emit counted runtime loops for repeated instructions
    #[arg(short = 's', long)]
    optimize_for_space: bool,

    /// Skip the optimizer
    #[arg(short, long)]
    debug: bool,

    /// Artifact kind
    #[arg(long, value_enum, default_value_t = TargetArg::Elf)]
    target: TargetArg,

    /// Tape size in cells
    #[arg(long, default_value_t = DEFAULT_TAPE_SIZE)]
    tape_size: usize,

    /// Print the final operation set as JSON instead of writing an artifact
    #[arg(long)]
    emit_ir: bool,

    /// Log compilation phases
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum TargetArg {
    /// Static x86-64 Linux executable
    Elf,
    /// C source
    C,
}

impl From<TargetArg> for Target {
    fn from(arg: TargetArg) -> Self {
        match arg {
            TargetArg::Elf => Target::Elf,
            TargetArg::C => Target::C,
        }
    }
}

fn main() {
    let cli = Cli::parse();

    // tracing events reach env_logger through the `log` feature
    let default_level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    if let Err(e) = run(&cli) {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    let source = std::fs::read_to_string(&cli.source)
        .with_context(|| format!("failed to read {}", cli.source.display()))?;

    let custom;
    let table: &TokenTable = match &cli.definition {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read definition {}", path.display()))?;
            custom = TokenTable::parse_definition(&text)
                .with_context(|| format!("invalid definition {}", path.display()))?;
            &custom
        }
        None => match &cli.language {
            Some(name) => Language::from_name(name)?.table(),
            None => Language::from_path(&cli.source)?.table(),
        },
    };

    let options = CompileOptions {
        debug_mode: cli.debug,
        optimize_for_space: cli.optimize_for_space,
        tape_size: cli.tape_size,
        target: cli.target.into(),
    };
    let compiler = Compiler::new(options);

    if cli.emit_ir {
        let stream = tapec::tokenize(&source, table)?;
        let (program, _, _) = compiler.lower(&stream)?;
        println!("{}", serde_json::to_string_pretty(&program)?);
        return Ok(());
    }

    let result = compiler
        .compile(&source, table)
        .with_context(|| format!("failed to compile {}", cli.source.display()))?;

    let output = cli
        .output
        .clone()
        .unwrap_or_else(|| default_output(&cli.source, compiler.options().target));
    std::fs::write(&output, &result.artifact)
        .with_context(|| format!("failed to write {}", output.display()))?;

    if compiler.options().target == Target::Elf {
        mark_executable(&output)?;
    }

    tracing::info!(
        output = %output.display(),
        primitives = result.primitive_count,
        instructions = result.instruction_count,
        warnings = result.warnings.len(),
        bytes = result.artifact.len(),
        "compiled"
    );
    Ok(())
}

fn default_output(source: &Path, target: Target) -> PathBuf {
    let mut output = match target {
        Target::Elf => source.with_extension(""),
        Target::C => source.with_extension("c"),
    };
    if output == source {
        output.set_extension("out");
    }
    output
}

#[cfg(unix)]
fn mark_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
        .with_context(|| format!("failed to mark {} executable", path.display()))
}

#[cfg(not(unix))]
fn mark_executable(_path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_output() {
        assert_eq!(default_output(Path::new("dir/hello.bf"), Target::Elf), PathBuf::from("dir/hello"));
        assert_eq!(default_output(Path::new("hello.ook"), Target::C), PathBuf::from("hello.c"));
        assert_eq!(default_output(Path::new("hello"), Target::Elf), PathBuf::from("hello.out"));
    }

    #[test]
    fn test_cli_parses() {
        let cli = Cli::try_parse_from(["tapec", "a.bf", "-s", "--target", "c", "--tape-size", "64"]).unwrap();
        assert!(cli.optimize_for_space);
        assert_eq!(Target::from(cli.target), Target::C);
        assert_eq!(cli.tape_size, 64);
    }
}
