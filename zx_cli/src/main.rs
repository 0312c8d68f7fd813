//! Command-line driver for the zx C-to-Z80 compiler: reads a C
//! translation unit (from a file or stdin), runs it through the lexer,
//! parser, IR lowering and Z80 codegen/allocation stages, writes the
//! resulting assembly (to a file or stdout), and reports diagnostics on
//! the standard `file:line:col: severity: message` stream.

use anyhow::{bail, Context, Result};
use clap::Parser;
use colored::Colorize;
use std::fs;
use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::rc::Rc;

/// zx: compiles a subset of C to Z80 assembly
#[derive(Parser)]
#[command(name = "zx")]
#[command(about = "Compiles a subset of C to Z80 assembly", long_about = None)]
struct Cli {
    /// Source file to compile; omit to read from stdin
    input: Option<PathBuf>,

    /// Where to write the generated assembly; omit to write to stdout
    output: Option<PathBuf>,

    /// Sets the level of verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();
    match cli.verbose {
        0 => log::set_max_level(log::LevelFilter::Warn),
        1 => log::set_max_level(log::LevelFilter::Info),
        _ => log::set_max_level(log::LevelFilter::Debug),
    }

    match run(&cli) {
        Ok(had_errors) => {
            if had_errors {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(err) => {
            eprintln!("{}: {err:#}", "error".red().bold());
            ExitCode::FAILURE
        }
    }
}

/// Returns `Ok(true)` if compilation produced at least one error-severity
/// diagnostic -- the caller turns that into a non-zero exit code.
fn run(cli: &Cli) -> Result<bool> {
    let (file_name, source) = read_input(cli.input.as_deref())?;
    if cli.verbose > 0 {
        eprintln!("{} lexing and parsing {file_name}", "→".cyan());
    }

    let (unit, parse_diags) = zx_parser::parse_str(&source, Rc::<str>::from(file_name.as_str()))
        .with_context(|| format!("reading source from {file_name}"))?;

    if cli.verbose > 0 {
        eprintln!("{} lowering to IR", "→".cyan());
    }
    let lowered = zx_ir::lower_translation_unit(&unit);

    let had_errors = parse_diags.has_errors() || lowered.diagnostics.has_errors();
    for diag in parse_diags.iter().chain(lowered.diagnostics.iter()) {
        eprintln!("{}", diag.plain());
    }

    if had_errors {
        return Ok(true);
    }

    if cli.verbose > 0 {
        eprintln!("{} generating Z80 assembly", "→".cyan());
    }
    let asm = zx_z80::compile(&lowered.module);

    write_output(cli.output.as_deref(), &asm)?;
    if cli.verbose > 0 {
        eprintln!("{} done", "✓".green().bold());
    }
    Ok(false)
}

fn read_input(path: Option<&std::path::Path>) -> Result<(String, String)> {
    match path {
        Some(path) => {
            let source = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
            Ok((path.display().to_string(), source))
        }
        None => {
            let mut source = String::new();
            std::io::stdin().read_to_string(&mut source).context("reading source from stdin")?;
            Ok(("<stdin>".to_string(), source))
        }
    }
}

fn write_output(path: Option<&std::path::Path>, asm: &str) -> Result<()> {
    match path {
        Some(path) => {
            fs::write(path, asm).with_context(|| format!("writing {}", path.display()))?;
        }
        None => {
            let mut stdout = std::io::stdout();
            stdout.write_all(asm.as_bytes()).context("writing assembly to stdout")?;
        }
    }
    Ok(())
}

fn bail_on_empty_input(source: &str) -> Result<()> {
    if source.trim().is_empty() {
        bail!("empty input");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::bail_on_empty_input;

    #[test]
    fn rejects_empty_source() {
        assert!(bail_on_empty_input("   \n\t").is_err());
        assert!(bail_on_empty_input("int x;").is_ok());
    }
}
