//! Quill Compiler
//!
//! Command-line driver: checks a Quill source file and dumps the decorated,
//! optimized AST as text or JSON.

use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use log::info;

use quill::{compile, print_ast, CompileOptions, Program};

/// Quill Compiler
#[derive(Parser, Debug)]
#[command(name = "quillc")]
#[command(version = "0.1.0")]
#[command(about = "Quill compiler - semantic analysis and optimization")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Input source file (.ql)
    #[arg(value_name = "FILE")]
    input: Option<PathBuf>,

    /// Output file
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// What to write
    #[arg(long, value_enum, default_value = "ast")]
    emit: Emit,

    /// Optimization level (0 or 1)
    #[arg(short = 'O', default_value = "1", value_parser = clap::value_parser!(u8).range(0..=1))]
    opt_level: u8,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compile a source file
    Build {
        /// Input source file
        input: PathBuf,

        /// Output file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// What to write
        #[arg(long, value_enum, default_value = "ast")]
        emit: Emit,

        /// Optimization level (0 or 1)
        #[arg(short = 'O', default_value = "1", value_parser = clap::value_parser!(u8).range(0..=1))]
        opt_level: u8,
    },
    /// Check a source file for errors
    Check {
        /// Input source file
        input: PathBuf,
    },
}

/// Output format of `build`
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Emit {
    /// Source-like text
    Ast,
    /// serde_json dump of the program and its entities
    Json,
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    let result = match cli.command {
        Some(Commands::Build {
            ref input,
            ref output,
            emit,
            opt_level,
        }) => build(input, output.as_deref(), emit, opt_level),
        Some(Commands::Check { ref input }) => check(input),
        None => match cli.input {
            Some(ref input) => build(input, cli.output.as_deref(), cli.emit, cli.opt_level),
            None => {
                eprintln!("Error: No input file specified");
                eprintln!("Usage: quillc <FILE> or quillc build <FILE>");
                process::exit(1);
            }
        },
    };

    if let Err(err) = result {
        eprintln!("{:#}", err);
        process::exit(1);
    }
}

fn read_source(input: &Path) -> Result<String> {
    fs::read_to_string(input).with_context(|| format!("Error reading file: {}", input.display()))
}

fn compile_file(input: &Path, options: &CompileOptions) -> Result<Program> {
    let source = read_source(input)?;
    info!("compiling {}", input.display());
    Ok(compile(&source, options)?)
}

/// Compile and write the AST dump to `output` or stdout
fn build(input: &Path, output: Option<&Path>, emit: Emit, opt_level: u8) -> Result<()> {
    let options = CompileOptions {
        optimize: opt_level > 0,
    };
    let program = compile_file(input, &options)?;

    let text = match emit {
        Emit::Ast => print_ast(&program),
        Emit::Json => serde_json::to_string_pretty(&program).context("Error serializing AST")? + "\n",
    };

    match output {
        Some(path) => {
            fs::write(path, text).with_context(|| format!("Error writing file: {}", path.display()))?;
            info!("wrote {}", path.display());
        }
        None => print!("{}", text),
    }
    Ok(())
}

/// Parse and analyze only
fn check(input: &Path) -> Result<()> {
    let options = CompileOptions { optimize: false };
    compile_file(input, &options)?;
    println!("{}: no errors found", input.display());
    Ok(())
}
