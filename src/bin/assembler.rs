//! Assembly to bytecode compiler CLI.
//!
//! Reads an assembly source file and writes the raw bytecode the VM executes.
//!
//! # Usage
//! ```text
//! stackvm-asm <input.asm> [OPTIONS]
//! ```
//!
//! # Arguments
//! - `input.asm`: Assembly source file to compile
//!
//! # Options
//! - `-o, --output <file>`: Output file path (defaults to `<input>.bin`)
//! - `-l, --listing`: Also print the disassembled bytecode to stdout
//!
//! # Examples
//! ```text
//! stackvm-asm program.asm
//! stackvm-asm program.asm -o output.bin
//! stackvm-asm program.asm -l
//! ```

use stackvm::utils::log;
use stackvm::virtual_machine::assembler::{assemble_file, disassemble};
use stackvm::{error, info};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;

fn main() {
    log::init_from_env();
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        print_usage(&args[0]);
        process::exit(if args.len() < 2 { 1 } else { 0 });
    }

    let input_path = &args[1];
    let mut output_path: Option<PathBuf> = None;
    let mut listing = false;

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            k @ ("--output" | "-o") => {
                i += 1;
                if i >= args.len() {
                    error!("{k} requires an argument");
                    process::exit(1);
                }
                output_path = Some(PathBuf::from(&args[i]));
                i += 1;
            }
            "--listing" | "-l" => {
                listing = true;
                i += 1;
            }
            other => {
                error!("Unexpected argument: {}\n", other);
                print_usage(&args[0]);
                process::exit(1);
            }
        }
    }

    if !Path::new(input_path).exists() {
        error!("Input file does not exist: {}", input_path);
        process::exit(1);
    }

    let output_path = output_path.unwrap_or_else(|| default_output_path(Path::new(input_path)));

    if let Some(parent) = output_path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        error!("Output directory does not exist: {}", parent.display());
        process::exit(1);
    }

    let bytecode = match assemble_file(input_path) {
        Ok(code) => code,
        Err(e) => {
            error!("Assembly failed: {}", e);
            process::exit(1);
        }
    };

    if let Err(e) = fs::write(&output_path, &bytecode) {
        error!("Failed to write output file: {}", e);
        process::exit(1);
    }

    info!(
        "Compiled {} -> {} ({} bytes)",
        input_path,
        output_path.display(),
        bytecode.len()
    );

    if listing {
        match disassemble(&bytecode) {
            Ok(text) => print!("{text}"),
            Err(e) => {
                error!("Disassembly failed: {e}");
                process::exit(1);
            }
        }
    }
}

/// `dir/name.asm` -> `dir/name.bin`.
fn default_output_path(input: &Path) -> PathBuf {
    let stem = input.file_stem().unwrap_or_default().to_string_lossy();
    let parent = input.parent().unwrap_or(Path::new("."));
    parent.join(format!("{}.bin", stem))
}

const USAGE: &str = "\
Stack VM Assembler

USAGE:
    {program} <input.asm> [OPTIONS]

ARGS:
    <input.asm>    Assembly source file to compile

OPTIONS:
    -o, --output <file>    Output file path (defaults to <input>.bin)
    -l, --listing          Print the disassembled bytecode after compiling
    -h, --help             Print this help message

EXAMPLES:
    # Compile to default output name
    {program} program.asm

    # Compile with explicit output
    {program} program.asm -o output.bin
";

fn print_usage(program: &str) {
    info!("{}", USAGE.replace("{program}", program));
}
