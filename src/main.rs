//! Stack VM runner.
//!
//! Loads a program, runs it on a fresh VM and prints the returned bytes.
//!
//! # Usage
//! ```text
//! stackvm <program> [OPTIONS]
//! ```
//!
//! # Arguments
//! - `program`: `.asm`/`.s` assembly source, or raw bytecode in any other file
//!
//! # Options
//! - `--stack <words>`: Operand stack capacity
//! - `--memory <bytes>`: Memory capacity (accepts `K`, `M`, `G` suffixes)
//! - `--decode <u64|i64|hex|text>`: How to print the returned bytes
//! - `--disassemble`: Print the program as assembly instead of running it
//!
//! # Environment
//! `STACKVM_STACK_CAPACITY` and `STACKVM_MEMORY_CAPACITY` set the capacities
//! when the matching flag is absent. `STACKVM_LOG_TIMESTAMPS=0` drops
//! timestamps from log lines.

use stackvm::utils::log;
use stackvm::virtual_machine::assembler::{assemble_file, disassemble};
use stackvm::virtual_machine::config::{VmConfig, parse_size};
use stackvm::virtual_machine::errors::VMError;
use stackvm::virtual_machine::output::Decoding;
use stackvm::virtual_machine::vm::{Halt, Status, VM};
use stackvm::{error, info, warn};
use std::env;
use std::fs;
use std::path::Path;
use std::process;

const ASSEMBLY_EXTENSIONS: [&str; 2] = ["asm", "s"];

fn main() {
    log::init_from_env();
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        print_usage(&args[0]);
        process::exit(if args.len() < 2 { 1 } else { 0 });
    }

    let program_path = &args[1];
    let mut config = VmConfig::from_env().unwrap_or_else(|e| {
        error!("{e}");
        process::exit(1)
    });
    let mut decoding = Decoding::default();
    let mut disassemble_only = false;

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            k @ ("--stack" | "--memory" | "--decode") => {
                i += 1;
                if i >= args.len() {
                    error!("{k} requires an argument");
                    process::exit(1);
                }
                let value = &args[i];
                let applied = match k {
                    "--stack" => parse_size(value).and_then(|words| {
                        usize::try_from(words)
                            .map(|words| config = config.with_stack_capacity(words))
                            .map_err(|_| VMError::InvalidConfig {
                                reason: format!("stack capacity {words} does not fit in usize"),
                            })
                    }),
                    "--memory" => parse_size(value)
                        .map(|bytes| config = config.with_memory_capacity(bytes)),
                    _ => value.parse::<Decoding>().map(|d| decoding = d),
                };
                if let Err(e) = applied {
                    error!("{k}: {e}");
                    process::exit(1);
                }
                i += 1;
            }
            "--disassemble" => {
                disassemble_only = true;
                i += 1;
            }
            other => {
                error!("Unexpected argument: {}\n", other);
                print_usage(&args[0]);
                process::exit(1);
            }
        }
    }

    let bytecode = load_program(Path::new(program_path)).unwrap_or_else(|e| {
        error!("Failed to load {}: {}", program_path, e);
        process::exit(1)
    });

    if disassemble_only {
        match disassemble(&bytecode) {
            Ok(listing) => print!("{listing}"),
            Err(e) => {
                error!("Disassembly failed: {e}");
                process::exit(1);
            }
        }
        return;
    }

    let mut vm = VM::new(config).unwrap_or_else(|e| {
        error!("{e}");
        process::exit(1)
    });
    info!(
        "Running {} ({} bytes, stack {} words, memory {} bytes)",
        program_path,
        bytecode.len(),
        config.stack_capacity,
        config.memory_capacity
    );

    vm.load(bytecode);
    let output = match vm.run() {
        Ok(output) => output,
        Err(e) => {
            error!("Execution failed at offset {}: {}", vm.pc(), e);
            process::exit(1);
        }
    };

    if vm.status() == Status::Halted(Halt::Exhausted) {
        warn!(
            "Program ended without RETURN; final stack: {:?}",
            vm.stack()
        );
    }

    match decoding.decode(&output) {
        Ok(rendered) => println!("{rendered}"),
        Err(e) => {
            error!("{e}");
            process::exit(1);
        }
    }
}

/// Reads `path` as bytecode, assembling it first if it is assembly source.
fn load_program(path: &Path) -> Result<Vec<u8>, VMError> {
    let is_assembly = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ASSEMBLY_EXTENSIONS.contains(&ext));

    if is_assembly {
        return assemble_file(path);
    }
    fs::read(path).map_err(|e| VMError::IoError {
        path: path.display().to_string(),
        source: e.to_string(),
    })
}

const USAGE: &str = "\
Stack VM

USAGE:
    {program} <program> [OPTIONS]

ARGS:
    <program>    Assembly source (.asm, .s) or raw bytecode file

OPTIONS:
    --stack <words>       Operand stack capacity (default 32)
    --memory <bytes>      Memory capacity, K/M/G suffixes allowed (default 64K)
    --decode <format>     Print the result as u64, i64, hex or text (default u64)
    --disassemble         Print the program as assembly and exit
    -h, --help            Print this help message

ENVIRONMENT:
    STACKVM_STACK_CAPACITY     Stack capacity when --stack is absent
    STACKVM_MEMORY_CAPACITY    Memory capacity when --memory is absent
    STACKVM_LOG_TIMESTAMPS     Set to 0 to drop timestamps from log lines

EXAMPLES:
    # Assemble and run, printing the result as an unsigned integer
    {program} program.asm

    # Run bytecode produced by stackvm-asm with 4 GiB of memory
    {program} program.bin --memory 4G --decode hex

    # Show what a bytecode file contains
    {program} program.bin --disassemble
";

/// Prints usage information to stderr.
fn print_usage(program: &str) {
    eprintln!("{}", USAGE.replace("{program}", program));
}
