//! stackvm CLI: run, assemble and disassemble C0-style bytecode.

use std::path::PathBuf;
use std::process;

use clap::{ArgAction, Parser, Subcommand};
use stackvm_cli::{commands, default_natives, CliError};
use stackvm_vm::heap::DEFAULT_MAX_HEAP_BYTES;
use stackvm_vm::VmConfig;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "stackvm", version)]
#[command(about = "Stack-based bytecode interpreter for .bc0 programs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Increase log verbosity (-v debug, -vv trace). RUST_LOG applies otherwise.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a .bc0 program; its result becomes the exit status
    Run {
        /// Program to execute
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Print the result on stdout
        #[arg(long)]
        print: bool,

        /// Maximum call depth (unbounded by default)
        #[arg(long, value_name = "N")]
        max_depth: Option<usize>,

        /// Heap allocation budget in bytes
        #[arg(long, value_name = "BYTES", default_value_t = DEFAULT_MAX_HEAP_BYTES)]
        max_heap: usize,
    },

    /// Assemble a text file to .bc0
    Assemble {
        /// Assembly source
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Output file (defaults to the input with a .bc0 extension)
        #[arg(short, long, value_name = "OUTPUT")]
        output: Option<PathBuf>,
    },

    /// Print a .bc0 program as assembly text
    Disassemble {
        /// Program to disassemble
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Run {
            file,
            print,
            max_depth,
            max_heap,
        } => cmd_run(file, print, max_depth, max_heap),
        Commands::Assemble { input, output } => {
            commands::assemble(&input, output.as_deref()).map(|output| {
                eprintln!("assembled {} -> {}", input.display(), output.display());
                0
            })
        }
        Commands::Disassemble { file } => commands::disassemble(&file).map(|text| {
            print!("{text}");
            0
        }),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            process::exit(err.exit_code());
        }
    }
}

fn cmd_run(
    file: PathBuf,
    print: bool,
    max_depth: Option<usize>,
    max_heap: usize,
) -> Result<i32, CliError> {
    let config = VmConfig {
        max_call_depth: max_depth,
        max_heap_bytes: max_heap,
    };
    let result = commands::run(&file, default_natives(), config)?;
    if print {
        println!("{result}");
    }
    Ok(result)
}
