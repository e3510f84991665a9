use std::fs::File;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser as ClapParser;
use clap::Subcommand;
use env_logger::Builder;
use log::{debug, info};
use memmap2::Mmap;

use rox::ast_printer::AstPrinter;
use rox::error::LoxError;
use rox::interpreter::Interpreter;
use rox::parser::Parser;
use rox::scanner::{scan_tokens, Scanner};
use rox::Lox;

#[derive(ClapParser, Debug)]
#[command(version, about = "Lox language interpreter", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    commands: Commands,

    /// Enable logging to rox.log
    #[arg(long, global = true)]
    log: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Tokenizes input from a file, printing each token
    Tokenize {
        filename: Option<PathBuf>,

        /// Print the token stream as JSON
        #[arg(long)]
        json: bool,
    },

    /// Parses input from a file as a single expression and prints its AST
    Parse { filename: Option<PathBuf> },

    /// Evaluates input from a file as a single expression and prints the result
    Evaluate { filename: Option<PathBuf> },

    /// Runs input from a file as a Lox program
    Run { filename: Option<PathBuf> },

    /// Reads Lox statements from stdin, one line at a time
    Repl,
}

/// Reads a source file into a String via a read‑only memory map.
fn read_file(filename: &Path) -> Result<String> {
    info!("Reading file: {:?}", filename);
    let file = File::open(filename).with_context(|| format!("Failed to open file {:?}", filename))?;

    let len = file
        .metadata()
        .with_context(|| format!("Failed to stat file {:?}", filename))?
        .len();

    // Mapping a zero‑length file fails on some platforms.
    if len == 0 {
        return Ok(String::new());
    }

    // SAFETY: the map is read‑only and copied out before the file is closed.
    let mmap = unsafe { Mmap::map(&file) }
        .with_context(|| format!("Failed to map file {:?}", filename))?;

    let text = std::str::from_utf8(&mmap)
        .map_err(LoxError::from)
        .with_context(|| format!("File {:?} is not valid UTF-8", filename))?;

    info!("Read {} bytes from {:?}", len, filename);

    Ok(text.to_owned())
}

fn init_logger() -> Result<()> {
    let log_file = File::create("rox.log").context("Failed to create rox.log")?;

    Builder::new()
        .format(|buf, record| {
            let module = record
                .module_path()
                .unwrap_or("<unnamed>")
                .strip_prefix("rox::")
                .unwrap_or(record.module_path().unwrap_or("<unnamed>"));
            writeln!(
                buf,
                "[{}:{}] - {}",
                module,
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .filter(None, log::LevelFilter::Debug) // Default to Debug, override with RUST_LOG
        .parse_default_env()
        .init();

    info!("Logger initialized, writing to rox.log");
    Ok(())
}

/// Print every error and exit with the code of the first one.
fn report_and_exit(errors: &[LoxError]) -> ! {
    for e in errors {
        debug!("Reporting: {}", e);
        eprintln!("{}", e);
    }

    let code = errors.first().map_or(65, LoxError::exit_code);
    std::process::exit(code);
}

fn no_input() -> ! {
    info!("No filepath provided");
    println!("No input filepath was provided. Exiting...");
    std::process::exit(0);
}

fn tokenize(filename: &Path, json: bool) -> Result<()> {
    let source = read_file(filename)?;

    if json {
        let (tokens, errors) = scan_tokens(&source);
        println!("{}", serde_json::to_string_pretty(&tokens)?);
        if !errors.is_empty() {
            report_and_exit(&errors);
        }
        return Ok(());
    }

    let mut tokenized = true;

    for token in Scanner::new(&source) {
        match token {
            Ok(token) => println!("{}", token),
            Err(e) => {
                tokenized = false;
                eprintln!("{}", e);
            }
        }
    }

    if !tokenized {
        debug!("Tokenization failed, exiting with code 65");
        std::process::exit(65);
    }

    info!("Tokenization completed successfully");
    Ok(())
}

fn parse_expression_file(filename: &Path, evaluate: bool) -> Result<()> {
    let source = read_file(filename)?;
    let (tokens, errors) = scan_tokens(&source);
    if !errors.is_empty() {
        report_and_exit(&errors);
    }

    let expr = match Parser::new(&tokens).parse_expression() {
        Ok(expr) => expr,
        Err(e) => report_and_exit(&[e]),
    };

    if !evaluate {
        println!("{}", AstPrinter::print(&expr));
        return Ok(());
    }

    let mut interpreter = Interpreter::new();
    match interpreter.evaluate(&expr) {
        Ok(value) => println!("{}", value),
        Err(e) => report_and_exit(&[LoxError::from(e)]),
    }

    Ok(())
}

fn run_file(filename: &Path) -> Result<()> {
    let source = read_file(filename)?;
    let mut lox = Lox::new();

    if let Err(errors) = lox.run(&source) {
        report_and_exit(&errors);
    }

    info!("Program executed successfully");
    Ok(())
}

fn repl() -> Result<()> {
    let mut lox = Lox::new();
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("> ");
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Err(errors) = lox.run(line) {
            for e in &errors {
                eprintln!("{}", e);
            }
        }
    }

    Ok(())
}

fn main() -> Result<()> {
    let args: Cli = Cli::parse();

    // Initialize logger only if --log flag is provided
    if args.log {
        init_logger()?;
    }

    info!("CLI arguments: {:?}", args);

    match args.commands {
        Commands::Tokenize { filename, json } => tokenize(&filename.unwrap_or_else(|| no_input()), json),
        Commands::Parse { filename } => parse_expression_file(&filename.unwrap_or_else(|| no_input()), false),
        Commands::Evaluate { filename } => parse_expression_file(&filename.unwrap_or_else(|| no_input()), true),
        Commands::Run { filename } => run_file(&filename.unwrap_or_else(|| no_input())),
        Commands::Repl => repl(),
    }
}
