//! Command line driver for the packtree parsing toolkit.
//!
//! Takes a grammar description and zero or more inputs, each supplied as a
//! file path or an inline string, parses every input and dumps the
//! resulting syntax tree.
//!
//! Run `cargo doc --open` to view this documentation in a browser.

#![warn(missing_docs)] // friendly reminder to add comments
#![warn(clippy::missing_docs_in_private_items)]
#![warn(rustdoc::all)]

use std::fs;
use std::io::{self, BufRead, Write};
use std::process::ExitCode;

use clap::Parser;
use colored::Colorize;
use log::LevelFilter;

use packtree::Grammar;

/// Command line arguments accepted by the driver
#[derive(Clone, PartialEq, Eq, Parser)]
#[command(version, about)]
struct Args {
    /// Grammar description to create a parser from (file path or inline
    /// string)
    grammar: String,
    /// Inputs to be processed by the parser (file paths or inline strings);
    /// read from stdin when omitted
    inputs: Vec<String>,
    /// Dump the parsed grammar description and enable debug output
    #[arg(short, long)]
    debug: bool,
    /// Display messages that aid in tracing the parsing process
    #[arg(short, long)]
    verbose: bool,
}

/// Resolve an argument that may be a file path: file contents when the path
/// opens, the argument itself otherwise. Returns the resolved text and the
/// name to report it under.
fn file_or_inline(arg: &str, fallback: &str) -> (String, String) {
    match fs::read_to_string(arg) {
        Ok(text) => (text, arg.to_string()),
        Err(_) => (arg.to_string(), fallback.to_string()),
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    let level = if args.debug {
        LevelFilter::Debug
    } else if args.verbose {
        LevelFilter::Info
    } else {
        LevelFilter::Warn
    };
    env_logger::Builder::new().filter_level(level).init();

    let (description, grammar_name) = file_or_inline(&args.grammar, "grammar");

    if args.verbose {
        println!("reading grammar from '{}'", grammar_name);
    }

    if args.debug {
        match Grammar::description_ast(&description) {
            Ok(ast) => print!("{}", ast.dump()),
            Err(e) => {
                eprintln!("{} {}: {}", "[ERROR]".red(), grammar_name, e);
                return ExitCode::FAILURE;
            }
        }
    }

    let grammar = match Grammar::from_description(&description) {
        Ok(grammar) => grammar,
        Err(e) => {
            eprintln!("{} {}: {}", "[ERROR]".red(), grammar_name, e);
            return ExitCode::FAILURE;
        }
    };

    let mut failed = false;

    if args.inputs.is_empty() {
        // Interactive mode: parse one line at a time until an empty line.
        let stdin = io::stdin();

        loop {
            if args.verbose {
                print!("> ");
                let _ = io::stdout().flush();
            }

            let mut line = String::new();
            match stdin.lock().read_line(&mut line) {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) => {
                    eprintln!("{} stdin: {}", "[ERROR]".red(), e);
                    return ExitCode::FAILURE;
                }
            }

            let line = line.trim_end_matches('\n');
            if line.is_empty() {
                break;
            }

            failed |= !parse_and_dump(&grammar, line, "input", args.verbose);
        }
    } else {
        for (count, input) in args.inputs.iter().enumerate() {
            let (text, name) = file_or_inline(input, &format!("input.{}", count));
            failed |= !parse_and_dump(&grammar, &text, &name, args.verbose);
        }
    }

    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

/// Parse one input and dump its tree; reports errors and returns whether
/// the parse succeeded.
fn parse_and_dump(grammar: &Grammar, input: &str, name: &str, verbose: bool) -> bool {
    match grammar.parse(input) {
        Ok(ast) => {
            if verbose {
                println!("{}: parsing successful", name);
            }

            print!("{}", ast.dump());
            true
        }
        Err(e) => {
            eprintln!("{} {}: {}", "[ERROR]".red(), name, e);
            false
        }
    }
}
