//! the main compiler binary. takes a source file and an output stage, and
//! writes the requested stage's text representation to standard output.
//!
//! run with `--help` for more info.

use std::process::ExitCode;

use clap::{Parser, ValueEnum};

use crabc::back;
use crabc::front::{self, lex::Lexer};
use crabc::middle;

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct Args {
    /// the input file
    file: String,
    /// the output stage
    #[arg(value_enum, short, long, default_value_t = Output::Asm)]
    out: Output,
    /// turn on optimizations (accepted for interface compatibility; no-op)
    #[arg(short = 'O', default_value_t = false)]
    optimize: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, ValueEnum)]
enum Output {
    /// the list of tokens
    Tokens,
    /// the ast data structure
    Ast,
    /// three-address code, one function at a time
    Tir,
    /// the resulting assembly code
    Asm,
}

fn run() -> crabc::error::Result<()> {
    use Output::*;
    let args = Args::parse();
    let _ = args.optimize;

    let input = std::fs::read_to_string(&args.file).expect("input file should be readable utf8");

    match args.out {
        Tokens => {
            let mut lexer = Lexer::new(&input);
            loop {
                let tok = lexer.next()?;
                if tok.kind == front::token::TokenKind::Eof {
                    break;
                }
                println!("{tok}");
            }
        }
        Ast => {
            let (program, _sym) = front::parse(&input)?;
            println!("{program:#?}");
        }
        Tir => {
            let (program, mut sym) = front::parse(&input)?;
            let functions = middle::lower(&program, &mut sym)?;
            for function in &functions {
                println!("function {}:", sym.func(function.sym).name);
                for quad in &function.code {
                    println!("{quad:?}");
                }
            }
        }
        Asm => {
            log::debug!("compiling {}", args.file);
            let (program, mut sym) = front::parse(&input)?;
            let functions = middle::lower(&program, &mut sym)?;
            let asm = back::generate(&functions, &mut sym)?;
            print!("{asm}");
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
