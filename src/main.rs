use std::fs::File;
use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser as ClapParser;
use encoding_rs_io::DecodeReaderBytesBuilder;
use log::debug;

use pl0c::error::Pl0Error;
use pl0c::generator::instruction::pretty;
use pl0c::lexer::TokenKind;
use pl0c::{compile, CompileResult};

/// A single-pass compiler for the PL/0 teaching language, emitting p-code
/// for a stack VM.
#[derive(Debug, ClapParser)]
#[command(name = "pl0c", about = "Compile a PL/0 source file to p-code")]
struct Cli {
    /// Path to a PL/0 source file.
    source: PathBuf,

    /// How much to print besides the p-code itself: 0 = wire format only,
    /// 1 = mnemonic instructions, 2 = + source text, 3 = + token stream,
    /// 4 = + parse tree.
    #[arg(default_value_t = 0)]
    verbosity: u8,
}

fn main() -> ExitCode {
    simple_logger::SimpleLogger::new()
        .with_level(log::LevelFilter::Warn)
        .init()
        .expect("logger can only be initialized once");

    let cli = Cli::parse();

    match run(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

/// Reads and compiles `cli.source`, printing output per `cli.verbosity`.
/// Returns `Ok(true)` on a clean compile, `Ok(false)` if the pipeline
/// reported lexer/parser/generator diagnostics (a normal, non-exceptional
/// outcome), and `Err` only for I/O failure reading the source file.
fn run(cli: &Cli) -> anyhow::Result<bool> {
    let source = read_source(&cli.source)?;

    debug!("read {} bytes from {}", source.len(), cli.source.display());

    if cli.verbosity >= 2 {
        println!("{source}");
    }

    let result = compile(&source);
    print_result(&result, cli.verbosity);

    Ok(!result.has_errors())
}

fn read_source(path: &PathBuf) -> anyhow::Result<String> {
    let file = File::open(path).map_err(|source| Pl0Error::ReadSource {
        path: path.clone(),
        source,
    })?;
    let mut decoder = DecodeReaderBytesBuilder::new()
        .encoding(Some(encoding_rs::UTF_8))
        .build(file);
    let mut source = String::new();
    decoder
        .read_to_string(&mut source)
        .with_context(|| format!("could not decode {}", path.display()))?;
    Ok(source)
}

fn print_result(result: &CompileResult, verbosity: u8) {
    if verbosity >= 3 {
        println!("Tokens:");
        for token in &result.tokens {
            print!("{} ", token.kind.numeric_code());
            if matches!(token.kind, TokenKind::IdentSym | TokenKind::NumberSym) {
                print!("{} ", token.text);
            }
        }
        println!();
        println!("Tokens with token names:");
        for token in &result.tokens {
            print!("{} ", token.kind);
            if matches!(token.kind, TokenKind::IdentSym | TokenKind::NumberSym) {
                print!("{} ", token.text);
            }
        }
        println!();
    }

    for error in &result.lex_errors {
        eprintln!("lex error: {error}");
    }

    if verbosity >= 4 {
        println!("{:#?}", result.parse_tree);
    }

    if result.parse_tree.is_error() {
        eprintln!("parse error: {}", result.parse_tree.name);
        return;
    }

    for error in &result.gen_errors {
        eprintln!("generator error: {error}");
    }

    if verbosity >= 1 {
        for instruction in &result.instructions {
            println!("{}", pretty(instruction));
        }
    } else {
        for instruction in &result.instructions {
            println!("{instruction}");
        }
    }
}
