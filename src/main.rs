use std::{cell::RefCell, io::Write, path::PathBuf, process::ExitCode, rc::Rc};

use clap::{Args, Parser, Subcommand};
use quill::{
    tokenizer::{self, TokenType},
    tree_walk_interpreter::{Interpreter, Value},
    type_checker::TypeChecker,
    InterpretError,
};

#[derive(Debug, Parser)]
#[command(version, about = "Interpreter for the quill language")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

impl Cli {
    pub fn command(&self) -> &Command {
        self.command.as_ref().unwrap_or(&Command::Repl)
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run a program.
    Run(RunArgs),
    /// Print the token stream of a program.
    Tokens(FileArgs),
    /// Print the parsed program.
    Ast(FileArgs),
    /// Parse and type check a program without running it.
    Check(FileArgs),
    Repl,
    /// Time a recursive fibonacci against native Rust.
    Benchmark,
}

#[derive(Debug, Args)]
struct RunArgs {
    file: PathBuf,
    /// Skip the type checker.
    #[arg(long)]
    no_check: bool,
    /// Print the value of the last top-level statement.
    #[arg(long)]
    print_result: bool,
}

#[derive(Debug, Args)]
struct FileArgs {
    file: PathBuf,
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("Could not read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("IO error: {0}")]
    IO(#[from] std::io::Error),
    #[error(transparent)]
    Interpret(#[from] InterpretError),
}

fn main() -> ExitCode {
    init_tracing();
    let args = Cli::parse();

    let result = match args.command() {
        Command::Run(args) => run_command(args),
        Command::Tokens(args) => tokens_command(args),
        Command::Ast(args) => ast_command(args),
        Command::Check(args) => check_command(args),
        Command::Repl => repl_command(),
        Command::Benchmark => benchmark_command(),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

/// Logs go to stderr, and only when `RUST_LOG` asks for them.
fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
            .with(EnvFilter::from_default_env())
            .init();
    }
}

fn read_source(path: &PathBuf) -> Result<String, CliError> {
    std::fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.clone(),
        source,
    })
}

fn run_command(args: &RunArgs) -> Result<(), CliError> {
    let source = read_source(&args.file)?;
    let program = quill::parse(&source)?;
    if !args.no_check {
        TypeChecker::new()
            .check(&program)
            .map_err(InterpretError::from)?;
    }

    let value = Interpreter::default()
        .interpret(&program)
        .map_err(InterpretError::from)?;
    if args.print_result && !matches!(value, Value::None) {
        println!("{value}");
    }
    Ok(())
}

fn tokens_command(args: &FileArgs) -> Result<(), CliError> {
    let source = read_source(&args.file)?;
    let tokens = tokenizer::tokenize(&source).map_err(InterpretError::from)?;

    let mut line = 0;
    for token in tokens.iter() {
        if token.line() != line {
            print!("{:4} ", token.line());
            line = token.line();
        } else {
            print!("   | ");
        }

        println!("{:<24} {}", format!("{:?}", token.token_type), token.lexeme);
    }

    Ok(())
}

fn ast_command(args: &FileArgs) -> Result<(), CliError> {
    let source = read_source(&args.file)?;
    print!("{}", quill::parse(&source)?);
    Ok(())
}

fn check_command(args: &FileArgs) -> Result<(), CliError> {
    let source = read_source(&args.file)?;
    let program = quill::parse(&source)?;
    TypeChecker::new()
        .check(&program)
        .map_err(InterpretError::from)?;
    println!("ok");
    Ok(())
}

fn repl_command() -> Result<(), CliError> {
    println!("Welcome to the quill REPL!");
    println!("EOF to exit. (Ctrl+D on *nix, Ctrl+Z on Windows)");
    println!("Blocks continue until an empty line.");

    let mut checker = TypeChecker::new();
    let mut interpreter = Interpreter::default();
    let mut buffer = String::new();

    loop {
        print!("{}", if buffer.is_empty() { "> " } else { "... " });
        std::io::stdout().flush()?;

        let mut input = String::new();
        if std::io::stdin().read_line(&mut input)? == 0 {
            break;
        }

        let line = input.trim_end();
        if buffer.is_empty() {
            if line.trim().is_empty() {
                continue;
            }
            if opens_block(line) {
                buffer.push_str(line);
                buffer.push('\n');
                continue;
            }
            buffer.push_str(line);
        } else if !line.trim().is_empty() {
            buffer.push_str(line);
            buffer.push('\n');
            continue;
        }

        match evaluate(&buffer, &mut checker, &mut interpreter) {
            Ok(Value::None) => {}
            Ok(value) => println!("{value}"),
            Err(e) => println!("Error: {e}"),
        }
        buffer.clear();
    }

    Ok(())
}

/// Whether a line starts an if/else/while block or a function definition.
fn opens_block(line: &str) -> bool {
    let Ok(tokens) = tokenizer::tokenize(line) else {
        return false;
    };
    let kinds = tokens
        .iter()
        .map(|token| &token.token_type)
        .collect::<Vec<_>>();
    match kinds.as_slice() {
        [TokenType::If | TokenType::While | TokenType::Else, ..] => true,
        [TokenType::TypeKeyword(_) | TokenType::ListType(_), TokenType::Identifier(_), TokenType::LeftParen, ..] => {
            true
        }
        _ => false,
    }
}

/// Checks and runs one REPL entry. A failed entry leaves the checker as it
/// was before the entry.
fn evaluate(
    source: &str,
    checker: &mut TypeChecker,
    interpreter: &mut Interpreter,
) -> Result<Value, InterpretError> {
    let program = quill::parse(source)?;
    let snapshot = checker.clone();
    let result = checker
        .check(&program)
        .map_err(InterpretError::from)
        .and_then(|()| interpreter.interpret(&program).map_err(InterpretError::from));
    if result.is_err() {
        *checker = snapshot;
    }
    result
}

fn benchmark_command() -> Result<(), CliError> {
    let start = std::time::Instant::now();
    quill::run(quill_fib_source(), Rc::new(RefCell::new(std::io::stdout())))?;
    let quill_elapsed = start.elapsed();
    println!("Quill Took: {:?}", quill_elapsed);

    let start = std::time::Instant::now();
    println!("{}", fib(25));
    let fib_elapsed = start.elapsed();
    println!("Fib Took: {:?}", fib_elapsed);

    println!(
        "Rust is {}x faster than quill",
        quill_elapsed.as_secs_f64() / fib_elapsed.as_secs_f64()
    );
    Ok(())
}

fn quill_fib_source() -> &'static str {
    r#"
int fib(int n)
    if n <= 1
        return n
    return fib(n - 1) + fib(n - 2)

print(fib(25))
"#
}

fn fib(n: i64) -> i64 {
    if n <= 1 {
        return n;
    }
    fib(n - 1) + fib(n - 2)
}
