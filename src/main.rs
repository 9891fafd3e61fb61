use std::{cell::RefCell, io::Write, process::ExitCode, rc::Rc};

use clap::{Args, Parser, Subcommand};
use geo::{interpreter::DEFAULT_MAX_CALL_DEPTH, Interpreter, Object};

#[derive(Debug, Parser)]
#[command(version, about = "Interpreter for the geo expression language")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    options: Options,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Evaluate a script and print its value
    Run(RunArgs),
    /// Start an interactive session (the default)
    Repl,
}

#[derive(Debug, Args)]
struct RunArgs {
    file: String,
}

#[derive(Debug, Clone, Args)]
struct Options {
    /// Nested function calls allowed before evaluation fails
    #[arg(long, global = true, default_value_t = DEFAULT_MAX_CALL_DEPTH)]
    max_call_depth: usize,
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match &cli.command {
        Some(Command::Run(args)) => run_command(args, &cli.options),
        Some(Command::Repl) | None => repl_command(&cli.options),
    }
}

fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    // stdout belongs to the program, so only log when asked to
    if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr))
            .with(EnvFilter::from_default_env())
            .init();
    }
}

fn interpreter(options: &Options) -> Interpreter {
    Interpreter::new(Rc::new(RefCell::new(std::io::stdout())))
        .with_max_call_depth(options.max_call_depth)
}

fn repl_command(options: &Options) -> ExitCode {
    println!("Welcome to the geo REPL!");
    println!("EOF to exit. (Ctrl+D on *nix, Ctrl+Z on Windows)");

    let mut interpreter = interpreter(options);
    let scope = geo::new_root_environment();
    let mut input = String::new();

    loop {
        print!(">> ");
        if let Err(e) = std::io::stdout().flush() {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }

        input.clear();
        match std::io::stdin().read_line(&mut input) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                eprintln!("Error: {e}");
                return ExitCode::FAILURE;
            }
        }

        let source = input.trim();
        if source.is_empty() {
            continue;
        }

        match geo::compile(source) {
            Ok(module) => {
                let value = interpreter.evaluate(&module, &scope);
                println!("{value} : {}", value.object_type());
            }
            Err(errors) => print!("{errors}"),
        }
    }

    ExitCode::SUCCESS
}

fn run_command(args: &RunArgs, options: &Options) -> ExitCode {
    let source = match std::fs::read_to_string(&args.file) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("could not read {}: {e}", args.file);
            return ExitCode::FAILURE;
        }
    };

    let module = match geo::compile(&source) {
        Ok(module) => module,
        Err(errors) => {
            eprint!("{errors}");
            return ExitCode::FAILURE;
        }
    };

    let mut interpreter = interpreter(options);
    let value = interpreter.evaluate(&module, &geo::new_root_environment());
    match &value {
        Object::Null => ExitCode::SUCCESS,
        Object::Error(error) => {
            eprintln!("{error}");
            ExitCode::FAILURE
        }
        value => {
            println!("{value}");
            ExitCode::SUCCESS
        }
    }
}
