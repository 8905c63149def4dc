use std::fs::File;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::thread;

use anyhow::{anyhow, Context, Result};
use clap::Parser as ClapParser;
use clap::Subcommand;
use env_logger::Builder;
use log::{debug, info};

use rox::ast_printer::AstPrinter;
use rox::error::LoxError;
use rox::interpreter::Interpreter;
use rox::parser::Parser;
use rox::resolver::Resolver;
use rox::scanner::{scan_tokens, Scanner};
use rox::token::Token;

/// Stack for the interpreter thread.  Deep recursion in scripts is bounded
/// by `--max-call-depth`, which must trip before the host stack does.
const INTERPRETER_STACK_SIZE: usize = 256 * 1024 * 1024;

/// Call depth allowed on the `INTERPRETER_STACK_SIZE` thread.
const CLI_MAX_CALL_DEPTH: usize = 1024;

#[derive(ClapParser, Debug)]
#[command(version, about = "Rox language interpreter", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    commands: Commands,

    /// Enable logging to app.log
    #[arg(long, global = true)]
    log: bool,

    /// Maximum nesting of calls before "Stack overflow." is reported
    #[arg(long, global = true, default_value_t = CLI_MAX_CALL_DEPTH)]
    max_call_depth: usize,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Tokenizes input from a file, printing each token
    Tokenize {
        filename: Option<PathBuf>,

        /// Print the tokens as a JSON array
        #[arg(long)]
        json: bool,
    },

    /// Parses input from a file and prints the AST of each statement
    Parse { filename: Option<PathBuf> },

    /// Evaluates input from a file as a single expression and prints the result
    Evaluate { filename: Option<PathBuf> },

    /// Runs a program from a file, or starts a REPL when no file is given
    Run { filename: Option<PathBuf> },
}

fn init_logger() -> Result<()> {
    let log_file = File::create("app.log").context("Failed to create app.log")?;

    Builder::new()
        .format(|buf, record| {
            let module = record.module_path().unwrap_or("<unnamed>");
            let module = module.strip_prefix("rox::").unwrap_or(module);
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

    info!("Logger initialized, writing to app.log");
    Ok(())
}

/// Prints every error and returns the exit code of the first.
fn report(errors: &[LoxError]) -> i32 {
    for e in errors {
        debug!("Reporting: {:?}", e);
        eprintln!("{}", e);
    }

    errors.first().map_or(0, LoxError::exit_code)
}

fn new_interpreter(max_call_depth: usize) -> Interpreter {
    let mut interpreter = Interpreter::new();
    interpreter.set_max_call_depth(max_call_depth);
    interpreter
}

fn tokenize(source: &str, json: bool) -> Result<i32> {
    let mut tokens: Vec<Token> = Vec::new();
    let mut tokenized = true;

    for result in Scanner::new(source.as_bytes()) {
        match result {
            Ok(token) => {
                debug!("Scanned token: {}", token);

                if !json {
                    println!("{}", token);
                }
                tokens.push(token);
            }

            Err(e) => {
                tokenized = false;
                debug!("Tokenization debug: {}", e);
                eprintln!("{}", e);
            }
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&tokens)?);
    }

    if !tokenized {
        debug!("Tokenization failed, exiting with code 65");
        return Ok(65);
    }

    info!("Tokenization completed successfully");
    Ok(0)
}

fn parse(source: &str) -> i32 {
    let tokens = match scan_tokens(source.as_bytes()) {
        Ok(tokens) => tokens,
        Err(errors) => return report(&errors),
    };

    match Parser::new(&tokens).parse() {
        Ok(statements) => {
            info!("Parsed {} statement(s)", statements.len());

            for stmt in &statements {
                let ast_str = AstPrinter::print_stmt(stmt);
                debug!("AST: {}", ast_str);
                println!("{}", ast_str);
            }

            0
        }

        Err(errors) => report(&errors),
    }
}

fn evaluate(source: &str, max_call_depth: usize) -> i32 {
    let tokens = match scan_tokens(source.as_bytes()) {
        Ok(tokens) => tokens,
        Err(errors) => return report(&errors),
    };

    let expr = match Parser::new(&tokens).parse_expression() {
        Ok(expr) => expr,
        Err(errors) => return report(&errors),
    };

    let locals = match Resolver::new().resolve_expression(&expr) {
        Ok(locals) => locals,
        Err(errors) => return report(&errors),
    };

    let mut interpreter = new_interpreter(max_call_depth);
    interpreter.resolve(locals);

    match interpreter.evaluate(&expr) {
        Ok(value) => {
            debug!("Evaluated to: {}", value);
            println!("{}", value);
            0
        }

        Err(e) => report(&[e]),
    }
}

fn run_file(source: &str, max_call_depth: usize) -> i32 {
    info!("Provided input:\n {}", source);

    let mut interpreter = new_interpreter(max_call_depth);

    match rox::run(source, &mut interpreter) {
        Ok(()) => {
            info!("Program executed successfully");
            0
        }

        Err(errors) => report(&errors),
    }
}

/// One interpreter for the whole session; an error only discards its line.
fn run_prompt(max_call_depth: usize) -> Result<i32> {
    info!("Starting REPL");

    let mut interpreter = new_interpreter(max_call_depth);
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        print!("> ");
        io::stdout().flush()?;

        let Some(line) = lines.next() else {
            println!();
            break;
        };
        let line = line.context("Failed to read from stdin")?;

        if let Err(errors) = rox::run(&line, &mut interpreter) {
            report(&errors);
        }
    }

    info!("REPL finished");
    Ok(0)
}

fn execute(args: Cli) -> Result<i32> {
    let max_call_depth = args.max_call_depth;

    let filename = match &args.commands {
        Commands::Tokenize { filename, .. }
        | Commands::Parse { filename }
        | Commands::Evaluate { filename } => match filename {
            Some(filename) => filename.clone(),
            None => {
                info!("No filepath provided");
                println!("No input filepath was provided. Exiting...");
                return Ok(0);
            }
        },

        Commands::Run { filename } => match filename {
            Some(filename) => filename.clone(),
            None => return run_prompt(max_call_depth),
        },
    };

    let source = match rox::read_source(&filename) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("Failed to read {:?}: {}", filename, e);
            return Ok(e.exit_code());
        }
    };

    match args.commands {
        Commands::Tokenize { json, .. } => {
            info!("Running Tokenize subcommand");
            tokenize(&source, json)
        }

        Commands::Parse { .. } => {
            info!("Running Parse subcommand");
            Ok(parse(&source))
        }

        Commands::Evaluate { .. } => {
            info!("Running Evaluate subcommand");
            Ok(evaluate(&source, max_call_depth))
        }

        Commands::Run { .. } => {
            info!("Running Run subcommand");
            Ok(run_file(&source, max_call_depth))
        }
    }
}

fn main() -> Result<()> {
    let args: Cli = Cli::parse();

    // Initialize logger only if --log flag is provided
    if args.log {
        init_logger()?;
    } else {
        env_logger::Builder::new()
            .filter_level(log::LevelFilter::Off)
            .init();
    }

    info!("CLI arguments: {:?}", args);

    let worker = thread::Builder::new()
        .name("rox-interpreter".into())
        .stack_size(INTERPRETER_STACK_SIZE)
        .spawn(move || execute(args))
        .context("Failed to spawn interpreter thread")?;

    let code = worker
        .join()
        .map_err(|_| anyhow!("Interpreter thread panicked"))??;

    if code != 0 {
        debug!("Exiting with code {}", code);
        std::process::exit(code);
    }

    Ok(())
}
