use std::fs;
use std::panic;
use std::path::PathBuf;
use std::process;

use clap::Parser;
use normeval::scheme::{ParseConfig, parse_program_with_config};
use normeval::{
    DEFAULT_REPL_DEPTH, Environment, Error, EvalConfig, Evaluator, ParseErrorKind,
};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing_subscriber::EnvFilter;

/// Interactive normal-order Scheme evaluator
#[derive(Debug, clap::Parser)]
#[command(version, about)]
struct Args {
    /// Source file whose definitions are loaded before the prompt starts
    file: Option<PathBuf>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let result = panic::catch_unwind(|| run_repl(&args));

    match result {
        Ok(Ok(())) => {}
        Ok(Err(msg)) => {
            eprintln!("Error: {msg}");
            process::exit(1);
        }
        Err(panic_info) => {
            eprintln!("The REPL encountered an unexpected error and must exit.");

            if let Some(msg) = panic_info.downcast_ref::<&str>() {
                eprintln!("Error: {msg}");
            } else if let Some(msg) = panic_info.downcast_ref::<String>() {
                eprintln!("Error: {msg}");
            } else {
                eprintln!("Error: Unknown panic occurred");
            }

            process::exit(1);
        }
    }
}

/// Evaluate `source` against `env`, printing the final value if there is one.
/// Definitions made before a failure are kept only when the whole input
/// succeeds.
fn eval_source(evaluator: &Evaluator, source: &str, env: &mut Environment) -> Result<(), Error> {
    let config = ParseConfig {
        handle_comments: true,
    };
    let program = parse_program_with_config(source, config)?;
    if program.is_empty() {
        return Ok(());
    }

    let (value, extended) = evaluator.eval_toplevel(&program, env)?;
    *env = extended;
    if let Some(value) = value {
        println!("{value}");
    }
    Ok(())
}

fn run_repl(args: &Args) -> Result<(), String> {
    let evaluator = Evaluator::with_config(EvalConfig::with_max_depth(DEFAULT_REPL_DEPTH));
    let mut env = Environment::empty();

    if let Some(path) = &args.file {
        let source = fs::read_to_string(path)
            .map_err(|e| format!("could not read {}: {e}", path.display()))?;
        eval_source(&evaluator, &source, &mut env)
            .map_err(|e| format!("{}: {e}", path.display()))?;
    }

    println!("normeval: a normal-order (call-by-name) Scheme evaluator");
    println!("Enter expressions like: ((lambda (x y) x) 1 (/ 1 0))");
    println!("Type :help for more commands, or Ctrl+C to exit.");
    println!();

    let mut rl = DefaultEditor::new().map_err(|e| format!("could not initialize REPL: {e}"))?;
    let mut pending = String::new();

    loop {
        let prompt = if pending.is_empty() {
            "normeval> "
        } else {
            "      ... "
        };

        match rl.readline(prompt) {
            Ok(line) => {
                if pending.is_empty() {
                    let command = line.trim();
                    if command.is_empty() {
                        continue;
                    }
                    match command {
                        ":help" => {
                            print_help();
                            continue;
                        }
                        ":env" => {
                            print_environment(&env);
                            continue;
                        }
                        ":quit" | ":exit" => {
                            println!("Goodbye!");
                            break;
                        }
                        _ => {}
                    }
                }

                pending.push_str(&line);
                pending.push('\n');

                match eval_source(&evaluator, &pending, &mut env) {
                    // Keep reading until the input closes
                    Err(Error::ParseError(e)) if e.kind == ParseErrorKind::Incomplete => continue,
                    Ok(()) => {}
                    Err(e) => println!("Error: {e}"),
                }

                let _ = rl.add_history_entry(pending.trim_end());
                pending.clear();
            }

            Err(ReadlineError::Interrupted) if !pending.is_empty() => {
                pending.clear();
            }
            Err(ReadlineError::Eof) | Err(ReadlineError::Interrupted) => {
                println!("Goodbye!");
                break;
            }
            Err(err) => {
                println!("Error: {err:?}");
                break;
            }
        }
    }

    Ok(())
}

fn print_help() {
    println!("Normal-order Scheme evaluator:");
    println!("  :help      - Show this help message");
    println!("  :env       - Show names defined so far");
    println!("  :quit      - Exit the interpreter");
    println!("  :exit      - Exit the interpreter");
    println!("  Ctrl+C     - Cancel pending input, or exit");
    println!();
    println!("Operands of user procedures are passed unevaluated and evaluated");
    println!("each time they are referenced. Primitives evaluate their operands.");
    println!();
    println!("Special forms: define, lambda, if, let, letrec, quote ('x)");
    println!("Primitives:");
    let names: Vec<&str> = normeval::builtinops::get_builtin_ops()
        .iter()
        .map(|op| op.id)
        .collect();
    for chunk in names.chunks(8) {
        println!("  {}", chunk.join(" "));
    }
    println!();
    println!("Examples:");
    println!("  ((lambda (x y) x) 1 (/ 1 0))");
    println!("  (define fact (lambda (n) (if (= n 0) 1 (* n (fact (- n 1))))))");
    println!("  (fact 5)");
    println!();
}

fn print_environment(env: &Environment) {
    let names = env.bound_names();

    if names.is_empty() {
        println!("Environment is empty.");
        return;
    }

    println!("Defined names ({} total):", names.len());
    let mut col = 0;
    for name in names {
        print!("  {name:<15}");
        col += 1;
        if col % 4 == 0 {
            println!();
        }
    }
    if col % 4 != 0 {
        println!();
    }
}
