//! Beatsheet - headless front end for the music spreadsheet engine

mod default_functions;

use anyhow::{Context, bail};
use beatsheet_core::Document;
use beatsheet_core::storage::markdown_content;
use beatsheet_engine::engine::format_value;
use std::env;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

fn print_usage() {
    eprintln!("Usage: beatsheet [OPTIONS] [FILE]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  [FILE]                    Sheet file to open (.json)");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -c, --command <FORMULA>   Evaluate a formula and print the result");
    eprintln!("  -f, --functions <FILE>    Load custom Rhai functions (can be repeated)");
    eprintln!("  -o, --output <FILE>       Export to markdown file");
    eprintln!("  --tempo <BPM>             Override the global tempo");
    eprintln!("  --no-default-functions    Do not auto-load default.rhai from config dir");
    eprintln!("  -h, --help                Print help");
}

struct Options {
    file_path: Option<PathBuf>,
    functions_files: Vec<PathBuf>,
    output_file: Option<PathBuf>,
    command: Option<String>,
    tempo: Option<String>,
    no_default_functions: bool,
}

fn next_value(args: &[String], i: &mut usize, what: &str) -> String {
    *i += 1;
    if *i >= args.len() {
        eprintln!("Error: {} requires {}", args[*i - 1], what);
        std::process::exit(1);
    }
    args[*i].clone()
}

fn parse_args(args: &[String]) -> Options {
    let mut opts = Options {
        file_path: None,
        functions_files: Vec::new(),
        output_file: None,
        command: None,
        tempo: None,
        no_default_functions: false,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_usage();
                std::process::exit(0);
            }
            "-c" | "--command" => {
                opts.command = Some(next_value(args, &mut i, "a formula"));
            }
            "-f" | "--functions" => {
                let path = next_value(args, &mut i, "a file path");
                opts.functions_files.push(PathBuf::from(path));
            }
            "-o" | "--output" => {
                let path = next_value(args, &mut i, "a file path");
                opts.output_file = Some(PathBuf::from(path));
            }
            "--tempo" => {
                opts.tempo = Some(next_value(args, &mut i, "a value"));
            }
            "--no-default-functions" => {
                opts.no_default_functions = true;
            }
            arg if arg.starts_with('-') => {
                eprintln!("Error: Unknown option: {}", arg);
                print_usage();
                std::process::exit(1);
            }
            _ => {
                if opts.file_path.is_none() {
                    opts.file_path = Some(PathBuf::from(&args[i]));
                } else {
                    eprintln!("Error: Unexpected argument: {}", args[i]);
                    print_usage();
                    std::process::exit(1);
                }
            }
        }
        i += 1;
    }
    opts
}

fn run(mut opts: Options) -> anyhow::Result<bool> {
    // Autoload default functions first, then user-specified functions.
    default_functions::prepend_default_functions_if_present(
        &mut opts.functions_files,
        opts.no_default_functions,
    );

    let mut doc = Document::with_file(opts.file_path, opts.functions_files)?;

    if let Some(tempo) = opts.tempo {
        let bpm: f64 = tempo
            .trim()
            .parse()
            .with_context(|| format!("invalid tempo: {tempo}"))?;
        doc.set_tempo(bpm)?;
    }

    if let Some(output_path) = &opts.output_file {
        doc.export_markdown(output_path)
            .with_context(|| format!("failed to export {}", output_path.display()))?;
        eprintln!("Exported to {}", output_path.display());
    }

    if let Some(command) = opts.command {
        if command.trim().is_empty() {
            bail!("--command requires a non-empty formula");
        }
        let value = doc.eval_command(&command);
        println!("{}", format_value(&value));
        return Ok(!value.is_error());
    }

    if opts.output_file.is_none() {
        print!("{}", markdown_content(&doc));
    }
    Ok(true)
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();
    let opts = parse_args(&args);

    match run(opts) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}
