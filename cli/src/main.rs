//! corpus-clean CLI - corpus text normalization tool
//!
//! A command-line tool for turning raw TXT/JSON/JSONL corpora into clean
//! plain text.

use clap::{ArgAction, Args, Parser, Subcommand};
use colored::*;
use corpus_clean::{clean_file, clean_text, PipelineOptions, RunSummary};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Corpus cleaning for language-model training text
#[derive(Parser)]
#[command(
    name = "corpus-clean",
    version,
    about = "Clean TXT/JSON/JSONL corpora into plain training text",
    long_about = "corpus-clean - parallel corpus text normalization.\n\n\
                  Extracts known fields from JSON/JSONL, strips punctuation, noise phrases\n\
                  and foreign characters, converts traditional to simplified script and\n\
                  writes size-bounded numbered .txt files.\n\n\
                  Usage:\n  \
                  corpus-clean <input> <output>          Clean a directory tree\n  \
                  corpus-clean file <input> <output>     Clean a single file\n  \
                  corpus-clean normalize [text]          Clean text from the argument or stdin"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Input directory (for the default run)
    input: Option<PathBuf>,

    /// Output directory (for the default run)
    output: Option<PathBuf>,

    #[command(flatten)]
    pipeline: PipelineArgs,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Clean every supported file under a directory (default command)
    Run {
        /// Input directory
        input: PathBuf,

        /// Output directory
        output: PathBuf,

        /// Print the run summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Clean a single file
    File {
        /// Input file path
        input: PathBuf,

        /// Output directory
        output: PathBuf,
    },

    /// Normalize text and print the result
    Normalize {
        /// Text to normalize (default: each line of stdin)
        text: Option<String>,
    },

    /// Show version information
    Version,
}

/// Pipeline options shared by every command.
#[derive(Args, Debug)]
struct PipelineArgs {
    /// Load options from a JSON file; flags override it
    #[arg(long, global = true, value_name = "JSON")]
    config: Option<PathBuf>,

    /// Stopword list (one word per line); enables stopword filtering
    #[arg(long, global = true, value_name = "PATH")]
    stopwords: Option<PathBuf>,

    /// Keep traditional characters
    #[arg(long, global = true)]
    no_convert: bool,

    /// Keep CJK ideographs only, dropping ASCII letters and digits
    #[arg(long, global = true)]
    cjk_only: bool,

    /// Apply Unicode NFC normalization first
    #[arg(long, global = true)]
    nfc: bool,

    /// Fail files containing invalid UTF-8 instead of repairing them
    #[arg(long, global = true)]
    strict_utf8: bool,

    /// Strip leftover JSON keys from unparsed text
    #[arg(long, global = true)]
    strip_json_residue: bool,

    /// Maximum characters per output line
    #[arg(long, global = true, value_name = "CHARS")]
    max_line_length: Option<usize>,

    /// Maximum bytes per output file
    #[arg(long, global = true, value_name = "BYTES")]
    max_file_size: Option<usize>,

    /// Buffered bytes that trigger a flush
    #[arg(long, global = true, value_name = "BYTES")]
    chunk_threshold: Option<usize>,

    /// Worker cap (bounded by available CPUs)
    #[arg(long, global = true, value_name = "N")]
    workers: Option<usize>,

    /// Per-file timeout in seconds (0 disables it)
    #[arg(long, global = true, value_name = "SECS")]
    timeout: Option<u64>,

    /// Process files one at a time
    #[arg(long, global = true)]
    sequential: bool,

    /// Name a single output `<name>.txt` instead of `<name>_1.txt`
    #[arg(long, global = true)]
    compact_names: bool,
}

impl PipelineArgs {
    fn to_options(&self) -> corpus_clean::Result<PipelineOptions> {
        let mut options = match &self.config {
            Some(path) => PipelineOptions::from_json_file(path)?,
            None => PipelineOptions::default(),
        };

        if let Some(path) = &self.stopwords {
            options = options.with_stopwords(path);
        }
        if self.no_convert {
            options = options.without_script_conversion();
        }
        if self.cjk_only {
            options = options.cjk_only();
        }
        if self.nfc {
            options = options.with_nfc();
        }
        if self.strict_utf8 {
            options = options.with_strict_utf8();
        }
        if self.strip_json_residue {
            options = options.with_json_residue_stripping();
        }
        if let Some(chars) = self.max_line_length {
            options = options.with_max_line_length(chars);
        }
        if let Some(bytes) = self.max_file_size {
            options = options.with_max_file_size(bytes);
        }
        if let Some(bytes) = self.chunk_threshold {
            options = options.with_chunk_threshold(bytes);
        }
        if let Some(workers) = self.workers {
            options = options.with_max_workers(workers);
        }
        if let Some(secs) = self.timeout {
            let timeout = (secs > 0).then(|| Duration::from_secs(secs));
            options = options.with_file_timeout(timeout);
        }
        if self.sequential {
            options = options.sequential();
        }
        if self.compact_names {
            options = options.with_compact_names();
        }

        Ok(options)
    }
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let Some(command) = cli.command else {
        // Default command (corpus-clean <input> <output>)
        return match (cli.input, cli.output) {
            (Some(input), Some(output)) => run_directory(input, output, &cli.pipeline, false),
            _ => {
                use clap::CommandFactory;
                Cli::command().print_help()?;
                Ok(())
            }
        };
    };

    match command {
        Commands::Run {
            input,
            output,
            json,
        } => {
            run_directory(input, output, &cli.pipeline, json)?;
        }

        Commands::File { input, output } => {
            let options = cli.pipeline.to_options()?.with_output_dir(&output);
            let pb = create_spinner("Cleaning file...");
            let result = clean_file(&input, options);
            pb.finish_and_clear();

            let report = result?;
            if report.is_empty() {
                println!("{} Nothing left after cleaning", "!".yellow().bold());
            } else {
                println!(
                    "{} Cleaned {} into {} file(s)",
                    "✓".green().bold(),
                    input.display(),
                    report.outputs.len()
                );
                for path in &report.outputs {
                    println!("  {} {}", "✓".green(), path.display());
                }
            }
            if report.skipped_units > 0 {
                println!(
                    "{} {} malformed JSON unit(s) skipped",
                    "!".yellow().bold(),
                    report.skipped_units
                );
            }
        }

        Commands::Normalize { text } => {
            let options = cli.pipeline.to_options()?;
            let stdout = io::stdout();
            let mut out = stdout.lock();

            match text {
                Some(text) => {
                    if let Some(cleaned) = clean_text(&text, &options)? {
                        writeln!(out, "{}", cleaned)?;
                    }
                }
                None => {
                    for line in io::stdin().lock().lines() {
                        if let Some(cleaned) = clean_text(&line?, &options)? {
                            writeln!(out, "{}", cleaned)?;
                        }
                    }
                }
            }
        }

        Commands::Version => {
            print_version();
        }
    }

    Ok(())
}

/// Cleans a directory tree and prints the summary.
fn run_directory(
    input: PathBuf,
    output: PathBuf,
    args: &PipelineArgs,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let options = args
        .to_options()?
        .with_input_dir(&input)
        .with_output_dir(&output);
    tracing::debug!(?options, "resolved options");

    let pb = create_spinner("Cleaning corpus...");
    let result = corpus_clean::clean_directory(options);
    pb.finish_and_clear();
    let summary = result?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary_json(&summary))?);
    } else {
        print_summary(&output, &summary);
    }
    Ok(())
}

fn summary_json(summary: &RunSummary) -> serde_json::Value {
    let failed: Vec<serde_json::Value> = summary
        .failed()
        .map(|(path, error)| {
            serde_json::json!({
                "path": path.display().to_string(),
                "error": error.to_string(),
            })
        })
        .collect();
    let skipped: Vec<String> = summary
        .skipped
        .iter()
        .map(|p| p.display().to_string())
        .collect();

    serde_json::json!({
        "succeeded": summary.success_count(),
        "failed": failed,
        "skipped": skipped,
        "outputs": summary.output_count(),
        "skipped_units": summary.skipped_units(),
    })
}

fn print_summary(output: &std::path::Path, summary: &RunSummary) {
    let heading = if summary.failure_count() == 0 {
        "Cleaning Complete".green().bold()
    } else {
        "Cleaning Finished With Failures".yellow().bold()
    };
    println!("{}", heading);
    println!("{}", "─".repeat(40));
    println!("{}: {}", "Output".bold(), output.display());
    println!("{}: {}", "Files cleaned".bold(), summary.success_count());
    println!("{}: {}", "Files written".bold(), summary.output_count());
    println!("{}: {}", "Unsupported".bold(), summary.skipped.len());
    if summary.skipped_units() > 0 {
        println!("{}: {}", "Malformed JSON units".bold(), summary.skipped_units());
    }

    if !summary.skipped.is_empty() {
        println!("\n{}", "Skipped (unsupported type)".yellow().bold());
        println!("{}", "─".repeat(40));
        for path in &summary.skipped {
            println!("  {} {}", "-".yellow(), path.display());
        }
    }

    if summary.failure_count() > 0 {
        println!("\n{}", "Failures".red().bold());
        println!("{}", "─".repeat(40));
        for (path, error) in summary.failed() {
            println!("  {} {}: {}", "✗".red(), path.display(), error);
        }
    }
}

fn print_version() {
    println!("{} {}", "corpus-clean".green().bold(), env!("CARGO_PKG_VERSION"));
    println!("Parallel corpus text normalization for language-model training");
    println!();
    println!("Supported inputs: JSON, JSONL, TXT, YAML, XML, CSV, extensionless text");
}

fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
            .template("{spinner:.blue} {msg}")
            .unwrap(),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}
