//! `dgraph`: discograph command-line interface.
//!
//! Subcommands for working with discourse-annotated documents:
//!
//! - **`check`**: build each document and report errors and warnings.
//! - **`forest`**: print the enclosure forest of each document.
//! - **`render`**: print a summary grouped by dialogue.
//! - **`dump`**: print everything that was built as JSON.
//!
//! All subcommands read JSON from a file path or from stdin (`-`): either a
//! single document record or an array of them.

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use discograph::render::{render_document, render_forest, render_report};
use discograph::{Built, Config, Document, DocumentRecord, IssueCode};
use serde::Serialize;

/// dgraph: discourse structure checker
///
/// Rebuild and validate discourse structure over stand-off annotations.
#[derive(Parser)]
#[command(name = "dgraph", version, about, long_about = None)]
struct Cli {
    /// JSON config file (rank table, checks, expected features).
    #[arg(long, global = true, env = "DGRAPH_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build documents and report what is wrong with them.
    ///
    /// Errors are listed before warnings for each document. Exits 0 if no
    /// document has errors, 1 otherwise (including unreadable records).
    ///
    /// Pass `-` as FILE to read from stdin.
    Check {
        /// Path to a JSON file, or `-` for stdin.
        file: PathBuf,

        /// Print the reports as JSON instead of text.
        #[arg(long)]
        json: bool,

        /// Leave out findings with this code. Repeat for several codes:
        /// --skip DegenerateSpan --skip Disconnected
        #[arg(long = "skip", value_name = "CODE")]
        skip: Vec<IssueCode>,
    },

    /// Print the enclosure forest of each document as a tree.
    Forest {
        /// Path to a JSON file, or `-` for stdin.
        file: PathBuf,
    },

    /// Print a per-dialogue summary of each document.
    Render {
        /// Path to a JSON file, or `-` for stdin.
        file: PathBuf,
    },

    /// Print every built structure as JSON.
    Dump {
        /// Path to a JSON file, or `-` for stdin.
        file: PathBuf,
    },
}

#[derive(Serialize)]
struct ReportOut<'a> {
    document: &'a str,
    #[serde(flatten)]
    report: &'a discograph::ValidationReport,
}

fn main() {
    // Logs go to stderr.
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "discograph=info,dgraph=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::from_path(path).unwrap_or_else(|e| fatal(&e.to_string())),
        None => Config::default(),
    };

    match cli.command {
        Command::Check { file, json, skip } => {
            let (records, skipped) = parse_records(&read_input(&file));
            let mut any_errors = skipped > 0;
            let mut reports = Vec::with_capacity(records.len());
            for record in records {
                let Built { document, mut report } = Document::build(record, &config);
                for code in &skip {
                    report = report.without(*code);
                }
                any_errors |= report.has_errors();
                tracing::info!(
                    document = %document.id(),
                    errors = report.errors.len(),
                    warnings = report.warnings.len(),
                    "checked"
                );
                if json {
                    reports.push((document.id().to_string(), report));
                } else {
                    print!("{}", render_report(document.id(), &report));
                }
            }
            if json {
                let out: Vec<ReportOut<'_>> = reports
                    .iter()
                    .map(|(id, report)| ReportOut {
                        document: id,
                        report,
                    })
                    .collect();
                println!("{}", to_json(&out));
            }
            if any_errors {
                process::exit(1);
            }
        }

        Command::Forest { file } => {
            for record in parse_records(&read_input(&file)).0 {
                let built = Document::build(record, &config);
                println!("# {}", built.document.id());
                print!("{}", render_forest(&built.document));
            }
        }

        Command::Render { file } => {
            for record in parse_records(&read_input(&file)).0 {
                let built = Document::build(record, &config);
                print!("{}", render_document(&built.document));
            }
        }

        Command::Dump { file } => {
            let built: Vec<Built> = parse_records(&read_input(&file))
                .0
                .into_iter()
                .map(|record| Document::build(record, &config))
                .collect();
            let dumps: Vec<_> = built.iter().map(|b| b.document.dump()).collect();
            println!("{}", to_json(&dumps));
        }
    }
}

/// Read the full contents of a file, or stdin when the path is `"-"`.
fn read_input(path: &Path) -> String {
    if path.to_str() == Some("-") {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .unwrap_or_else(|e| fatal(&format!("failed to read stdin: {}", e)));
        buf
    } else {
        fs::read_to_string(path)
            .unwrap_or_else(|e| fatal(&format!("failed to read {}: {}", path.display(), e)))
    }
}

/// Parse a JSON string as either an array of records or a single record.
///
/// Array elements that are not valid records are reported and skipped; the
/// second value counts them.
fn parse_records(json: &str) -> (Vec<DocumentRecord>, usize) {
    if let Ok(values) = serde_json::from_str::<Vec<serde_json::Value>>(json) {
        if values.is_empty() {
            fatal("input contains an empty array, nothing to process");
        }
        let mut records = Vec::with_capacity(values.len());
        let mut skipped = 0;
        for (i, value) in values.into_iter().enumerate() {
            match serde_json::from_value::<DocumentRecord>(value) {
                Ok(record) => records.push(record),
                Err(e) => {
                    eprintln!("dgraph: skipping document {}: {}", i, e);
                    skipped += 1;
                }
            }
        }
        return (records, skipped);
    }
    match serde_json::from_str::<DocumentRecord>(json) {
        Ok(record) => (vec![record], 0),
        Err(e) => fatal(&format!("failed to parse input as a document record: {}", e)),
    }
}

fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value)
        .unwrap_or_else(|e| fatal(&format!("failed to serialise output: {}", e)))
}

/// Print an error message to stderr and exit with code 2.
fn fatal(msg: &str) -> ! {
    eprintln!("dgraph: {}", msg);
    process::exit(2);
}
