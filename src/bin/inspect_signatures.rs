//! Inspect PDF Signatures
//!
//! Prints one JSON document per input file describing every signature:
//! signer, integrity, timestamp, revision coverage and permissions.
//!
//! Usage:
//!   cargo run --release --bin inspect_signatures -- signed.pdf [more.pdf ...]
//!   cargo run --release --bin inspect_signatures -- --sequential --compact signed.pdf
//!
//! Logging is controlled with `RUST_LOG` (e.g. `RUST_LOG=pdf_sigcheck=debug`).

use std::path::PathBuf;
use std::process::ExitCode;

use pdf_sigcheck::document::PdfDocument;
use pdf_sigcheck::{InspectConfig, ReportBuilder};
use serde::Serialize;

struct CliConfig {
    files: Vec<PathBuf>,
    sequential: bool,
    compact: bool,
    strict_digests: bool,
}

impl CliConfig {
    fn from_args() -> Result<Self, String> {
        let mut files = Vec::new();
        let mut sequential = false;
        let mut compact = false;
        let mut strict_digests = false;

        for arg in std::env::args().skip(1) {
            match arg.as_str() {
                "--sequential" => sequential = true,
                "--compact" => compact = true,
                "--strict-digests" => strict_digests = true,
                "--help" | "-h" => return Err(usage()),
                flag if flag.starts_with("--") => {
                    return Err(format!("Unknown option {}\n\n{}", flag, usage()));
                },
                path => files.push(PathBuf::from(path)),
            }
        }

        if files.is_empty() {
            return Err(usage());
        }

        Ok(Self {
            files,
            sequential,
            compact,
            strict_digests,
        })
    }

    fn inspect_config(&self) -> InspectConfig {
        InspectConfig::new()
            .with_parallel(!self.sequential)
            .with_weak_digests(!self.strict_digests)
    }
}

fn usage() -> String {
    "Usage: inspect_signatures [--sequential] [--compact] [--strict-digests] <file.pdf>..."
        .to_string()
}

#[derive(Serialize)]
struct FileReport<'a> {
    file: String,
    page_count: usize,
    field_errors: Vec<String>,
    signatures: &'a [pdf_sigcheck::SignatureReport],
}

fn inspect(path: &PathBuf, config: &CliConfig) -> pdf_sigcheck::Result<String> {
    let doc = PdfDocument::open(path)?;
    for error in doc.field_errors() {
        log::warn!("{}: {}", path.display(), error);
    }

    let reports = ReportBuilder::new(config.inspect_config()).inspect(&doc)?;
    let output = FileReport {
        file: path.display().to_string(),
        page_count: doc.page_count(),
        field_errors: doc.field_errors().iter().map(|e| e.to_string()).collect(),
        signatures: &reports,
    };

    let json = if config.compact {
        serde_json::to_string(&output)?
    } else {
        serde_json::to_string_pretty(&output)?
    };
    Ok(json)
}

fn main() -> ExitCode {
    env_logger::init();

    let config = match CliConfig::from_args() {
        Ok(config) => config,
        Err(message) => {
            eprintln!("{}", message);
            return ExitCode::from(2);
        },
    };

    let mut failed = 0;
    for path in &config.files {
        match inspect(path, &config) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Error: {}: {}", path.display(), e);
                failed += 1;
            },
        }
    }

    if failed > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
