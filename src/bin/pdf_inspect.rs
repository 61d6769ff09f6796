//! Inspect a PDF file
//!
//! Prints the version, object count, encryption state and page count, and
//! optionally writes a compacted, renumbered copy.
//!
//! Usage:
//!   pdf_inspect <file.pdf> [--password P] [--json] [--rewrite OUT.pdf]
//!
//! Set `RUST_LOG=debug` to trace the load pipeline.

use pdf_forge::document::{Document, OpenMode, OpenOptions};
use pdf_forge::encryption::PasswordValidity;
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;

struct InspectConfig {
    input: PathBuf,
    password: Option<Vec<u8>>,
    json: bool,
    rewrite: Option<PathBuf>,
}

impl InspectConfig {
    fn from_args() -> Result<Self, String> {
        let args: Vec<String> = std::env::args().collect();
        let mut input = None;
        let mut password = None;
        let mut json = false;
        let mut rewrite = None;

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--password" | "-p" => {
                    i += 1;
                    let value = args.get(i).ok_or("--password needs a value")?;
                    password = Some(value.as_bytes().to_vec());
                },
                "--json" => json = true,
                "--rewrite" | "-o" => {
                    i += 1;
                    let value = args.get(i).ok_or("--rewrite needs an output path")?;
                    rewrite = Some(PathBuf::from(value));
                },
                flag if flag.starts_with('-') => return Err(format!("unknown option {}", flag)),
                path => input = Some(PathBuf::from(path)),
            }
            i += 1;
        }

        Ok(Self {
            input: input.ok_or("missing input file")?,
            password,
            json,
            rewrite,
        })
    }
}

#[derive(Debug, Serialize)]
struct Summary {
    file: String,
    version: String,
    objects: usize,
    encrypted: bool,
    /// "owner", "user" or absent for unencrypted files
    access: Option<&'static str>,
    pages: usize,
    rewritten_to: Option<String>,
}

fn inspect(config: &InspectConfig) -> pdf_forge::Result<Summary> {
    let mut options = OpenOptions::default().with_mode(if config.rewrite.is_some() {
        OpenMode::Modify
    } else {
        OpenMode::ReadOnly
    });
    if let Some(password) = &config.password {
        options = options.with_password(password.clone());
    }

    let mut doc = Document::open_with_options(&config.input, options)?;
    let (major, minor) = doc.version();
    let access = doc.security().map(|s| match s.validity() {
        PasswordValidity::Owner => "owner",
        PasswordValidity::User => "user",
        PasswordValidity::Invalid => "none",
    });

    let mut summary = Summary {
        file: config.input.display().to_string(),
        version: format!("{}.{}", major, minor),
        objects: doc.table().len(),
        encrypted: doc.is_encrypted(),
        access,
        pages: doc.pages()?.len(),
        rewritten_to: None,
    };

    if let Some(out) = &config.rewrite {
        doc.save(out)?;
        summary.rewritten_to = Some(out.display().to_string());
    }
    Ok(summary)
}

fn main() -> ExitCode {
    env_logger::init();

    let config = match InspectConfig::from_args() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Usage: pdf_inspect <file.pdf> [--password P] [--json] [--rewrite OUT.pdf]");
            return ExitCode::from(2);
        },
    };

    let summary = match inspect(&config) {
        Ok(summary) => summary,
        Err(e) => {
            eprintln!("Error: {}: {}", config.input.display(), e);
            return ExitCode::FAILURE;
        },
    };

    if config.json {
        match serde_json::to_string_pretty(&summary) {
            Ok(text) => println!("{}", text),
            Err(e) => {
                eprintln!("Error: cannot encode summary: {}", e);
                return ExitCode::FAILURE;
            },
        }
    } else {
        println!("File:      {}", summary.file);
        println!("Version:   PDF {}", summary.version);
        println!("Objects:   {}", summary.objects);
        match summary.access {
            Some(access) => println!("Encrypted: yes (opened with {} access)", access),
            None => println!("Encrypted: no"),
        }
        println!("Pages:     {}", summary.pages);
        if let Some(out) = &summary.rewritten_to {
            println!("Rewritten: {}", out);
        }
    }
    ExitCode::SUCCESS
}
