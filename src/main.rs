use anyhow::{bail, Context, Result};
use clap::{Parser as _, Subcommand};
use course_import::{
    default_store, import_batch, ImportConfig, ImportInput, JobStore, ParserRegistry, Source,
};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

#[derive(clap::Parser)]
#[command(name = "course-import")]
#[command(about = "Import course content from CSV, JSON, Markdown, text, DOCX, SCORM and ZIP")]
#[command(version)]
struct Cli {
    /// JSON config file; missing keys keep their defaults
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose logging (ignored when RUST_LOG is set)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse one file and print the result as JSON
    Parse {
        path: PathBuf,

        /// Skip detection and use this format (csv, json, markdown, text, docx, scorm, zip)
        #[arg(short, long)]
        format: Option<String>,

        /// Single-line JSON
        #[arg(long)]
        compact: bool,
    },

    /// Print which parser would claim a file
    Detect { path: PathBuf },

    /// List registered formats in dispatch order
    Formats,

    /// Parse files and directories as one tracked batch job
    Import {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = match &cli.config {
        Some(path) => ImportConfig::from_file(path)?,
        None => ImportConfig::default(),
    };
    let registry = ParserRegistry::with_config(&config);

    match cli.command {
        Commands::Parse {
            path,
            format,
            compact,
        } => {
            let bytes = read_input(&path)?;
            let result = registry
                .parse_with_hint(Source::Bytes(&bytes), file_name(&path), format.as_deref())
                .with_context(|| format!("Failed to parse {}", path.display()))?;

            for warning in &result.warnings {
                debug!(%warning, "parse warning");
            }
            let dict = result.to_dict();
            let out = if compact {
                serde_json::to_string(&dict)?
            } else {
                serde_json::to_string_pretty(&dict)?
            };
            println!("{}", out);
        }

        Commands::Detect { path } => {
            let bytes = read_input(&path)?;
            match registry.select(Source::Bytes(&bytes), file_name(&path)) {
                Some(parser) => println!("{}", parser.format()),
                None => bail!("No parser can handle {}", path.display()),
            }
        }

        Commands::Formats => {
            for format in registry.formats() {
                println!("{}", format);
            }
        }

        Commands::Import { paths } => {
            let files = collect_files(&paths)?;
            if files.is_empty() {
                bail!("No files found to import");
            }
            info!(count = files.len(), "importing files");

            let inputs = files
                .iter()
                .map(|path| {
                    read_input(path).map(|bytes| ImportInput::new(path.display().to_string(), bytes))
                })
                .collect::<Result<Vec<_>>>()?;

            let store = default_store();
            let outcome = import_batch(store, &registry, &inputs);
            let record = store
                .get_job(&outcome.task_id)
                .context("Import job disappeared from the job store")?;

            println!("{}", serde_json::to_string_pretty(&record)?);
            if outcome.succeeded() == 0 {
                bail!("All {} file(s) failed to import", outcome.results.len());
            }
        }
    }

    Ok(())
}

fn read_input(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn file_name(path: &Path) -> Option<&str> {
    path.file_name().and_then(|n| n.to_str())
}

fn is_hidden(entry: &walkdir::DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .map(|name| name.starts_with('.'))
            .unwrap_or(false)
}

/// Expand directories into their files, sorted for stable job output
fn collect_files(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for path in paths {
        if path.is_file() {
            files.push(path.clone());
            continue;
        }
        if !path.is_dir() {
            bail!("No such file or directory: {}", path.display());
        }

        let mut found = Vec::new();
        for entry in WalkDir::new(path)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| !is_hidden(e))
        {
            let entry = entry.context("Failed to read directory entry")?;
            if entry.file_type().is_file() {
                found.push(entry.into_path());
            }
        }
        found.sort();
        files.extend(found);
    }

    Ok(files)
}
