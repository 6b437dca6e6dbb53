//! PDF Toolkit CLI tool
//!
//! A command-line tool for splitting, rotating, deleting, merging and
//! watermarking PDF pages.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use glob::glob;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process;
use tempfile::NamedTempFile;
use tracing_subscriber::EnvFilter;

use pdf_toolkit::pdf::{Opacity, OverlaySource, WatermarkOptions};
use pdf_toolkit::toolkit::{self, RotateTarget};

/// PDF Toolkit - split, rotate, delete, merge and watermark PDF pages
#[derive(Parser)]
#[command(name = "pdf-toolkit")]
#[command(author, version, about, long_about = None)]
#[command(after_help = "EXAMPLES:
    # Keep pages 1 to 3 and page 5
    pdf-toolkit split report.pdf --pages \"1-3,5\"

    # Rotate pages 2 and 4 by 90 degrees
    pdf-toolkit rotate report.pdf --pages \"2,4\" --rotation 90

    # Remove the cover page
    pdf-toolkit delete report.pdf --pages 1 -o report_body.pdf

    # Stamp a logo at 30% opacity on every page
    pdf-toolkit watermark report.pdf logo.png

    # Merge numbered PDFs in order
    pdf-toolkit merge -o merged.pdf \"[0-9]*.pdf\"")]
struct Cli {
    /// Increase log output (-v info, -vv debug). RUST_LOG overrides this.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show information about a PDF file
    Info {
        /// PDF file to inspect
        input: PathBuf,
    },

    /// Print the text of every page
    Text {
        /// PDF file to read
        input: PathBuf,
    },

    /// Merge multiple PDF files into one
    Merge {
        /// Input PDF files (in order). Supports glob patterns like "*.pdf"
        #[arg(required = true)]
        inputs: Vec<String>,

        /// Output PDF file path
        #[arg(short, long, default_value = "merged.pdf")]
        output: PathBuf,
    },

    /// Keep only the selected pages
    Split {
        /// Input PDF file
        input: PathBuf,

        /// Page ranges, e.g. "1-3,5,7-9"
        #[arg(short, long)]
        pages: String,

        /// Output PDF file path [default: <input>_split.pdf]
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Rotate all pages or the selected pages
    Rotate {
        /// Input PDF file
        input: PathBuf,

        /// Rotation in degrees, a multiple of 90
        #[arg(short, long, default_value_t = 90, allow_negative_numbers = true)]
        rotation: i64,

        /// Page ranges to rotate, e.g. "1,3,5-7" (all pages when omitted)
        #[arg(short, long)]
        pages: Option<String>,

        /// Output PDF file path [default: <input>_rotated.pdf]
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Remove the selected pages
    Delete {
        /// Input PDF file
        input: PathBuf,

        /// Page ranges to remove, e.g. "1,3,5-7"
        #[arg(short, long)]
        pages: String,

        /// Output PDF file path [default: <input>_pages_deleted.pdf]
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Stamp an image or the first page of a PDF on every page
    Watermark {
        /// Input PDF file
        input: PathBuf,

        /// Watermark file (pdf, png, jpg, jpeg, gif or bmp)
        watermark: PathBuf,

        /// Opacity applied to image watermarks (0.0 - 1.0)
        #[arg(long, env = "PDF_TOOLKIT_OPACITY", default_value_t = 0.3)]
        opacity: f64,

        /// Output PDF file path
        #[arg(short, long, default_value = "watermarked.pdf")]
        output: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Info { input } => cmd_info(&input),
        Commands::Text { input } => cmd_text(&input),
        Commands::Merge { inputs, output } => cmd_merge(inputs, &output),
        Commands::Split { input, pages, output } => cmd_split(&input, &pages, output),
        Commands::Rotate { input, rotation, pages, output } => {
            cmd_rotate(&input, rotation, pages.as_deref(), output)
        }
        Commands::Delete { input, pages, output } => cmd_delete(&input, &pages, output),
        Commands::Watermark { input, watermark, opacity, output } => {
            cmd_watermark(&input, &watermark, opacity, &output)
        }
    };

    if let Err(e) = result {
        // Rejections caused by the request itself get their reason code
        if let Some(toolkit_error) = e.downcast_ref::<pdf_toolkit::Error>() {
            if !matches!(toolkit_error, pdf_toolkit::Error::Io(_)) {
                eprintln!("Error [{}]: {:#}", toolkit_error.code(), e);
                process::exit(2);
            }
        }
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

/// Send tracing output to stderr, filtered by RUST_LOG or the -v count
fn init_logging(verbose: u8) {
    let filter = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(io::stderr)
        .init();
}

/// Expand glob patterns in input paths
fn expand_globs(patterns: Vec<String>) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();

    for pattern in patterns {
        // Check if pattern contains glob characters
        if pattern.contains('*') || pattern.contains('?') || pattern.contains('[') {
            let mut matched: Vec<PathBuf> = glob(&pattern)
                .with_context(|| format!("Invalid glob pattern: {}", pattern))?
                .filter_map(|entry| match entry {
                    Ok(path) => Some(path),
                    Err(e) => {
                        tracing::warn!("glob error for {}: {}", pattern, e);
                        None
                    }
                })
                .collect();

            if matched.is_empty() {
                anyhow::bail!("No files matched pattern: {}", pattern);
            }

            // Sort matches for consistent ordering
            matched.sort();
            paths.extend(matched);
        } else {
            // No glob characters, treat as literal path
            paths.push(PathBuf::from(pattern));
        }
    }

    Ok(paths)
}

/// Read an input file fully into memory
fn read_input(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))
}

/// Write output through a temporary file that only replaces `path` on success
///
/// The temporary file lives next to the destination so the final rename
/// stays on one filesystem; it is deleted if anything fails before persist.
fn write_output(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut temp = NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temporary file in {}", dir.display()))?;
    temp.write_all(bytes).context("Failed to write output")?;
    temp.persist(path)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    eprintln!("Output: {}", path.display());
    Ok(())
}

/// `<dir>/<stem><suffix>.pdf` next to the input file
fn derived_output(input: &Path, suffix: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    input.with_file_name(format!("{}{}.pdf", stem, suffix))
}

/// Show information about a PDF
fn cmd_info(input: &Path) -> Result<()> {
    let metadata = toolkit::info(&read_input(input)?)?;

    println!("File: {}", input.display());
    println!("Pages: {}", metadata.page_count);
    println!("Size: {} bytes", metadata.byte_len);

    if let Some(title) = metadata.title {
        println!("Title: {}", title);
    }
    if let Some(author) = metadata.author {
        println!("Author: {}", author);
    }

    Ok(())
}

/// Print the text of every page
fn cmd_text(input: &Path) -> Result<()> {
    let text = toolkit::text(&read_input(input)?)?;
    io::stdout()
        .write_all(text.as_bytes())
        .context("Failed to write to stdout")?;
    Ok(())
}

/// Merge multiple PDFs into one
fn cmd_merge(inputs: Vec<String>, output: &Path) -> Result<()> {
    let inputs = expand_globs(inputs)?;

    eprintln!("Merging {} PDF files...", inputs.len());

    let documents = inputs
        .iter()
        .map(|path| read_input(path))
        .collect::<Result<Vec<_>>>()?;

    let merged = toolkit::merge(&documents)?;
    write_output(output, &merged)
}

/// Keep only the selected pages
fn cmd_split(input: &Path, pages: &str, output: Option<PathBuf>) -> Result<()> {
    let output = output.unwrap_or_else(|| derived_output(input, "_split"));
    let result = toolkit::split(&read_input(input)?, pages)?;
    write_output(&output, &result)
}

/// Rotate all or selected pages
fn cmd_rotate(input: &Path, rotation: i64, pages: Option<&str>, output: Option<PathBuf>) -> Result<()> {
    let output = output.unwrap_or_else(|| derived_output(input, "_rotated"));
    let target = match pages {
        Some(expression) => RotateTarget::Pages(expression),
        None => RotateTarget::All,
    };

    let result = toolkit::rotate(&read_input(input)?, target, rotation)?;
    write_output(&output, &result)
}

/// Remove the selected pages
fn cmd_delete(input: &Path, pages: &str, output: Option<PathBuf>) -> Result<()> {
    let output = output.unwrap_or_else(|| derived_output(input, "_pages_deleted"));
    let result = toolkit::delete_pages(&read_input(input)?, pages)?;
    write_output(&output, &result)
}

/// Stamp a watermark on every page
fn cmd_watermark(input: &Path, watermark: &Path, opacity: f64, output: &Path) -> Result<()> {
    let options = WatermarkOptions {
        opacity: Opacity::new(opacity)?,
    };

    let extension = watermark
        .extension()
        .map(|ext| ext.to_string_lossy().into_owned())
        .unwrap_or_default();
    let source = OverlaySource::from_extension(&extension, read_input(watermark)?)
        .with_context(|| format!("Invalid watermark file {}", watermark.display()))?;

    let result = toolkit::watermark(&read_input(input)?, &source, &options)?;
    write_output(output, &result)
}
