//! cfi - EPUB CFI inspection tool
//!
//! Parses CFIs, resolves them against XHTML content documents and generates
//! them back, printing JSON.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use los_libros_cfi::cfi::{
    self, DocumentStep, ParseCache, ParsedAddress, ResolvedCfi, Span, SpanKind,
};
use los_libros_cfi::config::EngineConfig;
use los_libros_cfi::dom;
use los_libros_cfi::export;

#[derive(Parser)]
#[command(name = "cfi")]
#[command(version, about = "EPUB CFI inspection tool", long_about = None)]
#[command(after_help = "EXAMPLES:
    cfi parse 'epubcfi(/6/4!/4/2/1:3)'
    cfi resolve chapter.xhtml 'epubcfi(/6/4!/4,/2/1:0,/4/1:5)'
    cfi generate chapter.xhtml --start 'epubcfi(/6/4!/4/2/1:3)'")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the parsed steps of a CFI
    Parse {
        cfi: String,
    },
    /// Resolve a CFI in an XHTML content document
    Resolve {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        cfi: String,
    },
    /// Resolve positions and generate their CFI again
    Generate {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        /// CFI whose start is the first position
        #[arg(long)]
        start: String,
        /// CFI whose start is the second position
        #[arg(long)]
        end: Option<String>,
    },
    /// Print the CSS-safe identifiers for a CFI
    Ids {
        cfi: String,
    },
}

#[derive(Serialize)]
struct ResolveOutput {
    cfi: String,
    kind: SpanKind,
    text: String,
    safe_ranges: Vec<SafeRangeOutput>,
}

#[derive(Serialize)]
struct SafeRangeOutput {
    cfi: String,
    text: String,
}

#[derive(Serialize)]
struct GenerateOutput {
    input: String,
    generated: String,
    /// Whether a single input CFI was regenerated unchanged
    round_trip: bool,
}

#[derive(Serialize)]
struct IdsOutput {
    cfi: String,
    css_id: String,
    attr: String,
}

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "los_libros_cfi=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Load configuration
    dotenvy::dotenv().ok();

    let config = EngineConfig::from_env().unwrap_or_else(|e| {
        tracing::warn!("Failed to load config from env: {}, using defaults", e);
        EngineConfig::default()
    });
    let mut cache = ParseCache::new(config.cache_capacity);

    let cli = Cli::parse();
    match cli.command {
        Command::Parse { cfi } => {
            let address = cache.parse(&cfi).context("parsing CFI")?;
            print_json(address.as_ref())
        }
        Command::Resolve { file, cfi } => resolve(&mut cache, &file, &cfi),
        Command::Generate { file, start, end } => {
            generate(&mut cache, &config, &file, &start, end.as_deref())
        }
        Command::Ids { cfi } => {
            let canonical = cache.parse(&cfi).context("parsing CFI")?.to_string();
            print_json(&IdsOutput {
                css_id: export::css_safe_id(&canonical),
                attr: export::safe_attr(&canonical),
                cfi: canonical,
            })
        }
    }
}

fn resolve(cache: &mut ParseCache, file: &Path, cfi: &str) -> Result<()> {
    let source = read_document(file)?;
    let doc = dom::parse_xhtml(&source)
        .with_context(|| format!("loading {}", file.display()))?;

    let address = cache.parse(cfi).context("parsing CFI")?;
    let resolved = ResolvedCfi::new(address, doc.root_element())
        .with_context(|| format!("resolving {} in {}", cfi, file.display()))?;

    let document_step = document_step_of(resolved.address(), None)?;
    let safe_ranges = resolved
        .safe_ranges()
        .iter()
        .map(|range| SafeRangeOutput {
            cfi: cfi::cfi_for_range(&document_step, range).to_string(),
            text: range.text(),
        })
        .collect();

    print_json(&ResolveOutput {
        cfi: resolved.as_str().to_string(),
        kind: resolved.resolved().kind,
        text: resolved.text(),
        safe_ranges,
    })
}

fn generate(
    cache: &mut ParseCache,
    config: &EngineConfig,
    file: &Path,
    start: &str,
    end: Option<&str>,
) -> Result<()> {
    let source = read_document(file)?;
    let doc = dom::parse_xhtml(&source)
        .with_context(|| format!("loading {}", file.display()))?;
    let root = doc.root_element();

    let start_address = cache.parse(start).context("parsing start CFI")?;
    let document_step = document_step_of(&start_address, config.document_step.as_ref())?;
    let start_span = cfi::resolve(&start_address, root).context("resolving start CFI")?;

    let generated = match end {
        Some(end) => {
            let end_address = cache.parse(end).context("parsing end CFI")?;
            let end_span = cfi::resolve(&end_address, root).context("resolving end CFI")?;
            let span = Span::new(start_span.span.start, end_span.span.start);
            cfi::cfi_for_range(&document_step, &span)
        }
        None if start_span.kind == SpanKind::Range => {
            cfi::cfi_for_range(&document_step, &start_span.span)
        }
        None => cfi::cfi_for_position(&document_step, &start_span.span.start),
    };

    let input = match end {
        Some(end) => format!("{} .. {}", start_address, end.trim()),
        None => start_address.to_string(),
    };
    print_json(&GenerateOutput {
        round_trip: end.is_none() && input == generated.to_string(),
        generated: generated.to_string(),
        input,
    })
}

/// Configured document step, else the one the CFI itself starts with
fn document_step_of(
    address: &ParsedAddress,
    configured: Option<&DocumentStep>,
) -> Result<DocumentStep> {
    configured
        .cloned()
        .or_else(|| DocumentStep::of(address))
        .ok_or_else(|| anyhow!("{} does not start with a spine item step", address))
}

fn read_document(file: &Path) -> Result<String> {
    fs::read_to_string(file).with_context(|| format!("reading {}", file.display()))
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
