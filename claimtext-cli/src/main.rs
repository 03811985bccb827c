use anyhow::Result;
use clap::{Parser, ValueEnum};
use std::path::{Path, PathBuf};

// Import from claimtext-core
use claimtext_core::config::RecognitionBackendKind;
use claimtext_core::{DocumentProcessor, ExtractionConfig, ExtractionResult};

use claimtext::{default_output_path, require_input};
#[cfg(feature = "onnx-embedder")]
use claimtext::ModelManager;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Backend {
    /// Tesseract subprocess
    Local,
    /// Azure Document Intelligence read model
    Cloud,
}

impl From<Backend> for RecognitionBackendKind {
    fn from(backend: Backend) -> Self {
        match backend {
            Backend::Local => RecognitionBackendKind::Local,
            Backend::Cloud => RecognitionBackendKind::Cloud,
        }
    }
}

#[derive(Parser)]
#[command(name = "claimtext")]
#[command(about = "Recover, segment and classify text from claims documents")]
struct Args {
    /// Path to the document to process (image, PDF, DOCX, spreadsheet, EML or MSG)
    #[arg(short, long)]
    input: String,

    /// Opaque label stored on every record (including attachments)
    #[arg(short, long, default_value = "cli")]
    source: String,

    /// Path to custom config file (YAML format)
    #[arg(short, long)]
    config: Option<String>,

    /// Override the recognition backend from the config
    #[arg(short, long, value_enum)]
    backend: Option<Backend>,

    /// Directory holding model.onnx and tokenizer.json.
    /// If not specified, the model will be auto-downloaded on first use
    #[arg(long)]
    model_dir: Option<String>,

    /// Output file path (if not specified, auto-generated based on input)
    #[arg(short, long)]
    output: Option<String>,

    /// Only extract text; skip classification and record persistence
    #[arg(long)]
    extract_only: bool,

    /// Skip cache and force fresh extraction (useful for development/testing)
    #[arg(long)]
    skip_cache: bool,

    /// Enable detailed profiling of all pipeline steps
    #[arg(long)]
    profile: bool,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&args.log_level)),
        )
        .with_target(false)
        .init();

    println!("🦀 Claimtext Document Extractor");

    let input = Path::new(&args.input);
    if let Err(e) = require_input(input) {
        println!("⚠️  Input file not found at: {}", args.input);
        println!("   Please check the file path.");
        return Err(e);
    }

    let mut config = ExtractionConfig::load_with_fallback(args.config.as_deref());
    if let Some(config_path) = &args.config {
        println!("📋 Loaded config from: {}", config_path);
    } else {
        println!("📋 Using default config");
    }

    // Apply CLI overrides to config
    if let Some(backend) = args.backend {
        config.recognition.backend = backend.into();
    }
    if let Some(model_dir) = &args.model_dir {
        config.segmentation.model_dir = Some(PathBuf::from(model_dir));
    }

    let mut processor = create_processor(config)?;
    processor.set_skip_cache(args.skip_cache);
    processor.set_profiling(args.profile);
    if args.skip_cache {
        println!("🚫 Skipping cache (--skip-cache enabled)");
    }

    println!("📄 Processing: {}", args.input);
    let output_path = args
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(input, args.config.as_deref(), args.extract_only));

    let outcome = if args.extract_only {
        processor.extract(input).map(|result| {
            print_extraction_summary(&result);
            serde_json::to_string_pretty(&result)
        })
    } else {
        processor.ingest(input, &args.source).map(|record| {
            println!("✅ Successfully processed document");
            println!("📋 Classified as: {}", record.doc_type_predicted);
            println!("⏱️  Processing time: {}ms", record.processing_time_ms);
            serde_json::to_string_pretty(&record)
        })
    };

    match outcome {
        Ok(json) => {
            std::fs::write(&output_path, json?)?;
            processor.print_profile();
            println!("💾 Results saved to: {}", output_path);
        }
        Err(e) => {
            eprintln!("❌ Processing failed: {e}");
            std::process::exit(1);
        }
    }

    Ok(())
}

fn print_extraction_summary(result: &ExtractionResult) {
    println!("✅ Successfully extracted document");
    match result {
        ExtractionResult::Text(text) => println!("   - Text: {} chars", text.chars().count()),
        ExtractionResult::Clusters(clusters) => {
            println!("   - Clusters: {}", clusters.len());
            for cluster in clusters {
                println!(
                    "     pages {}-{}: {} chars",
                    cluster.range.start,
                    cluster.range.end,
                    cluster.text.chars().count()
                );
            }
        }
        ExtractionResult::Table(sheets) => println!("   - Sheets: {}", sheets.len()),
    }
}

/// Create DocumentProcessor with the local embedder (auto-downloads the model)
#[cfg(feature = "onnx-embedder")]
fn create_processor(mut config: ExtractionConfig) -> Result<DocumentProcessor> {
    let model_dir = match config.segmentation.model_dir.clone() {
        Some(dir) => {
            println!("🔧 Using specified model directory: {}", dir.display());
            dir
        }
        None => ModelManager::new()?.ensure_model()?,
    };
    config.segmentation.model_dir = Some(model_dir);

    let backend = match config.recognition.backend {
        RecognitionBackendKind::Local => "local (tesseract)",
        RecognitionBackendKind::Cloud => "cloud (azure read)",
    };
    println!("🚀 Using {} recognition backend", backend);
    DocumentProcessor::from_config(config)
}

/// Fallback when no embedder is compiled in
#[cfg(not(feature = "onnx-embedder"))]
fn create_processor(_config: ExtractionConfig) -> Result<DocumentProcessor> {
    Err(anyhow::anyhow!(
        "No page embedder compiled in!\n\
         Compile with: --features onnx-embedder"
    ))
}
