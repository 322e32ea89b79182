//! CLI binary for pdf-anonymizer.
//!
//! `serve` runs the HTTP surface; `run` anonymizes one document from the
//! command line through the same request path.

use anyhow::{bail, Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use clap::{Args, Parser, Subcommand};
use pdf_anonymizer::server::{self, AppState};
use pdf_anonymizer::{
    anonymize_async, default_factory, AnonymizationRequest, AnonymizationResponse,
    AnonymizerConfig, DeliveredPayload, FormatOutcome, OutputFormat, StorageConfig,
};
use serde_json::{json, Value};
use std::io;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const AFTER_HELP: &str = r#"EXAMPLES:
  # Run the HTTP service on 0.0.0.0:5000
  pdf-anonymizer serve

  # Redact a local file, write result.pdf and result.md into ./out
  pdf-anonymizer run --input contract.pdf --term "Alice Martin" --term ACME \
      --format pdf --format md --out-dir out

  # Redact a remote document and store the results in blob storage
  MINIO_HOST=http://localhost:9000 MINIO_KEY_ID=... MINIO_SECRET_KEY=... \
  pdf-anonymizer run --input https://example.com/a.pdf --term Ω --deliver url

ENVIRONMENT VARIABLES:
  HOST, PORT                     Bind address of `serve` (default 0.0.0.0:5000)
  MINIO_HOST                     S3-compatible endpoint; http:// selects plain HTTP
  MINIO_KEY_ID, MINIO_SECRET_KEY Credentials for MINIO_HOST
  MINIO_REGION                   Signing region (default us-east-1)
  ANONYMIZER_OUTPUT_CONTAINER    Container for `url` delivery (default anonymized)
  PDFIUM_LIB_PATH                Directory or file of an existing libpdfium
  RUST_LOG                       Overrides --verbose / --quiet
"#;

#[derive(Parser, Debug)]
#[command(
    name = "pdf-anonymizer",
    version,
    about = "Redact sensitive terms from PDF documents",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    settings: SettingsArgs,

    #[arg(short, long, global = true, env = "ANONYMIZER_VERBOSE")]
    verbose: bool,

    #[arg(short, long, global = true, env = "ANONYMIZER_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve POST /api/pdf/anonymize and GET /health.
    Serve {
        #[arg(long, env = "HOST", default_value = "0.0.0.0")]
        host: String,

        #[arg(long, env = "PORT", default_value_t = 5000)]
        port: u16,
    },

    /// Anonymize one document.
    Run(RunArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Local PDF path, HTTP(S) URL or `container/key`.
    #[arg(short, long)]
    input: String,

    /// Sensitive term; repeat for several.
    #[arg(short, long = "term", required = true)]
    terms: Vec<String>,

    /// Output format: pdf, img or md; repeat for several.
    #[arg(short, long = "format", default_value = "pdf")]
    formats: Vec<String>,

    /// `response` (inline) or `url` (blob storage).
    #[arg(long, default_value = "response")]
    deliver: String,

    #[arg(long)]
    process_id: Option<String>,

    /// Write decoded inline artifacts here instead of printing JSON.
    #[arg(short, long)]
    out_dir: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct SettingsArgs {
    #[arg(long, global = true, env = "ANONYMIZER_IMAGE_DPI", default_value_t = 72,
          value_parser = clap::value_parser!(u32).range(36..=600))]
    image_dpi: u32,

    #[arg(long, global = true, env = "ANONYMIZER_REDACTION_DPI", default_value_t = 150,
          value_parser = clap::value_parser!(u32).range(72..=600))]
    redaction_dpi: u32,

    #[arg(long, global = true, env = "ANONYMIZER_MAX_VARIABLE_POSITIONS", default_value_t = 12)]
    max_variable_positions: u32,

    #[arg(long, global = true, env = "ANONYMIZER_FETCH_TIMEOUT_SECS")]
    fetch_timeout_secs: Option<u64>,

    #[arg(long, global = true, env = "ANONYMIZER_SCRATCH_DIR")]
    scratch_dir: Option<PathBuf>,

    #[arg(long, global = true, env = "ANONYMIZER_OUTPUT_CONTAINER", default_value = "anonymized")]
    output_container: String,

    #[arg(long, global = true, env = "PDFIUM_LIB_PATH")]
    pdfium_lib_path: Option<PathBuf>,

    #[arg(long, global = true, env = "MINIO_HOST")]
    minio_host: Option<String>,

    #[arg(long, global = true, env = "MINIO_KEY_ID", hide_env_values = true)]
    minio_key_id: Option<String>,

    #[arg(long, global = true, env = "MINIO_SECRET_KEY", hide_env_values = true)]
    minio_secret_key: Option<String>,

    #[arg(long, global = true, env = "MINIO_REGION", default_value = "us-east-1")]
    minio_region: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let config = build_config(&cli.settings)?;

    match cli.command {
        Command::Serve { host, port } => {
            let addr: SocketAddr = format!("{host}:{port}")
                .parse()
                .with_context(|| format!("Invalid bind address {host}:{port}"))?;
            let state = AppState::new(config, default_factory());
            server::serve(addr, state).await.context("Server failed")?;
        }
        Command::Run(args) => run(args, config, cli.quiet).await?,
    }

    Ok(())
}

fn build_config(s: &SettingsArgs) -> Result<AnonymizerConfig> {
    let mut builder = AnonymizerConfig::builder()
        .image_dpi(s.image_dpi)
        .redaction_dpi(s.redaction_dpi)
        .max_variable_positions(s.max_variable_positions)
        .output_container(s.output_container.clone());

    if let Some(secs) = s.fetch_timeout_secs {
        builder = builder.fetch_timeout_secs(secs);
    }
    if let Some(ref dir) = s.scratch_dir {
        builder = builder.scratch_dir(dir.clone());
    }
    if let Some(ref path) = s.pdfium_lib_path {
        builder = builder.pdfium_library_path(path.clone());
    }
    if let Some(host) = s.minio_host.as_deref().filter(|h| !h.trim().is_empty()) {
        let (Some(key), Some(secret)) = (
            s.minio_key_id.as_deref().filter(|k| !k.is_empty()),
            s.minio_secret_key.as_deref().filter(|k| !k.is_empty()),
        ) else {
            bail!("MinIO credentials not found in environment variables");
        };
        builder = builder.storage(StorageConfig::new(host, key, secret).with_region(&s.minio_region));
    }

    builder.build().context("Invalid configuration")
}

async fn run(args: RunArgs, config: AnonymizerConfig, quiet: bool) -> Result<()> {
    let body = request_body(&args).await?;
    let request = AnonymizationRequest::from_json(&body).context("Invalid request")?;

    let response = anonymize_async(request, Arc::new(config), default_factory())
        .await
        .context("Anonymization failed")?;

    for (format, outcome) in &response.outcomes {
        if let FormatOutcome::Failed { error } = outcome {
            eprintln!("{format}: {error}");
        }
    }

    match args.out_dir {
        Some(ref dir) => {
            let written = write_artifacts(&response, dir).await?;
            if !quiet {
                for path in written {
                    eprintln!("wrote {}", path.display());
                }
            }
        }
        None => {
            let json = serde_json::to_string_pretty(&response.to_json())
                .context("Failed to serialise response")?;
            println!("{json}");
        }
    }
    Ok(())
}

/// The JSON request `run` submits; a local file is sent inline.
async fn request_body(args: &RunArgs) -> Result<Value> {
    let mut body = json!({
        "sensitive_content": args.terms,
        "output_format": args.formats,
        "result_deliver": args.deliver,
    });

    if Path::new(&args.input).is_file() {
        let bytes = tokio::fs::read(&args.input)
            .await
            .with_context(|| format!("Failed to read {}", args.input))?;
        body["pdf_content"] = Value::String(STANDARD.encode(bytes));
    } else {
        body["pdf_file"] = Value::String(args.input.clone());
    }
    if let Some(ref id) = args.process_id {
        body["process_id"] = Value::String(id.clone());
    }
    Ok(body)
}

/// Decode inline artifacts into `dir`. Stored references are printed instead.
async fn write_artifacts(response: &AnonymizationResponse, dir: &Path) -> Result<Vec<PathBuf>> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Failed to create {}", dir.display()))?;

    let mut written = Vec::new();
    for (&format, outcome) in &response.outcomes {
        let payloads: Vec<(String, &DeliveredPayload)> = match outcome {
            FormatOutcome::Single(p) => vec![(format!("result.{}", format.extension()), p)],
            FormatOutcome::Pages(pages) => pages
                .iter()
                .enumerate()
                .map(|(i, p)| (format!("result_page_{}.{}", i + 1, format.extension()), p))
                .collect(),
            FormatOutcome::Failed { .. } => continue,
        };

        for (name, payload) in payloads {
            match payload {
                DeliveredPayload::Inline(data) => {
                    let bytes = match format {
                        OutputFormat::Md => data.clone().into_bytes(),
                        OutputFormat::Pdf | OutputFormat::Img => STANDARD
                            .decode(data)
                            .with_context(|| format!("Failed to decode {name}"))?,
                    };
                    let path = dir.join(&name);
                    tokio::fs::write(&path, bytes)
                        .await
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    written.push(path);
                }
                DeliveredPayload::Stored(location) => println!("{format}: {location}"),
            }
        }
    }
    Ok(written)
}
