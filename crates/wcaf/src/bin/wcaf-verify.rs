//! Offline bundle verifier.
//!
//! Reads an exported bundle, re-verifies the document exactly as written and
//! prints the report as JSON. Exits with status 1 when the bundle is not ok.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use serde_json::Value;
use wcaf::{verify_bundle_value, PublicKey};

#[derive(Debug, Parser)]
#[command(name = "wcaf-verify", version, about = "Verify a WCAF audit bundle")]
struct Args {
    /// Path to the bundle JSON file
    bundle: PathBuf,

    /// PEM public key used to check the bundle signature and attestation
    #[arg(short = 'k', long, value_name = "PEM")]
    public_key: Option<PathBuf>,

    /// Only set the exit status; print nothing on success
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.quiet { "error" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let json = fs::read_to_string(&args.bundle)
        .with_context(|| format!("reading bundle {}", args.bundle.display()))?;
    let document: Value = serde_json::from_str(&json).context("parsing bundle")?;

    let public_key = match &args.public_key {
        Some(path) => {
            let pem = fs::read_to_string(path)
                .with_context(|| format!("reading public key {}", path.display()))?;
            Some(PublicKey::from_pem(&pem).context("parsing public key")?)
        }
        None => None,
    };

    info!(
        "Verifying bundle for {} ({} event(s))",
        document["document_id"].as_str().unwrap_or("<unknown>"),
        document["timeline"].as_array().map_or(0, Vec::len)
    );
    let report = verify_bundle_value(&document, public_key.as_ref());

    if !args.quiet || !report.ok {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    if !report.ok {
        error!("Bundle verification failed: {} problem(s)", report.problems.len());
        std::process::exit(1);
    }

    Ok(())
}
