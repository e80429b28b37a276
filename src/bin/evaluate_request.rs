// Command-line evaluation
//
// Purpose: Evaluate one request JSON against one matrix JSON and print the result
// Usage: cargo run --features cli --bin evaluate_request -- <matrix.json> <request.json>

use anyhow::{Context, Result};
use std::path::Path;
use taxon_key_scorer::{EvaluateRequest, KeyScorer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> Result<()> {
    // Logs go to stderr so stdout stays valid JSON
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "taxon_key_scorer=info,warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() != 3 {
        anyhow::bail!("usage: {} <matrix.json> <request.json>", args[0]);
    }

    let scorer = KeyScorer::load(Path::new(&args[1]), None)?;

    let contents = std::fs::read_to_string(&args[2])
        .with_context(|| format!("Failed to read request file: {}", args[2]))?;
    let request: EvaluateRequest = serde_json::from_str(&contents)
        .with_context(|| "Failed to parse request JSON")?;

    let result = scorer.evaluate(&request);
    println!("{}", serde_json::to_string_pretty(&result)?);

    if let Some(top) = result.scores.first() {
        tracing::info!("Top candidate: {} ({:.4})", top.taxon_name, top.post);
    }

    Ok(())
}
