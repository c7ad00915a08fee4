//! Runs the document extraction pipeline on local files and prints the
//! result as JSON. Uses the same environment configuration as the server.
//!
//! Usage: `extract_document <image> [<image> ...]`

use kyc_gateway::config::Config;
use kyc_gateway::handlers::AppState;
use serde_json::json;
use std::path::PathBuf;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let files: Vec<PathBuf> = std::env::args().skip(1).map(PathBuf::from).collect();
    if files.is_empty() {
        anyhow::bail!("usage: extract_document <image> [<image> ...]");
    }

    let config = Config::from_env()?;
    let state = AppState::from_config(config)?;

    let mut failures = 0;
    for file in &files {
        match state.pipeline.run(file).await {
            Ok(output) => {
                let report = json!({
                    "file": file.display().to_string(),
                    "extracted_fields": output.fields,
                    "confidence": output.confidence,
                    "ocr_confidence": output.ocr_confidence,
                    "llm_confidence": output.llm_confidence,
                    "ocr_text": output.ocr_text,
                });
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
            Err(e) => {
                failures += 1;
                tracing::error!("{}: {}", file.display(), e);
            }
        }
    }

    if failures > 0 {
        anyhow::bail!("{} of {} files failed", failures, files.len());
    }

    Ok(())
}
