//! One-shot research from the command line.
//!
//! ```text
//! research_cli quantum error correction
//! ```
//!
//! Prints the `ResearchResult` as pretty JSON. Providers and thresholds come from
//! the same config files as the service (`config/*.toml`, env overrides).

use std::process::ExitCode;

use topic_research::api::DEFAULT_MAX_SOURCES;
use topic_research::{enable_dev_tracing, researcher_from_env};

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    enable_dev_tracing();

    let topic = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    if topic.trim().is_empty() {
        println!("{}", serde_json::json!({ "error": "Topic argument is required." }));
        return ExitCode::FAILURE;
    }

    let (researcher, providers) = match researcher_from_env() {
        Ok(v) => v,
        Err(e) => {
            println!("{}", serde_json::json!({ "error": format!("{e:#}") }));
            return ExitCode::FAILURE;
        }
    };

    let result = researcher
        .research(&topic, DEFAULT_MAX_SOURCES, &providers)
        .await;

    match serde_json::to_string_pretty(&result) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            println!("{}", serde_json::json!({ "error": e.to_string() }));
            return ExitCode::FAILURE;
        }
    }
    if result.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
