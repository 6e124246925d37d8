//! shadow CLI — forward one chat message to an LLM and print one JSON line.
//!
//! Usage:
//!   shadow-llm '{"message": "hi", "apiKey": "sk-..."}'
//!
//! Stdout carries exactly one JSON object; diagnostics go to stderr
//! (filter with `RUST_LOG`). Exit code 0 on success, 1 otherwise.
//!
//! No flags are recognised: the first argument is the request, verbatim,
//! even when it is `--` or starts with a dash.

use std::ffi::OsString;
use std::io::Write;
use std::sync::Arc;

use shadow_core::config::{Config, ProcessEnv};
use shadow_core::handler::{ChatResult, RequestHandler};
use shadow_core::provider::{HttpProviderFactory, MisconfiguredFactory, ProviderFactory};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();

    let mut args = std::env::args_os().skip(1);
    let input = args.next();
    let extra = args.count();
    if extra > 0 {
        tracing::warn!(ignored = extra, "Ignoring extra arguments");
    }

    let result = run(input).await;

    if let Err(e) = emit(&mut std::io::stdout().lock(), &result) {
        tracing::error!(error = %e, "Failed to write result to stdout");
        std::process::exit(1);
    }

    std::process::exit(result.exit_code());
}

async fn run(input: Option<OsString>) -> ChatResult {
    let input = match input.map(OsString::into_string).transpose() {
        Ok(input) => input,
        Err(raw) => {
            tracing::warn!(argument = ?raw, "Rejected argument that is not UTF-8");
            return ChatResult::invalid_input("argument is not valid UTF-8");
        }
    };

    let handler = RequestHandler::new(Arc::new(ProcessEnv), build_factory());
    handler.handle(input.as_deref()).await
}

fn emit(out: &mut impl Write, result: &ChatResult) -> std::io::Result<()> {
    out.write_all(result.to_json_line().as_bytes())?;
    out.flush()
}

/// Settings failures are reported by the factory on connect, after the
/// request itself has been validated.
fn build_factory() -> Arc<dyn ProviderFactory> {
    let loaded = Config::load(&ProcessEnv)
        .and_then(|config| HttpProviderFactory::new(config).map_err(anyhow::Error::from));
    match loaded {
        Ok(factory) => Arc::new(factory),
        Err(e) => {
            let reason = format!("{e:#}");
            tracing::error!(error = %reason, "Failed to load configuration");
            Arc::new(MisconfiguredFactory::new(reason))
        }
    }
}
