//! shadow-core: Core library for the shadow LLM bridge.
//!
//! A parent process hands shadow one JSON chat request; shadow forwards the
//! message to an LLM provider and answers with one JSON line.
//!
//! - [`request`] — Request wire type, defaults, and validation
//! - [`config`] — Environment lookup and optional JSON settings file
//! - [`error`] — Typed chat client failures
//! - [`provider`] — LLM provider trait and OpenAI-compatible implementation
//! - [`chat`] — Chat sessions bound to a provider/model pair
//! - [`handler`] — Request handler producing the JSON result and exit code
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use shadow_core::config::{Config, ProcessEnv};
//! use shadow_core::handler::RequestHandler;
//! use shadow_core::provider::HttpProviderFactory;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = Config::load(&ProcessEnv)?;
//! let factory = HttpProviderFactory::new(config)?;
//! let handler = RequestHandler::new(Arc::new(ProcessEnv), Arc::new(factory));
//!
//! let result = handler.handle(Some(r#"{"message": "hi"}"#)).await;
//! print!("{}", result.to_json_line());
//! std::process::exit(result.exit_code());
//! # }
//! ```

pub mod chat;
pub mod config;
pub mod error;
pub mod handler;
pub mod provider;
pub mod request;
