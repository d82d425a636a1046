//! # fatwa-runtime
//!
//! Backend invocation and request handling for four-school fatwa answers.
//!
//! This crate owns the only network call in the system: one request to the
//! generative backend per question. Everything before and after that call is
//! delegated to the deterministic `fatwa-core`.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use fatwa_runtime::{FatwaRequestHandler, HandlerConfig};
//! use fatwa_runtime::providers::{AnthropicProvider, ApiCredential, ANTHROPIC_API_KEY_ENV};
//!
//! let credential = ApiCredential::resolve(None, ANTHROPIC_API_KEY_ENV, "Anthropic API key")?;
//! let provider = AnthropicProvider::new(credential)?;
//! let handler = FatwaRequestHandler::new(Arc::new(provider), HandlerConfig::default());
//!
//! let fatwa = handler.handle("ما حكم صلاة الجماعة؟").await?;
//! println!("{}", fatwa.hanafi.ruling.unwrap_or_default());
//! ```

pub mod config;
pub mod error;
pub mod handler;
pub mod providers;

pub use config::HandlerConfig;
pub use error::{ErrorKind, HandlerError, RequestStage};
pub use handler::FatwaRequestHandler;
pub use tokio_util::sync::CancellationToken;
