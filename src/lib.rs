#![forbid(unsafe_code)]

//! # Sente
//!
//! Command dispatch core and GTP engine client for Go programs.
//!
//! Sente provides the two pieces of plumbing every Go client needs between
//! its front end and a Go-playing engine:
//!
//! - **Command dispatch** ([`dispatch`]): a command-pattern executor that runs
//!   synchronous commands inline and serializes asynchronous commands onto a
//!   single dedicated worker thread, with progress reporting funneled back to
//!   whichever thread owns the display.
//! - **GTP client** ([`gtp`]): a correlated request/response client for the
//!   Go Text Protocol, talking to a long-lived engine subprocess over its
//!   stdin/stdout. Each outstanding request is matched to its own response by
//!   the numeric GTP id, never by arrival order.
//!
//! The [`commands`] module bridges the two: ready-made commands that submit a
//! GTP request from the worker thread and block until the correlated response
//! arrives.
//!
//! ## Quick start
//!
//! ```no_run
//! use std::sync::Arc;
//! use sente::{CommandProcessor, EngineCommand, EngineProfile, GtpClient, Submission};
//!
//! # fn main() -> anyhow::Result<()> {
//! let client = Arc::new(GtpClient::spawn(&EngineProfile::default())?);
//! let processor = CommandProcessor::new()?;
//!
//! let command = EngineCommand::new(Arc::clone(&client), "genmove b");
//! let submission = Submission::new(command)
//!     .on_completion(|command, success| println!("{}: {}", command.name(), success));
//! processor.submit(submission)?;
//! # Ok(())
//! # }
//! ```

pub mod commands;
pub mod config;
pub mod dispatch;
pub mod gtp;

pub use commands::{EngineCommand, InterruptCommand, ResponseSlot};
pub use config::Config;
pub use dispatch::{
    Command, CommandFault, CommandProcessor, FnCommand, ProgressEvent, ProgressHandle,
    ProgressIndicator, Submission,
};
pub use gtp::{
    EngineProfile, GtpClient, GtpError, GtpRequest, GtpResponse, PendingRequest, RequestHandle,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "sente";
