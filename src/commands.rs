//! Ready-made commands that bridge the dispatch core and the GTP client.
//!
//! The typical shape of an engine interaction: an asynchronous command
//! submits one GTP request from the worker thread and blocks there until the
//! correlated response arrives, then translates the response status into the
//! command's success/failure outcome. A failure to reach the engine is an
//! ordinary `false` outcome, never a fault; the engine being unavailable is a
//! recoverable condition.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::dispatch::{Command, CommandFault, ProgressHandle};
use crate::gtp::{GtpClient, GtpResponse};

/// Shared slot an [`EngineCommand`] publishes its response through.
///
/// Grab it with [`EngineCommand::response_slot`] before submitting; after the
/// completion handler runs, the slot holds the parsed response (or `None` if
/// the engine never answered).
pub type ResponseSlot = Arc<Mutex<Option<GtpResponse>>>;

/// Asynchronous command that runs one GTP command to completion.
pub struct EngineCommand {
    client: Arc<GtpClient>,
    line: String,
    name: String,
    show_progress: bool,
    response: ResponseSlot,
}

impl EngineCommand {
    /// Create a command that will submit `line` to the engine.
    pub fn new(client: Arc<GtpClient>, line: impl Into<String>) -> Self {
        let line = line.into();
        let name = format!("engine:{}", line.split_whitespace().next().unwrap_or("?"));
        Self {
            client,
            line,
            name,
            show_progress: false,
            response: Arc::new(Mutex::new(None)),
        }
    }

    /// Show the shared progress display while waiting for the engine.
    #[must_use]
    pub fn with_progress_display(mut self) -> Self {
        self.show_progress = true;
        self
    }

    /// Slot the response will be published through.
    pub fn response_slot(&self) -> ResponseSlot {
        Arc::clone(&self.response)
    }
}

impl Command for EngineCommand {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_asynchronous(&self) -> bool {
        true
    }

    fn wants_progress_display(&self) -> bool {
        self.show_progress
    }

    fn execute(&mut self, progress: &ProgressHandle) -> Result<bool, CommandFault> {
        progress.report_with_message(0.0, format!("engine: {}", self.line));

        let pending = match self.client.submit_request(&self.line) {
            Ok(pending) => pending,
            Err(err) => {
                warn!(command = %self.name, error = %err, "failed to send engine request");
                return Ok(false);
            }
        };

        match pending.wait() {
            Ok(response) => {
                let success = response.success;
                if !success {
                    debug!(command = %self.name, error = %response.content, "engine rejected the request");
                }
                *self.response.lock() = Some(response);
                progress.report(1.0);
                Ok(success)
            }
            Err(err) => {
                warn!(command = %self.name, error = %err, "engine connection lost while waiting");
                Ok(false)
            }
        }
    }
}

/// Command that asks the engine to abandon its current computation.
///
/// Deliberately synchronous: the worker thread is busy with the very
/// computation being interrupted, so this must run inline on the caller's
/// thread.
pub struct InterruptCommand {
    client: Arc<GtpClient>,
}

impl InterruptCommand {
    /// Create an interrupt for the given engine connection.
    pub fn new(client: Arc<GtpClient>) -> Self {
        Self { client }
    }
}

impl Command for InterruptCommand {
    fn name(&self) -> &str {
        "engine:interrupt"
    }

    fn execute(&mut self, _progress: &ProgressHandle) -> Result<bool, CommandFault> {
        match self.client.interrupt() {
            Ok(()) => Ok(true),
            Err(err) => {
                warn!(error = %err, "failed to interrupt engine");
                Ok(false)
            }
        }
    }
}
