//! Command dispatch core.
//!
//! This module contains the command abstraction and the processor that is the
//! single funnel for executing commands: synchronous commands run inline on
//! the calling thread, asynchronous commands are serialized onto one dedicated
//! worker thread in submission order.

mod command;
mod processor;
mod progress;

pub use command::{Command, CommandFault, CompletionHandler, FnCommand, Submission};
pub use processor::CommandProcessor;
pub use progress::{ProgressEvent, ProgressHandle, ProgressIndicator};
