//! Command data structures.
//!
//! Defines the [`Command`] trait for a single unit of work with a
//! success/failure outcome, and [`Submission`], which pairs a command with
//! its optional completion callback for hand-off to the processor.

use std::fmt;

use thiserror::Error;

use super::progress::ProgressHandle;

/// Callback invoked after a command finishes, with the command and its
/// outcome. Runs in whatever thread context the command executed in.
pub type CompletionHandler = Box<dyn FnOnce(&dyn Command, bool) + Send>;

/// An unexpected internal fault raised by a command.
///
/// Distinct from an ordinary failure (`execute` returning `Ok(false)`): a
/// fault means the command hit a condition it considers a bug rather than a
/// recoverable outcome. How a fault is handled depends on the execution mode;
/// see [`CommandProcessor::submit`](super::CommandProcessor::submit).
#[derive(Debug, Error)]
#[error("command '{command}' faulted: {reason}")]
pub struct CommandFault {
    /// Name of the faulting command
    pub command: String,

    /// What went wrong
    pub reason: String,
}

impl CommandFault {
    /// Create a fault for the named command.
    pub fn new(command: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self { command: command.into(), reason: reason.to_string() }
    }
}

/// A single unit of work with a success/failure outcome.
///
/// Commands are created for one use, submitted at most once, and discarded
/// after execution. `execute` is called exactly once per submission; nothing
/// is guaranteed for an instance that is submitted again.
pub trait Command: Send + 'static {
    /// Human-readable name, used in logs and fault reports.
    fn name(&self) -> &str;

    /// Whether this command must be dispatched to the worker thread.
    ///
    /// Synchronous commands (the default) run inline on the calling thread.
    fn is_asynchronous(&self) -> bool {
        false
    }

    /// Whether the shared progress display should be shown while this command
    /// runs. Only consulted for asynchronous commands.
    fn wants_progress_display(&self) -> bool {
        false
    }

    /// Whether this command could participate in an undo history.
    ///
    /// Declared for a future history mechanism; nothing consults it today.
    fn is_undoable(&self) -> bool {
        false
    }

    /// Perform the work.
    ///
    /// `Ok(true)` and `Ok(false)` are the ordinary success and failure
    /// outcomes. `Err` signals an internal fault. The progress handle is
    /// assigned by the processor and is only valid for this execution.
    fn execute(&mut self, progress: &ProgressHandle) -> Result<bool, CommandFault>;
}

/// A command paired with its optional completion callback, ready to hand to
/// the processor.
pub struct Submission {
    command: Box<dyn Command>,
    completion: Option<CompletionHandler>,
}

impl Submission {
    /// Wrap a command with no completion callback.
    pub fn new(command: impl Command) -> Self {
        Self::from_boxed(Box::new(command))
    }

    /// Wrap an already boxed command.
    pub fn from_boxed(command: Box<dyn Command>) -> Self {
        Self { command, completion: None }
    }

    /// Attach a completion callback, invoked with the command and its outcome
    /// after `execute` returns.
    #[must_use]
    pub fn on_completion(mut self, f: impl FnOnce(&dyn Command, bool) + Send + 'static) -> Self {
        self.completion = Some(Box::new(f));
        self
    }

    /// Name of the wrapped command.
    pub fn name(&self) -> &str {
        self.command.name()
    }

    pub(crate) fn is_asynchronous(&self) -> bool {
        self.command.is_asynchronous()
    }

    pub(crate) fn wants_progress_display(&self) -> bool {
        self.command.wants_progress_display()
    }

    /// Execute the command and run the completion callback inline.
    ///
    /// The callback only runs for ordinary outcomes; a fault skips it.
    pub(crate) fn run(mut self, progress: &ProgressHandle) -> Result<bool, CommandFault> {
        let outcome = self.command.execute(progress)?;
        if let Some(completion) = self.completion.take() {
            completion(self.command.as_ref(), outcome);
        }
        Ok(outcome)
    }
}

impl fmt::Debug for Submission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Submission")
            .field("command", &self.command.name())
            .field("has_completion", &self.completion.is_some())
            .finish()
    }
}

type CommandFn = Box<dyn FnOnce(&ProgressHandle) -> Result<bool, CommandFault> + Send>;

/// Command built from a closure, for small one-off work.
pub struct FnCommand {
    name: String,
    asynchronous: bool,
    show_progress: bool,
    work: Option<CommandFn>,
}

impl FnCommand {
    /// Create a synchronous command from a closure.
    pub fn new(
        name: impl Into<String>,
        work: impl FnOnce(&ProgressHandle) -> Result<bool, CommandFault> + Send + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            asynchronous: false,
            show_progress: false,
            work: Some(Box::new(work)),
        }
    }

    /// Mark the command for worker-thread dispatch.
    #[must_use]
    pub fn asynchronous(mut self) -> Self {
        self.asynchronous = true;
        self
    }

    /// Request the shared progress display while the command runs.
    #[must_use]
    pub fn with_progress_display(mut self) -> Self {
        self.show_progress = true;
        self
    }
}

impl Command for FnCommand {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_asynchronous(&self) -> bool {
        self.asynchronous
    }

    fn wants_progress_display(&self) -> bool {
        self.show_progress
    }

    fn execute(&mut self, progress: &ProgressHandle) -> Result<bool, CommandFault> {
        let work = self
            .work
            .take()
            .ok_or_else(|| CommandFault::new(&self.name, "command executed more than once"))?;
        work(progress)
    }
}

impl fmt::Debug for FnCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnCommand")
            .field("name", &self.name)
            .field("asynchronous", &self.asynchronous)
            .finish()
    }
}
