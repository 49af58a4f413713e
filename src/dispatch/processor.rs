//! The command processor.
//!
//! Single funnel for command execution. Synchronous commands run inline on
//! the calling thread; asynchronous commands are queued onto one dedicated,
//! long-lived worker thread and executed strictly one at a time in submission
//! order. An asynchronous command that submits another asynchronous command
//! while already running on the worker thread gets the inline treatment,
//! since queueing it behind itself would deadlock the single worker.
//!
//! Fault policy: a fault from a synchronous command propagates to the caller.
//! A fault on the worker thread is logged with full context and then aborts
//! the process, because a half-finished asynchronous command leaves shared
//! application state in an unknown condition. A panic inside a command on the
//! worker thread gets the same treatment: it is caught only to be logged with
//! the command's identity, then the process aborts. Letting it unwind would
//! quietly kill the worker and leave the process running with a dead
//! processor.

use std::panic;
use std::process;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;

use anyhow::Context;
use parking_lot::Mutex;
use tracing::{debug, error, trace, warn};

use super::command::{CommandFault, Submission};
use super::progress::{ProgressEvent, ProgressHandle};

/// Work items handed to the worker thread.
enum Job {
    Run(Submission),
    Shutdown,
}

struct Inner {
    job_tx: Sender<Job>,
    progress_tx: Sender<ProgressEvent>,
    progress_rx: Mutex<Option<Receiver<ProgressEvent>>>,
    worker_id: ThreadId,
    worker: Mutex<Option<JoinHandle<()>>>,
}

/// Executes commands, serializing asynchronous ones onto a single worker
/// thread.
///
/// Cheap to clone; clones share the same worker thread and progress channel.
/// Construct one per application (or per test) and pass it to whatever
/// submits commands.
#[derive(Clone)]
pub struct CommandProcessor {
    inner: Arc<Inner>,
}

impl CommandProcessor {
    /// Create a processor and start its worker thread.
    pub fn new() -> anyhow::Result<Self> {
        let (job_tx, job_rx) = mpsc::channel();
        let (progress_tx, progress_rx) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::channel();

        let worker_progress = progress_tx.clone();
        let handle = thread::Builder::new()
            .name("command-worker".to_string())
            .spawn(move || {
                let _ = ready_tx.send(thread::current().id());
                worker_loop(&job_rx, &worker_progress);
            })
            .context("failed to spawn command worker thread")?;

        let worker_id = ready_rx.recv().context("command worker thread did not start")?;

        Ok(Self {
            inner: Arc::new(Inner {
                job_tx,
                progress_tx,
                progress_rx: Mutex::new(Some(progress_rx)),
                worker_id,
                worker: Mutex::new(Some(handle)),
            }),
        })
    }

    /// Submit a command for execution.
    ///
    /// Synchronous commands run inline and the returned value is their real
    /// outcome; a fault propagates to the caller as `Err`. Asynchronous
    /// commands are queued on the worker thread and `Ok(true)` is returned
    /// immediately; their real outcome is only observable through the
    /// completion handler. Nested asynchronous submissions from the worker
    /// thread itself run inline and return the real outcome.
    pub fn submit(&self, submission: Submission) -> Result<bool, CommandFault> {
        if !submission.is_asynchronous() {
            return self.run_inline(submission);
        }

        if thread::current().id() == self.inner.worker_id {
            trace!(command = submission.name(), "nested submission on worker thread, running inline");
            return self.run_inline(submission);
        }

        let wants_display = submission.wants_progress_display();
        if wants_display {
            let _ = self
                .inner
                .progress_tx
                .send(ProgressEvent::Shown { command: submission.name().to_string() });
        }

        debug!(command = submission.name(), "queueing command on worker thread");
        if let Err(mpsc::SendError(job)) = self.inner.job_tx.send(Job::Run(submission)) {
            // The worker never ran it, so take back the indicator too.
            if wants_display {
                let _ = self.inner.progress_tx.send(ProgressEvent::Hidden);
            }
            let name = match job {
                Job::Run(submission) => submission.name().to_string(),
                Job::Shutdown => "shutdown".to_string(),
            };
            return Err(CommandFault::new(name, "command processor is shut down"));
        }

        Ok(true)
    }

    /// Schedule a submission after `delay`, fire and forget.
    ///
    /// The outcome is only observable through the completion handler.
    pub fn submit_after_delay(&self, submission: Submission, delay: Duration) {
        let processor = self.clone();
        let spawned = thread::Builder::new().name("command-delay".to_string()).spawn(move || {
            thread::sleep(delay);
            if let Err(fault) = processor.submit(submission) {
                warn!(command = %fault.command, reason = %fault.reason, "delayed submission faulted");
            }
        });
        if spawned.is_err() {
            warn!("failed to spawn delay thread, submission dropped");
        }
    }

    /// Whether the calling thread is this processor's worker thread.
    pub fn is_worker_thread(&self) -> bool {
        thread::current().id() == self.inner.worker_id
    }

    /// Claim the progress event stream.
    ///
    /// Returns `None` after the first call. The thread that drains the
    /// receiver owns all indicator mutation.
    pub fn take_progress_events(&self) -> Option<Receiver<ProgressEvent>> {
        self.inner.progress_rx.lock().take()
    }

    /// Signal the worker thread to exit and wait for it.
    ///
    /// Commands already queued ahead of the shutdown signal still run.
    pub fn shutdown(&self) {
        if self.is_worker_thread() {
            return;
        }
        let _ = self.inner.job_tx.send(Job::Shutdown);
        if let Some(handle) = self.inner.worker.lock().take() {
            let _ = handle.join();
        }
    }

    fn run_inline(&self, submission: Submission) -> Result<bool, CommandFault> {
        let progress = if submission.is_asynchronous() {
            ProgressHandle::live(self.inner.progress_tx.clone())
        } else {
            ProgressHandle::disconnected()
        };
        submission.run(&progress)
    }
}

impl Default for CommandProcessor {
    fn default() -> Self {
        Self::new().expect("failed to start command processor")
    }
}

/// Worker thread main loop: block on the job channel until shutdown.
fn worker_loop(jobs: &Receiver<Job>, progress_tx: &Sender<ProgressEvent>) {
    debug!("command worker thread started");
    while let Ok(job) = jobs.recv() {
        match job {
            Job::Shutdown => break,
            Job::Run(submission) => run_on_worker(submission, progress_tx),
        }
    }
    debug!("command worker thread exiting");
}

fn run_on_worker(submission: Submission, progress_tx: &Sender<ProgressEvent>) {
    let name = submission.name().to_string();
    let hide_after = submission.wants_progress_display();
    let progress = ProgressHandle::live(progress_tx.clone());

    trace!(command = %name, "executing on worker thread");
    let outcome =
        panic::catch_unwind(panic::AssertUnwindSafe(|| submission.run(&progress)));
    match outcome {
        Ok(Ok(success)) => {
            debug!(command = %name, success, "command finished");
        }
        Ok(Err(fault)) => {
            error!(
                command = %fault.command,
                reason = %fault.reason,
                "command faulted on worker thread, aborting"
            );
            process::abort();
        }
        Err(payload) => {
            error!(
                command = %name,
                reason = panic_message(payload.as_ref()),
                "command panicked on worker thread, aborting"
            );
            process::abort();
        }
    }

    if hide_after {
        let _ = progress_tx.send(ProgressEvent::Hidden);
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic payload"
    }
}
