//! Progress reporting for asynchronous commands.
//!
//! The processor never touches a display directly. It emits [`ProgressEvent`]s
//! on a channel; whichever thread owns the display drains that channel and
//! applies the events to a [`ProgressIndicator`], so all indicator mutation
//! stays on that single thread.

use std::sync::mpsc::Sender;

/// Event emitted by the processor while asynchronous commands run.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    /// The indicator should become visible for the named command.
    Shown {
        /// Name of the command about to run
        command: String,
    },

    /// A progress tick, with an optional replacement message.
    Tick {
        /// Completion fraction in `0.0..=1.0`
        progress: f32,
        /// New indicator message; `None` keeps the current one
        message: Option<String>,
    },

    /// The indicator should be hidden again.
    Hidden,
}

/// Handle an executing command reports progress through.
///
/// Assigned by the processor before execution and only valid for that one
/// execution. Synchronous commands get a disconnected handle; their reports
/// are dropped.
#[derive(Debug, Clone)]
pub struct ProgressHandle {
    tx: Option<Sender<ProgressEvent>>,
}

impl ProgressHandle {
    pub(crate) fn live(tx: Sender<ProgressEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    /// Handle that drops every report.
    pub fn disconnected() -> Self {
        Self { tx: None }
    }

    /// Report a progress tick without touching the current message.
    pub fn report(&self, progress: f32) {
        self.send(ProgressEvent::Tick { progress: progress.clamp(0.0, 1.0), message: None });
    }

    /// Report a progress tick and replace the indicator message.
    ///
    /// A command typically sets the message once for the next step and then
    /// reports several plain ticks while that step runs.
    pub fn report_with_message(&self, progress: f32, message: impl Into<String>) {
        self.send(ProgressEvent::Tick {
            progress: progress.clamp(0.0, 1.0),
            message: Some(message.into()),
        });
    }

    fn send(&self, event: ProgressEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }
}

/// Model of the shared progress display.
///
/// Apply events from the processor's progress channel with [`apply`]; only
/// the draining thread may hold this, which keeps every mutation on one
/// thread.
///
/// [`apply`]: ProgressIndicator::apply
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgressIndicator {
    visible: bool,
    progress: f32,
    message: Option<String>,
    command: Option<String>,
}

impl ProgressIndicator {
    /// Create a hidden indicator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one progress event.
    pub fn apply(&mut self, event: ProgressEvent) {
        match event {
            ProgressEvent::Shown { command } => {
                self.visible = true;
                self.progress = 0.0;
                self.message = None;
                self.command = Some(command);
            }
            ProgressEvent::Tick { progress, message } => {
                self.progress = progress;
                if let Some(message) = message {
                    self.message = Some(message);
                }
            }
            ProgressEvent::Hidden => {
                self.visible = false;
                self.command = None;
            }
        }
    }

    /// Whether the indicator is currently shown.
    pub fn visible(&self) -> bool {
        self.visible
    }

    /// Last reported completion fraction.
    pub fn progress(&self) -> f32 {
        self.progress
    }

    /// Current indicator message, if any.
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Name of the command the indicator was shown for.
    pub fn command(&self) -> Option<&str> {
        self.command.as_deref()
    }
}
