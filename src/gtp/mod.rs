//! Go Text Protocol client.
//!
//! Talks to a long-lived GTP engine subprocess over its stdin/stdout. One
//! line of text per request, one `=`/`?` block per response, with responses
//! correlated to requests by the numeric GTP id rather than arrival order.

mod client;
mod codec;
mod profile;

pub use client::{GtpClient, PendingRequest, RequestHandle};
pub use codec::{GtpRequest, GtpResponse, ResponseReader};
pub use profile::EngineProfile;

use thiserror::Error;

/// Errors from the GTP transport and codec.
#[derive(Debug, Error)]
pub enum GtpError {
    /// The engine produced a line that is not a valid response block.
    #[error("malformed response line: {0:?}")]
    MalformedResponse(String),

    /// The engine closed the connection before answering.
    #[error("engine closed the connection")]
    Disconnected,

    /// No response arrived within the caller's deadline.
    #[error("no response from engine within {0:?}")]
    Timeout(std::time::Duration),

    /// Transport error talking to the engine process.
    #[error("engine transport error: {0}")]
    Io(#[from] std::io::Error),
}
