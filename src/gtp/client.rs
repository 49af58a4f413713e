//! Correlating GTP client.
//!
//! Owns the write side of the engine connection and a reader thread that
//! routes each incoming response to the submitter whose request id it
//! carries. Multiple requests may be outstanding at once; every submitter
//! sees only its own response, whatever the arrival order.

use std::collections::HashMap;
use std::io::{self, BufReader, Read, Write};
use std::process::Child;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info, trace, warn};

use super::codec::{GtpRequest, GtpResponse, ResponseReader};
use super::profile::EngineProfile;
use super::GtpError;

/// Interrupt line understood by Fuego-style engines. Sent as a GTP comment so
/// engines without interrupt support ignore it.
const INTERRUPT_LINE: &str = "# interrupt\n";

type PendingMap = Mutex<HashMap<u32, Sender<GtpResponse>>>;

/// Identifies one outstanding request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestHandle {
    id: u32,
}

impl RequestHandle {
    /// The GTP id carried on the wire.
    pub fn id(&self) -> u32 {
        self.id
    }
}

/// An outstanding request waiting for its correlated response.
///
/// Dropping it without waiting is allowed; a response that arrives afterward
/// is matched and discarded.
#[derive(Debug)]
pub struct PendingRequest {
    handle: RequestHandle,
    rx: Receiver<GtpResponse>,
}

impl PendingRequest {
    /// Handle identifying this request.
    pub fn handle(&self) -> RequestHandle {
        self.handle
    }

    /// Block until the correlated response arrives.
    pub fn wait(self) -> Result<GtpResponse, GtpError> {
        self.rx.recv().map_err(|_| GtpError::Disconnected)
    }

    /// Block until the correlated response arrives or the deadline passes.
    pub fn wait_timeout(self, timeout: Duration) -> Result<GtpResponse, GtpError> {
        self.rx.recv_timeout(timeout).map_err(|err| match err {
            RecvTimeoutError::Timeout => GtpError::Timeout(timeout),
            RecvTimeoutError::Disconnected => GtpError::Disconnected,
        })
    }
}

/// Client for one GTP engine connection.
pub struct GtpClient {
    writer: Mutex<Box<dyn Write + Send>>,
    pending: Arc<PendingMap>,
    next_id: AtomicU32,
    child: Mutex<Option<Child>>,
}

impl GtpClient {
    /// Attach to an already established connection. The reader thread starts
    /// immediately.
    pub fn from_streams(
        writer: impl Write + Send + 'static,
        reader: impl Read + Send + 'static,
    ) -> Result<Self, GtpError> {
        let pending: Arc<PendingMap> = Arc::new(Mutex::new(HashMap::new()));

        let reader_pending = Arc::clone(&pending);
        thread::Builder::new()
            .name("gtp-reader".to_string())
            .spawn(move || read_loop(reader, &reader_pending))?;

        Ok(Self {
            writer: Mutex::new(Box::new(writer)),
            pending,
            next_id: AtomicU32::new(1),
            child: Mutex::new(None),
        })
    }

    /// Launch the engine subprocess described by `profile` and attach to its
    /// stdin/stdout.
    pub fn spawn(profile: &EngineProfile) -> Result<Self, GtpError> {
        let mut child = profile.spawn()?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| GtpError::Io(io::Error::other("engine stdin was not captured")))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| GtpError::Io(io::Error::other("engine stdout was not captured")))?;

        let client = Self::from_streams(stdin, stdout)?;
        info!(program = %profile.program, pid = child.id(), "engine started");
        *client.child.lock() = Some(child);
        Ok(client)
    }

    /// Send one command line and return a handle to the outstanding request.
    ///
    /// The pending entry is registered before the line is written, so the
    /// response cannot slip past the correlation map however fast the engine
    /// answers.
    pub fn submit_request(&self, command: &str) -> Result<PendingRequest, GtpError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = GtpRequest::new(id, command);

        let (tx, rx) = mpsc::channel();
        self.pending.lock().insert(id, tx);

        if let Err(err) = self.write_line(&request.to_wire()) {
            self.pending.lock().remove(&id);
            return Err(err);
        }

        trace!(id, command = %request.command, "request sent");
        Ok(PendingRequest { handle: RequestHandle { id }, rx })
    }

    /// Submit a command and block until its response arrives.
    pub fn send_request(&self, command: &str) -> Result<GtpResponse, GtpError> {
        self.submit_request(command)?.wait()
    }

    /// Ask the engine to abandon its current long-running computation.
    ///
    /// This does not cancel any request/response correlation: the response to
    /// an interrupted request may still arrive and is matched as usual.
    pub fn interrupt(&self) -> Result<(), GtpError> {
        debug!("sending engine interrupt");
        self.write_line(INTERRUPT_LINE)
    }

    /// Number of requests currently awaiting a response.
    pub fn outstanding(&self) -> usize {
        self.pending.lock().len()
    }

    /// Ask the engine to exit, close its stdin and reap the process.
    pub fn quit(&self) {
        let _ = self.send_request("quit");
        // Replacing the writer drops the engine's stdin; engines that ignore
        // `quit` still exit on EOF.
        *self.writer.lock() = Box::new(io::sink());
        if let Some(mut child) = self.child.lock().take() {
            let _ = child.wait();
        }
    }

    fn write_line(&self, line: &str) -> Result<(), GtpError> {
        let mut writer = self.writer.lock();
        writer.write_all(line.as_bytes())?;
        writer.flush()?;
        Ok(())
    }
}

impl Drop for GtpClient {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.lock().take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

/// Reader thread: route each response block to the waiting submitter.
fn read_loop(reader: impl Read, pending: &PendingMap) {
    let mut responses = ResponseReader::new(BufReader::new(reader));
    loop {
        match responses.read_response() {
            Ok(Some(response)) => route_response(response, pending),
            Ok(None) => {
                debug!("engine closed its output stream");
                break;
            }
            Err(GtpError::MalformedResponse(line)) => {
                warn!(line = %line, "discarding malformed engine output");
            }
            Err(err) => {
                warn!(error = %err, "failed to read engine response");
                break;
            }
        }
    }
    // Closing every waiter's channel surfaces as Disconnected.
    pending.lock().clear();
}

fn route_response(response: GtpResponse, pending: &PendingMap) {
    let Some(id) = response.id else {
        warn!(content = %response.content, "response without an id, discarding");
        return;
    };
    let Some(tx) = pending.lock().remove(&id) else {
        warn!(id, "response for unknown request id, discarding");
        return;
    };
    trace!(id, success = response.success, "response delivered");
    if tx.send(response).is_err() {
        debug!(id, "submitter no longer waiting, response discarded");
    }
}

#[cfg(test)]
mod tests {
    use std::io::BufRead;

    use super::super::testing::{pipe, read_request, spawn_echo_engine};
    use super::*;

    #[test]
    fn test_round_trip_with_echo_engine() {
        let (request_tx, request_rx) = pipe();
        let (response_tx, response_rx) = pipe();
        let engine = spawn_echo_engine(request_rx, response_tx);

        let client = GtpClient::from_streams(request_tx, response_rx).unwrap();
        let response = client.send_request("protocol_version").unwrap();

        assert!(response.success);
        assert_eq!(response.content, "ok");
        assert_eq!(client.outstanding(), 0);

        drop(client);
        engine.join().unwrap();
    }

    #[test]
    fn test_failure_status_is_delivered_not_lost() {
        let (request_tx, request_rx) = pipe();
        let (response_tx, response_rx) = pipe();
        let engine = spawn_echo_engine(request_rx, response_tx);

        let client = GtpClient::from_streams(request_tx, response_rx).unwrap();
        let response = client.send_request("fail loadsgf missing.sgf").unwrap();

        assert!(!response.success);
        assert_eq!(response.content, "cannot do that");

        drop(client);
        engine.join().unwrap();
    }

    #[test]
    fn test_responses_correlated_by_id_not_arrival_order() {
        let (request_tx, request_rx) = pipe();
        let (mut response_tx, response_rx) = pipe();

        // Engine that answers the second request first.
        let engine = thread::spawn(move || {
            let mut reader = BufReader::new(request_rx);
            let (first_id, _) = read_request(&mut reader).unwrap();
            let (second_id, _) = read_request(&mut reader).unwrap();
            write!(response_tx, "={second_id} second-answer\n\n").unwrap();
            write!(response_tx, "={first_id} first-answer\n\n").unwrap();
        });

        let client = GtpClient::from_streams(request_tx, response_rx).unwrap();
        let first = client.submit_request("name").unwrap();
        let second = client.submit_request("version").unwrap();

        let first_response = first.wait().unwrap();
        let second_response = second.wait().unwrap();

        assert_eq!(first_response.content, "first-answer");
        assert_eq!(second_response.content, "second-answer");

        engine.join().unwrap();
    }

    #[test]
    fn test_disconnect_surfaces_to_every_waiter() {
        let (request_tx, request_rx) = pipe();
        let (response_tx, response_rx) = pipe();

        // Engine that reads one request, never answers, and hangs up.
        let engine = thread::spawn(move || {
            let mut reader = BufReader::new(request_rx);
            let _ = read_request(&mut reader);
            drop(response_tx);
        });

        let client = GtpClient::from_streams(request_tx, response_rx).unwrap();
        let pending = client.submit_request("genmove b").unwrap();

        assert!(matches!(pending.wait(), Err(GtpError::Disconnected)));
        engine.join().unwrap();
    }

    #[test]
    fn test_late_response_to_dropped_waiter_is_discarded() {
        let (request_tx, request_rx) = pipe();
        let (response_tx, response_rx) = pipe();
        let engine = spawn_echo_engine(request_rx, response_tx);

        let client = GtpClient::from_streams(request_tx, response_rx).unwrap();

        let abandoned = client.submit_request("genmove w").unwrap();
        drop(abandoned);

        // The client keeps working after the discarded response.
        let response = client.send_request("showboard").unwrap();
        assert!(response.success);

        drop(client);
        engine.join().unwrap();
    }

    #[test]
    fn test_interrupt_writes_comment_line_without_pending_entry() {
        let (request_tx, request_rx) = pipe();
        let (_response_tx, response_rx) = pipe();

        let client = GtpClient::from_streams(request_tx, response_rx).unwrap();
        client.interrupt().unwrap();
        assert_eq!(client.outstanding(), 0);

        let mut reader = BufReader::new(request_rx);
        let mut line = String::new();
        reader.read_line(&mut line).unwrap();
        assert_eq!(line, "# interrupt\n");
    }

    #[test]
    fn test_wait_timeout_expires() {
        let (request_tx, _request_rx) = pipe();
        let (_response_tx, response_rx) = pipe();

        let client = GtpClient::from_streams(request_tx, response_rx).unwrap();
        let pending = client.submit_request("final_score").unwrap();

        assert!(matches!(
            pending.wait_timeout(Duration::from_millis(20)),
            Err(GtpError::Timeout(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_spawn_talks_to_a_real_process() {
        let profile = EngineProfile::new("sh").with_arg("-c").with_arg(
            r#"while read -r id cmd; do case "$id" in '#') ;; *) printf '=%s pong\n\n' "$id";; esac; done"#,
        );

        let client = GtpClient::spawn(&profile).unwrap();
        let response = client.send_request("protocol_version").unwrap();
        assert!(response.success);
        assert_eq!(response.content, "pong");

        client.quit();
    }
}
