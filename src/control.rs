//! Minimal remote control surface.
//!
//! Line-oriented TCP: a client connects, sends one command line, receives one
//! JSON line, and the connection is closed.
//!
//! | Command   | Reply |
//! |-----------|-------|
//! | `status`  | full `SystemSnapshot` |
//! | `enable`  | `{"system_active":true}` |
//! | `disable` | `{"system_active":false}` |
//! | `toggle`  | `{"system_active":<new value>}` |
//!
//! `disable` is the kill switch. It silences the alarm; the detection loop
//! and this server keep running.

use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::str::FromStr;
use std::thread;
use std::time::Duration;

use serde_json::json;
use tracing::{debug, info, warn};

use crate::snapshot::ControlHandle;

const READ_TIMEOUT: Duration = Duration::from_secs(2);
const MAX_COMMAND_LEN: u64 = 256;
/// Pause after a failed `accept` so a persistent failure (fd exhaustion)
/// does not spin the thread.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Where a connection attempt failed.
#[derive(Debug)]
enum ServeError {
    /// The listener itself failed; likely to repeat immediately.
    Accept(io::Error),
    /// One client misbehaved or hung up.
    Client(io::Error),
}

impl ServeError {
    fn retry_delay(&self) -> Option<Duration> {
        match self {
            ServeError::Accept(_) => Some(ACCEPT_BACKOFF),
            ServeError::Client(_) => None,
        }
    }

    fn into_io(self) -> io::Error {
        match self {
            ServeError::Accept(e) | ServeError::Client(e) => e,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Status,
    Enable,
    Disable,
    Toggle,
}

impl FromStr for Command {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "status" | "data" => Ok(Command::Status),
            "enable" | "start" => Ok(Command::Enable),
            "disable" | "stop" => Ok(Command::Disable),
            "toggle" => Ok(Command::Toggle),
            other => Err(format!("unknown command '{}'", other)),
        }
    }
}

/// Apply a command and build its JSON reply.
pub fn execute(control: &ControlHandle, command: Command) -> serde_json::Value {
    match command {
        Command::Status => {
            let snapshot = control.get_snapshot();
            serde_json::to_value(&*snapshot)
                .unwrap_or_else(|e| json!({ "error": format!("serialization failed: {}", e) }))
        }
        Command::Enable => {
            control.set_enabled(true);
            info!("system enabled via control channel");
            json!({ "system_active": true })
        }
        Command::Disable => {
            control.set_enabled(false);
            info!("system disabled via control channel");
            json!({ "system_active": false })
        }
        Command::Toggle => {
            let now = control.toggle();
            info!(system_active = now, "system toggled via control channel");
            json!({ "system_active": now })
        }
    }
}

/// Blocking control server. Serves one connection at a time.
pub struct ControlServer {
    listener: TcpListener,
    control: ControlHandle,
}

impl ControlServer {
    pub fn bind(addr: impl ToSocketAddrs, control: ControlHandle) -> io::Result<Self> {
        let listener = TcpListener::bind(addr)?;
        Ok(Self { listener, control })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections until the process exits. Per-connection errors are
    /// logged and never stop the server.
    pub fn serve_forever(&self) -> ! {
        if let Ok(addr) = self.local_addr() {
            info!(%addr, "control server listening");
        }
        loop {
            if let Err(e) = self.serve_next() {
                match e.retry_delay() {
                    Some(delay) => {
                        warn!(error = %e.into_io(), "control listener accept failed");
                        thread::sleep(delay);
                    }
                    None => warn!(error = %e.into_io(), "control connection failed"),
                }
            }
        }
    }

    /// Accept and answer a single connection.
    pub fn serve_one(&self) -> io::Result<()> {
        self.serve_next().map_err(ServeError::into_io)
    }

    fn serve_next(&self) -> Result<(), ServeError> {
        let (stream, peer) = self.listener.accept().map_err(ServeError::Accept)?;
        debug!(%peer, "control client connected");
        self.handle(stream).map_err(ServeError::Client)
    }

    fn handle(&self, stream: TcpStream) -> io::Result<()> {
        stream.set_read_timeout(Some(READ_TIMEOUT))?;
        let mut reader = BufReader::new(stream.try_clone()?.take(MAX_COMMAND_LEN));
        let mut line = String::new();
        reader.read_line(&mut line)?;

        let reply = match line.parse::<Command>() {
            Ok(command) => execute(&self.control, command),
            Err(e) => json!({ "error": e }),
        };

        let mut stream = stream;
        writeln!(stream, "{}", reply)?;
        stream.flush()
    }
}

/// Send one command and return the parsed reply. Used by tests and tooling.
pub fn send_command(addr: impl ToSocketAddrs, command: &str) -> io::Result<serde_json::Value> {
    let mut stream = TcpStream::connect(addr)?;
    stream.set_read_timeout(Some(READ_TIMEOUT))?;
    writeln!(stream, "{}", command)?;
    stream.flush()?;

    let mut line = String::new();
    BufReader::new(stream).read_line(&mut line)?;
    serde_json::from_str(&line).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}
