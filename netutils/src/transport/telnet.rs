//! Telnet backend: a plain TCP stream with minimal RFC 854 option handling.
//!
//! Every option the far side proposes is refused (DO -> WONT, WILL -> DONT),
//! which leaves both ends in the basic NVT mode that network gear is happy
//! to drive a CLI over. The username/password dialog runs here; prompt
//! handling afterwards is shared session logic.

use std::io::{self, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

use log::debug;

use netwalker_api::credentials::Credentials;
use netwalker_api::error::TransportError;

use super::Wire;

const IAC: u8 = 255;
const DONT: u8 = 254;
const DO: u8 = 253;
const WONT: u8 = 252;
const WILL: u8 = 251;
const SB: u8 = 250;
const SE: u8 = 240;

pub(crate) fn connect(
    host: &str,
    port: u16,
    credentials: &Credentials,
    connect_timeout: Duration,
) -> Result<Box<dyn Wire>, TransportError> {
    let address = (host, port)
        .to_socket_addrs()
        .map_err(|e| TransportError::Unreachable(format!("{host}: {e}")))?
        .next()
        .ok_or_else(|| TransportError::Unreachable(format!("{host}: no address")))?;

    let stream = TcpStream::connect_timeout(&address, connect_timeout)
        .map_err(|e| TransportError::Unreachable(format!("{address}: {e}")))?;
    stream
        .set_nodelay(true)
        .map_err(|e| TransportError::Protocol(e.to_string()))?;

    let mut wire = TelnetWire {
        stream,
        pending: Vec::new(),
    };
    login(&mut wire, credentials, connect_timeout)?;

    debug!("Telnet login complete to {address}");
    Ok(Box::new(wire))
}

/// Drive the login dialog up to the point where the password has been sent.
/// Whether it was accepted is visible in the banner the session reads next.
fn login(
    wire: &mut TelnetWire,
    credentials: &Credentials,
    timeout: Duration,
) -> Result<(), TransportError> {
    let deadline = Instant::now() + timeout;

    let login_banner = read_until(wire, deadline, timeout, |text| {
        let lower = text.to_ascii_lowercase();
        lower.contains("sername:") || lower.contains("login:")
    })?;
    debug!("Telnet login banner: {} bytes", login_banner.len());
    wire.write_all(format!("{}\n", credentials.username).as_bytes())
        .map_err(|e| TransportError::Protocol(e.to_string()))?;

    read_until(wire, deadline, timeout, |text| {
        text.to_ascii_lowercase().contains("assword:")
    })?;
    wire.write_all(format!("{}\n", credentials.password).as_bytes())
        .map_err(|e| TransportError::Protocol(e.to_string()))?;

    Ok(())
}

fn read_until(
    wire: &mut TelnetWire,
    deadline: Instant,
    total: Duration,
    done: impl Fn(&str) -> bool,
) -> Result<String, TransportError> {
    let mut collected = Vec::new();
    let mut buffer = [0u8; 1024];

    loop {
        let text = String::from_utf8_lossy(&collected);
        if done(&text) {
            return Ok(text.into_owned());
        }
        let now = Instant::now();
        if now >= deadline {
            return Err(TransportError::Timeout(total));
        }

        match wire.read_some(&mut buffer, Duration::from_millis(250).min(deadline - now)) {
            Ok(0) => continue,
            Ok(n) => collected.extend_from_slice(&buffer[..n]),
            Err(e) => return Err(TransportError::Protocol(e.to_string())),
        }
    }
}

struct TelnetWire {
    stream: TcpStream,
    /// Refusals queued while stripping IAC sequences from a read.
    pending: Vec<u8>,
}

impl TelnetWire {
    /// Strip telnet command sequences from `raw`, queueing refusals for any
    /// negotiation requests.
    fn strip_iac(&mut self, raw: &[u8]) -> Vec<u8> {
        let mut data = Vec::with_capacity(raw.len());
        let mut i = 0;
        while i < raw.len() {
            if raw[i] != IAC {
                data.push(raw[i]);
                i += 1;
                continue;
            }
            match raw.get(i + 1) {
                Some(&IAC) => {
                    // Escaped 0xff data byte.
                    data.push(IAC);
                    i += 2;
                }
                Some(&DO) => {
                    if let Some(&option) = raw.get(i + 2) {
                        self.pending.extend_from_slice(&[IAC, WONT, option]);
                    }
                    i += 3;
                }
                Some(&WILL) => {
                    if let Some(&option) = raw.get(i + 2) {
                        self.pending.extend_from_slice(&[IAC, DONT, option]);
                    }
                    i += 3;
                }
                Some(&DONT) | Some(&WONT) => i += 3,
                Some(&SB) => {
                    // Skip a subnegotiation through IAC SE.
                    let mut j = i + 2;
                    while j < raw.len() {
                        if raw[j] == IAC && raw.get(j + 1) == Some(&SE) {
                            j += 2;
                            break;
                        }
                        j += 1;
                    }
                    i = j;
                }
                Some(_) => i += 2,
                None => i += 1,
            }
        }
        data
    }

    fn flush_refusals(&mut self) -> io::Result<()> {
        if !self.pending.is_empty() {
            let refusals = std::mem::take(&mut self.pending);
            self.stream.write_all(&refusals)?;
        }
        Ok(())
    }
}

impl Wire for TelnetWire {
    fn read_some(&mut self, buffer: &mut [u8], timeout: Duration) -> io::Result<usize> {
        self.stream.set_read_timeout(Some(timeout))?;
        let mut raw = vec![0u8; buffer.len()];
        let n = match self.stream.read(&mut raw) {
            Ok(0) => return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "closed")),
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::TimedOut => return Ok(0),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(0),
            Err(e) => return Err(e),
        };

        let data = self.strip_iac(&raw[..n]);
        self.flush_refusals()?;

        let len = data.len().min(buffer.len());
        buffer[..len].copy_from_slice(&data[..len]);
        Ok(len)
    }

    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        self.stream.write_all(data)
    }

    fn close(&mut self) {
        let _ = self.stream.shutdown(std::net::Shutdown::Both);
    }
}
