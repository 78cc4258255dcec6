//! Authenticated interactive sessions to network devices.
//!
//! A [`Session`] wraps one logged-in CLI over SSH or Telnet. Reads are
//! prompt-driven: every command waits until the device prompt reappears or
//! the per-command deadline fires. A timed-out session is poisoned and
//! refuses further commands.
//!
//! Transport never retries; the crawl scheduler owns retry policy.

mod ssh;
mod telnet;

use std::io;
use std::time::{Duration, Instant};

use lazy_static::lazy_static;
use log::{debug, info, warn};
use regex::Regex;

use netwalker_api::config::{ConnectionConfig, PreferredMethod};
use netwalker_api::credentials::Credentials;
use netwalker_api::error::TransportError;

/// How long a single blocking read waits before the deadline is rechecked.
const READ_SLICE: Duration = Duration::from_millis(250);

/// Commands issued after login to disable paging, across the vendors we
/// drive. Rejections are expected and ignored.
const PAGER_COMMANDS: &[&str] = &[
    "terminal length 0",
    "terminal pager 0",
    "set cli screen-length 0",
];

lazy_static! {
    /// A CLI prompt: last line of output ending in `>` or `#`, optionally
    /// with a mode suffix like `(config)`.
    static ref PROMPT_LINE: Regex = Regex::new(r"(?m)^\s*([\w.\-@/]+)(?:\([\w\-]+\))?\s*[>#]\s*$").unwrap();
    static ref AUTH_REJECT: Regex =
        Regex::new(r"(?i)authentication failed|login invalid|access denied|permission denied").unwrap();
}

/// Connection preferences for one crawl.
#[derive(Debug, Clone)]
pub struct Preferences {
    pub ssh_port: u16,
    pub telnet_port: u16,
    pub preferred: PreferredMethod,
    pub connect_timeout: Duration,
    pub command_timeout: Duration,
}

impl Preferences {
    pub fn from_config(connection: &ConnectionConfig, connect_timeout: Duration) -> Self {
        Self {
            ssh_port: connection.ssh_port,
            telnet_port: connection.telnet_port,
            preferred: connection.preferred_method,
            connect_timeout,
            // Large show outputs on big devices stream slowly; commands get
            // the same budget as the connect.
            command_timeout: connect_timeout,
        }
    }
}

/// Byte-stream backend under a session: an SSH channel or a telnet socket.
pub(crate) trait Wire: Send {
    /// Read whatever is available within `timeout`. `Ok(0)` means nothing
    /// arrived in time; EOF surfaces as an error.
    fn read_some(&mut self, buffer: &mut [u8], timeout: Duration) -> io::Result<usize>;
    fn write_all(&mut self, data: &[u8]) -> io::Result<()>;
    /// Best-effort shutdown.
    fn close(&mut self);
}

/// One authenticated interactive session. Owned by a single worker for the
/// duration of one device visit; closed on drop.
pub struct Session {
    wire: Box<dyn Wire>,
    base_prompt: String,
    privileged: bool,
    poisoned: bool,
    command_timeout: Duration,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("base_prompt", &self.base_prompt)
            .field("privileged", &self.privileged)
            .field("poisoned", &self.poisoned)
            .field("command_timeout", &self.command_timeout)
            .finish()
    }
}

/// Open a session to `host`, preferring the configured protocol and falling
/// back to the other on failure. Both failing is fatal for the device; an
/// authentication failure on either side dominates the reported error.
pub fn open(
    host: &str,
    credentials: &Credentials,
    preferences: &Preferences,
) -> Result<Session, TransportError> {
    let order: [PreferredMethod; 2] = match preferences.preferred {
        PreferredMethod::Ssh => [PreferredMethod::Ssh, PreferredMethod::Telnet],
        PreferredMethod::Telnet => [PreferredMethod::Telnet, PreferredMethod::Ssh],
    };

    let mut first_error: Option<TransportError> = None;
    for method in order {
        let attempt = match method {
            PreferredMethod::Ssh => {
                debug!("Trying SSH to {host}:{}", preferences.ssh_port);
                ssh::connect(host, preferences.ssh_port, credentials, preferences.connect_timeout)
            }
            PreferredMethod::Telnet => {
                debug!("Trying Telnet to {host}:{}", preferences.telnet_port);
                telnet::connect(
                    host,
                    preferences.telnet_port,
                    credentials,
                    preferences.connect_timeout,
                )
            }
        };

        // A banner mismatch during establishment falls through to the other
        // protocol just like a connect failure does.
        let attempt =
            attempt.and_then(|wire| Session::establish(wire, preferences.command_timeout));

        match attempt {
            Ok(mut session) => {
                session.quiet_pagers();
                session.escalate(credentials);
                info!("Session open to {host} via {method:?}");
                return Ok(session);
            }
            Err(e) => {
                warn!("{method:?} to {host} failed: {e}");
                // AuthFailed carries more signal than a later Unreachable.
                if first_error.is_none() || matches!(e, TransportError::AuthFailed(_)) {
                    first_error = Some(e);
                }
            }
        }
    }

    Err(first_error.unwrap_or_else(|| TransportError::Unreachable("no protocol attempted".into())))
}

impl Session {
    /// Wrap a logged-in wire: read the banner until the first prompt and
    /// remember its base for command framing.
    fn establish(wire: Box<dyn Wire>, command_timeout: Duration) -> Result<Self, TransportError> {
        let mut session = Session {
            wire,
            base_prompt: String::new(),
            privileged: false,
            poisoned: false,
            command_timeout,
        };

        // A bare newline makes devices that already printed their prompt
        // print it again.
        session
            .wire
            .write_all(b"\n")
            .map_err(|e| TransportError::Protocol(e.to_string()))?;

        let deadline = Instant::now() + command_timeout;
        let banner = session.read_until(deadline, |text| {
            find_prompt(text).is_some() || AUTH_REJECT.is_match(text)
        })?;

        if AUTH_REJECT.is_match(&banner) {
            return Err(TransportError::AuthFailed(last_line(&banner)));
        }
        let prompt = find_prompt(&banner)
            .ok_or_else(|| TransportError::Protocol("no prompt in banner".into()))?;

        session.privileged = prompt.privileged;
        session.base_prompt = prompt.base;
        debug!(
            "Detected prompt '{}' (privileged: {})",
            session.base_prompt, session.privileged
        );
        Ok(session)
    }

    /// The device name embedded in the prompt; used when `show version`
    /// output does not carry a hostname.
    pub fn prompt_hostname(&self) -> &str {
        &self.base_prompt
    }

    pub fn is_privileged(&self) -> bool {
        self.privileged
    }

    /// Send one command and return its output with the echo and trailing
    /// prompt stripped. A deadline overrun poisons the session.
    pub fn send(&mut self, command: &str) -> Result<String, TransportError> {
        if self.poisoned {
            return Err(TransportError::Protocol(
                "session poisoned by earlier timeout".into(),
            ));
        }

        debug!("> {command}");
        self.wire
            .write_all(format!("{command}\n").as_bytes())
            .map_err(|e| {
                self.poisoned = true;
                TransportError::Protocol(e.to_string())
            })?;

        let deadline = Instant::now() + self.command_timeout;
        let base = self.base_prompt.clone();
        let raw = match self.read_until(deadline, |text| ends_at_prompt(text, &base)) {
            Ok(raw) => raw,
            Err(e) => {
                self.poisoned = true;
                self.wire.close();
                return Err(e);
            }
        };

        Ok(clean_output(&raw, command, &self.base_prompt))
    }

    /// Issue the pager-disable commands; rejections are logged and ignored.
    fn quiet_pagers(&mut self) {
        for command in PAGER_COMMANDS {
            match self.send(command) {
                Ok(_) => {}
                Err(TransportError::Timeout(_)) => {
                    warn!("Pager command '{command}' timed out");
                    return;
                }
                Err(e) => debug!("Pager command '{command}' rejected: {e}"),
            }
        }
    }

    /// Move from user exec to privileged mode when an enable password is on
    /// hand. Failure is recorded but does not abort the session.
    fn escalate(&mut self, credentials: &Credentials) {
        if self.privileged {
            return;
        }
        let Some(enable_password) = &credentials.enable_password else {
            return;
        };

        debug!("Entering privileged mode");
        if self.wire.write_all(b"enable\n").is_err() {
            warn!("Could not send enable command");
            return;
        }

        let deadline = Instant::now() + self.command_timeout;
        let prompt_or_password =
            |text: &str| text.trim_end().ends_with(':') || find_prompt(text).is_some();
        if self.read_until(deadline, prompt_or_password).is_err() {
            warn!("No response to enable command");
            return;
        }

        if self
            .wire
            .write_all(format!("{enable_password}\n").as_bytes())
            .is_err()
        {
            warn!("Could not send enable password");
            return;
        }

        let deadline = Instant::now() + self.command_timeout;
        match self.read_until(deadline, |text| find_prompt(text).is_some()) {
            Ok(text) => match find_prompt(&text) {
                Some(prompt) if prompt.privileged => {
                    self.privileged = true;
                    self.base_prompt = prompt.base;
                    debug!("Privileged mode entered");
                }
                _ => warn!("Enable password rejected, continuing in user exec"),
            },
            Err(e) => warn!("Enable escalation failed: {e}"),
        }
    }

    /// Accumulate output until `done` says so or the deadline fires.
    fn read_until(
        &mut self,
        deadline: Instant,
        done: impl Fn(&str) -> bool,
    ) -> Result<String, TransportError> {
        let mut collected = Vec::new();
        let mut buffer = [0u8; 4096];

        loop {
            let text = String::from_utf8_lossy(&collected);
            if done(&text) {
                return Ok(text.into_owned());
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(TransportError::Timeout(self.command_timeout));
            }

            let slice = READ_SLICE.min(deadline - now);
            match self.wire.read_some(&mut buffer, slice) {
                Ok(0) => continue,
                Ok(n) => collected.extend_from_slice(&buffer[..n]),
                Err(e) if e.kind() == io::ErrorKind::TimedOut => continue,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => continue,
                Err(e) => return Err(TransportError::Protocol(e.to_string())),
            }
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.wire.close();
    }
}

struct Prompt {
    base: String,
    privileged: bool,
}

/// Find the device prompt on the last line of `text`.
fn find_prompt(text: &str) -> Option<Prompt> {
    let line = text.lines().rev().find(|l| !l.trim().is_empty())?;
    let captures = PROMPT_LINE.captures(line)?;
    Some(Prompt {
        base: captures[1].to_string(),
        privileged: line.trim_end().ends_with('#'),
    })
}

/// Does the collected output end with our own prompt again?
fn ends_at_prompt(text: &str, base_prompt: &str) -> bool {
    match find_prompt(text) {
        Some(prompt) => prompt.base == base_prompt,
        None => false,
    }
}

fn last_line(text: &str) -> String {
    text.lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .unwrap_or("")
        .trim()
        .to_string()
}

/// Strip carriage returns, the echoed command, and the trailing prompt.
fn clean_output(raw: &str, command: &str, base_prompt: &str) -> String {
    let mut lines: Vec<&str> = raw
        .split('\n')
        .map(|line| line.trim_end_matches('\r'))
        .collect();

    while let Some(first) = lines.first() {
        let trimmed = first.trim();
        if trimmed.is_empty() || trimmed == command || trimmed.ends_with(command) {
            lines.remove(0);
        } else {
            break;
        }
    }
    while let Some(last) = lines.last() {
        let trimmed = last.trim();
        if trimmed.is_empty() || trimmed.starts_with(base_prompt) {
            lines.pop();
        } else {
            break;
        }
    }

    lines.join("\n")
}
