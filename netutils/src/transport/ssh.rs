//! SSH backend, over libssh2.

use std::io::{self, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use log::debug;
use ssh2::Channel;

use netwalker_api::credentials::Credentials;
use netwalker_api::error::TransportError;

use super::Wire;

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

    let tcp = TcpStream::connect_timeout(&address, connect_timeout)
        .map_err(|e| TransportError::Unreachable(format!("{address}: {e}")))?;

    let mut session = ssh2::Session::new()
        .map_err(|e| TransportError::Protocol(format!("ssh session init: {e}")))?;
    session.set_tcp_stream(tcp);
    session.set_timeout(connect_timeout.as_millis() as u32);
    session
        .handshake()
        .map_err(|e| TransportError::Protocol(format!("ssh handshake: {e}")))?;

    session
        .userauth_password(&credentials.username, &credentials.password)
        .map_err(|e| TransportError::AuthFailed(e.to_string()))?;
    if !session.authenticated() {
        return Err(TransportError::AuthFailed("server rejected credentials".into()));
    }

    let mut channel = session
        .channel_session()
        .map_err(|e| TransportError::Protocol(format!("ssh channel: {e}")))?;
    channel
        .request_pty("vt100", None, Some((512, 128, 0, 0)))
        .map_err(|e| TransportError::Protocol(format!("ssh pty: {e}")))?;
    channel
        .shell()
        .map_err(|e| TransportError::Protocol(format!("ssh shell: {e}")))?;

    debug!("SSH shell established to {address}");
    Ok(Box::new(SshWire { session, channel }))
}

struct SshWire {
    session: ssh2::Session,
    channel: Channel,
}

impl Wire for SshWire {
    fn read_some(&mut self, buffer: &mut [u8], timeout: Duration) -> io::Result<usize> {
        // libssh2 honors the session timeout for blocking reads; a timeout
        // maps to "nothing arrived", not an error.
        self.session.set_timeout(timeout.as_millis() as u32);
        match self.channel.read(buffer) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(0),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(0),
            Err(e) => Err(e),
        }
    }

    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        self.channel.write_all(data)?;
        self.channel.flush()
    }

    fn close(&mut self) {
        let _ = self.channel.close();
    }
}
