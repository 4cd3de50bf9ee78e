// ── Interactive shell channels ──

use std::io::{ErrorKind, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use crate::error::Error;

/// Outcome of one non-blocking read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadEvent {
    Data(String),
    Empty,
    Closed,
}

/// A byte stream to a device's command interpreter.
pub trait ShellChannel {
    /// Return whatever output is available right now without blocking.
    fn read_available(&mut self) -> Result<ReadEvent, Error>;

    fn send(&mut self, data: &[u8]) -> Result<(), Error>;

    /// Sleep between polls. Scripted channels override this to not sleep.
    fn pause(&mut self, interval: Duration) {
        std::thread::sleep(interval);
    }
}

/// Where and how to log in over SSH.
#[derive(Debug, Clone)]
pub struct SshTarget {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: SecretString,
    pub connect_timeout: Duration,
}

/// Password-authenticated SSH shell with a pseudo-terminal.
pub struct SshChannel {
    // Field order matters: the channel must drop before its session.
    channel: ssh2::Channel,
    _session: ssh2::Session,
}

impl SshChannel {
    pub fn connect(target: &SshTarget) -> Result<Self, Error> {
        let addr = (target.host.as_str(), target.port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| Error::Session {
                message: format!("cannot resolve {}", target.host),
            })?;
        let tcp = TcpStream::connect_timeout(&addr, target.connect_timeout)?;

        let mut session = ssh2::Session::new()?;
        session.set_tcp_stream(tcp);
        session.set_timeout(u32::try_from(target.connect_timeout.as_millis()).unwrap_or(u32::MAX));
        session.handshake()?;
        session.userauth_password(&target.username, target.password.expose_secret())?;
        if !session.authenticated() {
            return Err(Error::Authentication {
                message: format!("{} rejected user {}", target.host, target.username),
            });
        }

        let mut channel = session.channel_session()?;
        channel.request_pty("vt100", None, Some((200, 50, 0, 0)))?;
        channel.shell()?;
        session.set_blocking(false);

        debug!(host = %target.host, port = target.port, "interactive session open");
        Ok(Self {
            channel,
            _session: session,
        })
    }
}

impl ShellChannel for SshChannel {
    fn read_available(&mut self) -> Result<ReadEvent, Error> {
        let mut buf = [0u8; 8192];
        match self.channel.read(&mut buf) {
            Ok(0) if self.channel.eof() => Ok(ReadEvent::Closed),
            Ok(0) => Ok(ReadEvent::Empty),
            Ok(n) => Ok(ReadEvent::Data(
                String::from_utf8_lossy(buf.get(..n).unwrap_or_default()).into_owned(),
            )),
            Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(ReadEvent::Empty),
            Err(e) => Err(e.into()),
        }
    }

    fn send(&mut self, data: &[u8]) -> Result<(), Error> {
        let mut written = 0;
        while written < data.len() {
            match self.channel.write(data.get(written..).unwrap_or_default()) {
                Ok(n) => written += n,
                Err(e) if e.kind() == ErrorKind::WouldBlock => {
                    std::thread::sleep(Duration::from_millis(10));
                }
                Err(e) => return Err(e.into()),
            }
        }
        loop {
            match self.channel.flush() {
                Ok(()) => return Ok(()),
                Err(e) if e.kind() == ErrorKind::WouldBlock => {
                    std::thread::sleep(Duration::from_millis(10));
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

impl Drop for SshChannel {
    fn drop(&mut self) {
        // Best effort; the device tears the session down on TCP close anyway.
        let _ = self.channel.send_eof();
        let _ = self.channel.close();
    }
}
