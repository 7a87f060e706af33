use crate::control::{ControlFlags, ControlMessage};
use crate::error::{Error, Result};
use crate::net::socket::Socket;
use parking_lot::{Mutex, RwLock};
use std::io;
use std::net::SocketAddrV4;
use std::time::{Duration, Instant};
use tracing::instrument;

/// The state shared by the packet and raw connections.
///
/// The socket is `None` once closed. Reads and writes hold the read side of the lock, so a
/// blocked read must release it every `poll_interval` to let `close` in.
#[derive(Debug)]
pub struct Endpoint<S> {
    socket: RwLock<Option<S>>,
    flags: Mutex<ControlFlags>,
    read_timeout: Mutex<Option<Duration>>,
    poll_interval: Duration,
}

impl<S: Socket> Endpoint<S> {
    pub fn new(
        socket: S,
        flags: ControlFlags,
        poll_interval: Duration,
        read_timeout: Option<Duration>,
    ) -> Result<Self> {
        let endpoint = Self {
            socket: RwLock::new(Some(socket)),
            flags: Mutex::new(ControlFlags::empty()),
            read_timeout: Mutex::new(read_timeout),
            poll_interval,
        };
        if !flags.is_empty() {
            endpoint.set_control_message(flags, true)?;
        }
        Ok(endpoint)
    }

    fn with_socket<T>(&self, f: impl FnOnce(&S) -> Result<T>) -> Result<T> {
        let guard = self.socket.read();
        let socket = guard.as_ref().ok_or(Error::ClosedConnection)?;
        f(socket)
    }

    #[instrument(skip(self), level = "trace")]
    pub fn set_control_message(&self, flags: ControlFlags, enable: bool) -> Result<()> {
        self.with_socket(|socket| {
            let mut current = self.flags.lock();
            let next = if enable {
                let missing = flags - socket.supported_control();
                if !missing.is_empty() {
                    return Err(Error::UnsupportedField(missing));
                }
                *current | flags
            } else {
                *current - flags
            };
            socket.set_control(next)?;
            tracing::debug!(from = ?*current, to = ?next, "control flags changed");
            *current = next;
            Ok(())
        })
    }

    pub fn control_flags(&self) -> ControlFlags {
        *self.flags.lock()
    }

    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.with_socket(|_| {
            tracing::debug!(?timeout, "read timeout changed");
            *self.read_timeout.lock() = timeout;
            Ok(())
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddrV4> {
        self.with_socket(|socket| socket.local_addr()?.ok_or(Error::MissingAddr))
    }

    pub fn header_included(&self) -> Result<bool> {
        self.with_socket(|socket| Ok(socket.header_included()))
    }

    pub fn send(&self, buf: &[u8], cm: &ControlMessage, addr: SocketAddrV4) -> Result<usize> {
        self.with_socket(|socket| {
            let missing = cm.write_flags() - socket.supported_control();
            if !missing.is_empty() {
                return Err(Error::UnsupportedField(missing));
            }
            Ok(socket.send_to(buf, cm, addr)?)
        })
    }

    /// Block until a datagram is received, the endpoint is closed or the read timeout elapses.
    ///
    /// The control message is masked by the flags active when the read started.
    pub fn recv(&self, buf: &mut [u8]) -> Result<(usize, ControlMessage, Option<SocketAddrV4>)> {
        let flags = self.control_flags();
        let deadline = self.read_timeout.lock().map(|timeout| Instant::now() + timeout);
        loop {
            let received = self.with_socket(|socket| {
                if !socket.is_readable(self.poll_interval)? {
                    return Ok(None);
                }
                match socket.recv_from(buf) {
                    Ok(received) => Ok(Some(received)),
                    Err(err) if err.kind() == io::ErrorKind::WouldBlock => Ok(None),
                    Err(err) => Err(Error::from(err)),
                }
            })?;
            if let Some((bytes_read, cm, addr)) = received {
                return Ok((bytes_read, cm.masked(flags), addr));
            }
            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                return Err(Error::TimedOut);
            }
        }
    }

    /// Close the socket.
    ///
    /// Closing an already closed endpoint does nothing.
    pub fn close(&self) -> Result<()> {
        if self.socket.write().take().is_some() {
            tracing::debug!("closed");
        }
        Ok(())
    }
}
