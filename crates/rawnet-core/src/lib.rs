//! Rawnet - raw `IPv4` connections with per-packet control messages.
//!
//! This crate provides two connection types over `IPv4` sockets:
//!
//! - [`PacketConn`] exchanges payloads (a `UDP` datagram body or an `ICMP` message).
//! - [`RawConn`] exchanges whole datagrams, the caller supplies and receives the `IPv4` header.
//!
//! Both allow the caller to choose, at any time, which ancillary data (time-to-live,
//! destination address, inbound interface) is delivered with each read via [`ControlFlags`],
//! and to override the time-to-live, source address or outgoing interface of individual
//! writes via a [`ControlMessage`].
//!
//! # Example
//!
//! The following example sends an `ICMP` echo request to localhost and reads the reply along
//! with its time-to-live:
//!
//! ```no_run
//! # fn main() -> anyhow::Result<()> {
//! use rawnet_core::{Builder, ControlFlags, PrivilegeMode, Protocol};
//! use rawnet_packet::message::IcmpMessage;
//! use std::net::{Ipv4Addr, SocketAddrV4};
//!
//! let conn = Builder::new(Protocol::Icmp)
//!     .privilege_mode(PrivilegeMode::Unprivileged)
//!     .control_flags(ControlFlags::TTL)
//!     .build_packet_conn()?;
//! let request = IcmpMessage::echo_request(1234, 1, b"HELLO-R-U-THERE").marshal()?;
//! conn.write_to(&request, None, SocketAddrV4::new(Ipv4Addr::LOCALHOST, 0))?;
//! let mut buf = [0; 1500];
//! let (len, cm, peer) = conn.read_from(&mut buf)?;
//! let reply = IcmpMessage::parse(&buf[..len])?;
//! println!("{:?} from {peer} ({cm})", reply.icmp_type);
//! # Ok(())
//! # }
//! ```
//!
//! # See Also
//!
//! - [`Builder`] - Open a socket and build a connection.
//! - [`PacketConn::set_control_message`] - Choose the ancillary data delivered with reads.
//! - [`RawConn::write_to`] - Send a datagram with a caller supplied header.
#![warn(clippy::all, clippy::pedantic, clippy::nursery, rust_2018_idioms)]
#![allow(
    clippy::module_name_repetitions,
    clippy::option_if_let_else,
    clippy::missing_const_for_fn,
    clippy::cast_possible_truncation,
    clippy::missing_errors_doc
)]
#![deny(unsafe_code)]

mod builder;
mod config;
mod control;
mod error;
mod net;

pub use builder::Builder;
pub use config::{defaults, ConnConfig, PrivilegeMode, Protocol};
pub use control::{ControlFlags, ControlMessage};
pub use error::{Error, IoError, IoOperation, IoResult, Result};
pub use net::{Ipv4ByteOrder, PacketConn, RawConn, Socket, SocketImpl};
