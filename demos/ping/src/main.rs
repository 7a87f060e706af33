use anyhow::Context;
use clap::Parser;
use rawnet_core::{
    Builder, ControlFlags, ControlMessage, Error, PacketConn, PrivilegeMode, Protocol,
};
use rawnet_packet::icmpv4::IcmpType;
use rawnet_packet::message::IcmpMessage;
use std::net::{Ipv4Addr, SocketAddrV4};
use std::time::{Duration, Instant};
use tracing_subscriber::fmt::format::FmtSpan;

/// Send ICMP echo requests and report the replies.
#[derive(Parser, Debug)]
#[command(name = "rawnet-ping", author, version, about, long_about = None)]
struct Args {
    /// The IPv4 address to ping.
    #[arg(default_value_t = Ipv4Addr::LOCALHOST)]
    target: Ipv4Addr,

    /// The number of echo requests to send.
    #[arg(short = 'c', long, default_value_t = 4)]
    count: u16,

    /// The time-to-live of each echo request.
    #[arg(short = 't', long)]
    ttl: Option<u8>,

    /// The number of data bytes to send with each request.
    #[arg(short = 's', long, default_value_t = 56)]
    size: usize,

    /// How long to wait for each reply, in milliseconds.
    #[arg(short = 'W', long, default_value_t = 1000)]
    timeout: u64,

    /// Use an unprivileged ICMP socket.
    #[arg(short = 'u', long)]
    unprivileged: bool,

    /// Enable verbose debug logging.
    #[arg(short = 'v', long)]
    verbose: bool,

    /// The debug log filter.
    #[arg(long, default_value = "rawnet_core=debug")]
    log_filter: String,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    if args.verbose {
        tracing_subscriber::fmt()
            .with_span_events(FmtSpan::NONE)
            .with_env_filter(&args.log_filter)
            .init();
    }
    let privilege_mode = if args.unprivileged {
        PrivilegeMode::Unprivileged
    } else {
        PrivilegeMode::Privileged
    };
    let conn = Builder::new(Protocol::Icmp)
        .privilege_mode(privilege_mode)
        .read_timeout(Some(Duration::from_millis(args.timeout)))
        .build_packet_conn()
        .with_context(|| format!("failed to open {privilege_mode} ICMP socket"))?;
    let flags = enable_flags(&conn, ControlFlags::TTL | ControlFlags::DST)?;
    tracing::debug!(?flags, "active control flags");
    let identifier = std::process::id() as u16;
    let data = (0..args.size).map(|i| (i % 256) as u8).collect::<Vec<_>>();
    let target = SocketAddrV4::new(args.target, 0);
    let cm = ControlMessage {
        ttl: args.ttl,
        ..ControlMessage::default()
    };
    println!("PING {} {} data bytes", args.target, args.size);
    let mut received = 0;
    for sequence in 1..=args.count {
        let request = IcmpMessage::echo_request(identifier, sequence, &data).marshal()?;
        let start = Instant::now();
        conn.write_to(&request, Some(&cm), target)?;
        match await_reply(&conn, sequence)? {
            Some((len, reply_cm, peer)) => {
                received += 1;
                println!(
                    "{len} bytes from {}: icmp_seq={sequence} ttl={} time={:.3?}",
                    peer.ip(),
                    reply_cm.ttl.map_or_else(|| String::from("?"), |ttl| ttl.to_string()),
                    start.elapsed()
                );
            }
            None => println!("request timeout for icmp_seq {sequence}"),
        }
    }
    println!(
        "{} packets transmitted, {received} packets received",
        args.count
    );
    conn.close()?;
    Ok(())
}

/// Enable `flags`, dropping any the platform cannot supply.
fn enable_flags(conn: &PacketConn, flags: ControlFlags) -> anyhow::Result<ControlFlags> {
    match conn.set_control_message(flags, true) {
        Ok(()) => Ok(flags),
        Err(Error::UnsupportedField(missing)) => {
            tracing::warn!(?missing, "control flags not supported");
            conn.set_control_message(flags - missing, true)?;
            Ok(flags - missing)
        }
        Err(err) => Err(err.into()),
    }
}

/// Read until the echo reply for `sequence` arrives or the read times out.
///
/// A raw socket also delivers our own requests and replies for other processes, these are
/// skipped. An unprivileged socket rewrites the identifier and so only the sequence is checked.
fn await_reply(
    conn: &PacketConn,
    sequence: u16,
) -> anyhow::Result<Option<(usize, ControlMessage, SocketAddrV4)>> {
    let mut buf = [0_u8; 1500];
    loop {
        let (len, cm, peer) = match conn.read_from(&mut buf) {
            Ok(received) => received,
            Err(Error::TimedOut) => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        match IcmpMessage::parse(&buf[..len]) {
            Ok(message)
                if message.icmp_type == IcmpType::EchoReply
                    && message.echo_body().is_some_and(|echo| echo.sequence == sequence) =>
            {
                return Ok(Some((len, cm, peer)));
            }
            Ok(message) => tracing::debug!(?message, %peer, "skipping"),
            Err(err) => tracing::debug!(%err, %peer, "skipping malformed message"),
        }
    }
}
