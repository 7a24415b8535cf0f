//! Parses an IEEE EUI-48 MAC address and constructs a Wake-on-LAN
//! packet (so called "Magic Packet Technology"), plus the UDP plumbing
//! needed to get it on the wire.
use std::io::{self, Write};
use std::net::{Ipv4Addr, SocketAddr, ToSocketAddrs, UdpSocket};
use std::thread;
use std::time::Duration;

use thiserror::Error;

/// UDP "discard" service, the conventional Wake-on-LAN destination port.
pub const WOL_PORT: u16 = 9;

const MAC_LEN: usize = 6;
const MAGIC_PACKET_LEN: usize = 102;

pub struct MagicPacket([u8; MAGIC_PACKET_LEN]);

#[derive(Error, Debug)]
pub enum WakeError {
    /// The MAC argument did not contain exactly 12 hexadecimal digits.
    #[error("invalid MAC address: \"{0}\"")]
    InvalidMac(String),

    /// Hostname/IP lookup produced no usable IPv4 address.
    #[error("could not determine address of host \"{0}\"")]
    UnknownHost(String),

    #[error("could not create socket: {0}")]
    Socket(#[source] io::Error),

    #[error("send failed: {0}")]
    Send(#[source] io::Error),

    /// The datagram went out truncated. Should never happen for 102
    /// bytes over UDP, but a partial magic packet wakes nothing.
    #[error("short send: {sent} of {expected} bytes")]
    ShortSend { sent: usize, expected: usize },
}

/// Extracts a 6-byte MAC address from a free-form string.
///
/// Hex digits (case-insensitive) are collected in order; every other
/// character is skipped, so any grouping style works: `AA:BB:...`,
/// `aa-bb-...`, `aabb.ccdd.eeff` or no separators at all. The scan fails
/// if it runs out of input before 12 digits, or meets a 13th hex digit.
/// Trailing non-hex characters after the 12th digit are tolerated.
pub fn parse_mac(input: &str) -> Result<[u8; MAC_LEN], WakeError> {
    let mut digits = [0u8; 2 * MAC_LEN];
    let mut pos = 0;

    for c in input.chars() {
        if let Some(value) = c.to_digit(16) {
            if pos == digits.len() {
                return Err(WakeError::InvalidMac(input.to_owned()));
            }
            digits[pos] = value as u8;
            pos += 1;
        }
    }
    if pos != digits.len() {
        return Err(WakeError::InvalidMac(input.to_owned()));
    }

    let mut mac = [0u8; MAC_LEN];
    for (byte, pair) in mac.iter_mut().zip(digits.chunks_exact(2)) {
        *byte = pair[0] << 4 | pair[1];
    }
    Ok(mac)
}

/// Creates a magic packet for the given MAC address string: six 0xFF
/// sync bytes followed by the 6-byte MAC repeated 16 times.
pub fn create_magic_packet(mac: &str) -> Result<MagicPacket, WakeError> {
    Ok(MagicPacket::new(parse_mac(mac)?))
}

/// Resolves a hostname or IP literal to a datagram destination on the
/// discard port, keeping the first IPv4 result.
pub fn resolve_host(host: &str) -> Result<SocketAddr, WakeError> {
    let mut addrs = (host, WOL_PORT)
        .to_socket_addrs()
        .map_err(|_| WakeError::UnknownHost(host.to_owned()))?;
    addrs
        .find(|addr| addr.is_ipv4())
        .ok_or_else(|| WakeError::UnknownHost(host.to_owned()))
}

/// Opens the UDP socket used for all sends, bound to an ephemeral port.
pub fn open_socket() -> Result<UdpSocket, WakeError> {
    UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).map_err(WakeError::Socket)
}

/// Sends the packet `count` times with a one second pause between
/// consecutive sends (none after the last), printing a progress line
/// per send when `verbose` is set.
pub fn send_packets(
    socket: &UdpSocket,
    packet: &MagicPacket,
    destination: SocketAddr,
    count: u64,
    verbose: bool,
) -> Result<(), WakeError> {
    for n in 1..=count {
        if verbose {
            print!("Sending packet {n} of {count}... ");
            let _ = io::stdout().flush();
        }

        packet.send_to(socket, destination)?;

        if verbose {
            println!("done.");
        }
        if n < count {
            thread::sleep(Duration::from_secs(1));
        }
    }
    Ok(())
}

impl MagicPacket {
    pub fn new(mac: [u8; MAC_LEN]) -> Self {
        let mut packet = [0xFFu8; MAGIC_PACKET_LEN];
        // 16 occurrences of the MAC starting at the 7th byte, so the
        // first 6 bytes stay 0xFF
        for (index, byte) in packet.iter_mut().enumerate().skip(MAC_LEN) {
            *byte = mac[index % MAC_LEN];
        }
        MagicPacket(packet)
    }

    /// Sends the packet as a single datagram. Anything less than the
    /// full 102 bytes is an error.
    pub fn send_to(&self, socket: &UdpSocket, destination: SocketAddr) -> Result<(), WakeError> {
        let sent = socket.send_to(&self.0, destination).map_err(WakeError::Send)?;
        if sent != self.0.len() {
            return Err(WakeError::ShortSend {
                sent,
                expected: self.0.len(),
            });
        }
        Ok(())
    }
}

#[test]
fn test_mac_gibberish() {
    assert!(parse_mac("hello").is_err());
}

#[test]
fn test_mac_too_short() {
    assert!(parse_mac("AABBCC").is_err());
}

#[test]
fn test_mac_too_long() {
    assert!(parse_mac("AABBCCDDEEFF00").is_err());
}

#[test]
fn test_mac_trailing_garbage_tolerated() {
    // the scan only fails on a 13th hex digit, not on trailing junk
    assert_eq!(
        parse_mac("AABBCCDDEEFFxx").unwrap(),
        [0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]
    );
}

#[test]
fn test_mac_separators_arbitrary() {
    let mac = parse_mac("00:11-22 33.44_55").unwrap();
    assert_eq!(mac, [0x00, 0x11, 0x22, 0x33, 0x44, 0x55]);
}

#[test]
fn test_mac_case_insensitive() {
    assert_eq!(
        parse_mac("aabbccddeeff").unwrap(),
        parse_mac("AABBCCDDEEFF").unwrap()
    );
}

#[test]
fn test_mac_bare_digits() {
    assert_eq!(
        parse_mac("001122334455").unwrap(),
        [0x00, 0x11, 0x22, 0x33, 0x44, 0x55]
    );
}

#[test]
fn test_magic_layout() {
    let pkt = create_magic_packet("00-11-22-33-44-55").unwrap();

    assert_eq!(pkt.0.len(), 102);

    // starts with sync padding
    assert_eq!(&pkt.0[..6], &[0xFF; 6]);

    // followed by the MAC, repeated with period 6 up to the end
    let mac = [0x00, 0x11, 0x22, 0x33, 0x44, 0x55];
    for (index, byte) in pkt.0[6..].iter().enumerate() {
        assert_eq!(*byte, mac[index % 6]);
    }
    assert_eq!(&pkt.0[102 - 6..], &mac);
}

#[test]
fn test_magic_all_ff() {
    let pkt = create_magic_packet("FF:FF:FF:FF:FF:FF").unwrap();
    assert!(pkt.0.iter().all(|b| *b == 0xFF));
}

#[test]
fn test_send_to_delivers_full_packet() {
    let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
    receiver.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
    let destination = receiver.local_addr().unwrap();

    let socket = open_socket().unwrap();
    let pkt = create_magic_packet("00-11-22-33-44-55").unwrap();
    pkt.send_to(&socket, destination).unwrap();

    let mut buf = [0u8; 256];
    let (len, _) = receiver.recv_from(&mut buf).unwrap();
    assert_eq!(len, 102);
    assert_eq!(&buf[..6], &[0xFF; 6]);
    let mac = [0x00, 0x11, 0x22, 0x33, 0x44, 0x55];
    assert_eq!(&buf[6..12], &mac);
    assert_eq!(&buf[96..102], &mac);
}

#[test]
fn test_send_packets_repeat_count() {
    let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
    receiver.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
    let destination = receiver.local_addr().unwrap();

    let socket = open_socket().unwrap();
    let pkt = create_magic_packet("FF:FF:FF:FF:FF:FF").unwrap();
    send_packets(&socket, &pkt, destination, 3, false).unwrap();

    // exactly three full datagrams arrive
    let mut buf = [0u8; 256];
    for _ in 0..3 {
        let (len, _) = receiver.recv_from(&mut buf).unwrap();
        assert_eq!(len, 102);
    }
}

#[test]
fn test_resolve_broadcast_literal() {
    let addr = resolve_host("255.255.255.255").unwrap();
    assert!(addr.is_ipv4());
    assert_eq!(addr.port(), WOL_PORT);
    assert_eq!(addr.ip().to_string(), "255.255.255.255");
}
