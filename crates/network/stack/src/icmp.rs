//! ICMP echo: frame builder and the single outstanding ping

use smoltcp::phy::ChecksumCapabilities;
use smoltcp::wire::{
    EthernetAddress, EthernetFrame, EthernetProtocol, EthernetRepr, Icmpv4Packet, Icmpv4Repr,
    IpProtocol, Ipv4Address, Ipv4Packet, Ipv4Repr,
};

use crate::checksum;
use crate::{ETH_HEADER_LEN, ICMP_HEADER_LEN, IPV4_HEADER_LEN};

/// TTL of every IPv4 packet we originate
pub const DEFAULT_TTL: u8 = 64;
/// Bytes of payload in an echo request
pub const ECHO_PAYLOAD_LEN: usize = 32;

const IPV4_CHECKSUM_OFFSET: usize = 10;
const ICMP_CHECKSUM_OFFSET: usize = 2;

/// Successful ping outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PingReply {
    pub from: Ipv4Address,
    pub seq: u16,
    pub ttl: u8,
}

/// Echo message kinds the stack builds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EchoKind {
    Request,
    Reply,
}

/// Link and network endpoints of one echo frame
#[derive(Debug, Clone, Copy)]
pub struct EchoRoute {
    pub src_mac: EthernetAddress,
    pub dst_mac: EthernetAddress,
    pub src_ip: Ipv4Address,
    pub dst_ip: Ipv4Address,
}

/// Request payload: bytes 0, 1, ..., 31
pub fn echo_payload() -> [u8; ECHO_PAYLOAD_LEN] {
    let mut data = [0u8; ECHO_PAYLOAD_LEN];
    for (i, b) in data.iter_mut().enumerate() {
        *b = i as u8;
    }
    data
}

/// Frame length for an echo carrying `data_len` payload bytes
pub const fn echo_frame_len(data_len: usize) -> usize {
    ETH_HEADER_LEN + IPV4_HEADER_LEN + ICMP_HEADER_LEN + data_len
}

/// Write Ethernet + IPv4 + ICMP echo into `buf`; returns the frame length
///
/// Both checksums are computed over the finished headers. `buf` must hold
/// [`echo_frame_len`] bytes for `data`.
pub fn emit_echo(
    buf: &mut [u8],
    route: &EchoRoute,
    kind: EchoKind,
    ident: u16,
    seq_no: u16,
    data: &[u8],
) -> usize {
    let icmp_repr = match kind {
        EchoKind::Request => Icmpv4Repr::EchoRequest { ident, seq_no, data },
        EchoKind::Reply => Icmpv4Repr::EchoReply { ident, seq_no, data },
    };
    let icmp_len = icmp_repr.buffer_len();
    let ip_repr = Ipv4Repr {
        src_addr: route.src_ip,
        dst_addr: route.dst_ip,
        next_header: IpProtocol::Icmp,
        payload_len: icmp_len,
        hop_limit: DEFAULT_TTL,
    };
    let total_len = ETH_HEADER_LEN + ip_repr.buffer_len() + icmp_len;

    let eth_repr = EthernetRepr {
        src_addr: route.src_mac,
        dst_addr: route.dst_mac,
        ethertype: EthernetProtocol::Ipv4,
    };
    let mut eth_frame = EthernetFrame::new_unchecked(&mut buf[..total_len]);
    eth_repr.emit(&mut eth_frame);

    let ip_bytes = eth_frame.payload_mut();
    let mut ip_packet = Ipv4Packet::new_unchecked(&mut *ip_bytes);
    ip_repr.emit(&mut ip_packet, &ChecksumCapabilities::ignored());

    let (header, icmp_bytes) = ip_bytes.split_at_mut(IPV4_HEADER_LEN);
    let mut icmp_packet = Icmpv4Packet::new_unchecked(&mut *icmp_bytes);
    icmp_repr.emit(&mut icmp_packet, &ChecksumCapabilities::ignored());

    checksum::fill(header, IPV4_CHECKSUM_OFFSET);
    checksum::fill(icmp_bytes, ICMP_CHECKSUM_OFFSET);

    total_len
}

/// State of the one ping in flight
///
/// The sequence number persists across pings and advances once per attempt,
/// whether it succeeded or timed out.
#[derive(Debug)]
pub struct EchoSession {
    ident: u16,
    seq: u16,
    waiting: bool,
    reply: Option<PingReply>,
}

impl EchoSession {
    pub const fn new(ident: u16) -> Self {
        EchoSession {
            ident,
            seq: 0,
            waiting: false,
            reply: None,
        }
    }

    pub fn ident(&self) -> u16 {
        self.ident
    }

    /// Sequence number the next request will carry
    pub fn sequence(&self) -> u16 {
        self.seq
    }

    pub fn is_waiting(&self) -> bool {
        self.waiting
    }

    pub fn received(&self) -> bool {
        self.reply.is_some()
    }

    /// Start waiting for a reply to the current sequence number
    pub fn begin(&mut self) -> u16 {
        self.waiting = true;
        self.reply = None;
        self.seq
    }

    /// Stop waiting without consuming a sequence number
    pub fn cancel(&mut self) {
        self.waiting = false;
        self.reply = None;
    }

    /// Record an echo reply; returns whether it belongs to this session
    pub fn on_reply(&mut self, from: Ipv4Address, ident: u16, seq: u16, ttl: u8) -> bool {
        if !self.waiting || ident != self.ident || self.reply.is_some() {
            return false;
        }
        self.reply = Some(PingReply { from, seq, ttl });
        true
    }

    /// End the attempt and advance the sequence number
    pub fn finish(&mut self) -> Option<PingReply> {
        self.waiting = false;
        self.seq = self.seq.wrapping_add(1);
        self.reply.take()
    }
}
