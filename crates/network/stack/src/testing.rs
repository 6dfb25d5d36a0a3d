//! In-memory NIC and a scripted peer for stack tests

use std::collections::VecDeque;

use delix_driver_traits::{DriverError, DriverResult, MacAddress, NicDevice};
use smoltcp::wire::{
    ArpOperation, ArpPacket, ArpRepr, EthernetAddress, EthernetFrame, EthernetProtocol,
    Icmpv4Message, Icmpv4Packet, Ipv4Address, Ipv4Packet,
};

use crate::arp;
use crate::icmp::{self, EchoKind, EchoRoute};

pub const LOCAL_MAC: MacAddress = [0x52, 0x54, 0x00, 0x12, 0x34, 0x56];
pub const GATEWAY_MAC: EthernetAddress = EthernetAddress([0x52, 0x55, 0x0a, 0x00, 0x02, 0x02]);

pub fn local_ip() -> Ipv4Address {
    Ipv4Address::new(10, 0, 2, 15)
}

pub fn gateway_ip() -> Ipv4Address {
    Ipv4Address::new(10, 0, 2, 2)
}

type Responder = Box<dyn FnMut(&[u8]) -> Vec<Vec<u8>>>;

/// NIC double: queues frames in both directions
pub struct MockNic {
    pub rx: VecDeque<Vec<u8>>,
    pub sent: Vec<Vec<u8>>,
    pub busy: bool,
    responder: Option<Responder>,
}

impl MockNic {
    pub fn new() -> Self {
        MockNic {
            rx: VecDeque::new(),
            sent: Vec::new(),
            busy: false,
            responder: None,
        }
    }

    pub fn with_responder<F>(responder: F) -> Self
    where
        F: FnMut(&[u8]) -> Vec<Vec<u8>> + 'static,
    {
        let mut nic = Self::new();
        nic.responder = Some(Box::new(responder));
        nic
    }

    pub fn arp_requests(&self) -> usize {
        self.sent.iter().filter(|f| arp_op(f) == Some(ArpOperation::Request)).count()
    }
}

impl NicDevice for MockNic {
    fn mac_address(&self) -> MacAddress {
        LOCAL_MAC
    }

    fn send_frame(&mut self, frame: &[u8]) -> DriverResult<()> {
        if self.busy {
            return Err(DriverError::Busy);
        }
        if let Some(responder) = self.responder.as_mut() {
            self.rx.extend(responder(frame));
        }
        self.sent.push(frame.to_vec());
        Ok(())
    }

    fn receive_frame(&mut self, buf: &mut [u8]) -> DriverResult<Option<usize>> {
        match self.rx.pop_front() {
            Some(frame) => {
                buf[..frame.len()].copy_from_slice(&frame);
                Ok(Some(frame.len()))
            }
            None => Ok(None),
        }
    }
}

pub fn arp_op(frame: &[u8]) -> Option<ArpOperation> {
    let eth = EthernetFrame::new_checked(frame).ok()?;
    if eth.ethertype() != EthernetProtocol::Arp {
        return None;
    }
    let packet = ArpPacket::new_checked(eth.payload()).ok()?;
    Some(packet.operation())
}

pub fn arp_frame(
    op: ArpOperation,
    src_mac: EthernetAddress,
    src_ip: Ipv4Address,
    dst_mac: EthernetAddress,
    dst_ip: Ipv4Address,
) -> Vec<u8> {
    let repr = ArpRepr::EthernetIpv4 {
        operation: op,
        source_hardware_addr: src_mac,
        source_protocol_addr: src_ip,
        target_hardware_addr: dst_mac,
        target_protocol_addr: dst_ip,
    };
    let eth_dst = if op == ArpOperation::Request { EthernetAddress::BROADCAST } else { dst_mac };
    let mut buf = vec![0u8; arp::ARP_FRAME_LEN];
    arp::emit_arp(&mut buf, src_mac, eth_dst, &repr);
    buf
}

pub fn echo_frame(route: &EchoRoute, kind: EchoKind, ident: u16, seq: u16, data: &[u8]) -> Vec<u8> {
    let mut buf = vec![0u8; icmp::echo_frame_len(data.len())];
    let len = icmp::emit_echo(&mut buf, route, kind, ident, seq, data);
    buf.truncate(len);
    buf
}

/// Peer at `ip`/`mac` that answers ARP requests and, if `echo`, echo requests
pub fn peer(ip: Ipv4Address, mac: EthernetAddress, echo: bool) -> impl FnMut(&[u8]) -> Vec<Vec<u8>> {
    move |frame: &[u8]| {
        let mut replies = Vec::new();
        let Ok(eth) = EthernetFrame::new_checked(frame) else {
            return replies;
        };
        match eth.ethertype() {
            EthernetProtocol::Arp => {
                let Ok(packet) = ArpPacket::new_checked(eth.payload()) else {
                    return replies;
                };
                if let Ok(ArpRepr::EthernetIpv4 {
                    operation: ArpOperation::Request,
                    source_hardware_addr,
                    source_protocol_addr,
                    target_protocol_addr,
                    ..
                }) = ArpRepr::parse(&packet)
                {
                    if target_protocol_addr == ip {
                        replies.push(arp_frame(
                            ArpOperation::Reply,
                            mac,
                            ip,
                            source_hardware_addr,
                            source_protocol_addr,
                        ));
                    }
                }
            }
            EthernetProtocol::Ipv4 if echo => {
                let Ok(ip_packet) = Ipv4Packet::new_checked(eth.payload()) else {
                    return replies;
                };
                let Ok(icmp_packet) = Icmpv4Packet::new_checked(ip_packet.payload()) else {
                    return replies;
                };
                if ip_packet.dst_addr() == ip && icmp_packet.msg_type() == Icmpv4Message::EchoRequest {
                    let route = EchoRoute {
                        src_mac: mac,
                        dst_mac: eth.src_addr(),
                        src_ip: ip,
                        dst_ip: ip_packet.src_addr(),
                    };
                    replies.push(echo_frame(
                        &route,
                        EchoKind::Reply,
                        icmp_packet.echo_ident(),
                        icmp_packet.echo_seq_no(),
                        icmp_packet.data(),
                    ));
                }
            }
            _ => {}
        }
        replies
    }
}
