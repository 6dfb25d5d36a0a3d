//! Frame dispatcher: demultiplexes received frames and builds outgoing ones

use delix_driver_traits::{debug_network, MacAddress, NicDevice};
use log::debug;
use smoltcp::wire::{
    ArpOperation, ArpPacket, ArpRepr, EthernetAddress, EthernetFrame, EthernetProtocol,
    Icmpv4Message, Icmpv4Packet, IpProtocol, Ipv4Address, Ipv4Packet,
};

use crate::arp::{self, ArpCache};
use crate::config::NetConfig;
use crate::error::{NetError, NetResult};
use crate::icmp::{self, EchoKind, EchoRoute, EchoSession};
use crate::stats::NetStats;
use crate::{ETH_HEADER_LEN, ICMP_HEADER_LEN, IPV4_HEADER_LEN, TX_BUF_LEN};

/// Protocol state shared by receive and transmit paths
///
/// Everything outgoing is built into one scratch buffer and handed to the
/// NIC, which copies it, before the next frame is built.
pub struct Dispatcher {
    ip_addr: Ipv4Address,
    mac_addr: EthernetAddress,
    pub(crate) cache: ArpCache,
    pub(crate) session: EchoSession,
    pub(crate) stats: NetStats,
    tx_buf: [u8; TX_BUF_LEN],
}

impl Dispatcher {
    pub fn new(config: &NetConfig, mac: MacAddress) -> Self {
        Dispatcher {
            ip_addr: config.ip_addr,
            mac_addr: EthernetAddress(mac),
            cache: ArpCache::new(config.arp_eviction),
            session: EchoSession::new(config.echo_ident),
            stats: NetStats::default(),
            tx_buf: [0; TX_BUF_LEN],
        }
    }

    pub fn ip_addr(&self) -> Ipv4Address {
        self.ip_addr
    }

    pub fn mac_addr(&self) -> EthernetAddress {
        self.mac_addr
    }

    pub fn cache(&self) -> &ArpCache {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut ArpCache {
        &mut self.cache
    }

    pub fn session(&self) -> &EchoSession {
        &self.session
    }

    pub fn stats(&self) -> &NetStats {
        &self.stats
    }

    /// Handle one received frame
    ///
    /// Malformed frames are counted and dropped; nothing is reported to the
    /// caller. Replies the frame calls for go out through `nic`.
    pub fn receive<D: NicDevice + ?Sized>(&mut self, frame: &[u8], nic: &mut D) {
        self.stats.rx_frames += 1;

        let result = if frame.len() < ETH_HEADER_LEN {
            Err(NetError::MalformedFrame)
        } else {
            self.demux(frame, nic)
        };

        match result {
            Ok(()) => {}
            Err(NetError::MalformedFrame) => {
                self.stats.malformed += 1;
                debug_network!("dropped malformed frame ({} bytes)", frame.len());
            }
            Err(err) => debug!("receive: {}", err),
        }
    }

    fn demux<D: NicDevice + ?Sized>(&mut self, frame: &[u8], nic: &mut D) -> NetResult<()> {
        let eth_frame = EthernetFrame::new_checked(frame).map_err(|_| NetError::MalformedFrame)?;
        match eth_frame.ethertype() {
            EthernetProtocol::Arp => self.receive_arp(eth_frame.payload(), nic),
            EthernetProtocol::Ipv4 => {
                self.receive_ipv4(eth_frame.src_addr(), eth_frame.payload(), nic)
            }
            _ => {
                self.stats.ignored += 1;
                Ok(())
            }
        }
    }

    fn receive_arp<D: NicDevice + ?Sized>(&mut self, payload: &[u8], nic: &mut D) -> NetResult<()> {
        let arp_packet = ArpPacket::new_checked(payload).map_err(|_| NetError::MalformedFrame)?;
        let arp_repr = ArpRepr::parse(&arp_packet).map_err(|_| NetError::MalformedFrame)?;

        let ArpRepr::EthernetIpv4 {
            operation,
            source_hardware_addr,
            source_protocol_addr,
            target_protocol_addr,
            ..
        } = arp_repr
        else {
            self.stats.ignored += 1;
            return Ok(());
        };

        match operation {
            ArpOperation::Reply => {
                if !self.cache.insert(source_protocol_addr, source_hardware_addr) {
                    debug!("arp: cache full, dropped {}", source_protocol_addr);
                }
                debug_network!("arp: {} is at {}", source_protocol_addr, source_hardware_addr);
                Ok(())
            }
            ArpOperation::Request if target_protocol_addr == self.ip_addr => {
                self.cache.insert(source_protocol_addr, source_hardware_addr);
                self.send_arp_reply(source_hardware_addr, source_protocol_addr, nic)
            }
            _ => {
                self.stats.ignored += 1;
                Ok(())
            }
        }
    }

    fn receive_ipv4<D: NicDevice + ?Sized>(
        &mut self,
        eth_src: EthernetAddress,
        payload: &[u8],
        nic: &mut D,
    ) -> NetResult<()> {
        if payload.len() < IPV4_HEADER_LEN {
            return Err(NetError::MalformedFrame);
        }
        let header_len = ((payload[0] & 0x0F) as usize) * 4;
        if header_len < IPV4_HEADER_LEN || payload.len() < header_len + ICMP_HEADER_LEN {
            return Err(NetError::MalformedFrame);
        }

        let ip_packet = Ipv4Packet::new_checked(payload).map_err(|_| NetError::MalformedFrame)?;
        if !ip_packet.verify_checksum() {
            return Err(NetError::MalformedFrame);
        }
        if ip_packet.dst_addr() != self.ip_addr || ip_packet.next_header() != IpProtocol::Icmp {
            self.stats.ignored += 1;
            return Ok(());
        }

        let icmp_bytes = ip_packet.payload();
        let icmp_packet =
            Icmpv4Packet::new_checked(icmp_bytes).map_err(|_| NetError::MalformedFrame)?;
        if !icmp_packet.verify_checksum() {
            return Err(NetError::MalformedFrame);
        }

        match (icmp_packet.msg_type(), icmp_packet.msg_code()) {
            (Icmpv4Message::EchoReply, 0) => {
                let matched = self.session.on_reply(
                    ip_packet.src_addr(),
                    icmp_packet.echo_ident(),
                    icmp_packet.echo_seq_no(),
                    ip_packet.hop_limit(),
                );
                if matched {
                    self.stats.echo_replies_matched += 1;
                } else {
                    self.stats.ignored += 1;
                }
                Ok(())
            }
            (Icmpv4Message::EchoRequest, 0) => {
                let route = EchoRoute {
                    src_mac: self.mac_addr,
                    dst_mac: eth_src,
                    src_ip: self.ip_addr,
                    dst_ip: ip_packet.src_addr(),
                };
                let data = icmp_packet.data();
                if icmp::echo_frame_len(data.len()) > TX_BUF_LEN {
                    self.stats.ignored += 1;
                    return Ok(());
                }
                let len = icmp::emit_echo(
                    &mut self.tx_buf,
                    &route,
                    EchoKind::Reply,
                    icmp_packet.echo_ident(),
                    icmp_packet.echo_seq_no(),
                    data,
                );
                self.transmit(len, nic)?;
                self.stats.echo_replies_sent += 1;
                Ok(())
            }
            _ => {
                self.stats.ignored += 1;
                Ok(())
            }
        }
    }

    /// Broadcast an ARP request for `target_ip`
    pub fn send_arp_request<D: NicDevice + ?Sized>(
        &mut self,
        target_ip: Ipv4Address,
        nic: &mut D,
    ) -> NetResult<()> {
        let repr = arp::request_repr(self.mac_addr, self.ip_addr, target_ip);
        let len = arp::emit_arp(&mut self.tx_buf, self.mac_addr, EthernetAddress::BROADCAST, &repr);
        self.transmit(len, nic)?;
        self.stats.arp_requests_sent += 1;
        Ok(())
    }

    fn send_arp_reply<D: NicDevice + ?Sized>(
        &mut self,
        target_mac: EthernetAddress,
        target_ip: Ipv4Address,
        nic: &mut D,
    ) -> NetResult<()> {
        let repr = arp::reply_repr(self.mac_addr, self.ip_addr, target_mac, target_ip);
        let len = arp::emit_arp(&mut self.tx_buf, self.mac_addr, target_mac, &repr);
        self.transmit(len, nic)?;
        self.stats.arp_replies_sent += 1;
        Ok(())
    }

    /// Send an echo request and start waiting for its reply
    ///
    /// Returns the sequence number sent. If the NIC refuses the frame the
    /// session is left idle and the sequence number is not consumed.
    pub fn send_echo_request<D: NicDevice + ?Sized>(
        &mut self,
        target_ip: Ipv4Address,
        target_mac: EthernetAddress,
        nic: &mut D,
    ) -> NetResult<u16> {
        let route = EchoRoute {
            src_mac: self.mac_addr,
            dst_mac: target_mac,
            src_ip: self.ip_addr,
            dst_ip: target_ip,
        };
        let seq = self.session.begin();
        let payload = icmp::echo_payload();
        let len = icmp::emit_echo(
            &mut self.tx_buf,
            &route,
            EchoKind::Request,
            self.session.ident(),
            seq,
            &payload,
        );
        if let Err(err) = self.transmit(len, nic) {
            self.session.cancel();
            return Err(err);
        }
        self.stats.echo_requests_sent += 1;
        Ok(seq)
    }

    fn transmit<D: NicDevice + ?Sized>(&mut self, len: usize, nic: &mut D) -> NetResult<()> {
        match nic.send_frame(&self.tx_buf[..len]) {
            Ok(()) => {
                self.stats.tx_frames += 1;
                Ok(())
            }
            Err(err) => {
                let err = NetError::from(err);
                if err == NetError::Busy {
                    self.stats.tx_busy += 1;
                }
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;
    use crate::ARP_CACHE_SIZE;

    fn dispatcher() -> Dispatcher {
        Dispatcher::new(&NetConfig::default(), LOCAL_MAC)
    }

    fn local_mac() -> EthernetAddress {
        EthernetAddress(LOCAL_MAC)
    }

    #[test]
    fn test_arp_request_for_us_gets_one_reply() {
        let mut d = dispatcher();
        let mut nic = MockNic::new();
        let request = arp_frame(
            ArpOperation::Request,
            GATEWAY_MAC,
            gateway_ip(),
            EthernetAddress([0; 6]),
            local_ip(),
        );

        d.receive(&request, &mut nic);

        assert_eq!(nic.sent.len(), 1);
        let reply = &nic.sent[0];
        assert_eq!(arp_op(reply), Some(ArpOperation::Reply));
        assert_eq!(&reply[0..6], GATEWAY_MAC.as_bytes());
        assert_eq!(&reply[22..28], &LOCAL_MAC);
        assert_eq!(&reply[28..32], local_ip().as_bytes());
        assert_eq!(&reply[32..38], GATEWAY_MAC.as_bytes());
        assert_eq!(&reply[38..42], gateway_ip().as_bytes());
        assert_eq!(d.stats().arp_replies_sent, 1);
        // the requester's binding is learned as well
        assert_eq!(d.cache().peek(gateway_ip()), Some(GATEWAY_MAC));
    }

    #[test]
    fn test_arp_request_for_other_host_ignored() {
        let mut d = dispatcher();
        let mut nic = MockNic::new();
        let request = arp_frame(
            ArpOperation::Request,
            GATEWAY_MAC,
            gateway_ip(),
            EthernetAddress([0; 6]),
            Ipv4Address::new(10, 0, 2, 99),
        );
        d.receive(&request, &mut nic);
        assert!(nic.sent.is_empty());
        assert!(d.cache().is_empty());
    }

    #[test]
    fn test_arp_reply_updates_cache() {
        let mut d = dispatcher();
        let mut nic = MockNic::new();
        let reply = arp_frame(ArpOperation::Reply, GATEWAY_MAC, gateway_ip(), local_mac(), local_ip());

        d.receive(&reply, &mut nic);
        assert_eq!(d.cache().peek(gateway_ip()), Some(GATEWAY_MAC));

        let moved = EthernetAddress([0x02, 0, 0, 0, 0, 0x02]);
        let reply = arp_frame(ArpOperation::Reply, moved, gateway_ip(), local_mac(), local_ip());
        d.receive(&reply, &mut nic);
        assert_eq!(d.cache().peek(gateway_ip()), Some(moved));
        assert_eq!(d.cache().len(), 1);
        assert!(nic.sent.is_empty());
    }

    #[test]
    fn test_seventeenth_binding_dropped() {
        let mut d = dispatcher();
        let mut nic = MockNic::new();
        for i in 0..=ARP_CACHE_SIZE as u8 {
            let mac = EthernetAddress([0x02, 0, 0, 0, 0, i]);
            let reply = arp_frame(
                ArpOperation::Reply,
                mac,
                Ipv4Address::new(10, 0, 3, i),
                local_mac(),
                local_ip(),
            );
            d.receive(&reply, &mut nic);
        }
        assert_eq!(d.cache().len(), ARP_CACHE_SIZE);
        assert_eq!(d.cache().peek(Ipv4Address::new(10, 0, 3, ARP_CACHE_SIZE as u8)), None);
        assert_eq!(
            d.cache().peek(Ipv4Address::new(10, 0, 3, 0)),
            Some(EthernetAddress([0x02, 0, 0, 0, 0, 0]))
        );
    }

    #[test]
    fn test_runt_frames_have_no_effect() {
        let mut d = dispatcher();
        let mut nic = MockNic::new();
        let request = arp_frame(
            ArpOperation::Request,
            GATEWAY_MAC,
            gateway_ip(),
            EthernetAddress([0; 6]),
            local_ip(),
        );
        for len in 0..14 {
            d.receive(&request[..len], &mut nic);
        }
        assert!(nic.sent.is_empty());
        assert!(d.cache().is_empty());
        assert_eq!(d.stats().malformed, 14);
    }

    #[test]
    fn test_truncated_arp_is_malformed() {
        let mut d = dispatcher();
        let mut nic = MockNic::new();
        let request = arp_frame(
            ArpOperation::Request,
            GATEWAY_MAC,
            gateway_ip(),
            EthernetAddress([0; 6]),
            local_ip(),
        );
        d.receive(&request[..30], &mut nic);
        assert!(nic.sent.is_empty());
        assert_eq!(d.stats().malformed, 1);
    }

    #[test]
    fn test_bad_ip_header_length_dropped() {
        let mut d = dispatcher();
        let mut nic = MockNic::new();
        let route = EchoRoute {
            src_mac: GATEWAY_MAC,
            dst_mac: local_mac(),
            src_ip: gateway_ip(),
            dst_ip: local_ip(),
        };
        let mut frame = echo_frame(&route, EchoKind::Request, 1, 1, &[0; 8]);
        frame[14] = 0x44;
        d.receive(&frame, &mut nic);
        assert_eq!(d.stats().malformed, 1);

        // header + 8 bytes must fit in the frame
        let frame = echo_frame(&route, EchoKind::Request, 1, 1, &[]);
        d.receive(&frame[..ETH_HEADER_LEN + IPV4_HEADER_LEN + 4], &mut nic);
        assert_eq!(d.stats().malformed, 2);
        assert!(nic.sent.is_empty());
    }

    #[test]
    fn test_corrupt_checksum_dropped() {
        let mut d = dispatcher();
        let mut nic = MockNic::new();
        let route = EchoRoute {
            src_mac: GATEWAY_MAC,
            dst_mac: local_mac(),
            src_ip: gateway_ip(),
            dst_ip: local_ip(),
        };
        let mut frame = echo_frame(&route, EchoKind::Request, 1, 1, b"data");
        let last = frame.len() - 1;
        frame[last] ^= 0xFF;
        d.receive(&frame, &mut nic);
        assert_eq!(d.stats().malformed, 1);
        assert!(nic.sent.is_empty());
    }

    #[test]
    fn test_corrupt_ip_header_dropped() {
        let mut d = dispatcher();
        let mut nic = MockNic::new();
        let route = EchoRoute {
            src_mac: GATEWAY_MAC,
            dst_mac: local_mac(),
            src_ip: gateway_ip(),
            dst_ip: local_ip(),
        };
        let mut frame = echo_frame(&route, EchoKind::Request, 1, 1, b"data");
        // TTL changes without the header checksum following
        frame[ETH_HEADER_LEN + 8] -= 1;
        d.receive(&frame, &mut nic);
        assert_eq!(d.stats().malformed, 1);
        assert!(nic.sent.is_empty());
    }

    #[test]
    fn test_echo_request_answered() {
        let mut d = dispatcher();
        let mut nic = MockNic::new();
        let route = EchoRoute {
            src_mac: GATEWAY_MAC,
            dst_mac: local_mac(),
            src_ip: gateway_ip(),
            dst_ip: local_ip(),
        };
        let request = echo_frame(&route, EchoKind::Request, 0x99, 3, b"hello");
        d.receive(&request, &mut nic);

        assert_eq!(nic.sent.len(), 1);
        let eth = EthernetFrame::new_checked(&nic.sent[0][..]).unwrap();
        assert_eq!(eth.dst_addr(), GATEWAY_MAC);
        let ip = Ipv4Packet::new_checked(eth.payload()).unwrap();
        assert_eq!(ip.dst_addr(), gateway_ip());
        let icmp = Icmpv4Packet::new_checked(ip.payload()).unwrap();
        assert_eq!(icmp.msg_type(), Icmpv4Message::EchoReply);
        assert_eq!(icmp.echo_ident(), 0x99);
        assert_eq!(icmp.echo_seq_no(), 3);
        assert_eq!(icmp.data(), b"hello");
        assert_eq!(d.stats().echo_replies_sent, 1);
    }

    #[test]
    fn test_packets_for_other_hosts_ignored() {
        let mut d = dispatcher();
        let mut nic = MockNic::new();
        let route = EchoRoute {
            src_mac: GATEWAY_MAC,
            dst_mac: local_mac(),
            src_ip: gateway_ip(),
            dst_ip: Ipv4Address::new(10, 0, 2, 16),
        };
        let request = echo_frame(&route, EchoKind::Request, 1, 1, b"x");
        d.receive(&request, &mut nic);
        assert!(nic.sent.is_empty());
        assert_eq!(d.stats().ignored, 1);
    }

    #[test]
    fn test_echo_reply_matches_waiting_session() {
        let mut d = dispatcher();
        let mut nic = MockNic::new();
        let route = EchoRoute {
            src_mac: GATEWAY_MAC,
            dst_mac: local_mac(),
            src_ip: gateway_ip(),
            dst_ip: local_ip(),
        };
        let reply = echo_frame(&route, EchoKind::Reply, 0x1234, 0, b"x");

        // not waiting yet
        d.receive(&reply, &mut nic);
        assert!(!d.session().received());

        let seq = d.send_echo_request(gateway_ip(), GATEWAY_MAC, &mut nic).unwrap();
        assert_eq!(seq, 0);
        let foreign = echo_frame(&route, EchoKind::Reply, 0x4321, 0, b"x");
        d.receive(&foreign, &mut nic);
        assert!(!d.session().received());

        d.receive(&reply, &mut nic);
        assert!(d.session().received());
        assert_eq!(d.stats().echo_replies_matched, 1);
    }

    #[test]
    fn test_busy_echo_request_keeps_sequence() {
        let mut d = dispatcher();
        let mut nic = MockNic::new();
        nic.busy = true;
        assert_eq!(
            d.send_echo_request(gateway_ip(), GATEWAY_MAC, &mut nic),
            Err(NetError::Busy)
        );
        assert!(!d.session().is_waiting());
        assert_eq!(d.session().sequence(), 0);
        assert_eq!(d.stats().tx_busy, 1);
    }

    #[test]
    fn test_unknown_ethertype_ignored() {
        let mut d = dispatcher();
        let mut nic = MockNic::new();
        let mut frame = [0u8; 60];
        frame[12..14].copy_from_slice(&[0x86, 0xdd]);
        d.receive(&frame, &mut nic);
        assert_eq!(d.stats().ignored, 1);
        assert_eq!(d.stats().malformed, 0);
        assert_eq!(d.stats().rx_frames, 1);
    }
}
